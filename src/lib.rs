//! Config Synth - template-driven configuration synthesis for service providers
//!
//! Providers discover entities (services, containers, tasks), filter them by
//! tag constraints, and render a text template against the discovered data.
//! The rendered text is decoded into a strongly typed configuration value.
//!
//! # Example
//!
//! ```rust
//! use config_synth::{FuncMap, ProviderConfig};
//! use serde::Deserialize;
//! use serde_json::json;
//!
//! #[derive(Deserialize)]
//! struct Service {
//!     name: String,
//! }
//!
//! let service: Service = ProviderConfig::new()
//!     .get_configuration(
//!         "name = \"{{ normalize .Name }}\"",
//!         &FuncMap::new(),
//!         &json!({"Name": "my.service"}),
//!     )
//!     .unwrap();
//! assert_eq!(service.name, "my-service");
//! ```

pub mod assets;
pub mod constraint;
pub mod decode;
pub mod error;
pub mod funcs;
pub mod provider;
pub mod strings;
pub mod template;

pub use assets::{AssetStore, EmbeddedAssets, MemoryAssets};
pub use constraint::{match_constraints, match_constraints_with, Constraint, TagMatcher};
pub use decode::{ConfigurationDecoder, DecodeError, JsonDecoder, TomlDecoder};
pub use error::{ParseError, ProviderError};
pub use funcs::{build_function_namespace, func, FuncMap, FunctionError, TemplateFn};
pub use provider::{ConfigMessage, Provider, ProviderConfig};
pub use strings::{normalize, reverse_string_slice, split};
pub use template::{ExecError, Template};

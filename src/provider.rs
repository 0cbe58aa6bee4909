//! Configuration synthesis shared by every provider
//!
//! [`ProviderConfig`] holds the settings common to all providers and turns a
//! template plus a data context into a typed configuration:
//!
//! 1. build the function namespace
//! 2. resolve the template text (override file, bundled asset or literal)
//! 3. parse, execute, and decode the rendered text
//!
//! Nothing partial is returned: any failing step yields a [`ProviderError`].

use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::assets::{AssetStore, EmbeddedAssets, TEMPLATE_SUFFIX};
use crate::constraint::{match_constraints, Constraint};
use crate::decode::{ConfigurationDecoder, TomlDecoder};
use crate::error::ProviderError;
use crate::funcs::{build_function_namespace, FuncMap};
use crate::template::Template;

/// Name given to templates passed as literal text
pub const INLINE_TEMPLATE_NAME: &str = "inline";

/// Errors that can occur when loading a provider configuration file
#[derive(Error, Debug)]
pub enum ConfigFileError {
    #[error("Failed to read provider configuration file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse provider configuration TOML: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Settings shared by every provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Watch the backing source for changes
    pub watch: bool,
    /// Override the default configuration template
    pub filename: Option<PathBuf>,
    /// Filter entities by constraint, matching against their tags
    pub constraints: Vec<Constraint>,
    /// Emit additional provider logs
    pub trace: bool,
    /// Log the rendered template before decoding it
    pub debug_log_generated_template: bool,
}

impl ProviderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigFileError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load settings from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigFileError> {
        Ok(toml::from_str(content)?)
    }

    pub fn with_watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    /// Read the template from `path` instead of the default template
    pub fn with_filename(mut self, path: impl Into<PathBuf>) -> Self {
        self.filename = Some(path.into());
        self
    }

    pub fn with_constraints(mut self, constraints: Vec<Constraint>) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_debug_log_generated_template(mut self, enabled: bool) -> Self {
        self.debug_log_generated_template = enabled;
        self
    }

    /// The override file, ignoring an empty path
    fn override_file(&self) -> Option<&Path> {
        self.filename
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }

    /// Check `tags` against every configured constraint.
    ///
    /// Returns the first constraint that does not hold.
    pub fn match_constraints(&self, tags: &[String]) -> (bool, Option<&Constraint>) {
        let (matched, failing) = match_constraints(tags, &self.constraints);
        if self.trace {
            if let Some(constraint) = failing {
                tracing::debug!(%constraint, ?tags, "tags rejected by constraint");
            }
        }
        (matched, failing)
    }

    /// Name used for the template in diagnostics
    pub fn template_name(&self, default_template: &str) -> String {
        match self.override_file() {
            Some(path) => path.display().to_string(),
            None if default_template.ends_with(TEMPLATE_SUFFIX) => default_template.to_string(),
            None => INLINE_TEMPLATE_NAME.to_string(),
        }
    }

    /// Resolve the template text.
    ///
    /// The override file wins when set; otherwise an identifier ending in
    /// `.tmpl` names a bundled asset and anything else is the template text.
    pub fn get_template_content(
        &self,
        default_template: &str,
        assets: &dyn AssetStore,
    ) -> Result<String, ProviderError> {
        if let Some(path) = self.override_file() {
            if self.trace {
                tracing::trace!(path = %path.display(), "reading template override");
            }
            return std::fs::read_to_string(path).map_err(|e| {
                ProviderError::TemplateSourceUnavailable {
                    source_name: path.display().to_string(),
                    reason: e.to_string(),
                    io_error: Some(e),
                }
            });
        }

        if default_template.ends_with(TEMPLATE_SUFFIX) {
            if self.trace {
                tracing::trace!(asset = default_template, "loading bundled template");
            }
            let unavailable = |reason: &str| ProviderError::TemplateSourceUnavailable {
                source_name: default_template.to_string(),
                reason: reason.to_string(),
                io_error: None,
            };
            let bytes = assets
                .get(default_template)
                .ok_or_else(|| unavailable("asset not found"))?;
            return String::from_utf8(bytes.into_owned())
                .map_err(|e| unavailable(&format!("asset is not valid UTF-8: {}", e)));
        }

        Ok(default_template.to_string())
    }

    /// Render the template against `data` and decode it as TOML, using the
    /// bundled template assets
    pub fn get_configuration<C: DeserializeOwned>(
        &self,
        default_template: &str,
        funcs: &FuncMap,
        data: &Value,
    ) -> Result<C, ProviderError> {
        self.get_configuration_with(&EmbeddedAssets, &TomlDecoder, default_template, funcs, data)
    }

    /// Like [`get_configuration`](Self::get_configuration) with an explicit
    /// asset store and decoder
    pub fn get_configuration_with<C, D>(
        &self,
        assets: &dyn AssetStore,
        decoder: &D,
        default_template: &str,
        funcs: &FuncMap,
        data: &Value,
    ) -> Result<C, ProviderError>
    where
        C: DeserializeOwned,
        D: ConfigurationDecoder,
    {
        let rendered = self.render(assets, default_template, funcs, data)?;
        decoder
            .decode(&rendered)
            .map_err(|error| ProviderError::ConfigurationDecode {
                template: self.template_name(default_template),
                rendered,
                error,
            })
    }

    /// Resolve, parse and execute the template without decoding the result
    pub fn render(
        &self,
        assets: &dyn AssetStore,
        default_template: &str,
        funcs: &FuncMap,
        data: &Value,
    ) -> Result<String, ProviderError> {
        let namespace = build_function_namespace(funcs);
        let name = self.template_name(default_template);
        let source_text = self.get_template_content(default_template, assets)?;

        let template = match Template::parse(name.clone(), &source_text, namespace) {
            Ok(template) => template,
            Err(errors) => {
                return Err(ProviderError::TemplateParse {
                    template: name,
                    source_text,
                    errors,
                })
            }
        };

        let rendered = match template.execute(data) {
            Ok(rendered) => rendered,
            Err(error) => {
                return Err(ProviderError::TemplateExecution {
                    template: name,
                    source_text,
                    error,
                })
            }
        };

        if self.debug_log_generated_template {
            let name = template.name();
            tracing::debug!(template = %name, "Rendering results of {}:\n{}", name, rendered);
        }
        Ok(rendered)
    }
}

/// A configuration produced by a provider
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigMessage<C> {
    pub provider_name: String,
    pub configuration: C,
}

impl<C: fmt::Display> fmt::Display for ConfigMessage<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider_name, self.configuration)
    }
}

/// A source of configurations.
///
/// Implementations push every configuration they produce into `sink`,
/// keeping only entities whose tags satisfy `constraints`.
pub trait Provider<C> {
    fn provide(
        &self,
        sink: &mut dyn FnMut(ConfigMessage<C>),
        constraints: &[Constraint],
    ) -> Result<(), ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryAssets;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Named {
        name: String,
    }

    #[test]
    fn test_deserialize_from_toml() {
        let config = ProviderConfig::from_toml_str(
            r#"
            watch = true
            filename = "custom.tmpl"
            constraints = ["tag==api", "tag!=canary*"]
            debugLogGeneratedTemplate = true
            "#,
        )
        .unwrap();
        assert_eq!(
            config,
            ProviderConfig::new()
                .with_watch(true)
                .with_filename("custom.tmpl")
                .with_constraints(vec![
                    Constraint::must_match("api"),
                    Constraint::must_not_match("canary*"),
                ])
                .with_debug_log_generated_template(true)
        );
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(ProviderConfig::from_toml_str("").unwrap(), ProviderConfig::default());
    }

    #[test]
    fn test_bad_constraint_in_toml() {
        let err = ProviderConfig::from_toml_str(r#"constraints = ["region==eu"]"#).unwrap_err();
        assert!(matches!(err, ConfigFileError::ParseError(_)));
    }

    #[test]
    fn test_match_constraints_uses_configured_set() {
        let config = ProviderConfig::new()
            .with_trace(true)
            .with_constraints(vec![Constraint::must_match("api"), Constraint::must_not_match("internal")]);
        let tags = vec!["api".to_string(), "internal".to_string()];
        let (matched, failing) = config.match_constraints(&tags);
        assert!(!matched);
        assert_eq!(failing, Some(&Constraint::must_not_match("internal")));

        assert_eq!(config.match_constraints(&["api".to_string()]), (true, None));
    }

    #[test]
    fn test_template_content_sources() {
        let assets = MemoryAssets::new().with_asset("a.tmpl", "from asset");
        let config = ProviderConfig::new();
        assert_eq!(config.get_template_content("a.tmpl", &assets).unwrap(), "from asset");
        assert_eq!(config.get_template_content("literal {{.}}", &assets).unwrap(), "literal {{.}}");
        assert_eq!(config.get_template_content("", &assets).unwrap(), "");
    }

    #[test]
    fn test_missing_asset_is_unavailable() {
        let err = ProviderConfig::new()
            .get_template_content("missing.tmpl", &MemoryAssets::new())
            .unwrap_err();
        match err {
            ProviderError::TemplateSourceUnavailable {
                source_name,
                reason,
                io_error,
            } => {
                assert_eq!(source_name, "missing.tmpl");
                assert_eq!(reason, "asset not found");
                assert!(io_error.is_none());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_non_utf8_asset_is_unavailable() {
        let assets = MemoryAssets::new().with_asset("bin.tmpl", vec![0xff, 0xfe]);
        let err = ProviderConfig::new().get_template_content("bin.tmpl", &assets).unwrap_err();
        assert!(matches!(err, ProviderError::TemplateSourceUnavailable { .. }));
    }

    #[test]
    fn test_empty_filename_is_ignored() {
        let config = ProviderConfig::new().with_filename("");
        assert_eq!(config.template_name("x.tmpl"), "x.tmpl");
        assert_eq!(config.template_name("name = 1"), INLINE_TEMPLATE_NAME);
        assert_eq!(
            config.get_template_content("text", &MemoryAssets::new()).unwrap(),
            "text"
        );
    }

    #[test]
    fn test_literal_template_end_to_end() {
        let named: Named = ProviderConfig::new()
            .get_configuration(
                "name = \"{{normalize .Name}}\"",
                &FuncMap::new(),
                &json!({"Name": "my.service"}),
            )
            .unwrap();
        assert_eq!(named.name, "my-service");
    }

    #[test]
    fn test_debug_logging_does_not_change_result() {
        let data = json!({"Name": "a b"});
        let quiet: Named = ProviderConfig::new()
            .get_configuration("name = \"{{normalize .Name}}\"", &FuncMap::new(), &data)
            .unwrap();
        let logged: Named = ProviderConfig::new()
            .with_debug_log_generated_template(true)
            .get_configuration("name = \"{{normalize .Name}}\"", &FuncMap::new(), &data)
            .unwrap();
        assert_eq!(quiet, logged);
    }

    #[test]
    fn test_execution_error_names_template() {
        let err = ProviderConfig::new()
            .get_configuration::<Named>("{{ .A.B }}", &FuncMap::new(), &json!({"A": 1}))
            .unwrap_err();
        match err {
            ProviderError::TemplateExecution { template, error, .. } => {
                assert_eq!(template, INLINE_TEMPLATE_NAME);
                assert_eq!(error.message, "can't evaluate field B in type int");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_config_message_display() {
        let message = ConfigMessage {
            provider_name: "file".to_string(),
            configuration: 3,
        };
        assert_eq!(message.to_string(), "file: 3");
    }
}

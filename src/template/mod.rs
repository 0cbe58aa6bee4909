//! Text templates rendered against a dynamic data context
//!
//! The language follows the familiar `{{ }}` action syntax: pipelines of
//! function calls, field access on the current value (`.`), variables,
//! and `if`/`with`/`range` blocks.
//!
//! # Example
//!
//! ```rust
//! use config_synth::build_function_namespace;
//! use config_synth::template::Template;
//! use serde_json::json;
//!
//! let funcs = build_function_namespace(&Default::default());
//! let template = Template::parse("inline", "name = \"{{ normalize .Name }}\"", funcs).unwrap();
//! let rendered = template.execute(&json!({"Name": "my.service"})).unwrap();
//! assert_eq!(rendered, "name = \"my-service\"");
//! ```

pub mod ast;
mod exec;
mod grammar;
pub mod lexer;
pub mod value;

pub use exec::ExecError;

use serde_json::Value;

use crate::error::ParseError;
use crate::funcs::FuncMap;
use ast::{Node, Spanned};

/// A parsed template bound to its function namespace
pub struct Template {
    name: String,
    nodes: Vec<Spanned<Node>>,
    funcs: FuncMap,
}

impl Template {
    /// Parse `source`, checking every referenced function against `funcs`
    pub fn parse(
        name: impl Into<String>,
        source: &str,
        funcs: FuncMap,
    ) -> Result<Self, Vec<ParseError>> {
        let nodes = grammar::parse(source)?;

        let mut errors = Vec::new();
        ast::visit_functions(&nodes, &mut |func, span| {
            if !funcs.contains_key(func) {
                errors.push(ParseError::UnknownFunction {
                    name: func.to_string(),
                    span: span.clone(),
                });
            }
        });
        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Self {
            name: name.into(),
            nodes,
            funcs,
        })
    }

    /// Render the template with `data` as the initial dot and `$`
    pub fn execute(&self, data: &Value) -> Result<String, ExecError> {
        let mut state = exec::State::new(&self.funcs, data);
        state.walk(data, &self.nodes)?;
        Ok(state.finish())
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name)
            .field("nodes", &self.nodes)
            .field("funcs", &self.funcs.len())
            .finish()
    }
}

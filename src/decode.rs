//! Decoders turning rendered template text into typed configuration

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::template::ast::Span;

/// Rendered text could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DecodeError {
    pub message: String,
    /// Byte range in the rendered text, when the format reports one
    pub span: Option<Span>,
}

/// Converts rendered text into a configuration value
pub trait ConfigurationDecoder {
    fn decode<C: DeserializeOwned>(&self, rendered: &str) -> Result<C, DecodeError>;
}

/// TOML documents, the default configuration format
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlDecoder;

impl ConfigurationDecoder for TomlDecoder {
    fn decode<C: DeserializeOwned>(&self, rendered: &str) -> Result<C, DecodeError> {
        toml::from_str(rendered).map_err(|e: toml::de::Error| DecodeError {
            message: e.message().to_string(),
            span: e.span(),
        })
    }
}

/// JSON documents
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl ConfigurationDecoder for JsonDecoder {
    fn decode<C: DeserializeOwned>(&self, rendered: &str) -> Result<C, DecodeError> {
        serde_json::from_str(rendered).map_err(|e| DecodeError {
            message: e.to_string(),
            span: line_column_offset(rendered, e.line(), e.column()).map(|at| at..at),
        })
    }
}

/// Byte offset of a 1-based line and column
fn line_column_offset(text: &str, line: usize, column: usize) -> Option<usize> {
    if line == 0 {
        return None;
    }
    let line_start: usize = text
        .split_inclusive('\n')
        .take(line - 1)
        .map(str::len)
        .sum();
    Some((line_start + column.saturating_sub(1)).min(text.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Service {
        name: String,
        port: u16,
    }

    #[test]
    fn test_toml_decodes() {
        let service: Service = TomlDecoder.decode("name = \"web\"\nport = 80\n").unwrap();
        assert_eq!(
            service,
            Service {
                name: "web".to_string(),
                port: 80
            }
        );
    }

    #[test]
    fn test_toml_error_keeps_span() {
        let rendered = "name = \"web\"\nport = \"eighty\"\n";
        let err = TomlDecoder.decode::<Service>(rendered).unwrap_err();
        let span = err.span.clone().expect("toml reports a span");
        assert!(rendered[span].contains("eighty"));
        assert!(!err.message.is_empty());
    }

    #[test]
    fn test_json_decodes_and_locates_errors() {
        let service: Service = JsonDecoder.decode(r#"{"name": "api", "port": 8080}"#).unwrap();
        assert_eq!(service.port, 8080);

        let err = JsonDecoder
            .decode::<Service>("{\"name\": \"api\",\n \"port\": }")
            .unwrap_err();
        assert!(err.span.is_some());
    }

    #[test]
    fn test_line_column_offset() {
        assert_eq!(line_column_offset("ab\ncd", 2, 2), Some(4));
        assert_eq!(line_column_offset("ab", 0, 0), None);
    }
}

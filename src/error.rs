//! Error types for template parsing and configuration synthesis

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

use crate::decode::DecodeError;
use crate::template::ast::Span;
use crate::template::ExecError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Parse error at {span:?}: {message}")]
    Syntax {
        span: Span,
        message: String,
        expected: Vec<String>,
    },

    #[error("function \"{name}\" not defined")]
    UnknownFunction { name: String, span: Span },
}

impl ParseError {
    /// Location of the error in the template source
    pub fn span(&self) -> &Span {
        match self {
            ParseError::Syntax { span, .. } | ParseError::UnknownFunction { span, .. } => span,
        }
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        match self {
            ParseError::Syntax {
                span,
                message,
                expected,
            } => {
                let expected_str = if expected.is_empty() {
                    String::new()
                } else {
                    format!("\nExpected: {}", expected.join(", "))
                };
                report(
                    source,
                    filename,
                    span,
                    message,
                    &format!("{}{}", message, expected_str),
                )
            }
            ParseError::UnknownFunction { name, span } => report(
                source,
                filename,
                span,
                &self.to_string(),
                &format!("'{}' is not in the function namespace", name),
            ),
        }
    }
}

/// Render a single-label diagnostic against `source`
pub(crate) fn report(
    source: &str,
    filename: &str,
    span: &Span,
    message: &str,
    label: &str,
) -> String {
    let mut buf = Vec::new();
    let written = Report::build(ReportKind::Error, filename, span.start)
        .with_message(message)
        .with_label(
            Label::new((filename, span.clone()))
                .with_message(label)
                .with_color(Color::Red),
        )
        .finish()
        .write((filename, Source::from(source)), &mut buf);
    match written {
        Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
        Err(_) => format!("{}: {}", filename, message),
    }
}

impl<'a> From<chumsky::error::Rich<'a, crate::template::lexer::Token>> for ParseError {
    fn from(err: chumsky::error::Rich<'a, crate::template::lexer::Token>) -> Self {
        use chumsky::error::RichReason;

        let message = match err.reason() {
            RichReason::Custom(msg) => msg.to_string(),
            _ => match err.found() {
                Some(tok) => format!("unexpected {}", format_token(tok)),
                None => "unexpected end of template".to_string(),
            },
        };

        // Format expected tokens nicely
        let expected: Vec<String> = err
            .expected()
            .filter_map(|e| match e {
                chumsky::error::RichPattern::Token(tok) => Some(format_token(tok)),
                chumsky::error::RichPattern::Label(label) => Some(label.to_string()),
                chumsky::error::RichPattern::EndOfInput => Some("end of template".to_string()),
                _ => None,
            })
            .collect();

        ParseError::Syntax {
            span: err.span().into_range(),
            message,
            expected,
        }
    }
}

/// Format a token for human-readable error messages
fn format_token(tok: &crate::template::lexer::Token) -> String {
    use crate::template::lexer::Token;
    match tok {
        Token::Text(_) => "text".to_string(),
        Token::LeftDelim => "'{{'".to_string(),
        Token::RightDelim => "'}}'".to_string(),
        Token::If => "keyword 'if'".to_string(),
        Token::Else => "keyword 'else'".to_string(),
        Token::End => "keyword 'end'".to_string(),
        Token::Range => "keyword 'range'".to_string(),
        Token::With => "keyword 'with'".to_string(),
        Token::True => "'true'".to_string(),
        Token::False => "'false'".to_string(),
        Token::Nil => "'nil'".to_string(),
        Token::Pipe => "'|'".to_string(),
        Token::ParenOpen => "'('".to_string(),
        Token::ParenClose => "')'".to_string(),
        Token::Declare => "':='".to_string(),
        Token::Assign => "'='".to_string(),
        Token::Comma => "','".to_string(),
        Token::Dot => "'.'".to_string(),
        Token::Field(chain) | Token::ChainedField(chain) => format!("field '.{}'", chain.join(".")),
        Token::Variable(name, fields) if fields.is_empty() => format!("variable '{}'", name),
        Token::Variable(name, fields) => format!("variable '{}.{}'", name, fields.join(".")),
        Token::Ident(s) => format!("identifier '{}'", s),
        Token::String(s) => format!("string {:?}", s),
        Token::Int(n) => format!("number {}", n),
        Token::Float(n) => format!("number {}", n),
    }
}

/// Errors returned while turning a template into a configuration value
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Override file or bundled asset could not be read
    #[error("template source '{source_name}' is unavailable: {reason}")]
    TemplateSourceUnavailable {
        source_name: String,
        reason: String,
        /// Set when reading the override file failed
        #[source]
        io_error: Option<std::io::Error>,
    },

    /// Malformed template or unknown function reference
    #[error("failed to parse template '{template}': {}", format_parse_errors(.errors))]
    TemplateParse {
        template: String,
        source_text: String,
        errors: Vec<ParseError>,
    },

    /// Failure while rendering the template
    #[error("failed to execute template '{template}': {error}")]
    TemplateExecution {
        template: String,
        source_text: String,
        #[source]
        error: ExecError,
    },

    /// Rendered text is not a valid configuration
    #[error("failed to decode configuration rendered from '{template}': {error}")]
    ConfigurationDecode {
        template: String,
        rendered: String,
        #[source]
        error: DecodeError,
    },
}

fn format_parse_errors(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ProviderError {
    /// Format the error with the offending source highlighted where a
    /// location is known
    pub fn format(&self) -> String {
        match self {
            ProviderError::TemplateSourceUnavailable { .. } => self.to_string(),
            ProviderError::TemplateParse {
                template,
                source_text,
                errors,
            } => errors
                .iter()
                .map(|e| e.format(source_text, template))
                .collect::<Vec<_>>()
                .join("\n"),
            ProviderError::TemplateExecution {
                template,
                source_text,
                error,
            } => report(
                source_text,
                template,
                &error.span,
                &self.to_string(),
                &error.message,
            ),
            ProviderError::ConfigurationDecode {
                template,
                rendered,
                error,
            } => match &error.span {
                Some(span) => report(
                    rendered,
                    &format!("{} (rendered)", template),
                    span,
                    &self.to_string(),
                    &error.message,
                ),
                None => self.to_string(),
            },
        }
    }
}

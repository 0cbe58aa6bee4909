//! Lexer for configuration templates
//!
//! Template text is split on `{{ ... }}` delimiters by hand; the inside of
//! each action is tokenized with logos.

use logos::Logos;

use crate::error::ParseError;
use crate::template::ast::Span;

pub const LEFT_DELIM: &str = "{{";
pub const RIGHT_DELIM: &str = "}}";

/// Tokens recognized inside an action
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum ActionToken {
    #[token("}}")]
    RightDelim,
    // Trim marker: the dash must be preceded by whitespace
    #[regex(r"[ \t\r\n]+-\}\}")]
    RightDelimTrim,

    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("end")]
    End,
    #[token("range")]
    Range,
    #[token("with")]
    With,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("nil")]
    Nil,

    #[token("|")]
    Pipe,
    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token(":=")]
    Declare,
    #[token("=")]
    Assign,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,

    #[regex(r"(\.[a-zA-Z_][a-zA-Z0-9_]*)+", |lex| field_chain(lex.slice()))]
    Field(Vec<String>),

    #[regex(r"\$[a-zA-Z0-9_]*(\.[a-zA-Z_][a-zA-Z0-9_]*)*", |lex| variable(lex.slice()))]
    Variable((String, Vec<String>)),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string(), priority = 1)]
    Ident(String),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unquote(lex.slice()))]
    #[regex(r"`[^`]*`", |lex| { let s = lex.slice(); s[1..s.len() - 1].to_string() })]
    String(String),

    #[regex(r"-?[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r"-?[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),
}

/// Tokens fed to the template grammar
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Literal text between actions
    Text(String),
    LeftDelim,
    RightDelim,

    If,
    Else,
    End,
    Range,
    With,
    True,
    False,
    Nil,

    Pipe,
    ParenOpen,
    ParenClose,
    Declare,
    Assign,
    Comma,
    Dot,

    /// `.A.B` chain evaluated against dot
    Field(Vec<String>),
    /// `.A.B` directly following `)`, applied to the parenthesized value
    ChainedField(Vec<String>),
    /// `$name.A.B`, name includes the leading `$`
    Variable(String, Vec<String>),
    Ident(String),
    String(String),
    Int(i64),
    Float(f64),
}

impl From<ActionToken> for Token {
    fn from(tok: ActionToken) -> Self {
        match tok {
            ActionToken::RightDelim | ActionToken::RightDelimTrim => Token::RightDelim,
            ActionToken::If => Token::If,
            ActionToken::Else => Token::Else,
            ActionToken::End => Token::End,
            ActionToken::Range => Token::Range,
            ActionToken::With => Token::With,
            ActionToken::True => Token::True,
            ActionToken::False => Token::False,
            ActionToken::Nil => Token::Nil,
            ActionToken::Pipe => Token::Pipe,
            ActionToken::ParenOpen => Token::ParenOpen,
            ActionToken::ParenClose => Token::ParenClose,
            ActionToken::Declare => Token::Declare,
            ActionToken::Assign => Token::Assign,
            ActionToken::Comma => Token::Comma,
            ActionToken::Dot => Token::Dot,
            ActionToken::Field(chain) => Token::Field(chain),
            ActionToken::Variable((name, fields)) => Token::Variable(name, fields),
            ActionToken::Ident(s) => Token::Ident(s),
            ActionToken::String(s) => Token::String(s),
            ActionToken::Int(n) => Token::Int(n),
            ActionToken::Float(n) => Token::Float(n),
        }
    }
}

fn field_chain(slice: &str) -> Vec<String> {
    slice[1..].split('.').map(String::from).collect()
}

fn variable(slice: &str) -> (String, Vec<String>) {
    let mut parts = slice.split('.');
    let name = parts.next().unwrap_or("$").to_string();
    (name, parts.map(String::from).collect())
}

/// Strip quotes and resolve escape sequences of a double-quoted literal
fn unquote(slice: &str) -> Option<String> {
    let inner = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            '\'' => out.push('\''),
            'u' => {
                let hex: String = chars.by_ref().take(4).collect();
                let code = u32::from_str_radix(&hex, 16).ok()?;
                out.push(char::from_u32(code)?);
            }
            _ => return None,
        }
    }
    Some(out)
}

fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn push_text(
    tokens: &mut Vec<(Token, Span)>,
    text: &str,
    offset: usize,
    trim_start: bool,
    trim_end: bool,
) {
    let mut start = offset;
    let mut text = text;
    if trim_start {
        let trimmed = text.trim_start_matches(is_space);
        start += text.len() - trimmed.len();
        text = trimmed;
    }
    if trim_end {
        text = text.trim_end_matches(is_space);
    }
    if !text.is_empty() {
        tokens.push((Token::Text(text.to_string()), start..start + text.len()));
    }
}

/// Lex a whole template into text and action tokens with absolute spans
pub fn lex(source: &str) -> Result<Vec<(Token, Span)>, Vec<ParseError>> {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let mut pos = 0;
    let mut trim_next = false;

    while pos < source.len() {
        let Some(rel) = source[pos..].find(LEFT_DELIM) else {
            push_text(&mut tokens, &source[pos..], pos, trim_next, false);
            break;
        };
        let open = pos + rel;
        let mut inner = open + LEFT_DELIM.len();
        let rest = &source[inner..];
        let trim_left = rest.starts_with('-') && rest[1..].starts_with(is_space);
        if trim_left {
            inner += 1;
        }
        push_text(&mut tokens, &source[pos..open], pos, trim_next, trim_left);
        trim_next = false;

        let body = &source[inner..];
        let comment_start = inner + (body.len() - body.trim_start_matches(is_space).len());
        if source[comment_start..].starts_with("/*") {
            match lex_comment(source, open, comment_start) {
                Ok((next, trim)) => {
                    pos = next;
                    trim_next = trim;
                }
                Err(err) => {
                    errors.push(err);
                    break;
                }
            }
            continue;
        }

        tokens.push((Token::LeftDelim, open..inner));
        let mut closed = false;
        for (result, span) in ActionToken::lexer(&source[inner..]).spanned() {
            let span = inner + span.start..inner + span.end;
            match result {
                Ok(tok @ (ActionToken::RightDelim | ActionToken::RightDelimTrim)) => {
                    trim_next = tok == ActionToken::RightDelimTrim;
                    tokens.push((Token::RightDelim, span.end - RIGHT_DELIM.len()..span.end));
                    pos = span.end;
                    closed = true;
                    break;
                }
                Ok(ActionToken::Field(chain)) => {
                    let follows_paren = matches!(
                        tokens.last(),
                        Some((Token::ParenClose, prev)) if prev.end == span.start
                    );
                    let tok = if follows_paren {
                        Token::ChainedField(chain)
                    } else {
                        Token::Field(chain)
                    };
                    tokens.push((tok, span));
                }
                Ok(tok) => tokens.push((tok.into(), span)),
                Err(()) => errors.push(ParseError::Syntax {
                    message: format!("unexpected character in action: '{}'", &source[span.clone()]),
                    span,
                    expected: vec![],
                }),
            }
        }

        if !closed {
            errors.push(ParseError::Syntax {
                span: open..source.len(),
                message: "unclosed action".to_string(),
                expected: vec![RIGHT_DELIM.to_string()],
            });
            break;
        }
    }

    if errors.is_empty() {
        Ok(tokens)
    } else {
        Err(errors)
    }
}

/// Skip a `{{/* ... */}}` comment, returning the position after it and
/// whether the following text must be left-trimmed
fn lex_comment(source: &str, open: usize, start: usize) -> Result<(usize, bool), ParseError> {
    let unclosed = || ParseError::Syntax {
        span: open..source.len(),
        message: "unclosed comment".to_string(),
        expected: vec!["*/".to_string()],
    };

    let end = source[start + 2..]
        .find("*/")
        .map(|rel| start + 2 + rel + 2)
        .ok_or_else(unclosed)?;

    let rest = &source[end..];
    if rest.starts_with(RIGHT_DELIM) {
        return Ok((end + RIGHT_DELIM.len(), false));
    }
    let trimmed = rest.trim_start_matches(is_space);
    if trimmed.len() < rest.len() && trimmed.starts_with("-}}") {
        let next = end + (rest.len() - trimmed.len()) + 3;
        return Ok((next, true));
    }

    Err(ParseError::Syntax {
        span: open..end,
        message: "comment ends before closing delimiter".to_string(),
        expected: vec![RIGHT_DELIM.to_string()],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<Token> {
        lex(source)
            .expect("Should lex")
            .into_iter()
            .map(|(t, _)| t)
            .collect()
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(kinds("hello"), vec![Token::Text("hello".to_string())]);
        assert_eq!(kinds(""), vec![]);
    }

    #[test]
    fn test_action_tokens() {
        assert_eq!(
            kinds(r#"a{{normalize .Name | printf "%s"}}b"#),
            vec![
                Token::Text("a".to_string()),
                Token::LeftDelim,
                Token::Ident("normalize".to_string()),
                Token::Field(vec!["Name".to_string()]),
                Token::Pipe,
                Token::Ident("printf".to_string()),
                Token::String("%s".to_string()),
                Token::RightDelim,
                Token::Text("b".to_string()),
            ]
        );
    }

    #[test]
    fn test_keywords_and_variables() {
        assert_eq!(
            kinds("{{range $i, $e := .Items}}{{end}}"),
            vec![
                Token::LeftDelim,
                Token::Range,
                Token::Variable("$i".to_string(), vec![]),
                Token::Comma,
                Token::Variable("$e".to_string(), vec![]),
                Token::Declare,
                Token::Field(vec!["Items".to_string()]),
                Token::RightDelim,
                Token::LeftDelim,
                Token::End,
                Token::RightDelim,
            ]
        );
    }

    #[test]
    fn test_field_chains_and_dot() {
        assert_eq!(
            kinds("{{. .A.b $.C $x.D.e}}"),
            vec![
                Token::LeftDelim,
                Token::Dot,
                Token::Field(vec!["A".to_string(), "b".to_string()]),
                Token::Variable("$".to_string(), vec!["C".to_string()]),
                Token::Variable("$x".to_string(), vec!["D".to_string(), "e".to_string()]),
                Token::RightDelim,
            ]
        );
    }

    #[test]
    fn test_chained_field_only_when_adjacent_to_paren() {
        assert_eq!(
            kinds("{{(index . 0).Name (len .) .Other}}"),
            vec![
                Token::LeftDelim,
                Token::ParenOpen,
                Token::Ident("index".to_string()),
                Token::Dot,
                Token::Int(0),
                Token::ParenClose,
                Token::ChainedField(vec!["Name".to_string()]),
                Token::ParenOpen,
                Token::Ident("len".to_string()),
                Token::Dot,
                Token::ParenClose,
                Token::Field(vec!["Other".to_string()]),
                Token::RightDelim,
            ]
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            kinds(r#"{{"a\"b\n" `raw\n` 42 -7 1.5 true false nil}}"#),
            vec![
                Token::LeftDelim,
                Token::String("a\"b\n".to_string()),
                Token::String("raw\\n".to_string()),
                Token::Int(42),
                Token::Int(-7),
                Token::Float(1.5),
                Token::True,
                Token::False,
                Token::Nil,
                Token::RightDelim,
            ]
        );
    }

    #[test]
    fn test_trim_markers() {
        assert_eq!(
            kinds("a  \n{{- .X -}}\n  b"),
            vec![
                Token::Text("a".to_string()),
                Token::LeftDelim,
                Token::Field(vec!["X".to_string()]),
                Token::RightDelim,
                Token::Text("b".to_string()),
            ]
        );
    }

    #[test]
    fn test_dash_without_space_is_a_number() {
        assert_eq!(
            kinds("{{-3}}"),
            vec![Token::LeftDelim, Token::Int(-3), Token::RightDelim]
        );
    }

    #[test]
    fn test_comments_skipped() {
        assert_eq!(
            kinds("a{{/* note */}}b"),
            vec![Token::Text("a".to_string()), Token::Text("b".to_string())]
        );
        assert_eq!(
            kinds("a \n{{- /* note */ -}}\n b"),
            vec![Token::Text("a".to_string()), Token::Text("b".to_string())]
        );
    }

    #[test]
    fn test_spans_are_absolute() {
        let tokens = lex("ab{{.X}}").expect("Should lex");
        assert_eq!(tokens[0].1, 0..2);
        assert_eq!(tokens[1].1, 2..4);
        assert_eq!(tokens[2].1, 4..6);
        assert_eq!(tokens[3].1, 6..8);
    }

    #[test]
    fn test_unclosed_action_is_error() {
        let errors = lex("a {{ .X ").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("unclosed action"));
    }

    #[test]
    fn test_unclosed_comment_is_error() {
        let errors = lex("{{/* never closed").unwrap_err();
        assert!(errors[0].to_string().contains("unclosed comment"));
    }

    #[test]
    fn test_unexpected_character_is_error() {
        let errors = lex("{{ # }}").unwrap_err();
        assert!(errors[0].to_string().contains("unexpected character"));
    }
}

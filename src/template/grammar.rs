//! Template parser implementation using chumsky

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::error::ParseError;
use crate::template::ast::*;
use crate::template::lexer::{self, Token};

/// Parse template source into a list of nodes
pub fn parse(source: &str) -> Result<Vec<Spanned<Node>>, Vec<ParseError>> {
    let len = source.len();

    let tokens = lexer::lex(source)?;
    let token_iter = tokens.into_iter().map(|(tok, span)| (tok, span.into()));

    // Turn the token iterator into a stream that chumsky can use
    let token_stream = Stream::from_iter(token_iter)
        // Split (Token, SimpleSpan) into token and span parts
        .map((len..len).into(), |(t, s): (_, _)| (t, s));

    template_parser()
        .parse(token_stream)
        .into_result()
        .map_err(|errs| errs.into_iter().map(|e| e.into()).collect())
}

/// Helper to extract span range from chumsky's MapExtra
fn span_range(e: &impl chumsky::span::Span<Offset = usize>) -> Span {
    e.start()..e.end()
}

/// Reject bindings a given action kind cannot carry
fn check_binding<'a>(
    pipeline: Spanned<Pipeline>,
    span: SimpleSpan,
    max_vars: usize,
    allow_assign: bool,
) -> Result<Spanned<Pipeline>, Rich<'a, Token>> {
    match &pipeline.node.binding {
        Some(Binding::Declare(vars)) if vars.len() > max_vars => Err(Rich::custom(
            span,
            format!("too many declarations in pipeline: {}", vars.join(", ")),
        )),
        Some(Binding::Assign(var)) if !allow_assign => Err(Rich::custom(
            span,
            format!("cannot assign to {} here, use ':='", var),
        )),
        _ => Ok(pipeline),
    }
}

/// Fold `else if` arms into nested `If` nodes
fn chain_else_ifs(
    pipeline: Spanned<Pipeline>,
    body: Vec<Spanned<Node>>,
    else_ifs: Vec<(Spanned<Pipeline>, Vec<Spanned<Node>>, Span)>,
    else_body: Option<Vec<Spanned<Node>>>,
) -> Branch {
    let mut tail = else_body;
    for (pipeline, body, span) in else_ifs.into_iter().rev() {
        let branch = Branch {
            pipeline,
            body,
            else_body: tail,
        };
        tail = Some(vec![Spanned::new(Node::If(branch), span)]);
    }
    Branch {
        pipeline,
        body,
        else_body: tail,
    }
}

fn pipeline_parser<'a, I>(
) -> impl Parser<'a, I, Spanned<Pipeline>, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let commands = recursive(|commands| {
        // (pipeline) with an optional field chain glued to the closing paren
        let nested = commands
            .delimited_by(just(Token::ParenOpen), just(Token::ParenClose))
            .then(select! { Token::ChainedField(f) => f }.or_not())
            .map(
                |(commands, fields): (Vec<Spanned<Command>>, Option<Vec<String>>)| {
                    Operand::Nested {
                        pipeline: Box::new(Pipeline {
                            binding: None,
                            commands,
                        }),
                        fields: fields.unwrap_or_default(),
                    }
                },
            );

        let operand = choice((
            just(Token::Dot).to(Operand::Dot),
            select! {
                Token::Field(f) => Operand::Field(f),
                Token::Variable(name, fields) => Operand::Variable { name, fields },
                Token::Ident(name) => Operand::Function(name),
                Token::String(s) => Operand::String(s),
                Token::Int(n) => Operand::Int(n),
                Token::Float(n) => Operand::Float(n),
                Token::True => Operand::Bool(true),
                Token::False => Operand::Bool(false),
                Token::Nil => Operand::Nil,
            },
            nested,
        ))
        .map_with(|op, e| Spanned::new(op, span_range(&e.span())));

        let command = operand
            .repeated()
            .at_least(1)
            .collect::<Vec<_>>()
            .map_with(|args, e| Spanned::new(Command { args }, span_range(&e.span())));

        command
            .separated_by(just(Token::Pipe))
            .at_least(1)
            .collect::<Vec<_>>()
            .boxed()
    });

    let variable = select! {
        Token::Variable(name, fields) if fields.is_empty() => name,
    };

    // $x := ... / $k, $v := ... / $x = ...
    let binding = variable
        .clone()
        .then(just(Token::Comma).ignore_then(variable).or_not())
        .then(choice((
            just(Token::Declare).to(true),
            just(Token::Assign).to(false),
        )))
        .try_map(|((first, second), declare), span| match (second, declare) {
            (None, true) => Ok(Binding::Declare(vec![first])),
            (None, false) => Ok(Binding::Assign(first)),
            (Some(second), true) => Ok(Binding::Declare(vec![first, second])),
            (Some(_), false) => Err(Rich::custom(span, "cannot assign to two variables at once")),
        });

    binding
        .or_not()
        .then(commands)
        .map_with(|(binding, commands), e| {
            Spanned::new(Pipeline { binding, commands }, span_range(&e.span()))
        })
}

fn template_parser<'a, I>(
) -> impl Parser<'a, I, Vec<Spanned<Node>>, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let pipeline = pipeline_parser();
    let open = just(Token::LeftDelim);
    let close = just(Token::RightDelim);

    let end_action = open
        .clone()
        .then(just(Token::End))
        .then(close.clone())
        .ignored();
    let else_action = open
        .clone()
        .then(just(Token::Else))
        .then(close.clone())
        .ignored();

    let nodes = recursive(|nodes| {
        let text = select! { Token::Text(s) => Node::Text(s) };

        let action = open
            .clone()
            .ignore_then(pipeline.clone())
            .then_ignore(close.clone())
            .try_map(|p, span| check_binding(p, span, 1, true))
            .map(|p| Node::Action(p.node));

        let else_body = else_action.clone().ignore_then(nodes.clone()).or_not();

        // {{else if p}} body
        let else_if = open
            .clone()
            .then(just(Token::Else))
            .then(just(Token::If))
            .ignore_then(pipeline.clone())
            .then_ignore(close.clone())
            .try_map(|p, span| check_binding(p, span, 1, true))
            .then(nodes.clone())
            .map_with(|(p, body), e| (p, body, span_range(&e.span())));

        let if_node = open
            .clone()
            .then(just(Token::If))
            .ignore_then(pipeline.clone())
            .then_ignore(close.clone())
            .try_map(|p, span| check_binding(p, span, 1, true))
            .then(nodes.clone())
            .then(else_if.repeated().collect::<Vec<_>>())
            .then(else_body.clone())
            .then_ignore(end_action.clone())
            .map(|(((pipeline, body), else_ifs), else_body)| {
                Node::If(chain_else_ifs(pipeline, body, else_ifs, else_body))
            });

        let with_node = open
            .clone()
            .then(just(Token::With))
            .ignore_then(pipeline.clone())
            .then_ignore(close.clone())
            .try_map(|p, span| check_binding(p, span, 1, true))
            .then(nodes.clone())
            .then(else_body.clone())
            .then_ignore(end_action.clone())
            .map(|((pipeline, body), else_body)| {
                Node::With(Branch {
                    pipeline,
                    body,
                    else_body,
                })
            });

        let range_node = open
            .clone()
            .then(just(Token::Range))
            .ignore_then(pipeline.clone())
            .then_ignore(close.clone())
            .try_map(|p, span| check_binding(p, span, 2, false))
            .then(nodes.clone())
            .then(else_body)
            .then_ignore(end_action.clone())
            .map(|((pipeline, body), else_body)| {
                Node::Range(Branch {
                    pipeline,
                    body,
                    else_body,
                })
            });

        choice((text, if_node, with_node, range_node, action))
            .map_with(|n, e| Spanned::new(n, span_range(&e.span())))
            .repeated()
            .collect::<Vec<_>>()
            .boxed()
    });

    nodes.then_ignore(end())
}

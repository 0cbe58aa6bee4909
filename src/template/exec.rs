//! Tree-walking executor for parsed templates

use serde_json::Value;
use thiserror::Error;

use crate::funcs::FuncMap;
use crate::template::ast::*;
use crate::template::value::{is_truthy, print_entry, print_value, type_name};

/// Runtime failure while rendering a template
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ExecError {
    /// Location of the failing operand, command or block in the source
    pub span: Span,
    pub message: String,
}

impl ExecError {
    pub fn new(span: &Span, message: impl Into<String>) -> Self {
        Self {
            span: span.clone(),
            message: message.into(),
        }
    }
}

/// Result of evaluating an operand or pipeline.
///
/// `None` is a missing map entry. It prints as `<no value>`, is false, and
/// reaches functions as null.
type Entry = Option<Value>;

/// Execution state for a single render
pub(crate) struct State<'a> {
    funcs: &'a FuncMap,
    vars: Vec<(String, Entry)>,
    out: String,
}

impl<'a> State<'a> {
    pub(crate) fn new(funcs: &'a FuncMap, data: &Value) -> Self {
        Self {
            funcs,
            vars: vec![("$".to_string(), Some(data.clone()))],
            out: String::new(),
        }
    }

    pub(crate) fn finish(self) -> String {
        self.out
    }

    pub(crate) fn walk(&mut self, dot: &Value, nodes: &[Spanned<Node>]) -> Result<(), ExecError> {
        for node in nodes {
            match &node.node {
                Node::Text(text) => self.out.push_str(text),
                Node::Action(pipeline) => {
                    let value = self.eval_pipeline(dot, pipeline, &node.span)?;
                    if pipeline.binding.is_none() {
                        self.out.push_str(&print_entry(value.as_ref()));
                    }
                }
                Node::If(branch) => self.walk_if(dot, branch)?,
                Node::With(branch) => self.walk_with(dot, branch)?,
                Node::Range(branch) => self.walk_range(dot, branch, &node.span)?,
            }
        }
        Ok(())
    }

    /// Run `nodes` in a nested variable scope
    fn walk_scoped(&mut self, dot: &Value, nodes: &[Spanned<Node>]) -> Result<(), ExecError> {
        let mark = self.vars.len();
        let result = self.walk(dot, nodes);
        self.vars.truncate(mark);
        result
    }

    fn walk_if(&mut self, dot: &Value, branch: &Branch) -> Result<(), ExecError> {
        let mark = self.vars.len();
        let result = self
            .eval_pipeline(dot, &branch.pipeline.node, &branch.pipeline.span)
            .and_then(|cond| {
                if cond.as_ref().is_some_and(is_truthy) {
                    self.walk_scoped(dot, &branch.body)
                } else if let Some(else_body) = &branch.else_body {
                    self.walk_scoped(dot, else_body)
                } else {
                    Ok(())
                }
            });
        self.vars.truncate(mark);
        result
    }

    fn walk_with(&mut self, dot: &Value, branch: &Branch) -> Result<(), ExecError> {
        let mark = self.vars.len();
        let result = self
            .eval_pipeline(dot, &branch.pipeline.node, &branch.pipeline.span)
            .and_then(|value| match value {
                Some(value) if is_truthy(&value) => self.walk_scoped(&value, &branch.body),
                _ => {
                    if let Some(else_body) = &branch.else_body {
                        self.walk_scoped(dot, else_body)
                    } else {
                        Ok(())
                    }
                }
            });
        self.vars.truncate(mark);
        result
    }

    fn walk_range(&mut self, dot: &Value, branch: &Branch, span: &Span) -> Result<(), ExecError> {
        let pipeline = &branch.pipeline.node;
        let value = self.eval_commands(dot, &pipeline.commands)?;

        let items: Vec<(Value, Value)> = match value.unwrap_or(Value::Null) {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| (Value::from(i), item))
                .collect(),
            Value::Object(map) => {
                let mut entries: Vec<(String, Value)> = map.into_iter().collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                entries
                    .into_iter()
                    .map(|(k, v)| (Value::String(k), v))
                    .collect()
            }
            Value::Null => Vec::new(),
            other => {
                return Err(ExecError::new(
                    span,
                    format!("range can't iterate over {}", print_value(&other)),
                ))
            }
        };

        if items.is_empty() {
            if let Some(else_body) = &branch.else_body {
                self.walk_scoped(dot, else_body)?;
            }
            return Ok(());
        }

        let names: &[String] = match &pipeline.binding {
            Some(Binding::Declare(names)) => names,
            _ => &[],
        };

        for (key, item) in items {
            let mark = self.vars.len();
            match names {
                [value_var] => self.vars.push((value_var.clone(), Some(item.clone()))),
                [key_var, value_var] => {
                    self.vars.push((key_var.clone(), Some(key)));
                    self.vars.push((value_var.clone(), Some(item.clone())));
                }
                _ => {}
            }
            let result = self.walk(&item, &branch.body);
            self.vars.truncate(mark);
            result?;
        }
        Ok(())
    }

    fn eval_pipeline(
        &mut self,
        dot: &Value,
        pipeline: &Pipeline,
        span: &Span,
    ) -> Result<Entry, ExecError> {
        let value = self.eval_commands(dot, &pipeline.commands)?;
        match &pipeline.binding {
            None => {}
            Some(Binding::Declare(names)) => {
                for name in names {
                    self.vars.push((name.clone(), value.clone()));
                }
            }
            Some(Binding::Assign(name)) => match self.vars.iter_mut().rev().find(|(n, _)| n == name) {
                Some(slot) => slot.1 = value.clone(),
                None => {
                    return Err(ExecError::new(span, format!("undefined variable: {}", name)))
                }
            },
        }
        Ok(value)
    }

    fn eval_commands(
        &mut self,
        dot: &Value,
        commands: &[Spanned<Command>],
    ) -> Result<Entry, ExecError> {
        let mut piped: Option<Entry> = None;
        for command in commands {
            piped = Some(self.eval_command(dot, command, piped)?);
        }
        Ok(piped.flatten())
    }

    fn eval_command(
        &mut self,
        dot: &Value,
        command: &Spanned<Command>,
        piped: Option<Entry>,
    ) -> Result<Entry, ExecError> {
        let args = &command.node.args;
        let Some(head) = args.first() else {
            return Err(ExecError::new(&command.span, "empty command"));
        };

        if let Operand::Function(name) = &head.node {
            let mut values = Vec::with_capacity(args.len());
            for arg in &args[1..] {
                values.push(self.eval_operand(dot, arg)?.unwrap_or(Value::Null));
            }
            if let Some(piped) = piped {
                values.push(piped.unwrap_or(Value::Null));
            }
            return self.call(name, &values, &head.span).map(Some);
        }

        if args.len() > 1 || piped.is_some() {
            return Err(ExecError::new(
                &command.span,
                "can't give argument to non-function",
            ));
        }
        self.eval_operand(dot, head)
    }

    fn call(&self, name: &str, args: &[Value], span: &Span) -> Result<Value, ExecError> {
        let func = self
            .funcs
            .get(name)
            .ok_or_else(|| ExecError::new(span, format!("function \"{}\" not defined", name)))?;
        (**func)(args).map_err(|err| ExecError::new(span, format!("error calling {}: {}", name, err)))
    }

    fn eval_operand(&mut self, dot: &Value, operand: &Spanned<Operand>) -> Result<Entry, ExecError> {
        let span = &operand.span;
        match &operand.node {
            Operand::Dot => Ok(Some(dot.clone())),
            Operand::Field(fields) => walk_fields(Some(dot.clone()), fields, span),
            Operand::Variable { name, fields } => {
                let value = self
                    .vars
                    .iter()
                    .rev()
                    .find(|(n, _)| n == name)
                    .map(|(_, v)| v.clone())
                    .ok_or_else(|| ExecError::new(span, format!("undefined variable: {}", name)))?;
                walk_fields(value, fields, span)
            }
            Operand::Function(name) => self.call(name, &[], span).map(Some),
            Operand::String(s) => Ok(Some(Value::String(s.clone()))),
            Operand::Int(n) => Ok(Some(Value::from(*n))),
            Operand::Float(n) => Ok(Some(Value::from(*n))),
            Operand::Bool(b) => Ok(Some(Value::Bool(*b))),
            Operand::Nil => Ok(Some(Value::Null)),
            Operand::Nested { pipeline, fields } => {
                let value = self.eval_commands(dot, &pipeline.commands)?;
                walk_fields(value, fields, span)
            }
        }
    }
}

/// Follow a chain of field names into `value`.
///
/// A missing key of an object is a missing entry, and every field of a
/// missing entry is missing too. A field of null or of a non-object is an
/// error.
fn walk_fields(mut value: Entry, fields: &[String], span: &Span) -> Result<Entry, ExecError> {
    for field in fields {
        value = match value {
            None => return Ok(None),
            Some(Value::Object(mut map)) => map.remove(field),
            Some(Value::Null) => {
                return Err(ExecError::new(
                    span,
                    format!("nil pointer evaluating field {}", field),
                ))
            }
            Some(other) => {
                return Err(ExecError::new(
                    span,
                    format!("can't evaluate field {} in type {}", field, type_name(&other)),
                ))
            }
        };
    }
    Ok(value)
}

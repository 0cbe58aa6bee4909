//! Syntax tree for configuration templates

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// AST node with source location
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

/// A node of the template body
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal text copied to the output
    Text(String),
    /// `{{pipeline}}`, printed unless it is a declaration or assignment
    Action(Pipeline),
    /// `{{if p}} ... {{else if p}} ... {{else}} ... {{end}}`
    If(Branch),
    /// `{{with p}} ... {{else}} ... {{end}}`
    With(Branch),
    /// `{{range p}} ... {{else}} ... {{end}}`
    Range(Branch),
}

/// Condition pipeline with the body to run when it holds, and the one to
/// run otherwise. `else if` chains nest as a single `If` in `else_body`.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub pipeline: Spanned<Pipeline>,
    pub body: Vec<Spanned<Node>>,
    pub else_body: Option<Vec<Spanned<Node>>>,
}

/// Variables bound by a pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// `$x := ...`, or `$k, $v := ...` in a range
    Declare(Vec<String>),
    /// `$x = ...`
    Assign(String),
}

/// Commands chained with `|`, optionally bound to variables
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub binding: Option<Binding>,
    pub commands: Vec<Spanned<Command>>,
}

/// A function call or a single operand
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub args: Vec<Spanned<Operand>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// `.`
    Dot,
    /// `.A.B`
    Field(Vec<String>),
    /// `$x.A.B`
    Variable { name: String, fields: Vec<String> },
    /// Name of a function in the namespace
    Function(String),
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Nil,
    /// `(pipeline).A.B`
    Nested {
        pipeline: Box<Pipeline>,
        fields: Vec<String>,
    },
}

impl Pipeline {
    /// Visit every function operand of this pipeline, nested ones included
    pub fn visit_functions<'a>(&'a self, visit: &mut dyn FnMut(&'a str, &'a Span)) {
        for command in &self.commands {
            for arg in &command.node.args {
                match &arg.node {
                    Operand::Function(name) => visit(name, &arg.span),
                    Operand::Nested { pipeline, .. } => pipeline.visit_functions(visit),
                    _ => {}
                }
            }
        }
    }
}

/// Visit every function operand referenced by a list of nodes
pub fn visit_functions<'a>(nodes: &'a [Spanned<Node>], visit: &mut dyn FnMut(&'a str, &'a Span)) {
    for node in nodes {
        match &node.node {
            Node::Text(_) => {}
            Node::Action(pipeline) => pipeline.visit_functions(visit),
            Node::If(branch) | Node::With(branch) | Node::Range(branch) => {
                branch.pipeline.node.visit_functions(visit);
                visit_functions(&branch.body, visit);
                if let Some(else_body) = &branch.else_body {
                    visit_functions(else_body, visit);
                }
            }
        }
    }
}

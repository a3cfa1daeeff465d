use std::fmt;

use ns_common::source::Source;
use ns_common::span::Span;
use ns_parser::{NodeId, ParseTree};

use crate::value::Value;

/// A fatal runtime error with the source location it arose at.
///
/// Errors surfaced while loading a module carry that module's source, so
/// diagnostics always render against the right file. `label` is the
/// heading used when rendering ("Runtime Error", or "Syntax error" for a
/// parse failure inside an imported module).
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub label: &'static str,
    pub message: String,
    pub span: Span,
    /// 0-based line.
    pub line: u32,
    /// 0-based column.
    pub column: u32,
    pub source: Source,
}

impl RuntimeError {
    pub fn at_node(message: impl Into<String>, tree: &ParseTree, node: NodeId) -> Self {
        let token = tree.token_of(node);
        Self {
            label: "Runtime Error",
            message: message.into(),
            span: token.span,
            line: token.line,
            column: token.column,
            source: tree.tokens.source.clone(),
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}:{}:{})",
            self.message,
            self.source.name,
            self.line + 1,
            self.column + 1
        )
    }
}

impl std::error::Error for RuntimeError {}

/// How evaluation of a node finished.
///
/// `Return`/`Break`/`Continue` are non-local unwinds threaded through
/// every executor's result; calls catch `Return`, loops catch the other
/// two, and anything escaping the program root is an error.
pub enum Flow {
    Value(Value),
    Return(Value),
    Break(Value),
    Continue(Value),
}

pub(crate) type Exec = Result<Flow, RuntimeError>;

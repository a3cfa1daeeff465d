use std::fmt;

use ns_common::diag::TraceFrame;
use ns_common::span::Span;
use ns_common::token::{Token, TokenKind};

/// A parse (syntax) error: message, location and the chain of open
/// constructs the parser was inside when it failed.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
    /// 0-based line of the offending token.
    pub line: u32,
    /// 0-based column of the offending token.
    pub column: u32,
    /// Enclosing constructs, innermost first. Filled by the driver.
    pub trace: Vec<TraceFrame>,
}

impl ParseError {
    pub fn from_token(message: impl Into<String>, token: &Token) -> Self {
        let span = if token.kind == TokenKind::Eof {
            Span::new(token.span.start, token.span.start + 1)
        } else {
            token.span
        };
        Self {
            message: message.into(),
            span,
            line: token.line,
            column: token.column,
            trace: Vec::new(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.message, self.line + 1, self.column + 1)
    }
}

impl std::error::Error for ParseError {}

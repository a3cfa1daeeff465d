//! Feeder-driven parser for NS.
//!
//! The parser is a single-pass, one-token-at-a-time engine. Every open
//! syntactic construct is an active *feeder*: a small state machine that
//! receives successive tokens. The driver keeps the feeders on an explicit
//! stack; the top of the stack is the construct currently consuming input.
//!
//! A feeder reacts to a token by staying put, spawning a child feeder
//! (which becomes the new top), or finishing. The standard hand-off move
//! is to spawn or finish *and* retreat the cursor by one, so the next
//! iteration re-feeds the same token to the new top -- this is how a child
//! construct sees its own first token and how a closing token is offered
//! back to the parent.
//!
//! Bracket pairing is tracked separately on an enclosure stack: opening
//! tokens push the expected closer, closing tokens must match the top.
//! Whatever remains open at end of input is reported at its opener.

pub(crate) mod expressions;
pub(crate) mod statements;

use ns_common::diag::TraceFrame;
use ns_common::token::{Token, TokenKind, TokenStream};

use crate::ast::{Ast, NodeId, NodeKind};
use crate::error::ParseError;
use crate::ParseTree;
use statements::{BlockFeeder, BlockRole};

/// What a feeder wants the driver to do after a token.
pub(crate) enum Step {
    /// Keep feeding this feeder.
    Stay,
    /// Push a child feeder; it receives the following tokens.
    Child(Box<dyn Feeder>),
    /// This construct is complete; pop it.
    Done,
}

/// An active parser construct consuming one token at a time.
pub(crate) trait Feeder {
    fn feed(&mut self, token: &Token, idx: u32, ctx: &mut ParseCtx) -> Result<Step, ParseError>;

    /// The arena node this feeder is building (for traces).
    fn node(&self) -> NodeId;

    /// Kind name reported in error traces.
    fn label(&self) -> &'static str;
}

/// A currently open bracket: the opening token and the expected closer.
pub(crate) struct Enclosure {
    pub start: u32,
    pub end: &'static str,
}

/// Mutable parser state handed to feeders along with each token.
pub(crate) struct ParseCtx<'a> {
    pub tokens: &'a mut TokenStream,
    pub ast: &'a mut Ast,
    pub enclosures: &'a mut Vec<Enclosure>,
    /// Cursor adjustment applied by the driver after this feed
    /// (on top of the regular +1 advance).
    offset: i32,
}

impl<'a> ParseCtx<'a> {
    /// Re-feed the current token to whoever is on top next iteration.
    pub fn retreat(&mut self) {
        self.offset -= 1;
    }

    /// Skip the token after the current one.
    pub fn skip(&mut self) {
        self.offset += 1;
    }

    /// Push an open bracket expecting `end`.
    pub fn open(&mut self, start: u32, end: &'static str) {
        self.enclosures.push(Enclosure { start, end });
    }

    /// Match a closing token against the innermost open bracket.
    pub fn close(&mut self, token: &Token) -> Result<(), ParseError> {
        match self.enclosures.last() {
            Some(enc) if enc.end == token.text => {
                self.enclosures.pop();
                Ok(())
            }
            _ => Err(ParseError::from_token(
                format!("Mismatched `{}`", token.text),
                token,
            )),
        }
    }

    /// Look at a token by absolute index.
    pub fn peek(&self, idx: u32) -> Option<&Token> {
        self.tokens.tokens.get(idx as usize)
    }
}

/// Parse a token stream into an AST.
///
/// The first error aborts the parse; its trace lists every construct that
/// was open at the time, innermost first.
pub fn parse(mut tokens: TokenStream) -> Result<ParseTree, ParseError> {
    let mut ast = Ast::new();
    let root = ast.alloc(NodeKind::Block { children: Vec::new() }, 0, None);
    let mut stack: Vec<Box<dyn Feeder>> =
        vec![Box::new(BlockFeeder::new(root, BlockRole::Root, false, false))];
    let mut enclosures: Vec<Enclosure> = Vec::new();

    let mut pos: i64 = 0;
    while (pos as usize) < tokens.tokens.len() {
        let token = tokens.tokens[pos as usize].clone();
        let mut ctx = ParseCtx {
            tokens: &mut tokens,
            ast: &mut ast,
            enclosures: &mut enclosures,
            offset: 0,
        };
        let top = stack.last_mut().expect("feeder stack never empties");
        let result = top.feed(&token, pos as u32, &mut ctx);
        let offset = ctx.offset;
        let step = match result {
            Ok(step) => step,
            Err(mut err) => {
                // An error on the EOF token with brackets still open is
                // reported at the first unclosed opener instead.
                if token.kind == TokenKind::Eof {
                    if let Some(enc) = enclosures.first() {
                        let opener = &tokens.tokens[enc.start as usize];
                        err = ParseError::from_token(
                            format!("Mismatched `{}`", opener.text),
                            opener,
                        );
                    }
                }
                // Record the chain of open constructs, innermost first.
                // The root block is not part of the trace.
                for feeder in stack[1..].iter().rev() {
                    let opened_at = ast.node(feeder.node()).token as usize;
                    err.trace
                        .push(TraceFrame::new(feeder.label(), &tokens.tokens[opened_at]));
                }
                return Err(err);
            }
        };
        match step {
            Step::Stay => {}
            Step::Child(child) => stack.push(child),
            Step::Done => {
                stack.pop();
            }
        }
        pos += 1 + offset as i64;
    }

    // Anything still open is reported at its first opener.
    if let Some(enc) = enclosures.first() {
        let token = &tokens.tokens[enc.start as usize];
        return Err(ParseError::from_token(
            format!("Mismatched `{}`", token.text),
            token,
        ));
    }
    if stack.len() > 1 {
        let top = stack.last().expect("checked non-empty");
        let token = &tokens.tokens[ast.node(top.node()).token as usize];
        return Err(ParseError::from_token("Unexpected end of input", token));
    }

    Ok(ParseTree { tokens, ast, root })
}

/// True for the identifier-shaped tokens the statement feeders accept as
/// names (the lexer has already classified them).
pub(crate) fn is_ident(token: &Token) -> bool {
    token.kind == TokenKind::Ident
}

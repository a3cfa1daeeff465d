// NS parser -- node-driven, single-pass, one-token-at-a-time parsing.

mod ast;
mod dump;
mod error;
mod parser;

pub use ast::{Ast, EnumMemberForm, LetModifiers, Node, NodeId, NodeKind, Param};
pub use dump::dump;
pub use error::ParseError;
pub use parser::parse;

use ns_common::token::{Token, TokenStream};

/// A successfully parsed program: the token stream it came from, the node
/// arena, and the root block.
#[derive(Debug)]
pub struct ParseTree {
    pub tokens: TokenStream,
    pub ast: Ast,
    pub root: NodeId,
}

impl ParseTree {
    /// The token a node was opened at.
    pub fn token_of(&self, id: NodeId) -> &Token {
        &self.tokens.tokens[self.ast.node(id).token as usize]
    }
}

use serde::Serialize;

use crate::source::Source;
use crate::span::Span;

/// A token produced by the NS lexer.
///
/// Tokens own their text: string literals are canonicalized to a
/// `"..."`-wrapped form with escape sequences already decoded, so the text
/// is not always a verbatim slice of the source. The span still covers the
/// original source range for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub text: String,
    pub kind: TokenKind,
    pub span: Span,
    /// 0-based line of the token's first character.
    pub line: u32,
    /// 0-based column (in chars) of the token's first character.
    pub column: u32,
}

impl Token {
    pub fn new(text: impl Into<String>, kind: TokenKind, span: Span, line: u32, column: u32) -> Self {
        Self { text: text.into(), kind, span, line, column }
    }

    /// The string literal body, without the canonical surrounding quotes.
    ///
    /// Only meaningful for [`TokenKind::Str`] tokens.
    pub fn str_body(&self) -> &str {
        self.text
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or(&self.text)
    }
}

/// Classification of a token, computed once by the lexer.
///
/// NS keywords are not distinguished here; the parser's feeders match on
/// the token text, so `let` and `while` are plain `Ident` tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenKind {
    /// Identifier-shaped lexeme: first char in `[A-Za-z_$]`.
    Ident,
    /// Number literal: every char an ASCII digit.
    Number,
    /// String literal, canonicalized to `"..."`.
    Str,
    /// Operator or punctuator, single- or multi-character.
    Punct,
    /// Lexeme that is neither identifier, number nor operator
    /// (e.g. `1abc`). Rejected by the parser as an unexpected token.
    Unknown,
    /// End-of-file sentinel appended by the lexer.
    Eof,
}

/// The token stream of one source, terminated by an EOF sentinel.
#[derive(Debug, Clone)]
pub struct TokenStream {
    pub source: Source,
    pub tokens: Vec<Token>,
}

impl TokenStream {
    pub fn new(source: Source) -> Self {
        Self { source, tokens: Vec::new() }
    }

    /// Replace the multi-character token at `index` with one token per
    /// character. Used by type-context parsing to read `>>` as two `>`.
    pub fn split_token(&mut self, index: usize) {
        let tok = self.tokens.remove(index);
        let mut replacements = Vec::with_capacity(tok.text.chars().count());
        let mut offset = tok.span.start;
        for (j, ch) in tok.text.chars().enumerate() {
            let len = ch.len_utf8() as u32;
            replacements.push(Token::new(
                ch.to_string(),
                tok.kind,
                Span::new(offset, offset + len),
                tok.line,
                tok.column + j as u32,
            ));
            offset += len;
        }
        self.tokens.splice(index..index, replacements);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn punct(text: &str, start: u32) -> Token {
        let len = text.len() as u32;
        Token::new(text, TokenKind::Punct, Span::new(start, start + len), 0, start)
    }

    #[test]
    fn split_token_one_per_char() {
        let mut stream = TokenStream::new(Source::new("t.ns", ">> x"));
        stream.tokens.push(punct(">>", 0));
        stream.split_token(0);
        assert_eq!(stream.tokens.len(), 2);
        assert_eq!(stream.tokens[0].text, ">");
        assert_eq!(stream.tokens[0].span, Span::new(0, 1));
        assert_eq!(stream.tokens[1].text, ">");
        assert_eq!(stream.tokens[1].span, Span::new(1, 2));
        assert_eq!(stream.tokens[1].column, 1);
    }

    #[test]
    fn str_body_strips_quotes() {
        let tok = Token::new("\"hi\"", TokenKind::Str, Span::new(0, 4), 0, 0);
        assert_eq!(tok.str_body(), "hi");
    }
}

// NS lexer -- character-level state machine producing the token stream.

mod cursor;

use std::fmt;

use cursor::Cursor;
use ns_common::source::Source;
use ns_common::span::Span;
use ns_common::token::{Token, TokenKind, TokenStream};

/// Multi-character operators, matched greedily before the single-character
/// punctuator set. Order matters: longer operators sharing a prefix with a
/// shorter one come first. `//`, `/*` and `*/` live here too so comments
/// win over the single `/` punctuator.
pub const COMPOUND_TOKENS: &[&str] = &[
    "...", ">>=", "<<=", "&&=", "||=", "==", ">=", "<=", "!=", "&&", "||",
    ">>", "<<", "+=", "-=", "*=", "/=", "%=", "^=", "&=", "|=", "++", "--",
    "<>", "<{", "}>", "->", "=>", "::", "//", "/*", "*/",
];

/// Single-character punctuators. Each flushes the pending lexeme and is
/// emitted as its own token.
const PUNCTUATORS: &str = ".,:;/+-*=!?()[]{}<>@#~^&\\|";

/// A lexer error with location information.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub span: Span,
    pub line: u32,
    pub column: u32,
}

/// The specific kind of lexer error.
#[derive(Debug, Clone, PartialEq)]
pub enum LexErrorKind {
    /// A string literal was not closed before end of input.
    UnterminatedString,
    /// A `\x`/`\o`/`\u` escape whose digits do not form a valid code point.
    InvalidEscape(String),
}

impl fmt::Display for LexErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnterminatedString => write!(f, "Unterminated string literal"),
            Self::InvalidEscape(digits) => write!(f, "Invalid escape sequence `{digits}`"),
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for LexError {}

/// Tokenize a source into a stream terminated by the EOF sentinel.
pub fn tokenize(source: &Source) -> Result<TokenStream, LexError> {
    Lexer::new(source).run()
}

/// The NS lexer. One linear pass over the source characters, with a
/// sub-machine for string literals and their escapes.
struct Lexer<'src> {
    cursor: Cursor<'src>,
    source: &'src Source,
    tokens: Vec<Token>,
    /// Accumulating lexeme buffer for identifier/number shaped runs.
    pending: String,
    /// (byte offset, line, column) of the pending lexeme's first character.
    pending_start: (u32, u32, u32),
}

impl<'src> Lexer<'src> {
    fn new(source: &'src Source) -> Self {
        Self {
            cursor: Cursor::new(&source.body),
            source,
            tokens: Vec::new(),
            pending: String::new(),
            pending_start: (0, 0, 0),
        }
    }

    fn run(mut self) -> Result<TokenStream, LexError> {
        while let Some(c) = self.cursor.peek() {
            if let Some(op) = COMPOUND_TOKENS
                .iter()
                .find(|op| self.cursor.rest().starts_with(**op))
                .copied()
            {
                match op {
                    "//" => self.line_comment(),
                    "/*" => self.block_comment(),
                    // A stray `*/` outside a comment is consumed and drops
                    // the pending lexeme, like every other comment path.
                    "*/" => {
                        self.discard_pending();
                        self.cursor.advance_by(2);
                    }
                    _ => {
                        self.flush();
                        self.emit_punct(op);
                    }
                }
                continue;
            }

            match c {
                ' ' | '\t' | '\n' => {
                    self.flush();
                    self.cursor.advance();
                }
                c if PUNCTUATORS.contains(c) => {
                    self.flush();
                    let mut buf = [0u8; 4];
                    self.emit_punct(c.encode_utf8(&mut buf));
                }
                '`' | '\'' | '"' => {
                    self.flush();
                    self.string_literal(c)?;
                }
                _ => {
                    if self.pending.is_empty() {
                        self.pending_start =
                            (self.cursor.pos(), self.cursor.line(), self.cursor.column());
                    }
                    self.pending.push(c);
                    self.cursor.advance();
                }
            }
        }

        self.flush();
        self.tokens.push(Token::new(
            "",
            TokenKind::Eof,
            Span::point(self.cursor.pos()),
            self.cursor.line(),
            self.cursor.column(),
        ));

        Ok(TokenStream {
            source: self.source.clone(),
            tokens: self.tokens,
        })
    }

    /// Emit the pending lexeme (if any) as an identifier/number token.
    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.pending);
        let (start, line, column) = self.pending_start;
        let kind = classify(&text);
        self.tokens.push(Token::new(
            text,
            kind,
            Span::new(start, self.cursor.pos()),
            line,
            column,
        ));
    }

    /// Emit an operator/punctuator token and advance past it.
    fn emit_punct(&mut self, text: &str) {
        let (start, line, column) =
            (self.cursor.pos(), self.cursor.line(), self.cursor.column());
        self.cursor.advance_by(text.chars().count());
        self.tokens.push(Token::new(
            text,
            TokenKind::Punct,
            Span::new(start, self.cursor.pos()),
            line,
            column,
        ));
    }

    /// Drop the accumulating lexeme without emitting it. Comments do
    /// this: a lexeme glued onto a comment is discarded, never flushed.
    fn discard_pending(&mut self) {
        self.pending.clear();
        self.pending_start = (self.cursor.pos(), self.cursor.line(), self.cursor.column());
    }

    /// Discard characters until (not including) the next newline.
    fn line_comment(&mut self) {
        self.discard_pending();
        self.cursor.advance_by(2);
        while let Some(c) = self.cursor.peek() {
            if c == '\n' {
                break;
            }
            self.cursor.advance();
        }
    }

    /// Discard characters until past the closing `*/`. An unterminated
    /// block comment silently runs to end of input.
    fn block_comment(&mut self) {
        self.discard_pending();
        self.cursor.advance_by(2);
        while !self.cursor.is_eof() {
            if self.cursor.rest().starts_with("*/") {
                self.cursor.advance_by(2);
                return;
            }
            self.cursor.advance();
        }
    }

    /// String-literal sub-machine. `quote` is the opening delimiter; all
    /// three quote kinds pair with themselves and the emitted token is
    /// canonicalized to `"..."` with escapes decoded.
    fn string_literal(&mut self, quote: char) -> Result<(), LexError> {
        let (start, line, column) =
            (self.cursor.pos(), self.cursor.line(), self.cursor.column());
        self.cursor.advance();

        let unterminated = |this: &Self| LexError {
            kind: LexErrorKind::UnterminatedString,
            span: Span::new(start, this.cursor.pos()),
            line,
            column,
        };

        let mut body = String::new();
        loop {
            let Some(c) = self.cursor.advance() else {
                return Err(unterminated(self));
            };
            if c == quote {
                break;
            }
            if c == '\\' {
                self.escape(&mut body, &unterminated)?;
            } else {
                body.push(c);
            }
        }

        self.tokens.push(Token::new(
            format!("\"{body}\""),
            TokenKind::Str,
            Span::new(start, self.cursor.pos()),
            line,
            column,
        ));
        Ok(())
    }

    /// Escape sub-machine, entered after a backslash inside a string.
    fn escape(
        &mut self,
        body: &mut String,
        unterminated: &dyn Fn(&Self) -> LexError,
    ) -> Result<(), LexError> {
        let Some(c) = self.cursor.advance() else {
            return Err(unterminated(self));
        };
        let radix = match c.to_ascii_lowercase() {
            'x' => Some((16, 2)),
            'o' => Some((8, 3)),
            'u' => Some((16, 4)),
            _ => None,
        };
        let Some((radix, count)) = radix else {
            body.push(match c {
                'n' => '\n',
                'r' => '\r',
                't' => '\t',
                '@' | '0' => '\0',
                'e' | '^' => '\x1b',
                other => other,
            });
            return Ok(());
        };

        let (d_start, d_line, d_column) =
            (self.cursor.pos(), self.cursor.line(), self.cursor.column());
        let mut digits = String::with_capacity(count);
        for _ in 0..count {
            let Some(d) = self.cursor.advance() else {
                return Err(unterminated(self));
            };
            digits.push(d);
        }
        let decoded = u32::from_str_radix(&digits, radix)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| LexError {
                kind: LexErrorKind::InvalidEscape(digits.clone()),
                span: Span::new(d_start, self.cursor.pos()),
                line: d_line,
                column: d_column,
            })?;
        body.push(decoded);
        Ok(())
    }
}

/// Classify a flushed lexeme. Keywords stay `Ident`; the parser matches on
/// the token text.
fn classify(text: &str) -> TokenKind {
    let mut chars = text.chars();
    let first = chars.next().expect("lexeme is never empty");
    if text.chars().all(|c| c.is_ascii_digit()) {
        TokenKind::Number
    } else if first.is_ascii_alphabetic() || first == '_' || first == '$' {
        TokenKind::Ident
    } else {
        TokenKind::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(body: &str) -> Vec<Token> {
        let source = Source::new("test.ns", body);
        tokenize(&source).expect("lexing failed").tokens
    }

    fn texts(body: &str) -> Vec<String> {
        lex(body).into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn lex_simple_statement() {
        let tokens = lex("let x = 42;");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Punct,
                TokenKind::Number,
                TokenKind::Punct,
                TokenKind::Eof,
            ]
        );
        assert_eq!(tokens[0].text, "let");
        assert_eq!(tokens[3].text, "42");
    }

    #[test]
    fn compound_operators_win_over_single_chars() {
        assert_eq!(texts("a >>= b"), vec!["a", ">>=", "b", ""]);
        assert_eq!(texts("a>=b"), vec!["a", ">=", "b", ""]);
        assert_eq!(texts("x++"), vec!["x", "++", ""]);
        assert_eq!(texts("a...b"), vec!["a", "...", "b", ""]);
    }

    #[test]
    fn slash_assign_is_not_a_comment() {
        assert_eq!(texts("a /= b"), vec!["a", "/=", "b", ""]);
        assert_eq!(texts("a / b"), vec!["a", "/", "b", ""]);
    }

    #[test]
    fn comments_are_discarded() {
        assert_eq!(texts("a // rest\nb"), vec!["a", "b", ""]);
        assert_eq!(texts("a /* span\nlines */ b"), vec!["a", "b", ""]);
    }

    #[test]
    fn lexeme_glued_onto_line_comment_is_dropped() {
        // The pending lexeme is discarded on comment entry, never merged
        // into later tokens or flushed with a span covering the comment.
        assert_eq!(texts("ab// x\ncd;"), vec!["cd", ";", ""]);
    }

    #[test]
    fn lexeme_glued_onto_block_comment_is_dropped() {
        let tokens = lex("ab/* c */cd;");
        let survivors: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(survivors, vec!["cd", ";", ""]);
        // The surviving token starts after the comment, not at byte 0.
        assert_eq!(tokens[0].span, Span::new(9, 11));
        assert_eq!((tokens[0].line, tokens[0].column), (0, 9));
    }

    #[test]
    fn spans_and_positions() {
        let tokens = lex("let x\nfoo");
        assert_eq!(tokens[0].span, Span::new(0, 3));
        assert_eq!((tokens[0].line, tokens[0].column), (0, 0));
        assert_eq!((tokens[1].line, tokens[1].column), (0, 4));
        assert_eq!((tokens[2].line, tokens[2].column), (1, 0));
        assert_eq!(tokens[2].span, Span::new(6, 9));
    }

    #[test]
    fn string_quotes_canonicalized() {
        assert_eq!(texts("'hi'"), vec!["\"hi\"", ""]);
        assert_eq!(texts("`hi`"), vec!["\"hi\"", ""]);
        assert_eq!(texts("\"hi\""), vec!["\"hi\"", ""]);
        // A double quote inside a single-quoted string is literal.
        assert_eq!(texts("'a\"b'"), vec!["\"a\"b\"", ""]);
    }

    #[test]
    fn string_escapes_decoded() {
        assert_eq!(texts(r"'a\nb'"), vec!["\"a\nb\"", ""]);
        assert_eq!(texts(r"'\t\r\@\0'"), vec!["\"\t\r\0\0\"", ""]);
        assert_eq!(texts(r"'\e\^'"), vec!["\"\x1b\x1b\"", ""]);
        assert_eq!(texts(r"'\x41'"), vec!["\"A\"", ""]);
        assert_eq!(texts(r"'\o101'"), vec!["\"A\"", ""]);
        assert_eq!(texts(r"'A'"), vec!["\"A\"", ""]);
        // Unknown escapes yield the character itself.
        assert_eq!(texts(r"'\q\''"), vec!["\"q'\"", ""]);
    }

    #[test]
    fn malformed_radix_escape_is_fatal() {
        let source = Source::new("test.ns", r"'\xzz'");
        let err = tokenize(&source).unwrap_err();
        assert_eq!(err.kind, LexErrorKind::InvalidEscape("zz".into()));
    }

    #[test]
    fn unterminated_string_is_fatal() {
        let source = Source::new("test.ns", "let s = 'oops");
        let err = tokenize(&source).unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnterminatedString);
        assert_eq!(err.span.start, 8);
    }

    #[test]
    fn string_span_covers_source_not_text() {
        let tokens = lex(r"'a\x41'");
        assert_eq!(tokens[0].text, "\"aA\"");
        assert_eq!(tokens[0].span, Span::new(0, 7));
    }

    #[test]
    fn stray_block_comment_close_is_swallowed() {
        assert_eq!(texts("a */ b"), vec!["a", "b", ""]);
    }

    #[test]
    fn eof_token_position() {
        let tokens = lex("ab\n");
        let eof = tokens.last().unwrap();
        assert_eq!(eof.kind, TokenKind::Eof);
        assert_eq!((eof.line, eof.column), (1, 0));
        assert_eq!(eof.span, Span::point(3));
    }

    #[test]
    fn unknown_lexeme_classified() {
        let tokens = lex("1abc");
        assert_eq!(tokens[0].kind, TokenKind::Unknown);
    }
}

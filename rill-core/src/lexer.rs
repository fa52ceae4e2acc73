//! Lexer for Rill.
//!
//! Byte-indexed and intentionally simple: it recognizes keywords,
//! punctuation, integer and string literals, and attaches a span to
//! every token. Higher layers interpret identifiers.

use crate::error::CoreError;
use crate::span::Span;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    // Identifiers and literals
    Ident(String),
    Int(i32),
    Str(String),

    // Keywords
    Function,
    Let,
    In,
    If,
    Then,
    Else,

    // Punctuation
    LParen,   // (
    RParen,   // )
    LBrace,   // {
    RBrace,   // }
    LBracket, // [
    RBracket, // ]
    Comma,    // ,
    Semi,     // ;
    Colon,    // :
    Equal,    // =

    // Operators
    Plus,    // +
    Minus,   // -
    Star,    // *
    Slash,   // /
    Percent, // %
    EqEq,    // ==
    NotEq,   // !=
    Lt,      // <
    Le,      // <=
    Gt,      // >
    Ge,      // >=
    AndAnd,  // &&
    OrOr,    // ||
    Bang,    // !
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Lex a source string into tokens. The first malformed character
/// aborts with a `LexError` carrying its span.
pub fn lex(source: &str) -> Result<Vec<Token>, CoreError> {
    let mut lexer = Lexer {
        source,
        bytes: source.as_bytes(),
        index: 0,
    };
    lexer.run()
}

struct Lexer<'src> {
    source: &'src str,
    bytes: &'src [u8],
    index: usize,
}

impl<'src> Lexer<'src> {
    fn run(&mut self) -> Result<Vec<Token>, CoreError> {
        let mut tokens = Vec::new();

        while let Some(ch) = self.peek() {
            if is_whitespace(ch) {
                self.consume();
                continue;
            }
            // Line comments.
            if ch == b'/' && self.peek_next() == Some(b'/') {
                while let Some(ch) = self.peek() {
                    if ch == b'\n' {
                        break;
                    }
                    self.consume();
                }
                continue;
            }

            let start = self.index as u32;
            let kind = match ch {
                b'(' => self.single(TokenKind::LParen),
                b')' => self.single(TokenKind::RParen),
                b'{' => self.single(TokenKind::LBrace),
                b'}' => self.single(TokenKind::RBrace),
                b'[' => self.single(TokenKind::LBracket),
                b']' => self.single(TokenKind::RBracket),
                b',' => self.single(TokenKind::Comma),
                b';' => self.single(TokenKind::Semi),
                b':' => self.single(TokenKind::Colon),
                b'+' => self.single(TokenKind::Plus),
                b'-' => self.single(TokenKind::Minus),
                b'*' => self.single(TokenKind::Star),
                b'/' => self.single(TokenKind::Slash),
                b'%' => self.single(TokenKind::Percent),
                b'=' => self.pair(b'=', TokenKind::EqEq, TokenKind::Equal),
                b'!' => self.pair(b'=', TokenKind::NotEq, TokenKind::Bang),
                b'<' => self.pair(b'=', TokenKind::Le, TokenKind::Lt),
                b'>' => self.pair(b'=', TokenKind::Ge, TokenKind::Gt),
                b'&' => {
                    self.consume();
                    if self.peek() == Some(b'&') {
                        self.consume();
                        TokenKind::AndAnd
                    } else {
                        return Err(self.unexpected(start, "expected `&&`"));
                    }
                }
                b'|' => {
                    self.consume();
                    if self.peek() == Some(b'|') {
                        self.consume();
                        TokenKind::OrOr
                    } else {
                        return Err(self.unexpected(start, "expected `||`"));
                    }
                }
                b'"' => self.lex_string(start)?,
                b'0'..=b'9' => self.lex_int(start)?,
                _ if is_ident_start(ch) => self.lex_ident_or_keyword(start),
                _ => {
                    self.consume();
                    return Err(self.unexpected(start, "unexpected character"));
                }
            };

            tokens.push(Token {
                kind,
                span: Span::new(start, self.index as u32),
            });
        }

        Ok(tokens)
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.consume();
        kind
    }

    /// Consume one byte, then `follow` if present, choosing between
    /// the two-byte and one-byte token kinds.
    fn pair(&mut self, follow: u8, long: TokenKind, short: TokenKind) -> TokenKind {
        self.consume();
        if self.peek() == Some(follow) {
            self.consume();
            long
        } else {
            short
        }
    }

    fn unexpected(&self, start: u32, message: &str) -> CoreError {
        CoreError::LexError {
            message: message.to_string(),
            span: Span::new(start, self.index as u32),
        }
    }

    fn lex_string(&mut self, start: u32) -> Result<TokenKind, CoreError> {
        self.consume(); // opening quote
        let mut value = String::new();
        while let Some(ch) = self.peek() {
            match ch {
                b'"' => {
                    self.consume();
                    return Ok(TokenKind::Str(value));
                }
                b'\\' => {
                    self.consume();
                    let escaped = self.peek().ok_or_else(|| {
                        self.unexpected(start, "unterminated escape sequence")
                    })?;
                    self.consume();
                    match escaped {
                        b'n' => value.push('\n'),
                        b't' => value.push('\t'),
                        b'"' => value.push('"'),
                        b'\\' => value.push('\\'),
                        _ => {
                            return Err(self.unexpected(start, "unknown escape sequence"));
                        }
                    }
                }
                _ => {
                    // Copy the full UTF-8 character, not just one byte.
                    let rest = &self.source[self.index..];
                    let ch = rest.chars().next().unwrap_or('\u{fffd}');
                    value.push(ch);
                    self.index += ch.len_utf8();
                }
            }
        }
        Err(self.unexpected(start, "unterminated string literal"))
    }

    fn lex_int(&mut self, start: u32) -> Result<TokenKind, CoreError> {
        while let Some(ch) = self.peek() {
            if matches!(ch, b'0'..=b'9' | b'_') {
                self.consume();
            } else {
                break;
            }
        }
        let text = &self.source[start as usize..self.index];
        let value = text
            .replace('_', "")
            .parse::<i32>()
            .map_err(|_| self.unexpected(start, "integer literal out of range"))?;
        Ok(TokenKind::Int(value))
    }

    fn lex_ident_or_keyword(&mut self, start: u32) -> TokenKind {
        while let Some(ch) = self.peek() {
            if is_ident_continue(ch) {
                self.consume();
            } else {
                break;
            }
        }
        let text = &self.source[start as usize..self.index];
        match text {
            "function" => TokenKind::Function,
            "let" => TokenKind::Let,
            "in" => TokenKind::In,
            "if" => TokenKind::If,
            "then" => TokenKind::Then,
            "else" => TokenKind::Else,
            _ => TokenKind::Ident(text.to_string()),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.index).copied()
    }

    fn peek_next(&self) -> Option<u8> {
        self.bytes.get(self.index + 1).copied()
    }

    fn consume(&mut self) {
        if self.index < self.bytes.len() {
            self.index += 1;
        }
    }
}

fn is_whitespace(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\n' | b'\r')
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}

//! Tokenizer for expression text.
//!
//! Offsets reported in tokens and errors are 0-based character offsets.
//!
//! Escapes accepted inside quoted strings (`"..."` or `'...'`) are exactly
//! `\\`, `\"`, `\'`, `\n`, `\t` and `\r`. Inside URLs (`<scheme://...>`) they
//! are exactly `\\` and `\>`. Anything else after a backslash is an error.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{FacetError, Result};

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*").unwrap();
    static ref NUMBER: Regex = Regex::new(r"^[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?").unwrap();
    static ref URL_SCHEME: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://").unwrap();
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    Number(f64),
    String(String),
    Url(String),
    Delimiter(char),
    Operator(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

impl Token {
    pub fn is_delimiter(&self, c: char) -> bool {
        self.kind == TokenKind::Delimiter(c)
    }
    pub fn is_operator(&self, op: &str) -> bool {
        matches!(self.kind, TokenKind::Operator(o) if o == op)
    }
    pub fn is_keyword(&self, word: &str) -> bool {
        matches!(&self.kind, TokenKind::Identifier(w) if w == word)
    }
    /// Short description used in error messages.
    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Identifier(s) => format!("identifier '{s}'"),
            TokenKind::Number(n) => format!("number {n}"),
            TokenKind::String(s) => format!("string {s:?}"),
            TokenKind::Url(s) => format!("url <{s}>"),
            TokenKind::Delimiter(c) => format!("'{c}'"),
            TokenKind::Operator(o) => format!("'{o}'"),
        }
    }
}

pub struct Scanner<'t> {
    text: &'t str,
    // byte offset into text
    cursor: usize,
}

impl<'t> Scanner<'t> {
    pub fn new(text: &'t str) -> Self {
        Self { text, cursor: 0 }
    }
    /// Character offset of a byte offset.
    fn offset(&self, byte: usize) -> usize {
        self.text[..byte].chars().count()
    }
    fn rest(&self) -> &'t str {
        &self.text[self.cursor..]
    }
    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token { kind, position: self.offset(start) }
    }
    pub fn scan(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let trimmed = self.rest().trim_start();
            self.cursor = self.text.len() - trimmed.len();
            let start = self.cursor;
            let Some(c) = trimmed.chars().next() else {
                return Ok(tokens);
            };
            let token = match c {
                '"' | '\'' => self.quoted(c)?,
                '<' if URL_SCHEME.is_match(&trimmed[1..]) => self.url()?,
                '<' | '>' | '!' | '=' | '+' | '-' | '*' | '/' => {
                    let op = match (c, trimmed[1..].chars().next()) {
                        ('<', Some('=')) => "<=",
                        ('<', Some('>')) => "<>",
                        ('>', Some('=')) => ">=",
                        ('!', Some('=')) => "!=",
                        ('<', _) => "<",
                        ('>', _) => ">",
                        ('=', _) => "=",
                        ('+', _) => "+",
                        ('-', _) => "-",
                        ('*', _) => "*",
                        ('/', _) => "/",
                        // a lone '!' is the reversal marker of a path step
                        _ => {
                            self.cursor += 1;
                            tokens.push(self.token(TokenKind::Delimiter('!'), start));
                            continue;
                        }
                    };
                    self.cursor += op.len();
                    self.token(TokenKind::Operator(op), start)
                }
                '.' | '(' | ')' | ',' | '{' | '}' | ';' | ':' => {
                    self.cursor += 1;
                    self.token(TokenKind::Delimiter(c), start)
                }
                c if c.is_ascii_digit() => {
                    let found = NUMBER.find(trimmed).map(|m| m.as_str()).unwrap_or_default();
                    let number = found
                        .parse::<f64>()
                        .map_err(|_| FacetError::syntax(self.offset(start), "a number"))?;
                    self.cursor += found.len();
                    self.token(TokenKind::Number(number), start)
                }
                c if c.is_ascii_alphabetic() || c == '_' => {
                    let found = IDENTIFIER.find(trimmed).map(|m| m.as_str()).unwrap_or_default();
                    self.cursor += found.len();
                    self.token(TokenKind::Identifier(found.to_string()), start)
                }
                _ => return Err(FacetError::syntax(self.offset(start), "an identifier, literal, delimiter or operator")),
            };
            tokens.push(token);
        }
    }
    fn quoted(&mut self, quote: char) -> Result<Token> {
        let start = self.cursor;
        let mut content = String::new();
        let mut chars = self.text[start + 1..].char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => {
                    let escaped = match chars.next() {
                        Some((_, '\\')) => '\\',
                        Some((_, '"')) => '"',
                        Some((_, '\'')) => '\'',
                        Some((_, 'n')) => '\n',
                        Some((_, 't')) => '\t',
                        Some((_, 'r')) => '\r',
                        _ => {
                            return Err(FacetError::syntax(
                                self.offset(start + 1 + i),
                                r#"one of \\ \" \' \n \t \r after a backslash"#,
                            ));
                        }
                    };
                    content.push(escaped);
                }
                c if c == quote => {
                    self.cursor = start + 1 + i + c.len_utf8();
                    return Ok(self.token(TokenKind::String(content), start));
                }
                c => content.push(c),
            }
        }
        Err(FacetError::syntax(self.offset(start), format!("a closing {quote} for this string")))
    }
    fn url(&mut self) -> Result<Token> {
        let start = self.cursor;
        let mut content = String::new();
        let mut chars = self.text[start + 1..].char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => {
                    let escaped = match chars.next() {
                        Some((_, '\\')) => '\\',
                        Some((_, '>')) => '>',
                        _ => {
                            return Err(FacetError::syntax(self.offset(start + 1 + i), r"one of \\ \> after a backslash"));
                        }
                    };
                    content.push(escaped);
                }
                '>' => {
                    self.cursor = start + 1 + i + 1;
                    return Ok(self.token(TokenKind::Url(content), start));
                }
                c => content.push(c),
            }
        }
        Err(FacetError::syntax(self.offset(start), "a closing > for this url"))
    }
}

/// Tokenizes the whole text.
pub fn scan(text: &str) -> Result<Vec<Token>> {
    Scanner::new(text).scan()
}

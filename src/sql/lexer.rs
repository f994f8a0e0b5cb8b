//! Zero-copy SQL tokenizer.
//!
//! Tokens borrow directly from the input string; nothing is allocated while
//! scanning. Keywords are matched case-insensitively through a compile-time
//! perfect hash map — candidate identifiers are uppercased into a stack
//! buffer before the lookup, so the hot path stays allocation-free.

use phf::phf_map;

use super::token::{Keyword, Token};

static KEYWORDS: phf::Map<&'static str, Keyword> = phf_map! {
    "SELECT" => Keyword::Select,
    "FROM" => Keyword::From,
    "WHERE" => Keyword::Where,
    "AND" => Keyword::And,
    "OR" => Keyword::Or,
    "NOT" => Keyword::Not,
    "BETWEEN" => Keyword::Between,
    "IS" => Keyword::Is,
    "NULL" => Keyword::Null,
    "TRUE" => Keyword::True,
    "FALSE" => Keyword::False,
    "ORDER" => Keyword::Order,
    "BY" => Keyword::By,
    "ASC" => Keyword::Asc,
    "DESC" => Keyword::Desc,
    "LIMIT" => Keyword::Limit,
    "OFFSET" => Keyword::Offset,
    "AS" => Keyword::As,
    "COUNT" => Keyword::Count,
};

const MAX_KEYWORD_LEN: usize = 8;

pub struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
    placeholders: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
            placeholders: 0,
        }
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    pub fn next_token(&mut self) -> Token<'a> {
        self.skip_whitespace();

        if self.is_eof() {
            return Token::Eof;
        }

        let ch = self.current();

        if ch.is_ascii_alphabetic() || ch == b'_' {
            return self.scan_identifier_or_keyword();
        }
        if ch.is_ascii_digit() {
            return self.scan_number();
        }

        match ch {
            b'\'' => self.scan_string(),
            b'?' => {
                self.bump();
                let ordinal = self.placeholders;
                self.placeholders += 1;
                Token::Placeholder(ordinal)
            }
            b',' => {
                self.bump();
                Token::Comma
            }
            b'*' => {
                self.bump();
                Token::Star
            }
            b'(' => {
                self.bump();
                Token::LParen
            }
            b')' => {
                self.bump();
                Token::RParen
            }
            b';' => {
                self.bump();
                Token::Semicolon
            }
            b'=' => {
                self.bump();
                Token::Eq
            }
            b'!' => {
                self.bump();
                if self.current_is(b'=') {
                    self.bump();
                    Token::NotEq
                } else {
                    Token::Error("expected '=' after '!'")
                }
            }
            b'<' => {
                self.bump();
                if self.current_is(b'=') {
                    self.bump();
                    Token::LtEq
                } else if self.current_is(b'>') {
                    self.bump();
                    Token::NotEq
                } else {
                    Token::Lt
                }
            }
            b'>' => {
                self.bump();
                if self.current_is(b'=') {
                    self.bump();
                    Token::GtEq
                } else {
                    Token::Gt
                }
            }
            _ => {
                self.bump();
                Token::Error("unexpected character")
            }
        }
    }

    fn scan_identifier_or_keyword(&mut self) -> Token<'a> {
        let start = self.pos;
        while !self.is_eof() {
            let b = self.current();
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.bump();
            } else {
                break;
            }
        }
        let text = &self.input[start..self.pos];

        if text.len() <= MAX_KEYWORD_LEN {
            let mut upper = [0u8; MAX_KEYWORD_LEN];
            for (i, b) in text.bytes().enumerate() {
                upper[i] = b.to_ascii_uppercase();
            }
            if let Ok(candidate) = std::str::from_utf8(&upper[..text.len()]) {
                if let Some(&keyword) = KEYWORDS.get(candidate) {
                    return Token::Keyword(keyword);
                }
            }
        }
        Token::Identifier(text)
    }

    fn scan_number(&mut self) -> Token<'a> {
        let start = self.pos;

        // hex literal
        if self.current() == b'0'
            && matches!(self.bytes.get(self.pos + 1), Some(b'x') | Some(b'X'))
        {
            self.bump();
            self.bump();
            while !self.is_eof() && self.current().is_ascii_hexdigit() {
                self.bump();
            }
            return Token::Number(&self.input[start..self.pos]);
        }

        while !self.is_eof() && self.current().is_ascii_digit() {
            self.bump();
        }
        if self.current_is(b'.') {
            self.bump();
            while !self.is_eof() && self.current().is_ascii_digit() {
                self.bump();
            }
        }
        if self.current_is(b'e') || self.current_is(b'E') {
            self.bump();
            if self.current_is(b'+') || self.current_is(b'-') {
                self.bump();
            }
            while !self.is_eof() && self.current().is_ascii_digit() {
                self.bump();
            }
        }
        Token::Number(&self.input[start..self.pos])
    }

    fn scan_string(&mut self) -> Token<'a> {
        self.bump(); // opening quote
        let start = self.pos;
        while !self.is_eof() {
            if self.current() == b'\'' {
                // '' is an escaped quote, keep scanning
                if self.bytes.get(self.pos + 1) == Some(&b'\'') {
                    self.bump();
                    self.bump();
                    continue;
                }
                let text = &self.input[start..self.pos];
                self.bump(); // closing quote
                return Token::String(text);
            }
            if self.current() == b'\n' {
                self.line += 1;
                self.column = 0;
            }
            self.bump();
        }
        Token::Error("unterminated string literal")
    }

    fn skip_whitespace(&mut self) {
        while !self.is_eof() {
            let b = self.current();
            if b == b'\n' {
                self.line += 1;
                self.column = 1;
                self.pos += 1;
            } else if b.is_ascii_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    #[inline]
    fn is_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    #[inline]
    fn current(&self) -> u8 {
        self.bytes[self.pos]
    }

    #[inline]
    fn current_is(&self, b: u8) -> bool {
        !self.is_eof() && self.current() == b
    }

    #[inline]
    fn bump(&mut self) {
        self.pos += 1;
        self.column += 1;
    }
}

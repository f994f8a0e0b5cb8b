//! Token and keyword definitions for the SELECT dialect.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Select,
    From,
    Where,
    And,
    Or,
    Not,
    Between,
    Is,
    Null,
    True,
    False,
    Order,
    By,
    Asc,
    Desc,
    Limit,
    Offset,
    As,
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token<'a> {
    Keyword(Keyword),
    /// Unquoted identifier, borrowed from the input.
    Identifier(&'a str),
    /// Single-quoted string literal, inner slice; `''` escapes a quote.
    String(&'a str),
    /// Numeric literal (integer, float, or 0x hex), unparsed.
    Number(&'a str),
    /// Positional `?` parameter, numbered left to right from zero.
    Placeholder(usize),
    Comma,
    Star,
    LParen,
    RParen,
    Semicolon,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eof,
    Error(&'static str),
}

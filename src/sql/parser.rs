//! Recursive descent parser for the SELECT dialect.
//!
//! Anything outside the supported grammar fails with a `Query` error
//! carrying the offending token and its line/column, surfaced verbatim to
//! the caller.

use eyre::Result;

use super::ast::{BinaryOp, Expr, Literal, OrderBy, Select, SelectItem};
use super::lexer::Lexer;
use super::token::{Keyword, Token};
use crate::error::EngineError;

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token<'a>,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token();
        Self { lexer, current }
    }

    /// Parses one SELECT statement and requires the input to end after it.
    pub fn parse_select_statement(&mut self) -> Result<Select<'a>> {
        let select = self.parse_select()?;
        self.consume_token(&Token::Semicolon);
        if self.current != Token::Eof {
            return Err(self.unexpected("end of statement"));
        }
        Ok(select)
    }

    fn parse_select(&mut self) -> Result<Select<'a>> {
        self.expect_keyword(Keyword::Select)?;

        let items = self.parse_select_items()?;
        self.expect_keyword(Keyword::From)?;
        let table = self.expect_identifier("table name")?;

        let where_clause = if self.consume_keyword(Keyword::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        let order_by = if self.consume_keyword(Keyword::Order) {
            self.expect_keyword(Keyword::By)?;
            let column = self.expect_identifier("ORDER BY column")?;
            let descending = if self.consume_keyword(Keyword::Desc) {
                true
            } else {
                self.consume_keyword(Keyword::Asc);
                false
            };
            Some(OrderBy { column, descending })
        } else {
            None
        };

        let limit = if self.consume_keyword(Keyword::Limit) {
            Some(self.expect_unsigned("LIMIT")?)
        } else {
            None
        };
        let offset = if self.consume_keyword(Keyword::Offset) {
            Some(self.expect_unsigned("OFFSET")?)
        } else {
            None
        };

        Ok(Select {
            items,
            table,
            where_clause,
            order_by,
            limit,
            offset,
        })
    }

    fn parse_select_items(&mut self) -> Result<Vec<SelectItem<'a>>> {
        if self.consume_token(&Token::Star) {
            return Ok(vec![SelectItem::Wildcard]);
        }

        let mut items = Vec::new();
        loop {
            let item = if self.consume_keyword(Keyword::Count) {
                self.expect_token(&Token::LParen)?;
                self.expect_token(&Token::Star)?;
                self.expect_token(&Token::RParen)?;
                SelectItem::CountStar {
                    alias: self.parse_alias()?,
                }
            } else {
                let name = self.expect_identifier("column name")?;
                SelectItem::Column {
                    name,
                    alias: self.parse_alias()?,
                }
            };
            items.push(item);
            if !self.consume_token(&Token::Comma) {
                break;
            }
        }
        Ok(items)
    }

    fn parse_alias(&mut self) -> Result<Option<&'a str>> {
        if self.consume_keyword(Keyword::As) {
            Ok(Some(self.expect_identifier("alias")?))
        } else {
            Ok(None)
        }
    }

    fn parse_expr(&mut self) -> Result<Expr<'a>> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr<'a>> {
        let mut left = self.parse_and()?;
        while self.consume_keyword(Keyword::Or) {
            let right = self.parse_and()?;
            left = Expr::Binary {
                left: Box::new(left),
                op: BinaryOp::Or,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr<'a>> {
        let mut left = self.parse_not()?;
        while self.consume_keyword(Keyword::And) {
            let right = self.parse_not()?;
            left = Expr::Binary {
                left: Box::new(left),
                op: BinaryOp::And,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr<'a>> {
        if self.consume_keyword(Keyword::Not) {
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr<'a>> {
        let left = self.parse_primary()?;

        if let Some(op) = self.comparison_op() {
            self.advance();
            let right = self.parse_primary()?;
            return Ok(Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            });
        }

        // x [NOT] BETWEEN low AND high; NOT BETWEEN is the only postfix NOT
        let (has_between, negated) = if self.check_keyword(Keyword::Not) {
            self.advance();
            self.expect_keyword(Keyword::Between)?;
            (true, true)
        } else {
            (self.consume_keyword(Keyword::Between), false)
        };
        if has_between {
            let low = self.parse_primary()?;
            self.expect_keyword(Keyword::And)?;
            let high = self.parse_primary()?;
            return Ok(Expr::Between {
                expr: Box::new(left),
                low: Box::new(low),
                high: Box::new(high),
                negated,
            });
        }

        // x IS [NOT] NULL
        if self.consume_keyword(Keyword::Is) {
            let negated = self.consume_keyword(Keyword::Not);
            self.expect_keyword(Keyword::Null)?;
            return Ok(Expr::IsNull {
                expr: Box::new(left),
                negated,
            });
        }

        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<Expr<'a>> {
        match self.current {
            Token::Identifier(name) => {
                self.advance();
                Ok(Expr::Column(name))
            }
            Token::Number(text) => {
                self.advance();
                let is_hex = text.starts_with("0x") || text.starts_with("0X");
                let literal = if !is_hex
                    && (text.contains('.') || text.contains('e') || text.contains('E'))
                {
                    Literal::Float(text)
                } else {
                    Literal::Integer(text)
                };
                Ok(Expr::Literal(literal))
            }
            Token::String(text) => {
                self.advance();
                Ok(Expr::Literal(Literal::String(text)))
            }
            Token::Placeholder(ordinal) => {
                self.advance();
                Ok(Expr::Placeholder(ordinal))
            }
            Token::Keyword(Keyword::Null) => {
                self.advance();
                Ok(Expr::Literal(Literal::Null))
            }
            Token::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expr::Literal(Literal::Boolean(true)))
            }
            Token::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expr::Literal(Literal::Boolean(false)))
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect_token(&Token::RParen)?;
                Ok(inner)
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn comparison_op(&self) -> Option<BinaryOp> {
        match self.current {
            Token::Eq => Some(BinaryOp::Eq),
            Token::NotEq => Some(BinaryOp::NotEq),
            Token::Lt => Some(BinaryOp::Lt),
            Token::LtEq => Some(BinaryOp::LtEq),
            Token::Gt => Some(BinaryOp::Gt),
            Token::GtEq => Some(BinaryOp::GtEq),
            _ => None,
        }
    }

    fn advance(&mut self) -> Token<'a> {
        std::mem::replace(&mut self.current, self.lexer.next_token())
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        matches!(self.current, Token::Keyword(k) if k == keyword)
    }

    fn consume_keyword(&mut self, keyword: Keyword) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<()> {
        if self.consume_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("keyword {:?}", keyword)))
        }
    }

    fn consume_token(&mut self, expected: &Token<'_>) -> bool {
        if std::mem::discriminant(&self.current) == std::mem::discriminant(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_token(&mut self, expected: &Token<'_>) -> Result<()> {
        if self.consume_token(expected) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("{:?}", expected)))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> Result<&'a str> {
        match self.current {
            Token::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn expect_unsigned(&mut self, clause: &str) -> Result<u64> {
        match self.current {
            Token::Number(text) => {
                let value = text.parse::<u64>().map_err(|_| {
                    EngineError::Query(format!("{} expects a non-negative integer, got {}", clause, text))
                })?;
                self.advance();
                Ok(value)
            }
            _ => Err(self.unexpected(&format!("a number after {}", clause))),
        }
    }

    fn unexpected(&self, expected: &str) -> eyre::Report {
        EngineError::Query(format!(
            "expected {}, found {:?} at line {} column {}",
            expected,
            self.current,
            self.lexer.line(),
            self.lexer.column()
        ))
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(sql: &str) -> Result<Select<'_>> {
        Parser::new(sql).parse_select_statement()
    }

    #[test]
    fn parses_star_projection() {
        let select = parse("SELECT * FROM User").unwrap();
        assert_eq!(select.items, vec![SelectItem::Wildcard]);
        assert_eq!(select.table, "User");
        assert!(select.where_clause.is_none());
    }

    #[test]
    fn parses_columns_aliases_and_count() {
        let select = parse("SELECT id, name AS n, COUNT(*) AS total FROM User").unwrap();
        assert_eq!(select.items.len(), 3);
        assert_eq!(
            select.items[1],
            SelectItem::Column {
                name: "name",
                alias: Some("n")
            }
        );
        assert_eq!(
            select.items[2],
            SelectItem::CountStar {
                alias: Some("total")
            }
        );
    }

    #[test]
    fn parses_where_conjunction_with_between() {
        let select =
            parse("SELECT id FROM User WHERE age BETWEEN 45 AND 55 AND name = 'Ada'").unwrap();
        let Some(Expr::Binary { op, .. }) = &select.where_clause else {
            panic!("expected a binary expr");
        };
        assert_eq!(*op, BinaryOp::And);
    }

    #[test]
    fn parses_order_limit_offset() {
        let select =
            parse("SELECT id FROM Post WHERE user_id = 3 ORDER BY id DESC LIMIT 10 OFFSET 5")
                .unwrap();
        assert_eq!(
            select.order_by,
            Some(OrderBy {
                column: "id",
                descending: true
            })
        );
        assert_eq!(select.limit, Some(10));
        assert_eq!(select.offset, Some(5));
    }

    #[test]
    fn parses_is_null_and_placeholders() {
        let select = parse("SELECT id FROM User WHERE email IS NOT NULL AND id = ?").unwrap();
        assert!(select.where_clause.is_some());
    }

    #[test]
    fn rejects_unsupported_statements() {
        for sql in [
            "INSERT INTO User VALUES (1)",
            "SELECT id FROM",
            "SELECT FROM User",
            "DELETE FROM User",
        ] {
            let err = Parser::new(sql).parse_select_statement().unwrap_err();
            assert!(
                err.downcast_ref::<EngineError>().is_some(),
                "{} SHOULD fail with a query error",
                sql
            );
        }
    }

    #[test]
    fn rejects_trailing_tokens() {
        assert!(parse("SELECT * FROM User garbage").is_err());
    }
}

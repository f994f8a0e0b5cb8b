//! Minimal IDL parser for schema declarations.
//!
//! Understands the slice of the FlatBuffers schema language the engine
//! needs:
//!
//! ```text
//! table User {
//!     id: int (id);
//!     name: string;
//!     email: string (key);
//!     age: int;
//! }
//! file_identifier "USER";
//! root_type User;
//! ```
//!
//! `namespace`, `attribute`, and `include` directives are consumed and
//! ignored; `enum`, `union`, and `struct` blocks are skipped wholesale.
//! Fields whose type is a reference to another table (or a vector of
//! anything but bytes) are not representable as cells and are skipped. A
//! field attribute named `id` or `key` (with or without a value) declares
//! the column indexed. `file_identifier` binds to the `root_type` table.

use eyre::{bail, Result};

use super::{ColumnDef, Schema, TableDef};
use crate::storage::FileId;
use crate::types::ValueType;

pub fn parse_schema(source: &str) -> Result<Schema> {
    IdlParser::new(source).parse()
}

struct IdlParser<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: u32,
}

impl<'a> IdlParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
        }
    }

    fn parse(mut self) -> Result<Schema> {
        let mut schema = Schema::default();
        let mut root_type: Option<String> = None;
        let mut file_identifier: Option<FileId> = None;

        loop {
            self.skip_trivia();
            let Some(word) = self.take_ident() else {
                break;
            };
            match word {
                "table" => schema.tables.push(self.parse_table()?),
                "struct" | "enum" | "union" => self.skip_block()?,
                "namespace" => self.skip_to_semicolon()?,
                "attribute" | "include" => self.skip_to_semicolon()?,
                "file_identifier" => {
                    self.skip_trivia();
                    let tag = self.take_string_literal()?;
                    file_identifier = Some(FileId::parse(tag)?);
                    self.expect_byte(b';')?;
                }
                "root_type" => {
                    self.skip_trivia();
                    let name = self
                        .take_ident()
                        .ok_or_else(|| eyre::eyre!("root_type needs a table name at line {}", self.line))?;
                    root_type = Some(name.to_string());
                    self.expect_byte(b';')?;
                }
                other => bail!("unexpected declaration {:?} at line {}", other, self.line),
            }
        }

        if let (Some(root), Some(id)) = (root_type, file_identifier) {
            if let Some(table) = schema.tables.iter_mut().find(|t| t.name == root) {
                table.file_id = Some(id);
            }
        }

        Ok(schema)
    }

    fn parse_table(&mut self) -> Result<TableDef> {
        self.skip_trivia();
        let name = self
            .take_ident()
            .ok_or_else(|| eyre::eyre!("table declaration needs a name at line {}", self.line))?
            .to_string();
        self.expect_byte(b'{')?;

        let mut columns = Vec::new();
        loop {
            self.skip_trivia();
            if self.consume_byte(b'}') {
                break;
            }
            if let Some(column) = self.parse_field()? {
                columns.push(column);
            }
        }

        Ok(TableDef {
            name,
            columns,
            file_id: None,
        })
    }

    /// One `name: type (attrs);` field. Returns None for fields the engine
    /// cannot represent as a cell (table references, non-byte vectors).
    fn parse_field(&mut self) -> Result<Option<ColumnDef>> {
        let name = self
            .take_ident()
            .ok_or_else(|| eyre::eyre!("expected field name at line {}", self.line))?
            .to_string();
        self.expect_byte(b':')?;
        self.skip_trivia();

        let ty = if self.consume_byte(b'[') {
            self.skip_trivia();
            let element = self
                .take_ident()
                .ok_or_else(|| eyre::eyre!("expected vector element type at line {}", self.line))?;
            let ty = match element {
                "ubyte" | "uint8" | "byte" | "int8" => Some(ValueType::Bytes),
                _ => None,
            };
            self.expect_byte(b']')?;
            ty
        } else {
            let type_name = self
                .take_ident()
                .ok_or_else(|| eyre::eyre!("expected field type at line {}", self.line))?;
            scalar_type(type_name)
        };

        // optional default value
        self.skip_trivia();
        if self.consume_byte(b'=') {
            self.skip_trivia();
            while let Some(b) = self.peek() {
                if b == b'(' || b == b';' {
                    break;
                }
                self.advance();
            }
        }

        // optional attribute list; `id` or `key` marks the column indexed
        let mut indexed = false;
        self.skip_trivia();
        if self.consume_byte(b'(') {
            loop {
                self.skip_trivia();
                let attr = self
                    .take_ident()
                    .ok_or_else(|| eyre::eyre!("expected attribute name at line {}", self.line))?;
                if attr == "id" || attr == "key" {
                    indexed = true;
                }
                self.skip_trivia();
                if self.consume_byte(b':') {
                    self.skip_trivia();
                    while let Some(b) = self.peek() {
                        if b == b',' || b == b')' {
                            break;
                        }
                        self.advance();
                    }
                }
                self.skip_trivia();
                if self.consume_byte(b',') {
                    continue;
                }
                self.expect_byte(b')')?;
                break;
            }
        }

        self.expect_byte(b';')?;
        Ok(ty.map(|ty| ColumnDef { name, ty, indexed }))
    }

    fn skip_block(&mut self) -> Result<()> {
        // consume everything up to and including the matching closing brace
        while let Some(b) = self.peek() {
            self.advance();
            if b == b'{' {
                let mut depth = 1usize;
                while let Some(inner) = self.peek() {
                    self.advance();
                    match inner {
                        b'{' => depth += 1,
                        b'}' => {
                            depth -= 1;
                            if depth == 0 {
                                return Ok(());
                            }
                        }
                        b'\n' => self.line += 1,
                        _ => {}
                    }
                }
                bail!("unterminated block at line {}", self.line);
            }
            if b == b'\n' {
                self.line += 1;
            }
        }
        bail!("expected a block at line {}", self.line)
    }

    fn skip_to_semicolon(&mut self) -> Result<()> {
        while let Some(b) = self.peek() {
            self.advance();
            if b == b';' {
                return Ok(());
            }
            if b == b'\n' {
                self.line += 1;
            }
        }
        bail!("unterminated declaration at line {}", self.line)
    }

    fn take_string_literal(&mut self) -> Result<&'a str> {
        if !self.consume_byte(b'"') {
            bail!("expected string literal at line {}", self.line);
        }
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == b'"' {
                let text = std::str::from_utf8(&self.bytes[start..self.pos])?;
                self.advance();
                return Ok(text);
            }
            self.advance();
        }
        bail!("unterminated string literal at line {}", self.line)
    }

    fn take_ident(&mut self) -> Option<&'a str> {
        self.skip_trivia();
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || b == b'_' || b == b'.' {
                self.advance();
            } else {
                break;
            }
        }
        if self.pos == start {
            return None;
        }
        std::str::from_utf8(&self.bytes[start..self.pos]).ok()
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b) if b.is_ascii_whitespace() => {
                    if b == b'\n' {
                        self.line += 1;
                    }
                    self.advance();
                }
                Some(b'/') if self.bytes.get(self.pos + 1) == Some(&b'/') => {
                    while let Some(b) = self.peek() {
                        self.advance();
                        if b == b'\n' {
                            self.line += 1;
                            break;
                        }
                    }
                }
                Some(b'/') if self.bytes.get(self.pos + 1) == Some(&b'*') => {
                    self.advance();
                    self.advance();
                    while let Some(b) = self.peek() {
                        self.advance();
                        if b == b'\n' {
                            self.line += 1;
                        }
                        if b == b'*' && self.peek() == Some(b'/') {
                            self.advance();
                            break;
                        }
                    }
                }
                _ => return,
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn consume_byte(&mut self, expected: u8) -> bool {
        self.skip_trivia();
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_byte(&mut self, expected: u8) -> Result<()> {
        if self.consume_byte(expected) {
            Ok(())
        } else {
            bail!(
                "expected {:?} at line {}, found {:?}",
                expected as char,
                self.line,
                self.peek().map(|b| b as char)
            )
        }
    }
}

fn scalar_type(name: &str) -> Option<ValueType> {
    match name {
        "bool" => Some(ValueType::Bool),
        "byte" | "int8" => Some(ValueType::Int8),
        "ubyte" | "uint8" => Some(ValueType::UInt8),
        "short" | "int16" => Some(ValueType::Int16),
        "ushort" | "uint16" => Some(ValueType::UInt16),
        "int" | "int32" => Some(ValueType::Int32),
        "uint" | "uint32" => Some(ValueType::UInt32),
        "long" | "int64" => Some(ValueType::Int64),
        "ulong" | "uint64" => Some(ValueType::UInt64),
        "float" | "float32" => Some(ValueType::Float32),
        "double" | "float64" => Some(ValueType::Float64),
        "string" => Some(ValueType::String),
        _ => None,
    }
}

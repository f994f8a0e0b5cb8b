//! # SQL Query Layer
//!
//! Parses and executes the SELECT dialect the engine serves. The layer is a
//! straight pipeline:
//!
//! ```text
//! SQL string
//!     │  lexer: zero-copy tokens borrowing the input
//!     ▼
//! Select AST
//!     │  planner: WHERE conjuncts → one access path (index eq / range / scan)
//!     ▼
//! candidate records from the chosen path
//!     │  executor: lazy cell extraction, residual predicate, ORDER/LIMIT,
//!     ▼            projection, COUNT(*)
//! QueryResult { columns, rows }
//! ```
//!
//! The planner chooses at most one index: an equality constraint on an
//! indexed column wins, then a bounded range on one indexed column, then a
//! half-open bound, then a full scan. Whatever the path, the executor
//! re-evaluates the complete WHERE tree against each materialized row, so
//! the path only ever narrows candidates and never changes results.
//!
//! Every relation carries four hidden columns addressable by explicit name:
//! `_source` (table name), `_rowid` (sequence), `_offset` (byte offset of
//! the record's frame), `_data` (the raw payload bytes). `SELECT *` expands
//! declared columns only.

pub mod ast;
pub mod executor;
pub mod lexer;
pub mod parser;
pub mod planner;
pub mod predicate;
pub mod token;

pub use ast::{BinaryOp, Expr, Literal, OrderBy, Select, SelectItem};
pub use executor::{execute_select, QueryResult};
pub use lexer::Lexer;
pub use parser::Parser;
pub use token::{Keyword, Token};

/// Hidden column names every relation exposes.
pub const HIDDEN_SOURCE: &str = "_source";
pub const HIDDEN_ROWID: &str = "_rowid";
pub const HIDDEN_OFFSET: &str = "_offset";
pub const HIDDEN_DATA: &str = "_data";

pub fn is_hidden_column(name: &str) -> bool {
    matches!(name, HIDDEN_SOURCE | HIDDEN_ROWID | HIDDEN_OFFSET | HIDDEN_DATA)
}

//! # Engine Error Kinds
//!
//! Typed error values for the failure modes the engine owes callers a
//! distinguishable answer for. Everything is surfaced through `eyre::Result`;
//! callers that need to branch on a kind use `Report::downcast_ref`.
//!
//! | Kind | Raised by |
//! |------|-----------|
//! | `MalformedFrame` | framed-record ingest with an inconsistent size prefix |
//! | `TableNotFound` | direct-access APIs naming an unknown table |
//! | `ColumnNotIndexed` | index lookups on a column never declared indexed |
//! | `UnknownFileId` | synchronous routing APIs (streaming ingest absorbs it) |
//! | `Query` | SQL parse/plan/execute failures, surfaced verbatim |
//! | `Internal` | invariant violations; indicates a bug |

use crate::storage::FileId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    MalformedFrame { declared: usize, available: usize },
    TableNotFound(String),
    ColumnNotIndexed { table: String, column: String },
    UnknownFileId(FileId),
    Query(String),
    Internal(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::MalformedFrame {
                declared,
                available,
            } => write!(
                f,
                "malformed frame: size prefix declares {} bytes but {} are available",
                declared, available
            ),
            EngineError::TableNotFound(name) => write!(f, "table not found: {}", name),
            EngineError::ColumnNotIndexed { table, column } => {
                write!(f, "column {}.{} is not indexed", table, column)
            }
            EngineError::UnknownFileId(id) => write!(f, "no table registered for file id {}", id),
            EngineError::Query(msg) => write!(f, "query error: {}", msg),
            EngineError::Internal(msg) => write!(f, "internal invariant violated: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

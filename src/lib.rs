//! # FlatSQL - Streaming SQL over Self-Describing Records
//!
//! FlatSQL is an embeddable, append-only query engine for streams of
//! size-prefixed binary records. Records arrive pre-serialized, land
//! verbatim in an append-only log, and are queried in place — column access
//! goes through host-supplied field extractors, so the engine itself never
//! deserializes a payload.
//!
//! ## Quick Start
//!
//! ```ignore
//! use flatsql::{Database, Value};
//!
//! let schema = r#"
//!     table User {
//!         id: int (id);
//!         name: string;
//!         age: int (key);
//!     }
//!     file_identifier "USER";
//!     root_type User;
//! "#;
//!
//! let mut db = Database::from_schema(schema, "app")?;
//! db.set_field_extractor("User", Box::new(extract_user_field))?;
//!
//! db.ingest(&stream_chunk)?;
//! let result = db.query("SELECT name FROM User WHERE id = 42")?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            Database (routing)            │
//! ├─────────────────────────────────────────┤
//! │  SQL Layer (lexer/parser/plan/execute)   │
//! ├──────────────────┬──────────────────────┤
//! │   TableStore     │    FieldExtractor    │
//! │ (per-table state)│    (host-supplied)   │
//! ├──────────────────┴──────────────────────┤
//! │        B-Tree Indexes (per column)       │
//! ├─────────────────────────────────────────┤
//! │   StreamLog (append-only frame buffer)   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Ingest flows down: bytes are split into frames by size prefix, routed by
//! the 4-byte file identifier at payload bytes [4..8), and every indexed
//! column of a routed record is extracted once and posted to its index.
//! Queries flow the other way: the planner maps WHERE constraints onto one
//! index probe, range, or scan, and the executor materializes cells lazily
//! from the raw log slices.
//!
//! ## Properties
//!
//! - Sequences are dense, start at 1, equal ingest order, and survive
//!   export/reload bit-identically.
//! - Partial stream chunks are never an error: `ingest` reports how many
//!   bytes it absorbed and the caller re-presents the tail.
//! - Indexes answer point and range lookups in `(key, sequence)` order,
//!   duplicates included.
//! - Single-threaded by contract; no locks, no background work.
//!
//! ## Module Overview
//!
//! - [`storage`]: append-only frame log and addressing maps
//! - [`index`]: value-keyed B-tree with typed fast paths
//! - [`table`]: per-table stores and the extractor seam
//! - [`schema`]: IDL schema model and parser
//! - [`sql`]: SELECT dialect — lexer, parser, planner, executor
//! - [`database`]: composition root and public surface

pub mod database;
pub mod error;
pub mod index;
pub mod schema;
pub mod sql;
pub mod storage;
pub mod table;
pub mod types;

pub use database::Database;
pub use error::EngineError;
pub use index::{BTreeIndex, IndexEntry};
pub use schema::{parse_schema, ColumnDef, Schema, TableDef};
pub use sql::QueryResult;
pub use storage::{FileId, IngestReport, RecordHeader, RecordRef, StoredRecord, StreamLog};
pub use table::{FieldExtractor, TableStats, TableStore};
pub use types::{compare_values, Value, ValueType};

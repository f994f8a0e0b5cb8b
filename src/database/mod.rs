//! # Database
//!
//! The composition root: one log, the per-table stores, and the
//! file-id→table routing map. All ingest entry points funnel through the
//! log, whose per-record callback routes each committed record to its
//! table store for index maintenance. Records with an unregistered file id
//! are stored but route nowhere — mixed streams are expected and
//! drop-what-you-don't-know is the contract.
//!
//! ## Ordering guarantees
//!
//! Single-threaded and synchronous throughout: sequences equal ingest
//! order, every index reflects a record before `ingest*` returns, and a
//! query started afterwards sees all of it. A `Database` is one exclusive
//! owner's value; wrap it yourself if you need to share.
//!
//! ## Lifecycle
//!
//! Built from a schema, grown by ingest, reset only by `load_and_rebuild`
//! (which replays an exported blob through the same pipeline, so indexes
//! reconstruct themselves), dropped as a unit.

use eyre::Result;
use hashbrown::HashMap;

use crate::error::EngineError;
use crate::schema::parse_schema;
use crate::sql::{execute_select, Parser, QueryResult};
use crate::storage::{FileId, IngestReport, RecordRef, StoredRecord, StreamLog};
use crate::table::{FieldExtractor, TableStats, TableStore};
use crate::types::Value;

pub struct Database {
    name: String,
    log: StreamLog,
    tables: HashMap<String, TableStore>,
    table_order: Vec<String>,
    routing: HashMap<FileId, String>,
}

impl Database {
    /// Builds a database from IDL schema text. Tables, indexed columns, and
    /// a `file_identifier`/`root_type` pair all take effect; further file
    /// ids are registered with [`Database::register_file_id`].
    pub fn from_schema(schema_source: &str, name: impl Into<String>) -> Result<Database> {
        let schema = parse_schema(schema_source)?;
        let mut db = Database {
            name: name.into(),
            log: StreamLog::new(),
            tables: HashMap::new(),
            table_order: Vec::new(),
            routing: HashMap::new(),
        };

        for table_def in schema.tables {
            let mut store = TableStore::new(table_def.name.clone(), table_def.columns.clone());
            for column in &table_def.columns {
                if column.indexed {
                    store.declare_index(&column.name, column.ty);
                }
            }
            if let Some(file_id) = table_def.file_id {
                store.set_file_id(file_id);
                db.routing.insert(file_id, table_def.name.clone());
            }
            db.table_order.push(table_def.name.clone());
            db.tables.insert(table_def.name, store);
        }

        Ok(db)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Routes records tagged `file_id` (a 4-character ASCII tag) to `table`.
    pub fn register_file_id(&mut self, file_id: &str, table: &str) -> Result<()> {
        let id = FileId::parse(file_id)?;
        let store = self
            .tables
            .get_mut(table)
            .ok_or_else(|| EngineError::TableNotFound(table.to_string()))?;
        store.set_file_id(id);
        self.routing.insert(id, table.to_string());
        Ok(())
    }

    /// Registers the column extractor for `table`. Must happen before the
    /// first ingest for declared indexes to populate; scans and lazy column
    /// reads work from the moment it is set.
    pub fn set_field_extractor(
        &mut self,
        table: &str,
        extractor: Box<dyn FieldExtractor>,
    ) -> Result<()> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| EngineError::TableNotFound(table.to_string()))?
            .set_extractor(extractor);
        Ok(())
    }

    fn table(&self, name: &str) -> Result<&TableStore> {
        self.tables
            .get(name)
            .ok_or_else(|| EngineError::TableNotFound(name.to_string()).into())
    }

    /// Streams a chunk of concatenated frames. Complete frames are
    /// committed, routed, and indexed; the report says how many bytes were
    /// absorbed so the caller can carry the unconsumed tail into the next
    /// chunk.
    pub fn ingest(&mut self, bytes: &[u8]) -> Result<IngestReport> {
        let Database {
            log,
            tables,
            routing,
            ..
        } = self;
        let mut failure: Option<eyre::Report> = None;
        let report = log.ingest_batch(bytes, |file_id, payload, sequence, offset| {
            route_record(
                tables,
                routing,
                &mut failure,
                file_id,
                payload,
                sequence,
                offset,
            );
        });
        match failure {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }

    /// Ingests one bare record payload (no size prefix).
    pub fn ingest_one(&mut self, payload: &[u8]) -> Result<u64> {
        let Database {
            log,
            tables,
            routing,
            ..
        } = self;
        let mut failure: Option<eyre::Report> = None;
        let sequence = log.ingest_unframed(payload, |file_id, payload, sequence, offset| {
            route_record(
                tables,
                routing,
                &mut failure,
                file_id,
                payload,
                sequence,
                offset,
            );
        });
        match failure {
            Some(err) => Err(err),
            None => Ok(sequence),
        }
    }

    /// Ingests exactly one size-prefixed record.
    pub fn ingest_one_framed(&mut self, bytes: &[u8]) -> Result<u64> {
        let Database {
            log,
            tables,
            routing,
            ..
        } = self;
        let mut failure: Option<eyre::Report> = None;
        let sequence = log.ingest_one_framed(bytes, |file_id, payload, sequence, offset| {
            route_record(
                tables,
                routing,
                &mut failure,
                file_id,
                payload,
                sequence,
                offset,
            );
        })?;
        match failure {
            Some(err) => Err(err),
            None => Ok(sequence),
        }
    }

    /// Runs a SELECT statement.
    pub fn query(&self, sql: &str) -> Result<QueryResult> {
        self.query_with(sql, &[])
    }

    /// Runs a SELECT statement with positional `?` bindings.
    pub fn query_with(&self, sql: &str, bindings: &[Value<'static>]) -> Result<QueryResult> {
        let select = Parser::new(sql).parse_select_statement()?;
        let table = self.table(select.table)?;
        execute_select(&select, table, &self.log, bindings)
    }

    /// All records whose indexed `column` equals `key`, as owned copies.
    pub fn find_by_index(
        &self,
        table: &str,
        column: &str,
        key: &Value,
    ) -> Result<Vec<StoredRecord>> {
        self.table(table)?.find_by_index(&self.log, column, key)
    }

    /// First matching record only.
    pub fn find_one_by_index(
        &self,
        table: &str,
        column: &str,
        key: &Value,
    ) -> Result<Option<StoredRecord>> {
        self.table(table)?.find_one_by_index(&self.log, column, key)
    }

    /// First matching record as a zero-copy view; invalidated by the next
    /// ingest.
    pub fn find_raw_by_index(
        &self,
        table: &str,
        column: &str,
        key: &Value,
    ) -> Result<Option<RecordRef<'_>>> {
        self.table(table)?.find_raw_by_index(&self.log, column, key)
    }

    /// Walks every record of `table` in insertion order; the callback
    /// returns false to halt. Returns the number of records visited.
    pub fn iterate_all<F>(&self, table: &str, f: F) -> Result<usize>
    where
        F: FnMut(RecordRef<'_>) -> bool,
    {
        Ok(self.table(table)?.iterate_all(&self.log, f))
    }

    /// The whole log in wire format; feed it back to `load_and_rebuild`.
    pub fn export_data(&self) -> Vec<u8> {
        self.log.export_data()
    }

    /// Drops all log and index state, then replays `blob` through the
    /// normal ingest pipeline.
    pub fn load_and_rebuild(&mut self, blob: &[u8]) -> Result<IngestReport> {
        for store in self.tables.values_mut() {
            store.clear_indexes();
        }
        let Database {
            log,
            tables,
            routing,
            ..
        } = self;
        let mut failure: Option<eyre::Report> = None;
        let report = log.load_and_rebuild(blob, |file_id, payload, sequence, offset| {
            route_record(
                tables,
                routing,
                &mut failure,
                file_id,
                payload,
                sequence,
                offset,
            );
        });
        match failure {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }

    pub fn list_tables(&self) -> Vec<String> {
        self.table_order.clone()
    }

    pub fn stats(&self) -> Vec<TableStats> {
        self.table_order
            .iter()
            .filter_map(|name| self.tables.get(name))
            .map(|store| store.stats(&self.log))
            .collect()
    }

    pub fn record_count(&self) -> u64 {
        self.log.record_count()
    }

    pub fn data_size(&self) -> u64 {
        self.log.data_size()
    }
}

/// Shared ingest callback body: route one committed record to its table
/// store. Unknown file ids are dropped silently; the record stays in the
/// log. The first indexing failure is captured and aborts the operation
/// once the log callback unwinds.
#[allow(clippy::too_many_arguments)]
fn route_record(
    tables: &mut HashMap<String, TableStore>,
    routing: &HashMap<FileId, String>,
    failure: &mut Option<eyre::Report>,
    file_id: FileId,
    payload: &[u8],
    sequence: u64,
    offset: u64,
) {
    if failure.is_some() {
        return;
    }
    let Some(table_name) = routing.get(&file_id) else {
        return;
    };
    let Some(store) = tables.get_mut(table_name) else {
        return;
    };
    if let Err(err) = store.on_ingest(payload, sequence, offset) {
        *failure = Some(err);
    }
}

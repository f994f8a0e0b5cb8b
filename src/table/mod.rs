//! # Per-Table Stores
//!
//! A `TableStore` owns everything table-scoped: the declared columns, the
//! per-column indexes, and the host-supplied field extractor. It does *not*
//! own (or point back into) the log — the log slice is passed into every
//! query method, so ownership stays a tree and zero-copy borrows stay tied
//! to the caller's log reference.
//!
//! ## Extraction
//!
//! The engine never parses record payloads. Column access goes through the
//! [`FieldExtractor`] the host registers per table: given the raw payload
//! slice and a column name it returns the cell value, borrowing from the
//! slice where it can. Extractors must be pure and must not retain the
//! slice. Extraction is lazy — a column is only extracted when it is
//! indexed at ingest or actually touched by a query.
//!
//! Index maintenance happens inline with ingest: each declared index gets
//! exactly one entry per routed record, Null values included, so indexes
//! stay dense and entry counts match record counts.

use eyre::Result;
use hashbrown::HashMap;

use crate::error::EngineError;
use crate::index::BTreeIndex;
use crate::schema::ColumnDef;
use crate::storage::{FileId, RecordRef, StoredRecord, StreamLog};
use crate::types::{try_int64, Value, ValueType};

/// Host-supplied column accessor for one table's records.
pub trait FieldExtractor {
    /// Returns the cell value of `column` within the raw record `data`.
    /// Unknown columns yield `Value::Null`.
    fn extract<'a>(&self, data: &'a [u8], column: &str) -> Value<'a>;

    /// Batch variant: fills `out` with one value per entry of `columns` in a
    /// single dispatch. The default forwards to `extract`.
    fn extract_all<'a>(&self, data: &'a [u8], columns: &[String], out: &mut Vec<Value<'a>>) {
        out.clear();
        out.extend(columns.iter().map(|c| self.extract(data, c)));
    }
}

impl<F> FieldExtractor for F
where
    F: for<'a> Fn(&'a [u8], &str) -> Value<'a>,
{
    fn extract<'a>(&self, data: &'a [u8], column: &str) -> Value<'a> {
        self(data, column)
    }
}

/// Snapshot of one table's ingest state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStats {
    pub table_name: String,
    pub file_id: Option<FileId>,
    pub record_count: u64,
    pub indexes: Vec<String>,
}

pub struct TableStore {
    name: String,
    file_id: Option<FileId>,
    columns: Vec<ColumnDef>,
    column_names: Vec<String>,
    extractor: Option<Box<dyn FieldExtractor>>,
    indexes: HashMap<String, BTreeIndex>,
    index_order: Vec<String>,
}

impl TableStore {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        let column_names = columns.iter().map(|c| c.name.clone()).collect();
        Self {
            name: name.into(),
            file_id: None,
            columns,
            column_names,
            extractor: None,
            indexes: HashMap::new(),
            index_order: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_id(&self) -> Option<FileId> {
        self.file_id
    }

    pub fn set_file_id(&mut self, file_id: FileId) {
        self.file_id = Some(file_id);
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Creates the empty index for `column`. Idempotent per column.
    pub fn declare_index(&mut self, column: &str, key_type: ValueType) {
        if self.indexes.contains_key(column) {
            return;
        }
        self.indexes
            .insert(column.to_string(), BTreeIndex::new(key_type));
        self.index_order.push(column.to_string());
    }

    pub fn set_extractor(&mut self, extractor: Box<dyn FieldExtractor>) {
        self.extractor = Some(extractor);
    }

    pub fn has_extractor(&self) -> bool {
        self.extractor.is_some()
    }

    pub fn indexed_columns(&self) -> &[String] {
        &self.index_order
    }

    pub fn has_index(&self, column: &str) -> bool {
        self.indexes.contains_key(column)
    }

    pub fn index_for(&self, column: &str) -> Result<&BTreeIndex> {
        self.indexes.get(column).ok_or_else(|| {
            EngineError::ColumnNotIndexed {
                table: self.name.clone(),
                column: column.to_string(),
            }
            .into()
        })
    }

    /// Ingest hook: extracts every indexed column of the new record and
    /// posts it to the matching index. Null extractions are posted too, so
    /// the index stays dense. A table without an extractor keeps its records
    /// scannable but unindexed.
    pub fn on_ingest(&mut self, payload: &[u8], sequence: u64, offset: u64) -> Result<()> {
        let Some(extractor) = &self.extractor else {
            return Ok(());
        };
        for column in &self.index_order {
            let key = extractor.extract(payload, column).to_owned_static();
            let index = self.indexes.get_mut(column).ok_or_else(|| {
                EngineError::Internal(format!("declared index {} has no tree", column))
            })?;
            index.insert(key, offset, payload.len() as u32, sequence)?;
        }
        Ok(())
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Lazily extracts one column from a raw payload.
    pub fn column_value<'a>(&self, payload: &'a [u8], column: &str) -> Result<Value<'a>> {
        let extractor = self.extractor.as_deref().ok_or_else(|| {
            EngineError::Query(format!("no field extractor registered for table {}", self.name))
        })?;
        Ok(extractor.extract(payload, column))
    }

    /// Extracts every declared column of one record in a single extractor
    /// dispatch.
    pub fn all_column_values<'a>(
        &self,
        payload: &'a [u8],
        out: &mut Vec<Value<'a>>,
    ) -> Result<()> {
        let extractor = self.extractor.as_deref().ok_or_else(|| {
            EngineError::Query(format!("no field extractor registered for table {}", self.name))
        })?;
        extractor.extract_all(payload, &self.column_names, out);
        Ok(())
    }

    /// All records whose indexed `column` equals `key`, materialized as
    /// owned copies in `(key, sequence)` order.
    pub fn find_by_index(
        &self,
        log: &StreamLog,
        column: &str,
        key: &Value,
    ) -> Result<Vec<StoredRecord>> {
        let entries = self.index_for(column)?.search_all(key)?;
        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            records.push(log.read_by_sequence(entry.sequence)?);
        }
        Ok(records)
    }

    /// First match only, materialized.
    pub fn find_one_by_index(
        &self,
        log: &StreamLog,
        column: &str,
        key: &Value,
    ) -> Result<Option<StoredRecord>> {
        match self.index_for(column)?.search_first(key)? {
            Some(entry) => Ok(Some(log.read_by_sequence(entry.sequence)?)),
            None => Ok(None),
        }
    }

    /// First match as a zero-copy view into the log. Integer and string
    /// keys take the typed index fast paths.
    pub fn find_raw_by_index<'log>(
        &self,
        log: &'log StreamLog,
        column: &str,
        key: &Value,
    ) -> Result<Option<RecordRef<'log>>> {
        let index = self.index_for(column)?;
        let hit = if let Some(int_key) = try_int64(key) {
            index.search_first_int64(int_key)?
        } else if let Some(str_key) = key.as_str() {
            index.search_first_str(str_key)?
        } else {
            index
                .search_first(key)?
                .map(|e| (e.data_offset, e.data_length, e.sequence))
        };
        match hit {
            Some((offset, _, sequence)) => Ok(Some(RecordRef {
                offset,
                sequence,
                data: log.data_at_offset(offset)?,
            })),
            None => Ok(None),
        }
    }

    /// Walks every record routed to this table in insertion order. The
    /// callback returns false to halt. Returns the number of records
    /// visited.
    pub fn iterate_all<F>(&self, log: &StreamLog, mut f: F) -> usize
    where
        F: FnMut(RecordRef<'_>) -> bool,
    {
        let Some(file_id) = self.file_id else {
            return 0;
        };
        let mut visited = 0;
        log.for_each_ref(file_id, |record| {
            visited += 1;
            f(record)
        });
        visited
    }

    pub fn stats(&self, log: &StreamLog) -> TableStats {
        TableStats {
            table_name: self.name.clone(),
            file_id: self.file_id,
            record_count: self
                .file_id
                .map_or(0, |id| log.record_count_for(id) as u64),
            indexes: self.index_order.clone(),
        }
    }

    /// Drops every index entry; used by reload before the log replays.
    pub fn clear_indexes(&mut self) {
        for index in self.indexes.values_mut() {
            index.clear();
        }
    }
}

//! Append-only log of size-prefixed records.
//!
//! `StreamLog` owns the byte buffer and the three addressing maps. Every
//! ingest entry point funnels through one commit path, so the invariants
//! (sequence allocated after the bytes are down, maps updated before the
//! callback fires, exactly one callback per committed record) hold for
//! batch, single-framed, and bare-payload ingest alike.

use eyre::Result;
use hashbrown::HashMap;

use super::{
    read_size_prefix, FileId, DEFAULT_INITIAL_CAPACITY, FILE_ID_LEN, FILE_ID_OFFSET,
    FRAME_PREFIX_LEN,
};
use crate::error::EngineError;

/// Identity of one committed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub file_id: FileId,
    pub sequence: u64,
    pub offset: u64,
    pub length: u32,
}

/// Owned copy of a committed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub header: RecordHeader,
    pub data: Vec<u8>,
}

/// Borrowed view of a committed record; valid until the next `ingest_*`
/// or `load_and_rebuild` on the owning log.
#[derive(Debug, Clone, Copy)]
pub struct RecordRef<'a> {
    pub offset: u64,
    pub sequence: u64,
    pub data: &'a [u8],
}

/// Outcome of a batch ingest: how far the input was consumed and how many
/// complete records were committed. The caller keeps the unconsumed tail
/// and re-appends it in front of the next chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestReport {
    pub bytes_consumed: usize,
    pub records_processed: usize,
}

#[derive(Debug, Clone, Copy)]
struct FileRecordInfo {
    offset: u64,
    sequence: u64,
}

pub struct StreamLog {
    data: Vec<u8>,
    write_offset: u64,
    record_count: u64,
    next_sequence: u64,
    sequence_to_offset: HashMap<u64, u64>,
    offset_to_sequence: HashMap<u64, u64>,
    file_records: HashMap<FileId, Vec<FileRecordInfo>>,
}

impl Default for StreamLog {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamLog {
    pub fn new() -> Self {
        Self::with_initial_capacity(DEFAULT_INITIAL_CAPACITY)
    }

    pub fn with_initial_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity.max(1)),
            write_offset: 0,
            record_count: 0,
            next_sequence: 1,
            sequence_to_offset: HashMap::new(),
            offset_to_sequence: HashMap::new(),
            file_records: HashMap::new(),
        }
    }

    /// Extracts the routing tag from payload bytes [4..8). Short payloads
    /// get the zero id: stored, sequenced, routed nowhere.
    pub fn extract_file_id(payload: &[u8]) -> FileId {
        match payload.get(FILE_ID_OFFSET..FILE_ID_OFFSET + FILE_ID_LEN) {
            Some(bytes) => {
                let mut id = [0u8; FILE_ID_LEN];
                id.copy_from_slice(bytes);
                FileId(id)
            }
            None => FileId::ZERO,
        }
    }

    fn ensure_capacity(&mut self, additional: usize) {
        let required = self.data.len() + additional;
        if required <= self.data.capacity() {
            return;
        }
        let mut capacity = self.data.capacity().max(1);
        while capacity < required {
            capacity *= 2;
        }
        self.data.reserve_exact(capacity - self.data.len());
    }

    /// Commits one payload: frame bytes first, then the sequence, then the
    /// maps. Returns what the per-record callback needs.
    fn commit(&mut self, payload: &[u8]) -> (FileId, u64, u64) {
        let offset = self.write_offset;
        self.ensure_capacity(FRAME_PREFIX_LEN + payload.len());
        self.data
            .extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.data.extend_from_slice(payload);
        self.write_offset = self.data.len() as u64;

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.record_count += 1;

        self.sequence_to_offset.insert(sequence, offset);
        self.offset_to_sequence.insert(offset, sequence);

        let file_id = Self::extract_file_id(payload);
        self.file_records
            .entry(file_id)
            .or_default()
            .push(FileRecordInfo { offset, sequence });

        (file_id, sequence, offset)
    }

    #[inline]
    fn payload_range(&self, offset: u64, length: usize) -> std::ops::Range<usize> {
        let start = offset as usize + FRAME_PREFIX_LEN;
        start..start + length
    }

    /// Consumes zero or more complete frames from the front of `bytes`,
    /// stopping at the first incomplete one. Guarantees forward progress on
    /// any byte stream, including a one-byte-at-a-time drip.
    pub fn ingest_batch<F>(&mut self, bytes: &[u8], mut on_record: F) -> IngestReport
    where
        F: FnMut(FileId, &[u8], u64, u64),
    {
        let mut pos = 0usize;
        let mut records = 0usize;

        while let Some(size) = read_size_prefix(&bytes[pos..]) {
            let size = size as usize;
            if bytes.len() - pos < FRAME_PREFIX_LEN + size {
                break;
            }
            let payload = &bytes[pos + FRAME_PREFIX_LEN..pos + FRAME_PREFIX_LEN + size];
            let (file_id, sequence, offset) = self.commit(payload);
            let stored = &self.data[self.payload_range(offset, size)];
            on_record(file_id, stored, sequence, offset);
            pos += FRAME_PREFIX_LEN + size;
            records += 1;
        }

        IngestReport {
            bytes_consumed: pos,
            records_processed: records,
        }
    }

    /// Consumes exactly one framed record. The declared size must match the
    /// input length exactly.
    pub fn ingest_one_framed<F>(&mut self, bytes: &[u8], mut on_record: F) -> Result<u64>
    where
        F: FnMut(FileId, &[u8], u64, u64),
    {
        let size = read_size_prefix(bytes).ok_or(EngineError::MalformedFrame {
            declared: 0,
            available: bytes.len(),
        })? as usize;
        if bytes.len() != FRAME_PREFIX_LEN + size {
            return Err(EngineError::MalformedFrame {
                declared: size,
                available: bytes.len().saturating_sub(FRAME_PREFIX_LEN),
            }
            .into());
        }
        let payload = &bytes[FRAME_PREFIX_LEN..];
        let (file_id, sequence, offset) = self.commit(payload);
        let stored = &self.data[self.payload_range(offset, size)];
        on_record(file_id, stored, sequence, offset);
        Ok(sequence)
    }

    /// Wraps a size prefix around a bare payload and appends it.
    pub fn ingest_unframed<F>(&mut self, payload: &[u8], mut on_record: F) -> u64
    where
        F: FnMut(FileId, &[u8], u64, u64),
    {
        let (file_id, sequence, offset) = self.commit(payload);
        let stored = &self.data[self.payload_range(offset, payload.len())];
        on_record(file_id, stored, sequence, offset);
        sequence
    }

    /// Resets the log and replays `blob` as a stream through the normal
    /// ingest path, re-firing the callback so dependent state rebuilds.
    pub fn load_and_rebuild<F>(&mut self, blob: &[u8], on_record: F) -> IngestReport
    where
        F: FnMut(FileId, &[u8], u64, u64),
    {
        self.clear();
        self.ingest_batch(blob, on_record)
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.write_offset = 0;
        self.record_count = 0;
        self.next_sequence = 1;
        self.sequence_to_offset.clear();
        self.offset_to_sequence.clear();
        self.file_records.clear();
    }

    /// Zero-copy payload slice for the frame starting at `offset`.
    pub fn data_at_offset(&self, offset: u64) -> Result<&[u8]> {
        let start = offset as usize;
        let size = read_size_prefix(self.data.get(start..).unwrap_or(&[])).ok_or_else(|| {
            EngineError::Internal(format!("offset {} past write offset {}", offset, self.write_offset))
        })? as usize;
        let range = self.payload_range(offset, size);
        self.data
            .get(range)
            .ok_or_else(|| {
                EngineError::Internal(format!(
                    "frame at offset {} declares {} bytes past the committed buffer",
                    offset, size
                ))
                .into()
            })
    }

    pub fn has_sequence(&self, sequence: u64) -> bool {
        self.sequence_to_offset.contains_key(&sequence)
    }

    pub fn offset_for_sequence(&self, sequence: u64) -> Option<u64> {
        self.sequence_to_offset.get(&sequence).copied()
    }

    pub fn sequence_for_offset(&self, offset: u64) -> Option<u64> {
        self.offset_to_sequence.get(&offset).copied()
    }

    /// Copies out the record committed under `sequence`.
    pub fn read_by_sequence(&self, sequence: u64) -> Result<StoredRecord> {
        let offset = self
            .offset_for_sequence(sequence)
            .ok_or_else(|| eyre::eyre!("no record with sequence {}", sequence))?;
        let data = self.data_at_offset(offset)?;
        Ok(StoredRecord {
            header: RecordHeader {
                file_id: Self::extract_file_id(data),
                sequence,
                offset,
                length: data.len() as u32,
            },
            data: data.to_vec(),
        })
    }

    /// Visits each record carrying `file_id` in insertion order, without
    /// copying. The callback returns false to halt.
    pub fn for_each_ref<F>(&self, file_id: FileId, mut f: F)
    where
        F: FnMut(RecordRef<'_>) -> bool,
    {
        let Some(records) = self.file_records.get(&file_id) else {
            return;
        };
        for info in records {
            let data = match self.data_at_offset(info.offset) {
                Ok(d) => d,
                Err(_) => return,
            };
            if !f(RecordRef {
                offset: info.offset,
                sequence: info.sequence,
                data,
            }) {
                return;
            }
        }
    }

    /// Visits each record carrying `file_id` in insertion order, copying
    /// each. The callback returns false to halt.
    pub fn for_each_stored<F>(&self, file_id: FileId, mut f: F)
    where
        F: FnMut(&StoredRecord) -> bool,
    {
        let Some(records) = self.file_records.get(&file_id) else {
            return;
        };
        for info in records {
            let record = match self.read_by_sequence(info.sequence) {
                Ok(r) => r,
                Err(_) => return,
            };
            if !f(&record) {
                return;
            }
        }
    }

    /// Visits every committed record in sequence order, copying each.
    pub fn for_each_record<F>(&self, mut f: F)
    where
        F: FnMut(&StoredRecord) -> bool,
    {
        for sequence in 1..=self.record_count {
            let record = match self.read_by_sequence(sequence) {
                Ok(r) => r,
                Err(_) => return,
            };
            if !f(&record) {
                return;
            }
        }
    }

    /// O(1) random access to the i-th record of a file-id bucket.
    pub fn record_by_index(&self, file_id: FileId, index: usize) -> Option<RecordRef<'_>> {
        let info = self.file_records.get(&file_id)?.get(index)?;
        let data = self.data_at_offset(info.offset).ok()?;
        Some(RecordRef {
            offset: info.offset,
            sequence: info.sequence,
            data,
        })
    }

    pub fn record_count_for(&self, file_id: FileId) -> usize {
        self.file_records.get(&file_id).map_or(0, Vec::len)
    }

    /// The live prefix `[0, write_offset)` as an owned blob, in the exact
    /// wire format `load_and_rebuild` consumes.
    pub fn export_data(&self) -> Vec<u8> {
        self.data[..self.write_offset as usize].to_vec()
    }

    pub fn raw_data(&self) -> &[u8] {
        &self.data[..self.write_offset as usize]
    }

    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    pub fn data_size(&self) -> u64 {
        self.write_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(payload: &[u8]) -> Vec<u8> {
        let mut out = (payload.len() as u32).to_le_bytes().to_vec();
        out.extend_from_slice(payload);
        out
    }

    fn payload_with_id(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut p = vec![8, 0, 0, 0];
        p.extend_from_slice(id);
        p.extend_from_slice(body);
        p
    }

    #[test]
    fn batch_consumes_complete_frames_and_reports_position() {
        let mut log = StreamLog::new();
        let mut stream = frame(&payload_with_id(b"AAAA", &[1, 2, 3]));
        stream.extend_from_slice(&frame(&payload_with_id(b"BBBB", &[4])));
        stream.extend_from_slice(&[9, 0, 0]); // truncated prefix

        let mut seen = Vec::new();
        let report = log.ingest_batch(&stream, |id, data, seq, off| {
            seen.push((id, data.len(), seq, off));
        });

        assert_eq!(report.bytes_consumed, stream.len() - 3);
        assert_eq!(report.records_processed, 2);
        assert_eq!(seen[0], (FileId(*b"AAAA"), 11, 1, 0));
        assert_eq!(seen[1], (FileId(*b"BBBB"), 9, 2, 15));
    }

    #[test]
    fn batch_stops_on_incomplete_payload_without_consuming() {
        let mut log = StreamLog::new();
        let full = frame(&payload_with_id(b"AAAA", &[0; 56]));
        assert_eq!(full.len(), 68);

        let report = log.ingest_batch(&full[..3], |_, _, _, _| {});
        assert_eq!(report.bytes_consumed, 0);
        let report = log.ingest_batch(&full[..67], |_, _, _, _| {});
        assert_eq!(report.bytes_consumed, 0);
        assert_eq!(report.records_processed, 0);
        let report = log.ingest_batch(&full, |_, _, _, _| {});
        assert_eq!(report.bytes_consumed, 68);
        assert_eq!(report.records_processed, 1);
    }

    #[test]
    fn framed_single_record_rejects_inconsistent_size() {
        let mut log = StreamLog::new();
        let mut framed = frame(&payload_with_id(b"AAAA", b"xy"));
        framed.push(0xff); // trailing garbage

        let err = log.ingest_one_framed(&framed, |_, _, _, _| {}).unwrap_err();
        let kind = err.downcast_ref::<EngineError>().unwrap();
        assert!(matches!(kind, EngineError::MalformedFrame { .. }));
        assert_eq!(log.record_count(), 0);
    }

    #[test]
    fn unframed_ingest_wraps_a_prefix_and_round_trips() {
        let mut log = StreamLog::new();
        let payload = payload_with_id(b"USER", b"hello");
        let seq = log.ingest_unframed(&payload, |_, _, _, _| {});
        assert_eq!(seq, 1);

        let record = log.read_by_sequence(1).unwrap();
        assert_eq!(record.data, payload);
        assert_eq!(record.header.file_id, FileId(*b"USER"));
        assert_eq!(record.header.offset, 0);

        // the exported blob is the framed form
        assert_eq!(log.export_data(), frame(&payload));
    }

    #[test]
    fn short_payloads_get_the_zero_file_id() {
        let mut log = StreamLog::new();
        let mut routed = None;
        log.ingest_unframed(&[1, 2, 3], |id, _, _, _| routed = Some(id));
        assert_eq!(routed, Some(FileId::ZERO));
        assert_eq!(log.record_count_for(FileId::ZERO), 1);
    }

    #[test]
    fn sequences_are_dense_and_allocated_in_ingest_order() {
        let mut log = StreamLog::new();
        for i in 0..10u8 {
            log.ingest_unframed(&payload_with_id(b"AAAA", &[i]), |_, _, _, _| {});
        }
        let sequences: Vec<u64> = (1..=10).filter(|s| log.has_sequence(*s)).collect();
        assert_eq!(sequences, (1..=10).collect::<Vec<_>>());
        assert!(!log.has_sequence(11));
    }

    #[test]
    fn bucket_order_equals_insertion_order_with_random_access() {
        let mut log = StreamLog::new();
        for i in 0..5u8 {
            log.ingest_unframed(&payload_with_id(b"AAAA", &[i]), |_, _, _, _| {});
            log.ingest_unframed(&payload_with_id(b"BBBB", &[i]), |_, _, _, _| {});
        }
        assert_eq!(log.record_count_for(FileId(*b"AAAA")), 5);
        for i in 0..5 {
            let r = log.record_by_index(FileId(*b"AAAA"), i).unwrap();
            assert_eq!(r.sequence, (i as u64) * 2 + 1);
            assert_eq!(r.data[8], i as u8);
        }
        assert!(log.record_by_index(FileId(*b"AAAA"), 5).is_none());
    }

    #[test]
    fn stored_iteration_copies_records_and_honors_early_halt() {
        let mut log = StreamLog::new();
        for i in 0..6u8 {
            log.ingest_unframed(&payload_with_id(b"COPY", &[i]), |_, _, _, _| {});
        }
        log.ingest_unframed(&payload_with_id(b"SKIP", &[9]), |_, _, _, _| {});

        let mut copied = Vec::new();
        log.for_each_stored(FileId(*b"COPY"), |record| {
            copied.push(record.clone());
            copied.len() < 4
        });
        assert_eq!(copied.len(), 4);
        assert!(copied.iter().all(|r| r.header.file_id == FileId(*b"COPY")));
        assert_eq!(copied[3].data[8], 3);

        let mut all = Vec::new();
        log.for_each_record(|record| {
            all.push(record.header.sequence);
            true
        });
        assert_eq!(all, (1..=7).collect::<Vec<u64>>());
    }

    #[test]
    fn load_and_rebuild_resets_then_replays_identically() {
        let mut log = StreamLog::new();
        for i in 0..4u8 {
            log.ingest_unframed(&payload_with_id(b"AAAA", &[i, i]), |_, _, _, _| {});
        }
        let exported = log.export_data();

        let mut rebuilt = StreamLog::new();
        rebuilt.ingest_unframed(b"leftover-state", |_, _, _, _| {});
        let report = rebuilt.load_and_rebuild(&exported, |_, _, _, _| {});
        assert_eq!(report.records_processed, 4);
        assert_eq!(rebuilt.export_data(), exported);
        assert_eq!(rebuilt.record_count(), 4);
        assert!(rebuilt.has_sequence(1));
        assert!(!rebuilt.has_sequence(5));
    }

    #[test]
    fn drip_feed_matches_single_batch() {
        let mut whole = Vec::new();
        for i in 0..8u8 {
            whole.extend_from_slice(&frame(&payload_with_id(b"DRIP", &vec![i; i as usize])));
        }

        let mut batch_log = StreamLog::new();
        batch_log.ingest_batch(&whole, |_, _, _, _| {});

        let mut drip_log = StreamLog::new();
        let mut pending: Vec<u8> = Vec::new();
        for &b in &whole {
            pending.push(b);
            let report = drip_log.ingest_batch(&pending, |_, _, _, _| {});
            pending.drain(..report.bytes_consumed);
        }
        assert!(pending.is_empty());
        assert_eq!(drip_log.export_data(), batch_log.export_data());
        assert_eq!(drip_log.record_count(), batch_log.record_count());
    }
}

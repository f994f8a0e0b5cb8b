//! # Streaming Record Storage
//!
//! The storage layer is a single append-only byte buffer holding
//! size-prefixed records, plus the maps that make every record addressable
//! in O(1):
//!
//! ```text
//! [u32 size LE][payload][u32 size LE][payload]...
//!                ^
//!                bytes [4..8) of each payload carry a 4-byte file identifier
//! ```
//!
//! There is no header and no trailer; the buffer *is* the wire format. The
//! payload is stored verbatim and never parsed — routing reads exactly four
//! bytes at a fixed position. `export_data` emits the live prefix of the
//! buffer and `load_and_rebuild` replays it through the same ingest path, so
//! a round-trip is bit-identical by construction.
//!
//! ## Offsets and sequences
//!
//! An `offset` always refers to the frame start (the size prefix); payload
//! slices skip the 4-byte prefix. A `sequence` is a dense, strictly
//! increasing u64 starting at 1, allocated only after a record is fully
//! committed. Sequences are the stable row identity across indexes, query
//! results, and export/reload.
//!
//! ## Zero-copy lifetimes
//!
//! `data_at_offset` and the ref-iteration callbacks hand out `&[u8]` slices
//! borrowed from the internal buffer. The borrow checker ties them to the
//! log: any `ingest_*` call needs `&mut self`, so stale slices cannot
//! survive a buffer move.

mod log;

pub use log::{IngestReport, RecordHeader, RecordRef, StoredRecord, StreamLog};

use zerocopy::little_endian::U32;
use zerocopy::FromBytes;

/// Length of the little-endian size prefix in front of every record.
pub const FRAME_PREFIX_LEN: usize = 4;

/// Byte range of the file identifier within a payload.
pub const FILE_ID_OFFSET: usize = 4;
pub const FILE_ID_LEN: usize = 4;

/// Initial buffer capacity when none is requested.
pub const DEFAULT_INITIAL_CAPACITY: usize = 1024 * 1024;

/// Reads the u32 size prefix at the front of `bytes`, if present.
#[inline]
pub(crate) fn read_size_prefix(bytes: &[u8]) -> Option<u32> {
    let prefix = bytes.get(..FRAME_PREFIX_LEN)?;
    U32::read_from_bytes(prefix).ok().map(|v| v.get())
}

/// 4-byte record routing tag, read from payload bytes [4..8).
///
/// Payloads shorter than 8 bytes get the all-zero id; they are stored and
/// sequenced but route to no table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FileId(pub [u8; FILE_ID_LEN]);

impl FileId {
    pub const ZERO: FileId = FileId([0; FILE_ID_LEN]);

    /// Parses a 4-character ASCII tag such as `"USER"`.
    pub fn parse(tag: &str) -> eyre::Result<FileId> {
        let bytes = tag.as_bytes();
        eyre::ensure!(
            bytes.len() == FILE_ID_LEN,
            "file identifier must be exactly {} bytes, got {:?}",
            FILE_ID_LEN,
            tag
        );
        let mut id = [0u8; FILE_ID_LEN];
        id.copy_from_slice(bytes);
        Ok(FileId(id))
    }

    pub fn as_bytes(&self) -> &[u8; FILE_ID_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == FileId::ZERO
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02x}", b)?;
            }
        }
        Ok(())
    }
}

//! Offload Index Block
//!
//! The index blob is written once by the offload write path and decoded once
//! per handle open. It carries the ledger's static metadata plus a sorted
//! table mapping entry IDs to byte offsets inside the data blob.
//!
//! ## Index Blob Format
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Header (40 bytes)                                           │
//! │ - Magic bytes: "CLIX" (4 bytes)                             │
//! │ - Version (2 bytes)                                         │
//! │ - Flags (2 bytes, bit 0 = ledger closed)                    │
//! │ - Last entry ID (8 bytes)                                   │
//! │ - Ledger length in bytes (8 bytes)                          │
//! │ - Data object length (8 bytes)                              │
//! │ - Data block header length (4 bytes)                        │
//! │ - Index entry count (4 bytes)                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Index entries (20 bytes each)                               │
//! │ - First entry ID covered (8 bytes)                          │
//! │ - Data block part number (4 bytes)                          │
//! │ - Data offset of the first record (8 bytes)                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are big-endian. One index entry covers a range of entry IDs
//! (everything in its data block), not one entry each; `lookup` returns the
//! covering entry via a floor search. The table is validated at decode time:
//! entry IDs strictly increase starting at zero and offsets never decrease,
//! so lookups for increasing entry IDs return non-decreasing offsets.
//!
//! The block is immutable after construction - concurrent lookups need no
//! locking.

use bytes::{Buf, Bytes};
use coldstream_core::{Error, LedgerMetadata, Result};

/// Magic bytes for index blobs: "CLIX"
pub const INDEX_MAGIC: [u8; 4] = [0x43, 0x4C, 0x49, 0x58];

/// Current index blob format version
pub const INDEX_VERSION: u16 = 1;

/// Index blob header size (40 bytes)
pub const INDEX_HEADER_SIZE: usize = 40;

/// Size of one serialized index entry (20 bytes)
pub const INDEX_ENTRY_SIZE: usize = 20;

const FLAG_CLOSED: u16 = 0x0001;

/// One row of the offset table: the segment of entries starting at
/// `entry_id`, stored in data block `part`, beginning at `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub entry_id: i64,
    pub part: u32,
    pub offset: u64,
}

/// Decoded, immutable representation of one ledger's index blob
pub struct OffloadIndexBlock {
    version: u16,
    metadata: LedgerMetadata,
    data_object_length: u64,
    data_header_length: u32,
    entries: Vec<IndexEntry>,
}

impl OffloadIndexBlock {
    /// Decode an index blob.
    ///
    /// Malformed or truncated input fails with `InvalidMagic`/`InvalidIndex`;
    /// the version field is surfaced as-is and judged by the
    /// [`VersionCheck`](crate::version::VersionCheck) collaborator at open
    /// time, not here.
    pub fn decode(data: Bytes) -> Result<Self> {
        if data.len() < INDEX_HEADER_SIZE {
            return Err(Error::InvalidIndex(format!(
                "truncated header: {} bytes, need {}",
                data.len(),
                INDEX_HEADER_SIZE
            )));
        }

        let mut cursor = data.as_ref();

        let mut magic = [0u8; 4];
        cursor.copy_to_slice(&mut magic);
        if magic != INDEX_MAGIC {
            return Err(Error::InvalidMagic);
        }

        let version = cursor.get_u16();
        let flags = cursor.get_u16();
        let last_entry_id = cursor.get_i64();
        let length = cursor.get_u64();
        let data_object_length = cursor.get_u64();
        let data_header_length = cursor.get_u32();
        let entry_count = cursor.get_u32() as usize;

        if last_entry_id < 0 {
            return Err(Error::InvalidIndex(format!(
                "negative last entry ID: {last_entry_id}"
            )));
        }
        if entry_count == 0 {
            return Err(Error::InvalidIndex("empty index table".to_string()));
        }
        if cursor.remaining() < entry_count * INDEX_ENTRY_SIZE {
            return Err(Error::InvalidIndex(format!(
                "index table truncated: {} entries need {} bytes, {} available",
                entry_count,
                entry_count * INDEX_ENTRY_SIZE,
                cursor.remaining()
            )));
        }

        let mut entries = Vec::with_capacity(entry_count);
        for _ in 0..entry_count {
            entries.push(IndexEntry {
                entry_id: cursor.get_i64(),
                part: cursor.get_u32(),
                offset: cursor.get_u64(),
            });
        }

        // The table must cover [0, last_entry_id] with strictly increasing
        // entry IDs and non-decreasing offsets.
        if entries[0].entry_id != 0 {
            return Err(Error::InvalidIndex(format!(
                "index table starts at entry {} instead of 0",
                entries[0].entry_id
            )));
        }
        for pair in entries.windows(2) {
            if pair[1].entry_id <= pair[0].entry_id || pair[1].offset < pair[0].offset {
                return Err(Error::InvalidIndex(format!(
                    "index table not sorted at entry {}",
                    pair[1].entry_id
                )));
            }
        }

        Ok(Self {
            version,
            metadata: LedgerMetadata {
                last_entry_id,
                length,
                closed: flags & FLAG_CLOSED != 0,
            },
            data_object_length,
            data_header_length,
            entries,
        })
    }

    /// Read just the magic and version from an index blob header.
    ///
    /// Used by the open path to run the version check before committing to a
    /// full decode.
    pub fn peek_version(data: &[u8]) -> Result<u16> {
        if data.len() < 6 {
            return Err(Error::InvalidIndex(format!(
                "truncated header: {} bytes",
                data.len()
            )));
        }
        if data[..4] != INDEX_MAGIC {
            return Err(Error::InvalidMagic);
        }
        let mut version = &data[4..6];
        Ok(version.get_u16())
    }

    /// Format version this blob was written with
    pub fn version(&self) -> u16 {
        self.version
    }

    /// Static ledger metadata: length, last entry ID, closed flag
    pub fn metadata(&self) -> LedgerMetadata {
        self.metadata
    }

    /// Size of the data blob in bytes; bounds the backed input stream
    pub fn data_object_length(&self) -> u64 {
        self.data_object_length
    }

    /// Opaque block header length at the head of each data block
    pub fn data_header_length(&self) -> u32 {
        self.data_header_length
    }

    /// Find the index segment covering `entry_id` (floor search).
    ///
    /// Fails with `OutOfRange` when `entry_id` is negative or past the last
    /// entry of the ledger.
    pub fn lookup(&self, entry_id: i64) -> Result<IndexEntry> {
        if entry_id < 0 || entry_id > self.metadata.last_entry_id {
            return Err(Error::OutOfRange {
                entry_id,
                last_entry_id: self.metadata.last_entry_id,
            });
        }

        // Binary search for the greatest table entry with entry_id <= target.
        let mut left = 0;
        let mut right = self.entries.len();
        while left < right {
            let mid = (left + right) / 2;
            if self.entries[mid].entry_id <= entry_id {
                left = mid + 1;
            } else {
                right = mid;
            }
        }

        // left >= 1 because the table is validated to start at entry 0
        Ok(self.entries[left - 1])
    }
}

//! Ledger Entry and Metadata Types
//!
//! A ledger is an immutable, append-only sequence of entries and is the unit
//! of storage offload. Once a ledger is offloaded to object storage it is
//! closed: the set of valid entry IDs is the contiguous range
//! `[0, last_entry_id]` and never changes again.
//!
//! ## Design Decisions
//! - Payloads use `bytes::Bytes` for zero-copy slicing out of fetched blobs
//! - Entry IDs are `i64` so that negative IDs are representable and can be
//!   rejected as invalid parameters rather than silently wrapping

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A single entry read back from an offloaded ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Ledger this entry belongs to
    pub ledger_id: u64,

    /// Entry ID, strictly increasing from zero within a ledger
    pub entry_id: i64,

    /// Opaque payload
    pub payload: Bytes,
}

impl LedgerEntry {
    pub fn new(ledger_id: u64, entry_id: i64, payload: Bytes) -> Self {
        Self {
            ledger_id,
            entry_id,
            payload,
        }
    }

    /// Payload length in bytes
    pub fn length(&self) -> usize {
        self.payload.len()
    }
}

/// Static metadata of an offloaded ledger, decoded once from the index blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerMetadata {
    /// ID of the last entry in the ledger (the last-add-confirmed)
    pub last_entry_id: i64,

    /// Total ledger length in bytes
    pub length: u64,

    /// Whether the ledger was closed before offload.
    ///
    /// Offload only runs against closed ledgers, so this is expected to be
    /// true for every ledger read through this crate.
    pub closed: bool,
}

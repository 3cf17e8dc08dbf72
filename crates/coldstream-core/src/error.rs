//! Error Types for Coldstream
//!
//! This module defines all error types that can occur on the tiered-storage
//! read path.
//!
//! ## Error Categories
//!
//! ### Not-found
//! - `NoSuchLedger`: the index or data blob is missing at open time, or the
//!   backing data blob vanished mid-read
//!
//! ### Invalid requests
//! - `InvalidParameter`: inverted or out-of-range read ranges; fails before
//!   any remote I/O is performed
//! - `OutOfRange`: an entry ID outside the ledger was looked up in the index
//!
//! ### Format/Resync
//! - `InvalidMagic` / `UnknownVersion` / `InvalidIndex`: malformed index blob
//! - `UnexpectedCondition`: the data blob could not be read in the expected
//!   entry order; fatal for that read only, the handle stays usable
//!
//! ### Lifecycle
//! - `HandleClosed`: an operation ran against a closed read handle
//! - `UnsupportedOperation`: the operation has no meaning for an offloaded
//!   ledger
//!
//! ### Transport
//! - `Storage` / `Io` / `EndOfStream`: propagated unchanged; only the
//!   open-time index fetch applies bounded retry
//!
//! All functions return `Result<T>` which is aliased to `Result<T, Error>`,
//! allowing `?` propagation throughout the read path.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no such ledger: {ledger_id}")]
    NoSuchLedger { ledger_id: u64 },

    #[error("invalid read range {first}-{last} (last add confirmed: {last_add_confirmed})")]
    InvalidParameter {
        first: i64,
        last: i64,
        last_add_confirmed: i64,
    },

    #[error("entry {entry_id} out of range (last entry: {last_entry_id})")]
    OutOfRange { entry_id: i64, last_entry_id: i64 },

    #[error("read handle for ledger {ledger_id} is closed")]
    HandleClosed { ledger_id: u64 },

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    #[error("unexpected condition: {0}")]
    UnexpectedCondition(String),

    #[error("invalid magic bytes in index block")]
    InvalidMagic,

    #[error("unknown index block version: {0}")]
    UnknownVersion(u16),

    #[error("invalid index block: {0}")]
    InvalidIndex(String),

    #[error("end of stream at position {position} (object length: {object_length})")]
    EndOfStream { position: u64, object_length: u64 },

    #[error("object store error: {0}")]
    Storage(#[from] object_store::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error is an object-store "key not found".
    ///
    /// A missing key for a blob that is known to exist means the backing
    /// ledger itself vanished, which callers translate to [`Error::NoSuchLedger`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Storage(object_store::Error::NotFound { .. }))
    }
}

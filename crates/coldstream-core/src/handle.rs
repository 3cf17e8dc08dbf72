//! The Ledger Read Contract
//!
//! `ReadHandle` is the random-access read interface the broker's dispatcher
//! and replay logic consume. Ledgers resident in the hot tier and ledgers
//! reconstructed from cold object storage implement the same trait, so the
//! dispatcher treats both identically.
//!
//! The two observability hooks at the bottom (`last_access_timestamp`,
//! `pending_reads`) exist for the broker's ledger-handle cache: it marks a
//! handle idle only when no read is in flight and the last access is old
//! enough, then closes it.

use crate::entry::{LedgerEntry, LedgerMetadata};
use crate::error::Result;
use async_trait::async_trait;

/// Random-access read interface over one ledger.
///
/// Implementations must be safe to share across tasks (`Arc<dyn ReadHandle>`);
/// reads submitted to the same handle execute in submission order, reads on
/// different handles are independent.
#[async_trait]
pub trait ReadHandle: Send + Sync {
    /// The ledger ID this handle reads.
    fn id(&self) -> u64;

    /// Static ledger metadata (last entry ID, length, closed flag).
    fn metadata(&self) -> LedgerMetadata;

    /// Read entries `[first, last]` inclusive.
    ///
    /// Fails with `InvalidParameter` when the range is inverted, negative, or
    /// extends past the last-add-confirmed entry; no I/O is performed in that
    /// case. A failed read never returns a partial result.
    async fn read(&self, first: i64, last: i64) -> Result<Vec<LedgerEntry>>;

    /// Read entries without waiting for confirmation.
    ///
    /// Offloaded ledgers are closed and immutable, so there is no confirmed /
    /// unconfirmed distinction and this behaves exactly like [`read`](Self::read).
    async fn read_unconfirmed(&self, first: i64, last: i64) -> Result<Vec<LedgerEntry>>;

    /// Resolve the last-add-confirmed entry ID.
    async fn read_last_add_confirmed(&self) -> Result<i64>;

    /// Resolve the last-add-confirmed entry ID without forcing I/O.
    async fn try_read_last_add_confirmed(&self) -> Result<i64>;

    /// The last-add-confirmed entry ID, from local metadata.
    fn last_add_confirmed(&self) -> i64;

    /// Total ledger length in bytes.
    fn length(&self) -> u64;

    /// Whether the ledger itself is closed (always true for offloaded ledgers).
    fn is_closed(&self) -> bool;

    /// Long-poll for a last-add-confirmed advance past `entry_id`.
    ///
    /// Offloaded ledgers have no "latest" concept beyond the static
    /// last-confirmed entry; implementations over cold storage fail with
    /// `UnsupportedOperation`.
    async fn read_last_add_confirmed_and_entry(
        &self,
        entry_id: i64,
        timeout_millis: u64,
        parallel: bool,
    ) -> Result<(i64, Option<LedgerEntry>)>;

    /// Close the handle. Idempotent: every caller observes the same outcome
    /// and the underlying resources are released exactly once.
    async fn close(&self) -> Result<()>;

    /// Milliseconds-since-epoch of the last completed read.
    ///
    /// Updated only after a read fully settles (success or failure), never at
    /// read start, so a long-running read is never mistaken for idle.
    fn last_access_timestamp(&self) -> u64;

    /// Number of reads currently in flight on this handle.
    fn pending_reads(&self) -> u32;
}

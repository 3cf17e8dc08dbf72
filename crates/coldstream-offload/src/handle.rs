//! Offloaded Ledger Read Handle
//!
//! The orchestrator of the read path: owns one ledger's decoded
//! [`OffloadIndexBlock`] and one [`BackedInputStream`] over the data blob,
//! and exposes the [`ReadHandle`] contract the broker's dispatcher consumes.
//!
//! ## Opening
//!
//! `open()` fetches and decodes the index blob with a bounded retry (default
//! 3 attempts, no backoff between them - transient network failures on the
//! index fetch are common enough to retry, and the dispatcher reschedules the
//! read anyway if open ultimately fails). A format-version mismatch fails
//! immediately without retry. Only `open()` yields a live handle, so a handle
//! is `Opened` for its whole life until `close()`.
//!
//! ## Reading
//!
//! The data blob is a sequence of length-prefixed records (see the crate
//! docs). The parse loop reads records at the cursor and compares each record
//! entry ID with the next expected ID; mismatches are healed by seeking to
//! the best known position for the expected entry - an exact offset from the
//! shared [`OffsetCache`] when available, otherwise the covering index
//! segment followed by a forward scan. Each iteration produces one explicit
//! outcome (entry, resync, skip) so the recovery rules live in one match
//! instead of layered error handling.
//!
//! A record ID past the requested range is tolerated exactly once per read
//! (a stale first read after repositioning); the second occurrence fails the
//! read with `UnexpectedCondition`. The handle itself stays usable - the
//! error describes a bad read window, not a corrupt handle.
//!
//! ## Concurrency
//!
//! All parsing for one handle runs under a fair async lock around the stream,
//! so same-handle reads execute in submission order and the cursor has a
//! single writer. Reads are spawned tasks: abandoning a returned future does
//! not stop the in-flight parse, and the pending-read counter settles when
//! the work settles. `last_access_timestamp` is updated only after a read
//! completes, never at start, so a long-running read is not mistaken for
//! idle by the handle cache's eviction policy.

use async_trait::async_trait;
use coldstream_core::naming::topic_from_storage_name;
use coldstream_core::{Error, LedgerEntry, LedgerMetadata, ReadHandle, Result};
use object_store::path::Path;
use object_store::ObjectStore;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, OnceCell};

use crate::config::OffloadReadConfig;
use crate::index::OffloadIndexBlock;
use crate::offsets::OffsetCache;
use crate::stats::OffloaderStats;
use crate::stream::BackedInputStream;
use crate::version::VersionCheck;
use crate::ENTRY_HEADER_SIZE;

/// Read handle over one offloaded ledger.
///
/// Cheap to clone; clones share the same underlying handle state.
#[derive(Clone)]
pub struct OffloadedReadHandle {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for OffloadedReadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OffloadedReadHandle")
            .field("ledger_id", &self.inner.ledger_id)
            .field("topic", &self.inner.topic)
            .field("closed", &self.inner.closed.load(Ordering::Acquire))
            .field("pending_reads", &self.inner.pending_reads.load(Ordering::Acquire))
            .finish()
    }
}

struct Inner {
    ledger_id: u64,
    topic: String,
    index: OffloadIndexBlock,
    stream: Mutex<BackedInputStream>,
    offsets: Arc<OffsetCache>,

    /// Opened -> Closed, one way
    closed: AtomicBool,
    pending_reads: AtomicU32,
    last_access_ms: AtomicU64,

    close_once: OnceCell<()>,
    close_calls: AtomicU32,
}

/// Outcome of decoding one record at the cursor
enum Step {
    /// The expected entry, materialized
    Entry(LedgerEntry),
    /// The cursor was repositioned; decode again
    Resync,
    /// A stale record inside the expected segment was scanned past
    Skipped,
}

impl OffloadedReadHandle {
    /// Open a read handle over an offloaded ledger.
    ///
    /// Fetches and decodes the index blob at `index_key` (bounded retry, see
    /// module docs), then sets up the backed input stream over `data_key`.
    /// Fails with `NoSuchLedger` when the index blob is absent after all
    /// attempts, `UnknownVersion` on a format mismatch (no retry), or the
    /// last fetch/decode error otherwise.
    #[allow(clippy::too_many_arguments)]
    pub async fn open(
        store: Arc<dyn ObjectStore>,
        data_key: Path,
        index_key: Path,
        ledger_id: u64,
        config: &OffloadReadConfig,
        version_check: &dyn VersionCheck,
        stats: Arc<dyn OffloaderStats>,
        offsets: Arc<OffsetCache>,
        storage_name: &str,
    ) -> Result<OffloadedReadHandle> {
        let topic = topic_from_storage_name(storage_name);

        let mut attempts_left = config.index_open_attempts.max(1);
        let mut last_error: Option<Error> = None;
        let mut index = None;
        while attempts_left > 0 && index.is_none() {
            attempts_left -= 1;

            let fetch_start = Instant::now();
            let payload = match store.get(&index_key).await {
                Ok(result) => match result.bytes().await {
                    Ok(bytes) => bytes,
                    Err(error) => {
                        tracing::warn!(
                            ledger_id,
                            key = %index_key,
                            attempts_left,
                            error = %error,
                            "failed to fetch index blob"
                        );
                        last_error = Some(error.into());
                        continue;
                    }
                },
                Err(error) => {
                    tracing::warn!(
                        ledger_id,
                        key = %index_key,
                        attempts_left,
                        error = %error,
                        "failed to fetch index blob"
                    );
                    last_error = Some(error.into());
                    continue;
                }
            };
            stats.record_read_index_latency(&topic, fetch_start.elapsed());

            // Version compatibility is judged once, here; a mismatch is
            // permanent and fails the open with no further attempts.
            match OffloadIndexBlock::peek_version(&payload) {
                Ok(version) => version_check.check(index_key.as_ref(), version)?,
                Err(error) => {
                    tracing::warn!(
                        ledger_id,
                        key = %index_key,
                        attempts_left,
                        error = %error,
                        "failed to decode index blob header"
                    );
                    last_error = Some(error);
                    continue;
                }
            }

            match OffloadIndexBlock::decode(payload) {
                Ok(block) => {
                    last_error = None;
                    index = Some(block);
                }
                Err(error) => {
                    tracing::warn!(
                        ledger_id,
                        key = %index_key,
                        attempts_left,
                        error = %error,
                        "failed to decode index blob"
                    );
                    last_error = Some(error);
                }
            }
        }

        let index = match index {
            Some(index) => index,
            None => {
                let error = last_error.unwrap_or_else(|| {
                    Error::InvalidIndex("index open produced no result".to_string())
                });
                if error.is_not_found() {
                    tracing::error!(ledger_id, key = %index_key, topic = %topic, "index blob not found");
                    return Err(Error::NoSuchLedger { ledger_id });
                }
                return Err(error);
            }
        };

        let stream = BackedInputStream::new(
            store,
            data_key,
            index.data_object_length(),
            config.read_ahead_bytes,
            stats,
            topic.clone(),
        );

        Ok(OffloadedReadHandle {
            inner: Arc::new(Inner {
                ledger_id,
                topic,
                index,
                stream: Mutex::new(stream),
                offsets,
                closed: AtomicBool::new(false),
                pending_reads: AtomicU32::new(0),
                last_access_ms: AtomicU64::new(now_millis()),
                close_once: OnceCell::new(),
                close_calls: AtomicU32::new(0),
            }),
        })
    }

    /// The ledger ID this handle reads
    pub fn id(&self) -> u64 {
        self.inner.ledger_id
    }

    /// Topic resolved from the ledger-storage name, for logs and stats
    pub fn topic(&self) -> &str {
        &self.inner.topic
    }

    /// Static ledger metadata from the index block
    pub fn metadata(&self) -> LedgerMetadata {
        self.inner.index.metadata()
    }

    /// The last-add-confirmed entry ID
    pub fn last_add_confirmed(&self) -> i64 {
        self.metadata().last_entry_id
    }

    /// Total ledger length in bytes
    pub fn length(&self) -> u64 {
        self.metadata().length
    }

    /// Whether the ledger is closed (always true once offloaded)
    pub fn is_closed(&self) -> bool {
        self.metadata().closed
    }

    /// Milliseconds-since-epoch of the last settled read
    pub fn last_access_timestamp(&self) -> u64 {
        self.inner.last_access_ms.load(Ordering::Acquire)
    }

    /// Reads currently in flight
    pub fn pending_reads(&self) -> u32 {
        self.inner.pending_reads.load(Ordering::Acquire)
    }

    /// Read entries `[first, last]` inclusive.
    ///
    /// The work is spawned onto the runtime and serialized with every other
    /// read on this handle; dropping the returned future does not cancel the
    /// in-flight parse. A failed read returns nothing - entries materialized
    /// before the failure are released.
    pub async fn read(&self, first: i64, last: i64) -> Result<Vec<LedgerEntry>> {
        let inner = self.inner.clone();
        inner.pending_reads.fetch_add(1, Ordering::AcqRel);
        let task = tokio::spawn(async move {
            let result = inner.read_entries(first, last).await;
            inner.last_access_ms.store(now_millis(), Ordering::Release);
            inner.pending_reads.fetch_sub(1, Ordering::AcqRel);
            result
        });
        match task.await {
            Ok(result) => result,
            Err(join_error) => Err(Error::UnexpectedCondition(format!(
                "read task aborted: {join_error}"
            ))),
        }
    }

    /// Identical to [`read`](Self::read): an offloaded ledger is closed, so
    /// there is no unconfirmed tail to distinguish.
    pub async fn read_unconfirmed(&self, first: i64, last: i64) -> Result<Vec<LedgerEntry>> {
        self.read(first, last).await
    }

    /// Close the handle: idempotent and single-shot.
    ///
    /// The first caller releases the stream and flips the state to `Closed`;
    /// concurrent and later callers await and share that same completion.
    pub async fn close(&self) -> Result<()> {
        let inner = self.inner.clone();
        inner
            .close_once
            .get_or_init(|| {
                let inner = inner.clone();
                async move {
                    // Taking the stream lock queues the close behind reads
                    // submitted before it, like any other unit of work on
                    // this handle.
                    let mut stream = inner.stream.lock().await;
                    inner.closed.store(true, Ordering::Release);
                    stream.close();
                    inner.close_calls.fetch_add(1, Ordering::AcqRel);
                    tracing::debug!(ledger_id = inner.ledger_id, "offloaded read handle closed");
                }
            })
            .await;
        Ok(())
    }

    /// How many times the underlying close logic has run. Visible for tests.
    #[doc(hidden)]
    pub fn close_count(&self) -> u32 {
        self.inner.close_calls.load(Ordering::Acquire)
    }
}

impl Inner {
    async fn read_entries(&self, first: i64, last: i64) -> Result<Vec<LedgerEntry>> {
        // The lock is fair: same-handle reads run in submission order, and
        // the cursor below has a single writer.
        let mut stream = self.stream.lock().await;

        if self.closed.load(Ordering::Acquire) {
            tracing::warn!(
                ledger_id = self.ledger_id,
                first,
                last,
                "read on a closed handle"
            );
            return Err(Error::HandleClosed {
                ledger_id: self.ledger_id,
            });
        }

        let last_add_confirmed = self.index.metadata().last_entry_id;
        if first > last || first < 0 || last > last_add_confirmed {
            return Err(Error::InvalidParameter {
                first,
                last,
                last_add_confirmed,
            });
        }

        tracing::debug!(
            ledger_id = self.ledger_id,
            first,
            last,
            count = last - first + 1,
            "reading offloaded entries"
        );

        self.parse_entries(&mut stream, first, last)
            .await
            .map_err(|error| {
                tracing::error!(
                    ledger_id = self.ledger_id,
                    first,
                    last,
                    error = %error,
                    "failed to read entries from offloaded ledger"
                );
                if error.is_not_found() {
                    // The backing data blob itself vanished
                    Error::NoSuchLedger {
                        ledger_id: self.ledger_id,
                    }
                } else {
                    error
                }
            })
    }

    async fn parse_entries(
        &self,
        stream: &mut BackedInputStream,
        first: i64,
        last: i64,
    ) -> Result<Vec<LedgerEntry>> {
        let mut entries = Vec::new();
        let mut remaining = last - first + 1;
        let mut next_expected = first;
        let mut overshoot_corrected = false;

        // A record header is 12 bytes. With fewer buffered, the cursor is
        // either fresh or left at a window tail by an earlier read; starting
        // from the first entry's known position avoids a spurious
        // end-of-stream on the header read.
        if stream.available() < ENTRY_HEADER_SIZE {
            tracing::debug!(
                ledger_id = self.ledger_id,
                available = stream.available(),
                first,
                "not enough buffered data, seeking to the first requested entry"
            );
            self.seek_to_entry(stream, first).await?;
        }

        while remaining > 0 {
            let step = self
                .next_record(stream, next_expected, last, &mut overshoot_corrected)
                .await?;
            match step {
                Step::Entry(entry) => {
                    entries.push(entry);
                    next_expected += 1;
                    remaining -= 1;
                }
                Step::Resync | Step::Skipped => {}
            }
        }

        Ok(entries)
    }

    /// Decode one record at the cursor against the expected entry ID.
    async fn next_record(
        &self,
        stream: &mut BackedInputStream,
        next_expected: i64,
        last: i64,
        overshoot_corrected: &mut bool,
    ) -> Result<Step> {
        let position = stream.position();
        let length = stream.read_i32().await?;
        if length < 0 {
            // Block padding sentinel: skip to the expected entry in the next block
            self.seek_to_entry(stream, next_expected).await?;
            return Ok(Step::Resync);
        }
        let entry_id = stream.read_i64().await?;

        if entry_id == next_expected {
            self.offsets
                .put(self.ledger_id, entry_id, position)
                .await;
            let payload = stream.read_exact(length as usize).await?;
            return Ok(Step::Entry(LedgerEntry::new(
                self.ledger_id,
                entry_id,
                payload,
            )));
        }

        if entry_id > next_expected && entry_id <= last {
            // Mispositioned, e.g. a fetch window landed mid-stride
            tracing::warn!(
                ledger_id = self.ledger_id,
                entry_id,
                next_expected,
                last,
                "read an entry ahead of the expected one, seeking back"
            );
            self.seek_to_entry(stream, next_expected).await?;
            return Ok(Step::Resync);
        }

        if entry_id < next_expected {
            // Stale data only if the two IDs fall in different index
            // segments; overlap inside one segment is scanned past.
            if self.index.lookup(next_expected)? != self.index.lookup(entry_id)? {
                tracing::warn!(
                    ledger_id = self.ledger_id,
                    entry_id,
                    next_expected,
                    "read an entry from an earlier segment, seeking forward"
                );
                self.seek_to_entry(stream, next_expected).await?;
                return Ok(Step::Resync);
            }
            stream.skip(length as u64);
            return Ok(Step::Skipped);
        }

        // entry_id > last: in order reads the ID never passes the requested
        // range, but a repositioned handle can surface one stale record.
        // Correct it with a single forced seek; a second occurrence means the
        // data cannot be read in the expected order.
        if !*overshoot_corrected {
            *overshoot_corrected = true;
            self.seek_to_entry(stream, next_expected).await?;
            return Ok(Step::Resync);
        }
        tracing::info!(
            ledger_id = self.ledger_id,
            entry_id,
            next_expected,
            last,
            "entry past the requested range after a corrective seek"
        );
        Err(Error::UnexpectedCondition(format!(
            "expected entry {next_expected}, read entry {entry_id} past last entry {last}"
        )))
    }

    /// Seek to the best known position for `entry_id`: the exact cached
    /// offset when present, otherwise the covering index segment.
    async fn seek_to_entry(&self, stream: &mut BackedInputStream, entry_id: i64) -> Result<()> {
        if let Some(offset) = self.offsets.get(self.ledger_id, entry_id).await {
            stream.seek(offset);
        } else {
            let segment = self.index.lookup(entry_id)?;
            stream.seek(segment.offset);
        }
        Ok(())
    }
}

#[async_trait]
impl ReadHandle for OffloadedReadHandle {
    fn id(&self) -> u64 {
        OffloadedReadHandle::id(self)
    }

    fn metadata(&self) -> LedgerMetadata {
        OffloadedReadHandle::metadata(self)
    }

    async fn read(&self, first: i64, last: i64) -> Result<Vec<LedgerEntry>> {
        OffloadedReadHandle::read(self, first, last).await
    }

    async fn read_unconfirmed(&self, first: i64, last: i64) -> Result<Vec<LedgerEntry>> {
        OffloadedReadHandle::read_unconfirmed(self, first, last).await
    }

    async fn read_last_add_confirmed(&self) -> Result<i64> {
        Ok(self.last_add_confirmed())
    }

    async fn try_read_last_add_confirmed(&self) -> Result<i64> {
        Ok(self.last_add_confirmed())
    }

    fn last_add_confirmed(&self) -> i64 {
        OffloadedReadHandle::last_add_confirmed(self)
    }

    fn length(&self) -> u64 {
        OffloadedReadHandle::length(self)
    }

    fn is_closed(&self) -> bool {
        OffloadedReadHandle::is_closed(self)
    }

    async fn read_last_add_confirmed_and_entry(
        &self,
        _entry_id: i64,
        _timeout_millis: u64,
        _parallel: bool,
    ) -> Result<(i64, Option<LedgerEntry>)> {
        Err(Error::UnsupportedOperation(
            "read_last_add_confirmed_and_entry is not supported for offloaded ledgers",
        ))
    }

    async fn close(&self) -> Result<()> {
        OffloadedReadHandle::close(self).await
    }

    fn last_access_timestamp(&self) -> u64 {
        OffloadedReadHandle::last_access_timestamp(self)
    }

    fn pending_reads(&self) -> u32 {
        OffloadedReadHandle::pending_reads(self)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

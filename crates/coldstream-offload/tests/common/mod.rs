//! Shared helpers for the offload read-path integration tests: blob builders
//! that play the role of the offload write path, and an instrumented object
//! store that counts and shapes remote fetches.
#![allow(dead_code)]

use bytes::{BufMut, Bytes, BytesMut};
use coldstream_core::Result;
use coldstream_offload::index::INDEX_MAGIC;
use coldstream_offload::{
    CurrentVersionCheck, NoopStats, OffloadReadConfig, OffloadedReadHandle, OffsetCache,
    ENTRY_HEADER_SIZE,
};
use futures::stream::BoxStream;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{
    GetOptions, GetResult, ListResult, MultipartUpload, ObjectMeta, ObjectStore,
    PutMultipartOpts, PutOptions, PutPayload, PutResult,
};
use std::fmt;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shape of the synthetic blobs a test writes.
pub struct BlobSpec {
    /// Fixed data block size; the tail of each block is 0xFF padding
    pub block_size: usize,
    /// Opaque block header length (filled with 0xFF here, so a scan that
    /// runs into a header behaves like padding)
    pub header_len: usize,
    /// Index format version to stamp
    pub version: u16,
}

impl Default for BlobSpec {
    fn default() -> Self {
        Self {
            block_size: 4096,
            header_len: 0,
            version: coldstream_offload::index::INDEX_VERSION,
        }
    }
}

/// Deterministic, distinct payloads of `size` bytes each.
pub fn entry_payloads(count: usize, size: usize) -> Vec<Bytes> {
    (0..count)
        .map(|entry| {
            let bytes: Vec<u8> = (0..size).map(|i| (entry * 31 + i * 7) as u8).collect();
            Bytes::from(bytes)
        })
        .collect()
}

/// Lay entries out into fixed-size blocks, returning the data blob and the
/// index table rows `(first_entry_id, part, offset)`.
pub fn build_data_blob(payloads: &[Bytes], spec: &BlobSpec) -> (Bytes, Vec<(i64, u32, u64)>) {
    let mut data = Vec::new();
    let mut table = Vec::new();
    let mut block_open = false;
    let mut block_start = 0usize;

    for (id, payload) in payloads.iter().enumerate() {
        let id = id as i64;
        let record_len = ENTRY_HEADER_SIZE + payload.len();
        assert!(
            spec.header_len + record_len <= spec.block_size,
            "record for entry {id} does not fit one block"
        );

        let fits = block_open && (data.len() - block_start) + record_len <= spec.block_size;
        if !fits {
            if block_open {
                data.resize(block_start + spec.block_size, 0xFF);
            }
            block_start = data.len();
            data.resize(data.len() + spec.header_len, 0xFF);
            block_open = true;
            table.push((
                id,
                (block_start / spec.block_size) as u32,
                (block_start + spec.header_len) as u64,
            ));
        }

        data.extend_from_slice(&(payload.len() as i32).to_be_bytes());
        data.extend_from_slice(&id.to_be_bytes());
        data.extend_from_slice(payload);
    }
    if block_open {
        data.resize(block_start + spec.block_size, 0xFF);
    }

    (Bytes::from(data), table)
}

pub fn build_index_blob(
    last_entry_id: i64,
    ledger_length: u64,
    data_object_length: u64,
    table: &[(i64, u32, u64)],
    spec: &BlobSpec,
) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_slice(&INDEX_MAGIC);
    buf.put_u16(spec.version);
    buf.put_u16(1); // closed
    buf.put_i64(last_entry_id);
    buf.put_u64(ledger_length);
    buf.put_u64(data_object_length);
    buf.put_u32(spec.header_len as u32);
    buf.put_u32(table.len() as u32);
    for (entry_id, part, offset) in table {
        buf.put_i64(*entry_id);
        buf.put_u32(*part);
        buf.put_u64(*offset);
    }
    buf.freeze()
}

pub fn data_key(ledger_id: u64) -> Path {
    Path::from(format!("ledgers/{ledger_id}/data"))
}

pub fn index_key(ledger_id: u64) -> Path {
    Path::from(format!("ledgers/{ledger_id}/index"))
}

/// Write the data and index blobs for `ledger_id` into the store.
pub async fn seed_ledger(
    store: &dyn ObjectStore,
    ledger_id: u64,
    payloads: &[Bytes],
    spec: &BlobSpec,
) {
    let (data, table) = build_data_blob(payloads, spec);
    let ledger_length: u64 = payloads.iter().map(|p| p.len() as u64).sum();
    let index = build_index_blob(
        payloads.len() as i64 - 1,
        ledger_length,
        data.len() as u64,
        &table,
        spec,
    );
    store
        .put(&data_key(ledger_id), data.into())
        .await
        .unwrap();
    store
        .put(&index_key(ledger_id), index.into())
        .await
        .unwrap();
}

pub async fn open_handle(
    store: Arc<dyn ObjectStore>,
    ledger_id: u64,
    read_ahead: usize,
    offsets: Arc<OffsetCache>,
) -> Result<OffloadedReadHandle> {
    let config = OffloadReadConfig {
        read_ahead_bytes: read_ahead,
        ..Default::default()
    };
    OffloadedReadHandle::open(
        store,
        data_key(ledger_id),
        index_key(ledger_id),
        ledger_id,
        &config,
        &CurrentVersionCheck,
        Arc::new(NoopStats),
        offsets,
        "acme/orders/persistent/events",
    )
    .await
}

/// In-memory object store that counts whole-object and ranged fetches, and
/// can inject latency or a bounded number of failures.
#[derive(Debug)]
pub struct CountingStore {
    inner: InMemory,
    gets: AtomicUsize,
    range_gets: AtomicUsize,
    delay: Option<Duration>,
    failures_left: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Self {
        Self {
            inner: InMemory::new(),
            gets: AtomicUsize::new(0),
            range_gets: AtomicUsize::new(0),
            delay: None,
            failures_left: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    /// Fail the first `n` fetches with a generic transport error.
    pub fn failing_first(n: usize) -> Self {
        let store = Self::new();
        store.failures_left.store(n, Ordering::SeqCst);
        store
    }

    /// Whole-object fetches observed (index blob reads).
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Ranged fetches observed (data blob reads).
    pub fn range_gets(&self) -> usize {
        self.range_gets.load(Ordering::SeqCst)
    }

    fn induced_failure(&self) -> Option<object_store::Error> {
        let took = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1));
        took.ok().map(|_| object_store::Error::Generic {
            store: "counting-store",
            source: Box::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                "injected transport failure",
            )),
        })
    }
}

impl fmt::Display for CountingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CountingStore({})", self.inner)
    }
}

#[async_trait::async_trait]
impl ObjectStore for CountingStore {
    async fn put_opts(
        &self,
        location: &Path,
        payload: PutPayload,
        opts: PutOptions,
    ) -> object_store::Result<PutResult> {
        self.inner.put_opts(location, payload, opts).await
    }

    async fn put_multipart_opts(
        &self,
        location: &Path,
        opts: PutMultipartOpts,
    ) -> object_store::Result<Box<dyn MultipartUpload>> {
        self.inner.put_multipart_opts(location, opts).await
    }

    async fn get_opts(
        &self,
        location: &Path,
        options: GetOptions,
    ) -> object_store::Result<GetResult> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.induced_failure() {
            return Err(error);
        }
        self.inner.get_opts(location, options).await
    }

    async fn get_range(
        &self,
        location: &Path,
        range: Range<usize>,
    ) -> object_store::Result<Bytes> {
        self.range_gets.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.induced_failure() {
            return Err(error);
        }
        self.inner.get_range(location, range).await
    }

    async fn delete(&self, location: &Path) -> object_store::Result<()> {
        self.inner.delete(location).await
    }

    fn list(&self, prefix: Option<&Path>) -> BoxStream<'_, object_store::Result<ObjectMeta>> {
        self.inner.list(prefix)
    }

    async fn list_with_delimiter(
        &self,
        prefix: Option<&Path>,
    ) -> object_store::Result<ListResult> {
        self.inner.list_with_delimiter(prefix).await
    }

    async fn copy(&self, from: &Path, to: &Path) -> object_store::Result<()> {
        self.inner.copy(from, to).await
    }

    async fn copy_if_not_exists(&self, from: &Path, to: &Path) -> object_store::Result<()> {
        self.inner.copy_if_not_exists(from, to).await
    }
}

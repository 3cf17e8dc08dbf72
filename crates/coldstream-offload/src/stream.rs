//! Buffered Backed Input Stream
//!
//! A sequential, seekable byte source over one remote blob. Object storage
//! charges a full round trip per request, so the stream fetches fixed-size
//! windows (the configured read-ahead) lazily and serves reads out of the
//! local window until the cursor crosses it.
//!
//! ## Semantics
//!
//! - `read_exact(n)` returns exactly `n` bytes or fails; a read that crosses
//!   the window boundary stitches windows together, a read past the end of
//!   the object fails with `EndOfStream`
//! - `seek(offset)` is O(1): it repositions the cursor and keeps the current
//!   window when the target still falls inside it, otherwise the next read
//!   triggers one fresh fetch. It never scans intervening bytes
//! - `skip(n)` advances the cursor without materializing anything
//! - `position()` and `available()` are cheap local queries, no I/O
//!
//! The stream does not retry: every remote failure surfaces as a typed error
//! and retry policy stays with the caller. Open-time index fetches retry at
//! the handle level; mid-stream fetch failures fail the read that hit them.

use bytes::{Buf, Bytes, BytesMut};
use coldstream_core::{Error, Result};
use object_store::path::Path;
use object_store::ObjectStore;
use std::sync::Arc;
use std::time::Instant;

use crate::stats::OffloaderStats;

/// Read-ahead byte stream over one object-storage blob
pub struct BackedInputStream {
    store: Arc<dyn ObjectStore>,
    location: Path,
    object_length: u64,
    read_ahead: usize,

    /// Currently buffered window; empty means invalid
    window: Bytes,
    /// Absolute offset of `window[0]`
    window_start: u64,
    /// Absolute read position
    cursor: u64,

    closed: bool,

    stats: Arc<dyn OffloaderStats>,
    topic: String,
}

impl BackedInputStream {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        location: Path,
        object_length: u64,
        read_ahead: usize,
        stats: Arc<dyn OffloaderStats>,
        topic: String,
    ) -> Self {
        Self {
            store,
            location,
            object_length,
            read_ahead: read_ahead.max(1),
            window: Bytes::new(),
            window_start: 0,
            cursor: 0,
            closed: false,
            stats,
            topic,
        }
    }

    /// Absolute cursor position
    pub fn position(&self) -> u64 {
        self.cursor
    }

    /// Size of the backing object in bytes
    pub fn object_length(&self) -> u64 {
        self.object_length
    }

    /// Buffered bytes readable at the cursor without remote I/O
    pub fn available(&self) -> usize {
        let window_end = self.window_start + self.window.len() as u64;
        if !self.window.is_empty() && self.cursor >= self.window_start && self.cursor < window_end {
            (window_end - self.cursor) as usize
        } else {
            0
        }
    }

    /// Reposition the cursor to an absolute offset.
    ///
    /// Keeps the buffered window when `offset` still falls inside it; a seek
    /// outside the window only costs one remote fetch on the next read.
    pub fn seek(&mut self, offset: u64) {
        self.cursor = offset;
        let window_end = self.window_start + self.window.len() as u64;
        if offset < self.window_start || offset >= window_end {
            self.window = Bytes::new();
            self.window_start = offset;
        }
    }

    /// Advance the cursor by `n` bytes without materializing them.
    pub fn skip(&mut self, n: u64) {
        self.cursor = self.cursor.saturating_add(n);
    }

    /// Read exactly `n` bytes at the cursor.
    pub async fn read_exact(&mut self, n: usize) -> Result<Bytes> {
        if n == 0 {
            return Ok(Bytes::new());
        }
        self.ensure_window().await?;

        // Fast path: the whole read sits inside the buffered window.
        let offset = (self.cursor - self.window_start) as usize;
        if self.window.len() - offset >= n {
            let out = self.window.slice(offset..offset + n);
            self.cursor += n as u64;
            return Ok(out);
        }

        // Slow path: stitch across window boundaries.
        let mut out = BytesMut::with_capacity(n);
        while out.len() < n {
            self.ensure_window().await?;
            let offset = (self.cursor - self.window_start) as usize;
            let take = (self.window.len() - offset).min(n - out.len());
            out.extend_from_slice(&self.window[offset..offset + take]);
            self.cursor += take as u64;
        }
        Ok(out.freeze())
    }

    /// Read a big-endian `i32` (record length field).
    pub async fn read_i32(&mut self) -> Result<i32> {
        let mut bytes = self.read_exact(4).await?;
        Ok(bytes.get_i32())
    }

    /// Read a big-endian `i64` (entry ID field).
    pub async fn read_i64(&mut self) -> Result<i64> {
        let mut bytes = self.read_exact(8).await?;
        Ok(bytes.get_i64())
    }

    /// Release the buffered window and reject further reads.
    pub fn close(&mut self) {
        self.closed = true;
        self.window = Bytes::new();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Make the window cover the cursor, fetching one read-ahead unit if not.
    async fn ensure_window(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "backed input stream is closed",
            )));
        }

        let window_end = self.window_start + self.window.len() as u64;
        if !self.window.is_empty() && self.cursor >= self.window_start && self.cursor < window_end {
            return Ok(());
        }
        if self.cursor >= self.object_length {
            return Err(Error::EndOfStream {
                position: self.cursor,
                object_length: self.object_length,
            });
        }

        let fetch_end = (self.cursor + self.read_ahead as u64).min(self.object_length);
        let start = Instant::now();
        let window = self
            .store
            .get_range(&self.location, self.cursor as usize..fetch_end as usize)
            .await?;
        self.stats
            .record_read_data_latency(&self.topic, start.elapsed());
        self.stats.record_read_bytes(&self.topic, window.len());

        tracing::debug!(
            location = %self.location,
            offset = self.cursor,
            len = window.len(),
            "fetched read-ahead window"
        );

        self.window_start = self.cursor;
        self.window = window;
        Ok(())
    }
}

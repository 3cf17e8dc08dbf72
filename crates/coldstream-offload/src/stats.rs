//! Offloader Stats Seam
//!
//! The read path reports latency and volume observations to an external
//! recorder. Observations are fire-and-forget: implementations must not
//! block, and nothing on the read path ever branches on them.

use std::time::Duration;

/// Receiver for read-path observations.
///
/// Shared as `Arc<dyn OffloaderStats>` across every handle opened by the
/// process. The `topic` label is the human-readable topic resolved from the
/// ledger-storage name.
pub trait OffloaderStats: Send + Sync {
    /// Latency of one open-time index blob fetch attempt.
    fn record_read_index_latency(&self, topic: &str, elapsed: Duration);

    /// Latency of one ranged fetch against the data blob.
    fn record_read_data_latency(&self, topic: &str, elapsed: Duration);

    /// Bytes fetched from the data blob.
    fn record_read_bytes(&self, topic: &str, bytes: usize);
}

/// Recorder that drops every observation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStats;

impl OffloaderStats for NoopStats {
    fn record_read_index_latency(&self, _topic: &str, _elapsed: Duration) {}

    fn record_read_data_latency(&self, _topic: &str, _elapsed: Duration) {}

    fn record_read_bytes(&self, _topic: &str, _bytes: usize) {}
}

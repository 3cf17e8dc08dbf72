//! Read-Path Configuration
//!
//! Controls how offloaded ledgers are opened and streamed back:
//!
//! - **read_ahead_bytes**: unit of remote fetch for the backed input stream
//!   (default: 1MB). Larger values amortize more round trips per fetch;
//!   smaller values waste less bandwidth on short random reads.
//! - **index_open_attempts**: bounded retry for the open-time index fetch
//!   (default: 3). There is deliberately no backoff between attempts - the
//!   open path stays simple and bounded, and in the common case the loop runs
//!   once.
//! - **offset_cache_capacity**: number of exact entry offsets remembered
//!   process-wide across all ledgers (default: 100,000, roughly 3MB).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OffloadReadConfig {
    /// Unit of remote fetch for the data blob, in bytes (default: 1MB)
    #[serde(default = "default_read_ahead_bytes")]
    pub read_ahead_bytes: usize,

    /// Attempts for the open-time index fetch before giving up (default: 3)
    #[serde(default = "default_index_open_attempts")]
    pub index_open_attempts: u32,

    /// Capacity of the shared entry-offset cache, in entries (default: 100,000)
    #[serde(default = "default_offset_cache_capacity")]
    pub offset_cache_capacity: usize,
}

impl Default for OffloadReadConfig {
    fn default() -> Self {
        Self {
            read_ahead_bytes: default_read_ahead_bytes(),
            index_open_attempts: default_index_open_attempts(),
            offset_cache_capacity: default_offset_cache_capacity(),
        }
    }
}

fn default_read_ahead_bytes() -> usize {
    1024 * 1024 // 1MB
}

fn default_index_open_attempts() -> u32 {
    3
}

fn default_offset_cache_capacity() -> usize {
    100_000
}

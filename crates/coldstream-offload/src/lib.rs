//! Coldstream Offload Read Path
//!
//! This crate reconstructs an offloaded ledger from cold object storage and
//! presents it through the same [`ReadHandle`](coldstream_core::ReadHandle)
//! contract used for ledgers still resident in the hot tier.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────┐
//! │ Broker dispatcher    │
//! └──────────┬───────────┘
//!            │ read(first, last)
//!            ▼
//! ┌──────────────────────┐     ┌──────────────────────┐
//! │ OffloadedReadHandle  │────▶│ OffsetCache          │
//! │ - parse/resync loop  │     │ (ledger, entry) →    │
//! │ - pending-read count │     │ exact byte offset    │
//! └──────────┬───────────┘     └──────────────────────┘
//!            │ read_i32/read_i64/read_exact/seek
//!            ▼
//! ┌──────────────────────┐     ┌──────────────────────┐
//! │ BackedInputStream    │     │ OffloadIndexBlock    │
//! │ - read-ahead window  │     │ - ledger metadata    │
//! │ - ranged GETs        │     │ - entry → offset map │
//! └──────────┬───────────┘     └──────────────────────┘
//!            │ get_range                ▲
//!            ▼                          │ decoded once at open()
//! ┌──────────────────────┐              │
//! │ Object storage       │──────────────┘
//! │ (data blob + index)  │
//! └──────────────────────┘
//! ```
//!
//! ## Data Blob Format
//!
//! The offload write path stores a ledger as one data blob plus one index
//! blob. The data blob is a sequence of fixed-size blocks:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Block 0                                                     │
//! │ - Block header (opaque, index.data_header_length bytes)     │
//! │ - Record: [length i32][entry_id i64][payload length bytes]  │
//! │ - Record: ...                                               │
//! │ - Padding to the block boundary (0xFF bytes)                │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Block 1                                                     │
//! │ ...                                                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are big-endian. Records never cross a block boundary; a
//! record that would not fit is written at the start of the next block and
//! the remainder of the current block is padded. Reading a record length
//! inside padding therefore yields a negative value - that is the "end of
//! block" sentinel the parse loop uses to seek to the next block, not an
//! error.
//!
//! The index blob layout is documented in [`index`].
//!
//! ## Concurrency Model
//!
//! Each handle owns its index block and input stream exclusively; all parsing
//! for one handle is serialized on a fair async lock around the stream cursor,
//! so reads on the same handle run in submission order while reads on
//! different handles proceed fully in parallel. The only cross-handle shared
//! state is the [`OffsetCache`].

pub mod config;
pub mod handle;
pub mod index;
pub mod offsets;
pub mod stats;
pub mod stream;
pub mod version;

pub use config::OffloadReadConfig;
pub use handle::OffloadedReadHandle;
pub use index::{IndexEntry, OffloadIndexBlock};
pub use offsets::OffsetCache;
pub use stats::{NoopStats, OffloaderStats};
pub use stream::BackedInputStream;
pub use version::{CurrentVersionCheck, VersionCheck};

/// Bytes of record framing ahead of the payload: `[length i32][entry_id i64]`
pub const ENTRY_HEADER_SIZE: usize = 4 + 8;

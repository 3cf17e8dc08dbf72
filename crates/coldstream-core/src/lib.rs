pub mod entry;
pub mod error;
pub mod handle;
pub mod naming;

pub use entry::{LedgerEntry, LedgerMetadata};
pub use error::{Error, Result};
pub use handle::ReadHandle;

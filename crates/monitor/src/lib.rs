//! Ingestion-and-synchronization core of the sidecar.
//!
//! A generation directory of append-only task logs goes in; exactly-once
//! line batches go out to the store, and approval decisions come back as
//! marker files.

pub mod approval;
pub mod cache;
pub mod logfile;
pub mod runtime;
pub mod sync;
pub mod watch;

#[cfg(test)]
pub(crate) mod testutil;

pub use cache::TaskCache;
pub use logfile::{LOG_SUFFIX, LogFileName};
pub use runtime::Monitor;
pub use sync::{LineSynchronizer, SyncError};

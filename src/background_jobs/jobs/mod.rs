//! Specific background job implementations.

pub mod stats_sync;

pub use stats_sync::{StatsSyncJob, SyncOutcome, TickSummary};

//! Shared test timing constants

/// How long to wait for the observer server to accept requests.
pub const SERVICE_READY_TIMEOUT_MS: u64 = 5000;

/// How long to wait for a background pass to finish.
pub const PASS_TIMEOUT_MS: u64 = 10000;

/// Extractor timeout used by the test service.
pub const EXTRACTOR_TIMEOUT_SECS: u64 = 1;

pub const STATS_SYNC_JOB_ID: &str = "stats_sync";

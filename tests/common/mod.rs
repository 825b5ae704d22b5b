//! Common test infrastructure
//!
//! Each test spawns an isolated service: temporary databases, a fake
//! extractor script, the job scheduler and the observer HTTP server.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{FakeExtractorScript, SeedSong, TestService};
//!
//! #[tokio::test]
//! async fn test_song_gets_refreshed() {
//!     let script = FakeExtractorScript::new().counts("abc123", 150, 12);
//!     let service = TestService::spawn(script, &[SeedSong::stale("abc123", 100, 10)]).await;
//!     service.wait_for_completed_runs(1).await;
//! }
//! ```

mod constants;
mod fixtures;
mod service;

pub use constants::*;
pub use fixtures::{FakeExtractorScript, SeedSong};
pub use service::TestService;

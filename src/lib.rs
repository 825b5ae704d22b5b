//! Song Stats Server Library
//!
//! Keeps the play and like counters of a song library fresh by polling an
//! external metadata extractor on a schedule.

pub mod background_jobs;
pub mod config;
pub mod extractor;
pub mod server;
pub mod server_store;
pub mod song_store;
pub mod sqlite_persistence;
pub mod stats_cache;

pub use server_store::{ServerStore, SqliteServerStore};
pub use song_store::{SongStore, SqliteSongStore};
pub use stats_cache::{InMemoryStatsCache, StatsCache};

mod models;
mod schema;
mod sqlite_song_store;

pub use models::*;
pub use schema::SONG_VERSIONED_SCHEMAS;
pub use sqlite_song_store::SqliteSongStore;

use anyhow::Result;
use chrono::{DateTime, Utc};

/// Durable storage for playlists and songs.
pub trait SongStore: Send + Sync {
    // Playlists
    fn create_playlist(&self, name: &str) -> Result<Playlist>;
    fn list_playlists(&self) -> Result<Vec<Playlist>>;
    /// Deletes the playlist and, by cascade, its songs.
    fn delete_playlist(&self, playlist_id: i64) -> Result<bool>;

    // Songs
    /// Fails if a song with the same media id already exists.
    fn create_song(&self, song: &NewSong) -> Result<Song>;
    fn delete_song(&self, media_id: &str) -> Result<bool>;
    fn get_song(&self, media_id: &str) -> Result<Option<Song>>;
    fn list_songs(&self, playlist_id: Option<i64>) -> Result<Vec<Song>>;

    /// Songs last updated strictly before `cutoff`, oldest first.
    fn list_stale_songs(&self, cutoff: DateTime<Utc>) -> Result<Vec<Song>>;

    /// Overwrites the counters of a song and refreshes its `updated_at`.
    /// Returns false if no song has this media id.
    fn update_song_metrics(&self, media_id: &str, metrics: &SongMetrics) -> Result<bool>;
}

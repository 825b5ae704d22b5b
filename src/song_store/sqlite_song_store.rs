use super::models::{MetricValue, NewSong, Playlist, Song, SongMetrics};
use super::schema::SONG_VERSIONED_SCHEMAS;
use super::SongStore;
use crate::sqlite_persistence::open_versioned_db;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

const SONG_COLUMNS: &str =
    "id, playlist_id, title, artist, cover_url, media_id, views, likes, updated_at";

pub struct SqliteSongStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSongStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned_db(db_path.as_ref(), SONG_VERSIONED_SCHEMAS, "songs")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn from_timestamp(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap_or_default()
    }

    fn row_to_playlist(row: &rusqlite::Row) -> rusqlite::Result<Playlist> {
        Ok(Playlist {
            id: row.get("id")?,
            name: row.get("name")?,
            created_at: Self::from_timestamp(row.get("created_at")?),
        })
    }

    fn row_to_song(row: &rusqlite::Row) -> rusqlite::Result<Song> {
        Ok(Song {
            id: row.get("id")?,
            playlist_id: row.get("playlist_id")?,
            title: row.get("title")?,
            artist: row.get("artist")?,
            cover_url: row.get("cover_url")?,
            media_id: row.get("media_id")?,
            views: MetricValue::from_column(row.get("views")?),
            likes: MetricValue::from_column(row.get("likes")?),
            updated_at: Self::from_timestamp(row.get("updated_at")?),
        })
    }

    fn query_songs(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Song>> {
        let mut stmt = conn.prepare(sql)?;
        let songs = stmt
            .query_map(params, Self::row_to_song)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(songs)
    }
}

impl SongStore for SqliteSongStore {
    fn create_playlist(&self, name: &str) -> Result<Playlist> {
        let name = name.trim();
        if name.is_empty() {
            bail!("Playlist name cannot be empty");
        }

        let conn = self.conn.lock().unwrap();
        conn.execute("INSERT INTO playlists (name) VALUES (?1)", params![name])
            .with_context(|| format!("Failed to create playlist '{}'", name))?;
        let id = conn.last_insert_rowid();

        let playlist = conn.query_row(
            "SELECT id, name, created_at FROM playlists WHERE id = ?1",
            params![id],
            Self::row_to_playlist,
        )?;
        Ok(playlist)
    }

    fn list_playlists(&self) -> Result<Vec<Playlist>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id, name, created_at FROM playlists ORDER BY id")?;
        let playlists = stmt
            .query_map([], Self::row_to_playlist)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(playlists)
    }

    fn delete_playlist(&self, playlist_id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM playlists WHERE id = ?1", params![playlist_id])?;
        Ok(deleted > 0)
    }

    fn create_song(&self, song: &NewSong) -> Result<Song> {
        if song.media_id.trim().is_empty() {
            bail!("Media id cannot be empty");
        }

        let conn = self.conn.lock().unwrap();
        let exists = conn
            .query_row(
                "SELECT 1 FROM songs WHERE media_id = ?1",
                params![song.media_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if exists {
            bail!("A song with media id '{}' already exists", song.media_id);
        }

        conn.execute(
            "INSERT INTO songs (playlist_id, title, artist, cover_url, media_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                song.playlist_id,
                song.title,
                song.artist,
                song.cover_url,
                song.media_id
            ],
        )
        .with_context(|| format!("Failed to create song '{}'", song.media_id))?;
        let id = conn.last_insert_rowid();

        let created = conn.query_row(
            &format!("SELECT {} FROM songs WHERE id = ?1", SONG_COLUMNS),
            params![id],
            Self::row_to_song,
        )?;
        Ok(created)
    }

    fn delete_song(&self, media_id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM songs WHERE media_id = ?1", params![media_id])?;
        Ok(deleted > 0)
    }

    fn get_song(&self, media_id: &str) -> Result<Option<Song>> {
        let conn = self.conn.lock().unwrap();
        let song = conn
            .query_row(
                &format!("SELECT {} FROM songs WHERE media_id = ?1", SONG_COLUMNS),
                params![media_id],
                Self::row_to_song,
            )
            .optional()?;
        Ok(song)
    }

    fn list_songs(&self, playlist_id: Option<i64>) -> Result<Vec<Song>> {
        let conn = self.conn.lock().unwrap();
        match playlist_id {
            Some(playlist_id) => Self::query_songs(
                &conn,
                &format!(
                    "SELECT {} FROM songs WHERE playlist_id = ?1 ORDER BY id",
                    SONG_COLUMNS
                ),
                params![playlist_id],
            ),
            None => Self::query_songs(
                &conn,
                &format!("SELECT {} FROM songs ORDER BY id", SONG_COLUMNS),
                [],
            ),
        }
    }

    fn list_stale_songs(&self, cutoff: DateTime<Utc>) -> Result<Vec<Song>> {
        let conn = self.conn.lock().unwrap();
        Self::query_songs(
            &conn,
            &format!(
                "SELECT {} FROM songs WHERE updated_at < ?1 ORDER BY updated_at ASC, id ASC",
                SONG_COLUMNS
            ),
            params![cutoff.timestamp()],
        )
    }

    fn update_song_metrics(&self, media_id: &str, metrics: &SongMetrics) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE songs SET views = ?1, likes = ?2, updated_at = ?3 WHERE media_id = ?4",
            params![
                metrics.views.to_column(),
                metrics.likes.to_column(),
                Utc::now().timestamp(),
                media_id
            ],
        )?;
        Ok(updated > 0)
    }
}

//! SQLite schema for the songs database.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};

const PLAYLISTS_TABLE_V1: Table = Table {
    name: "playlists",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
};

const PLAYLIST_FOREIGN_KEY: ForeignKey = ForeignKey {
    foreign_table: "playlists",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

/// `views` and `likes` are nullable: NULL is the "unknown" marker written
/// after a failed fetch. `updated_at` is unix seconds.
const SONGS_TABLE_V1: Table = Table {
    name: "songs",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "playlist_id",
            &SqlType::Integer,
            foreign_key = Some(&PLAYLIST_FOREIGN_KEY)
        ),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("artist", &SqlType::Text, non_null = true),
        sqlite_column!("cover_url", &SqlType::Text),
        sqlite_column!("media_id", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("views", &SqlType::Integer, default_value = Some("0")),
        sqlite_column!("likes", &SqlType::Integer, default_value = Some("0")),
        sqlite_column!(
            "updated_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[
        ("idx_songs_updated_at", "updated_at"),
        ("idx_songs_playlist_id", "playlist_id"),
    ],
};

pub const SONG_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[PLAYLISTS_TABLE_V1, SONGS_TABLE_V1],
    migration: None,
}];

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_latest_schema_creates_and_validates() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = SONG_VERSIONED_SCHEMAS.last().unwrap();
        schema.create(&conn).unwrap();
        schema.validate(&conn).unwrap();
    }

    #[test]
    fn test_media_id_is_unique() {
        let conn = Connection::open_in_memory().unwrap();
        SONG_VERSIONED_SCHEMAS[0].create(&conn).unwrap();
        conn.execute(
            "INSERT INTO songs (title, artist, media_id) VALUES ('a', 'b', 'abc123')",
            [],
        )
        .unwrap();

        let duplicate = conn.execute(
            "INSERT INTO songs (title, artist, media_id) VALUES ('c', 'd', 'abc123')",
            [],
        );
        assert!(duplicate.is_err());
    }

    #[test]
    fn test_new_song_counters_default_to_zero() {
        let conn = Connection::open_in_memory().unwrap();
        SONG_VERSIONED_SCHEMAS[0].create(&conn).unwrap();
        conn.execute(
            "INSERT INTO songs (title, artist, media_id) VALUES ('a', 'b', 'abc123')",
            [],
        )
        .unwrap();

        let (views, likes): (Option<i64>, Option<i64>) = conn
            .query_row("SELECT views, likes FROM songs", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(views, Some(0));
        assert_eq!(likes, Some(0));
    }
}

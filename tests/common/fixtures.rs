//! Test data: seeded songs and fake extractor scripts

use chrono::Utc;
use rusqlite::{params, Connection};
use song_stats_server::song_store::{NewSong, SongStore};
use std::path::{Path, PathBuf};

/// A song inserted before the service starts.
pub struct SeedSong {
    pub media_id: &'static str,
    pub views: u64,
    pub likes: u64,
    pub age_minutes: i64,
}

impl SeedSong {
    /// A song last updated 11 minutes ago, past the default 10 minute threshold.
    pub fn stale(media_id: &'static str, views: u64, likes: u64) -> Self {
        Self {
            media_id,
            views,
            likes,
            age_minutes: 11,
        }
    }

    pub fn fresh(media_id: &'static str, views: u64, likes: u64) -> Self {
        Self {
            media_id,
            views,
            likes,
            age_minutes: 1,
        }
    }
}

pub fn seed_songs(store: &dyn SongStore, db_path: &Path, songs: &[SeedSong]) {
    let conn = Connection::open(db_path).expect("Failed to open songs db");
    for seed in songs {
        store
            .create_song(&NewSong {
                playlist_id: None,
                title: format!("Title of {}", seed.media_id),
                artist: "Test Artist".to_string(),
                cover_url: None,
                media_id: seed.media_id.to_string(),
            })
            .expect("Failed to create song");
        let updated_at = Utc::now() - chrono::Duration::minutes(seed.age_minutes);
        conn.execute(
            "UPDATE songs SET views = ?1, likes = ?2, updated_at = ?3 WHERE media_id = ?4",
            params![
                seed.views as i64,
                seed.likes as i64,
                updated_at.timestamp(),
                seed.media_id
            ],
        )
        .expect("Failed to seed song counters");
    }
}

/// A shell script standing in for the extractor binary.
///
/// It receives the media id as its only argument (the test service uses
/// `{id}` as URL template) and answers per id.
#[derive(Default)]
pub struct FakeExtractorScript {
    cases: Vec<(String, String)>,
}

impl FakeExtractorScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(mut self, media_id: &str, views: u64, likes: u64) -> Self {
        let json = format!(
            r#"{{"id":"{}","title":"t","view_count":{},"like_count":{}}}"#,
            media_id, views, likes
        );
        self.cases
            .push((media_id.to_string(), format!("echo '{}'", json)));
        self
    }

    pub fn raw_output(mut self, media_id: &str, stdout: &str) -> Self {
        self.cases
            .push((media_id.to_string(), format!("echo '{}'", stdout)));
        self
    }

    /// Never answers within the extractor timeout.
    pub fn hangs(mut self, media_id: &str) -> Self {
        self.cases
            .push((media_id.to_string(), "exec sleep 30".to_string()));
        self
    }

    pub fn write_to(&self, dir: &Path) -> PathBuf {
        let mut script = String::from("case \"$1\" in\n");
        for (media_id, action) in &self.cases {
            script.push_str(&format!("  {}) {} ;;\n", media_id, action));
        }
        script.push_str("  *) echo \"ERROR: [youtube] $1: Video unavailable\" >&2; exit 1 ;;\n");
        script.push_str("esac\n");

        let path = dir.join("fake-extractor.sh");
        std::fs::write(&path, script).expect("Failed to write extractor script");
        path
    }
}

//! Test service lifecycle management
//!
//! Spawns the scheduler with the stats sync job and the observer server on
//! a random port. Everything lives in a temporary directory.

use super::constants::*;
use super::fixtures::{seed_songs, FakeExtractorScript, SeedSong};
use song_stats_server::background_jobs::jobs::StatsSyncJob;
use song_stats_server::background_jobs::{create_scheduler, JobContext};
use song_stats_server::config::{ExtractorSettings, StatsSyncSettings};
use song_stats_server::extractor::YtDlpExtractor;
use song_stats_server::server::{make_observer_app, metrics, ObserverState};
use song_stats_server::server_store::{JobRunStatus, ServerStore};
use song_stats_server::{InMemoryStatsCache, SqliteServerStore, SqliteSongStore};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Test service instance
///
/// When dropped, the scheduler and the server are shut down.
pub struct TestService {
    /// Base URL of the observer server (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    pub song_store: Arc<SqliteSongStore>,
    pub server_store: Arc<SqliteServerStore>,
    pub stats_cache: Arc<InMemoryStatsCache>,
    pub shutdown_token: CancellationToken,

    scheduler_task: Option<JoinHandle<()>>,
    _temp_dir: TempDir,
}

impl TestService {
    /// Spawns a service whose stats sync job runs right away (it has no
    /// schedule state yet) and then every hour.
    pub async fn spawn(script: FakeExtractorScript, songs: &[SeedSong]) -> Self {
        Self::spawn_with_cooldown(script, songs, Duration::ZERO).await
    }

    pub async fn spawn_with_cooldown(
        script: FakeExtractorScript,
        songs: &[SeedSong],
        cooldown: Duration,
    ) -> Self {
        metrics::init_metrics();

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let songs_db = temp_dir.path().join("songs.db");
        let song_store =
            Arc::new(SqliteSongStore::new(&songs_db).expect("Failed to open song store"));
        let server_store = Arc::new(
            SqliteServerStore::new(temp_dir.path().join("server.db"))
                .expect("Failed to open server store"),
        );
        let stats_cache = Arc::new(InMemoryStatsCache::new(100));

        seed_songs(song_store.as_ref(), &songs_db, songs);

        let script_path = script.write_to(temp_dir.path());
        let extractor = YtDlpExtractor::from_settings(&ExtractorSettings {
            binary: "sh".to_string(),
            args: vec![script_path.display().to_string()],
            url_template: "{id}".to_string(),
            timeout_secs: EXTRACTOR_TIMEOUT_SECS,
        });
        let settings = StatsSyncSettings {
            interval_secs: 3600,
            cooldown_secs: 0,
            ..Default::default()
        };
        let job = StatsSyncJob::new(Arc::new(extractor), &settings).with_cooldown(cooldown);

        let shutdown_token = CancellationToken::new();
        let job_context = JobContext::new(
            shutdown_token.child_token(),
            song_store.clone(),
            stats_cache.clone(),
            server_store.clone(),
        );
        let (mut scheduler, scheduler_handle) =
            create_scheduler(server_store.clone(), shutdown_token.clone(), job_context);
        scheduler.register_job(Arc::new(job)).await;

        let app = make_observer_app(ObserverState {
            scheduler_handle,
            song_store: song_store.clone(),
            stats_cache: stats_cache.clone(),
        });

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let server_token = shutdown_token.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { server_token.cancelled().await })
                .await
                .expect("Server failed");
        });

        let scheduler_task = tokio::spawn(async move { scheduler.run().await });

        let service = Self {
            base_url: format!("http://127.0.0.1:{}", port),
            song_store,
            server_store,
            stats_cache,
            shutdown_token,
            scheduler_task: Some(scheduler_task),
            _temp_dir: temp_dir,
        };
        service.wait_for_ready().await;
        service
    }

    async fn wait_for_ready(&self) {
        let client = reqwest::Client::new();
        let start = Instant::now();
        while start.elapsed() < Duration::from_millis(SERVICE_READY_TIMEOUT_MS) {
            if let Ok(response) = client
                .get(format!("{}/metrics", self.base_url))
                .send()
                .await
            {
                if response.status().is_success() {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("Observer server did not become ready");
    }

    /// Waits until the stats sync job has at least `count` finished runs.
    pub async fn wait_for_completed_runs(&self, count: usize) {
        let start = Instant::now();
        while start.elapsed() < Duration::from_millis(PASS_TIMEOUT_MS) {
            let finished = self
                .server_store
                .get_job_history(STATS_SYNC_JOB_ID, 100)
                .expect("Failed to read job history")
                .iter()
                .filter(|run| run.status != JobRunStatus::Running)
                .count();
            if finished >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("Stats sync did not finish {} run(s) in time", count);
    }

    /// Cancels everything and waits for the scheduler to stop.
    pub async fn shutdown(&mut self) -> Duration {
        let start = Instant::now();
        self.shutdown_token.cancel();
        if let Some(task) = self.scheduler_task.take() {
            tokio::time::timeout(Duration::from_secs(10), task)
                .await
                .expect("Scheduler did not stop")
                .expect("Scheduler task failed");
        }
        start.elapsed()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestService {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}

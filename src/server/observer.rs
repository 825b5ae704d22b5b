//! Small HTTP surface for operators: Prometheus scraping, job status and
//! manual triggers, and cached song stats.

use super::metrics::{self, metrics_handler};
use crate::background_jobs::{JobError, SchedulerHandle};
use crate::song_store::SongStore;
use crate::stats_cache::{read_through, StatsCache};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Clone)]
pub struct ObserverState {
    pub scheduler_handle: SchedulerHandle,
    pub song_store: Arc<dyn SongStore>,
    pub stats_cache: Arc<dyn StatsCache>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

async fn list_jobs(State(state): State<ObserverState>) -> Response {
    match state.scheduler_handle.list_jobs().await {
        Ok(jobs) => Json(jobs).into_response(),
        Err(e) => {
            error!("Failed to list jobs: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to list jobs")
        }
    }
}

async fn trigger_job(State(state): State<ObserverState>, Path(job_id): Path<String>) -> Response {
    match state.scheduler_handle.trigger_job(&job_id).await {
        Ok(()) => {
            info!("Job {} triggered manually", job_id);
            (
                StatusCode::ACCEPTED,
                Json(json!({ "job_id": job_id, "status": "triggered" })),
            )
                .into_response()
        }
        Err(JobError::NotFound) => error_response(StatusCode::NOT_FOUND, "Job not found"),
        Err(JobError::AlreadyRunning) => {
            error_response(StatusCode::CONFLICT, "Job is already running")
        }
        Err(e) => {
            error!("Failed to trigger job {}: {}", job_id, e);
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

async fn song_stats(
    State(state): State<ObserverState>,
    Path(media_id): Path<String>,
) -> Response {
    match read_through(
        state.stats_cache.as_ref(),
        state.song_store.as_ref(),
        &media_id,
    )
    .await
    {
        Ok(Some((stats, source))) => {
            metrics::record_stats_lookup(source.as_str());
            Json(json!({
                "media_id": media_id,
                "views": stats.views,
                "likes": stats.likes,
                "source": source.as_str(),
            }))
            .into_response()
        }
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Song not found"),
        Err(e) => {
            error!("Failed to read stats for {}: {:#}", media_id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read stats")
        }
    }
}

async fn log_requests(request: Request<Body>, next: Next) -> impl IntoResponse {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    debug!(
        "<<< {} {} {} ({:?})",
        method,
        path,
        response.status().as_u16(),
        start.elapsed()
    );
    response
}

pub fn make_observer_app(state: ObserverState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/jobs", get(list_jobs))
        .route("/jobs/{job_id}/trigger", post(trigger_job))
        .route("/songs/{media_id}/stats", get(song_stats))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

/// Serves the observer endpoints until `shutdown_token` is cancelled.
pub async fn run_observer_server(
    port: u16,
    state: ObserverState,
    shutdown_token: CancellationToken,
) -> Result<()> {
    let app = make_observer_app(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind observer server to port {}", port))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown_token.cancelled().await })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background_jobs::{
        create_scheduler, BackgroundJob, JobContext, JobSchedule, JobScheduler,
    };
    use crate::server_store::SqliteServerStore;
    use crate::song_store::{MetricValue, NewSong, SongMetrics, SqliteSongStore};
    use crate::stats_cache::InMemoryStatsCache;
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct SlowJob;

    #[async_trait]
    impl BackgroundJob for SlowJob {
        fn id(&self) -> &'static str {
            "slow_job"
        }
        fn name(&self) -> &'static str {
            "Slow Job"
        }
        fn description(&self) -> &'static str {
            "Sleeps until cancelled"
        }
        fn schedule(&self) -> JobSchedule {
            JobSchedule::Interval(Duration::from_secs(3600))
        }
        async fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
            ctx.sleep(Duration::from_secs(30)).await
        }
    }

    struct Fixture {
        app: Router,
        scheduler: JobScheduler,
        shutdown_token: CancellationToken,
        song_store: Arc<SqliteSongStore>,
        cache: Arc<InMemoryStatsCache>,
        _temp_dir: TempDir,
    }

    async fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let server_store =
            Arc::new(SqliteServerStore::new(temp_dir.path().join("server.db")).unwrap());
        let song_store = Arc::new(SqliteSongStore::new(temp_dir.path().join("songs.db")).unwrap());
        let cache = Arc::new(InMemoryStatsCache::new(10));
        let shutdown_token = CancellationToken::new();
        let ctx = JobContext::new(
            shutdown_token.child_token(),
            song_store.clone(),
            cache.clone(),
            server_store.clone(),
        );
        let (mut scheduler, scheduler_handle) =
            create_scheduler(server_store, shutdown_token.clone(), ctx);
        scheduler.register_job(Arc::new(SlowJob)).await;

        let app = make_observer_app(ObserverState {
            scheduler_handle,
            song_store: song_store.clone(),
            stats_cache: cache.clone(),
        });

        Fixture {
            app,
            scheduler,
            shutdown_token,
            song_store,
            cache,
            _temp_dir: temp_dir,
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_request(uri: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn serves_prometheus_metrics() {
        let fx = fixture().await;
        metrics::init_metrics();
        metrics::record_song_sync("updated");

        let response = fx.app.oneshot(get_request("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("song_stats_song_syncs_total"));
    }

    #[tokio::test]
    async fn lists_registered_jobs() {
        let fx = fixture().await;

        let response = fx.app.oneshot(get_request("/jobs")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json[0]["id"], "slow_job");
        assert_eq!(json[0]["schedule"]["type"], "interval");
        assert_eq!(json[0]["is_running"], false);
    }

    #[tokio::test]
    async fn trigger_unknown_job_is_not_found() {
        let fx = fixture().await;
        let shutdown = fx.shutdown_token.clone();
        let mut scheduler = fx.scheduler;
        let scheduler = tokio::spawn(async move { scheduler.run().await });

        let response = fx
            .app
            .oneshot(post_request("/jobs/nonexistent/trigger"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        shutdown.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(2), scheduler).await;
    }

    #[tokio::test]
    async fn trigger_running_job_conflicts() {
        let fx = fixture().await;
        let shutdown = fx.shutdown_token.clone();
        let mut scheduler = fx.scheduler;
        // No schedule state yet, so the interval job starts right away.
        let scheduler = tokio::spawn(async move { scheduler.run().await });
        tokio::time::sleep(Duration::from_millis(100)).await;

        let response = fx
            .app
            .clone()
            .oneshot(post_request("/jobs/slow_job/trigger"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        shutdown.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(2), scheduler).await;

        // Once the scheduler is gone, triggers cannot be delivered.
        let response = fx
            .app
            .oneshot(post_request("/jobs/slow_job/trigger"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn song_stats_read_through() {
        let fx = fixture().await;
        fx.song_store
            .create_song(&NewSong {
                playlist_id: None,
                title: "Song".to_string(),
                artist: "Artist".to_string(),
                cover_url: None,
                media_id: "abc123".to_string(),
            })
            .unwrap();

        let response = fx
            .app
            .clone()
            .oneshot(get_request("/songs/abc123/stats"))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["source"], "store");
        assert_eq!(json["views"], 0);

        fx.cache
            .set(
                "abc123",
                SongMetrics::new(MetricValue::Known(150), MetricValue::Unknown),
                Duration::from_secs(60),
            )
            .await;
        let response = fx
            .app
            .clone()
            .oneshot(get_request("/songs/abc123/stats"))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["source"], "cache");
        assert_eq!(json["views"], 150);
        assert_eq!(json["likes"], "unknown");

        let response = fx
            .app
            .oneshot(get_request("/songs/missing/stats"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all song stats metrics
const PREFIX: &str = "song_stats";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Background jobs
    pub static ref BACKGROUND_JOB_EXECUTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_background_job_executions_total"), "Background job executions by outcome"),
        &["job_id", "status"]
    ).expect("Failed to create background_job_executions_total metric");

    pub static ref BACKGROUND_JOB_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_background_job_duration_seconds"),
            "Background job duration in seconds"
        )
        .buckets(vec![0.1, 1.0, 10.0, 30.0, 60.0, 300.0, 900.0, 1800.0, 3600.0]),
        &["job_id"]
    ).expect("Failed to create background_job_duration_seconds metric");

    pub static ref BACKGROUND_JOB_RUNNING: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_background_job_running"), "1 while the job is running"),
        &["job_id"]
    ).expect("Failed to create background_job_running metric");

    // Stats synchronization
    pub static ref SONG_SYNCS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_song_syncs_total"), "Per-song synchronization outcomes"),
        &["outcome"]
    ).expect("Failed to create song_syncs_total metric");

    pub static ref EXTRACTOR_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_extractor_duration_seconds"),
            "Metadata extractor call duration in seconds"
        )
        .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["result"]
    ).expect("Failed to create extractor_duration_seconds metric");

    pub static ref STATS_LOOKUPS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_stats_lookups_total"), "Song stats lookups by source"),
        &["source"]
    ).expect("Failed to create stats_lookups_total metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(BACKGROUND_JOB_EXECUTIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(BACKGROUND_JOB_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(BACKGROUND_JOB_RUNNING.clone()));
    let _ = REGISTRY.register(Box::new(SONG_SYNCS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(EXTRACTOR_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(STATS_LOOKUPS_TOTAL.clone()));
}

pub fn record_background_job_execution(job_id: &str, status: &str, duration: Duration) {
    BACKGROUND_JOB_EXECUTIONS_TOTAL
        .with_label_values(&[job_id, status])
        .inc();
    BACKGROUND_JOB_DURATION_SECONDS
        .with_label_values(&[job_id])
        .observe(duration.as_secs_f64());
}

pub fn set_background_job_running(job_id: &str, running: bool) {
    BACKGROUND_JOB_RUNNING
        .with_label_values(&[job_id])
        .set(if running { 1.0 } else { 0.0 });
}

pub fn record_song_sync(outcome: &str) {
    SONG_SYNCS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_extractor_call(result: &str, duration: Duration) {
    EXTRACTOR_DURATION_SECONDS
        .with_label_values(&[result])
        .observe(duration.as_secs_f64());
}

pub fn record_stats_lookup(source: &str) {
    STATS_LOOKUPS_TOTAL.with_label_values(&[source]).inc();
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}

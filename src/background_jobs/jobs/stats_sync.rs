//! Periodic refresh of song play/like counters.
//!
//! Each pass selects the songs whose counters are older than `stale_after`,
//! asks the metadata extractor for fresh numbers one song at a time, and
//! writes the result to the song store and then to the stats cache. A failed
//! fetch stores the `unknown` sentinel instead of keeping the old numbers.
//! Consecutive extractor calls are spaced by `cooldown` to stay below the
//! upstream rate limits.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, HookEvent, JobError, JobSchedule, ShutdownBehavior},
    JobAuditLogger,
};
use crate::config::StatsSyncSettings;
use crate::extractor::MetadataExtractor;
use crate::server::metrics;
use crate::song_store::SongMetrics;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// What happened to a single song during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Fresh counters stored.
    Updated,
    /// Extraction failed, the sentinel was stored.
    Unknown,
    /// The durable write failed; nothing was cached.
    StorageFailed,
    /// The song was deleted after selection.
    Missing,
}

impl SyncOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOutcome::Updated => "updated",
            SyncOutcome::Unknown => "unknown",
            SyncOutcome::StorageFailed => "storage_failed",
            SyncOutcome::Missing => "missing",
        }
    }
}

/// Per-pass counts, also written to the audit log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    pub selected: usize,
    pub updated: usize,
    pub unknown: usize,
    pub storage_failed: usize,
    pub missing: usize,
}

impl TickSummary {
    fn record(&mut self, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::Updated => self.updated += 1,
            SyncOutcome::Unknown => self.unknown += 1,
            SyncOutcome::StorageFailed => self.storage_failed += 1,
            SyncOutcome::Missing => self.missing += 1,
        }
    }

    pub fn processed(&self) -> usize {
        self.updated + self.unknown + self.storage_failed + self.missing
    }

    pub fn failed(&self) -> usize {
        self.processed() - self.updated
    }

    fn to_json(self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Background job that keeps song counters fresh.
pub struct StatsSyncJob {
    extractor: Arc<dyn MetadataExtractor>,
    interval: Duration,
    stale_after: Duration,
    cooldown: Duration,
    cache_ttl: Duration,
    run_on_startup: bool,
}

impl StatsSyncJob {
    pub fn new(extractor: Arc<dyn MetadataExtractor>, settings: &StatsSyncSettings) -> Self {
        Self {
            extractor,
            interval: settings.interval(),
            stale_after: settings.stale_after(),
            cooldown: settings.cooldown(),
            cache_ttl: settings.cache_ttl(),
            run_on_startup: settings.run_on_startup,
        }
    }

    /// Overrides the pause between extractor calls.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Overrides the staleness threshold.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Runs one synchronization pass over the stale songs.
    ///
    /// Only a failure to select the songs fails the pass. Per-song failures
    /// are logged, counted and skipped over.
    pub async fn run_tick(&self, ctx: &JobContext) -> Result<TickSummary, JobError> {
        let audit = JobAuditLogger::new(Arc::clone(&ctx.server_store), self.id());

        let cutoff = stale_cutoff(Utc::now(), self.stale_after);
        let songs = match ctx.song_store.list_stale_songs(cutoff) {
            Ok(songs) => songs,
            Err(e) => {
                let message = format!("Failed to select stale songs: {}", e);
                audit.log_failed(&message, None);
                return Err(JobError::ExecutionFailed(message));
            }
        };

        audit.log_started(Some(serde_json::json!({
            "stale_songs": songs.len(),
            "cutoff": cutoff.to_rfc3339(),
        })));
        info!(
            stale_songs = songs.len(),
            cutoff = %cutoff.to_rfc3339(),
            "Starting stats sync pass"
        );

        let mut summary = TickSummary {
            selected: songs.len(),
            ..Default::default()
        };

        for (index, song) in songs.iter().enumerate() {
            if index > 0 && !self.cooldown.is_zero() {
                if let Err(e) = ctx.sleep(self.cooldown).await {
                    audit.log_failed("Cancelled during cooldown", Some(summary.to_json()));
                    return Err(e);
                }
            }

            // Dropping the fetch kills the extractor process.
            let stats = tokio::select! {
                stats = self.fetch_metrics(&song.media_id) => stats,
                _ = ctx.cancellation_token.cancelled() => {
                    info!(media_id = %song.media_id, "Stats sync cancelled during fetch");
                    audit.log_failed("Cancelled during fetch", Some(summary.to_json()));
                    return Err(JobError::Cancelled);
                }
            };

            let outcome = self.store_metrics(ctx, &song.media_id, stats).await;
            summary.record(outcome);
            metrics::record_song_sync(outcome.as_str());

            info!(
                media_id = %song.media_id,
                outcome = outcome.as_str(),
                views = %stats.views,
                likes = %stats.likes,
                "Song stats synced"
            );
        }

        info!(
            processed = summary.processed(),
            failed = summary.failed(),
            "Stats sync pass finished"
        );
        audit.log_completed(Some(summary.to_json()));

        Ok(summary)
    }

    /// Runs one pass outside the scheduler.
    ///
    /// Returns `Ok(None)` when the pass was interrupted by cancellation.
    pub async fn run_single_pass(
        &self,
        ctx: &JobContext,
    ) -> Result<Option<TickSummary>, JobError> {
        match self.run_tick(ctx).await {
            Ok(summary) => Ok(Some(summary)),
            Err(JobError::Cancelled) => {
                info!("Stats sync pass interrupted by shutdown");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Fetches fresh counters, falling back to the sentinel on any failure.
    async fn fetch_metrics(&self, media_id: &str) -> SongMetrics {
        let started = Instant::now();
        match self.extractor.fetch_metadata(media_id).await {
            Ok(metadata) => {
                metrics::record_extractor_call("success", started.elapsed());
                metadata.into_metrics()
            }
            Err(e) => {
                metrics::record_extractor_call(e.kind(), started.elapsed());
                warn!(
                    media_id = %media_id,
                    error_kind = e.kind(),
                    "Metadata extraction failed: {}",
                    e
                );
                SongMetrics::unknown()
            }
        }
    }

    /// Writes to the song store, then to the cache if the row was updated.
    async fn store_metrics(
        &self,
        ctx: &JobContext,
        media_id: &str,
        stats: SongMetrics,
    ) -> SyncOutcome {
        match ctx.song_store.update_song_metrics(media_id, &stats) {
            Ok(true) => {}
            Ok(false) => {
                warn!(media_id = %media_id, "Song disappeared before its stats were stored");
                return SyncOutcome::Missing;
            }
            Err(e) => {
                error!(media_id = %media_id, "Failed to store song stats: {:#}", e);
                return SyncOutcome::StorageFailed;
            }
        }

        ctx.stats_cache.set(media_id, stats, self.cache_ttl).await;

        if stats.is_unknown() {
            SyncOutcome::Unknown
        } else {
            SyncOutcome::Updated
        }
    }
}

/// Songs last updated before the returned instant are stale.
///
/// A threshold reaching past the earliest representable time selects nothing.
fn stale_cutoff(now: DateTime<Utc>, stale_after: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(stale_after)
        .ok()
        .and_then(|threshold| now.checked_sub_signed(threshold))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[async_trait]
impl BackgroundJob for StatsSyncJob {
    fn id(&self) -> &'static str {
        "stats_sync"
    }

    fn name(&self) -> &'static str {
        "Stats Sync"
    }

    fn description(&self) -> &'static str {
        "Refresh view and like counts of stale songs from the metadata extractor"
    }

    fn schedule(&self) -> JobSchedule {
        if self.run_on_startup {
            JobSchedule::Combined {
                interval: Some(self.interval),
                hooks: vec![HookEvent::OnStartup],
            }
        } else {
            JobSchedule::Interval(self.interval)
        }
    }

    fn shutdown_behavior(&self) -> ShutdownBehavior {
        // An interrupted song is simply picked up again by the next pass.
        ShutdownBehavior::Cancellable
    }

    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        self.run_tick(ctx).await.map(|_| ())
    }
}

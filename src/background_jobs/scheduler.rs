use super::context::JobContext;
use super::handle::{SchedulerCommand, SchedulerHandle, SharedJobState};
use super::job::{BackgroundJob, HookEvent, JobError, ShutdownBehavior};
use crate::server::metrics;
use crate::server_store::{JobRunStatus, JobScheduleState, ServerStore};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Upper bound on how long the loop sleeps when nothing is due.
const MAX_IDLE_SLEEP: Duration = Duration::from_secs(60);

/// How long shutdown waits for each running job.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Manages background job scheduling and execution.
///
/// A job never runs concurrently with itself: scheduled runs falling due
/// while the job is running are skipped, manual triggers are rejected.
pub struct JobScheduler {
    shared_state: Arc<RwLock<SharedJobState>>,

    /// Task handles of running jobs, managed by the scheduler loop only.
    running_handles: HashMap<String, JoinHandle<()>>,

    job_cancel_tokens: HashMap<String, CancellationToken>,

    server_store: Arc<dyn ServerStore>,

    command_receiver: mpsc::Receiver<SchedulerCommand>,

    /// Job tasks report their id here when they finish.
    completion_tx: mpsc::UnboundedSender<String>,
    completion_rx: mpsc::UnboundedReceiver<String>,

    shutdown_token: CancellationToken,

    /// Resources handed to jobs; each run gets a child of its token.
    job_context: JobContext,
}

impl JobScheduler {
    pub fn new(
        server_store: Arc<dyn ServerStore>,
        command_receiver: mpsc::Receiver<SchedulerCommand>,
        shutdown_token: CancellationToken,
        job_context: JobContext,
        shared_state: Arc<RwLock<SharedJobState>>,
    ) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            shared_state,
            running_handles: HashMap::new(),
            job_cancel_tokens: HashMap::new(),
            server_store,
            command_receiver,
            completion_tx,
            completion_rx,
            shutdown_token,
            job_context,
        }
    }

    pub async fn register_job(&mut self, job: Arc<dyn BackgroundJob>) {
        let job_id = job.id().to_string();
        info!("Registering job: {} - {}", job_id, job.description());
        let mut state = self.shared_state.write().await;
        state.jobs.insert(job_id, job);
    }

    pub async fn job_count(&self) -> usize {
        self.shared_state.read().await.jobs.len()
    }

    /// Main scheduler loop, returns after shutdown.
    pub async fn run(&mut self) {
        let job_count = self.job_count().await;
        info!("Starting job scheduler with {} registered jobs", job_count);

        match self.server_store.mark_stale_jobs_failed() {
            Ok(count) if count > 0 => {
                info!("Marked {} stale jobs as failed from previous run", count);
            }
            Ok(_) => {}
            Err(e) => {
                error!("Failed to mark stale jobs: {}", e);
            }
        }

        self.trigger_jobs_for_hook(HookEvent::OnStartup).await;

        loop {
            let sleep_duration = self.time_until_next_scheduled_job().await;
            debug!(
                "Scheduler sleeping for {:?} until next scheduled job",
                sleep_duration
            );

            tokio::select! {
                _ = tokio::time::sleep(sleep_duration) => {
                    self.run_due_jobs().await;
                }
                Some(cmd) = self.command_receiver.recv() => {
                    self.handle_command(cmd).await;
                }
                Some(job_id) = self.completion_rx.recv() => {
                    self.cleanup_finished_job(&job_id).await;
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Scheduler received shutdown signal");
                    self.shutdown().await;
                    break;
                }
            }
        }

        info!("Job scheduler stopped");
    }

    async fn handle_command(&mut self, cmd: SchedulerCommand) {
        match cmd {
            SchedulerCommand::TriggerJob { job_id, response } => {
                let result = self.trigger_job(&job_id).await;
                let _ = response.send(result);
            }
        }
    }

    async fn trigger_job(&mut self, job_id: &str) -> Result<(), JobError> {
        let state = self.shared_state.read().await;
        if !state.jobs.contains_key(job_id) {
            return Err(JobError::NotFound);
        }
        if state.running_jobs.contains(job_id) {
            return Err(JobError::AlreadyRunning);
        }
        drop(state);

        self.spawn_job(job_id, "manual").await;
        Ok(())
    }

    async fn time_until_next_scheduled_job(&self) -> Duration {
        let mut min_duration = MAX_IDLE_SLEEP;
        let now = Utc::now();

        let state = self.shared_state.read().await;
        for (job_id, job) in &state.jobs {
            // Running jobs are rescheduled when they finish.
            if state.running_jobs.contains(job_id) {
                continue;
            }

            if let Some(next_run) = self.get_next_run_time(job_id, job.as_ref()) {
                if next_run <= now {
                    return Duration::ZERO;
                }
                let duration = (next_run - now).to_std().unwrap_or(Duration::ZERO);
                min_duration = min_duration.min(duration);
            }
        }

        min_duration
    }

    /// Next scheduled run of an interval job; due immediately if it never ran.
    ///
    /// An interval too large to land on a representable time is never due.
    fn get_next_run_time(&self, job_id: &str, job: &dyn BackgroundJob) -> Option<DateTime<Utc>> {
        let interval = job.schedule().interval()?;
        checked_next_slot(Utc::now(), interval)?;
        match self.server_store.get_schedule_state(job_id) {
            Ok(Some(state)) => Some(state.next_run_at),
            Ok(None) => Some(Utc::now()),
            Err(e) => {
                error!("Failed to read schedule state for {}: {}", job_id, e);
                None
            }
        }
    }

    async fn run_due_jobs(&mut self) {
        let now = Utc::now();
        let mut jobs_to_run = Vec::new();

        {
            let state = self.shared_state.read().await;
            for (job_id, job) in &state.jobs {
                if state.running_jobs.contains(job_id) {
                    continue;
                }
                if let Some(next_run) = self.get_next_run_time(job_id, job.as_ref()) {
                    if next_run <= now {
                        jobs_to_run.push(job_id.clone());
                    }
                }
            }
        }

        for job_id in jobs_to_run {
            self.spawn_job(&job_id, "schedule").await;
        }
    }

    async fn trigger_jobs_for_hook(&mut self, event: HookEvent) {
        let mut jobs_to_trigger = Vec::new();

        {
            let state = self.shared_state.read().await;
            for (job_id, job) in &state.jobs {
                if state.running_jobs.contains(job_id) {
                    debug!("Skipping hook trigger for already running job: {}", job_id);
                    continue;
                }
                if job.schedule().listens_to(event) {
                    jobs_to_trigger.push(job_id.clone());
                }
            }
        }

        for job_id in jobs_to_trigger {
            let trigger = format!("hook:{}", event);
            self.spawn_job(&job_id, &trigger).await;
        }
    }

    async fn spawn_job(&mut self, job_id: &str, triggered_by: &str) {
        let job = {
            let state = self.shared_state.read().await;
            match state.jobs.get(job_id) {
                Some(job) => Arc::clone(job),
                None => {
                    error!("Attempted to spawn unknown job: {}", job_id);
                    return;
                }
            }
        };

        let run_id = match self.server_store.record_job_start(job_id, triggered_by) {
            Ok(id) => id,
            Err(e) => {
                error!("Failed to record job start for {}: {}", job_id, e);
                return;
            }
        };

        info!(
            "Starting job: {} (run_id: {}, triggered_by: {})",
            job_id, run_id, triggered_by
        );

        {
            let mut state = self.shared_state.write().await;
            state.running_jobs.insert(job_id.to_string());
        }

        // Anchor the interval grid on this run's start.
        let started_at = Utc::now();
        let interval = job.schedule().interval();
        if let Some(interval) = interval {
            let last_run_at = self
                .server_store
                .get_schedule_state(job_id)
                .ok()
                .flatten()
                .and_then(|s| s.last_run_at);
            match checked_next_slot(started_at, interval) {
                Some(next_run_at) => {
                    let schedule_state = JobScheduleState {
                        job_id: job_id.to_string(),
                        next_run_at,
                        last_run_at,
                    };
                    if let Err(e) = self.server_store.update_schedule_state(&schedule_state) {
                        warn!("Failed to initialize schedule state for {}: {}", job_id, e);
                    }
                }
                None => warn!(
                    "Interval of job {} is out of range, next run not scheduled",
                    job_id
                ),
            }
        }

        metrics::set_background_job_running(job_id, true);

        let cancel_token = self.job_context.cancellation_token.child_token();
        self.job_cancel_tokens
            .insert(job_id.to_string(), cancel_token.clone());
        let ctx = self.job_context.with_token(cancel_token);

        let server_store = Arc::clone(&self.server_store);
        let shared_state = Arc::clone(&self.shared_state);
        let completion_tx = self.completion_tx.clone();
        let job_id_owned = job_id.to_string();

        let handle = tokio::spawn(async move {
            let start_time = Instant::now();
            // Inner task so that a panicking job surfaces as a JoinError.
            let result = tokio::spawn(async move { job.execute(&ctx).await }).await;
            let elapsed = start_time.elapsed();

            let (status, error_msg, status_label) = match result {
                Ok(Ok(())) => {
                    info!(
                        "Job {} completed successfully in {:?}",
                        job_id_owned, elapsed
                    );
                    (JobRunStatus::Completed, None, "success")
                }
                Ok(Err(JobError::Cancelled)) => {
                    info!("Job {} was cancelled after {:?}", job_id_owned, elapsed);
                    (
                        JobRunStatus::Failed,
                        Some("Cancelled".to_string()),
                        "cancelled",
                    )
                }
                Ok(Err(e)) => {
                    error!("Job {} failed after {:?}: {}", job_id_owned, elapsed, e);
                    (JobRunStatus::Failed, Some(e.to_string()), "failed")
                }
                Err(e) => {
                    error!("Job {} panicked after {:?}: {}", job_id_owned, elapsed, e);
                    (
                        JobRunStatus::Failed,
                        Some(format!("Task panic: {}", e)),
                        "panic",
                    )
                }
            };

            metrics::record_background_job_execution(&job_id_owned, status_label, elapsed);
            metrics::set_background_job_running(&job_id_owned, false);

            if let Err(e) = server_store.record_job_finish(run_id, status, error_msg) {
                error!("Failed to record job finish for {}: {}", job_id_owned, e);
            }

            if let Some(interval) = interval {
                advance_schedule(server_store.as_ref(), &job_id_owned, interval, Utc::now());
            }

            {
                let mut state = shared_state.write().await;
                state.running_jobs.remove(&job_id_owned);
            }

            let _ = completion_tx.send(job_id_owned);
        });

        self.running_handles.insert(job_id.to_string(), handle);
    }

    async fn cleanup_finished_job(&mut self, job_id: &str) {
        if let Some(handle) = self.running_handles.remove(job_id) {
            let _ = handle.await;
        }
        self.job_cancel_tokens.remove(job_id);
    }

    async fn shutdown(&mut self) {
        info!("Shutting down scheduler...");

        {
            let state = self.shared_state.read().await;
            for job_id in &state.running_jobs {
                if let Some(job) = state.jobs.get(job_id) {
                    if job.shutdown_behavior() == ShutdownBehavior::Cancellable {
                        if let Some(token) = self.job_cancel_tokens.get(job_id) {
                            debug!("Cancelling job: {}", job_id);
                            token.cancel();
                        }
                    }
                }
            }
        }

        let mut wait_jobs = Vec::new();
        for (job_id, handle) in self.running_handles.drain() {
            let behavior = {
                let state = self.shared_state.read().await;
                state
                    .jobs
                    .get(&job_id)
                    .map(|j| j.shutdown_behavior())
                    .unwrap_or_default()
            };
            wait_jobs.push((job_id, handle, behavior));
        }

        for (job_id, handle, behavior) in wait_jobs {
            if behavior == ShutdownBehavior::WaitForCompletion {
                info!("Waiting for job {} to complete...", job_id);
            }
            if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
                warn!("Job {} did not stop within {:?}", job_id, SHUTDOWN_GRACE);
            }
        }

        self.job_cancel_tokens.clear();
        info!("Scheduler shutdown complete");
    }
}

/// First grid slot after `started_at`, or `None` if it is not representable.
fn checked_next_slot(started_at: DateTime<Utc>, interval: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(interval)
        .ok()
        .and_then(|step| started_at.checked_add_signed(step))
}

/// Moves `next_run_at` forward in whole intervals until it is after `now`.
///
/// Grid slots that passed while the job was running are skipped, not
/// replayed.
fn advance_schedule(
    server_store: &dyn ServerStore,
    job_id: &str,
    interval: Duration,
    now: DateTime<Utc>,
) {
    let step = match chrono::Duration::from_std(interval) {
        Ok(step) if step > chrono::Duration::zero() => step,
        _ => {
            warn!("Interval of job {} is out of range, schedule not advanced", job_id);
            return;
        }
    };

    let stored = match server_store.get_schedule_state(job_id) {
        Ok(Some(state)) => Some(state.next_run_at),
        Ok(None) => now.checked_add_signed(step),
        Err(e) => {
            error!("Failed to read schedule state for {}: {}", job_id, e);
            now.checked_add_signed(step)
        }
    };
    let Some(mut next_run_at) = stored else {
        warn!("Next run of job {} is out of range, schedule not advanced", job_id);
        return;
    };

    let mut skipped = 0u32;
    while next_run_at <= now {
        match next_run_at.checked_add_signed(step) {
            Some(next) => next_run_at = next,
            None => {
                warn!("Next run of job {} is out of range, schedule not advanced", job_id);
                return;
            }
        }
        skipped += 1;
    }
    if skipped > 0 {
        info!(
            "Job {} overran its interval, skipped {} scheduled run(s)",
            job_id, skipped
        );
    }

    let state = JobScheduleState {
        job_id: job_id.to_string(),
        next_run_at,
        last_run_at: Some(now),
    };
    if let Err(e) = server_store.update_schedule_state(&state) {
        error!("Failed to update schedule state for {}: {}", job_id, e);
    }
}

/// Create a scheduler and its handle.
pub fn create_scheduler(
    server_store: Arc<dyn ServerStore>,
    shutdown_token: CancellationToken,
    job_context: JobContext,
) -> (JobScheduler, SchedulerHandle) {
    let (command_tx, command_rx) = mpsc::channel(100);
    let shared_state = Arc::new(RwLock::new(SharedJobState {
        jobs: HashMap::new(),
        running_jobs: HashSet::new(),
    }));

    let scheduler = JobScheduler::new(
        server_store.clone(),
        command_rx,
        shutdown_token,
        job_context,
        Arc::clone(&shared_state),
    );

    let handle = SchedulerHandle::new(command_tx, shared_state, server_store);

    (scheduler, handle)
}

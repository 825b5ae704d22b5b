//! Job audit logging utilities.

use crate::server_store::{JobAuditEventType, ServerStore};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// Records a job's lifecycle events in the audit log.
///
/// Audit failures are logged and otherwise ignored; they never fail the job.
pub struct JobAuditLogger {
    server_store: Arc<dyn ServerStore>,
    job_id: String,
    start_time: Instant,
}

impl JobAuditLogger {
    pub fn new(server_store: Arc<dyn ServerStore>, job_id: &str) -> Self {
        Self {
            server_store,
            job_id: job_id.to_string(),
            start_time: Instant::now(),
        }
    }

    fn log(
        &self,
        event_type: JobAuditEventType,
        duration_ms: Option<i64>,
        details: Option<&serde_json::Value>,
        error: Option<&str>,
    ) {
        if let Err(e) =
            self.server_store
                .log_job_audit(&self.job_id, event_type, duration_ms, details, error)
        {
            warn!("Failed to write audit entry for {}: {}", self.job_id, e);
        }
    }

    pub fn log_started(&self, details: Option<serde_json::Value>) {
        self.log(JobAuditEventType::Started, None, details.as_ref(), None);
    }

    pub fn log_completed(&self, details: Option<serde_json::Value>) {
        self.log(
            JobAuditEventType::Completed,
            Some(self.elapsed_ms()),
            details.as_ref(),
            None,
        );
    }

    pub fn log_failed(&self, error: &str, details: Option<serde_json::Value>) {
        self.log(
            JobAuditEventType::Failed,
            Some(self.elapsed_ms()),
            details.as_ref(),
            Some(error),
        );
    }

    pub fn log_progress(&self, details: serde_json::Value) {
        self.log(JobAuditEventType::Progress, None, Some(&details), None);
    }

    pub fn elapsed_ms(&self) -> i64 {
        self.start_time.elapsed().as_millis() as i64
    }
}

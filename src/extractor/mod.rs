//! Invocation of the external media metadata extractor.

mod ytdlp;

pub use ytdlp::YtDlpExtractor;

use crate::song_store::{MetricValue, SongMetrics};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while fetching metadata for a media item.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Failed to spawn extractor: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Extractor exited with {status}: {stderr}")]
    NonZeroExit { status: String, stderr: String },

    #[error("Malformed extractor output: {0}")]
    MalformedOutput(String),

    #[error("Extractor timed out after {0:?}")]
    Timeout(Duration),
}

impl ExtractionError {
    /// Short label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractionError::Spawn(_) => "spawn",
            ExtractionError::NonZeroExit { .. } => "non_zero_exit",
            ExtractionError::MalformedOutput(_) => "malformed_output",
            ExtractionError::Timeout(_) => "timeout",
        }
    }
}

/// Counters read from the extractor's metadata payload.
///
/// A field is `None` when it is absent, null, negative or not a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MediaMetadata {
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
}

impl MediaMetadata {
    /// Reads the counters from a JSON metadata object.
    ///
    /// Fails only if the payload is not an object; each counter is coerced
    /// on its own.
    pub fn from_json(payload: &Value) -> Result<Self, ExtractionError> {
        let object = payload.as_object().ok_or_else(|| {
            ExtractionError::MalformedOutput("expected a JSON object".to_string())
        })?;
        Ok(Self {
            view_count: object.get("view_count").and_then(coerce_count),
            like_count: object.get("like_count").and_then(coerce_count),
        })
    }

    pub fn into_metrics(self) -> SongMetrics {
        SongMetrics::new(
            self.view_count
                .map(MetricValue::Known)
                .unwrap_or(MetricValue::Unknown),
            self.like_count
                .map(MetricValue::Known)
                .unwrap_or(MetricValue::Unknown),
        )
    }
}

fn coerce_count(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    match value.as_f64() {
        Some(f) if f.is_finite() && f >= 0.0 => Some(f as u64),
        _ => None,
    }
}

#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    /// Fetches metadata (never media content) for one media item.
    async fn fetch_metadata(&self, media_id: &str) -> Result<MediaMetadata, ExtractionError>;
}

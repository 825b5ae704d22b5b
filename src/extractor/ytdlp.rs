use super::{ExtractionError, MediaMetadata, MetadataExtractor};
use crate::config::ExtractorSettings;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

const MAX_STDERR_CHARS: usize = 500;

/// Runs a yt-dlp compatible binary that prints one JSON metadata object.
///
/// The media URL is built from `url_template` and appended as the last
/// argument. The child is killed if the call times out or the future is
/// dropped.
pub struct YtDlpExtractor {
    binary: String,
    args: Vec<String>,
    url_template: String,
    timeout: Duration,
}

impl YtDlpExtractor {
    pub fn new(
        binary: impl Into<String>,
        args: Vec<String>,
        url_template: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            binary: binary.into(),
            args,
            url_template: url_template.into(),
            timeout,
        }
    }

    pub fn from_settings(settings: &ExtractorSettings) -> Self {
        Self::new(
            settings.binary.clone(),
            settings.args.clone(),
            settings.url_template.clone(),
            Duration::from_secs(settings.timeout_secs),
        )
    }

    pub fn media_url(&self, media_id: &str) -> String {
        self.url_template.replace("{id}", media_id)
    }

    async fn run(&self, url: &str) -> Result<MediaMetadata, ExtractionError> {
        let output = Command::new(&self.binary)
            .args(&self.args)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::NonZeroExit {
                status: output.status.to_string(),
                stderr: stderr.trim().chars().take(MAX_STDERR_CHARS).collect(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let payload: serde_json::Value = serde_json::from_str(stdout.trim())
            .map_err(|e| ExtractionError::MalformedOutput(format!("JSON parse error: {}", e)))?;
        MediaMetadata::from_json(&payload)
    }
}

#[async_trait]
impl MetadataExtractor for YtDlpExtractor {
    async fn fetch_metadata(&self, media_id: &str) -> Result<MediaMetadata, ExtractionError> {
        let url = self.media_url(media_id);
        debug!("Running {} for {}", self.binary, url);
        match tokio::time::timeout(self.timeout, self.run(&url)).await {
            Ok(result) => result,
            Err(_) => Err(ExtractionError::Timeout(self.timeout)),
        }
    }
}

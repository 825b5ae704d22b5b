use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub metrics_port: Option<u16>,

    // Feature configs
    pub stats_sync: Option<StatsSyncConfig>,
    pub extractor: Option<ExtractorConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct StatsSyncConfig {
    pub enabled: Option<bool>,
    pub interval_secs: Option<u64>,
    pub stale_after_secs: Option<u64>,
    pub cooldown_secs: Option<u64>,
    pub cache_ttl_secs: Option<u64>,
    pub cache_capacity: Option<usize>,
    pub run_on_startup: Option<bool>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ExtractorConfig {
    pub binary: Option<String>,
    pub args: Option<Vec<String>>,
    /// Media page URL; `{id}` is replaced with the song's media id.
    pub url_template: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

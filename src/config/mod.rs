mod file_config;

pub use file_config::{ExtractorConfig, FileConfig, StatsSyncConfig};

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound for every duration setting (ten years).
pub const MAX_DURATION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

fn check_duration(name: &str, secs: u64) -> Result<()> {
    if secs > MAX_DURATION_SECS {
        bail!(
            "{} must be at most {} seconds, got {}",
            name,
            MAX_DURATION_SECS,
            secs
        );
    }
    Ok(())
}

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub metrics_port: u16,
    pub extractor_binary: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    /// 0 disables the observer HTTP server.
    pub metrics_port: u16,

    pub stats_sync: StatsSyncSettings,
    pub extractor: ExtractorSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let stats_sync = StatsSyncSettings::from_file(file.stats_sync.unwrap_or_default());

        let mut extractor_file = file.extractor.unwrap_or_default();
        extractor_file.binary = extractor_file
            .binary
            .or_else(|| cli.extractor_binary.clone());
        let extractor = ExtractorSettings::from_file(extractor_file);

        stats_sync.validate()?;
        extractor.validate()?;

        Ok(Self {
            db_dir,
            metrics_port,
            stats_sync,
            extractor,
        })
    }

    pub fn songs_db_path(&self) -> PathBuf {
        self.db_dir.join("songs.db")
    }

    pub fn server_db_path(&self) -> PathBuf {
        self.db_dir.join("server.db")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatsSyncSettings {
    pub enabled: bool,
    pub interval_secs: u64,
    /// Songs not updated for this long are picked up by the next tick.
    pub stale_after_secs: u64,
    /// Pause between two consecutive extractor calls; 0 disables pacing.
    pub cooldown_secs: u64,
    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,
    pub run_on_startup: bool,
}

impl Default for StatsSyncSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
            stale_after_secs: 600,
            cooldown_secs: 30,
            cache_ttl_secs: 60,
            cache_capacity: 1000,
            run_on_startup: false,
        }
    }
}

impl StatsSyncSettings {
    fn from_file(file: StatsSyncConfig) -> Self {
        let defaults = Self::default();
        Self {
            enabled: file.enabled.unwrap_or(defaults.enabled),
            interval_secs: file.interval_secs.unwrap_or(defaults.interval_secs),
            stale_after_secs: file.stale_after_secs.unwrap_or(defaults.stale_after_secs),
            cooldown_secs: file.cooldown_secs.unwrap_or(defaults.cooldown_secs),
            cache_ttl_secs: file.cache_ttl_secs.unwrap_or(defaults.cache_ttl_secs),
            cache_capacity: file.cache_capacity.unwrap_or(defaults.cache_capacity),
            run_on_startup: file.run_on_startup.unwrap_or(defaults.run_on_startup),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            bail!("stats_sync.interval_secs must be greater than 0");
        }
        if self.stale_after_secs == 0 {
            bail!("stats_sync.stale_after_secs must be greater than 0");
        }
        if self.cache_ttl_secs == 0 {
            bail!("stats_sync.cache_ttl_secs must be greater than 0");
        }
        if self.cache_capacity == 0 {
            bail!("stats_sync.cache_capacity must be greater than 0");
        }
        check_duration("stats_sync.interval_secs", self.interval_secs)?;
        check_duration("stats_sync.stale_after_secs", self.stale_after_secs)?;
        check_duration("stats_sync.cooldown_secs", self.cooldown_secs)?;
        check_duration("stats_sync.cache_ttl_secs", self.cache_ttl_secs)?;
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorSettings {
    pub binary: String,
    pub args: Vec<String>,
    pub url_template: String,
    pub timeout_secs: u64,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            args: [
                "--dump-json",
                "--skip-download",
                "--no-warnings",
                "--no-playlist",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            url_template: "https://www.youtube.com/watch?v={id}".to_string(),
            timeout_secs: 120,
        }
    }
}

impl ExtractorSettings {
    fn from_file(file: ExtractorConfig) -> Self {
        let defaults = Self::default();
        Self {
            binary: file.binary.unwrap_or(defaults.binary),
            args: file.args.unwrap_or(defaults.args),
            url_template: file.url_template.unwrap_or(defaults.url_template),
            timeout_secs: file.timeout_secs.unwrap_or(defaults.timeout_secs),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.binary.trim().is_empty() {
            bail!("extractor.binary cannot be empty");
        }
        if !self.url_template.contains("{id}") {
            bail!(
                "extractor.url_template must contain {{id}}, got {:?}",
                self.url_template
            );
        }
        if self.timeout_secs == 0 {
            bail!("extractor.timeout_secs must be greater than 0");
        }
        check_duration("extractor.timeout_secs", self.timeout_secs)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_temp_db_dir() -> TempDir {
        TempDir::new().unwrap()
    }

    fn cli_with_db_dir(temp_dir: &TempDir) -> CliConfig {
        CliConfig {
            db_dir: Some(temp_dir.path().to_path_buf()),
            metrics_port: 9092,
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_cli_only_uses_defaults() {
        let temp_dir = make_temp_db_dir();
        let config = AppConfig::resolve(&cli_with_db_dir(&temp_dir), None).unwrap();

        assert_eq!(config.db_dir, temp_dir.path());
        assert_eq!(config.metrics_port, 9092);
        assert_eq!(config.stats_sync, StatsSyncSettings::default());
        assert_eq!(config.extractor, ExtractorSettings::default());
        assert_eq!(config.stats_sync.stale_after(), Duration::from_secs(600));
        assert_eq!(config.stats_sync.cooldown(), Duration::from_secs(30));
        assert_eq!(config.stats_sync.cache_ttl(), Duration::from_secs(60));
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            db_dir: Some(PathBuf::from("/should/be/overridden")),
            metrics_port: 9092,
            ..Default::default()
        };
        let file_config = FileConfig {
            db_dir: Some(temp_dir.path().to_string_lossy().to_string()),
            metrics_port: Some(0),
            stats_sync: Some(StatsSyncConfig {
                interval_secs: Some(300),
                cooldown_secs: Some(0),
                ..Default::default()
            }),
            extractor: None,
        };

        let config = AppConfig::resolve(&cli, Some(file_config)).unwrap();
        assert_eq!(config.db_dir, temp_dir.path());
        assert_eq!(config.metrics_port, 0);
        assert_eq!(config.stats_sync.interval_secs, 300);
        assert_eq!(config.stats_sync.cooldown_secs, 0);
        // Untouched fields keep their defaults.
        assert_eq!(config.stats_sync.stale_after_secs, 600);
    }

    #[test]
    fn test_cli_extractor_binary_used_unless_file_sets_one() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            extractor_binary: Some("/opt/yt-dlp".to_string()),
            ..cli_with_db_dir(&temp_dir)
        };

        let config = AppConfig::resolve(&cli, None).unwrap();
        assert_eq!(config.extractor.binary, "/opt/yt-dlp");

        let file_config = FileConfig {
            extractor: Some(ExtractorConfig {
                binary: Some("/usr/bin/yt-dlp".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let config = AppConfig::resolve(&cli, Some(file_config)).unwrap();
        assert_eq!(config.extractor.binary, "/usr/bin/yt-dlp");
    }

    #[test]
    fn test_resolve_missing_db_dir_error() {
        let result = AppConfig::resolve(&CliConfig::default(), None);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("db_dir must be specified"));
    }

    #[test]
    fn test_resolve_nonexistent_db_dir_error() {
        let cli = CliConfig {
            db_dir: Some(PathBuf::from("/nonexistent/path/that/should/not/exist")),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[test]
    fn test_resolve_db_dir_not_directory_error() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let cli = CliConfig {
            db_dir: Some(temp_file.path().to_path_buf()),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.unwrap_err().to_string().contains("not a directory"));
    }

    #[test]
    fn test_resolve_rejects_zero_interval() {
        let temp_dir = make_temp_db_dir();
        let file_config = FileConfig {
            stats_sync: Some(StatsSyncConfig {
                interval_secs: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = AppConfig::resolve(&cli_with_db_dir(&temp_dir), Some(file_config)).unwrap_err();
        assert!(err.to_string().contains("interval_secs"));
    }

    #[test]
    fn test_resolve_rejects_oversized_durations() {
        let temp_dir = make_temp_db_dir();
        let cases = [
            (
                "stats_sync.stale_after_secs",
                StatsSyncConfig {
                    stale_after_secs: Some(10_000_000_000_000),
                    ..Default::default()
                },
            ),
            (
                "stats_sync.stale_after_secs",
                StatsSyncConfig {
                    stale_after_secs: Some(u64::MAX),
                    ..Default::default()
                },
            ),
            (
                "stats_sync.cache_ttl_secs",
                StatsSyncConfig {
                    cache_ttl_secs: Some(u64::MAX),
                    ..Default::default()
                },
            ),
            (
                "stats_sync.interval_secs",
                StatsSyncConfig {
                    interval_secs: Some(u64::MAX),
                    ..Default::default()
                },
            ),
            (
                "stats_sync.cooldown_secs",
                StatsSyncConfig {
                    cooldown_secs: Some(MAX_DURATION_SECS + 1),
                    ..Default::default()
                },
            ),
        ];
        for (field, stats_sync) in cases {
            let file_config = FileConfig {
                stats_sync: Some(stats_sync),
                ..Default::default()
            };
            let err =
                AppConfig::resolve(&cli_with_db_dir(&temp_dir), Some(file_config)).unwrap_err();
            assert!(err.to_string().contains(field), "unexpected error: {}", err);
        }

        let file_config = FileConfig {
            extractor: Some(ExtractorConfig {
                timeout_secs: Some(u64::MAX),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = AppConfig::resolve(&cli_with_db_dir(&temp_dir), Some(file_config)).unwrap_err();
        assert!(err.to_string().contains("extractor.timeout_secs"));
    }

    #[test]
    fn test_resolve_accepts_maximum_duration() {
        let temp_dir = make_temp_db_dir();
        let file_config = FileConfig {
            stats_sync: Some(StatsSyncConfig {
                interval_secs: Some(MAX_DURATION_SECS),
                stale_after_secs: Some(MAX_DURATION_SECS),
                cache_ttl_secs: Some(MAX_DURATION_SECS),
                ..Default::default()
            }),
            ..Default::default()
        };
        let config = AppConfig::resolve(&cli_with_db_dir(&temp_dir), Some(file_config)).unwrap();
        assert_eq!(config.stats_sync.interval_secs, MAX_DURATION_SECS);
    }

    #[test]
    fn test_resolve_rejects_url_template_without_placeholder() {
        let temp_dir = make_temp_db_dir();
        let file_config = FileConfig {
            extractor: Some(ExtractorConfig {
                url_template: Some("https://example.com/watch".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = AppConfig::resolve(&cli_with_db_dir(&temp_dir), Some(file_config)).unwrap_err();
        assert!(err.to_string().contains("{id}"));
    }

    #[test]
    fn test_db_path_helpers() {
        let temp_dir = make_temp_db_dir();
        let config = AppConfig::resolve(&cli_with_db_dir(&temp_dir), None).unwrap();
        assert_eq!(config.songs_db_path(), temp_dir.path().join("songs.db"));
        assert_eq!(config.server_db_path(), temp_dir.path().join("server.db"));
    }
}

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use song_stats_server::background_jobs::jobs::StatsSyncJob;
use song_stats_server::background_jobs::{create_scheduler, JobContext};
use song_stats_server::config::{AppConfig, CliConfig, FileConfig};
use song_stats_server::extractor::YtDlpExtractor;
use song_stats_server::server::{metrics, run_observer_server, ObserverState};
use song_stats_server::{InMemoryStatsCache, SqliteServerStore, SqliteSongStore};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

fn parse_dir(s: &str) -> Result<PathBuf, String> {
    let path = parse_path(s)?;
    if !path.exists() {
        return Err(format!("Directory does not exist: {}", s));
    }
    if !path.is_dir() {
        return Err(format!("Path is not a directory: {}", s));
    }
    Ok(path)
}

#[derive(Parser, Debug)]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"))]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory containing database files (songs.db, server.db).
    /// Can also be specified in config file.
    #[clap(long, value_parser = parse_dir)]
    pub db_dir: Option<PathBuf>,

    /// The port for the observer server (metrics, jobs, stats). 0 disables it.
    #[clap(long, default_value_t = 9092)]
    pub metrics_port: u16,

    /// Metadata extractor executable.
    #[clap(long)]
    pub extractor_binary: Option<String>,

    /// Run a single synchronization pass and exit.
    #[clap(long)]
    pub once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let cli_config = CliConfig {
        db_dir: cli_args.db_dir.clone(),
        metrics_port: cli_args.metrics_port,
        extractor_binary: cli_args.extractor_binary.clone(),
    };
    let app_config = AppConfig::resolve(&cli_config, file_config)?;

    info!(
        "Song stats server {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH")
    );

    info!("Initializing metrics...");
    metrics::init_metrics();

    info!("Opening songs database at {:?}...", app_config.songs_db_path());
    let song_store = Arc::new(
        SqliteSongStore::new(app_config.songs_db_path()).context("Failed to open songs database")?,
    );
    let server_store = Arc::new(
        SqliteServerStore::new(app_config.server_db_path())
            .context("Failed to open server database")?,
    );
    let stats_cache = Arc::new(InMemoryStatsCache::new(
        app_config.stats_sync.cache_capacity,
    ));

    let extractor = Arc::new(YtDlpExtractor::from_settings(&app_config.extractor));
    info!(
        "Using extractor '{}' with a {}s timeout",
        app_config.extractor.binary, app_config.extractor.timeout_secs
    );
    let stats_sync_job = StatsSyncJob::new(extractor, &app_config.stats_sync);

    let shutdown_token = CancellationToken::new();
    let job_context = JobContext::new(
        shutdown_token.child_token(),
        song_store.clone(),
        stats_cache.clone(),
        server_store.clone(),
    );

    let ctrl_c_token = shutdown_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown"),
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
        ctrl_c_token.cancel();
    });

    if cli_args.once {
        info!("Running a single stats sync pass");
        if let Some(summary) = stats_sync_job.run_single_pass(&job_context).await? {
            info!(
                "Pass complete: {} selected, {} updated, {} unknown, {} storage failures, {} missing",
                summary.selected,
                summary.updated,
                summary.unknown,
                summary.storage_failed,
                summary.missing
            );
        }
        return Ok(());
    }

    let (mut scheduler, scheduler_handle) =
        create_scheduler(server_store.clone(), shutdown_token.clone(), job_context);

    if app_config.stats_sync.enabled {
        info!(
            "Stats sync every {}s, stale after {}s, cooldown {}s",
            app_config.stats_sync.interval_secs,
            app_config.stats_sync.stale_after_secs,
            app_config.stats_sync.cooldown_secs
        );
        scheduler.register_job(Arc::new(stats_sync_job)).await;
    } else {
        warn!("Stats sync is disabled in the configuration");
    }

    let observer = if app_config.metrics_port > 0 {
        let state = ObserverState {
            scheduler_handle,
            song_store,
            stats_cache,
        };
        let port = app_config.metrics_port;
        let token = shutdown_token.clone();
        info!("Observer endpoints available at port {}!", port);
        Some(tokio::spawn(async move {
            if let Err(e) = run_observer_server(port, state, token.clone()).await {
                error!("Observer server stopped: {:#}", e);
                token.cancel();
            }
        }))
    } else {
        None
    };

    scheduler.run().await;

    if let Some(observer) = observer {
        let _ = observer.await;
    }

    info!("Shutdown complete");
    Ok(())
}

use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use network_monitoring::{
    config::{Config, read_config_file},
    engine::Engine,
    storage::{ExportScope, MetricStore, open_backend},
    util::{apply_env_overrides, get_log_level},
};
use tracing::{Level, error, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(about = "Network monitoring and alerting engine")]
struct Args {
    /// Log level (overrides MONITOR_LOG_LEVEL)
    #[arg(long, global = true)]
    log_level: Option<Level>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run the collectors until interrupted
    Run {
        /// Config file
        #[arg(short)]
        file: PathBuf,
    },

    /// Write a snapshot of the stored records to a JSON file
    Export {
        /// Config file
        #[arg(short)]
        file: PathBuf,

        /// Output file
        #[arg(short)]
        output: PathBuf,

        /// Export the last N hours
        #[arg(long, default_value_t = 24)]
        hours: i64,

        /// all, network, system, device or alerts
        #[arg(long, default_value_t = ExportScope::All)]
        scope: ExportScope,
    },
}

fn init(level: Level) {
    let level = LevelFilter::from_level(level);
    let filter = filter::Targets::new().with_targets(vec![
        ("network_monitoring", level),
        ("netmon", level),
        ("tower_http", level),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

fn load_config(path: &PathBuf) -> anyhow::Result<Config> {
    let mut config = read_config_file(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    apply_env_overrides(&mut config);
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init(args.log_level.unwrap_or_else(get_log_level));
    trace!("started with args: {args:?}");

    match args.command {
        Command::Run { file } => run(load_config(&file)?).await,
        Command::Export {
            file,
            output,
            hours,
            scope,
        } => export(load_config(&file)?, output, hours, scope).await,
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let engine = Engine::start(&config).await?;
    info!(
        "monitoring {} device(s) with {} collector(s)",
        config.devices.len(),
        engine.collectors().len()
    );

    #[cfg(feature = "api")]
    if let Some(api) = config.api.clone() {
        let state = network_monitoring::api::ApiState::from_engine(&engine);
        if let Err(e) = network_monitoring::api::spawn_api_server(api, state).await {
            error!("failed to start API server: {e:#}");
        }
    }

    #[cfg(not(feature = "api"))]
    if config.api.is_some() {
        warn!("API configured but this build has no API support");
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
    }
    info!("shutdown requested");

    engine.shutdown().await
}

async fn export(
    config: Config,
    output: PathBuf,
    hours: i64,
    scope: ExportScope,
) -> anyhow::Result<()> {
    let (since, until) = export_range(hours, Utc::now())?;

    let backend = open_backend(&config.storage).await?;
    if !backend.is_persistent() {
        warn!("storage backend '{}' keeps no records on disk", backend.name());
    }

    let (store, _) = MetricStore::load(backend.as_ref(), config.storage.max_records).await?;
    backend.close().await?;

    let snapshot = store.snapshot(scope, since, until);
    snapshot
        .write_to(&output)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;

    info!(
        "exported {} record(s) ({scope}) to {}",
        snapshot.record_count(),
        output.display()
    );
    Ok(())
}

/// Window of the last `hours` hours ending at `until`.
fn export_range(
    hours: i64,
    until: DateTime<Utc>,
) -> anyhow::Result<(DateTime<Utc>, DateTime<Utc>)> {
    if hours <= 0 {
        anyhow::bail!("--hours must be positive, got {hours}");
    }
    let Some(window) = Duration::try_hours(hours) else {
        anyhow::bail!("--hours {hours} is out of range");
    };
    let Some(since) = until.checked_sub_signed(window) else {
        anyhow::bail!("--hours {hours} reaches before the earliest representable time");
    };
    Ok((since, until))
}

//! CLI entry point for the GTFS-RT denormalizer.
//!
//! `run` polls a realtime feed on a fixed period and appends flattened records
//! to a JSON-lines sink. `denormalize` does the same once for a file or URL.

use std::ffi::OsStr;
use std::path::Path;

use anyhow::{Context, Result};
use bytes::Bytes;
use chrono::Utc;
use clap::{Parser, Subcommand};
use gtfs_rt_denorm::config::{PipelineConfig, PollConfig};
use gtfs_rt_denorm::denormalize::TransformContext;
use gtfs_rt_denorm::error::UpstreamError;
use gtfs_rt_denorm::fetch::{BasicClient, FeedFetcher, fetch_bytes};
use gtfs_rt_denorm::pipeline::{Pipeline, process_bytes};
use gtfs_rt_denorm::scheduler;
use gtfs_rt_denorm::sink::JsonLinesSink;
use gtfs_rt_denorm::stops::StopIndex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "gtfs_rt_denorm")]
#[command(about = "Denormalize GTFS-realtime feeds into flat JSON records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll a GTFS-RT feed and publish denormalized records until Ctrl+C
    Run(PollConfig),
    /// Denormalize a single GTFS-RT payload from a file or URL
    Denormalize {
        /// Path to file or URL to fetch
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        #[command(flatten)]
        pipeline: PipelineConfig,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/gtfs_rt_denorm.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("gtfs_rt_denorm.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(config) => run(config).await?,
        Commands::Denormalize { source, pipeline } => denormalize(&source, pipeline).await?,
    }

    Ok(())
}

/// Loads the stop table, then polls until Ctrl+C.
#[tracing::instrument(skip_all, fields(url = %config.url))]
async fn run(config: PollConfig) -> Result<()> {
    let stops = StopIndex::load(&config.pipeline.stops).context("loading stop table")?;

    let client = BasicClient::with_timeout(config.pipeline.timeout)?;
    let fetcher = FeedFetcher::new(client, config.url.clone());
    let sink = JsonLinesSink::new(config.pipeline.output.clone());
    let pipeline = Pipeline::new(fetcher, stops, sink).with_timezone(config.pipeline.timezone);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl+C received, stopping after the current cycle"),
            Err(e) => warn!(error = %e, "Cannot listen for Ctrl+C, stopping"),
        }
        on_signal.cancel();
    });

    scheduler::run(pipeline, config.period, config.overlap, cancel).await;
    Ok(())
}

/// Denormalizes one payload and exits.
#[tracing::instrument(skip(config))]
async fn denormalize(source: &str, config: PipelineConfig) -> Result<()> {
    let stops = StopIndex::load(&config.stops).context("loading stop table")?;

    let bytes = fetcher(source, &config).await?;
    let ctx = TransformContext::new(&stops, Utc::now()).with_timezone(config.timezone);
    let sink = JsonLinesSink::new(config.output.clone());

    let summary = process_bytes(&bytes, &ctx, &sink).await?;
    info!(
        entities = summary.entities,
        records = summary.records,
        skipped = summary.skipped,
        "Feed denormalized"
    );
    Ok(())
}

/// Loads feed data from a local file path or fetches it over HTTP.
async fn fetcher(source: &str, config: &PipelineConfig) -> Result<Bytes> {
    let bytes = if source.starts_with("http") {
        let client = BasicClient::with_timeout(config.timeout)?;
        fetch_bytes(&client, source.parse()?).await?
    } else {
        tokio::fs::read(source)
            .await
            .map(Bytes::from)
            .map_err(|e| UpstreamError::Read {
                path: source.into(),
                source: e,
            })?
    };
    Ok(bytes)
}

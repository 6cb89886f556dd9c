//! CLI entry point for the bus telemetry ingest pipeline.
//!
//! Provides subcommands for listing the route directory, running a single
//! tick, and running ticks on a fixed interval.

mod infra;

use crate::infra::s3::S3DocumentStore;
use anyhow::{Context, Result};
use bus_ingest::{
    config::Config,
    directory::fetch_route_directory,
    fetch::BasicClient,
    model::TickReport,
    output::{append_record, print_json, print_pretty},
    pipeline::run_tick,
    store::{DirStore, DocumentStore, MemoryStore},
};
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::ffi::OsStr;
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "bus_ingest")]
#[command(about = "Polls live bus telemetry and upserts it into a document store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the route directory and list every route
    Routes,
    /// Run one tick: fetch routes, extract telemetry, upsert records
    Tick {
        #[command(flatten)]
        sink: SinkArgs,
    },
    /// Run a tick every interval until stopped
    Run {
        /// Seconds between ticks
        #[arg(short, long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
        interval: u64,

        /// Number of ticks to run (0 = infinite)
        #[arg(short = 'n', long, default_value_t = 0)]
        num_ticks: usize,

        #[command(flatten)]
        sink: SinkArgs,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StoreKind {
    /// Keep documents in memory for the life of the process (dry run)
    Memory,
    /// One JSON file per document under --data-dir
    Dir,
    /// One JSON object per document in --s3-bucket
    S3,
}

#[derive(Args)]
struct SinkArgs {
    /// Where upserted documents go
    #[arg(long, value_enum, default_value_t = StoreKind::Dir)]
    store: StoreKind,

    /// Root directory for the `dir` store
    #[arg(long, default_value = "data")]
    data_dir: String,

    /// S3 bucket for the `s3` store (e.g., "my-bucket")
    #[arg(long)]
    s3_bucket: Option<String>,

    /// Key prefix inside the S3 bucket
    #[arg(long, default_value = "")]
    s3_prefix: String,

    /// Optional: CSV file to append one row per tick to
    #[arg(long)]
    report: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/bus_ingest.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("bus_ingest.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let client = BasicClient::new(config.request_timeout, config.connect_timeout)
        .context("failed to build HTTP client")?;

    match cli.command {
        Commands::Routes => {
            let directory = fetch_route_directory(&client, &config.base_data_url).await?;

            for key in directory.payload.keys() {
                let meta = &directory.routes[key];
                info!(
                    route_key = %meta.route_key,
                    symbol = meta.route_symbol.as_deref().unwrap_or("-"),
                    name = meta.route_name.as_deref().unwrap_or("-"),
                    "Route"
                );
            }
            info!(total = directory.payload.len(), "Route directory summary");
        }
        Commands::Tick { sink } => {
            let store = open_store(&sink, &config).await?;
            let report = run_tick(&client, store.as_ref(), &config, Utc::now()).await?;
            record_tick(&report, sink.report.as_deref())?;
        }
        Commands::Run {
            interval,
            num_ticks,
            sink,
        } => {
            let store = open_store(&sink, &config).await?;
            run_every(&client, store.as_ref(), &config, interval, num_ticks, &sink).await?;
        }
    }

    Ok(())
}

/// Builds the document store selected on the command line.
async fn open_store(args: &SinkArgs, config: &Config) -> Result<Box<dyn DocumentStore>> {
    let store: Box<dyn DocumentStore> = match args.store {
        StoreKind::Memory => {
            info!("Using in-memory store; documents are discarded on exit");
            Box::new(MemoryStore::new())
        }
        StoreKind::Dir => {
            info!(data_dir = %args.data_dir, database = %config.database, "Using directory store");
            Box::new(DirStore::new(&args.data_dir, &config.database))
        }
        StoreKind::S3 => {
            let bucket = args
                .s3_bucket
                .as_deref()
                .context("--s3-bucket is required with --store s3")?;
            let aws = aws_config::load_from_env().await;
            info!(bucket, prefix = %args.s3_prefix, database = %config.database, "Using S3 store");
            Box::new(S3DocumentStore::new(
                &aws,
                bucket,
                &args.s3_prefix,
                &config.database,
            ))
        }
    };
    Ok(store)
}

/// Runs ticks on interval boundaries. A failed tick is logged and the loop
/// moves on to the next interval; there is no retry within a tick.
#[tracing::instrument(skip(client, store, config, sink))]
async fn run_every(
    client: &BasicClient,
    store: &dyn DocumentStore,
    config: &Config,
    interval: u64,
    num_ticks: usize,
    sink: &SinkArgs,
) -> Result<()> {
    let step = TimeDelta::seconds(i64::try_from(interval).context("interval too large")?);

    if num_ticks == 0 {
        info!(interval, "Ticking indefinitely. Press Ctrl+C to stop.");
    } else {
        info!(num_ticks, interval, "Starting ticks");
    }

    let mut tick_count = 0;
    loop {
        if num_ticks > 0 && tick_count >= num_ticks {
            break;
        }
        tick_count += 1;

        let tick_time = tick_start(Utc::now(), step);
        match run_tick(client, store, config, tick_time).await {
            Ok(report) => {
                if let Err(e) = record_tick(&report, sink.report.as_deref()) {
                    error!(error = %e, "Failed to record tick report");
                }
            }
            Err(e) => {
                error!(error = %e, code = e.code(), tick = %tick_time, "Tick failed");
            }
        }

        if num_ticks == 0 || tick_count < num_ticks {
            let wait = (tick_time + step - Utc::now())
                .to_std()
                .unwrap_or_default();
            info!(wait_secs = wait.as_secs(), "Waiting for next tick");
            tokio::time::sleep(wait).await;
        }
    }

    info!(tick_count, "Finished ticking");
    Ok(())
}

/// The logical time of the tick containing `now`: the start of its interval.
fn tick_start(now: DateTime<Utc>, step: TimeDelta) -> DateTime<Utc> {
    now.duration_trunc(step).unwrap_or(now)
}

fn record_tick(report: &TickReport, csv_path: Option<&str>) -> Result<()> {
    print_pretty(report);
    print_json(report)?;
    if let Some(path) = csv_path {
        append_record(path, report)?;
    }
    Ok(())
}

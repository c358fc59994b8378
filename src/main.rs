//! OpenSky aircraft watcher CLI
//!
//! Polls an area for aircraft, enriches each with its latest flight and
//! prints or collects the results.

use clap::{Parser, ValueEnum};
use flightwatch::{
    area::{AreaResolver, AreaSelector, StaticCountryBounds},
    client::{ClientConfig, Credentials, OpenSkyClient},
    record::{CollectingSink, ConsoleSink, RecordSink, TeeSink},
    retry::RetryPolicy,
    scheduler::{PollScheduler, SchedulerConfig},
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputMode {
    /// Print each record as it arrives
    Terminal,
    /// Print all records as a JSON array at the end
    Collect,
    /// Both of the above
    Both,
}

#[derive(Parser)]
#[command(name = "flightwatch")]
#[command(about = "Aircraft in your bounding box from the OpenSky API", long_about = None)]
struct Cli {
    /// Named area: Barrington, Nayatt, RI, NY
    #[arg(long, conflicts_with_all = ["bbox", "iso"])]
    area: Option<String>,

    /// Explicit bounding box
    #[arg(
        long,
        num_args = 4,
        value_names = ["LAMIN", "LOMIN", "LAMAX", "LOMAX"],
        allow_negative_numbers = true,
        conflicts_with = "iso"
    )]
    bbox: Option<Vec<f64>>,

    /// ISO-3166 country code, resolved with --country-bounds
    #[arg(long)]
    iso: Option<String>,

    /// JSON file mapping ISO codes to [lon_min, lat_min, lon_max, lat_max] subunit boxes
    #[arg(long, requires = "iso")]
    country_bounds: Option<PathBuf>,

    /// Which subunit box of the country to watch
    #[arg(long, default_value = "0")]
    subunit: usize,

    /// OpenSky username
    #[arg(long, env = "OPENSKY_USERNAME")]
    username: String,

    /// OpenSky password
    #[arg(long, env = "OPENSKY_PASSWORD", hide_env_values = true)]
    password: String,

    /// Number of poll iterations
    #[arg(long, default_value = "1000")]
    limit: u32,

    /// Pause between polls in seconds
    #[arg(short, long, default_value = "5")]
    interval: u64,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// History lookups in flight at once
    #[arg(long, default_value = "4")]
    concurrency: usize,

    /// Retries for a failed request
    #[arg(long, default_value = "3")]
    retries: u32,

    #[arg(short, long, value_enum, default_value = "collect")]
    output: OutputMode,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let bounds = cli
        .bbox
        .as_deref()
        .map(<[f64; 4]>::try_from)
        .transpose()?;
    let selector = AreaSelector::from_parts(cli.area.as_deref(), bounds, cli.iso.as_deref())?;

    let lookup = match &cli.country_bounds {
        Some(path) => StaticCountryBounds::load(path)?,
        None => StaticCountryBounds::new(),
    };
    let bbox = AreaResolver::new(lookup)
        .with_subunit_index(cli.subunit)
        .resolve(&selector)?;

    tracing::info!("Watching {:?} as {}", selector, bbox);

    let client_config = ClientConfig::new(Credentials::new(cli.username, cli.password))
        .with_timeout(Duration::from_secs(cli.timeout));
    let client = Arc::new(OpenSkyClient::new(client_config)?);

    let collected = Arc::new(CollectingSink::new());
    let sink: Arc<dyn RecordSink> = match cli.output {
        OutputMode::Terminal => Arc::new(ConsoleSink::stdout()),
        OutputMode::Collect => collected.clone(),
        OutputMode::Both => Arc::new(TeeSink::new(ConsoleSink::stdout(), Arc::clone(&collected))),
    };

    let scheduler_config = SchedulerConfig::default()
        .with_limit(cli.limit)
        .with_poll_interval(Duration::from_secs(cli.interval))
        .with_history_concurrency(cli.concurrency)
        .with_retry(RetryPolicy {
            max_retries: cli.retries,
            ..RetryPolicy::default()
        });

    let scheduler = PollScheduler::new(Arc::clone(&client), client, bbox, sink)
        .with_config(scheduler_config);
    let stats = scheduler.stats();

    // Handle Ctrl+C
    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, shutting down...");
                cancel.cancel();
            }
        })
    };

    let report = scheduler.run(&cancel).await;
    ctrl_c.abort();

    let final_stats = stats.snapshot();
    tracing::info!("Final statistics:");
    tracing::info!("  Iterations: {} ({:?})", report.iterations, report.stop_reason);
    tracing::info!("  Failed polls: {}", final_stats.failed_polls);
    tracing::info!("  Aircraft seen: {}", final_stats.aircraft_seen);
    tracing::info!(
        "  History found/missing: {}/{}",
        final_stats.history_hits,
        final_stats.history_misses
    );
    tracing::info!("  Records emitted: {}", report.records_emitted);

    if cli.output != OutputMode::Terminal {
        println!("Returning array of flights found...");
        println!("{}", serde_json::to_string_pretty(&collected.drain())?);
        println!("Done!");
    }

    Ok(())
}

//! CLI entry point for the subway snapshot service.
//!
//! `serve` keeps the snapshot fresh and answers HTTP queries; `query` loads
//! one snapshot and prints the matching stops.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use subway_snapshot::catalog::{CatalogSource, GtfsArchive, GtfsDirectory};
use subway_snapshot::client::{Client, LocalClient};
use subway_snapshot::config::EngineConfig;
use subway_snapshot::fetch::BasicClient;
use subway_snapshot::models::{Arrival, Coordinate, Stop};
use subway_snapshot::web::{AppState, create_router};
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "subway_snapshot")]
#[command(about = "Live NYC subway arrivals merged from GTFS and GTFS-RT", long_about = None)]
struct Cli {
    #[command(flatten)]
    engine: EngineArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct EngineArgs {
    /// API key sent to the real-time feed endpoints
    #[arg(long, env = "MTA_API_KEY", default_value = "", hide_env_values = true, global = true)]
    api_key: String,

    /// Seconds between real-time merges
    #[arg(long, default_value_t = 60, global = true)]
    update_interval_secs: u64,

    /// Seconds between static GTFS reloads (0 = load once)
    #[arg(long, default_value_t = 6 * 60 * 60, global = true)]
    static_interval_secs: u64,

    /// Timeout for each network request
    #[arg(long, default_value_t = 30, global = true)]
    fetch_timeout_secs: u64,

    /// Read static GTFS from an extracted directory instead of downloading it
    #[arg(long, value_name = "DIR", global = true)]
    gtfs_dir: Option<PathBuf>,
}

impl EngineArgs {
    fn config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_api_key(self.api_key.clone())
            .with_realtime_interval(Duration::from_secs(self.update_interval_secs))
            .with_static_interval(Duration::from_secs(self.static_interval_secs))
            .with_fetch_timeout(Duration::from_secs(self.fetch_timeout_secs))
    }

    fn catalog(&self, config: &EngineConfig) -> Result<Arc<dyn CatalogSource>> {
        Ok(match &self.gtfs_dir {
            Some(dir) => Arc::new(GtfsDirectory::new(dir)),
            None => Arc::new(GtfsArchive::new(Arc::new(BasicClient::new(
                config.fetch_timeout,
            )?))),
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the merge engine and serve the HTTP API
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "PORT", default_value_t = 8080)]
        port: u16,
    },
    /// Load one snapshot and print stops near a point or along a route
    Query {
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,

        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,

        #[arg(long, conflicts_with_all = ["lat", "lon"])]
        route: Option<String>,

        /// Number of stops to print for a location query
        #[arg(short = 'n', long, default_value_t = 5)]
        limit: usize,

        /// Seconds to wait for the first merge
        #[arg(long, default_value_t = 120)]
        wait_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/subway_snapshot.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("subway_snapshot.log"));

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
    let config = cli.engine.config();
    let catalog = cli.engine.catalog(&config)?;

    match cli.command {
        Commands::Serve { port } => serve(config, catalog, port).await?,
        Commands::Query {
            lat,
            lon,
            route,
            limit,
            wait_secs,
        } => {
            let target = match (lat, lon, route) {
                (Some(lat), Some(lon), _) => Target::Location(Coordinate::new(lat, lon), limit),
                (_, _, Some(route)) => Target::Route(route),
                _ => bail!("pass --lat and --lon, or --route"),
            };
            query(config, catalog, target, Duration::from_secs(wait_secs)).await?;
        }
    }

    Ok(())
}

/// Serves the HTTP API until Ctrl-C, then stops the engine.
#[tracing::instrument(skip(config, catalog), fields(source = %catalog.describe()))]
async fn serve(config: EngineConfig, catalog: Arc<dyn CatalogSource>, port: u16) -> Result<()> {
    let client = LocalClient::start(config, catalog)?;
    let app = create_router(AppState::new(client.store()));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, shutting down merge engine");
    client.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
    }
}

enum Target {
    Location(Coordinate, usize),
    Route(String),
}

async fn query(
    config: EngineConfig,
    catalog: Arc<dyn CatalogSource>,
    target: Target,
    wait: Duration,
) -> Result<()> {
    let client = LocalClient::start(config, catalog)?;
    if !client.wait_for_first_cycle(wait).await {
        warn!(wait_secs = wait.as_secs(), "No static data loaded yet");
    }

    let stops = match target {
        Target::Location(location, limit) => client.stops_by_location(location, limit),
        Target::Route(route) => client.stops_by_route(&route),
    };
    client.close().await;

    for stop in stops? {
        print_stop(&stop);
    }
    Ok(())
}

fn format_arrivals(arrivals: &[Arrival]) -> String {
    let now = Utc::now();
    let upcoming: Vec<String> = arrivals
        .iter()
        .take(3)
        .map(|a| format!("{} in {} min", a.route, (a.time - now).num_minutes().max(0)))
        .collect();
    if upcoming.is_empty() {
        "-".to_string()
    } else {
        upcoming.join(", ")
    }
}

fn print_stop(stop: &Stop) {
    println!("{} ({}) [{}]", stop.name, stop.id, stop.routes.join(" "));
    println!("  N: {}", format_arrivals(&stop.arrivals.north));
    println!("  S: {}", format_arrivals(&stop.arrivals.south));
}

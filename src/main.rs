//! vatsim-watch CLI - METAR decoding, VATSIM lookups and logon announcements.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use vatsim_watch::{
    client::FeedClient,
    config::{Config, parse_duration},
    feed::VatsimData,
    metar,
    metrics::start_metrics_server,
    render::{self, Reply},
    report::DecodedReport,
    stats::WatchStats,
    watcher::{WatchEvent, Watcher},
};

/// vatsim-watch - METAR decoding, VATSIM lookups and logon announcements
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, env = "VATSIM_WATCH_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a raw METAR without fetching anything
    Decode {
        /// Raw METAR text; several arguments are joined with spaces.
        /// Put `--` first if a group starts with '-' (e.g. -RA)
        #[arg(required = true, num_args = 1..)]
        raw: Vec<String>,

        /// Print the decoded report as JSON
        #[arg(long)]
        json: bool,
    },

    #[command(flatten)]
    Network(NetworkCommand),
}

/// Commands that talk to the upstream services and need the config.
#[derive(Subcommand, Debug)]
enum NetworkCommand {
    /// Fetch and decode the METAR and TAF for an airport
    Weather {
        /// ICAO airport code
        icao: String,
    },

    /// Show the VATSIM ATIS for an airport
    Atis {
        /// ICAO airport code
        icao: String,
    },

    /// List online pilots
    Pilots {
        /// Number of pilots to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List online controllers
    Controllers {
        /// Number of controllers to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List VATSIM servers
    Servers,

    /// Look up a callsign among pilots, controllers and ATIS stations
    Search {
        callsign: String,
    },

    /// Look up a real-world flight on airplanes.live
    IrlSearch {
        callsign: String,
    },

    /// Announce newly connected clients until interrupted
    Watch {
        /// Poll interval, e.g. "60s" or "5m"
        #[arg(short, long, env = "VATSIM_WATCH_INTERVAL", value_parser = parse_duration)]
        interval: Option<Duration>,

        /// Maximum runtime in seconds (0 = unlimited)
        #[arg(long, default_value_t = 0)]
        max_runtime: u64,

        /// Serve Prometheus metrics on this port
        #[arg(long)]
        metrics_port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let stats = Arc::new(WatchStats::new());

    let command = match args.command {
        Command::Decode { raw, json } => return decode_command(&raw.join(" "), json, &stats),
        Command::Network(command) => command,
    };

    let config = load_config(args.config.as_deref(), &command)?;

    let client = FeedClient::new(config.client_config())
        .context("Failed to build HTTP client")?
        .with_stats(Arc::clone(&stats));

    let reply = match command {
        NetworkCommand::Weather { icao } => weather(&client, &icao, &stats).await,
        NetworkCommand::Atis { icao } => {
            feed_reply(&client, "ATIS data", |data| {
                render::atis_reply(&icao, data.find_atis(&icao))
            })
            .await
        }
        NetworkCommand::Pilots { limit } => {
            let limit = limit.unwrap_or(config.list_limit);
            feed_reply(&client, "pilots data", |data| {
                render::pilots_reply(&data.pilots, limit)
            })
            .await
        }
        NetworkCommand::Controllers { limit } => {
            let limit = limit.unwrap_or(config.list_limit);
            feed_reply(&client, "controllers data", |data| {
                render::controllers_reply(&data.controllers, limit)
            })
            .await
        }
        NetworkCommand::Servers => {
            feed_reply(&client, "servers data", |data| {
                render::servers_reply(&data.servers)
            })
            .await
        }
        NetworkCommand::Search { callsign } => {
            feed_reply(&client, "VATSIM data", |data| {
                render::search_reply(&callsign, &data.search(&callsign))
            })
            .await
        }
        NetworkCommand::IrlSearch { callsign } => match client.search_aircraft(&callsign).await {
            Ok(response) => render::aircraft_reply(&callsign, response.first()),
            Err(e) => {
                error!("Failed to search airplanes.live for {}: {}", callsign, e);
                render::error_reply("data from Airplanes.live API", e)
            }
        },
        NetworkCommand::Watch {
            max_runtime,
            metrics_port,
            ..
        } => {
            return run_watch(client, config, stats, max_runtime, metrics_port).await;
        }
    };

    print!("{}", reply);
    Ok(())
}

/// Load and validate the config, applying command-line overrides.
fn load_config(path: Option<&Path>, command: &NetworkCommand) -> Result<Config> {
    let mut config = Config::load(path)?;
    if let NetworkCommand::Watch {
        interval: Some(interval),
        ..
    } = command
    {
        config.watch.interval = *interval;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn decode_command(raw: &str, json: bool, stats: &WatchStats) -> Result<()> {
    let report = metar::decode(raw);
    stats.record_metar();

    if json {
        let output =
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{}", output);
    } else {
        print!("{}", render::decoded_reply(raw, &report));
    }
    Ok(())
}

/// Fetch the METAR and TAF for `icao` and build the weather reply.
///
/// A TAF failure only drops the TAF field.
async fn weather(client: &FeedClient, icao: &str, stats: &WatchStats) -> Reply {
    let raw = match client.fetch_metar(icao).await {
        Ok(raw) => raw,
        Err(e) => {
            error!("Failed to fetch METAR for {}: {}", icao, e);
            return render::error_reply("METAR data", e);
        }
    };

    if raw.is_empty() {
        return render::weather_reply(icao, &raw, &DecodedReport::default(), None);
    }

    let report = metar::decode(&raw);
    stats.record_metar();

    let taf = match client.fetch_taf(icao).await {
        Ok(taf) => Some(taf),
        Err(e) => {
            warn!("Failed to fetch TAF for {}: {}", icao, e);
            None
        }
    };

    render::weather_reply(icao, &raw, &report, taf.as_deref())
}

/// Fetch the VATSIM feed and render it, or render the fetch error.
async fn feed_reply(
    client: &FeedClient,
    what: &str,
    build: impl FnOnce(&VatsimData) -> Reply,
) -> Reply {
    match client.fetch_vatsim_data().await {
        Ok(data) => build(&data),
        Err(e) => {
            error!("Failed to fetch VATSIM data: {}", e);
            render::error_reply(what, e)
        }
    }
}

async fn run_watch(
    client: FeedClient,
    config: Config,
    stats: Arc<WatchStats>,
    max_runtime: u64,
    metrics_port: Option<u16>,
) -> Result<()> {
    info!("vatsim-watch starting...");
    info!("Feed: {}", client.config().vatsim_data_url);
    if config.watch.filters.is_empty() {
        info!("No filters configured; announcing every client");
    } else {
        info!("{} filter(s) configured", config.watch.filters.len());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        info!("Shutdown signal received");
        let _ = shutdown_tx_clone.send(true);
    });

    if max_runtime > 0 {
        let shutdown_tx_clone = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(max_runtime)).await;
            info!("Max runtime reached");
            let _ = shutdown_tx_clone.send(true);
        });
    }

    if config.metrics_enabled || metrics_port.is_some() {
        let port = metrics_port.unwrap_or(config.metrics_port);
        let stats_clone = Arc::clone(&stats);
        tokio::spawn(async move {
            if let Err(e) = start_metrics_server(port, stats_clone).await {
                error!("Metrics server failed: {}", e);
            }
        });
    }

    if !config.stats_interval.is_zero() {
        let stats_clone = Arc::clone(&stats);
        let period = config.stats_interval;
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            loop {
                interval.tick().await;
                eprintln!("\n{}", stats_clone.summary());
            }
        });
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let watcher = Watcher::new(client, &config.watch).with_stats(Arc::clone(&stats));
    let handle = tokio::spawn(watcher.run(tx, shutdown_rx));

    // Delivery runs here; the watcher never waits on it.
    while let Some(event) = rx.recv().await {
        match event {
            WatchEvent::Announcement(announcement) => {
                info!(
                    "New {} online: {}",
                    announcement.kind, announcement.callsign
                );
                println!("{}", announcement);
            }
            WatchEvent::Error(e) => {
                warn!("Poll failed, will retry next tick: {}", e);
            }
        }
    }

    let known = handle.await.context("Watcher task failed")?;
    info!("Stopped with {} known clients", known.len());

    eprintln!("\n\nFINAL STATISTICS");
    eprintln!("{}", stats.summary());

    Ok(())
}

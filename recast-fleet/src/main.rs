//! recast-fleet - Fleet orchestration daemon for recurring posts
//!
//! Discovers the configured account set and keeps one scheduling task
//! alive per account, publishing platform-tailored content variants at
//! each account's scheduled times.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use librecast::fleet::FleetOrchestrator;
use librecast::scheduler::EngineCtx;
use librecast::{Config, RecastError};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "recast-fleet")]
#[command(version)]
#[command(about = "Fleet orchestration daemon for recurring posts")]
#[command(long_about = "\
recast-fleet - Fleet orchestration daemon for recurring posts

DESCRIPTION:
    recast-fleet is a long-running daemon that discovers accounts from the
    inventory service and supervises one scheduling task per account.

    Each task walks the account's daily post times in order: it waits until
    the (jittered) fire instant, selects a library item and a platform
    caption, requests a freshly transformed media variant, and dispatches a
    publish request to the network's adapter. Failures are absorbed per
    slot; one account never blocks another.

USAGE:
    # Run in foreground (logs to stderr)
    recast-fleet

    # Run with a custom discovery interval
    recast-fleet --discovery-interval 60

    # Enable verbose logging
    recast-fleet --verbose

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (cancels account tasks)

CONFIGURATION:
    Configuration file: ~/.config/recast/config.toml (or $RECAST_CONFIG)

    [endpoints]
    inventory_base = \"http://api:8000\"
    variant_base = \"http://variant-api:8000\"
    instagram_base = \"http://ig-publisher:8000\"
    tiktok_base = \"http://tt-publisher:8000\"
    youtube_base = \"http://yt-publisher:8000\"

    [scheduling]
    posts_per_day = 3       # truncates each account's slot list
    jitter_minutes = 15     # symmetric random offset per fire instant
    discovery_interval_secs = 600

    [rate_limits]
    instagram = 25          # optional posts-per-hour caps

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
")]
struct Cli {
    /// Path to the configuration file (overrides $RECAST_CONFIG)
    #[arg(long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    /// Discovery interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    #[arg(help = "How often to re-discover the account set (default: 600)")]
    discovery_interval: Option<u64>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    #[arg(help = "Enable verbose logging (useful for debugging)")]
    verbose: bool,

    /// Run a single discovery pass and exit (for testing)
    #[arg(long, hide = true)]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    // Malformed configuration fails fast before any task starts
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(e.exit_code());
        }
    };

    let ctx = match EngineCtx::from_config(&config) {
        Ok(ctx) => Arc::new(ctx),
        Err(e) => {
            error!("Failed to construct engine: {}", e);
            std::process::exit(e.exit_code());
        }
    };

    info!("recast-fleet daemon starting");

    let shutdown = Arc::new(AtomicBool::new(false));
    if let Err(e) = setup_signal_handlers(shutdown.clone()) {
        error!("Signal setup failed: {}", e);
        std::process::exit(1);
    }

    let discovery_interval = Duration::from_secs(
        cli.discovery_interval
            .unwrap_or(config.scheduling.discovery_interval_secs),
    );
    info!("Discovery interval: {}s", discovery_interval.as_secs());

    let mut fleet = FleetOrchestrator::new(ctx, discovery_interval, shutdown);
    if cli.once {
        let discovered = fleet.reconcile().await;
        info!("recast-fleet: single pass discovered {} account(s), exiting", discovered);
    } else {
        fleet.run().await;
    }

    info!("recast-fleet daemon stopped");
}

fn load_config(cli: &Cli) -> Result<Config, RecastError> {
    match &cli.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) {
    use librecast::logging::{LogFormat, LoggingConfig};

    let format = std::env::var("RECAST_LOG_FORMAT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(LogFormat::Text);
    let level = std::env::var("RECAST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    LoggingConfig::new(format, level, verbose).init();
}

/// Set up signal handlers for graceful shutdown
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> std::io::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;

    std::thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGTERM | SIGINT => {
                    info!("Received shutdown signal, stopping gracefully...");
                    shutdown.store(true, Ordering::Relaxed);
                    break;
                }
                _ => {}
            }
        }
    });

    Ok(())
}

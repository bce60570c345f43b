//! podcrawl command-line entry point.

use clap::Parser;
use podcrawl::config::load_config_with_hash;
use podcrawl::crawler::Orchestrator;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing_subscriber::EnvFilter;

/// podcrawl: a polite, high-throughput, single-machine web crawler.
#[derive(Parser, Debug)]
#[command(name = "podcrawl")]
#[command(version = "1.0.0")]
#[command(about = "A polite web crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Address to serve Prometheus metrics on
    #[arg(long, default_value = "127.0.0.1:9090")]
    metrics_addr: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("loading configuration from {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((config, hash)) => {
            tracing::info!("configuration loaded (hash: {hash})");
            (config, hash)
        }
        Err(e) => {
            tracing::error!("failed to load configuration: {e}");
            return Err(e.into());
        }
    };
    let _ = config_hash;

    if let Err(e) = podcrawl::metrics::install_exporter(cli.metrics_addr) {
        tracing::warn!("failed to install metrics exporter: {e}");
    }

    let orchestrator = Orchestrator::bootstrap(config).await?;
    let shutdown = orchestrator.shutdown_handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received, draining in-flight work");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    match orchestrator.run().await {
        Ok(()) => {
            tracing::info!("crawl finished");
            Ok(())
        }
        Err(e) => {
            tracing::error!("crawl failed: {e}");
            Err(e.into())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("podcrawl=info,warn"),
            1 => EnvFilter::new("podcrawl=debug,info"),
            2 => EnvFilter::new("podcrawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

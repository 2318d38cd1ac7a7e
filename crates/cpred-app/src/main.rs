//! Crypto predictor client - Entry Point
//!
//! `cpred dashboard`: live market feed (initial snapshot + stream)
//! `cpred checkout`: start a subscription checkout

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

/// Crypto predictor client
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via CPRED_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Follow the live market feed until Ctrl-C
    Dashboard {
        /// Stop after this many seconds
        #[arg(long)]
        duration_secs: Option<u64>,
    },
    /// Create a checkout session and print the redirect URL
    Checkout {
        /// Subscription tier (defaults to the configured tier)
        #[arg(long)]
        tier: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    cpred_ws::init_crypto();

    let args = Args::parse();

    // Determine config path: CLI arg > CPRED_CONFIG env var > default
    let config_path = cpred_app::AppConfig::resolve_path(args.config);
    let config = cpred_app::AppConfig::load(&config_path)?;

    cpred_telemetry::init_logging(Some(&config.telemetry.log_level))?;

    info!("Starting cpred v{}", env!("CARGO_PKG_VERSION"));
    info!(config_path = %config_path, origin = %config.origin, "Configuration loaded");

    let app = cpred_app::Application::new(config)?;

    match args.command {
        Command::Dashboard { duration_secs } => {
            let shutdown = async move {
                match duration_secs {
                    Some(secs) => {
                        tokio::select! {
                            _ = tokio::signal::ctrl_c() => {}
                            () = tokio::time::sleep(Duration::from_secs(secs)) => {}
                        }
                    }
                    None => {
                        let _ = tokio::signal::ctrl_c().await;
                    }
                }
            };
            app.run_dashboard(shutdown).await?;
        }
        Command::Checkout { tier } => {
            let redirect = app.checkout(tier.as_deref()).await?;
            println!("{}", redirect.url);
        }
    }

    Ok(())
}

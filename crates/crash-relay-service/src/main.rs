//! # Crash Relay
//!
//! Binary entry point: loads configuration, initializes logging and runs
//! the webhook relay until SIGINT or SIGTERM.

use clap::Parser;
use crash_relay_api::ServiceError;
use crash_relay_service::{exit_code, init_tracing, load_config, run, Cli};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logging is not installed yet, so configuration errors go to stderr
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(exit_code(&ServiceError::Configuration(e)));
        }
    };

    if let Err(e) = init_tracing(&config.logging) {
        eprintln!("{e:#}");
        std::process::exit(2);
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Crash Relay");

    if let Err(e) = run(config).await {
        error!(error = %e, "Crash Relay stopped with an error");
        std::process::exit(exit_code(&e));
    }
}

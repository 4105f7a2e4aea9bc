//! # Crash Relay Service
//!
//! Bootstrap for the `crash-relay` binary: command line parsing,
//! configuration layering, logging setup and server startup.
//!
//! Configuration sources, later sources override earlier ones:
//!
//! 1. Built-in defaults
//! 2. Optional file given by `--config` / `CRASH_RELAY_CONFIG`
//! 3. Environment variables prefixed `CRASH_RELAY__` (double-underscore
//!    separator), e.g. `CRASH_RELAY__SERVER__HOST=127.0.0.1`
//! 4. Command line flags, which also read `CRASHLYTICS_AUTH_TOKEN`,
//!    `HUMIO_INGEST_TOKEN`, `HUMIO_URL` and `PORT`

use anyhow::Context;
use clap::Parser;
use crash_relay_api::{
    start_server, AppState, ConfigError, HumioPusher, LoggingConfig, ServiceConfig, ServiceError,
};
use crash_relay_core::SystemClock;
use std::{path::PathBuf, sync::Arc};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

/// Prefix of environment variables mapped onto the configuration tree.
pub const ENV_PREFIX: &str = "CRASH_RELAY";

/// Crates whose log output is governed by the configured level.
const LOG_TARGETS: [&str; 4] = [
    "crash_relay_service",
    "crash_relay_api",
    "crash_relay_core",
    "tower_http",
];

// ============================================================================
// CLI Structure
// ============================================================================

/// Crash Relay - forward Crashlytics issue webhooks to Humio
#[derive(Debug, Parser)]
#[command(name = "crash-relay")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Relay Crashlytics webhook events into the Humio ingest API")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CRASH_RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Timeout in seconds for inbound requests and Humio calls
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u32>,

    /// Token Crashlytics must send in the `token` query parameter
    #[arg(long, env = "CRASHLYTICS_AUTH_TOKEN", hide_env_values = true)]
    pub crashlytics_auth_token: Option<String>,

    /// Humio ingest token
    #[arg(long, env = "HUMIO_INGEST_TOKEN", hide_env_values = true)]
    pub humio_ingest_token: Option<String>,

    /// Humio base URL, e.g. https://cloud.humio.com
    #[arg(long, env = "HUMIO_URL")]
    pub humio_url: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Logging level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,
}

// ============================================================================
// Configuration
// ============================================================================

/// Resolve and validate the service configuration.
pub fn load_config(cli: &Cli) -> Result<ServiceConfig, ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = &cli.config {
        builder = builder.add_source(config::File::from(path.as_path()).required(true));
    }

    let json_logs = cli.json_logs.then_some(true);

    let config = builder
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .set_override_option("server.port", cli.port.map(i64::from))
        .and_then(|b| b.set_override_option("server.timeout_seconds", cli.timeout.map(i64::from)))
        .and_then(|b| {
            b.set_override_option(
                "crashlytics.auth_token",
                cli.crashlytics_auth_token.clone(),
            )
        })
        .and_then(|b| b.set_override_option("humio.ingest_token", cli.humio_ingest_token.clone()))
        .and_then(|b| b.set_override_option("humio.url", cli.humio_url.clone()))
        .and_then(|b| b.set_override_option("logging.level", cli.log_level.clone()))
        .and_then(|b| b.set_override_option("logging.json_format", json_logs))
        .and_then(|b| b.build())
        .map_err(|e| ConfigError::Load {
            message: e.to_string(),
        })?;

    let service_config: ServiceConfig =
        config.try_deserialize().map_err(|e| ConfigError::Load {
            message: e.to_string(),
        })?;

    service_config.validate()?;
    Ok(service_config)
}

// ============================================================================
// Logging
// ============================================================================

/// Filter applying `level` to the service's own crates.
pub fn log_filter(level: &str) -> Result<EnvFilter, ConfigError> {
    let directives = LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={}", level.trim()))
        .collect::<Vec<_>>()
        .join(",");

    EnvFilter::try_new(directives).map_err(|e| ConfigError::Invalid {
        message: format!("log level '{level}' not valid: {e}"),
    })
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => log_filter(&logging.level)?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json_format {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    }
    .context("Failed to install tracing subscriber")
}

// ============================================================================
// Startup
// ============================================================================

/// Build the application from configuration and serve until shutdown.
pub async fn run(config: ServiceConfig) -> Result<(), ServiceError> {
    let timeout = config.server.timeout();
    let pusher = HumioPusher::from_config(&config.humio, timeout)?;

    info!(
        ingest_url = %pusher.ingest_url(),
        timeout_seconds = config.server.timeout_seconds,
        "Configured Humio ingest"
    );

    let state = AppState::new(
        config.crashlytics.auth_token.clone(),
        Arc::new(pusher),
        Arc::new(SystemClock),
        timeout,
    );

    info!(
        host = %config.server.host,
        port = config.server.port,
        "Starting HTTP server"
    );

    start_server(&config.server, state).await
}

/// Process exit code for a fatal error.
pub fn exit_code(error: &ServiceError) -> i32 {
    match error {
        ServiceError::Configuration(_) => 2,
        ServiceError::BindFailed { .. }
        | ServiceError::ServerFailed { .. }
        | ServiceError::HttpClient { .. } => 1,
    }
}

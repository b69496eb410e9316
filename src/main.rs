//! User service: application entry point.
//!
//! Loads configuration from TOML, initializes tracing, wires dependencies
//! into the health aggregator and shutdown coordinator, and serves until a
//! termination signal or fault runs the shutdown sequence to completion.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use user_service::config::{AppConfig, DEFAULT_CONFIG_PATH, DEFAULT_LOG_FILTER};
use user_service::http::{setup_panic_hook, start_server};
use user_service::Application;

/// User service HTTP server
#[derive(Parser, Debug)]
#[command(name = "user-service", version, about)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Log level filter (e.g., "user_service=debug,tower_http=info")
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration first: it selects the log format
    let config = AppConfig::load(&args.config)?;

    // Initialize tracing with priority: CLI > env > default
    let log_filter = args
        .log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

    let filter = tracing_subscriber::EnvFilter::new(&log_filter);
    if config.logging.is_json() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        environment = %config.app.environment,
        timeout_ms = config.shutdown.timeout_ms,
        grace_period_ms = config.shutdown.grace_period_ms,
        dependencies = config.dependency.len(),
        "Loaded configuration"
    );

    let http_config = config.http.clone();
    let app = Application::build(config)?;
    setup_panic_hook(app.coordinator.clone());

    let outcome = start_server(app.router, &http_config, app.coordinator).await?;

    if outcome.is_forced() {
        tracing::error!(trigger = %outcome.trigger(), "Server shutdown forced after deadline");
    } else {
        tracing::info!(trigger = %outcome.trigger(), "Server shutdown completed");
    }

    std::process::exit(outcome.exit_code());
}

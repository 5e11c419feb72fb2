// Wayfarer travel recommender
// Main entry point for the wayfarer binary

use clap::Parser;
use wayfarer_engine::cli::{Cli, Command};
use wayfarer_engine::config::Config;
use wayfarer_engine::handlers::{
    handle_ask, handle_chat, handle_doctor, handle_setup, OutputFormat,
};
use wayfarer_engine::telemetry::{init_telemetry, init_telemetry_with_level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Setup writes the config, so it must not load (and create) one first
    if let Command::Setup = cli.command {
        init_telemetry();
        return handle_setup(cli.config.as_deref()).await;
    }

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log wins over the config level; RUST_LOG wins over both
    init_telemetry_with_level(cli.log.as_deref().unwrap_or(&config.core.log_level));

    tracing::info!("Wayfarer v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Chat => handle_chat(&config, format, cli.trace_events).await,

        Command::Ask { origin, query } => {
            tracing::info!("One-shot request from {}", origin);
            handle_ask(origin, query, &config, format, cli.trace_events).await
        }

        Command::Doctor => {
            tracing::info!("Running diagnostics...");
            handle_doctor(&config, format).await
        }

        Command::Setup => Ok(()),
    }
}

//! WhatsApp gateway CLI entry point.
//!
//! Provides `serve` (the default) for running the HTTP gateway and
//! `check-config` for printing the resolved configuration.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use whatsapp_gateway::adapter::bridge::BridgeAdapter;
use whatsapp_gateway::adapter::MessagingAdapter;
use whatsapp_gateway::config::{CliOverrides, GatewayConfig};
use whatsapp_gateway::gateway::server;
use whatsapp_gateway::logging;

/// WhatsApp gateway: forwards receipts and messages to a WhatsApp Web bridge.
#[derive(Parser)]
#[command(name = "whatsapp-gateway", version, about)]
struct Cli {
    /// Path to the TOML config file (else `$GATEWAY_CONFIG_PATH`, else `./gateway.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute. Defaults to `serve`.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Run the HTTP gateway.
    Serve(CliOverrides),
    /// Load and validate configuration, print it, and exit.
    CheckConfig(CliOverrides),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is normal outside development.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let (mut config, report) =
        GatewayConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command.unwrap_or(Command::Serve(CliOverrides::default())) {
        Command::Serve(flags) => {
            config.apply_cli(flags);
            let _logging_guard =
                logging::init(config.logging.dir.as_deref(), &config.logging.level)?;
            report.log();
            config.validate().context("invalid configuration")?;
            handle_serve(config).await
        }
        Command::CheckConfig(flags) => {
            config.apply_cli(flags);
            // Console only: stdout carries the rendered config, notes go to stderr.
            let _logging_guard = logging::init_console(&config.logging.level)?;
            report.log();
            handle_check_config(&config)
        }
    }
}

/// Validate and print the resolved configuration as TOML.
fn handle_check_config(config: &GatewayConfig) -> anyhow::Result<()> {
    config.validate().context("invalid configuration")?;
    let rendered = toml::to_string_pretty(config).context("failed to render configuration")?;
    println!("{rendered}");
    Ok(())
}

/// Run the gateway until SIGINT.
async fn handle_serve(config: GatewayConfig) -> anyhow::Result<()> {
    info!(bridge = %config.adapter.bridge_url, "starting WhatsApp gateway");
    let adapter: Arc<dyn MessagingAdapter> =
        Arc::new(BridgeAdapter::new(&config.adapter.bridge_url));

    server::run(&config, adapter).await
}

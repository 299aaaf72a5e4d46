//! `fitdesk` binary entry point

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

use anyhow::{Context as _, Result};
use clap::Parser;
use fitdesk_cli::{AppContext, Cli, apply_overrides, execute};
use fitdesk_core::Config;
use tracing::{debug, info};

/// Main entry point for the `FitDesk` console
///
/// # Errors
///
/// Returns error if configuration, logging or the command fails
#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config =
        Config::load_from(cli.config.as_deref()).context("Failed to load configuration")?;
    apply_overrides(&mut config, &cli).context("Invalid configuration override")?;

    fitdesk_core::init_logging(&config.logging)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        base_url = %config.api.base_url,
        "FitDesk console starting"
    );

    let ctx = AppContext::new(config)?;
    let output = execute(&ctx, cli.command).await?;
    debug!(cached_queries = ctx.cache.len(), "Command finished");

    println!("{output}");
    Ok(())
}

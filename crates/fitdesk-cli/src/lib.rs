//! `FitDesk` command-line console
//!
//! Argument parsing, wiring and command handlers for the `fitdesk` binary.
//! Kept as a library so the handlers can be driven from integration tests.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod cli;
pub mod commands;
pub mod context;

pub use cli::Cli;
pub use commands::{Output, execute};
pub use context::{AppContext, CliNavigator};

use fitdesk_core::Config;

/// Fold command-line overrides into the loaded configuration
///
/// # Errors
///
/// Returns a validation error if an override leaves the configuration invalid.
pub fn apply_overrides(config: &mut Config, cli: &Cli) -> fitdesk_core::Result<()> {
    if let Some(level) = &cli.log_level {
        config.logging.level.clone_from(level);
    }
    if cli.json {
        config.logging.format = "json".to_string();
    }
    if let Some(base_url) = &cli.base_url {
        config.api.base_url.clone_from(base_url);
    }
    config.validate()
}

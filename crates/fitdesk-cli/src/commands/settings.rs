//! Local settings: theme preference and resolved configuration

use super::Output;
use crate::cli::{ConfigCommand, ThemeCommand};
use crate::context::AppContext;
use anyhow::{Context as _, Result, bail};
use serde_json::json;

/// `fitdesk theme get|set`
///
/// # Errors
///
/// Fails when the theme name is empty or cannot be stored.
pub fn theme(ctx: &AppContext, action: &ThemeCommand) -> Result<Output> {
    if let ThemeCommand::Set { theme } = action {
        let theme = theme.trim();
        if theme.is_empty() {
            bail!("Theme name must not be empty");
        }
        ctx.store
            .set_theme(theme)
            .context("Failed to store theme")?;
    }
    Ok(Output::Json(json!({ "theme": ctx.store.theme() })))
}

/// `fitdesk config show`
///
/// # Errors
///
/// Fails if the configuration cannot be rendered as TOML.
pub fn config(ctx: &AppContext, action: &ConfigCommand) -> Result<Output> {
    match action {
        ConfigCommand::Show => {
            let rendered =
                toml::to_string_pretty(&ctx.config).context("Failed to serialize configuration")?;
            Ok(Output::Text(rendered))
        }
    }
}

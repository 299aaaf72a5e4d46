//! Command handlers
//!
//! Handlers return what should be printed; `main` does the printing.

pub mod auth;
pub mod settings;
pub mod users;

use crate::cli::Command;
use crate::context::AppContext;
use anyhow::Result;
use fitdesk_core::{LoginCredentials, RegisterData};
use serde_json::Value;
use std::fmt;

/// Result of a command
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// JSON document, printed pretty
    Json(Value),
    /// Pre-rendered text
    Text(String),
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(value) => match serde_json::to_string_pretty(value) {
                Ok(rendered) => f.write_str(&rendered),
                Err(_) => write!(f, "{value}"),
            },
            Self::Text(text) => f.write_str(text.trim_end()),
        }
    }
}

/// Run `command` against `ctx`
///
/// # Errors
///
/// Returns the command's failure, including normalized API errors.
pub async fn execute(ctx: &AppContext, command: Command) -> Result<Output> {
    match command {
        Command::Login {
            email,
            password,
            remember,
        } => {
            let mut credentials = LoginCredentials::new(email, password);
            credentials.remember_me = remember.then_some(true);
            auth::login(ctx, &credentials).await
        }
        Command::Logout => auth::logout(ctx).await,
        Command::Register {
            email,
            password,
            first_name,
            last_name,
            role,
        } => {
            let data = RegisterData {
                email,
                password,
                first_name,
                last_name,
                role,
            };
            auth::register(ctx, &data).await
        }
        Command::Whoami => auth::whoami(ctx).await,
        Command::Refresh => auth::refresh(ctx).await,
        Command::Users { action } => users::handle(ctx, action).await,
        Command::Theme { action } => settings::theme(ctx, &action),
        Command::Config { action } => settings::config(ctx, &action),
    }
}

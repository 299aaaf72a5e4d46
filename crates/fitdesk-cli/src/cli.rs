//! Command-line arguments

use clap::{Args, Parser, Subcommand};
use fitdesk_core::SortOrder;
use std::path::PathBuf;

/// Command line interface for the `FitDesk` console
#[derive(Debug, Parser)]
#[command(
    name = "fitdesk",
    version = env!("CARGO_PKG_VERSION"),
    about = "Command-line console for the FitDesk admin API",
    long_about = "Signs in to the FitDesk API, keeps the session on disk and manages users through the same cache and gateway the console uses."
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Enable structured JSON logging
    #[arg(long, global = true)]
    pub json: bool,

    /// API base URL (overrides configuration)
    #[arg(long, value_name = "URL", global = true)]
    pub base_url: Option<String>,

    /// Subcommand
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in and store the session
    Login {
        /// Account email
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long, env = "FITDESK_PASSWORD", hide_env_values = true)]
        password: String,

        /// Ask for a long-lived session
        #[arg(long)]
        remember: bool,
    },

    /// End the session
    Logout,

    /// Create an account
    Register {
        /// Account email
        #[arg(long)]
        email: String,

        /// Initial password
        #[arg(long, env = "FITDESK_PASSWORD", hide_env_values = true)]
        password: String,

        /// Given name
        #[arg(long)]
        first_name: String,

        /// Family name
        #[arg(long)]
        last_name: String,

        /// Requested role
        #[arg(long)]
        role: Option<String>,
    },

    /// Show the signed-in user
    Whoami,

    /// Exchange the refresh token for a new access token
    Refresh,

    /// Manage users
    Users {
        /// User subcommand
        #[command(subcommand)]
        action: UserCommand,
    },

    /// Read or change the theme preference
    Theme {
        /// Theme subcommand
        #[command(subcommand)]
        action: ThemeCommand,
    },

    /// Inspect configuration
    Config {
        /// Configuration subcommand
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

/// User management commands
#[derive(Debug, Subcommand)]
pub enum UserCommand {
    /// List users
    List(ListArgs),

    /// Show one user
    Get {
        /// User id
        id: String,
    },

    /// Create a user
    Create {
        /// Account email
        #[arg(long)]
        email: String,

        /// Given name
        #[arg(long)]
        first_name: String,

        /// Family name
        #[arg(long)]
        last_name: String,

        /// Role name
        #[arg(long)]
        role: Option<String>,
    },

    /// Change a user
    Update {
        /// User id
        id: String,

        /// New email
        #[arg(long)]
        email: Option<String>,

        /// New given name
        #[arg(long)]
        first_name: Option<String>,

        /// New family name
        #[arg(long)]
        last_name: Option<String>,

        /// New role
        #[arg(long)]
        role: Option<String>,
    },

    /// Delete a user
    Delete {
        /// User id
        id: String,
    },
}

/// Paging, search and filter options for `users list`
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Page number (1-based)
    #[arg(long)]
    pub page: Option<u32>,

    /// Page size
    #[arg(long)]
    pub limit: Option<u32>,

    /// Free-text search
    #[arg(short, long)]
    pub search: Option<String>,

    /// Field to sort by
    #[arg(long)]
    pub sort_by: Option<String>,

    /// Sort direction (asc, desc)
    #[arg(long)]
    pub sort_order: Option<SortOrder>,

    /// Extra filter as key=value (repeatable)
    #[arg(short, long = "filter", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub filters: Vec<(String, String)>,
}

/// Theme commands
#[derive(Debug, Subcommand)]
pub enum ThemeCommand {
    /// Print the current theme
    Get,

    /// Store a theme
    Set {
        /// Theme name, e.g. light or dark
        theme: String,
    },
}

/// Configuration commands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the resolved configuration as TOML
    Show,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty filter key in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_parses_users_list_options() {
        let cli = Cli::try_parse_from([
            "fitdesk",
            "--json",
            "users",
            "list",
            "--page",
            "2",
            "--sort-by",
            "lastName",
            "--sort-order",
            "DESC",
            "-f",
            "role=trainer",
            "--filter",
            "status=active",
        ])
        .unwrap();

        assert!(cli.json);
        let Command::Users {
            action: UserCommand::List(args),
        } = cli.command
        else {
            panic!("expected users list");
        };
        assert_eq!(args.page, Some(2));
        assert_eq!(args.sort_order, Some(SortOrder::Desc));
        assert_eq!(
            args.filters,
            vec![
                ("role".to_string(), "trainer".to_string()),
                ("status".to_string(), "active".to_string()),
            ]
        );
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::try_parse_from(["fitdesk", "whoami", "--log-level", "debug"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Command::Whoami));
    }

    #[rstest]
    #[case("role=trainer", Ok(("role".to_string(), "trainer".to_string())))]
    #[case("tag=a=b", Ok(("tag".to_string(), "a=b".to_string())))]
    #[case("novalue", Err(()))]
    #[case("=x", Err(()))]
    fn test_parse_key_value(#[case] raw: &str, #[case] expected: Result<(String, String), ()>) {
        assert_eq!(parse_key_value(raw).map_err(|_| ()), expected);
    }

    #[test]
    fn test_rejects_unknown_sort_order() {
        assert!(Cli::try_parse_from(["fitdesk", "users", "list", "--sort-order", "up"]).is_err());
    }
}

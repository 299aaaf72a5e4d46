//! Configuration management for the `FitDesk` client

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that supplies the API base URL
pub const API_BASE_URL_ENV: &str = "FITDESK_API_BASE_URL";

/// Unprefixed fallback for the API base URL
pub const API_BASE_URL_FALLBACK_ENV: &str = "API_BASE_URL";

/// Nested-key form of the base URL override, which wins over both above
const API_BASE_URL_NESTED_ENV: &str = "FITDESK_API__BASE_URL";

/// Base URL used when nothing else is configured
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3001/api";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// API gateway configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Credential storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Query cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// What the gateway does when the server answers 401
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnauthorizedPolicy {
    /// Clear the session and redirect to the login entry point
    #[default]
    Redirect,
    /// Try one token refresh and replay before falling back to `Redirect`
    RefreshThenRedirect,
}

/// API gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL every request path is joined onto
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Login entry point used for the forced-logout redirect
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Endpoint used to exchange a refresh token
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,

    /// Behaviour on an unauthorized response
    #[serde(default)]
    pub unauthorized_policy: UnauthorizedPolicy,
}

/// Which durable backend holds the credential record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackendKind {
    /// JSON file on disk
    #[default]
    File,
    /// Process memory only
    Memory,
}

/// Credential storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend kind
    #[serde(default)]
    pub backend: StorageBackendKind,

    /// Path of the session file (file backend only)
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Query cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Seconds a successful fetch stays fresh
    #[serde(default = "default_stale_time_secs")]
    pub stale_time_secs: u64,

    /// Seconds an unused entry survives before garbage collection
    #[serde(default = "default_gc_time_secs")]
    pub gc_time_secs: u64,

    /// Retries for a failed query
    #[serde(default = "default_retry")]
    pub query_retry: u32,

    /// Retries for a failed mutation
    #[serde(default = "default_retry")]
    pub mutation_retry: u32,

    /// Delay between retries in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json or text)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_base_url() -> String {
    std::env::var(API_BASE_URL_ENV)
        .or_else(|_| std::env::var(API_BASE_URL_FALLBACK_ENV))
        .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string())
}

const fn default_timeout_secs() -> u64 {
    10
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_refresh_path() -> String {
    "/auth/refresh".to_string()
}

const fn default_stale_time_secs() -> u64 {
    300 // 5 minutes
}

const fn default_gc_time_secs() -> u64 {
    600 // 10 minutes
}

const fn default_retry() -> u32 {
    1
}

const fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            login_path: default_login_path(),
            refresh_path: default_refresh_path(),
            unauthorized_policy: UnauthorizedPolicy::default(),
        }
    }
}

impl ApiConfig {
    /// Create a configuration pointing at `base_url` with default settings
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Request timeout as a [`Duration`]
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_time_secs: default_stale_time_secs(),
            gc_time_secs: default_gc_time_secs(),
            query_retry: default_retry(),
            mutation_retry: default_retry(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl CacheConfig {
    /// Staleness window
    #[must_use]
    pub const fn stale_time(&self) -> Duration {
        Duration::from_secs(self.stale_time_secs)
    }

    /// Garbage-collection horizon
    #[must_use]
    pub const fn gc_time(&self) -> Duration {
        Duration::from_secs(self.gc_time_secs)
    }

    /// Delay between retries
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl StorageConfig {
    /// Session file location, falling back to the platform data directory
    #[must_use]
    pub fn resolved_path(&self) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }

        directories::ProjectDirs::from("com", "fitdesk", "fitdesk").map_or_else(
            || PathBuf::from(".fitdesk").join("session.json"),
            |dirs| dirs.data_dir().join("session.json"),
        )
    }
}

impl Config {
    /// Load configuration from `fitdesk.toml` (optional) and `FITDESK_*` variables
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or parsed.
    pub fn load() -> crate::Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, reading `path` instead of `fitdesk.toml` when given
    ///
    /// Nested keys are overridden with `FITDESK_<SECTION>__<FIELD>`, for
    /// example `FITDESK_CACHE__STALE_TIME_SECS=60`. The base URL can also be
    /// set with `FITDESK_API_BASE_URL` or `API_BASE_URL`; both beat the file
    /// but lose to `FITDESK_API__BASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing (explicit path only), cannot
    /// be parsed, or the resulting configuration is invalid.
    pub fn load_from(path: Option<&Path>) -> crate::Result<Self> {
        let file_source = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("fitdesk").required(false),
        };

        let mut config: Self = config::Config::builder()
            .add_source(file_source)
            .add_source(
                config::Environment::with_prefix("FITDESK")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        config.apply_base_url_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    fn apply_base_url_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if set(API_BASE_URL_NESTED_ENV).is_some() {
            return;
        }
        if let Some(url) = set(API_BASE_URL_ENV).or_else(|| set(API_BASE_URL_FALLBACK_ENV)) {
            tracing::debug!(base_url = %url, "Base URL taken from environment");
            self.api.base_url = url;
        }
    }

    /// Check values that serde defaults cannot guard
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the offending field.
    pub fn validate(&self) -> crate::Result<()> {
        let url = url::Url::parse(&self.api.base_url).map_err(|e| {
            crate::Error::validation("api.base_url", format!("{e}: {}", self.api.base_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(crate::Error::validation(
                "api.base_url",
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }
        if self.api.timeout_secs == 0 {
            return Err(crate::Error::validation(
                "api.timeout_secs",
                "must be greater than zero",
            ));
        }
        if !self.api.login_path.starts_with('/') {
            return Err(crate::Error::validation(
                "api.login_path",
                "must start with '/'",
            ));
        }
        if !matches!(self.logging.format.as_str(), "json" | "text") {
            return Err(crate::Error::validation(
                "logging.format",
                "expected 'json' or 'text'",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::field_reassign_with_default)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.api.timeout(), Duration::from_secs(10));
        assert_eq!(config.api.login_path, "/login");
        assert_eq!(config.api.refresh_path, "/auth/refresh");
        assert_eq!(config.api.unauthorized_policy, UnauthorizedPolicy::Redirect);

        assert_eq!(config.storage.backend, StorageBackendKind::File);
        assert!(config.storage.path.is_none());

        assert_eq!(config.cache.stale_time(), Duration::from_secs(300));
        assert_eq!(config.cache.gc_time(), Duration::from_secs(600));
        assert_eq!(config.cache.query_retry, 1);
        assert_eq!(config.cache.mutation_retry, 1);

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "text");
    }

    #[test]
    fn test_partial_config_deserialization() {
        let json_str = r#"{
            "api": {"base_url": "https://api.example.com/v1", "unauthorized_policy": "refresh_then_redirect"},
            "cache": {"stale_time_secs": 30}
        }"#;

        let config: Config = serde_json::from_str(json_str).unwrap();

        assert_eq!(config.api.base_url, "https://api.example.com/v1");
        assert_eq!(
            config.api.unauthorized_policy,
            UnauthorizedPolicy::RefreshThenRedirect
        );
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.cache.stale_time_secs, 30);
        assert_eq!(config.cache.gc_time_secs, 600);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_from_explicit_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[api]\nbase_url = \"https://staging.example.com/api\"\ntimeout_secs = 5\n\n[storage]\nbackend = \"memory\"\n"
        )
        .unwrap();

        let config = Config::load_from(Some(file.path())).unwrap();

        assert_eq!(config.api.base_url, "https://staging.example.com/api");
        assert_eq!(config.api.timeout_secs, 5);
        assert_eq!(config.storage.backend, StorageBackendKind::Memory);
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let result = Config::load_from(Some(Path::new("/nonexistent/fitdesk.toml")));
        assert!(matches!(result, Err(crate::Error::Configuration { .. })));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.api.base_url = "not a url".to_string();
        assert!(matches!(
            config.validate(),
            Err(crate::Error::Validation { ref field, .. }) if field == "api.base_url"
        ));

        let mut config = Config::default();
        config.api.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.api.base_url = DEFAULT_API_BASE_URL.to_string();
        config.api.timeout_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(crate::Error::Validation { ref field, .. }) if field == "api.timeout_secs"
        ));

        let mut config = Config::default();
        config.api.base_url = DEFAULT_API_BASE_URL.to_string();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_base_url_variables_override_file_value() {
        let env = |pairs: &'static [(&'static str, &'static str)]| {
            move |name: &str| {
                pairs
                    .iter()
                    .find(|(k, _)| *k == name)
                    .map(|(_, v)| (*v).to_string())
            }
        };
        let from_file = || {
            let mut config = Config::default();
            config.api.base_url = "https://file.example.com/api".to_string();
            config
        };

        let mut config = from_file();
        config.apply_base_url_env(env(&[]));
        assert_eq!(config.api.base_url, "https://file.example.com/api");

        let mut config = from_file();
        config.apply_base_url_env(env(&[
            ("API_BASE_URL", "https://fallback.example.com/api"),
            ("FITDESK_API_BASE_URL", "https://env.example.com/api"),
        ]));
        assert_eq!(config.api.base_url, "https://env.example.com/api");

        let mut config = from_file();
        config.apply_base_url_env(env(&[("API_BASE_URL", "https://fallback.example.com/api")]));
        assert_eq!(config.api.base_url, "https://fallback.example.com/api");

        // The nested form was already applied by the config builder
        let mut config = from_file();
        config.apply_base_url_env(env(&[
            ("FITDESK_API__BASE_URL", "https://nested.example.com/api"),
            ("FITDESK_API_BASE_URL", "https://env.example.com/api"),
        ]));
        assert_eq!(config.api.base_url, "https://file.example.com/api");
    }

    #[test]
    fn test_storage_path_resolution() {
        let explicit = StorageConfig {
            backend: StorageBackendKind::File,
            path: Some(PathBuf::from("/tmp/session.json")),
        };
        assert_eq!(explicit.resolved_path(), PathBuf::from("/tmp/session.json"));

        let implicit = StorageConfig::default();
        assert!(implicit.resolved_path().ends_with("session.json"));
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let mut config = Config::default();
        config.api.base_url = "https://api.example.com".to_string();

        let json = serde_json::to_string(&config).unwrap();
        let deserialized: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.api.base_url, config.api.base_url);
        assert_eq!(deserialized.cache.retry_delay_ms, config.cache.retry_delay_ms);
    }
}

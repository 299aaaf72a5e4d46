//! Per-query options and observed results

use fitdesk_client::ApiError;
use fitdesk_core::CacheConfig;
use serde::Serialize;
use std::time::Duration;

/// How a read is served from the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// Disabled queries never fetch
    pub enabled: bool,
    /// Age after which cached data is refetched
    pub stale_time: Duration,
    /// Extra attempts after a retryable failure
    pub retry: u32,
    /// Pause between attempts
    pub retry_delay: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

impl QueryOptions {
    /// Options from the cache section of the configuration
    #[must_use]
    pub const fn from_config(config: &CacheConfig) -> Self {
        Self {
            enabled: true,
            stale_time: config.stale_time(),
            retry: config.query_retry,
            retry_delay: config.retry_delay(),
        }
    }

    /// Enable or disable the query
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Override the retry count
    #[must_use]
    pub const fn retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    /// Override the staleness window
    #[must_use]
    pub const fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }
}

/// Lifecycle state of an observed query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    /// Never fetched, or disabled
    Idle,
    /// First fetch in progress
    Loading,
    /// Data available
    Success,
    /// Last fetch failed
    Error,
}

/// Snapshot of a cache entry as seen by one observer
#[derive(Debug, Clone)]
pub struct QueryResult<T> {
    /// Last known good data
    pub data: Option<T>,
    /// Error from the most recent failed fetch
    pub error: Option<ApiError>,
    /// Lifecycle state
    pub status: QueryStatus,
    /// A fetch for this key is in flight
    pub is_fetching: bool,
    /// Data is older than the staleness window or was invalidated
    pub is_stale: bool,
}

impl<T> QueryResult<T> {
    /// Result for a query that has nothing cached and will not fetch
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            data: None,
            error: None,
            status: QueryStatus::Idle,
            is_fetching: false,
            is_stale: true,
        }
    }

    /// First fetch still running
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    /// Data is available
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    /// Last fetch failed
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    /// Convert into a `Result`, preferring data over a refetch error
    ///
    /// # Errors
    ///
    /// Returns the stored error when there is no data, or an `IDLE` local
    /// error for a query that never ran.
    pub fn into_result(self) -> Result<T, ApiError> {
        match (self.data, self.error) {
            (Some(data), _) => Ok(data),
            (None, Some(error)) => Err(error),
            (None, None) => Err(ApiError::local("IDLE", "Query has not been fetched")),
        }
    }
}

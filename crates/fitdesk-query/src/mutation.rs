//! Mutation bookkeeping
//!
//! Tracks, per mutation kind, whether a call is running and the error of the
//! last completed call, which is what a view needs for spinners and inline
//! error messages.

use crate::retry::with_retry;
use dashmap::DashMap;
use fitdesk_client::{ApiError, ApiResult};
use fitdesk_core::CacheConfig;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Observable state of one mutation kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationState {
    /// Calls currently running
    pub in_flight: usize,
    /// Error of the most recent completed call, cleared by a success
    pub error: Option<ApiError>,
    /// Completed calls, successful or not
    pub completed: u64,
}

impl MutationState {
    /// At least one call is running
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.in_flight > 0
    }
}

/// Pending and error state for named mutations
#[derive(Debug)]
pub struct MutationTracker {
    states: DashMap<String, MutationState>,
    retry: u32,
    retry_delay: Duration,
}

impl Default for MutationTracker {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

impl MutationTracker {
    /// Tracker using the configured mutation retry policy
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            states: DashMap::new(),
            retry: config.mutation_retry,
            retry_delay: config.retry_delay(),
        }
    }

    /// Run `operation` as mutation `kind`
    ///
    /// Retryable failures are retried per the configured policy before the
    /// error is recorded and returned.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt.
    pub async fn run<T, F, Fut>(&self, kind: &str, operation: F) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        {
            let mut state = self.states.entry(kind.to_string()).or_default();
            state.in_flight += 1;
            state.error = None;
        }
        debug!(mutation = %kind, "Mutation started");

        let token = CancellationToken::new();
        let result = with_retry(kind, self.retry, self.retry_delay, &token, operation).await;

        {
            let mut state = self.states.entry(kind.to_string()).or_default();
            state.in_flight = state.in_flight.saturating_sub(1);
            state.completed += 1;
            state.error = result.as_ref().err().cloned();
        }
        debug!(mutation = %kind, success = result.is_ok(), "Mutation finished");

        result
    }

    /// Snapshot of mutation `kind`
    #[must_use]
    pub fn state(&self, kind: &str) -> MutationState {
        self.states
            .get(kind)
            .map(|s| s.value().clone())
            .unwrap_or_default()
    }

    /// Whether mutation `kind` is running
    #[must_use]
    pub fn is_pending(&self, kind: &str) -> bool {
        self.states.get(kind).is_some_and(|s| s.is_pending())
    }

    /// Error of the last completed call of `kind`
    #[must_use]
    pub fn error(&self, kind: &str) -> Option<ApiError> {
        self.states.get(kind).and_then(|s| s.error.clone())
    }

    /// Forget the recorded error of `kind`
    pub fn reset(&self, kind: &str) {
        if let Some(mut state) = self.states.get_mut(kind) {
            state.error = None;
        }
    }
}

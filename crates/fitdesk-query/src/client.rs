//! Query cache with request de-duplication
//!
//! Each [`QueryKey`] maps to one entry holding the last good value, the last
//! error and at most one in-flight fetch. Concurrent reads of a key share
//! that fetch through a [`Shared`] future, so every observer receives the
//! same value or the same [`ApiError`]. When the last observer of a fetch
//! goes away before it resolves, the fetch's cancellation token fires and
//! the HTTP call is dropped.
//!
//! All state lives behind one mutex that is only held for synchronous
//! bookkeeping, never across an `.await`.

use crate::key::QueryKey;
use crate::options::{QueryOptions, QueryResult, QueryStatus};
use crate::retry::with_retry;
use fitdesk_client::{ApiError, ApiResult};
use fitdesk_core::CacheConfig;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

type FlightFuture = Shared<BoxFuture<'static, ApiResult<Value>>>;

struct Flight {
    id: u64,
    future: FlightFuture,
    token: CancellationToken,
    subscribers: usize,
}

struct Entry {
    data: Option<Value>,
    error: Option<ApiError>,
    updated_at: Option<Instant>,
    invalidated: bool,
    last_access: Instant,
    flight: Option<Flight>,
}

impl Entry {
    const fn new(now: Instant) -> Self {
        Self {
            data: None,
            error: None,
            updated_at: None,
            invalidated: false,
            last_access: now,
            flight: None,
        }
    }

    fn is_stale(&self, stale_time: Duration, now: Instant) -> bool {
        self.invalidated
            || self
                .updated_at
                .is_none_or(|at| now.duration_since(at) >= stale_time)
    }

    const fn status(&self) -> QueryStatus {
        if self.error.is_some() {
            QueryStatus::Error
        } else if self.data.is_some() {
            QueryStatus::Success
        } else if self.flight.is_some() {
            QueryStatus::Loading
        } else {
            QueryStatus::Idle
        }
    }
}

#[derive(Default)]
struct State {
    entries: HashMap<QueryKey, Entry>,
    next_flight_id: u64,
}

struct Inner {
    state: Mutex<State>,
    config: CacheConfig,
}

impl Inner {
    /// Record the outcome of flight `id`, unless it was detached meanwhile
    fn complete(&self, key: &QueryKey, id: u64, result: &ApiResult<Value>) {
        let mut state = self.state.lock();
        let Some(entry) = state.entries.get_mut(key) else {
            debug!(key = %key, "Entry removed while fetching, result discarded");
            return;
        };
        if entry.flight.as_ref().map(|f| f.id) != Some(id) {
            debug!(key = %key, "Fetch was superseded, result discarded");
            return;
        }

        let now = Instant::now();
        entry.flight = None;
        entry.last_access = now;
        match result {
            Ok(value) => {
                entry.data = Some(value.clone());
                entry.error = None;
                entry.updated_at = Some(now);
                entry.invalidated = false;
                trace!(key = %key, "Cache entry updated");
            }
            Err(e) if e.is_cancelled() => {}
            Err(e) => {
                warn!(key = %key, error = %e, "Query fetch failed");
                entry.error = Some(e.clone());
            }
        }
    }

    fn collect_garbage(&self) -> usize {
        let now = Instant::now();
        let gc_time = self.config.gc_time();
        let mut state = self.state.lock();
        let before = state.entries.len();
        state
            .entries
            .retain(|_, e| e.flight.is_some() || now.duration_since(e.last_access) < gc_time);
        before - state.entries.len()
    }
}

/// One observer's claim on an in-flight fetch
///
/// Dropping the last claim before the fetch resolves cancels it.
struct Subscription {
    inner: Weak<Inner>,
    key: QueryKey,
    id: u64,
    future: FlightFuture,
}

impl Subscription {
    async fn wait(self) -> ApiResult<Value> {
        self.future.clone().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let mut state = inner.state.lock();
        let Some(entry) = state.entries.get_mut(&self.key) else {
            return;
        };

        let abandoned = match entry.flight.as_mut() {
            Some(flight) if flight.id == self.id => {
                flight.subscribers = flight.subscribers.saturating_sub(1);
                flight.subscribers == 0 && self.future.peek().is_none()
            }
            _ => false,
        };

        if abandoned && let Some(flight) = entry.flight.take() {
            flight.token.cancel();
            debug!(key = %self.key, "Last observer left, fetch cancelled");
        }
    }
}

enum Lookup {
    Fresh(Value),
    Pending(Subscription),
}

enum Plan {
    Serve,
    Background(Subscription),
    Await(Subscription),
}

/// Shared cache of server reads
///
/// Cloning is cheap; clones share the same entries.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<Inner>,
}

impl fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryClient")
            .field("entries", &self.len())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

impl QueryClient {
    /// Create an empty cache
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                config: config.clone(),
            }),
        }
    }

    /// Cache configuration
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Query options derived from the configuration
    #[must_use]
    pub fn default_options(&self) -> QueryOptions {
        QueryOptions::from_config(&self.inner.config)
    }

    /// Number of cached entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    /// True when nothing is cached
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a fetch for `key` is in flight
    #[must_use]
    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.inner
            .state
            .lock()
            .entries
            .get(key)
            .is_some_and(|e| e.flight.is_some())
    }

    /// Fresh data for `key`, fetching when missing or stale
    ///
    /// Concurrent callers for one key share a single fetch. Dropping the
    /// returned future withdraws this caller; the fetch is cancelled once no
    /// caller is left.
    ///
    /// # Errors
    ///
    /// Returns the fetch error, shared by every caller of that fetch.
    pub async fn fetch_query<T, F, Fut>(
        &self,
        key: &QueryKey,
        options: &QueryOptions,
        fetcher: F,
    ) -> ApiResult<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        let lookup = {
            let mut state = self.inner.state.lock();
            let now = Instant::now();
            let entry = state
                .entries
                .entry(key.clone())
                .or_insert_with(|| Entry::new(now));
            entry.last_access = now;

            let fresh = if entry.is_stale(options.stale_time, now) {
                None
            } else {
                entry.data.clone()
            };
            match fresh {
                Some(data) => Lookup::Fresh(data),
                None => Lookup::Pending(self.subscribe(&mut state, key, options, fetcher)),
            }
        };

        match lookup {
            Lookup::Fresh(data) => {
                trace!(key = %key, "Serving fresh cache entry");
                decode(key, data)
            }
            Lookup::Pending(subscription) => decode(key, subscription.wait().await?),
        }
    }

    /// Observe `key` the way a view would
    ///
    /// Disabled queries return the current snapshot without fetching. Missing
    /// data is fetched and awaited. Stale data is returned at once while a
    /// background refresh runs.
    pub async fn query<T, F, Fut>(
        &self,
        key: &QueryKey,
        options: &QueryOptions,
        fetcher: F,
    ) -> QueryResult<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        if !options.enabled {
            trace!(key = %key, "Query disabled");
            return self.snapshot(key, options.stale_time);
        }

        let plan = {
            let mut state = self.inner.state.lock();
            let now = Instant::now();
            let entry = state
                .entries
                .entry(key.clone())
                .or_insert_with(|| Entry::new(now));
            entry.last_access = now;
            let has_data = entry.data.is_some();

            if !entry.is_stale(options.stale_time, now) {
                Plan::Serve
            } else if has_data {
                Plan::Background(self.subscribe(&mut state, key, options, fetcher))
            } else {
                Plan::Await(self.subscribe(&mut state, key, options, fetcher))
            }
        };

        match plan {
            Plan::Serve => self.snapshot(key, options.stale_time),
            Plan::Background(subscription) => {
                debug!(key = %key, "Serving stale data, refreshing in background");
                tokio::spawn(async move {
                    if let Err(e) = subscription.wait().await {
                        debug!(error = %e, "Background refresh failed");
                    }
                });
                self.snapshot(key, options.stale_time)
            }
            Plan::Await(subscription) => {
                let outcome = subscription.wait().await;
                let mut result = self.snapshot(key, options.stale_time);
                if result.data.is_none() && result.error.is_none() {
                    // The entry was detached or cleared mid-fetch; report what this
                    // observer saw.
                    match outcome.and_then(|value| decode(key, value)) {
                        Ok(data) => {
                            result.data = Some(data);
                            result.status = QueryStatus::Success;
                        }
                        Err(e) => {
                            result.error = Some(e);
                            result.status = QueryStatus::Error;
                        }
                    }
                }
                result
            }
        }
    }

    /// Snapshot of `key` using the configured staleness window
    #[must_use]
    pub fn query_state<T: DeserializeOwned>(&self, key: &QueryKey) -> QueryResult<T> {
        self.snapshot(key, self.inner.config.stale_time())
    }

    /// Cached data for `key`, fresh or not
    #[must_use]
    pub fn get_query_data<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        let data = self.inner.state.lock().entries.get(key)?.data.clone()?;
        serde_json::from_value(data).ok()
    }

    /// Seed `key` with `value` as fresh data
    ///
    /// A fetch already running for the key keeps serving its own observers
    /// but no longer writes to the cache.
    ///
    /// # Errors
    ///
    /// Returns a local error if `value` cannot be encoded as JSON.
    pub fn set_query_data<T: Serialize + ?Sized>(&self, key: &QueryKey, value: &T) -> ApiResult<()> {
        let value = serde_json::to_value(value).map_err(|e| {
            ApiError::local("ENCODE_ERROR", format!("Failed to encode cache value: {e}"))
        })?;

        let now = Instant::now();
        let mut state = self.inner.state.lock();
        let entry = state
            .entries
            .entry(key.clone())
            .or_insert_with(|| Entry::new(now));
        entry.data = Some(value);
        entry.error = None;
        entry.updated_at = Some(now);
        entry.invalidated = false;
        entry.last_access = now;
        entry.flight = None;
        trace!(key = %key, "Cache entry seeded");
        Ok(())
    }

    /// Mark every entry under `prefix` stale; returns how many matched
    ///
    /// Fetches already in flight for those keys are detached so a result
    /// that predates the invalidation is never stored as fresh.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut matched = 0;
        {
            let mut state = self.inner.state.lock();
            for (key, entry) in &mut state.entries {
                if prefix.is_prefix_of(key) {
                    entry.invalidated = true;
                    entry.flight = None;
                    matched += 1;
                }
            }
        }
        debug!(prefix = %prefix, matched, "Queries invalidated");
        matched
    }

    /// Drop every entry under `prefix`; returns how many were removed
    pub fn remove_queries(&self, prefix: &QueryKey) -> usize {
        let removed = {
            let mut state = self.inner.state.lock();
            let before = state.entries.len();
            state.entries.retain(|key, _| !prefix.is_prefix_of(key));
            before - state.entries.len()
        };
        debug!(prefix = %prefix, removed, "Queries removed");
        removed
    }

    /// Drop every entry
    pub fn clear(&self) {
        let removed = {
            let mut state = self.inner.state.lock();
            let removed = state.entries.len();
            state.entries.clear();
            removed
        };
        debug!(removed, "Query cache cleared");
    }

    /// Drop idle entries not touched within the garbage-collection horizon
    pub fn collect_garbage(&self) -> usize {
        let removed = self.inner.collect_garbage();
        if removed > 0 {
            debug!(removed, "Collected unused cache entries");
        }
        removed
    }

    /// Run [`Self::collect_garbage`] every `interval` until the cache is dropped
    #[must_use]
    pub fn spawn_gc(&self, interval: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    trace!("Query cache dropped, stopping janitor");
                    break;
                };
                let removed = inner.collect_garbage();
                if removed > 0 {
                    debug!(removed, "Collected unused cache entries");
                }
            }
        })
    }

    fn subscribe<T, F, Fut>(
        &self,
        state: &mut State,
        key: &QueryKey,
        options: &QueryOptions,
        fetcher: F,
    ) -> Subscription
    where
        T: Serialize + Send + 'static,
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        let now = Instant::now();
        let next_id = state.next_flight_id + 1;
        let entry = state
            .entries
            .entry(key.clone())
            .or_insert_with(|| Entry::new(now));

        if let Some(flight) = entry.flight.as_mut() {
            flight.subscribers += 1;
            trace!(key = %key, subscribers = flight.subscribers, "Joining in-flight fetch");
            return Subscription {
                inner: Arc::downgrade(&self.inner),
                key: key.clone(),
                id: flight.id,
                future: flight.future.clone(),
            };
        }

        let token = CancellationToken::new();
        let future = self.flight(key.clone(), next_id, options, token.clone(), fetcher);
        entry.flight = Some(Flight {
            id: next_id,
            future: future.clone(),
            token,
            subscribers: 1,
        });
        state.next_flight_id = next_id;
        debug!(key = %key, "Fetching");

        Subscription {
            inner: Arc::downgrade(&self.inner),
            key: key.clone(),
            id: next_id,
            future,
        }
    }

    fn flight<T, F, Fut>(
        &self,
        key: QueryKey,
        id: u64,
        options: &QueryOptions,
        token: CancellationToken,
        fetcher: F,
    ) -> FlightFuture
    where
        T: Serialize + Send + 'static,
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        let weak = Arc::downgrade(&self.inner);
        let retries = options.retry;
        let delay = options.retry_delay;

        async move {
            let label = key.to_string();
            let result = with_retry(&label, retries, delay, &token, || fetcher(token.clone()))
                .await
                .and_then(|data| {
                    serde_json::to_value(data).map_err(|e| {
                        ApiError::local("ENCODE_ERROR", format!("Failed to encode cache value: {e}"))
                    })
                });
            if let Some(inner) = weak.upgrade() {
                inner.complete(&key, id, &result);
            }
            result
        }
        .boxed()
        .shared()
    }

    fn snapshot<T: DeserializeOwned>(&self, key: &QueryKey, stale_time: Duration) -> QueryResult<T> {
        let (data, error, status, is_fetching, is_stale) = {
            let state = self.inner.state.lock();
            let Some(entry) = state.entries.get(key) else {
                return QueryResult::idle();
            };
            (
                entry.data.clone(),
                entry.error.clone(),
                entry.status(),
                entry.flight.is_some(),
                entry.is_stale(stale_time, Instant::now()),
            )
        };

        match data.map(|value| decode(key, value)).transpose() {
            Ok(data) => QueryResult {
                data,
                error,
                status,
                is_fetching,
                is_stale,
            },
            Err(e) => QueryResult {
                data: None,
                error: Some(e),
                status: QueryStatus::Error,
                is_fetching,
                is_stale,
            },
        }
    }
}

fn decode<T: DeserializeOwned>(key: &QueryKey, value: Value) -> ApiResult<T> {
    serde_json::from_value(value).map_err(|e| {
        warn!(key = %key, error = %e, "Cached value does not match requested type");
        ApiError::decode(&e)
    })
}

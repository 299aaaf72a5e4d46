//! Authenticated HTTP gateway
//!
//! Single choke point for all server communication. Every request reads the
//! current access token from the credential store at send time, every
//! failure is normalized into an [`ApiError`], and an unauthorized answer
//! triggers the session recovery selected by [`UnauthorizedPolicy`].

use crate::error::{ApiError, ApiResult};
use crate::navigator::Navigator;
use crate::request::ApiRequest;
use fitdesk_core::{ApiConfig, RefreshTokenRequest, RefreshTokenResponse, UnauthorizedPolicy};
use fitdesk_storage::CredentialStore;
use http::StatusCode;
use http::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcome of handling an unauthorized answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recovery {
    Replay,
    GiveUp,
}

struct Inner {
    http: Client,
    base_url: String,
    config: ApiConfig,
    store: CredentialStore,
    navigator: Arc<dyn Navigator>,
    /// Serializes refresh exchanges; refresh tokens may be single-use
    refresh_gate: tokio::sync::Mutex<()>,
}

/// Authenticated API client
///
/// Cloning is cheap; clones share the HTTP connection pool, the credential
/// store and the navigator.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
    cancel: Option<CancellationToken>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url)
            .field("timeout_secs", &self.inner.config.timeout_secs)
            .field("unauthorized_policy", &self.inner.config.unauthorized_policy)
            .field("cancellable", &self.cancel.is_some())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client for the configured API
    ///
    /// # Errors
    ///
    /// Returns a local error if the HTTP client cannot be constructed.
    pub fn new(
        config: &ApiConfig,
        store: CredentialStore,
        navigator: Arc<dyn Navigator>,
    ) -> ApiResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .user_agent(concat!("fitdesk/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ApiError::local("CLIENT_INIT", format!("Failed to build HTTP client: {e}"))
            })?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        info!(base_url = %base_url, timeout_secs = config.timeout_secs, "API client ready");

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url,
                config: config.clone(),
                store,
                navigator,
                refresh_gate: tokio::sync::Mutex::new(()),
            }),
            cancel: None,
        })
    }

    /// Clone of this client whose requests are abandoned when `token` fires
    #[must_use]
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            cancel: Some(token),
        }
    }

    /// Credential store the client reads tokens from
    #[must_use]
    pub fn store(&self) -> &CredentialStore {
        &self.inner.store
    }

    /// Base URL without trailing slash
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Gateway configuration
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// GET `path` and decode the body as `T`
    ///
    /// # Errors
    ///
    /// Returns the normalized error for any failure.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.execute(ApiRequest::get(path)).await
    }

    /// GET `path` with query-string pairs
    ///
    /// # Errors
    ///
    /// Returns the normalized error for any failure.
    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(String, String)>,
    ) -> ApiResult<T> {
        self.execute(ApiRequest::get(path).query(query)).await
    }

    /// POST a JSON body to `path`
    ///
    /// # Errors
    ///
    /// Returns the normalized error for any failure.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        self.execute(ApiRequest::post(path).json(body)?).await
    }

    /// POST to `path` without a body
    ///
    /// # Errors
    ///
    /// Returns the normalized error for any failure.
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.execute(ApiRequest::post(path)).await
    }

    /// PUT a JSON body to `path`
    ///
    /// # Errors
    ///
    /// Returns the normalized error for any failure.
    pub async fn put<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        self.execute(ApiRequest::put(path).json(body)?).await
    }

    /// DELETE `path`
    ///
    /// # Errors
    ///
    /// Returns the normalized error for any failure.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.execute(ApiRequest::delete(path)).await
    }

    /// Send `request`, applying unauthorized recovery, and decode the body
    ///
    /// A 401 answer runs the recovery at most once per request: with
    /// [`UnauthorizedPolicy::RefreshThenRedirect`] one refresh-and-replay is
    /// attempted first; otherwise, or when that fails, the session is cleared
    /// and the navigator redirected before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns the normalized error for any failure, including cancellation.
    pub async fn execute<T: DeserializeOwned>(&self, mut request: ApiRequest) -> ApiResult<T> {
        loop {
            let (status, body) = self.send_once(&mut request).await?;

            if status == StatusCode::UNAUTHORIZED
                && !request.recovery.disabled
                && self.recover_unauthorized(&mut request).await == Recovery::Replay
            {
                continue;
            }

            return finish(&request, status, &body);
        }
    }

    /// Exchange the stored refresh token for a new access token
    ///
    /// The new tokens are persisted before returning. The exchange itself is
    /// never subject to unauthorized recovery, and only one exchange runs at
    /// a time per client.
    ///
    /// # Errors
    ///
    /// Returns a local `NO_REFRESH_TOKEN` error without any network call when
    /// no refresh token is stored, otherwise the normalized exchange error.
    pub async fn refresh_access_token(&self) -> ApiResult<RefreshTokenResponse> {
        let _gate = self.inner.refresh_gate.lock().await;
        self.exchange_refresh_token().await
    }

    async fn exchange_refresh_token(&self) -> ApiResult<RefreshTokenResponse> {
        let Some(refresh_token) = self.inner.store.refresh_token() else {
            debug!("No refresh token stored, skipping exchange");
            return Err(ApiError::no_refresh_token());
        };

        let mut request = ApiRequest::post(self.inner.config.refresh_path.as_str())
            .json(&RefreshTokenRequest { refresh_token })?
            .without_recovery();
        let (status, body) = self.send_once(&mut request).await?;
        let response: RefreshTokenResponse = finish(&request, status, &body)?;

        let store = &self.inner.store;
        store
            .set_access_token(&response.token)
            .map_err(|e| ApiError::storage(&e))?;
        if let Some(rotated) = &response.refresh_token {
            store
                .set_refresh_token(rotated)
                .map_err(|e| ApiError::storage(&e))?;
        }

        info!("Access token refreshed");
        Ok(response)
    }

    /// Whether another request stored a new access token after `request` was sent
    fn token_replaced_since(&self, request: &ApiRequest) -> bool {
        self.inner
            .store
            .access_token()
            .is_some_and(|current| request.bearer.as_deref() != Some(current.as_str()))
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.inner.base_url)
        } else {
            format!("{}/{path}", self.inner.base_url)
        }
    }

    /// One transmission: attach the current credential, send, read the body
    async fn send_once(&self, request: &mut ApiRequest) -> ApiResult<(StatusCode, Vec<u8>)> {
        if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(ApiError::cancelled());
        }

        request.bearer = self.inner.store.access_token();

        let mut builder = self
            .inner
            .http
            .request(request.method.clone(), self.url(&request.path));
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(
            method = %request.method,
            path = %request.path,
            authenticated = request.bearer.is_some(),
            "Sending request"
        );

        let exchange = async move {
            let response = builder.send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, body.to_vec()))
        };

        let result = match &self.cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    () = token.cancelled() => {
                        debug!(method = %request.method, path = %request.path, "Request cancelled");
                        return Err(ApiError::cancelled());
                    }
                    result = exchange => result,
                }
            }
            None => exchange.await,
        };

        result.map_err(|e| {
            let error = ApiError::from_transport(&e);
            warn!(
                method = %request.method,
                path = %request.path,
                timeout = e.is_timeout(),
                error = %error,
                "Request failed before a response was received"
            );
            error
        })
    }

    async fn recover_unauthorized(&self, request: &mut ApiRequest) -> Recovery {
        if request.recovery.retried {
            debug!(path = %request.path, "Unauthorized recovery already ran for this request");
            return Recovery::GiveUp;
        }

        if self.inner.config.unauthorized_policy == UnauthorizedPolicy::RefreshThenRedirect
            && !request.recovery.refreshed
        {
            request.recovery.refreshed = true;
            if let Some(recovery) = self.refresh_for(request).await {
                return recovery;
            }
        }

        request.recovery.retried = true;
        self.force_logout(request);
        Recovery::GiveUp
    }

    /// Refresh once on behalf of `request`; `None` means fall back to logout
    ///
    /// A request that waited behind another request's exchange sees the
    /// token that exchange stored and replays with it instead of spending
    /// the refresh token again.
    async fn refresh_for(&self, request: &ApiRequest) -> Option<Recovery> {
        let _gate = self.inner.refresh_gate.lock().await;
        if self.token_replaced_since(request) {
            debug!(path = %request.path, "Access token replaced meanwhile, replaying");
            return Some(Recovery::Replay);
        }
        match self.exchange_refresh_token().await {
            Ok(_) => {
                debug!(path = %request.path, "Replaying request with refreshed token");
                Some(Recovery::Replay)
            }
            Err(e) if e.is_cancelled() => Some(Recovery::GiveUp),
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                None
            }
        }
    }

    fn force_logout(&self, request: &ApiRequest) {
        warn!(
            method = %request.method,
            path = %request.path,
            "Unauthorized response, clearing stored session"
        );
        if let Err(e) = self.inner.store.clear_session() {
            error!(error = %e, "Failed to clear stored session");
        }
        self.inner
            .navigator
            .redirect_to_login(&self.inner.config.login_path);
    }
}

/// Decode a success body or normalize an error answer
fn finish<T: DeserializeOwned>(request: &ApiRequest, status: StatusCode, body: &[u8]) -> ApiResult<T> {
    if !status.is_success() {
        let error = ApiError::from_response(status.as_u16(), body);
        debug!(
            method = %request.method,
            path = %request.path,
            status = status.as_u16(),
            code = error.code.as_deref().unwrap_or(""),
            "Server returned an error"
        );
        return Err(error);
    }

    let decoded = if body.iter().all(u8::is_ascii_whitespace) {
        serde_json::from_value(Value::Null)
    } else {
        serde_json::from_slice(body)
    };

    decoded.map_err(|e| {
        warn!(path = %request.path, error = %e, "Response body did not match expected shape");
        ApiError::decode(&e)
    })
}

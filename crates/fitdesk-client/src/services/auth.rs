//! Authentication endpoints and local session bookkeeping

use crate::error::{ApiError, ApiResult};
use crate::gateway::ApiClient;
use fitdesk_core::{AuthResponse, LoginCredentials, RefreshTokenResponse, RegisterData, User};
use fitdesk_storage::CredentialStore;
use serde::de::IgnoredAny;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const LOGIN_PATH: &str = "/auth/login";
const LOGOUT_PATH: &str = "/auth/logout";
const REGISTER_PATH: &str = "/auth/register";
const CURRENT_USER_PATH: &str = "/auth/me";

/// Login, logout, registration and current-user lookups
#[derive(Debug, Clone)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    /// Create a service on top of `client`
    #[must_use]
    pub const fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Clone whose requests are abandoned when `token` fires
    #[must_use]
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            client: self.client.with_cancellation(token),
        }
    }

    fn store(&self) -> &CredentialStore {
        self.client.store()
    }

    /// Authenticate and persist the returned tokens and user
    ///
    /// # Errors
    ///
    /// Returns the server's error for rejected credentials, or a storage
    /// error if the new session could not be persisted. Nothing is stored on
    /// failure.
    pub async fn login(&self, credentials: &LoginCredentials) -> ApiResult<AuthResponse> {
        let response: AuthResponse = self.client.post(LOGIN_PATH, credentials).await?;

        let store = self.store();
        store
            .set_access_token(&response.token)
            .map_err(|e| ApiError::storage(&e))?;
        store
            .set_refresh_token(&response.refresh_token)
            .map_err(|e| ApiError::storage(&e))?;
        store
            .set_cached_user(&response.user)
            .map_err(|e| ApiError::storage(&e))?;

        info!(user_id = %response.user.id, "Logged in");
        Ok(response)
    }

    /// End the session
    ///
    /// The server is notified on a best-effort basis; local credentials are
    /// cleared whatever the outcome, so this never fails.
    pub async fn logout(&self) {
        if let Err(e) = self.client.post_empty::<IgnoredAny>(LOGOUT_PATH).await {
            warn!(error = %e, "Logout request failed, clearing local session anyway");
        }

        if let Err(e) = self.store().clear_all() {
            error!(error = %e, "Failed to clear stored credentials");
        }
        info!("Logged out");
    }

    /// Create an account; does not log in
    ///
    /// # Errors
    ///
    /// Returns the normalized error on failure.
    pub async fn register(&self, data: &RegisterData) -> ApiResult<User> {
        let user: User = self.client.post(REGISTER_PATH, data).await?;
        info!(user_id = %user.id, "Account registered");
        Ok(user)
    }

    /// Exchange the stored refresh token for a new access token
    ///
    /// # Errors
    ///
    /// Returns a local `NO_REFRESH_TOKEN` error without contacting the server
    /// when no refresh token is stored.
    pub async fn refresh_access_token(&self) -> ApiResult<RefreshTokenResponse> {
        self.client.refresh_access_token().await
    }

    /// Fetch the authenticated user and refresh the cached copy
    ///
    /// # Errors
    ///
    /// Returns the normalized error on failure.
    pub async fn current_user(&self) -> ApiResult<User> {
        let user: User = self.client.get(CURRENT_USER_PATH).await?;
        if let Err(e) = self.store().set_cached_user(&user) {
            warn!(error = %e, "Failed to cache current user");
        }
        Ok(user)
    }

    /// Whether an access token is stored
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.store().access_token().is_some()
    }

    /// Cached user snapshot, without a network call
    #[must_use]
    pub fn cached_user(&self) -> Option<User> {
        self.store().cached_user()
    }
}

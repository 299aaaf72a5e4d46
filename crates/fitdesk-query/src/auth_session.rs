//! Authentication state bound to the query cache

use crate::client::QueryClient;
use crate::key::keys;
use crate::mutation::MutationTracker;
use crate::options::QueryResult;
use fitdesk_client::{ApiError, ApiResult, AuthService};
use fitdesk_core::{AuthResponse, LoginCredentials, RefreshTokenResponse, RegisterData, User};
use tracing::{debug, warn};

/// Mutation kind for [`AuthSession::login`]
pub const LOGIN: &str = "login";
/// Mutation kind for [`AuthSession::logout`]
pub const LOGOUT: &str = "logout";
/// Mutation kind for [`AuthSession::register`]
pub const REGISTER: &str = "register";
/// Mutation kind for [`AuthSession::refresh`]
pub const REFRESH: &str = "refresh";

/// Current-user query plus the login, logout and registration mutations
#[derive(Debug)]
pub struct AuthSession {
    auth: AuthService,
    cache: QueryClient,
    mutations: MutationTracker,
}

impl AuthSession {
    /// Bind `auth` to `cache`
    #[must_use]
    pub fn new(auth: AuthService, cache: QueryClient) -> Self {
        let mutations = MutationTracker::new(cache.config());
        Self {
            auth,
            cache,
            mutations,
        }
    }

    /// The authenticated user
    ///
    /// Only runs when an access token is stored; without one the result is
    /// idle and no request is made. Failures are not retried.
    pub async fn current_user(&self) -> QueryResult<User> {
        let options = self
            .cache
            .default_options()
            .enabled(self.auth.has_token())
            .retry(0);
        let auth = self.auth.clone();
        self.cache
            .query(&keys::current_user(), &options, move |token| {
                let auth = auth.with_cancellation(token);
                async move { auth.current_user().await }
            })
            .await
    }

    /// Cached current user, without fetching
    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.cache.get_query_data(&keys::current_user())
    }

    /// A token is stored and the current user is known
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.auth.has_token() && self.user().is_some()
    }

    /// Log in, then seed and invalidate the current-user query
    ///
    /// # Errors
    ///
    /// Returns the login error; it is also kept in [`Self::login_error`].
    pub async fn login(&self, credentials: &LoginCredentials) -> ApiResult<AuthResponse> {
        let response = self
            .mutations
            .run(LOGIN, || self.auth.login(credentials))
            .await?;

        let key = keys::current_user();
        if let Err(e) = self.cache.set_query_data(&key, &response.user) {
            warn!(error = %e, "Failed to seed current user");
        }
        self.cache.invalidate(&key);
        Ok(response)
    }

    /// Log out and drop every cached query
    pub async fn logout(&self) {
        let outcome = self
            .mutations
            .run(LOGOUT, || async {
                self.auth.logout().await;
                Ok(())
            })
            .await;
        if outcome.is_ok() {
            debug!("Session ended");
        }
        self.cache.clear();
    }

    /// Create an account
    ///
    /// # Errors
    ///
    /// Returns the registration error; it is also kept in
    /// [`Self::register_error`].
    pub async fn register(&self, data: &RegisterData) -> ApiResult<User> {
        self.mutations
            .run(REGISTER, || self.auth.register(data))
            .await
    }

    /// Exchange the refresh token and invalidate the current user
    ///
    /// # Errors
    ///
    /// Returns the refresh error, e.g. `NO_REFRESH_TOKEN`.
    pub async fn refresh(&self) -> ApiResult<RefreshTokenResponse> {
        let response = self
            .mutations
            .run(REFRESH, || self.auth.refresh_access_token())
            .await?;
        self.cache.invalidate(&keys::current_user());
        Ok(response)
    }

    /// Login in progress
    #[must_use]
    pub fn is_logging_in(&self) -> bool {
        self.mutations.is_pending(LOGIN)
    }

    /// Logout in progress
    #[must_use]
    pub fn is_logging_out(&self) -> bool {
        self.mutations.is_pending(LOGOUT)
    }

    /// Registration in progress
    #[must_use]
    pub fn is_registering(&self) -> bool {
        self.mutations.is_pending(REGISTER)
    }

    /// Error of the last login attempt
    #[must_use]
    pub fn login_error(&self) -> Option<ApiError> {
        self.mutations.error(LOGIN)
    }

    /// Error of the last registration attempt
    #[must_use]
    pub fn register_error(&self) -> Option<ApiError> {
        self.mutations.error(REGISTER)
    }

    /// Underlying service
    #[must_use]
    pub const fn service(&self) -> &AuthService {
        &self.auth
    }

    /// Underlying cache
    #[must_use]
    pub const fn cache(&self) -> &QueryClient {
        &self.cache
    }
}

//! Wiring of store, gateway, cache and bindings for one CLI invocation

use anyhow::{Context as _, Result};
use fitdesk_client::{ApiClient, AuthService, Navigator, UserService};
use fitdesk_core::Config;
use fitdesk_query::{AuthSession, QueryClient, UserQueries};
use fitdesk_storage::CredentialStore;
use std::sync::Arc;
use tracing::warn;

/// Navigator for a terminal: there is no page to leave, so tell the user
#[derive(Debug, Default, Clone, Copy)]
pub struct CliNavigator;

impl Navigator for CliNavigator {
    fn redirect_to_login(&self, location: &str) {
        warn!(location = %location, "Session ended by the server");
        eprintln!("Your session has ended. Run `fitdesk login` to sign in again.");
    }
}

/// Everything a command needs
#[derive(Debug)]
pub struct AppContext {
    /// Resolved configuration
    pub config: Config,
    /// Credential store
    pub store: CredentialStore,
    /// Shared query cache
    pub cache: QueryClient,
    /// Current-user query and auth mutations
    pub session: AuthSession,
    /// User queries and mutations
    pub users: UserQueries,
}

impl AppContext {
    /// Build the context with the terminal navigator
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        let store = CredentialStore::open(&config.storage);
        Self::with_parts(config, store, Arc::new(CliNavigator))
    }

    /// Build the context from explicit parts
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_parts(
        config: Config,
        store: CredentialStore,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        let client = ApiClient::new(&config.api, store.clone(), navigator)
            .context("Failed to create API client")?;
        let cache = QueryClient::new(&config.cache);
        let session = AuthSession::new(AuthService::new(client.clone()), cache.clone());
        let users = UserQueries::new(UserService::new(client), cache.clone());

        Ok(Self {
            config,
            store,
            cache,
            session,
            users,
        })
    }
}

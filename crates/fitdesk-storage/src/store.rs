//! Credential store: access token, refresh token, cached user and preferences

use crate::backend::{FileBackend, MemoryBackend, StorageBackend};
use crate::error::StorageResult;
use fitdesk_core::{StorageBackendKind, StorageConfig, User};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

/// Slot holding the access token
pub const ACCESS_TOKEN_KEY: &str = "auth_token";

/// Slot holding the serialized user snapshot
pub const USER_KEY: &str = "user_data";

/// Slot holding the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Slot holding the theme preference
pub const THEME_KEY: &str = "app_theme";

/// Theme returned when none is stored
pub const DEFAULT_THEME: &str = "light";

/// Namespace for generic preference keys
pub const PREFERENCE_PREFIX: &str = "pref.";

const OWNED_KEYS: [&str; 4] = [ACCESS_TOKEN_KEY, USER_KEY, REFRESH_TOKEN_KEY, THEME_KEY];
const SESSION_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY];

/// Client-side authentication state plus a few preferences
///
/// Cloning is cheap and every clone shares the same backend. Reads are
/// forgiving (absent on any problem), writes report failures.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    backend: Arc<dyn StorageBackend>,
}

impl CredentialStore {
    /// Wrap an existing backend
    pub fn new(backend: impl StorageBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Share a backend that other code also holds
    #[must_use]
    pub fn with_backend(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Store that lives only as long as the process
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Store backed by the configured backend
    #[must_use]
    pub fn open(config: &StorageConfig) -> Self {
        match config.backend {
            StorageBackendKind::Memory => Self::in_memory(),
            StorageBackendKind::File => {
                let path = config.resolved_path();
                debug!(path = %path.display(), "Opening credential store");
                Self::new(FileBackend::new(path))
            }
        }
    }

    /// Underlying backend
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    // Token management

    /// Store the access token
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    pub fn set_access_token(&self, token: &str) -> StorageResult<()> {
        self.backend.set_item(ACCESS_TOKEN_KEY, token)
    }

    /// Current access token
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.token(ACCESS_TOKEN_KEY)
    }

    /// Remove the access token
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    pub fn clear_access_token(&self) -> StorageResult<()> {
        self.backend.remove_item(ACCESS_TOKEN_KEY)
    }

    /// Store the refresh token
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    pub fn set_refresh_token(&self, token: &str) -> StorageResult<()> {
        self.backend.set_item(REFRESH_TOKEN_KEY, token)
    }

    /// Current refresh token
    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.token(REFRESH_TOKEN_KEY)
    }

    /// Remove the refresh token
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    pub fn clear_refresh_token(&self) -> StorageResult<()> {
        self.backend.remove_item(REFRESH_TOKEN_KEY)
    }

    fn token(&self, key: &str) -> Option<String> {
        self.backend.get_item(key).filter(|t| !t.is_empty())
    }

    // User snapshot

    /// Cache the user snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the user cannot be encoded or the write fails.
    pub fn set_cached_user(&self, user: &User) -> StorageResult<()> {
        let encoded = serde_json::to_string(user)?;
        self.backend.set_item(USER_KEY, &encoded)
    }

    /// Cached user snapshot, `None` when absent or malformed
    #[must_use]
    pub fn cached_user(&self) -> Option<User> {
        let raw = self.backend.get_item(USER_KEY)?;
        if raw.is_empty() {
            return None;
        }

        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "Error parsing cached user data");
                None
            }
        }
    }

    /// Remove the user snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    pub fn clear_cached_user(&self) -> StorageResult<()> {
        self.backend.remove_item(USER_KEY)
    }

    // Theme

    /// Store the theme preference
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    pub fn set_theme(&self, theme: &str) -> StorageResult<()> {
        self.backend.set_item(THEME_KEY, theme)
    }

    /// Theme preference, `"light"` when unset
    #[must_use]
    pub fn theme(&self) -> String {
        self.backend
            .get_item(THEME_KEY)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_THEME.to_string())
    }

    // Bulk clearing

    /// Remove access token, refresh token and cached user
    ///
    /// Every key is attempted even if an earlier removal fails; the first
    /// failure is returned.
    ///
    /// # Errors
    ///
    /// Returns the first backend failure.
    pub fn clear_session(&self) -> StorageResult<()> {
        self.remove_all(&SESSION_KEYS)
    }

    /// Remove every named slot this store owns
    ///
    /// # Errors
    ///
    /// Returns the first backend failure.
    pub fn clear_all(&self) -> StorageResult<()> {
        self.remove_all(&OWNED_KEYS)
    }

    fn remove_all(&self, keys: &[&str]) -> StorageResult<()> {
        let mut first_error = None;
        for key in keys {
            if let Err(e) = self.backend.remove_item(key) {
                warn!(key, error = %e, "Failed to clear storage slot");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    // Generic preferences

    /// Store any serializable value under a preference key
    ///
    /// Preference keys live in their own namespace and cannot overwrite the
    /// authentication slots.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded or the write fails.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StorageResult<()> {
        let encoded = serde_json::to_string(value)?;
        self.backend.set_item(&preference_key(key), &encoded)
    }

    /// Read a preference, `None` when absent or not decodable as `T`
    ///
    /// A stored value that is not JSON is offered to `T` as a plain string.
    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.backend.get_item(&preference_key(key))?;
        if raw.is_empty() {
            return None;
        }

        serde_json::from_str(&raw)
            .or_else(|_| serde_json::from_value(serde_json::Value::String(raw)))
            .map_err(|e| debug!(key, error = %e, "Preference not decodable"))
            .ok()
    }

    /// Remove a preference
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    pub fn remove(&self, key: &str) -> StorageResult<()> {
        self.backend.remove_item(&preference_key(key))
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

fn preference_key(key: &str) -> String {
    format!("{PREFERENCE_PREFIX}{key}")
}

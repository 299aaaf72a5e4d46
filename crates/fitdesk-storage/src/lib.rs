//! Durable client-side credential storage for `FitDesk`
//!
//! Holds the access token, refresh token, cached user snapshot and theme
//! preference in a key-value backend that survives process restarts, plus a
//! separate namespace for arbitrary preferences.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod backend;
pub mod error;
pub mod store;

pub use backend::{FileBackend, MemoryBackend, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use store::{
    ACCESS_TOKEN_KEY, CredentialStore, DEFAULT_THEME, REFRESH_TOKEN_KEY, THEME_KEY, USER_KEY,
};

//! Authenticated API client for the `FitDesk` admin console
//!
//! [`ApiClient`] is the single gateway to the server: it attaches the stored
//! bearer token, normalizes failures into [`ApiError`] and performs the
//! forced-logout recovery on unauthorized answers. [`AuthService`] and
//! [`UserService`] are thin typed wrappers over it.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod error;
pub mod gateway;
pub mod navigator;
pub mod request;
pub mod services;

pub use error::{ApiError, ApiResult, ErrorClass, ErrorDetails};
pub use gateway::ApiClient;
pub use navigator::{LogNavigator, Navigator, RecordingNavigator};
pub use request::ApiRequest;
pub use services::{AuthService, UserService};

pub use tokio_util::sync::CancellationToken;

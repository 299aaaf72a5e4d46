//! Query and mutation cache for the `FitDesk` admin console
//!
//! [`QueryClient`] caches server reads by [`QueryKey`], shares one in-flight
//! fetch between concurrent readers, serves data for a staleness window and
//! refetches after invalidation. [`AuthSession`] and [`UserQueries`] bind the
//! auth and user services to it the way the console's views consume them.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod auth_session;
pub mod client;
pub mod key;
pub mod mutation;
pub mod options;
mod retry;
pub mod users;

pub use auth_session::AuthSession;
pub use client::QueryClient;
pub use key::{QueryKey, keys};
pub use mutation::{MutationState, MutationTracker};
pub use options::{QueryOptions, QueryResult, QueryStatus};
pub use users::UserQueries;

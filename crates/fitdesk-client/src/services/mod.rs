//! Typed wrappers over the gateway, one per API resource

pub mod auth;
pub mod users;

pub use auth::AuthService;
pub use users::UserService;

//! User management endpoints

use crate::error::ApiResult;
use crate::gateway::ApiClient;
use fitdesk_core::{CreateUserData, PaginatedResponse, QueryParams, UpdateUserData, User};
use serde::de::IgnoredAny;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const USERS_PATH: &str = "/users";

fn user_path(id: &str) -> String {
    format!("{USERS_PATH}/{}", urlencoding::encode(id))
}

/// CRUD over `/users`
#[derive(Debug, Clone)]
pub struct UserService {
    client: ApiClient,
}

impl UserService {
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

    /// One page of users
    ///
    /// Only the parameters that are set are sent.
    ///
    /// # Errors
    ///
    /// Returns the normalized error on failure.
    pub async fn list(&self, params: &QueryParams) -> ApiResult<PaginatedResponse<User>> {
        let page: PaginatedResponse<User> = self
            .client
            .get_with_query(USERS_PATH, params.to_query_pairs())
            .await?;
        debug!(
            returned = page.data.len(),
            total = page.pagination.total,
            "Fetched user page"
        );
        Ok(page)
    }

    /// A single user
    ///
    /// # Errors
    ///
    /// Returns the normalized error on failure, e.g. a 404 for unknown ids.
    pub async fn get(&self, id: &str) -> ApiResult<User> {
        self.client.get(&user_path(id)).await
    }

    /// Create a user
    ///
    /// # Errors
    ///
    /// Returns the normalized error on failure.
    pub async fn create(&self, data: &CreateUserData) -> ApiResult<User> {
        self.client.post(USERS_PATH, data).await
    }

    /// Apply a partial update
    ///
    /// # Errors
    ///
    /// Returns the normalized error on failure.
    pub async fn update(&self, id: &str, data: &UpdateUserData) -> ApiResult<User> {
        self.client.put(&user_path(id), data).await
    }

    /// Delete a user
    ///
    /// # Errors
    ///
    /// Returns the normalized error on failure.
    pub async fn delete(&self, id: &str) -> ApiResult<()> {
        self.client.delete::<IgnoredAny>(&user_path(id)).await?;
        Ok(())
    }
}

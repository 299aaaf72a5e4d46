//! User list and detail queries with invalidating mutations

use crate::client::QueryClient;
use crate::key::keys;
use crate::mutation::MutationTracker;
use crate::options::QueryResult;
use fitdesk_client::{ApiError, ApiResult, UserService};
use fitdesk_core::{CreateUserData, PaginatedResponse, QueryParams, UpdateUserData, User};

/// Mutation kind for [`UserQueries::create_user`]
pub const CREATE_USER: &str = "create_user";
/// Mutation kind for [`UserQueries::update_user`]
pub const UPDATE_USER: &str = "update_user";
/// Mutation kind for [`UserQueries::delete_user`]
pub const DELETE_USER: &str = "delete_user";

/// Cached user reads and the mutations that invalidate them
#[derive(Debug)]
pub struct UserQueries {
    users: UserService,
    cache: QueryClient,
    mutations: MutationTracker,
}

impl UserQueries {
    /// Bind `users` to `cache`
    #[must_use]
    pub fn new(users: UserService, cache: QueryClient) -> Self {
        let mutations = MutationTracker::new(cache.config());
        Self {
            users,
            cache,
            mutations,
        }
    }

    /// One page of users, keyed by `params`
    pub async fn users(&self, params: &QueryParams) -> QueryResult<PaginatedResponse<User>> {
        let service = self.users.clone();
        let owned = params.clone();
        self.cache
            .query(
                &keys::users_list(params),
                &self.cache.default_options(),
                move |token| {
                    let service = service.with_cancellation(token);
                    let params = owned.clone();
                    async move { service.list(&params).await }
                },
            )
            .await
    }

    /// A single user; idle for an empty id
    pub async fn user(&self, id: &str) -> QueryResult<User> {
        let options = self.cache.default_options().enabled(!id.is_empty());
        let service = self.users.clone();
        let owned = id.to_string();
        self.cache
            .query(&keys::user(id), &options, move |token| {
                let service = service.with_cancellation(token);
                let id = owned.clone();
                async move { service.get(&id).await }
            })
            .await
    }

    /// Create a user and invalidate every user list
    ///
    /// # Errors
    ///
    /// Returns the creation error.
    pub async fn create_user(&self, data: &CreateUserData) -> ApiResult<User> {
        let user = self
            .mutations
            .run(CREATE_USER, || self.users.create(data))
            .await?;
        self.cache.invalidate(&keys::users());
        Ok(user)
    }

    /// Update a user and invalidate the lists and that user's entry
    ///
    /// # Errors
    ///
    /// Returns the update error.
    pub async fn update_user(&self, id: &str, data: &UpdateUserData) -> ApiResult<User> {
        let user = self
            .mutations
            .run(UPDATE_USER, || self.users.update(id, data))
            .await?;
        self.cache.invalidate(&keys::users());
        self.cache.invalidate(&keys::user(id));
        Ok(user)
    }

    /// Delete a user and invalidate the lists and that user's entry
    ///
    /// # Errors
    ///
    /// Returns the deletion error.
    pub async fn delete_user(&self, id: &str) -> ApiResult<()> {
        self.mutations
            .run(DELETE_USER, || self.users.delete(id))
            .await?;
        self.cache.invalidate(&keys::users());
        self.cache.invalidate(&keys::user(id));
        Ok(())
    }

    /// Creation in progress
    #[must_use]
    pub fn is_creating(&self) -> bool {
        self.mutations.is_pending(CREATE_USER)
    }

    /// Update in progress
    #[must_use]
    pub fn is_updating(&self) -> bool {
        self.mutations.is_pending(UPDATE_USER)
    }

    /// Deletion in progress
    #[must_use]
    pub fn is_deleting(&self) -> bool {
        self.mutations.is_pending(DELETE_USER)
    }

    /// Error of the last creation attempt
    #[must_use]
    pub fn create_error(&self) -> Option<ApiError> {
        self.mutations.error(CREATE_USER)
    }

    /// Error of the last update attempt
    #[must_use]
    pub fn update_error(&self) -> Option<ApiError> {
        self.mutations.error(UPDATE_USER)
    }

    /// Error of the last deletion attempt
    #[must_use]
    pub fn delete_error(&self) -> Option<ApiError> {
        self.mutations.error(DELETE_USER)
    }

    /// Underlying cache
    #[must_use]
    pub const fn cache(&self) -> &QueryClient {
        &self.cache
    }
}

//! # bossoidc-store - Local Identity Storage
//!
//! Storage abstraction for local users and their links to identity provider
//! subjects. Each operation is atomic; the username and subject unique
//! constraints are enforced by the backend and reported as
//! [`StoreError::Conflict`].

use async_trait::async_trait;

pub mod memory;
pub mod types;

pub use memory::{DEFAULT_MAX_USERNAME_LENGTH, MemoryUserStore};
pub use types::{ExternalIdentityLink, LocalUser, NewLocalUser, StoreError, StoreResult};

/// The abstract user store interface
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Maximum username length (in characters) accepted by the store
    fn max_username_length(&self) -> usize;

    /// Get a user by primary key
    async fn get_user(&self, id: i64) -> StoreResult<Option<LocalUser>>;

    /// Get a user by its unique username
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<LocalUser>>;

    /// Create an unlinked user; `Conflict` if the username is taken
    async fn create_user(&self, user: NewLocalUser) -> StoreResult<LocalUser>;

    /// Persist an existing user; `NotFound` if it was deleted meanwhile
    async fn save_user(&self, user: &LocalUser) -> StoreResult<LocalUser>;

    /// Delete a user together with its permissions and identity link
    async fn delete_user(&self, id: i64) -> StoreResult<()>;

    /// Get the link for an identity provider subject
    async fn find_link_by_subject(&self, subject: &str)
        -> StoreResult<Option<ExternalIdentityLink>>;

    /// Get the link owned by a user
    async fn find_link_by_user(&self, user_id: i64) -> StoreResult<Option<ExternalIdentityLink>>;

    /// Create a user already linked to `subject`, atomically
    ///
    /// `Conflict` if the username is taken or the subject is already linked.
    async fn create_linked_user(
        &self,
        user: NewLocalUser,
        subject: &str,
    ) -> StoreResult<(LocalUser, ExternalIdentityLink)>;
}

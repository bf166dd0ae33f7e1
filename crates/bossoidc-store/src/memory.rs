//! In-memory user store for testing and development

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    UserStore,
    types::{ExternalIdentityLink, LocalUser, NewLocalUser, StoreError, StoreResult},
};

/// Username column length of the default user model
pub const DEFAULT_MAX_USERNAME_LENGTH: usize = 150;

/// In-memory store with username and subject unique indexes
#[derive(Clone)]
pub struct MemoryUserStore {
    data: Arc<RwLock<MemoryTables>>,
    max_username_length: usize,
}

#[derive(Default)]
struct MemoryTables {
    next_id: i64,
    users: BTreeMap<i64, LocalUser>,
    /// Unique index: username -> user id
    usernames: HashMap<String, i64>,
    /// Unique index: subject -> link
    links: HashMap<String, ExternalIdentityLink>,
    /// Unique index: user id -> subject
    links_by_user: HashMap<i64, String>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::with_max_username_length(DEFAULT_MAX_USERNAME_LENGTH)
    }

    pub fn with_max_username_length(max_username_length: usize) -> Self {
        Self { data: Arc::new(RwLock::new(MemoryTables::default())), max_username_length }
    }

    fn check_username_length(&self, username: &str) -> StoreResult<()> {
        if username.chars().count() > self.max_username_length {
            return Err(StoreError::Internal(format!(
                "username exceeds {} characters",
                self.max_username_length
            )));
        }
        Ok(())
    }

    /// Number of stored users
    pub async fn user_count(&self) -> usize {
        self.data.read().await.users.len()
    }

    /// Number of stored identity links
    pub async fn link_count(&self) -> usize {
        self.data.read().await.links.len()
    }
}

impl MemoryTables {
    /// Insert a user, enforcing the username unique constraint
    fn insert_user(&mut self, user: NewLocalUser) -> StoreResult<LocalUser> {
        if self.usernames.contains_key(&user.username) {
            return Err(StoreError::Conflict(format!(
                "username '{}' already exists",
                user.username
            )));
        }

        self.next_id += 1;
        let id = self.next_id;
        let created = LocalUser {
            id,
            username: user.username,
            first_name: user.first_name.unwrap_or_default(),
            last_name: user.last_name.unwrap_or_default(),
            email: user.email.unwrap_or_default(),
            last_login: user.last_login,
            date_joined: Utc::now(),
            is_staff: false,
            is_superuser: false,
            permissions: BTreeSet::new(),
        };

        self.usernames.insert(created.username.clone(), id);
        self.users.insert(id, created.clone());
        Ok(created)
    }
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    fn max_username_length(&self) -> usize {
        self.max_username_length
    }

    async fn get_user(&self, id: i64) -> StoreResult<Option<LocalUser>> {
        Ok(self.data.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<LocalUser>> {
        let data = self.data.read().await;
        Ok(data.usernames.get(username).and_then(|id| data.users.get(id)).cloned())
    }

    async fn create_user(&self, user: NewLocalUser) -> StoreResult<LocalUser> {
        self.check_username_length(&user.username)?;

        let mut data = self.data.write().await;
        let created = data.insert_user(user)?;
        debug!(user_id = created.id, username = %created.username, "Created user");

        Ok(created)
    }

    async fn save_user(&self, user: &LocalUser) -> StoreResult<LocalUser> {
        let mut data = self.data.write().await;
        let previous = data
            .users
            .get(&user.id)
            .map(|u| u.username.clone())
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user.id)))?;

        if previous != user.username {
            if data.usernames.contains_key(&user.username) {
                return Err(StoreError::Conflict(format!(
                    "username '{}' already exists",
                    user.username
                )));
            }
            data.usernames.remove(&previous);
            data.usernames.insert(user.username.clone(), user.id);
        }

        data.users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn delete_user(&self, id: i64) -> StoreResult<()> {
        let mut data = self.data.write().await;
        let user =
            data.users.remove(&id).ok_or_else(|| StoreError::NotFound(format!("user {}", id)))?;

        data.usernames.remove(&user.username);
        if let Some(subject) = data.links_by_user.remove(&id) {
            data.links.remove(&subject);
        }
        debug!(user_id = id, username = %user.username, "Deleted user");

        Ok(())
    }

    async fn find_link_by_subject(
        &self,
        subject: &str,
    ) -> StoreResult<Option<ExternalIdentityLink>> {
        Ok(self.data.read().await.links.get(subject).cloned())
    }

    async fn find_link_by_user(&self, user_id: i64) -> StoreResult<Option<ExternalIdentityLink>> {
        let data = self.data.read().await;
        Ok(data.links_by_user.get(&user_id).and_then(|subject| data.links.get(subject)).cloned())
    }

    async fn create_linked_user(
        &self,
        user: NewLocalUser,
        subject: &str,
    ) -> StoreResult<(LocalUser, ExternalIdentityLink)> {
        self.check_username_length(&user.username)?;

        let mut data = self.data.write().await;
        if data.links.contains_key(subject) {
            return Err(StoreError::Conflict(format!("subject '{}' is already linked", subject)));
        }

        let created = data.insert_user(user)?;
        let link = ExternalIdentityLink {
            subject: subject.to_string(),
            user_id: created.id,
            created_at: Utc::now(),
        };
        data.links.insert(subject.to_string(), link.clone());
        data.links_by_user.insert(created.id, subject.to_string());
        debug!(
            user_id = created.id,
            username = %created.username,
            subject = %subject,
            "Created linked user"
        );

        Ok((created, link))
    }
}

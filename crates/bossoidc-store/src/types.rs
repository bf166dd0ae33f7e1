//! Local identity records

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The application's user record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalUser {
    /// Store-assigned primary key
    pub id: i64,
    /// Unique username
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub last_login: Option<DateTime<Utc>>,
    pub date_joined: DateTime<Utc>,
    /// Derived from the `admin` and `superuser` roles on every login
    pub is_staff: bool,
    /// Derived from the `superuser` role on every login
    pub is_superuser: bool,
    /// Application permissions, maintained by the role mapping hook
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

impl LocalUser {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

/// Fields used when a user is first created
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewLocalUser {
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
}

impl NewLocalUser {
    pub fn new(username: impl Into<String>) -> Self {
        Self { username: username.into(), ..Default::default() }
    }

    /// Overwrite the profile fields of an existing record with the present values
    pub fn apply_to(&self, user: &mut LocalUser) {
        if let Some(ref first_name) = self.first_name {
            user.first_name = first_name.clone();
        }
        if let Some(ref last_name) = self.last_name {
            user.last_name = last_name.clone();
        }
        if let Some(ref email) = self.email {
            user.email = email.clone();
        }
        if self.last_login.is_some() {
            user.last_login = self.last_login;
        }
    }
}

/// Binding between an identity provider subject and a local user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdentityLink {
    /// Provider-assigned `sub` claim
    pub subject: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// A unique constraint was violated
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

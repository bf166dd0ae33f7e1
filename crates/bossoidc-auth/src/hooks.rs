//! Deployment extension points
//!
//! The reconciler calls a [`RoleMapper`] and then a [`ProfileMapper`] on every
//! login, after the staff flags are derived and before the user is saved. Both
//! default to no-ops. Errors returned by a hook reach the caller unchanged.

use async_trait::async_trait;
use bossoidc_store::LocalUser;

use crate::claims::Claims;

/// Error raised by a hook, kept as the hook produced it
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Maps identity provider roles onto application permissions
#[async_trait]
pub trait RoleMapper: Send + Sync {
    /// Apply the roles of the user logging in
    ///
    /// `roles` contains both realm and client roles.
    async fn load_user_roles(&self, user: &mut LocalUser, roles: &[String])
        -> Result<(), HookError>;
}

/// Copies deployment-specific userinfo fields onto the user
#[async_trait]
pub trait ProfileMapper: Send + Sync {
    /// Update the user from the userinfo document of this login
    async fn update_user_data(&self, user: &mut LocalUser, userinfo: &Claims)
        -> Result<(), HookError>;
}

/// Default role hook
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpRoleMapper;

#[async_trait]
impl RoleMapper for NoOpRoleMapper {
    async fn load_user_roles(
        &self,
        _user: &mut LocalUser,
        _roles: &[String],
    ) -> Result<(), HookError> {
        Ok(())
    }
}

/// Default profile hook
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpProfileMapper;

#[async_trait]
impl ProfileMapper for NoOpProfileMapper {
    async fn update_user_data(
        &self,
        _user: &mut LocalUser,
        _userinfo: &Claims,
    ) -> Result<(), HookError> {
        Ok(())
    }
}

/// Role hook that grants one permission per role, replacing the previous set
///
/// Suits deployments whose permission names equal their Keycloak role names.
#[derive(Debug, Clone, Default)]
pub struct RolePermissionMapper {
    /// Only roles with this prefix are mapped, with the prefix stripped
    prefix: Option<String>,
}

impl RolePermissionMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: Some(prefix.into()) }
    }
}

#[async_trait]
impl RoleMapper for RolePermissionMapper {
    async fn load_user_roles(
        &self,
        user: &mut LocalUser,
        roles: &[String],
    ) -> Result<(), HookError> {
        user.permissions = roles
            .iter()
            .filter_map(|role| match self.prefix {
                Some(ref prefix) => role.strip_prefix(prefix.as_str()).map(str::to_string),
                None => Some(role.clone()),
            })
            .collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;

    use super::*;

    fn user() -> LocalUser {
        LocalUser {
            id: 1,
            username: "alice".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            last_login: None,
            date_joined: Utc::now(),
            is_staff: false,
            is_superuser: false,
            permissions: BTreeSet::from(["stale".to_string()]),
        }
    }

    #[tokio::test]
    async fn test_noop_hooks_leave_user_untouched() {
        let original = user();
        let mut u = original.clone();
        NoOpRoleMapper.load_user_roles(&mut u, &["admin".to_string()]).await.unwrap();
        NoOpProfileMapper.update_user_data(&mut u, &Claims::default()).await.unwrap();
        assert_eq!(u, original);
    }

    #[tokio::test]
    async fn test_role_permission_mapper_replaces_permissions() {
        let mut u = user();
        let roles = vec!["boss-read".to_string(), "boss-write".to_string(), "uma_authorization".to_string()];

        RolePermissionMapper::with_prefix("boss-").load_user_roles(&mut u, &roles).await.unwrap();

        assert_eq!(u.permissions, BTreeSet::from(["read".to_string(), "write".to_string()]));
        assert!(!u.has_permission("stale"));
    }
}

//! Identity reconciliation
//!
//! Maps a verified external identity onto a local user. The first login of a
//! subject provisions a user and links it; later logins find the user through
//! the link. A local account that merely shares the incoming username is never
//! inherited: it is deleted and the audit log records the deletion.

use std::sync::Arc;

use bossoidc_store::{LocalUser, StoreError, UserStore};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::{
    audit::{AuditEvent, log_audit_event},
    claims::{Claims, ProfileFields},
    error::AuthError,
    hooks::{NoOpProfileMapper, NoOpRoleMapper, ProfileMapper, RoleMapper},
    roles::{is_staff, is_superuser},
};

/// Reconciles external identities with the local user store
#[derive(Clone)]
pub struct IdentityReconciler {
    store: Arc<dyn UserStore>,
    role_mapper: Arc<dyn RoleMapper>,
    profile_mapper: Arc<dyn ProfileMapper>,
}

impl IdentityReconciler {
    /// Reconciler with no-op hooks
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self {
            store,
            role_mapper: Arc::new(NoOpRoleMapper),
            profile_mapper: Arc::new(NoOpProfileMapper),
        }
    }

    pub fn with_role_mapper(mut self, role_mapper: Arc<dyn RoleMapper>) -> Self {
        self.role_mapper = role_mapper;
        self
    }

    pub fn with_profile_mapper(mut self, profile_mapper: Arc<dyn ProfileMapper>) -> Self {
        self.profile_mapper = profile_mapper;
        self
    }

    /// Reject usernames the store cannot hold
    pub fn check_username(&self, username: &str) -> Result<(), AuthError> {
        let length = username.chars().count();
        let max = self.store.max_username_length();
        if length > max {
            return Err(AuthError::UsernameTooLong { length, max });
        }
        Ok(())
    }

    /// Find or provision the local user for `subject` and refresh it
    ///
    /// Staff flags are recomputed from `roles`, then the role and profile
    /// hooks run, then the user is saved. Names and email are only written
    /// when the user is provisioned; `last_login` is refreshed every time.
    ///
    /// # Errors
    ///
    /// - [`AuthError::UsernameTooLong`] before anything is written
    /// - [`AuthError::IdentityConflict`] if a concurrent login bound the
    ///   username to another subject
    /// - [`AuthError::Hook`] with the hook's own error
    /// - [`AuthError::Store`] for store failures, including a second conflict
    pub async fn reconcile(
        &self,
        subject: &str,
        username: &str,
        userinfo: &Claims,
        roles: &[String],
    ) -> Result<LocalUser, AuthError> {
        self.check_username(username)?;

        let now = Utc::now();
        let first_pass = self.find_or_provision(subject, username, userinfo, now, false).await?;
        let mut user = match first_pass {
            Some(user) => user,
            None => {
                debug!(
                    subject = %subject,
                    username = %username,
                    "Concurrent login won the race, retrying lookup"
                );
                self.find_or_provision(subject, username, userinfo, now, true).await?.ok_or_else(
                    || {
                        StoreError::Conflict(format!(
                            "user '{}' could not be provisioned for subject '{}'",
                            username, subject
                        ))
                    },
                )?
            },
        };

        user.is_staff = is_staff(roles);
        user.is_superuser = is_superuser(roles);

        self.role_mapper.load_user_roles(&mut user, roles).await.map_err(AuthError::Hook)?;
        self.profile_mapper.update_user_data(&mut user, userinfo).await.map_err(AuthError::Hook)?;

        Ok(self.store.save_user(&user).await?)
    }

    /// One pass of the lookup path
    ///
    /// `Ok(None)` means provisioning lost a race against a concurrent login.
    async fn find_or_provision(
        &self,
        subject: &str,
        username: &str,
        userinfo: &Claims,
        now: DateTime<Utc>,
        after_race: bool,
    ) -> Result<Option<LocalUser>, AuthError> {
        if let Some(link) = self.store.find_link_by_subject(subject).await? {
            let mut user = self.store.get_user(link.user_id).await?.ok_or_else(|| {
                StoreError::NotFound(format!(
                    "user {} linked to subject '{}'",
                    link.user_id, subject
                ))
            })?;
            user.last_login = Some(now);
            return Ok(Some(user));
        }

        let profile = ProfileFields::from_userinfo(userinfo).into_new_user(username, now);

        if let Some(existing) = self.store.find_user_by_username(username).await? {
            let previous_subject =
                self.store.find_link_by_user(existing.id).await?.map(|link| link.subject);

            match previous_subject {
                Some(ref linked) if linked == subject => {
                    let mut user = existing;
                    profile.apply_to(&mut user);
                    return Ok(Some(user));
                },
                Some(_) if after_race => {
                    warn!(
                        username = %username,
                        subject = %subject,
                        "Username was bound to another identity by a concurrent login"
                    );
                    return Err(AuthError::IdentityConflict { username: username.to_string() });
                },
                previous_subject => self.delete_stale(existing, previous_subject, subject).await?,
            }
        }

        match self.store.create_linked_user(profile, subject).await {
            Ok((user, _link)) => {
                info!(
                    user_id = user.id,
                    username = %user.username,
                    subject = %subject,
                    "Provisioned user"
                );
                Ok(Some(user))
            },
            Err(e) if e.is_conflict() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_stale(
        &self,
        stale: LocalUser,
        previous_subject: Option<String>,
        subject: &str,
    ) -> Result<(), AuthError> {
        log_audit_event(AuditEvent::StaleAccountDeleted {
            username: stale.username.clone(),
            deleted_user_id: stale.id,
            previous_subject,
            new_subject: subject.to_string(),
            timestamp: Utc::now(),
        });

        match self.store.delete_user(stale.id).await {
            // already removed by a concurrent login
            Ok(()) | Err(StoreError::NotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

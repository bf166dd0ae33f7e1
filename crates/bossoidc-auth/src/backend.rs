//! Login entry point
//!
//! [`OidcAuthenticator`] ties the pieces together for both login flows:
//!
//! - **Bearer flow**: an API request presents an access token; userinfo is
//!   read from the token itself.
//! - **Session flow**: the web login has obtained an access token and a
//!   userinfo document from the provider and passes both. The two must name
//!   the same subject.
//!
//! Each call verifies the token, applies the claims policy, extracts roles and
//! reconciles the local user. Every outcome is written to the audit log.

use std::sync::Arc;

use bossoidc_config::OidcConfig;
use bossoidc_observe::{login_span, record_login_outcome};
use bossoidc_store::{LocalUser, UserStore};
use chrono::Utc;
use tracing::{Instrument, Span, debug};

use crate::{
    audit::{AuditEvent, log_audit_event},
    claims::Claims,
    error::AuthError,
    extractor::AccessToken,
    hooks::{ProfileMapper, RoleMapper},
    jwks::{KeySetResolver, KeySetSource},
    jwt::TokenVerifier,
    reconcile::IdentityReconciler,
    roles::extract_roles,
    validation::{ClaimsPolicy, token_audience},
};

/// Authenticates requests against the identity provider
///
/// Holds one immutable snapshot of the configuration and the hooks.
#[derive(Clone)]
pub struct OidcAuthenticator {
    verifier: TokenVerifier,
    policy: ClaimsPolicy,
    reconciler: IdentityReconciler,
}

#[bon::bon]
impl OidcAuthenticator {
    /// Build an authenticator from configuration
    ///
    /// Without `key_source` the key set is fetched over HTTP from
    /// `config.jwks_endpoint`, cached when `jwks_cache_ttl_seconds` is set.
    ///
    /// # Errors
    ///
    /// [`AuthError::JwksError`] if the HTTP client cannot be built.
    #[builder]
    pub fn new(
        config: OidcConfig,
        store: Arc<dyn UserStore>,
        role_mapper: Option<Arc<dyn RoleMapper>>,
        profile_mapper: Option<Arc<dyn ProfileMapper>>,
        key_source: Option<Arc<dyn KeySetSource>>,
    ) -> Result<Self, AuthError> {
        let resolver = match key_source {
            Some(source) => {
                KeySetResolver::new(source).with_single_key_fallback(config.single_key_fallback)
            },
            None => KeySetResolver::from_config(&config)?,
        };

        let mut reconciler = IdentityReconciler::new(store);
        if let Some(role_mapper) = role_mapper {
            reconciler = reconciler.with_role_mapper(role_mapper);
        }
        if let Some(profile_mapper) = profile_mapper {
            reconciler = reconciler.with_profile_mapper(profile_mapper);
        }

        Ok(Self {
            verifier: TokenVerifier::new(resolver),
            policy: ClaimsPolicy::from_config(&config),
            reconciler,
        })
    }
}

impl OidcAuthenticator {
    /// Verify a token's signature without touching the store
    pub async fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.verifier.verify(token).await
    }

    /// Authenticate a request
    ///
    /// `userinfo` is the provider's userinfo document in the session flow and
    /// `None` in the bearer flow, where the token claims are used instead.
    ///
    /// Returns `Ok(None)` when the token is not addressed to a trusted
    /// audience, including when no token was presented at all.
    ///
    /// # Errors
    ///
    /// Any token, claims, reconciliation or hook failure. See
    /// [`AuthError::category`] for how each must be surfaced.
    pub async fn authenticate(
        &self,
        token: &AccessToken,
        userinfo: Option<&Claims>,
    ) -> Result<Option<LocalUser>, AuthError> {
        let flow = if userinfo.is_some() { "session" } else { "bearer" };
        let span = login_span(flow);

        let result = self.login(token, userinfo).instrument(span.clone()).await;

        if let Err(ref e) = result {
            span.record("outcome", "failure");
            log_audit_event(AuditEvent::AuthenticationFailure {
                subject: userinfo.and_then(Claims::subject).map(str::to_string),
                category: format!("{:?}", e.category()),
                error: e.to_string(),
                timestamp: Utc::now(),
            });
        }

        result
    }

    async fn login(
        &self,
        token: &AccessToken,
        userinfo: Option<&Claims>,
    ) -> Result<Option<LocalUser>, AuthError> {
        let token_claims = match token {
            AccessToken::Bearer(raw) => self.verifier.verify(raw).await?,
            AccessToken::Public => Claims::default(),
        };

        if !self.policy.audience_is_trusted(&token_claims) {
            Span::current().record("outcome", "untrusted_audience");
            log_audit_event(AuditEvent::UntrustedAudience {
                audience: token_audience(&token_claims),
                timestamp: Utc::now(),
            });
            return Ok(None);
        }

        let identity = userinfo.unwrap_or(&token_claims);
        self.policy.verify_claims(identity)?;
        if userinfo.is_some() && identity.subject() != token_claims.subject() {
            return Err(AuthError::SubjectMismatch);
        }

        let roles = extract_roles(&token_claims);
        let subject = identity.require_subject()?;
        let username = identity.require_username()?;
        debug!(subject = %subject, username = %username, roles = ?roles, "Claims accepted");

        let user = self.reconciler.reconcile(subject, username, identity, &roles).await?;

        record_login_outcome(&Span::current(), subject, &user.username, "success");
        log_audit_event(AuditEvent::AuthenticationSuccess {
            subject: subject.to_string(),
            username: user.username.clone(),
            user_id: user.id,
            timestamp: Utc::now(),
        });

        Ok(Some(user))
    }
}

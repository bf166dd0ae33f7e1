//! Claims policy
//!
//! Two gates run before a user is reconciled:
//!
//! - **Audience**: the access token must be addressed to one of the trusted
//!   audiences. Failing this gate is soft: the caller simply is not
//!   authenticated for this resource.
//! - **Required claims**: the userinfo document must carry every configured
//!   claim. Failing this gate is a security violation, since a conforming
//!   provider always sends them.

use bossoidc_config::OidcConfig;
use serde_json::Value;
use tracing::warn;

use crate::{
    claims::{Claims, USERNAME_CLAIM},
    error::AuthError,
};

/// Claim exempted for the bootstrap admin account
const EMAIL_CLAIM: &str = "email";

/// Audiences of a token
///
/// `aud` may be a single string or a list of strings.
pub fn token_audience(claims: &Claims) -> Vec<String> {
    match claims.get("aud") {
        Some(Value::String(aud)) => vec![aud.clone()],
        Some(Value::Array(auds)) => {
            auds.iter().filter_map(|v| v.as_str().map(str::to_string)).collect()
        },
        _ => Vec::new(),
    }
}

/// Immutable audience and required-claims policy
#[derive(Debug, Clone)]
pub struct ClaimsPolicy {
    trusted_audiences: Option<Vec<String>>,
    required_claims: Vec<String>,
    admin_username: String,
}

impl ClaimsPolicy {
    pub fn new(
        trusted_audiences: Option<Vec<String>>,
        required_claims: Vec<String>,
        admin_username: impl Into<String>,
    ) -> Self {
        Self { trusted_audiences, required_claims, admin_username: admin_username.into() }
    }

    pub fn from_config(config: &OidcConfig) -> Self {
        Self::new(
            config.trusted_audiences.clone(),
            config.required_claims(),
            config.admin_username.clone(),
        )
    }

    pub fn required_claims(&self) -> &[String] {
        &self.required_claims
    }

    /// Whether the token is addressed to a trusted audience
    ///
    /// Without a configured allow-list every token is untrusted.
    pub fn audience_is_trusted(&self, claims: &Claims) -> bool {
        let Some(ref trusted) = self.trusted_audiences else {
            warn!("No trusted audiences configured, rejecting token audience");
            return false;
        };

        token_audience(claims).iter().any(|aud| trusted.contains(aud))
    }

    /// Ensure every required claim is present
    ///
    /// `email` is not required for the bootstrap admin account, which is
    /// provisioned without one.
    ///
    /// # Errors
    ///
    /// [`AuthError::ClaimsVerificationFailed`] listing the absent claims.
    pub fn verify_claims(&self, claims: &Claims) -> Result<(), AuthError> {
        let is_admin = claims.preferred_username() == Some(self.admin_username.as_str());

        let missing: Vec<String> = self
            .required_claims
            .iter()
            .filter(|name| !(name.as_str() == EMAIL_CLAIM && is_admin))
            .filter(|name| !claims.contains(name))
            .cloned()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            warn!(
                missing = ?missing,
                username = ?claims.get_str(USERNAME_CLAIM),
                "Claims verification failed"
            );
            Err(AuthError::ClaimsVerificationFailed { missing })
        }
    }
}

impl Default for ClaimsPolicy {
    fn default() -> Self {
        Self::from_config(&OidcConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn claims(value: Value) -> Claims {
        Claims::from_value(value).unwrap()
    }

    fn policy(audiences: Option<&[&str]>, required: &str) -> ClaimsPolicy {
        ClaimsPolicy::new(
            audiences.map(|a| a.iter().map(|s| s.to_string()).collect()),
            required.split_whitespace().map(str::to_string).collect(),
            "bossadmin",
        )
    }

    #[test]
    fn test_token_audience_normalization() {
        assert_eq!(token_audience(&claims(json!({"aud": "endpoint"}))), vec!["endpoint"]);
        assert_eq!(
            token_audience(&claims(json!({"aud": ["endpoint", "account"]}))),
            vec!["endpoint", "account"]
        );
        assert!(token_audience(&claims(json!({}))).is_empty());
        assert!(token_audience(&claims(json!({"aud": 42}))).is_empty());
    }

    #[test]
    fn test_audience_string_and_list() {
        let p = policy(Some(&["endpoint"]), "sub");
        assert!(p.audience_is_trusted(&claims(json!({"aud": "endpoint"}))));
        assert!(p.audience_is_trusted(&claims(json!({"aud": ["account", "endpoint"]}))));
        assert!(!p.audience_is_trusted(&claims(json!({"aud": ["account"]}))));
        assert!(!p.audience_is_trusted(&claims(json!({}))));
    }

    #[test]
    fn test_audience_fails_closed_without_config() {
        let p = policy(None, "sub");
        assert!(!p.audience_is_trusted(&claims(json!({"aud": "endpoint"}))));

        let p = policy(Some(&[]), "sub");
        assert!(!p.audience_is_trusted(&claims(json!({"aud": "endpoint"}))));
    }

    #[test]
    fn test_default_required_claims() {
        let p = ClaimsPolicy::default();
        assert!(p.verify_claims(&claims(json!({"sub": "kc-1", "preferred_username": "alice"}))).is_ok());

        match p.verify_claims(&claims(json!({"preferred_username": "alice"}))) {
            Err(AuthError::ClaimsVerificationFailed { missing }) => assert_eq!(missing, vec!["sub"]),
            other => panic!("expected claims failure, got {:?}", other),
        }

        assert!(p.verify_claims(&claims(json!({"sub": "kc-1"}))).is_err());
    }

    #[test]
    fn test_email_exempt_for_admin() {
        let p = policy(None, "preferred_username sub email");

        assert!(p.verify_claims(&claims(json!({"sub": "kc-0", "preferred_username": "bossadmin"}))).is_ok());

        let result = p.verify_claims(&claims(json!({"sub": "kc-1", "preferred_username": "alice"})));
        assert!(matches!(
            result,
            Err(AuthError::ClaimsVerificationFailed { ref missing }) if missing == &["email"]
        ));
    }

    #[test]
    fn test_admin_still_needs_other_claims() {
        let p = policy(None, "preferred_username sub email");
        let result = p.verify_claims(&claims(json!({"preferred_username": "bossadmin"})));
        assert!(matches!(
            result,
            Err(AuthError::ClaimsVerificationFailed { ref missing }) if missing == &["sub"]
        ));
    }
}

#![allow(dead_code)]

pub mod mock_jwks;

use std::sync::Arc;

use bossoidc_auth::{
    Claims, JwkSet, KeySetSource, OidcAuthenticator, ProfileMapper, RoleMapper,
    StaticKeySetSource,
};
use bossoidc_config::OidcConfig;
use bossoidc_store::MemoryUserStore;
use serde_json::{Value, json};

use self::mock_jwks::TestKey;

/// Audience trusted by [`test_config`]
pub const TRUSTED_AUDIENCE: &str = "boss-endpoint";

/// Configuration trusting [`TRUSTED_AUDIENCE`] and requiring `email`
pub fn test_config() -> OidcConfig {
    OidcConfig {
        trusted_audiences: Some(vec![TRUSTED_AUDIENCE.to_string()]),
        claims_verification: "preferred_username sub email".to_string(),
        ..Default::default()
    }
}

/// Keycloak-shaped access token payload
pub fn access_token_claims(sub: &str, username: &str, roles: &[&str]) -> Value {
    json!({
        "sub": sub,
        "preferred_username": username,
        "email": format!("{}@example.org", username),
        "given_name": "Test",
        "family_name": "User",
        "aud": [TRUSTED_AUDIENCE, "account"],
        "realm_access": { "roles": roles },
        "resource_access": {
            "account": { "roles": ["manage-account", "view-profile"] }
        }
    })
}

/// Userinfo document as returned by the provider
pub fn userinfo(sub: &str, username: &str) -> Claims {
    Claims::from_value(json!({
        "sub": sub,
        "preferred_username": username,
        "email": format!("{}@example.org", username),
        "given_name": "Test",
        "family_name": "User"
    }))
    .unwrap()
}

pub fn static_source(key: &TestKey) -> Arc<dyn KeySetSource> {
    Arc::new(StaticKeySetSource::new(JwkSet { keys: vec![key.jwk()] }))
}

/// Authenticator over `store` that trusts only `key`
pub fn authenticator(store: &MemoryUserStore, key: &TestKey) -> OidcAuthenticator {
    OidcAuthenticator::builder()
        .config(test_config())
        .store(Arc::new(store.clone()))
        .key_source(static_source(key))
        .build()
        .unwrap()
}

pub fn authenticator_with_hooks(
    store: &MemoryUserStore,
    key: &TestKey,
    role_mapper: Option<Arc<dyn RoleMapper>>,
    profile_mapper: Option<Arc<dyn ProfileMapper>>,
) -> OidcAuthenticator {
    OidcAuthenticator::builder()
        .config(test_config())
        .store(Arc::new(store.clone()))
        .key_source(static_source(key))
        .maybe_role_mapper(role_mapper)
        .maybe_profile_mapper(profile_mapper)
        .build()
        .unwrap()
}

//! # boss-oidc Authentication
//!
//! Verifies Keycloak access tokens and maps the identity they carry onto a
//! local user.
//!
//! ## Features
//!
//! - **JWKS verification**: signatures checked against the realm's published keys
//! - **Claims policy**: trusted-audience and required-claims gates
//! - **Role extraction**: realm and client roles from Keycloak tokens
//! - **Identity reconciliation**: first-login provisioning keyed on the
//!   provider subject, with stale username reuse blocked
//!
//! ## Security
//!
//! - Only asymmetric algorithms are accepted; `none` and HMAC are rejected
//! - A key whose declared `alg` differs from the token's is never used
//! - A new subject never inherits an existing local account
//! - No unsafe code is allowed in this crate
//!
//! ## Example
//!
//! ```ignore
//! use bossoidc_auth::{extract_access_token, OidcAuthenticator};
//!
//! let auth = OidcAuthenticator::builder().config(config).store(store).build()?;
//! let token = extract_access_token(session.access_token(), request.headers());
//! let user = auth.authenticate(&token, None).await?;
//! ```

#![deny(unsafe_code)]

/// Audit logging for login events
pub mod audit;
/// Login entry point
pub mod backend;
/// Token and userinfo claims
pub mod claims;
/// Authentication errors
pub mod error;
/// Access token lookup
pub mod extractor;
/// Role and profile hooks
pub mod hooks;
/// JWKS fetching and key selection
pub mod jwks;
/// JWT signature verification
pub mod jwt;
/// Local user reconciliation
pub mod reconcile;
/// Keycloak role extraction
pub mod roles;
/// Audience and required-claims policy
pub mod validation;

pub use audit::{AuditEvent, log_audit_event};
pub use backend::OidcAuthenticator;
pub use claims::{Claims, ProfileFields};
pub use error::{AuthError, ErrorCategory};
pub use extractor::{AccessToken, extract_access_token};
pub use hooks::{
    HookError, NoOpProfileMapper, NoOpRoleMapper, ProfileMapper, RoleMapper, RolePermissionMapper,
};
pub use jwks::{
    CachedKeySetSource, HttpKeySetSource, Jwk, JwkSet, KeySetResolver, KeySetSource,
    StaticKeySetSource,
};
pub use jwt::TokenVerifier;
pub use reconcile::IdentityReconciler;
pub use roles::extract_roles;
pub use validation::ClaimsPolicy;

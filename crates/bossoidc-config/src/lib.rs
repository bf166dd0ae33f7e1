//! # bossoidc-config - Configuration Management
//!
//! Loads the OIDC authentication settings from an optional file and from
//! `BOSSOIDC_*` environment variables. The resulting [`OidcConfig`] is an
//! immutable snapshot handed to the authenticator at construction.

pub mod validation;

use std::path::Path;

use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

pub use validation::{ConfigValidationError, ValidationResult};

/// Default list of claims every userinfo document must carry
pub const DEFAULT_CLAIMS_VERIFICATION: &str = "preferred_username sub";

/// Default administrative bootstrap account, provisioned without an email
pub const DEFAULT_ADMIN_USERNAME: &str = "bossadmin";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcConfig {
    /// JWKS endpoint of the identity provider realm
    #[serde(default = "default_jwks_endpoint")]
    pub jwks_endpoint: String,

    /// Verify the TLS certificate of the JWKS endpoint
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,

    /// Request timeout for a key set fetch
    #[serde(default = "default_jwks_timeout_seconds")]
    pub jwks_timeout_seconds: u64,

    /// Cache fetched key sets for this many seconds (disabled when unset)
    #[serde(default)]
    pub jwks_cache_ttl_seconds: Option<u64>,

    /// Trust a single-key set even when the token's `kid` does not match
    #[serde(default = "default_single_key_fallback")]
    pub single_key_fallback: bool,

    /// Audiences accepted in the access token's `aud` claim
    ///
    /// `None` means no audience was configured and every token is rejected.
    #[serde(default)]
    pub trusted_audiences: Option<Vec<String>>,

    /// Whitespace separated claim names required in the userinfo document
    #[serde(default = "default_claims_verification")]
    pub claims_verification: String,

    /// Bootstrap admin username exempt from the `email` requirement
    #[serde(default = "default_admin_username")]
    pub admin_username: String,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

fn default_jwks_endpoint() -> String {
    "http://localhost:8080/auth/realms/BOSS/protocol/openid-connect/certs".to_string()
}

fn default_verify_ssl() -> bool {
    true
}

fn default_jwks_timeout_seconds() -> u64 {
    10
}

fn default_single_key_fallback() -> bool {
    true
}

fn default_claims_verification() -> String {
    DEFAULT_CLAIMS_VERIFICATION.to_string()
}

fn default_admin_username() -> String {
    DEFAULT_ADMIN_USERNAME.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// One of `pretty`, `compact` or `json`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { log_level: default_log_level(), log_format: default_log_format() }
    }
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self {
            jwks_endpoint: default_jwks_endpoint(),
            verify_ssl: default_verify_ssl(),
            jwks_timeout_seconds: default_jwks_timeout_seconds(),
            jwks_cache_ttl_seconds: None,
            single_key_fallback: default_single_key_fallback(),
            trusted_audiences: None,
            claims_verification: default_claims_verification(),
            admin_username: default_admin_username(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl OidcConfig {
    /// Claim names parsed from `claims_verification`
    pub fn required_claims(&self) -> Vec<String> {
        self.claims_verification.split_whitespace().map(str::to_string).collect()
    }

    /// Validate this configuration
    pub fn validate(&self) -> ValidationResult<()> {
        validation::validate(self)
    }
}

/// Load configuration from file and environment
///
/// A missing file yields the defaults; a file that fails to parse or holds a
/// value of the wrong type is an error. Environment variables use the `BOSSOIDC_` prefix and
/// `__` for nesting, e.g. `BOSSOIDC_OBSERVABILITY__LOG_LEVEL=debug`.
/// `BOSSOIDC_TRUSTED_AUDIENCES` is parsed as a comma separated list.
pub fn load<P: AsRef<Path>>(path: P) -> Result<OidcConfig, ConfigError> {
    let builder = ConfigBuilder::builder()
        .add_source(File::from(path.as_ref()).required(false))
        .add_source(
            Environment::with_prefix("BOSSOIDC")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("trusted_audiences")
                .try_parsing(true),
        )
        .build()?;

    builder.try_deserialize()
}

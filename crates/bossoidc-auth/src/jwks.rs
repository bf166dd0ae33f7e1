//! # JWKS fetching and signing key selection
//!
//! The provider publishes its realm keys as a JSON Web Key Set. A
//! [`KeySetSource`] fetches and parses that document; the
//! [`KeySetResolver`] picks the key matching a token header.
//!
//! Sources:
//!
//! - [`HttpKeySetSource`]: one GET per verification (the default)
//! - [`StaticKeySetSource`]: a fixed set, for trusted-network deployments and tests
//! - [`CachedKeySetSource`]: opt-in TTL cache around another source
//!
//! ## Selection
//!
//! Keycloak realms commonly publish a single key and older releases omit `kid`
//! from the token header. A set with exactly one key is therefore trusted even
//! when the ids differ (unless `single_key_fallback` is disabled). Otherwise
//! the key whose `kid` equals the header's `kid` is used. A key that declares
//! an `alg` different from the token's is rejected outright.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bossoidc_config::OidcConfig;
use jsonwebtoken::{Algorithm, DecodingKey, Header};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::error::AuthError;

/// JSON Web Key as defined in RFC 7517
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA", "EC" or "OKP")
    pub kty: String,

    /// Public key use (should be "sig" for signatures)
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub use_: Option<String>,

    /// Key ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Algorithm ("RS256", "ES256", "EdDSA", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// Curve (P-256, Ed25519, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,

    /// EC x coordinate or OKP public key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    /// EC y coordinate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,

    /// RSA modulus
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA exponent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

impl Jwk {
    /// Convert JWK to jsonwebtoken DecodingKey
    pub fn to_decoding_key(&self) -> Result<DecodingKey, AuthError> {
        match self.kty.as_str() {
            "RSA" => {
                let n = self.n.as_deref().ok_or_else(|| missing_param("RSA", "n"))?;
                let e = self.e.as_deref().ok_or_else(|| missing_param("RSA", "e"))?;
                DecodingKey::from_rsa_components(n, e).map_err(|e| {
                    AuthError::NoMatchingKey(format!("Failed to create RSA decoding key: {}", e))
                })
            },
            "EC" => {
                let x = self.x.as_deref().ok_or_else(|| missing_param("EC", "x"))?;
                let y = self.y.as_deref().ok_or_else(|| missing_param("EC", "y"))?;
                DecodingKey::from_ec_components(x, y).map_err(|e| {
                    AuthError::NoMatchingKey(format!("Failed to create EC decoding key: {}", e))
                })
            },
            "OKP" => {
                let x = self.x.as_deref().ok_or_else(|| missing_param("OKP", "x"))?;
                DecodingKey::from_ed_components(x).map_err(|e| {
                    AuthError::NoMatchingKey(format!("Failed to create EdDSA decoding key: {}", e))
                })
            },
            other => Err(AuthError::UnsupportedAlgorithm(format!("Unsupported key type: {}", other))),
        }
    }

    /// Whether this key's type can verify signatures made with `alg`
    pub fn supports(&self, alg: Algorithm) -> bool {
        let expected = match alg {
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => "RSA",
            Algorithm::ES256 | Algorithm::ES384 => "EC",
            Algorithm::EdDSA => "OKP",
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => return false,
        };
        self.kty == expected
    }
}

fn missing_param(kty: &str, param: &str) -> AuthError {
    AuthError::NoMatchingKey(format!("{} key missing '{}' parameter", kty, param))
}

/// Name of an algorithm as it appears in a JOSE header
pub fn algorithm_name(alg: Algorithm) -> String {
    format!("{:?}", alg)
}

/// JWKS document
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    /// The list of JSON Web Keys
    pub keys: Vec<Jwk>,
}

/// Fetch-and-parse capability for the provider's key set
#[async_trait]
pub trait KeySetSource: Send + Sync {
    /// Return the current key set
    async fn fetch(&self) -> Result<JwkSet, AuthError>;

    /// Drop any cached copy so the next fetch reaches the provider
    ///
    /// Returns `true` if something was dropped.
    async fn invalidate(&self) -> bool {
        false
    }
}

/// Key set fetched over HTTP on every call
pub struct HttpKeySetSource {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpKeySetSource {
    /// Create a source for `endpoint`
    ///
    /// `verify_ssl = false` disables certificate validation and is only meant for
    /// deployments where the provider sits on a trusted network.
    pub fn new(endpoint: String, verify_ssl: bool, timeout: Duration) -> Result<Self, AuthError> {
        if !verify_ssl {
            warn!(endpoint = %endpoint, "TLS certificate verification disabled for JWKS endpoint");
        }

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!verify_ssl)
            .build()
            .map_err(|e| AuthError::JwksError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http_client, endpoint })
    }

    pub fn from_config(config: &OidcConfig) -> Result<Self, AuthError> {
        Self::new(
            config.jwks_endpoint.clone(),
            config.verify_ssl,
            Duration::from_secs(config.jwks_timeout_seconds),
        )
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    async fn fetch(&self) -> Result<JwkSet, AuthError> {
        debug!(endpoint = %self.endpoint, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| AuthError::JwksError(format!("Failed to fetch JWKS: {}", e)))?;

        if !response.status().is_success() {
            return Err(AuthError::JwksError(format!(
                "JWKS endpoint returned status: {}",
                response.status()
            )));
        }

        let jwks: JwkSet = response
            .json()
            .await
            .map_err(|e| AuthError::JwksError(format!("Failed to parse JWKS response: {}", e)))?;

        debug!(endpoint = %self.endpoint, key_count = jwks.keys.len(), "Fetched JWKS");
        Ok(jwks)
    }
}

/// Fixed key set
#[derive(Clone, Debug, Default)]
pub struct StaticKeySetSource {
    jwks: JwkSet,
}

impl StaticKeySetSource {
    pub fn new(jwks: JwkSet) -> Self {
        Self { jwks }
    }

    /// Parse a JWKS JSON document
    pub fn from_json(json: &str) -> Result<Self, AuthError> {
        let jwks = serde_json::from_str(json)
            .map_err(|e| AuthError::JwksError(format!("Failed to parse JWKS: {}", e)))?;
        Ok(Self { jwks })
    }
}

#[async_trait]
impl KeySetSource for StaticKeySetSource {
    async fn fetch(&self) -> Result<JwkSet, AuthError> {
        Ok(self.jwks.clone())
    }
}

/// TTL cache around another source
///
/// Concurrent misses share one fetch.
pub struct CachedKeySetSource<S> {
    inner: S,
    cache: Cache<(), Arc<JwkSet>>,
}

impl<S: KeySetSource> CachedKeySetSource<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self { inner, cache: Cache::builder().max_capacity(1).time_to_live(ttl).build() }
    }

    /// Cached key set, if any
    pub async fn cached(&self) -> Option<Arc<JwkSet>> {
        self.cache.get(&()).await
    }
}

#[async_trait]
impl<S: KeySetSource> KeySetSource for CachedKeySetSource<S> {
    async fn fetch(&self) -> Result<JwkSet, AuthError> {
        let jwks = self
            .cache
            .try_get_with((), async { self.inner.fetch().await.map(Arc::new) })
            .await
            .map_err(|e| match e.as_ref() {
                AuthError::JwksError(message) => AuthError::JwksError(message.clone()),
                other => AuthError::JwksError(other.to_string()),
            })?;
        Ok((*jwks).clone())
    }

    async fn invalidate(&self) -> bool {
        let had_entry = self.cache.contains_key(&());
        self.cache.invalidate(&()).await;
        had_entry
    }
}

/// Select the signing key for a token header
///
/// See the module documentation for the rules.
pub fn select_key<'a>(
    jwks: &'a JwkSet,
    header: &Header,
    single_key_fallback: bool,
) -> Result<&'a Jwk, AuthError> {
    let token_alg = algorithm_name(header.alg);

    let key = if single_key_fallback && jwks.keys.len() == 1 {
        jwks.keys.first()
    } else {
        header.kid.as_deref().and_then(|kid| {
            jwks.keys.iter().find(|k| {
                k.kid.as_deref().map(|id| id.as_bytes().ct_eq(kid.as_bytes()).into()).unwrap_or(false)
            })
        })
    };

    let key = key.ok_or_else(|| {
        AuthError::NoMatchingKey(format!(
            "no key for kid '{}' among {} key(s)",
            header.kid.as_deref().unwrap_or("none"),
            jwks.keys.len()
        ))
    })?;

    if let Some(ref key_alg) = key.alg {
        if *key_alg != token_alg {
            warn!(
                kid = ?key.kid,
                key_alg = %key_alg,
                token_alg = %token_alg,
                "JWKS key algorithm does not match token algorithm"
            );
            return Err(AuthError::AlgorithmMismatch { key: key_alg.clone(), token: token_alg });
        }
    }

    debug!(kid = ?key.kid, alg = %token_alg, "Selected signing key");
    Ok(key)
}

/// Resolves the signing key for a token from a [`KeySetSource`]
#[derive(Clone)]
pub struct KeySetResolver {
    source: Arc<dyn KeySetSource>,
    single_key_fallback: bool,
}

impl KeySetResolver {
    pub fn new(source: Arc<dyn KeySetSource>) -> Self {
        Self { source, single_key_fallback: true }
    }

    /// Enable or disable trusting a lone key regardless of `kid`
    pub fn with_single_key_fallback(mut self, enabled: bool) -> Self {
        self.single_key_fallback = enabled;
        self
    }

    /// Build the HTTP source described by `config`, cached if a TTL is configured
    pub fn from_config(config: &OidcConfig) -> Result<Self, AuthError> {
        let http = HttpKeySetSource::from_config(config)?;
        let source: Arc<dyn KeySetSource> = match config.jwks_cache_ttl_seconds {
            Some(ttl) => Arc::new(CachedKeySetSource::new(http, Duration::from_secs(ttl))),
            None => Arc::new(http),
        };
        Ok(Self::new(source).with_single_key_fallback(config.single_key_fallback))
    }

    /// Resolve the key that signed a token with this header
    ///
    /// A cached source that lacks the key is invalidated and fetched once more
    /// to pick up rotated keys.
    pub async fn resolve(&self, header: &Header) -> Result<Jwk, AuthError> {
        let jwks = self.source.fetch().await?;
        match select_key(&jwks, header, self.single_key_fallback) {
            Ok(key) => Ok(key.clone()),
            Err(AuthError::NoMatchingKey(reason)) => {
                if !self.source.invalidate().await {
                    return Err(AuthError::NoMatchingKey(reason));
                }
                debug!(kid = ?header.kid, "Key not found in cached JWKS, refetching");
                let jwks = self.source.fetch().await?;
                select_key(&jwks, header, self.single_key_fallback).cloned()
            },
            Err(e) => Err(e),
        }
    }
}

//! JWT decoding and signature verification
//!
//! [`TokenVerifier`] resolves the signing key for a token's header and checks
//! the signature. Expiry and audience are not enforced here; the audience gate
//! lives in [`crate::validation`].

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, Header, Validation, decode, decode_header};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    claims::Claims,
    error::AuthError,
    jwks::{Jwk, KeySetResolver, KeySetSource, algorithm_name},
};

/// Algorithms never accepted from a JWKS-verified token
///
/// `none` carries no signature. The HMAC family needs a shared secret, which a
/// public key set cannot provide.
pub const FORBIDDEN_ALGORITHMS: &[Algorithm] =
    &[Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Decode JWT header without verification
pub fn decode_jwt_header(token: &str) -> Result<Header, AuthError> {
    decode_header(token)
        .map_err(|e| AuthError::InvalidTokenFormat(format!("Failed to decode JWT header: {}", e)))
}

/// Decode JWT payload without verification
///
/// Only for diagnostics; nothing returned here may be trusted.
pub fn decode_unverified_claims(token: &str) -> Result<Claims, AuthError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(AuthError::InvalidTokenFormat(
            "JWT must have 3 parts separated by dots".into(),
        ));
    }

    let payload_bytes = URL_SAFE_NO_PAD.decode(parts[1]).map_err(|e| {
        AuthError::InvalidTokenFormat(format!("Failed to decode JWT payload: {}", e))
    })?;

    let payload: Value = serde_json::from_slice(&payload_bytes)
        .map_err(|e| AuthError::InvalidTokenFormat(format!("Failed to parse JWT claims: {}", e)))?;

    Claims::from_value(payload)
}

/// Verify a JWT signature with a JWK
///
/// Only the signature is checked. Expiry, audience and required claims are the
/// claims policy's concern.
pub fn verify_signature(token: &str, jwk: &Jwk, algorithm: Algorithm) -> Result<Claims, AuthError> {
    if !jwk.supports(algorithm) {
        return Err(AuthError::UnsupportedAlgorithm(format!(
            "{} cannot be verified with a {} key",
            algorithm_name(algorithm),
            jwk.kty
        )));
    }

    let key = jwk.to_decoding_key()?;

    let mut validation = Validation::new(algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let token_data = decode::<Map<String, Value>>(token, &key, &validation)?;

    Ok(Claims::new(token_data.claims))
}

/// Verifies compact JWS tokens against the provider's key set
#[derive(Clone)]
pub struct TokenVerifier {
    resolver: KeySetResolver,
}

impl TokenVerifier {
    pub fn new(resolver: KeySetResolver) -> Self {
        Self { resolver }
    }

    /// Verifier backed by a key source, with the single-key fallback enabled
    pub fn from_source(source: Arc<dyn KeySetSource>) -> Self {
        Self::new(KeySetResolver::new(source))
    }

    /// Verify a token and return its payload
    ///
    /// 1. Decodes the header for `alg` and `kid`
    /// 2. Rejects forbidden algorithms
    /// 3. Resolves the signing key from the key set
    /// 4. Verifies the signature over header and payload
    ///
    /// # Errors
    ///
    /// Every failure is a security violation: malformed token, forbidden
    /// algorithm, no matching key, key/token algorithm mismatch or a bad
    /// signature. A key set that cannot be fetched is reported as
    /// [`AuthError::JwksError`].
    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let header = decode_jwt_header(token)?;

        if FORBIDDEN_ALGORITHMS.contains(&header.alg) {
            return Err(AuthError::UnsupportedAlgorithm(format!(
                "Algorithm {} is not allowed",
                algorithm_name(header.alg)
            )));
        }

        let jwk = self.resolver.resolve(&header).await?;
        let claims = verify_signature(token, &jwk, header.alg)?;

        debug!(
            kid = ?header.kid,
            alg = %algorithm_name(header.alg),
            subject = ?claims.subject(),
            "Token signature verified"
        );

        Ok(claims)
    }
}

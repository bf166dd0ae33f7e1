//! Configuration validation
//!
//! Validates configuration values and ensures consistency

use thiserror::Error;

use crate::{ObservabilityConfig, OidcConfig};

#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("Invalid JWKS endpoint: {0} (must be an http or https URL)")]
    InvalidJwksEndpoint(String),

    #[error("Invalid JWKS timeout: {0} (must be > 0)")]
    InvalidJwksTimeout(u64),

    #[error("Invalid JWKS cache TTL: {0} (must be > 0)")]
    InvalidJwksCacheTtl(u64),

    #[error("Claims verification list is empty")]
    EmptyClaimsVerification,

    #[error("Trusted audience entries must not be empty")]
    EmptyAudience,

    #[error("Invalid log level: {0} (must be one of: trace, debug, info, warn, error)")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0} (must be one of: pretty, compact, json)")]
    InvalidLogFormat(String),

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ConfigValidationError>),
}

/// Validation result type
pub type ValidationResult<T> = Result<T, ConfigValidationError>;

/// Validate complete configuration
pub fn validate(config: &OidcConfig) -> ValidationResult<()> {
    let mut errors = Vec::new();

    if let Err(e) = validate_jwks(config) {
        errors.push(e);
    }

    if let Err(e) = validate_claims(config) {
        errors.push(e);
    }

    if let Err(e) = validate_observability(&config.observability) {
        errors.push(e);
    }

    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ConfigValidationError::Multiple(errors)),
    }
}

/// Validate the key set fetch settings
pub fn validate_jwks(config: &OidcConfig) -> ValidationResult<()> {
    let endpoint = config.jwks_endpoint.trim();
    if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
        return Err(ConfigValidationError::InvalidJwksEndpoint(config.jwks_endpoint.clone()));
    }

    if config.jwks_timeout_seconds == 0 {
        return Err(ConfigValidationError::InvalidJwksTimeout(config.jwks_timeout_seconds));
    }

    if let Some(ttl) = config.jwks_cache_ttl_seconds {
        if ttl == 0 {
            return Err(ConfigValidationError::InvalidJwksCacheTtl(ttl));
        }
    }

    Ok(())
}

/// Validate the claims policy settings
pub fn validate_claims(config: &OidcConfig) -> ValidationResult<()> {
    if config.claims_verification.split_whitespace().next().is_none() {
        return Err(ConfigValidationError::EmptyClaimsVerification);
    }

    if let Some(ref audiences) = config.trusted_audiences {
        if audiences.iter().any(|aud| aud.trim().is_empty()) {
            return Err(ConfigValidationError::EmptyAudience);
        }
    }

    Ok(())
}

/// Validate observability configuration
pub fn validate_observability(config: &ObservabilityConfig) -> ValidationResult<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.log_level.to_lowercase().as_str()) {
        return Err(ConfigValidationError::InvalidLogLevel(config.log_level.clone()));
    }

    let valid_formats = ["pretty", "compact", "json"];
    if !valid_formats.contains(&config.log_format.to_lowercase().as_str()) {
        return Err(ConfigValidationError::InvalidLogFormat(config.log_format.clone()));
    }

    Ok(())
}

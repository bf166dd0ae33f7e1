use bossoidc_store::StoreError;
use thiserror::Error;

use crate::hooks::HookError;

/// How a failure must be surfaced to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Forged, tampered or non-conforming token or identity provider response
    SecurityViolation,
    /// The request is well-formed but cannot be stored
    Validation,
    /// The provider's key set could not be fetched or parsed
    KeySetUnavailable,
    /// The user store failed
    Store,
    /// A deployment-supplied hook failed
    Hook,
}

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed JWT - cannot be decoded
    #[error("Invalid token format: {0}")]
    InvalidTokenFormat(String),

    /// Signature verification failed
    #[error("Invalid signature")]
    InvalidSignature,

    /// Algorithm is forbidden or not usable with the key
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The selected key declares a different algorithm than the token
    #[error("alg values do not match: key declares '{key}', token declares '{token}'")]
    AlgorithmMismatch {
        /// Algorithm declared by the JWK
        key: String,
        /// Algorithm declared by the token header
        token: String,
    },

    /// No key in the set can verify the token
    #[error("Could not find a valid JWKS key: {0}")]
    NoMatchingKey(String),

    /// Key set fetch or parse failure
    #[error("JWKS error: {0}")]
    JwksError(String),

    /// Required claims absent from the userinfo document
    #[error("Claims verification failed: missing {}", missing.join(", "))]
    ClaimsVerificationFailed {
        /// Names of the absent claims
        missing: Vec<String>,
    },

    /// Userinfo document describes a different subject than the access token
    #[error("Userinfo subject does not match the access token subject")]
    SubjectMismatch,

    /// A local user is already bound to another external identity
    #[error("User '{username}' is linked to a different identity")]
    IdentityConflict {
        /// Username of the contested local account
        username: String,
    },

    /// Username does not fit the store's username column
    #[error("Username is too long ({length} > {max} characters)")]
    UsernameTooLong {
        /// Length of the incoming username in characters
        length: usize,
        /// Store limit
        max: usize,
    },

    /// User store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Failure raised by a role or profile hook
    #[error(transparent)]
    Hook(HookError),
}

impl AuthError {
    /// Category of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            AuthError::InvalidTokenFormat(_)
            | AuthError::InvalidSignature
            | AuthError::UnsupportedAlgorithm(_)
            | AuthError::AlgorithmMismatch { .. }
            | AuthError::NoMatchingKey(_)
            | AuthError::ClaimsVerificationFailed { .. }
            | AuthError::SubjectMismatch
            | AuthError::IdentityConflict { .. } => ErrorCategory::SecurityViolation,
            AuthError::UsernameTooLong { .. } => ErrorCategory::Validation,
            AuthError::JwksError(_) => ErrorCategory::KeySetUnavailable,
            AuthError::Store(_) => ErrorCategory::Store,
            AuthError::Hook(_) => ErrorCategory::Hook,
        }
    }

    /// True for failures that indicate a forged or tampered identity
    pub fn is_security_violation(&self) -> bool {
        self.category() == ErrorCategory::SecurityViolation
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => AuthError::InvalidTokenFormat(format!("JWT error: {}", err)),
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                AuthError::UnsupportedAlgorithm("Algorithm not supported".into())
            },
            ErrorKind::InvalidRsaKey(_)
            | ErrorKind::InvalidEcdsaKey
            | ErrorKind::InvalidKeyFormat
            | ErrorKind::RsaFailedSigning => {
                AuthError::NoMatchingKey(format!("Key cannot verify token: {}", err))
            },
            _ => AuthError::InvalidTokenFormat(format!("JWT error: {}", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::InvalidTokenFormat("test".into());
        assert_eq!(err.to_string(), "Invalid token format: test");

        let err = AuthError::ClaimsVerificationFailed {
            missing: vec!["email".to_string(), "sub".to_string()],
        };
        assert_eq!(err.to_string(), "Claims verification failed: missing email, sub");

        let err = AuthError::UsernameTooLong { length: 200, max: 150 };
        assert_eq!(err.to_string(), "Username is too long (200 > 150 characters)");
    }

    #[test]
    fn test_error_categories() {
        assert!(AuthError::InvalidSignature.is_security_violation());
        assert!(AuthError::AlgorithmMismatch { key: "RS256".into(), token: "RS512".into() }
            .is_security_violation());
        assert!(AuthError::NoMatchingKey("kid".into()).is_security_violation());
        assert!(AuthError::ClaimsVerificationFailed { missing: vec![] }.is_security_violation());
        assert!(AuthError::SubjectMismatch.is_security_violation());

        assert_eq!(
            AuthError::UsernameTooLong { length: 200, max: 150 }.category(),
            ErrorCategory::Validation
        );
        assert_eq!(AuthError::JwksError("down".into()).category(), ErrorCategory::KeySetUnavailable);
        assert_eq!(
            AuthError::from(StoreError::Conflict("alice".into())).category(),
            ErrorCategory::Store
        );
    }

    #[test]
    fn test_error_from_jsonwebtoken() {
        let jwt_err =
            jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::InvalidSignature);
        let auth_err: AuthError = jwt_err.into();
        assert!(matches!(auth_err, AuthError::InvalidSignature));

        let jwt_err =
            jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::InvalidToken);
        assert!(matches!(AuthError::from(jwt_err), AuthError::InvalidTokenFormat(_)));
    }

    #[test]
    fn test_hook_error_is_transparent() {
        let hook_err: HookError = "permission table unavailable".into();
        let err = AuthError::Hook(hook_err);
        assert_eq!(err.to_string(), "permission table unavailable");
        assert_eq!(err.category(), ErrorCategory::Hook);
    }
}

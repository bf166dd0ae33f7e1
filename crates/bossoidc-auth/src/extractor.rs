//! Access token lookup for incoming requests
//!
//! A session login stores the access token in the session; an API client sends
//! it in the `Authorization` header. The session wins when both are present.

use http::{HeaderMap, header::AUTHORIZATION};

/// Placeholder used when a request carries no access token
pub const PUBLIC_TOKEN: &str = "public";

/// Access token presented by a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessToken {
    /// A compact JWS to verify
    Bearer(String),
    /// No token was presented
    Public,
}

impl AccessToken {
    pub fn as_str(&self) -> &str {
        match self {
            AccessToken::Bearer(token) => token,
            AccessToken::Public => PUBLIC_TOKEN,
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(self, AccessToken::Public)
    }
}

/// Pick the access token of a request
///
/// The session token is used when present; otherwise the
/// `Authorization: Bearer <token>` header. The scheme is matched
/// case-insensitively. A missing header, another scheme, an empty token or a
/// value that is not visible ASCII all yield [`AccessToken::Public`].
pub fn extract_access_token(session_token: Option<&str>, headers: &HeaderMap) -> AccessToken {
    if let Some(token) = session_token.map(str::trim).filter(|t| !t.is_empty()) {
        return AccessToken::Bearer(token.to_string());
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .map(|token| AccessToken::Bearer(token.to_string()))
        .unwrap_or(AccessToken::Public)
}

fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(char::is_whitespace)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

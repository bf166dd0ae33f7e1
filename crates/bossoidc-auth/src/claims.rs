//! Decoded token payloads and userinfo documents

use bossoidc_store::NewLocalUser;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AuthError;

/// Claim holding the stable provider-assigned identity
pub const SUBJECT_CLAIM: &str = "sub";
/// Claim holding the username
pub const USERNAME_CLAIM: &str = "preferred_username";

/// First-name aliases, highest priority first
const FIRST_NAME_CLAIMS: &[&str] = &["christian_name", "given_name", "first_name"];
/// Last-name aliases, highest priority first
const LAST_NAME_CLAIMS: &[&str] = &["last_name", "family_name"];

/// Claims from a verified token or a userinfo response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

impl Claims {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Build claims from a JSON value; anything but an object is rejected
    pub fn from_value(value: Value) -> Result<Self, AuthError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(AuthError::InvalidTokenFormat(format!(
                "claims must be a JSON object, got {}",
                json_type(&other)
            ))),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// String value of a claim, `None` when absent or not a string
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn subject(&self) -> Option<&str> {
        self.get_str(SUBJECT_CLAIM)
    }

    pub fn preferred_username(&self) -> Option<&str> {
        self.get_str(USERNAME_CLAIM)
    }

    /// `sub` claim, or a missing-claims error
    pub fn require_subject(&self) -> Result<&str, AuthError> {
        self.subject().ok_or_else(|| missing(SUBJECT_CLAIM))
    }

    /// `preferred_username` claim, or a missing-claims error
    pub fn require_username(&self) -> Result<&str, AuthError> {
        self.preferred_username().ok_or_else(|| missing(USERNAME_CLAIM))
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    fn first_present(&self, names: &[&str]) -> Option<String> {
        names.iter().find_map(|name| self.get_str(name)).map(str::to_string)
    }
}

impl From<Map<String, Value>> for Claims {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn missing(name: &str) -> AuthError {
    AuthError::ClaimsVerificationFailed { missing: vec![name.to_string()] }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Profile data the provider chose to disclose
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileFields {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

impl ProfileFields {
    /// Pick the profile fields out of a userinfo document
    ///
    /// Providers disagree on naming, so several aliases are accepted. When more
    /// than one alias is present `christian_name` beats `given_name` beats
    /// `first_name`, and `last_name` beats `family_name`.
    pub fn from_userinfo(userinfo: &Claims) -> Self {
        Self {
            first_name: userinfo.first_present(FIRST_NAME_CLAIMS),
            last_name: userinfo.first_present(LAST_NAME_CLAIMS),
            email: userinfo.get_str("email").map(str::to_string),
        }
    }

    /// Initial record for a user created at `login_at`
    pub fn into_new_user(self, username: &str, login_at: DateTime<Utc>) -> NewLocalUser {
        NewLocalUser {
            username: username.to_string(),
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            last_login: Some(login_at),
        }
    }
}

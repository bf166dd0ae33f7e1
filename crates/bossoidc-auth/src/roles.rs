//! Realm and client role extraction from Keycloak access tokens

use serde_json::Value;

use crate::claims::Claims;

/// Client whose roles are Keycloak account-console roles, not application roles
pub const ACCOUNT_CLIENT: &str = "account";

/// Role granting `is_staff`
pub const ADMIN_ROLE: &str = "admin";
/// Role granting `is_staff` and `is_superuser`
pub const SUPERUSER_ROLE: &str = "superuser";

/// Extract realm roles followed by every client's roles
///
/// Realm roles come from `realm_access.roles`. Tokens issued through the
/// authorization_code grant may lack `realm_access`; their realm roles are read
/// from `resource_access.account.roles` instead. Every other client under
/// `resource_access` then contributes its `roles`. Duplicates are kept.
pub fn extract_roles(claims: &Claims) -> Vec<String> {
    let mut roles = if claims.contains("realm_access") {
        string_array(claims.get("realm_access"), &["roles"])
    } else {
        string_array(claims.get("resource_access"), &[ACCOUNT_CLIENT, "roles"])
    };

    if let Some(Value::Object(clients)) = claims.get("resource_access") {
        for (name, client) in clients {
            if name == ACCOUNT_CLIENT {
                continue;
            }
            roles.extend(string_array(Some(client), &["roles"]));
        }
    }

    roles
}

/// Staff status derived from roles
pub fn is_staff(roles: &[String]) -> bool {
    roles.iter().any(|r| r == ADMIN_ROLE || r == SUPERUSER_ROLE)
}

/// Superuser status derived from roles
pub fn is_superuser(roles: &[String]) -> bool {
    roles.iter().any(|r| r == SUPERUSER_ROLE)
}

fn string_array(value: Option<&Value>, path: &[&str]) -> Vec<String> {
    let mut current = match value {
        Some(v) => v,
        None => return Vec::new(),
    };

    for key in path {
        match current.get(*key) {
            Some(v) => current = v,
            None => return Vec::new(),
        }
    }

    current
        .as_array()
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default()
}

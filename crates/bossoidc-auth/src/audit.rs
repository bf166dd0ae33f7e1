//! Audit Logging
//!
//! Structured audit events for logins, emitted through `tracing`.
//!
//! ## Event Types
//!
//! - **AuthenticationSuccess**: a local user was reconciled for a verified token
//! - **AuthenticationFailure**: verification, claims or reconciliation failed
//! - **UntrustedAudience**: the token was not addressed to this application
//! - **StaleAccountDeleted**: an unlinked local account was removed because a
//!   new external identity claimed its username

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit event types for logins
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum AuditEvent {
    /// Successful login
    AuthenticationSuccess {
        /// External subject id
        subject: String,
        /// Local username
        username: String,
        /// Local user id
        user_id: i64,
        /// Timestamp of the event
        timestamp: DateTime<Utc>,
    },

    /// Failed login
    AuthenticationFailure {
        /// External subject id, if it was known when the failure happened
        #[serde(skip_serializing_if = "Option::is_none")]
        subject: Option<String>,
        /// Error category
        category: String,
        /// Error that occurred
        error: String,
        /// Timestamp of the event
        timestamp: DateTime<Utc>,
    },

    /// Token audience not trusted
    UntrustedAudience {
        /// Audiences carried by the token
        audience: Vec<String>,
        /// Timestamp of the event
        timestamp: DateTime<Utc>,
    },

    /// Local account deleted to stop a new identity inheriting its permissions
    StaleAccountDeleted {
        /// Username shared by the old account and the new identity
        username: String,
        /// Id of the deleted account
        deleted_user_id: i64,
        /// Subject the old account was linked to, if any
        #[serde(skip_serializing_if = "Option::is_none")]
        previous_subject: Option<String>,
        /// Subject taking over the username
        new_subject: String,
        /// Timestamp of the event
        timestamp: DateTime<Utc>,
    },
}

/// Log an audit event
///
/// Success events are logged at INFO, everything else at WARN.
pub fn log_audit_event(event: AuditEvent) {
    let json = match serde_json::to_string(&event) {
        Ok(j) => j,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize audit event");
            return;
        },
    };

    match &event {
        AuditEvent::AuthenticationSuccess { subject, username, user_id, timestamp } => {
            tracing::info!(
                audit_event = %json,
                subject = %subject,
                username = %username,
                user_id = user_id,
                timestamp = %timestamp,
                "Authentication succeeded"
            );
        },
        AuditEvent::AuthenticationFailure { subject, category, error, timestamp } => {
            tracing::warn!(
                audit_event = %json,
                subject = ?subject,
                category = %category,
                error = %error,
                timestamp = %timestamp,
                "Authentication failed"
            );
        },
        AuditEvent::UntrustedAudience { audience, timestamp } => {
            tracing::warn!(
                audit_event = %json,
                audience = ?audience,
                timestamp = %timestamp,
                "Token audience is not trusted"
            );
        },
        AuditEvent::StaleAccountDeleted {
            username,
            deleted_user_id,
            previous_subject,
            new_subject,
            timestamp,
        } => {
            tracing::warn!(
                audit_event = %json,
                username = %username,
                deleted_user_id = deleted_user_id,
                previous_subject = ?previous_subject,
                new_subject = %new_subject,
                timestamp = %timestamp,
                "Deleting user because it matches the authenticated username"
            );
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_serialization_success() {
        let event = AuditEvent::AuthenticationSuccess {
            subject: "kc-1".to_string(),
            username: "alice".to_string(),
            user_id: 7,
            timestamp: DateTime::from_timestamp(1234567890, 0).unwrap(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""event_type":"AuthenticationSuccess""#));
        assert!(json.contains("kc-1"));
        assert!(json.contains("alice"));
    }

    #[test]
    fn test_audit_event_serialization_stale_account() {
        let event = AuditEvent::StaleAccountDeleted {
            username: "alice".to_string(),
            deleted_user_id: 3,
            previous_subject: None,
            new_subject: "kc-1".to_string(),
            timestamp: DateTime::from_timestamp(1234567890, 0).unwrap(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("StaleAccountDeleted"));
        assert!(json.contains(r#""deleted_user_id":3"#));
        assert!(!json.contains("previous_subject"));
    }

    #[test]
    fn test_audit_event_round_trip() {
        let event = AuditEvent::UntrustedAudience {
            audience: vec!["account".to_string()],
            timestamp: DateTime::from_timestamp(1234567890, 0).unwrap(),
        };

        let json = serde_json::to_string(&event).unwrap();
        match serde_json::from_str::<AuditEvent>(&json).unwrap() {
            AuditEvent::UntrustedAudience { audience, .. } => assert_eq!(audience, vec!["account"]),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_log_audit_event_does_not_panic() {
        log_audit_event(AuditEvent::AuthenticationFailure {
            subject: None,
            category: "SecurityViolation".to_string(),
            error: "Invalid signature".to_string(),
            timestamp: Utc::now(),
        });
    }
}

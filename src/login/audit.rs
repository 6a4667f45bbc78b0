//! Audit logging for login and renewal outcomes.
//!
//! Every event is emitted via `tracing::info!` as a JSON blob in the `audit`
//! field.
//!
//! # Events
//!
//! | Event | When |
//! |-------|------|
//! | `login.granted` | A login produced a grant |
//! | `login.denied` | A login failed at any stage |
//! | `lease.renewed` | A renewal returned an extension |
//! | `lease.denied` | A renewal was refused |

use serde::Serialize;

use super::LoginStage;
use crate::pki::InstanceIdentity;

/// Structured audit event.
#[derive(Debug, Serialize)]
pub struct AuditEvent {
    /// Event type string (e.g., `"login.granted"`).
    pub event: &'static str,
    /// Resolved identity, once known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<InstanceIdentity>,
    /// Granted policies (for `login.granted`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policies: Option<Vec<String>>,
    /// Stage at which a login failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<LoginStage>,
    /// Error code (see `Error::kind`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    /// Seconds granted (for `lease.renewed`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub granted_secs: Option<u64>,
    /// Human-readable reason for denial events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuditEvent {
    fn empty(event: &'static str) -> Self {
        Self {
            event,
            identity: None,
            policies: None,
            stage: None,
            error: None,
            granted_secs: None,
            reason: None,
        }
    }

    /// Construct a `login.granted` event.
    #[must_use]
    pub fn granted(identity: &InstanceIdentity, policies: &[String]) -> Self {
        Self {
            identity: Some(identity.clone()),
            policies: Some(policies.to_vec()),
            ..Self::empty("login.granted")
        }
    }

    /// Construct a `login.denied` event.
    #[must_use]
    pub fn denied(stage: LoginStage, error: &crate::Error) -> Self {
        Self {
            stage: Some(stage),
            error: Some(error.kind()),
            reason: Some(error.to_string()),
            ..Self::empty("login.denied")
        }
    }

    /// Construct a `lease.renewed` event.
    #[must_use]
    pub fn renewed(granted_secs: u64) -> Self {
        Self {
            granted_secs: Some(granted_secs),
            ..Self::empty("lease.renewed")
        }
    }

    /// Construct a `lease.denied` event.
    #[must_use]
    pub fn renewal_denied(error: &crate::Error) -> Self {
        Self {
            error: Some(error.kind()),
            reason: Some(error.to_string()),
            ..Self::empty("lease.denied")
        }
    }
}

/// Emit an audit event via `tracing::info!`.
///
/// ```text
/// INFO instance_cert_auth::login::audit audit={"event":"login.granted",...}
/// ```
pub fn emit(event: &AuditEvent) {
    match serde_json::to_string(event) {
        Ok(ref json) => tracing::info!(audit = %json, "login audit"),
        Err(ref e) => tracing::warn!(error = %e, "Failed to serialize audit event"),
    }
}

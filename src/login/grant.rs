//! Credential grant and lease arithmetic.

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::config::humantime_serde;
use crate::pki::unix_secs;
use crate::{Error, Result};

/// Validity window attached to a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    /// Initial validity
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// Hard ceiling measured from `issued_at`
    #[serde(with = "humantime_serde")]
    pub max_ttl: Duration,
    /// Whether renewal is permitted
    pub renewable: bool,
    /// Issue time, unix seconds
    pub issued_at: u64,
}

impl Lease {
    /// Lease issued at `now`.
    #[must_use]
    pub fn new(ttl: Duration, max_ttl: Duration, now: SystemTime) -> Self {
        Self {
            ttl,
            max_ttl,
            renewable: true,
            issued_at: u64::try_from(unix_secs(now)).unwrap_or(0),
        }
    }

    /// Absolute ceiling, unix seconds.
    #[must_use]
    pub fn expires_at(&self) -> u64 {
        self.issued_at.saturating_add(self.max_ttl.as_secs())
    }
}

/// Result of a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialGrant {
    /// Merged policy set
    pub policies: Vec<String>,
    /// `orgId`, `workspaceId`, `appId`
    pub metadata: BTreeMap<String, String>,
    /// Validity window
    pub lease: Lease,
}

/// Compute the extension granted on renewal.
///
/// A zero `requested` increment means "one step". The result never reaches
/// past the lease ceiling.
pub fn extend_lease(
    lease: Option<&Lease>,
    requested: Duration,
    step: Duration,
    now: SystemTime,
) -> Result<Duration> {
    let lease = lease.ok_or(Error::MissingAuthContext)?;
    if !lease.renewable {
        return Err(Error::InvalidRequest("lease is not renewable".to_string()));
    }

    let now = u64::try_from(unix_secs(now)).unwrap_or(0);
    let ceiling = lease.expires_at();
    if now > ceiling {
        return Err(Error::LeaseExpired);
    }
    let remaining = Duration::from_secs(ceiling - now);

    let increment = if requested.is_zero() { step } else { requested };
    Ok(increment.min(remaining))
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEP: Duration = Duration::from_secs(30);

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn lease(max_ttl: u64) -> Lease {
        Lease::new(Duration::from_secs(300), Duration::from_secs(max_ttl), at(1_000))
    }

    #[test]
    fn request_beyond_ceiling_is_capped() {
        // GIVEN: ceiling T = 600s from issue
        let lease = lease(600);

        // WHEN: T + 100s requested at issue time
        let granted = extend_lease(Some(&lease), Duration::from_secs(700), STEP, at(1_000)).unwrap();

        // THEN
        assert_eq!(granted, Duration::from_secs(600));
    }

    #[test]
    fn small_request_is_granted_as_is() {
        let granted =
            extend_lease(Some(&lease(600)), Duration::from_secs(10), STEP, at(1_000)).unwrap();
        assert_eq!(granted, Duration::from_secs(10));
    }

    #[test]
    fn zero_request_uses_step() {
        let granted = extend_lease(Some(&lease(600)), Duration::ZERO, STEP, at(1_000)).unwrap();
        assert_eq!(granted, STEP);
    }

    #[test]
    fn ceiling_shrinks_as_time_passes() {
        let granted =
            extend_lease(Some(&lease(600)), Duration::from_secs(60), STEP, at(1_580)).unwrap();
        assert_eq!(granted, Duration::from_secs(20));
    }

    #[test]
    fn missing_lease_is_missing_auth_context() {
        let err = extend_lease(None, Duration::from_secs(10), STEP, at(1_000)).unwrap_err();
        assert!(matches!(err, Error::MissingAuthContext));
    }

    #[test]
    fn past_ceiling_is_expired() {
        let err =
            extend_lease(Some(&lease(600)), Duration::from_secs(10), STEP, at(1_601)).unwrap_err();
        assert!(matches!(err, Error::LeaseExpired));
    }

    #[test]
    fn non_renewable_lease_is_rejected() {
        let mut lease = lease(600);
        lease.renewable = false;
        let err = extend_lease(Some(&lease), Duration::from_secs(10), STEP, at(1_000)).unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn lease_serializes_durations_as_seconds() {
        let json = serde_json::to_value(lease(600)).unwrap();
        assert_eq!(json["ttl"], "300s");
        assert_eq!(json["max_ttl"], "600s");
        assert_eq!(json["issued_at"], 1_000);

        let back: Lease = serde_json::from_value(json).unwrap();
        assert_eq!(back, lease(600));
    }

    #[test]
    fn oversized_client_lease_is_a_parse_error() {
        let raw = r#"{"ttl":"1s","max_ttl":"307445734561825861m","renewable":true,"issued_at":0}"#;
        assert!(serde_json::from_str::<Lease>(raw).is_err());
    }
}

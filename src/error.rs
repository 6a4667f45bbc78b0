//! Error types for the certificate login backend

use std::io;

use thiserror::Error;

use crate::storage::StorageError;

/// Result type alias for the certificate login backend
pub type Result<T> = std::result::Result<T, Error>;

/// Certificate login errors
///
/// Every login stage fails with exactly one of these variants; no grant is
/// ever returned alongside an error.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed base64, PEM, or key payload
    #[error("decode error: {0}")]
    Decode(String),

    /// Fewer than two certificates (leaf + intermediate) were supplied
    #[error("login request must include the instance intermediate CA ({found} certificate(s) supplied)")]
    InsufficientChain {
        /// Number of certificates that decoded successfully
        found: usize,
    },

    /// No trust path from the leaf to a stored anchor
    #[error("certificate chain validation failed: {0}")]
    ChainValidation(String),

    /// Leaf certificate carries a non-RSA public key
    #[error("unsupported public key algorithm: {0}")]
    UnsupportedKeyAlgorithm(String),

    /// Private key modulus differs from the certificate's public modulus
    #[error("private key does not match certificate public key")]
    KeyMismatch,

    /// Fewer than three organizational units, or an entry without `label:value`
    #[error("malformed identity field: {0}")]
    MalformedIdentity(String),

    /// Storage failure while resolving one of the policy namespaces
    #[error("{namespace} policy lookup failed: {source}")]
    NamespaceLookup {
        /// Namespace being resolved (`apps`, `workspaces`, `orgs`)
        namespace: &'static str,
        /// Underlying storage failure
        #[source]
        source: StorageError,
    },

    /// Renewal requested without the grant it extends
    #[error("renewal requires an active grant context")]
    MissingAuthContext,

    /// Renewal requested after the lease ceiling has passed
    #[error("lease is past its maximum TTL and cannot be renewed")]
    LeaseExpired,

    /// Storage error outside of policy resolution
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Entry not found (administrative reads)
    #[error("not found: {0}")]
    NotFound(String),

    /// Request fields failed validation
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable code, used in error bodies and audit events.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode_error",
            Self::InsufficientChain { .. } => "insufficient_chain",
            Self::ChainValidation(_) => "chain_validation_failed",
            Self::UnsupportedKeyAlgorithm(_) => "unsupported_key_algorithm",
            Self::KeyMismatch => "key_mismatch",
            Self::MalformedIdentity(_) => "malformed_identity",
            Self::NamespaceLookup { .. } => "namespace_lookup_failed",
            Self::MissingAuthContext => "missing_auth_context",
            Self::LeaseExpired => "lease_expired",
            Self::Storage(_) => "storage_error",
            Self::NotFound(_) => "not_found",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Config(_) => "config_error",
            Self::Io(_) | Self::Json(_) | Self::Internal(_) => "internal_error",
        }
    }

    /// Whether this error is a credential rejection (as opposed to a
    /// malformed request or a server-side failure).
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::ChainValidation(_) | Self::KeyMismatch | Self::UnsupportedKeyAlgorithm(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_distinct_for_login_taxonomy() {
        let errors = [
            Error::Decode("x".into()),
            Error::InsufficientChain { found: 1 },
            Error::ChainValidation("x".into()),
            Error::UnsupportedKeyAlgorithm("EC".into()),
            Error::KeyMismatch,
            Error::MalformedIdentity("x".into()),
            Error::NamespaceLookup {
                namespace: "apps",
                source: StorageError::Unavailable("down".into()),
            },
            Error::MissingAuthContext,
        ];
        let mut kinds: Vec<_> = errors.iter().map(Error::kind).collect();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn namespace_lookup_names_the_namespace() {
        let err = Error::NamespaceLookup {
            namespace: "workspaces",
            source: StorageError::Unavailable("backend down".into()),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("workspaces policy lookup failed"));
        assert!(msg.contains("backend down"));
    }

    #[test]
    fn insufficient_chain_reports_count() {
        let err = Error::InsufficientChain { found: 1 };
        assert!(err.to_string().contains("1 certificate(s)"));
    }

    #[test]
    fn only_credential_failures_are_rejections() {
        assert!(Error::KeyMismatch.is_rejection());
        assert!(Error::ChainValidation("no path".into()).is_rejection());
        assert!(!Error::Decode("bad".into()).is_rejection());
        assert!(!Error::MissingAuthContext.is_rejection());
    }
}

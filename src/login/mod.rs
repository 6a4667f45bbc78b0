//! Login orchestration.
//!
//! A login moves through fixed stages; the first failing stage ends it with
//! that stage's error and no grant:
//!
//! ```text
//! Decoding → ChainValidating → PossessionVerifying
//!          → IdentityExtracting → PolicyResolving → Granting
//! ```
//!
//! Nothing is cached between logins. Trust anchors and policy mappings are
//! read from storage on every evaluation, so administrative changes apply to
//! the next login.

pub mod audit;
pub mod grant;

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use grant::{CredentialGrant, Lease, extend_lease};

use crate::config::LeaseConfig;
use crate::pki::{
    InstanceIdentity, decode_certificates, decode_private_key, load_trust_anchors, verify_chain,
    verify_possession,
};
use crate::policy::PolicyNamespaces;
use crate::storage::Storage;
use crate::{Error, Result};

/// Login evaluation stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginStage {
    /// Decoding the certificate chain and private key
    Decoding,
    /// Verifying the chain against the trust store
    ChainValidating,
    /// Matching the private key to the leaf
    PossessionVerifying,
    /// Reading organization/workspace/app ids
    IdentityExtracting,
    /// Resolving the three policy namespaces
    PolicyResolving,
    /// Building the grant
    Granting,
}

impl fmt::Display for LoginStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Decoding => "decoding",
            Self::ChainValidating => "chain_validating",
            Self::PossessionVerifying => "possession_verifying",
            Self::IdentityExtracting => "identity_extracting",
            Self::PolicyResolving => "policy_resolving",
            Self::Granting => "granting",
        })
    }
}

/// Login input: base64 PEM certificate chain (leaf first) and base64 PEM
/// PKCS#1 private key.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LoginRequest {
    /// Leaf followed by its intermediate
    #[serde(default)]
    pub certificate: String,
    /// Leaf private key
    #[serde(default)]
    pub key: String,
}

impl LoginRequest {
    /// Build from named string fields. Absent fields read as empty.
    #[must_use]
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        let field = |name: &str| fields.get(name).cloned().unwrap_or_default();
        Self {
            certificate: field("certificate"),
            key: field("key"),
        }
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("certificate_len", &self.certificate.len())
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Runs logins and renewals.
#[derive(Debug, Clone)]
pub struct Authenticator {
    namespaces: PolicyNamespaces,
    ttl: Duration,
    renew_step: Duration,
}

impl Authenticator {
    /// Authenticator over the standard namespaces.
    #[must_use]
    pub fn new(lease: &LeaseConfig) -> Self {
        Self {
            namespaces: PolicyNamespaces::standard(),
            ttl: lease.ttl,
            renew_step: lease.renew_increment,
        }
    }

    /// Policy namespaces consulted on login.
    #[must_use]
    pub fn namespaces(&self) -> &PolicyNamespaces {
        &self.namespaces
    }

    /// Evaluate a login now.
    pub async fn login(&self, storage: &dyn Storage, request: &LoginRequest) -> Result<CredentialGrant> {
        self.login_at(storage, request, SystemTime::now()).await
    }

    /// Evaluate a login as of `now`.
    pub async fn login_at(
        &self,
        storage: &dyn Storage,
        request: &LoginRequest,
        now: SystemTime,
    ) -> Result<CredentialGrant> {
        let mut stage = LoginStage::Decoding;
        match self.evaluate(storage, request, now, &mut stage).await {
            Ok((identity, grant)) => {
                audit::emit(&audit::AuditEvent::granted(&identity, &grant.policies));
                Ok(grant)
            }
            Err(e) => {
                warn!(stage = %stage, error = %e, "Login denied");
                audit::emit(&audit::AuditEvent::denied(stage, &e));
                Err(e)
            }
        }
    }

    async fn evaluate(
        &self,
        storage: &dyn Storage,
        request: &LoginRequest,
        now: SystemTime,
        stage: &mut LoginStage,
    ) -> Result<(InstanceIdentity, CredentialGrant)> {
        *stage = LoginStage::Decoding;
        let certs = decode_certificates(&request.certificate)?;
        if certs.len() < 2 {
            return Err(Error::InsufficientChain { found: certs.len() });
        }
        let key = decode_private_key(&request.key)?;
        let (leaf, intermediate) = (&certs[0], &certs[1]);
        debug!(leaf = %leaf.subject(), certificates = certs.len(), "Decoded login credentials");

        *stage = LoginStage::ChainValidating;
        let anchors = load_trust_anchors(storage).await;
        let chain = verify_chain(&anchors, leaf, intermediate, now)?;
        debug!(anchor = %chain.anchor, via_intermediate = chain.via_intermediate, "Chain verified");

        *stage = LoginStage::PossessionVerifying;
        verify_possession(leaf, &key)?;

        *stage = LoginStage::IdentityExtracting;
        let identity = InstanceIdentity::from_certificate(leaf)?;
        debug!(
            org_id = %identity.org_id,
            workspace_id = %identity.workspace_id,
            app_id = %identity.app_id,
            "Identity extracted"
        );

        *stage = LoginStage::PolicyResolving;
        let policies = self.namespaces.resolve(storage, &identity).await?;

        *stage = LoginStage::Granting;
        let max_ttl = leaf.remaining_lifetime(now);
        let grant = CredentialGrant {
            policies,
            metadata: identity.metadata(),
            lease: Lease::new(self.ttl.min(max_ttl), max_ttl, now),
        };
        Ok((identity, grant))
    }

    /// Clamp a renewal request against the lease ceiling, as of now.
    pub fn renew(&self, lease: Option<&Lease>, requested: Duration) -> Result<Duration> {
        self.renew_at(lease, requested, SystemTime::now())
    }

    /// Clamp a renewal request against the lease ceiling, as of `now`.
    pub fn renew_at(&self, lease: Option<&Lease>, requested: Duration, now: SystemTime) -> Result<Duration> {
        match extend_lease(lease, requested, self.renew_step, now) {
            Ok(granted) => {
                audit::emit(&audit::AuditEvent::renewed(granted.as_secs()));
                Ok(granted)
            }
            Err(e) => {
                warn!(error = %e, "Renewal denied");
                audit::emit(&audit::AuditEvent::renewal_denied(&e));
                Err(e)
            }
        }
    }
}

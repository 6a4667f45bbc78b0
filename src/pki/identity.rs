//! Instance identity carried in the leaf's organizational units.
//!
//! Instance certificates encode their placement as three OUs, in order:
//!
//! ```text
//! OU=organization:<org id>, OU=space:<workspace id>, OU=app:<app id>
//! ```
//!
//! Extraction is positional. Only the text after the first colon is used and
//! the label before it is not checked, so certificates with reordered OUs
//! yield a reordered identity.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::certificate::Certificate;
use crate::{Error, Result};

/// Metadata key for the organization id.
pub const ORG_ID_KEY: &str = "orgId";
/// Metadata key for the workspace id.
pub const WORKSPACE_ID_KEY: &str = "workspaceId";
/// Metadata key for the application id.
pub const APP_ID_KEY: &str = "appId";

const REQUIRED_OUS: usize = 3;

/// Organization, workspace and application an instance belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceIdentity {
    /// Organization id (OU #1)
    pub org_id: String,
    /// Workspace id (OU #2)
    pub workspace_id: String,
    /// Application id (OU #3)
    pub app_id: String,
}

impl InstanceIdentity {
    /// Extract the identity from a leaf certificate.
    ///
    /// Fails with `MalformedIdentity` when fewer than three OUs are present or
    /// one of the first three has no `label:` prefix.
    pub fn from_certificate(cert: &Certificate) -> Result<Self> {
        let ous = cert.organizational_units();
        if ous.len() < REQUIRED_OUS {
            return Err(Error::MalformedIdentity(format!(
                "expected at least {REQUIRED_OUS} organizational units, found {}",
                ous.len()
            )));
        }

        Ok(Self {
            org_id: ou_value(&ous[0])?.to_string(),
            workspace_id: ou_value(&ous[1])?.to_string(),
            app_id: ou_value(&ous[2])?.to_string(),
        })
    }

    /// Grant metadata: `orgId`, `workspaceId`, `appId`.
    #[must_use]
    pub fn metadata(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (ORG_ID_KEY.to_string(), self.org_id.clone()),
            (WORKSPACE_ID_KEY.to_string(), self.workspace_id.clone()),
            (APP_ID_KEY.to_string(), self.app_id.clone()),
        ])
    }
}

fn ou_value(ou: &str) -> Result<&str> {
    ou.split_once(':')
        .map(|(_, value)| value)
        .ok_or_else(|| {
            Error::MalformedIdentity(format!("organizational unit '{ou}' is not 'label:value'"))
        })
}

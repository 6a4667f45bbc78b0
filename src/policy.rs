//! Policy namespaces: identifier → policy list mappings.
//!
//! # Design
//!
//! Three independent namespaces (`apps`, `workspaces`, `orgs`) share one
//! [`PolicyMap`] implementation. Each maps an identifier to an ordered list
//! of policy names stored at `map/<namespace>/<id>` as
//! `{"policies": [...]}`.
//!
//! ## Fallback
//!
//! Resolution returns the entry for the identifier if present, otherwise the
//! entry stored under the reserved `default` key, otherwise an empty list.
//! Only a failing storage read is reported as an error.
//!
//! ## Merging
//!
//! A login resolves all three namespaces and reduces the concatenation to a
//! duplicate-free set. The merged set is returned sorted.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pki::InstanceIdentity;
use crate::storage::{Storage, StorageError};
use crate::{Error, Result};

/// Storage prefix shared by all namespaces.
pub const MAP_PREFIX: &str = "map/";

/// Reserved identifier whose list applies when no specific entry exists.
pub const DEFAULT_KEY: &str = "default";

/// Persisted form of a mapping entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyEntry {
    /// Policy names, in the order they were written
    pub policies: Vec<String>,
}

/// Policy list as accepted from administrators: a JSON list or a
/// comma-separated string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PolicyList {
    /// `["a", "b"]`
    List(Vec<String>),
    /// `"a,b"`
    Csv(String),
}

impl PolicyList {
    /// Normalize into a validated list.
    ///
    /// Names are trimmed. Empty names and names containing a comma are
    /// rejected.
    pub fn into_policies(self) -> Result<Vec<String>> {
        let raw = match self {
            Self::List(list) => list,
            Self::Csv(csv) => {
                if csv.trim().is_empty() {
                    return Ok(Vec::new());
                }
                csv.split(',').map(str::to_string).collect()
            }
        };

        raw.into_iter()
            .map(|name| {
                let name = name.trim();
                if name.is_empty() {
                    Err(Error::InvalidRequest("policy names must not be empty".to_string()))
                } else if name.contains(',') {
                    Err(Error::InvalidRequest(format!(
                        "policy name '{name}' must not contain ','"
                    )))
                } else {
                    Ok(name.to_string())
                }
            })
            .collect()
    }
}

/// Parse a comma-separated policy string (CLI input).
pub fn parse_policy_list(raw: &str) -> Result<Vec<String>> {
    PolicyList::Csv(raw.to_string()).into_policies()
}

/// One namespace of identifier → policies mappings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyMap {
    name: &'static str,
    default_key: &'static str,
}

impl PolicyMap {
    /// Namespace stored under `map/<name>/` with the `default` fallback key.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            default_key: DEFAULT_KEY,
        }
    }

    /// Namespace name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    fn prefix(&self) -> String {
        format!("{MAP_PREFIX}{}/", self.name)
    }

    // Identifiers are case-insensitive
    fn key_for(&self, id: &str) -> std::result::Result<String, StorageError> {
        let id = id.trim().to_lowercase();
        if id.is_empty() || id.contains('/') || id == "." || id == ".." {
            return Err(StorageError::InvalidKey(format!("{}{id}", self.prefix())));
        }
        Ok(format!("{}{id}", self.prefix()))
    }

    /// Read the entry stored for exactly `id`.
    pub async fn get(
        &self,
        storage: &dyn Storage,
        id: &str,
    ) -> std::result::Result<Option<PolicyEntry>, StorageError> {
        let key = self.key_for(id)?;
        let Some(raw) = storage.get(&key).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| StorageError::Corrupt {
                key,
                reason: e.to_string(),
            })
    }

    /// Resolve `id` to its policies, falling back to the default entry.
    pub async fn policies(
        &self,
        storage: &dyn Storage,
        id: &str,
    ) -> std::result::Result<Vec<String>, StorageError> {
        // An id that cannot be a storage key has no specific entry
        if self.key_for(id).is_ok() {
            if let Some(entry) = self.get(storage, id).await? {
                debug!(namespace = self.name, id = %id, "Resolved specific policy mapping");
                return Ok(entry.policies);
            }
        }
        if let Some(entry) = self.get(storage, self.default_key).await? {
            debug!(namespace = self.name, id = %id, "Resolved default policy mapping");
            return Ok(entry.policies);
        }
        debug!(namespace = self.name, id = %id, "No policy mapping");
        Ok(Vec::new())
    }

    /// Store `policies` for `id`.
    pub async fn put(&self, storage: &dyn Storage, id: &str, policies: PolicyList) -> Result<()> {
        let key = self.key_for(id).map_err(|e| Error::InvalidRequest(e.to_string()))?;
        let entry = PolicyEntry {
            policies: policies.into_policies()?,
        };
        storage.put(&key, serde_json::to_vec(&entry)?).await?;
        debug!(namespace = self.name, id = %id, count = entry.policies.len(), "Stored policy mapping");
        Ok(())
    }

    /// Remove the entry for `id`.
    pub async fn delete(&self, storage: &dyn Storage, id: &str) -> Result<()> {
        let key = self.key_for(id).map_err(|e| Error::InvalidRequest(e.to_string()))?;
        storage.delete(&key).await?;
        Ok(())
    }

    /// Identifiers with a stored entry, including `default` if set.
    pub async fn list(&self, storage: &dyn Storage) -> Result<Vec<String>> {
        let names = storage.list(&self.prefix()).await?;
        Ok(names.into_iter().filter(|n| !n.ends_with('/')).collect())
    }
}

/// The three namespaces consulted on login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyNamespaces {
    /// Application id → policies
    pub apps: PolicyMap,
    /// Workspace id → policies
    pub workspaces: PolicyMap,
    /// Organization id → policies
    pub orgs: PolicyMap,
}

impl Default for PolicyNamespaces {
    fn default() -> Self {
        Self::standard()
    }
}

impl PolicyNamespaces {
    /// `apps`, `workspaces`, `orgs`.
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            apps: PolicyMap::new("apps"),
            workspaces: PolicyMap::new("workspaces"),
            orgs: PolicyMap::new("orgs"),
        }
    }

    /// Look up a namespace by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PolicyMap> {
        match name {
            "apps" => Some(&self.apps),
            "workspaces" => Some(&self.workspaces),
            "orgs" => Some(&self.orgs),
            _ => None,
        }
    }

    /// Resolve an identity against all three namespaces and merge.
    pub async fn resolve(
        &self,
        storage: &dyn Storage,
        identity: &InstanceIdentity,
    ) -> Result<Vec<String>> {
        let lookups = [
            (&self.apps, identity.app_id.as_str()),
            (&self.workspaces, identity.workspace_id.as_str()),
            (&self.orgs, identity.org_id.as_str()),
        ];

        let mut lists = Vec::with_capacity(lookups.len());
        for (map, id) in lookups {
            let policies = map
                .policies(storage, id)
                .await
                .map_err(|source| Error::NamespaceLookup {
                    namespace: map.name(),
                    source,
                })?;
            lists.push(policies);
        }

        Ok(merge_policies(lists))
    }
}

/// Union of policy lists without duplicates, sorted.
pub fn merge_policies<I, L>(lists: I) -> Vec<String>
where
    I: IntoIterator<Item = L>,
    L: IntoIterator<Item = String>,
{
    lists
        .into_iter()
        .flatten()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

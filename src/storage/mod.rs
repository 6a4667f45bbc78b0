//! Storage: the keyed byte store backing the trust store and policy maps.
//!
//! The login path only reads (`list`, `get`); administrative operations also
//! write (`put`, `delete`). Implementations must be `Send + Sync` because a
//! single store is shared by every concurrent login.
//!
//! # Key layout
//!
//! ```text
//! cert/<name>                 trusted certificate bundle (JSON)
//! map/apps/<app id>           application policy mapping (JSON)
//! map/workspaces/<ws id>      workspace policy mapping (JSON)
//! map/orgs/<org id>           organization policy mapping (JSON)
//! ```
//!
//! `list(prefix)` returns the names directly below `prefix` with the prefix
//! stripped, sorted; deeper levels appear once, with a trailing `/`.

pub mod file;

use std::collections::BTreeSet;

use dashmap::DashMap;
use thiserror::Error;

pub use file::FileStorage;

/// Storage failures.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying I/O failed for `key`.
    #[error("I/O error on '{key}': {source}")]
    Io {
        /// Key (or prefix) being accessed
        key: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Key is not a valid storage path.
    #[error("invalid storage key '{0}'")]
    InvalidKey(String),

    /// Stored value could not be decoded.
    #[error("corrupt entry at '{key}': {reason}")]
    Corrupt {
        /// Key of the corrupt entry
        key: String,
        /// Decoding failure
        reason: String,
    },

    /// Backend is not reachable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Trait abstracting the persisted key-value store.
#[async_trait::async_trait]
pub trait Storage: Send + Sync + 'static {
    /// List the names directly under `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Fetch the value stored at `key`, or `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Store `value` at `key`, replacing any previous value.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

    /// Remove `key`. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Reject keys that cannot name a single entry.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    let bad = key.is_empty()
        || key.ends_with('/')
        || key
            .split('/')
            .any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Collapse full keys under `prefix` into their first path segment.
fn children<'a>(prefix: &str, keys: impl Iterator<Item = &'a str>) -> Vec<String> {
    let names: BTreeSet<String> = keys
        .filter_map(|k| k.strip_prefix(prefix))
        .filter(|rest| !rest.is_empty())
        .map(|rest| match rest.find('/') {
            Some(idx) => rest[..=idx].to_string(),
            None => rest.to_string(),
        })
        .collect();
    names.into_iter().collect()
}

/// In-memory storage backed by a `DashMap`.
///
/// Used by tests and by the `memory` storage mode, where trust anchors and
/// mappings are loaded through the admin API after startup.
#[derive(Default)]
pub struct InMemoryStorage {
    entries: DashMap<String, Vec<u8>>,
}

impl InMemoryStorage {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait::async_trait]
impl Storage for InMemoryStorage {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        Ok(children(prefix, keys.iter().map(String::as_str)))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        validate_key(key)?;
        Ok(self.entries.get(key).map(|e| e.value().clone()))
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        validate_key(key)?;
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        self.entries.remove(key);
        Ok(())
    }
}

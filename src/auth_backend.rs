//! The authentication backend: storage plus login/renew operations.
//!
//! Transports (the HTTP server, the CLI) hold an `Arc<AuthBackend>` and call
//! into it; the backend itself has no transport knowledge.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::Result;
use crate::config::{Config, StorageKind};
use crate::login::{Authenticator, CredentialGrant, Lease, LoginRequest};
use crate::policy::{PolicyMap, PolicyNamespaces};
use crate::storage::{FileStorage, InMemoryStorage, Storage};

/// Certificate login backend.
pub struct AuthBackend {
    storage: Arc<dyn Storage>,
    authenticator: Authenticator,
}

impl AuthBackend {
    /// Backend over an existing store.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, authenticator: Authenticator) -> Self {
        Self {
            storage,
            authenticator,
        }
    }

    /// Open the configured storage and build the backend.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let storage: Arc<dyn Storage> = match config.storage.kind {
            StorageKind::Memory => {
                info!("Using in-memory storage");
                Arc::new(InMemoryStorage::new())
            }
            StorageKind::File => {
                let path = config.storage.resolved_path()?;
                info!(path = %path.display(), "Using file storage");
                Arc::new(FileStorage::open(path).await?)
            }
        };
        Ok(Self::new(storage, Authenticator::new(&config.lease)))
    }

    /// Backing store.
    #[must_use]
    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    /// Policy namespaces.
    #[must_use]
    pub fn namespaces(&self) -> &PolicyNamespaces {
        self.authenticator.namespaces()
    }

    /// Namespace by name (`apps`, `workspaces`, `orgs`).
    #[must_use]
    pub fn namespace(&self, name: &str) -> Option<&PolicyMap> {
        self.namespaces().get(name)
    }

    /// Login from named string fields (`certificate`, `key`).
    pub async fn login(&self, fields: &HashMap<String, String>) -> Result<CredentialGrant> {
        self.login_request(&LoginRequest::from_fields(fields)).await
    }

    /// Login from a parsed request.
    pub async fn login_request(&self, request: &LoginRequest) -> Result<CredentialGrant> {
        self.authenticator.login(self.storage(), request).await
    }

    /// Clamp a renewal against the lease it extends.
    pub fn renew(&self, lease: Option<&Lease>, requested: Duration) -> Result<Duration> {
        self.authenticator.renew(lease, requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::testing::{INTERMEDIATE_CA, LEAF, LEAF_KEY, b64, seeded_storage};

    #[tokio::test]
    async fn login_from_fields() {
        let backend = AuthBackend::new(
            Arc::new(seeded_storage().await),
            Authenticator::new(&crate::config::LeaseConfig::default()),
        );
        let fields = HashMap::from([
            ("certificate".to_string(), b64(&format!("{LEAF}{INTERMEDIATE_CA}"))),
            ("key".to_string(), b64(LEAF_KEY)),
        ]);

        let grant = backend.login(&fields).await.unwrap();
        assert_eq!(grant.policies.len(), 4);
    }

    #[tokio::test]
    async fn missing_fields_fail_as_insufficient_chain() {
        let backend = AuthBackend::new(
            Arc::new(InMemoryStorage::new()),
            Authenticator::new(&crate::config::LeaseConfig::default()),
        );
        let err = backend.login(&HashMap::new()).await.unwrap_err();
        assert!(matches!(err, Error::InsufficientChain { found: 0 }));
    }

    #[tokio::test]
    async fn from_config_opens_file_storage() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.path = Some(dir.path().join("store"));

        let backend = AuthBackend::from_config(&config).await.unwrap();

        assert!(backend.storage().list("cert/").await.unwrap().is_empty());
        assert!(dir.path().join("store").is_dir());
    }

    #[tokio::test]
    async fn renew_without_lease_is_missing_context() {
        let mut config = Config::default();
        config.storage.kind = StorageKind::Memory;
        let backend = AuthBackend::from_config(&config).await.unwrap();

        let err = backend.renew(None, Duration::from_secs(10)).unwrap_err();
        assert!(matches!(err, Error::MissingAuthContext));
    }
}

//! Shared unit-test fixtures.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::pki::write_trusted_cert;
use crate::policy::{PolicyList, PolicyNamespaces};
use crate::storage::{InMemoryStorage, Storage, StorageError};

pub(crate) const ROOT_CA: &str = include_str!("../tests/fixtures/root_ca.pem");
pub(crate) const INTERMEDIATE_CA: &str = include_str!("../tests/fixtures/intermediate_ca.pem");
pub(crate) const LEAF: &str = include_str!("../tests/fixtures/leaf.pem");
pub(crate) const LEAF_KEY: &str = include_str!("../tests/fixtures/leaf.key");
pub(crate) const LEAF_PKCS8_KEY: &str = include_str!("../tests/fixtures/leaf_pkcs8.key");
pub(crate) const OTHER_KEY: &str = include_str!("../tests/fixtures/other.key");
pub(crate) const EC_LEAF: &str = include_str!("../tests/fixtures/ec_leaf.pem");
pub(crate) const TWO_OU_LEAF: &str = include_str!("../tests/fixtures/two_ou.pem");
pub(crate) const NO_COLON_LEAF: &str = include_str!("../tests/fixtures/no_colon.pem");
pub(crate) const EXPIRED_LEAF: &str = include_str!("../tests/fixtures/expired.pem");
pub(crate) const ROGUE_INTERMEDIATE: &str = include_str!("../tests/fixtures/rogue_inter.pem");
pub(crate) const ROGUE_LEAF: &str = include_str!("../tests/fixtures/rogue_leaf.pem");

pub(crate) const ORG_ID: &str = "6f1a0c9e-4a55-4c41-9d2a-0f3c0b7e1a11";
pub(crate) const WORKSPACE_ID: &str = "b2d7e0c4-8e1f-4a3b-a6c9-5d4e3f2a1b00";
pub(crate) const APP_ID: &str = "9c8b7a6d-5e4f-4a3b-8c2d-1e0f9a8b7c6d";

pub(crate) fn b64(text: &str) -> String {
    STANDARD.encode(text)
}

fn policies(names: &[&str]) -> PolicyList {
    PolicyList::List(names.iter().map(|s| (*s).to_string()).collect())
}

/// Root CA trusted, leaf's app and workspace mapped, orgs via `default`.
pub(crate) async fn seeded_storage() -> InMemoryStorage {
    let storage = InMemoryStorage::new();
    write_trusted_cert(&storage, "platform-root", ROOT_CA).await.unwrap();

    let ns = PolicyNamespaces::standard();
    ns.apps.put(&storage, APP_ID, policies(&["app-reader", "shared"])).await.unwrap();
    ns.workspaces.put(&storage, WORKSPACE_ID, policies(&["ws-writer", "shared"])).await.unwrap();
    ns.orgs.put(&storage, "default", policies(&["org-base"])).await.unwrap();
    storage
}

/// Storage whose every operation fails.
pub(crate) struct FailingStorage;

#[async_trait::async_trait]
impl Storage for FailingStorage {
    async fn list(&self, _prefix: &str) -> Result<Vec<String>, StorageError> {
        Err(StorageError::Unavailable("backend offline".into()))
    }

    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Err(StorageError::Unavailable("backend offline".into()))
    }

    async fn put(&self, _key: &str, _value: Vec<u8>) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("backend offline".into()))
    }

    async fn delete(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("backend offline".into()))
    }
}

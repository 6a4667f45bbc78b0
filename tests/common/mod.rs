//! Shared fixtures for integration tests.
//!
//! The PKI under `tests/fixtures/` is a root → intermediate (pathlen 0) →
//! leaf hierarchy made with openssl, plus negative cases.

#![allow(dead_code)]

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use instance_cert_auth::AuthBackend;
use instance_cert_auth::config::LeaseConfig;
use instance_cert_auth::login::Authenticator;
use instance_cert_auth::pki::write_trusted_cert;
use instance_cert_auth::policy::{PolicyList, PolicyNamespaces};
use instance_cert_auth::storage::{InMemoryStorage, Storage};

pub const ROOT_CA: &str = include_str!("../fixtures/root_ca.pem");
pub const INTERMEDIATE_CA: &str = include_str!("../fixtures/intermediate_ca.pem");
pub const LEAF: &str = include_str!("../fixtures/leaf.pem");
pub const LEAF_KEY: &str = include_str!("../fixtures/leaf.key");
pub const LEAF_PKCS8_KEY: &str = include_str!("../fixtures/leaf_pkcs8.key");
pub const OTHER_KEY: &str = include_str!("../fixtures/other.key");
pub const PEER: &str = include_str!("../fixtures/peer.pem");
pub const PEER_KEY: &str = include_str!("../fixtures/peer.key");
pub const EC_LEAF: &str = include_str!("../fixtures/ec_leaf.pem");
pub const TWO_OU_LEAF: &str = include_str!("../fixtures/two_ou.pem");
pub const NO_COLON_LEAF: &str = include_str!("../fixtures/no_colon.pem");
pub const EXPIRED_LEAF: &str = include_str!("../fixtures/expired.pem");
pub const ROGUE_ROOT: &str = include_str!("../fixtures/rogue_root.pem");
pub const ROGUE_INTERMEDIATE: &str = include_str!("../fixtures/rogue_inter.pem");
pub const ROGUE_LEAF: &str = include_str!("../fixtures/rogue_leaf.pem");

pub const ORG_ID: &str = "6f1a0c9e-4a55-4c41-9d2a-0f3c0b7e1a11";
pub const WORKSPACE_ID: &str = "b2d7e0c4-8e1f-4a3b-a6c9-5d4e3f2a1b00";
pub const APP_ID: &str = "9c8b7a6d-5e4f-4a3b-8c2d-1e0f9a8b7c6d";

pub const PEER_ORG_ID: &str = "11111111-2222-4333-8444-555555555555";
pub const PEER_WORKSPACE_ID: &str = "66666666-7777-4888-9999-aaaaaaaaaaaa";
pub const PEER_APP_ID: &str = "bbbbbbbb-cccc-4ddd-8eee-ffffffffffff";

pub fn b64(text: &str) -> String {
    STANDARD.encode(text)
}

pub fn chain(parts: &[&str]) -> String {
    b64(&parts.concat())
}

pub fn policies(names: &[&str]) -> PolicyList {
    PolicyList::List(names.iter().map(|s| (*s).to_string()).collect())
}

pub async fn trust_root(storage: &dyn Storage) {
    write_trusted_cert(storage, "platform-root", ROOT_CA)
        .await
        .unwrap();
}

pub async fn map(storage: &dyn Storage, namespace: &str, id: &str, names: &[&str]) {
    PolicyNamespaces::standard()
        .get(namespace)
        .unwrap()
        .put(storage, id, policies(names))
        .await
        .unwrap();
}

pub fn backend_over(storage: Arc<dyn Storage>) -> AuthBackend {
    AuthBackend::new(storage, Authenticator::new(&LeaseConfig::default()))
}

pub async fn trusted_memory_storage() -> Arc<InMemoryStorage> {
    let storage = Arc::new(InMemoryStorage::new());
    trust_root(storage.as_ref()).await;
    storage
}

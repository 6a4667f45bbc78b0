//! Trust store: CA certificates persisted under `cert/`.
//!
//! Each entry is a JSON document `{"certificate": "<PEM bundle>"}`. When the
//! first certificate of a bundle is a CA, every certificate in that bundle
//! becomes an anchor; otherwise the bundle contributes nothing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::certificate::Certificate;
use super::decode::parse_pem_certificates;
use crate::storage::{Storage, StorageError};
use crate::{Error, Result};

/// Storage prefix for trusted certificate entries.
pub const CERT_PREFIX: &str = "cert/";

/// Persisted form of a trusted certificate entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedCertEntry {
    /// PEM bundle
    pub certificate: String,
}

/// Anchors indexed by raw subject DN.
#[derive(Debug, Default, Clone)]
pub struct TrustAnchors {
    by_subject: HashMap<Vec<u8>, Vec<Certificate>>,
    count: usize,
}

impl TrustAnchors {
    /// Empty anchor pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an anchor.
    pub fn add(&mut self, cert: Certificate) {
        self.by_subject
            .entry(cert.subject_raw().to_vec())
            .or_default()
            .push(cert);
        self.count += 1;
    }

    /// Add every certificate of a bundle if its first certificate is a CA.
    ///
    /// Returns how many anchors were added.
    pub fn add_bundle(&mut self, bundle: Vec<Certificate>) -> usize {
        match bundle.first() {
            Some(first) if first.is_ca() => {
                let added = bundle.len();
                for cert in bundle {
                    self.add(cert);
                }
                added
            }
            _ => 0,
        }
    }

    /// Anchors whose subject equals `cert`'s issuer.
    pub fn issuers_of<'a>(&'a self, cert: &Certificate) -> impl Iterator<Item = &'a Certificate> {
        self.by_subject
            .get(cert.issuer_raw())
            .into_iter()
            .flatten()
    }

    /// Number of anchors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the pool is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Build the anchor pool from storage.
///
/// Never fails: unreadable or undecodable entries are logged and skipped, and
/// a listing failure yields an empty pool (so every chain then fails
/// validation).
pub async fn load_trust_anchors(storage: &dyn Storage) -> TrustAnchors {
    let mut anchors = TrustAnchors::new();

    let names = match storage.list(CERT_PREFIX).await {
        Ok(names) => names,
        Err(e) => {
            error!(error = %e, "Failed to list trusted certificates");
            return anchors;
        }
    };

    for name in names.iter().filter(|n| !n.ends_with('/')) {
        let key = format!("{CERT_PREFIX}{name}");
        let raw = match storage.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => continue,
            Err(e) => {
                warn!(entry = %name, error = %e, "Failed to read trusted certificate");
                continue;
            }
        };
        let entry: TrustedCertEntry = match serde_json::from_slice(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(entry = %name, error = %e, "Skipping malformed trusted certificate entry");
                continue;
            }
        };

        let added = anchors.add_bundle(parse_pem_certificates(entry.certificate.as_bytes()));
        if added == 0 {
            debug!(entry = %name, "Trusted certificate entry contributed no CA anchors");
        }
    }

    debug!(anchors = anchors.len(), "Loaded trust anchors");
    anchors
}

fn cert_key(name: &str) -> Result<String> {
    if name.is_empty() || name.contains('/') {
        return Err(Error::InvalidRequest(format!(
            "invalid trusted certificate name '{name}'"
        )));
    }
    Ok(format!("{CERT_PREFIX}{name}"))
}

/// Store a PEM bundle under `cert/<name>`.
///
/// The bundle must contain at least one certificate.
pub async fn write_trusted_cert(storage: &dyn Storage, name: &str, pem: &str) -> Result<()> {
    let key = cert_key(name)?;
    let certs = parse_pem_certificates(pem.as_bytes());
    if certs.is_empty() {
        return Err(Error::InvalidRequest(format!(
            "'{name}' contains no decodable certificate"
        )));
    }
    if !certs[0].is_ca() {
        warn!(entry = %name, "First certificate is not a CA; bundle will not be used as an anchor");
    }

    let entry = TrustedCertEntry {
        certificate: pem.to_string(),
    };
    storage.put(&key, serde_json::to_vec(&entry)?).await?;
    Ok(())
}

/// Read the entry stored under `cert/<name>`.
pub async fn read_trusted_cert(storage: &dyn Storage, name: &str) -> Result<TrustedCertEntry> {
    let key = cert_key(name)?;
    let raw = storage
        .get(&key)
        .await?
        .ok_or_else(|| Error::NotFound(format!("trusted certificate '{name}'")))?;
    serde_json::from_slice(&raw).map_err(|e| {
        Error::Storage(StorageError::Corrupt {
            key,
            reason: e.to_string(),
        })
    })
}

/// Remove `cert/<name>`.
pub async fn delete_trusted_cert(storage: &dyn Storage, name: &str) -> Result<()> {
    storage.delete(&cert_key(name)?).await?;
    Ok(())
}

/// Names of all stored trust entries.
pub async fn list_trusted_certs(storage: &dyn Storage) -> Result<Vec<String>> {
    let names = storage.list(CERT_PREFIX).await?;
    Ok(names.into_iter().filter(|n| !n.ends_with('/')).collect())
}

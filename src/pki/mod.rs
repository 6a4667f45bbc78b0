//! Instance certificate verification.
//!
//! The credential checks behind a login, leaves first.
//!
//! # Architecture
//!
//! ```text
//! certificate field (base64 PEM)      key field (base64 PEM)
//!   → decode_certificates                → decode_private_key
//!   → [leaf, intermediate, ...]          → RsaPrivateKey
//!   → verify_chain (anchors from storage `cert/`)
//!   → verify_possession (leaf modulus == key modulus)
//!   → InstanceIdentity (first three OUs)
//! ```
//!
//! # Modules
//!
//! - [`certificate`]: owned certificate with cached fields (`Certificate`)
//! - [`decode`]: base64/PEM/PKCS#1 decoding
//! - [`trust_store`]: anchor loading and `cert/` administration
//! - [`chain`]: leaf → intermediate → anchor verification
//! - [`possession`]: private key proof
//! - [`identity`]: OU extraction (`InstanceIdentity`)

pub mod certificate;
pub mod chain;
pub mod decode;
pub mod identity;
pub mod possession;
pub mod trust_store;

use std::time::{SystemTime, UNIX_EPOCH};

pub use certificate::Certificate;
pub use chain::{VerifiedChain, verify_chain};
pub use decode::{RsaPrivateKey, decode_certificates, decode_private_key, parse_pem_certificates};
pub use identity::InstanceIdentity;
pub use possession::verify_possession;
pub use trust_store::{
    CERT_PREFIX, TrustAnchors, TrustedCertEntry, delete_trusted_cert, list_trusted_certs,
    load_trust_anchors, read_trusted_cert, write_trusted_cert,
};

/// Seconds since the epoch; clocks before 1970 read as 0.
pub(crate) fn unix_secs(now: SystemTime) -> i64 {
    now.duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

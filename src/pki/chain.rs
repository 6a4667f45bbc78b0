//! Chain verification.
//!
//! A login presents exactly one intermediate. The leaf is accepted when
//! either
//!
//! 1. an anchor directly signed it, or
//! 2. the presented intermediate signed it and an anchor signed the
//!    intermediate.
//!
//! Every certificate on the path must be inside its validity window. Issuing
//! certificates must be CAs and honour `pathLenConstraint`. Extended key
//! usage is not constrained.

use std::time::SystemTime;

use tracing::debug;

use super::certificate::Certificate;
use super::trust_store::TrustAnchors;
use crate::{Error, Result};

/// A successfully verified path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedChain {
    /// Subject of the anchor the path ends at.
    pub anchor: String,
    /// Whether the presented intermediate was part of the path.
    pub via_intermediate: bool,
}

/// Whether `issuer` may sign a certificate that has `below` CA certificates
/// between it and the leaf.
fn can_issue(issuer: &Certificate, below: u32, now: SystemTime) -> bool {
    issuer.is_ca()
        && issuer.is_valid_at(now)
        && issuer.path_len_constraint().is_none_or(|max| below <= max)
}

fn signed_by(child: &Certificate, issuer: &Certificate) -> bool {
    if child.issuer_raw() != issuer.subject_raw() {
        return false;
    }
    let (Ok(child_view), Ok(issuer_view)) = (child.parse(), issuer.parse()) else {
        return false;
    };
    child_view
        .verify_signature(Some(issuer_view.public_key()))
        .is_ok()
}

fn find_anchor<'a>(
    anchors: &'a TrustAnchors,
    child: &Certificate,
    below: u32,
    now: SystemTime,
) -> Option<&'a Certificate> {
    anchors
        .issuers_of(child)
        .find(|anchor| can_issue(anchor, below, now) && signed_by(child, anchor))
}

/// Verify `leaf` against `anchors`, using `intermediate` when needed.
pub fn verify_chain(
    anchors: &TrustAnchors,
    leaf: &Certificate,
    intermediate: &Certificate,
    now: SystemTime,
) -> Result<VerifiedChain> {
    if anchors.is_empty() {
        return Err(Error::ChainValidation(
            "no trusted certificates are configured".to_string(),
        ));
    }
    if !leaf.is_valid_at(now) {
        return Err(Error::ChainValidation(format!(
            "certificate '{}' is expired or not yet valid",
            leaf.subject()
        )));
    }

    if let Some(anchor) = find_anchor(anchors, leaf, 0, now) {
        debug!(anchor = %anchor.subject(), "Leaf issued directly by trust anchor");
        return Ok(VerifiedChain {
            anchor: anchor.subject().to_string(),
            via_intermediate: false,
        });
    }

    if !can_issue(intermediate, 0, now) {
        return Err(Error::ChainValidation(format!(
            "intermediate '{}' is not a valid CA certificate",
            intermediate.subject()
        )));
    }
    if !signed_by(leaf, intermediate) {
        return Err(Error::ChainValidation(format!(
            "certificate '{}' was not issued by '{}'",
            leaf.subject(),
            intermediate.subject()
        )));
    }

    match find_anchor(anchors, intermediate, 1, now) {
        Some(anchor) => {
            debug!(
                anchor = %anchor.subject(),
                intermediate = %intermediate.subject(),
                "Leaf chained to trust anchor through intermediate"
            );
            Ok(VerifiedChain {
                anchor: anchor.subject().to_string(),
                via_intermediate: true,
            })
        }
        None => Err(Error::ChainValidation(format!(
            "certificate signed by unknown authority '{}'",
            intermediate.subject()
        ))),
    }
}

//! Owned X.509 certificate.
//!
//! `x509-parser` hands out views that borrow the DER buffer. Login evaluation
//! moves certificates between stages, so [`Certificate`] owns the DER and
//! caches the fields every stage needs. Stages that need signature or key
//! material re-parse through [`Certificate::parse`].

use std::fmt;
use std::time::{Duration, SystemTime};

use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;

use super::unix_secs;
use crate::{Error, Result};

/// A decoded certificate with its identity-relevant fields extracted.
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
    subject: String,
    subject_raw: Vec<u8>,
    issuer_raw: Vec<u8>,
    organizational_units: Vec<String>,
    is_ca: bool,
    path_len_constraint: Option<u32>,
    not_before: i64,
    not_after: i64,
}

impl Certificate {
    /// Parse a DER-encoded certificate.
    ///
    /// # Errors
    ///
    /// Returns `Error::Decode` if the DER is not a certificate or an
    /// organizational unit is not a string type.
    pub fn from_der(der: impl Into<Vec<u8>>) -> Result<Self> {
        let der = der.into();

        // Scoped: the parsed view borrows `der`
        let (subject, subject_raw, issuer_raw, organizational_units, constraints, validity) = {
            let (rest, cert) = X509Certificate::from_der(&der)
                .map_err(|e| Error::Decode(format!("failed to parse certificate: {e}")))?;
            if !rest.is_empty() {
                return Err(Error::Decode(format!(
                    "{} trailing bytes after certificate",
                    rest.len()
                )));
            }

            let organizational_units = cert
                .subject()
                .iter_organizational_unit()
                .map(|attr| {
                    attr.as_str().map(str::to_owned).map_err(|e| {
                        Error::Decode(format!("organizational unit is not a string: {e}"))
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            let constraints = match cert.basic_constraints() {
                Ok(Some(ext)) => (ext.value.ca, ext.value.path_len_constraint),
                _ => (false, None),
            };

            (
                cert.subject().to_string(),
                cert.subject().as_raw().to_vec(),
                cert.issuer().as_raw().to_vec(),
                organizational_units,
                constraints,
                (
                    cert.validity().not_before.timestamp(),
                    cert.validity().not_after.timestamp(),
                ),
            )
        };

        Ok(Self {
            der,
            subject,
            subject_raw,
            issuer_raw,
            organizational_units,
            is_ca: constraints.0,
            path_len_constraint: constraints.1,
            not_before: validity.0,
            not_after: validity.1,
        })
    }

    /// Re-parse into an `x509-parser` view borrowing this certificate.
    pub fn parse(&self) -> Result<X509Certificate<'_>> {
        X509Certificate::from_der(&self.der)
            .map(|(_, cert)| cert)
            .map_err(|e| Error::Decode(format!("failed to parse certificate: {e}")))
    }

    /// Raw DER bytes.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Subject distinguished name in RFC 4514 form.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub(crate) fn subject_raw(&self) -> &[u8] {
        &self.subject_raw
    }

    pub(crate) fn issuer_raw(&self) -> &[u8] {
        &self.issuer_raw
    }

    /// Subject organizational units, in certificate order.
    #[must_use]
    pub fn organizational_units(&self) -> &[String] {
        &self.organizational_units
    }

    /// `true` when basicConstraints marks this certificate as a CA.
    #[must_use]
    pub fn is_ca(&self) -> bool {
        self.is_ca
    }

    /// basicConstraints `pathLenConstraint`, if present.
    #[must_use]
    pub fn path_len_constraint(&self) -> Option<u32> {
        self.path_len_constraint
    }

    /// Expiry as unix seconds.
    #[must_use]
    pub fn not_after(&self) -> i64 {
        self.not_after
    }

    /// Whether `now` lies inside the validity window.
    #[must_use]
    pub fn is_valid_at(&self, now: SystemTime) -> bool {
        let now = unix_secs(now);
        self.not_before <= now && now <= self.not_after
    }

    /// Time left until expiry, zero once expired.
    #[must_use]
    pub fn remaining_lifetime(&self, now: SystemTime) -> Duration {
        let left = self.not_after.saturating_sub(unix_secs(now));
        Duration::from_secs(u64::try_from(left).unwrap_or(0))
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject)
            .field("is_ca", &self.is_ca)
            .field("not_after", &self.not_after)
            .finish_non_exhaustive()
    }
}

//! Decoding of login payloads.
//!
//! Both login fields are base64 text wrapping PEM. Certificate decoding is
//! lenient: blocks of another type, blocks carrying RFC 1421 headers, and
//! blocks whose DER fails to parse are skipped. Key decoding is strict.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use pkcs1::der::Decode as _;
use tracing::debug;

use super::certificate::Certificate;
use crate::{Error, Result};

const BEGIN_MARKER: &str = "-----BEGIN ";
const CERTIFICATE_TAGS: [&str; 2] = ["CERTIFICATE", "TRUSTED CERTIFICATE"];
const RSA_KEY_TAG: &str = "RSA PRIVATE KEY";

/// Public half of a PKCS#1 RSA private key.
///
/// Only the values needed for possession checks are retained; the private
/// components are dropped as soon as the key is parsed.
#[derive(Clone, PartialEq, Eq)]
pub struct RsaPrivateKey {
    modulus: Vec<u8>,
    public_exponent: Vec<u8>,
}

impl RsaPrivateKey {
    /// Big-endian modulus without leading zero bytes.
    #[must_use]
    pub fn modulus(&self) -> &[u8] {
        &self.modulus
    }

    /// Big-endian public exponent without leading zero bytes.
    #[must_use]
    pub fn public_exponent(&self) -> &[u8] {
        &self.public_exponent
    }

    /// Key size in bits.
    #[must_use]
    pub fn bits(&self) -> usize {
        match self.modulus.first() {
            Some(&top) => (self.modulus.len() - 1) * 8 + (8 - top.leading_zeros() as usize),
            None => 0,
        }
    }
}

impl std::fmt::Debug for RsaPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaPrivateKey")
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}

/// Strip leading zero octets from a big-endian integer.
pub(crate) fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

fn decode_base64(encoded: &str, what: &str) -> Result<Vec<u8>> {
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    STANDARD
        .decode(compact)
        .map_err(|e| Error::Decode(format!("{what} is not valid base64: {e}")))
}

/// Split PEM text at each armor line so a damaged block only loses itself.
fn pem_segments(text: &str) -> Vec<&str> {
    let starts: Vec<usize> = text.match_indices(BEGIN_MARKER).map(|(i, _)| i).collect();
    starts
        .iter()
        .enumerate()
        .map(|(n, &start)| {
            let end = starts.get(n + 1).copied().unwrap_or(text.len());
            &text[start..end]
        })
        .collect()
}

/// Parse every usable certificate in a PEM document, in order.
#[must_use]
pub fn parse_pem_certificates(raw: &[u8]) -> Vec<Certificate> {
    let text = String::from_utf8_lossy(raw);
    let mut certs = Vec::new();

    for segment in pem_segments(&text) {
        let block = match pem::parse(segment) {
            Ok(block) => block,
            Err(e) => {
                debug!(error = %e, "Skipping unparseable PEM block");
                continue;
            }
        };
        if !CERTIFICATE_TAGS.contains(&block.tag()) {
            debug!(tag = %block.tag(), "Skipping non-certificate PEM block");
            continue;
        }
        if block.headers().iter().next().is_some() {
            debug!(tag = %block.tag(), "Skipping PEM block with headers");
            continue;
        }
        match Certificate::from_der(block.contents().to_vec()) {
            Ok(cert) => certs.push(cert),
            Err(e) => debug!(error = %e, "Skipping undecodable certificate"),
        }
    }

    certs
}

/// Decode the `certificate` login field: base64 text wrapping PEM.
///
/// Returns every certificate that decoded, leaf first. An empty result is
/// not an error here; the caller enforces the chain length.
pub fn decode_certificates(encoded: &str) -> Result<Vec<Certificate>> {
    let raw = decode_base64(encoded, "certificate")?;
    Ok(parse_pem_certificates(&raw))
}

/// Decode the `key` login field: base64 text wrapping exactly one
/// PEM `RSA PRIVATE KEY` block in PKCS#1 form.
pub fn decode_private_key(encoded: &str) -> Result<RsaPrivateKey> {
    let raw = decode_base64(encoded, "private key")?;
    let text = String::from_utf8_lossy(&raw);

    let segment = pem_segments(&text)
        .into_iter()
        .next()
        .ok_or_else(|| Error::Decode("private key contains no PEM block".to_string()))?;
    let block = pem::parse(segment)
        .map_err(|e| Error::Decode(format!("private key PEM is malformed: {e}")))?;
    if block.tag() != RSA_KEY_TAG {
        return Err(Error::Decode(format!(
            "private key must be a PKCS#1 '{RSA_KEY_TAG}' block, got '{}'",
            block.tag()
        )));
    }

    let key = pkcs1::RsaPrivateKey::from_der(block.contents())
        .map_err(|e| Error::Decode(format!("private key is not PKCS#1: {e}")))?;

    Ok(RsaPrivateKey {
        modulus: trim_leading_zeros(key.modulus.as_bytes()).to_vec(),
        public_exponent: trim_leading_zeros(key.public_exponent.as_bytes()).to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{INTERMEDIATE_CA, LEAF, LEAF_KEY, LEAF_PKCS8_KEY, ROOT_CA, b64};

    #[test]
    fn decodes_leaf_then_intermediate_in_order() {
        let bundle = format!("{LEAF}{INTERMEDIATE_CA}");
        let certs = decode_certificates(&b64(&bundle)).unwrap();
        assert_eq!(certs.len(), 2);
        assert!(!certs[0].is_ca());
        assert!(certs[1].subject().contains("Intermediate"));
    }

    #[test]
    fn certificate_block_with_trailing_bytes_is_skipped() {
        // GIVEN: a leaf whose CERTIFICATE block carries junk after the DER
        let mut der = parse_pem_certificates(LEAF.as_bytes()).remove(0).der().to_vec();
        der.extend_from_slice(&[0, 1, 2, 3]);
        let padded = pem::encode(&pem::Pem::new("CERTIFICATE", der));

        // WHEN
        let certs = decode_certificates(&b64(&format!("{padded}{INTERMEDIATE_CA}"))).unwrap();

        // THEN: only the intermediate survives
        assert_eq!(certs.len(), 1);
        assert!(certs[0].is_ca());
    }

    #[test]
    fn base64_with_line_breaks_is_accepted() {
        let encoded = b64(LEAF);
        let wrapped: String = encoded
            .as_bytes()
            .chunks(64)
            .map(|c| format!("{}\n", std::str::from_utf8(c).unwrap()))
            .collect();
        assert_eq!(decode_certificates(&wrapped).unwrap().len(), 1);
    }

    #[test]
    fn invalid_base64_is_decode_error() {
        let err = decode_certificates("%%% not base64 %%%").unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn non_certificate_blocks_are_skipped() {
        // GIVEN: a bundle with a key block between two certificates
        let bundle = format!("{LEAF}{LEAF_KEY}{ROOT_CA}");

        // WHEN
        let certs = parse_pem_certificates(bundle.as_bytes());

        // THEN: only the certificates survive
        assert_eq!(certs.len(), 2);
        assert!(certs[1].is_ca());
    }

    #[test]
    fn blocks_with_headers_are_skipped() {
        let with_headers = LEAF.replacen(
            "-----BEGIN CERTIFICATE-----\n",
            "-----BEGIN CERTIFICATE-----\nProc-Type: 4,ENCRYPTED\n\n",
            1,
        );
        let bundle = format!("{with_headers}{ROOT_CA}");
        let certs = parse_pem_certificates(bundle.as_bytes());
        assert_eq!(certs.len(), 1);
        assert!(certs[0].is_ca());
    }

    #[test]
    fn corrupt_block_does_not_hide_later_blocks() {
        let bundle = format!(
            "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n{ROOT_CA}"
        );
        let certs = parse_pem_certificates(bundle.as_bytes());
        assert_eq!(certs.len(), 1);
    }

    #[test]
    fn text_without_pem_yields_nothing() {
        assert!(decode_certificates(&b64("hello")).unwrap().is_empty());
    }

    #[test]
    fn pkcs1_key_decodes() {
        let key = decode_private_key(&b64(LEAF_KEY)).unwrap();
        assert_eq!(key.bits(), 2048);
        assert_eq!(key.public_exponent(), &[0x01, 0x00, 0x01]);
    }

    #[test]
    fn pkcs8_key_is_decode_error() {
        let err = decode_private_key(&b64(LEAF_PKCS8_KEY)).unwrap_err();
        assert!(matches!(err, Error::Decode(msg) if msg.contains("PKCS#1")));
    }

    #[test]
    fn key_without_pem_block_is_decode_error() {
        let err = decode_private_key(&b64("just text")).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn trim_leading_zeros_keeps_significant_bytes() {
        assert_eq!(trim_leading_zeros(&[0, 0, 1, 0]), &[1, 0]);
        assert!(trim_leading_zeros(&[0, 0]).is_empty());
    }

    #[test]
    fn debug_does_not_print_key_material() {
        let key = decode_private_key(&b64(LEAF_KEY)).unwrap();
        let rendered = format!("{key:?}");
        assert!(rendered.contains("2048"));
        assert!(!rendered.contains("modulus"));
    }
}

//! Proof that the caller holds the leaf's private key.

use x509_parser::public_key::PublicKey;

use super::certificate::Certificate;
use super::decode::{RsaPrivateKey, trim_leading_zeros};
use crate::{Error, Result};

/// Check that `key` is the private half of `cert`'s public key.
///
/// Only RSA leaves are supported; moduli are compared as unsigned
/// big-endian integers.
pub fn verify_possession(cert: &Certificate, key: &RsaPrivateKey) -> Result<()> {
    let view = cert.parse()?;
    let spki = view.public_key();
    let parsed = spki.parsed().map_err(|e| {
        Error::UnsupportedKeyAlgorithm(format!("unreadable public key: {e}"))
    })?;

    match parsed {
        PublicKey::RSA(rsa) => {
            if trim_leading_zeros(rsa.modulus) == key.modulus() {
                Ok(())
            } else {
                Err(Error::KeyMismatch)
            }
        }
        PublicKey::EC(_) => Err(Error::UnsupportedKeyAlgorithm("EC".to_string())),
        PublicKey::DSA(_) => Err(Error::UnsupportedKeyAlgorithm("DSA".to_string())),
        _ => Err(Error::UnsupportedKeyAlgorithm(
            spki.algorithm.algorithm.to_id_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pki::decode::{decode_private_key, parse_pem_certificates};
    use crate::testing::{EC_LEAF, LEAF, LEAF_KEY, OTHER_KEY, b64};

    fn cert(pem: &str) -> Certificate {
        parse_pem_certificates(pem.as_bytes()).remove(0)
    }

    #[test]
    fn matching_key_is_accepted() {
        let key = decode_private_key(&b64(LEAF_KEY)).unwrap();
        verify_possession(&cert(LEAF), &key).unwrap();
    }

    #[test]
    fn different_key_is_mismatch() {
        let key = decode_private_key(&b64(OTHER_KEY)).unwrap();
        let err = verify_possession(&cert(LEAF), &key).unwrap_err();
        assert!(matches!(err, Error::KeyMismatch));
    }

    #[test]
    fn ec_leaf_is_unsupported_even_with_rsa_key() {
        let key = decode_private_key(&b64(LEAF_KEY)).unwrap();
        let err = verify_possession(&cert(EC_LEAF), &key).unwrap_err();
        assert!(matches!(err, Error::UnsupportedKeyAlgorithm(alg) if alg == "EC"));
    }
}

//! Per-build VM key material and composite modulus derivation.

use num_bigint::BigUint;

use crate::{crypto::base64::base64_decode, Result};

/// The RSA public exponent every observed build uses.
pub const PUBLIC_EXPONENT: u32 = 65537;

/// Build-specific fallback modulus string.
///
/// Used when the modulus-string method carries no `ldstr` because the
/// assembly's strings have been re-encrypted by a later protection pass.
/// Future protector builds will ship a different constant.
pub const FALLBACK_MODULUS: &str = "xjCxZdGKSIH66ONPWBc1jdI6I44Q7eAyqXyfi53ZgCtHiMrfaSmHnK+NoaMFQGO91YEdCH7qfSoWmixATI/hnNHt4eBCpMJ3ApLwjZNYlXUMAomt8stPBzr8uv4n0U9d3xFl0WJq5aG64oFR08mcz31bn6lk3koQvVnHzcqcdHk=";

/// The decryption key for one protected build.
///
/// The composite modulus is the big-endian integer over the session key bytes
/// concatenated with the decoded modulus string; the exponent is fixed at
/// [`PUBLIC_EXPONENT`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmKey {
    /// Composite modulus.
    pub modulus: BigUint,
    /// Public exponent (65537 in every identified build).
    pub exponent: BigUint,
    /// Per-build key bytes read from the RVA-backed key field.
    pub session_key: Vec<u8>,
}

impl VmKey {
    /// Derive the key from the session-key bytes and the Base64 modulus
    /// string.
    ///
    /// # Errors
    /// Returns [`crate::Error::ModulusMissing`] when the string is empty and
    /// [`crate::Error::Malformed`] when it is not valid Base64.
    pub fn derive(session_key: Vec<u8>, modulus_string: &str) -> Result<VmKey> {
        if modulus_string.trim().is_empty() {
            return Err(crate::Error::ModulusMissing);
        }

        let Some(decoded) = base64_decode(modulus_string) else {
            return Err(malformed_error!(
                "Modulus string is not valid base64 ({} chars)",
                modulus_string.len()
            ));
        };

        let mut composite = session_key.clone();
        composite.extend_from_slice(&decoded);

        Ok(VmKey {
            modulus: BigUint::from_bytes_be(&composite),
            exponent: BigUint::from(PUBLIC_EXPONENT),
            session_key,
        })
    }

    /// The ciphertext block size in bytes: the number of bytes needed to
    /// represent the modulus.
    #[must_use]
    pub fn block_size(&self) -> usize {
        let bits = self.modulus.bits();
        usize::try_from(bits.div_ceil(8)).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_concatenates_session_key() {
        // session key 0x01 0x02 ++ decode("AAAA") = [1, 2, 0, 0, 0]
        let key = VmKey::derive(vec![0x01, 0x02], "AAAA").unwrap();
        assert_eq!(
            key.modulus,
            BigUint::from_bytes_be(&[0x01, 0x02, 0x00, 0x00, 0x00])
        );
        assert_eq!(key.exponent, BigUint::from(65537u32));
        assert_eq!(key.session_key, vec![0x01, 0x02]);
    }

    #[test]
    fn test_derive_empty_modulus_is_missing() {
        assert!(matches!(
            VmKey::derive(vec![1], ""),
            Err(crate::Error::ModulusMissing)
        ));
        assert!(matches!(
            VmKey::derive(vec![1], "   "),
            Err(crate::Error::ModulusMissing)
        ));
    }

    #[test]
    fn test_derive_invalid_base64_is_malformed() {
        assert!(matches!(
            VmKey::derive(vec![1], "!!!!"),
            Err(crate::Error::Malformed { .. })
        ));
    }

    #[test]
    fn test_fallback_modulus_decodes() {
        let decoded = base64_decode(FALLBACK_MODULUS).unwrap();
        assert_eq!(decoded.len(), 128);

        // Derivation from the fallback is deterministic.
        let a = VmKey::derive(vec![0xAB, 0xCD], FALLBACK_MODULUS).unwrap();
        let b = VmKey::derive(vec![0xAB, 0xCD], FALLBACK_MODULUS).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.block_size(), 130);
    }

    #[test]
    fn test_block_size_matches_modulus_width() {
        let key = VmKey::derive(vec![0x80], "AAAA").unwrap();
        // modulus = 0x80 00 00 00 00 -> 5 bytes, 40 bits
        assert_eq!(key.block_size(), 5);
    }
}

//! # Hashing Utilities
//!
//! Keccak-256 as used by the EVM. Note that this is the *original* Keccak
//! padding, not the NIST SHA3-256 variant; the two produce different digests
//! for the same input. `sha3::Keccak256` is the former.

use sha3::{Digest, Keccak256};

/// Compute the Keccak-256 hash of the input data.
///
/// # Example
///
/// ```
/// use vault_protocol::crypto::keccak256;
///
/// let hash = keccak256(b"WITHDRAWER_ROLE");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Keccak-256 rendered as `0x`-prefixed lowercase hex.
pub fn keccak256_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(keccak256(data)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_empty_input() {
        // Well-known digest of the empty string.
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_keccak256_is_not_sha3() {
        // SHA3-256("") starts with a7ffc6f8; Keccak-256 must not.
        assert!(!hex::encode(keccak256(b"")).starts_with("a7ffc6f8"));
    }

    #[test]
    fn test_keccak256_deterministic() {
        assert_eq!(keccak256(b"vault"), keccak256(b"vault"));
        assert_ne!(keccak256(b"vault"), keccak256(b"Vault"));
    }

    #[test]
    fn test_keccak256_hex_prefix() {
        let h = keccak256_hex(b"abc");
        assert!(h.starts_with("0x"));
        assert_eq!(h.len(), 66);
    }
}

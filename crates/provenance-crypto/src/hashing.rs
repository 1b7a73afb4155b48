//! Content digests and public key fingerprints.

use crate::codec::DIGEST_HEX_LEN;
use sha2::{Digest, Sha256, Sha512};

/// Number of hex characters kept for a public key fingerprint.
pub const FINGERPRINT_HEX_LEN: usize = 16;

/// Hashes image bytes into the 128-character lowercase hex digest that
/// clients sign.
///
/// # Example
///
/// ```rust
/// use provenance_crypto::hashing::hash_content;
///
/// let digest = hash_content(b"image bytes");
/// assert_eq!(digest.len(), 128);
/// ```
pub fn hash_content(bytes: &[u8]) -> String {
    let digest = hex::encode(Sha512::digest(bytes));
    debug_assert_eq!(digest.len(), DIGEST_HEX_LEN);
    digest
}

/// Short display fingerprint of a public key: the first 16 hex characters
/// of its SHA-256.
pub fn public_key_fingerprint(public_key: &[u8]) -> String {
    let mut fingerprint = hex::encode(Sha256::digest(public_key));
    fingerprint.truncate(FINGERPRINT_HEX_LEN);
    fingerprint
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_digest;

    #[test]
    fn test_hash_content_is_decodable() {
        let digest = hash_content(b"");
        // SHA-512 of the empty string
        assert!(digest.starts_with("cf83e1357eefb8bdf1542850d66d8007"));
        assert!(decode_digest(&digest).is_ok());
    }

    #[test]
    fn test_hash_content_distinguishes_inputs() {
        assert_ne!(hash_content(b"frame-1"), hash_content(b"frame-2"));
    }

    #[test]
    fn test_fingerprint_length_and_stability() {
        let key = [0x02u8; 33];
        let fingerprint = public_key_fingerprint(&key);
        assert_eq!(fingerprint.len(), FINGERPRINT_HEX_LEN);
        assert_eq!(fingerprint, public_key_fingerprint(&key));
        assert_ne!(fingerprint, public_key_fingerprint(&[0x03u8; 33]));
    }
}

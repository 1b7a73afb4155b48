//! # Key Material Codec
//!
//! Decodes the wire encodings of signatures, public keys and content digests
//! into fixed-size byte arrays. Every function here is pure and cheap, and runs
//! before the elliptic-curve primitive ever sees the input.
//!
//! ## Wire Formats
//!
//! | Value | Encoding | Raw size | Extra check |
//! |-------|----------|----------|-------------|
//! | Signature | base64 (standard alphabet) | 64 bytes (`r \|\| s`) | - |
//! | Public key | base64 (standard alphabet) | 33 bytes | prefix `0x02` or `0x03` |
//! | Digest | hex, 128 characters | 64 bytes | - |
//!
//! ## References
//!
//! - SEC 1 v2, section 2.3.3: compressed elliptic curve point encoding.
//!   <https://www.secg.org/sec1-v2.pdf>
//! - RFC 4648, section 4: base64 alphabet.

use crate::error::{FormatError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// Length of a compact `r || s` secp256k1 signature.
pub const SIGNATURE_LEN: usize = 64;

/// Length of a compressed secp256k1 public key.
pub const PUBLIC_KEY_LEN: usize = 33;

/// Length of a content digest (SHA-512 output).
pub const DIGEST_LEN: usize = 64;

/// Length of a content digest in hex characters.
pub const DIGEST_HEX_LEN: usize = DIGEST_LEN * 2;

/// Prefix for a compressed point with an even y-coordinate.
pub const COMPRESSED_EVEN: u8 = 0x02;

/// Prefix for a compressed point with an odd y-coordinate.
pub const COMPRESSED_ODD: u8 = 0x03;

/// A compact secp256k1 signature.
pub type RawSignature = [u8; SIGNATURE_LEN];

/// A compressed secp256k1 public key.
pub type CompressedPublicKey = [u8; PUBLIC_KEY_LEN];

/// A pre-computed content digest.
pub type ContentDigest = [u8; DIGEST_LEN];

/// Decodes a base64 signature into its 64 raw bytes.
///
/// The input is taken verbatim; surrounding whitespace is an encoding error.
///
/// # Errors
///
/// - `FormatError::SignatureEncoding` if the input is not base64
/// - `FormatError::SignatureLength` if the decoded length is not 64
///
/// # Example
///
/// ```rust
/// use provenance_crypto::codec::{decode_signature, encode_base64};
///
/// let wire = encode_base64(&[7u8; 64]);
/// assert_eq!(decode_signature(&wire).unwrap(), [7u8; 64]);
/// assert!(decode_signature("AAAA").is_err());
/// ```
pub fn decode_signature(wire: &str) -> Result<RawSignature> {
    let bytes = BASE64
        .decode(wire)
        .map_err(|_| FormatError::SignatureEncoding)?;

    bytes
        .as_slice()
        .try_into()
        .map_err(|_| FormatError::SignatureLength {
            expected: SIGNATURE_LEN,
            actual: bytes.len(),
        })
}

/// Decodes a base64 public key and checks it is a compressed point.
///
/// # Errors
///
/// - `FormatError::PublicKeyEncoding` if the input is not base64
/// - `FormatError::PublicKeyLength` / `FormatError::PublicKeyPrefix` as in
///   [`validate_public_key`]
pub fn decode_public_key(wire: &str) -> Result<CompressedPublicKey> {
    let bytes = BASE64
        .decode(wire)
        .map_err(|_| FormatError::PublicKeyEncoding)?;

    validate_public_key(&bytes)
}

/// Checks raw bytes are shaped like a compressed secp256k1 point.
///
/// This is a structural check only. Whether the x-coordinate actually lies on
/// the curve is decided by the verifier, which treats a bad point as a failed
/// verification.
///
/// # Errors
///
/// - `FormatError::PublicKeyLength` if the length is not 33
/// - `FormatError::PublicKeyPrefix` if the first byte is not `0x02`/`0x03`
pub fn validate_public_key(bytes: &[u8]) -> Result<CompressedPublicKey> {
    let key: CompressedPublicKey = bytes.try_into().map_err(|_| FormatError::PublicKeyLength {
        expected: PUBLIC_KEY_LEN,
        actual: bytes.len(),
    })?;

    match key[0] {
        COMPRESSED_EVEN | COMPRESSED_ODD => Ok(key),
        prefix => Err(FormatError::PublicKeyPrefix(prefix)),
    }
}

/// Decodes a 128-character hex digest into 64 raw bytes.
///
/// Both upper and lower case hex digits are accepted.
///
/// # Errors
///
/// - `FormatError::DigestLength` if the string is not exactly 128 characters
/// - `FormatError::DigestEncoding` if it contains non-hex characters
pub fn decode_digest(hex_digest: &str) -> Result<ContentDigest> {
    if hex_digest.len() != DIGEST_HEX_LEN {
        return Err(FormatError::DigestLength {
            expected: DIGEST_HEX_LEN,
            actual: hex_digest.len(),
        });
    }

    let mut digest = [0u8; DIGEST_LEN];
    hex::decode_to_slice(hex_digest, &mut digest).map_err(|_| FormatError::DigestEncoding)?;
    Ok(digest)
}

/// Encodes raw bytes with the same base64 alphabet the decoders accept.
pub fn encode_base64(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compressed_key(prefix: u8) -> Vec<u8> {
        let mut key = vec![0x11u8; PUBLIC_KEY_LEN];
        key[0] = prefix;
        key
    }

    #[test]
    fn test_decode_signature() {
        let wire = encode_base64(&[0xabu8; 64]);
        assert_eq!(decode_signature(&wire).unwrap(), [0xabu8; 64]);
    }

    #[test]
    fn test_signature_wrong_length() {
        for len in [0usize, 1, 63, 65, 72] {
            let wire = encode_base64(&vec![1u8; len]);
            assert_eq!(
                decode_signature(&wire),
                Err(FormatError::SignatureLength {
                    expected: 64,
                    actual: len
                })
            );
        }
    }

    #[test]
    fn test_signature_bad_base64() {
        assert_eq!(
            decode_signature("not base64 at all!"),
            Err(FormatError::SignatureEncoding)
        );
    }

    #[test]
    fn test_surrounding_whitespace_rejected() {
        let signature = encode_base64(&[0xabu8; 64]);
        let key = encode_base64(&compressed_key(0x02));
        let digest = "0".repeat(128);

        for padded in [format!(" {}", signature), format!("{}\n", signature)] {
            assert_eq!(decode_signature(&padded), Err(FormatError::SignatureEncoding));
        }
        assert_eq!(
            decode_public_key(&format!("{} ", key)),
            Err(FormatError::PublicKeyEncoding)
        );
        assert!(decode_digest(&format!(" {}", digest)).is_err());
        assert!(decode_digest(&format!("{}\n", &digest[..127])).is_err());
    }

    #[test]
    fn test_public_key_prefixes() {
        assert!(validate_public_key(&compressed_key(0x02)).is_ok());
        assert!(validate_public_key(&compressed_key(0x03)).is_ok());

        for prefix in [0x00u8, 0x01, 0x04, 0x06, 0x07, 0xff] {
            assert_eq!(
                validate_public_key(&compressed_key(prefix)),
                Err(FormatError::PublicKeyPrefix(prefix))
            );
        }
    }

    #[test]
    fn test_public_key_wrong_length() {
        // An uncompressed point is 65 bytes and must be refused
        let mut uncompressed = vec![0x22u8; 65];
        uncompressed[0] = 0x04;
        assert_eq!(
            validate_public_key(&uncompressed),
            Err(FormatError::PublicKeyLength {
                expected: 33,
                actual: 65
            })
        );
        assert!(matches!(
            validate_public_key(&compressed_key(0x02)[..32]),
            Err(FormatError::PublicKeyLength { actual: 32, .. })
        ));
    }

    #[test]
    fn test_decode_public_key_from_wire() {
        let key = compressed_key(0x03);
        let decoded = decode_public_key(&encode_base64(&key)).unwrap();
        assert_eq!(decoded.as_slice(), key.as_slice());

        assert_eq!(
            decode_public_key("%%%"),
            Err(FormatError::PublicKeyEncoding)
        );
    }

    #[test]
    fn test_decode_digest() {
        let digest = decode_digest(&"0".repeat(128)).unwrap();
        assert_eq!(digest, [0u8; 64]);

        let mixed_case = format!("{}{}", "AB".repeat(32), "cd".repeat(32));
        let digest = decode_digest(&mixed_case).unwrap();
        assert_eq!(digest[0], 0xab);
        assert_eq!(digest[63], 0xcd);
    }

    #[test]
    fn test_digest_wrong_length() {
        for len in [0usize, 64, 127, 129, 256] {
            assert_eq!(
                decode_digest(&"a".repeat(len)),
                Err(FormatError::DigestLength {
                    expected: 128,
                    actual: len
                })
            );
        }
    }

    #[test]
    fn test_digest_non_hex() {
        let digest = format!("{}zz", "0".repeat(126));
        assert_eq!(decode_digest(&digest), Err(FormatError::DigestEncoding));
    }
}

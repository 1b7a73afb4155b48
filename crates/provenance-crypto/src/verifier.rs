//! # secp256k1 Signature Verifier
//!
//! Verifies a compact ECDSA signature over a pre-computed content digest.
//!
//! The digest is handed to the curve primitive as-is: it is already the hash
//! of the payload and is not hashed again. As with any ECDSA prehash, only the
//! leftmost 32 bytes of a 64-byte digest enter the scalar (SEC 1, section
//! 4.1.4, step 5).
//!
//! ## Failure Handling
//!
//! Anything the primitive rejects resolves to "not verified":
//!
//! | Input problem | Outcome |
//! |---------------|---------|
//! | x-coordinate not on the curve | [`SignatureCheck::MalformedKey`] |
//! | `r` or `s` zero or not below the group order | [`SignatureCheck::MalformedSignature`] |
//! | high-`s` (malleable) signature | [`SignatureCheck::Mismatch`] |
//! | well-formed but wrong signature | [`SignatureCheck::Mismatch`] |
//!
//! None of these panic or surface as errors.
//!
//! ## References
//!
//! - SEC 1 v2 section 4.1.4: ECDSA verification. <https://www.secg.org/sec1-v2.pdf>
//! - BIP-146 / EIP-2: low-`s` normalisation.

use crate::codec::{CompressedPublicKey, ContentDigest, RawSignature};
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{Signature, VerifyingKey};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Outcome of a single signature verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureCheck {
    /// The signature is valid for this key and digest.
    Verified,

    /// The signature is well-formed but does not verify.
    Mismatch,

    /// The public key bytes do not decode to a curve point.
    MalformedKey,

    /// The signature bytes do not decode to a valid `(r, s)` pair.
    MalformedSignature,
}

impl SignatureCheck {
    /// Returns true only for [`SignatureCheck::Verified`].
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }
}

/// Stateless secp256k1 verifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureVerifier;

impl SignatureVerifier {
    /// Creates a new verifier.
    pub fn new() -> Self {
        Self
    }

    /// Verifies `signature` over `digest` under `public_key`.
    pub fn verify(
        &self,
        public_key: &CompressedPublicKey,
        signature: &RawSignature,
        digest: &ContentDigest,
    ) -> SignatureCheck {
        verify(public_key, signature, digest)
    }
}

/// Verifies `signature` over `digest` under `public_key`.
///
/// # Example
///
/// ```rust
/// use provenance_crypto::verifier::{verify, SignatureCheck};
///
/// // Not a point on the curve: resolves to a failed check, not a panic
/// let mut key = [0xffu8; 33];
/// key[0] = 0x02;
/// assert_eq!(verify(&key, &[1u8; 64], &[0u8; 64]), SignatureCheck::MalformedKey);
/// ```
pub fn verify(
    public_key: &CompressedPublicKey,
    signature: &RawSignature,
    digest: &ContentDigest,
) -> SignatureCheck {
    let verifying_key = match VerifyingKey::from_sec1_bytes(public_key) {
        Ok(key) => key,
        Err(_) => {
            debug!("public key is not a valid secp256k1 point");
            return SignatureCheck::MalformedKey;
        }
    };

    let signature = match Signature::from_slice(signature) {
        Ok(signature) => signature,
        Err(_) => {
            debug!("signature scalars out of range");
            return SignatureCheck::MalformedSignature;
        }
    };

    match verifying_key.verify_prehash(digest, &signature) {
        Ok(()) => SignatureCheck::Verified,
        Err(_) => SignatureCheck::Mismatch,
    }
}

/// Convenience wrapper returning only whether the signature verified.
pub fn is_valid(
    public_key: &CompressedPublicKey,
    signature: &RawSignature,
    digest: &ContentDigest,
) -> bool {
    verify(public_key, signature, digest).is_verified()
}

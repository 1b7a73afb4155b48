//! # Provenance Crypto
//!
//! Pure, stateless building blocks for checking that an image was signed by
//! the holder of a registered device key.
//!
//! ## Components
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`codec`] | Decode and length-check signatures, public keys and digests |
//! | [`replay`] | Reject claimed timestamps outside a symmetric window |
//! | [`verifier`] | secp256k1 ECDSA verification over a pre-computed digest |
//! | [`hashing`] | SHA-512 content digests and short key fingerprints |
//!
//! ## Pipeline Position
//!
//! ```text
//!   wire input ──▶ codec ──▶ replay ──▶ verifier ──▶ bool
//!                   │          │           │
//!                   ▼          ▼           ▼
//!              FormatError ReplayError SignatureCheck
//! ```
//!
//! The cheap structural checks run first so that malformed input is rejected
//! with a precise reason before the curve arithmetic is attempted.
//!
//! ## Security Notes
//!
//! - Private keys never enter this crate; only compressed public keys.
//! - Verification never panics on attacker-controlled bytes. A key that is
//!   not on the curve, or a signature with out-of-range scalars, is reported
//!   as a failed [`SignatureCheck`].
//! - High-`s` signatures are rejected by the underlying primitive.

pub mod codec;
pub mod error;
pub mod hashing;
pub mod replay;
pub mod verifier;

pub use codec::{
    decode_digest, decode_public_key, decode_signature, validate_public_key,
    CompressedPublicKey, ContentDigest, RawSignature,
};
pub use error::{FormatError, ReplayError};
pub use hashing::{hash_content, public_key_fingerprint};
pub use replay::{ReplayGuard, DEFAULT_WINDOW_SECS};
pub use verifier::{SignatureCheck, SignatureVerifier};

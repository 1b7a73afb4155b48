//! Inputs to the facade operations, in the shape a transport layer hands
//! them over: base64 and hex strings, optional fields as `Option`.

use provenance_audit::AttemptContext;
use serde::{Deserialize, Serialize};

/// OS fields recorded when the client does not send them.
pub const UNKNOWN_OS: &str = "unknown";

/// The public key part of a registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyInput {
    /// Client-chosen key id, used to look the key up at verification time.
    pub id: String,

    /// Base64 compressed point.
    pub bytes: String,

    /// Key algorithm name.
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// Client-computed fingerprint. Derived from the key when absent.
    #[serde(default)]
    pub fingerprint: Option<String>,
}

fn default_algorithm() -> String {
    "secp256k1".to_string()
}

/// A device registration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// Client-assigned installation id.
    pub installation_id: String,

    /// Device model.
    pub device_model: String,

    /// Operating system name.
    #[serde(default)]
    pub os_name: Option<String>,

    /// Operating system version.
    #[serde(default)]
    pub os_version: Option<String>,

    /// The device's identity key.
    pub public_key: PublicKeyInput,

    /// Client-derived device fingerprint.
    pub device_fingerprint: String,
}

/// A claim that `signature` over `content_digest` was made with the key
/// registered as `public_key_id` at `claimed_timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    /// 128 hex characters.
    pub content_digest: String,

    /// Base64 compact signature.
    pub signature: String,

    /// Registered key id.
    pub public_key_id: String,

    /// RFC 3339 timestamp from the signed payload.
    pub claimed_timestamp: String,

    /// Request origin.
    #[serde(flatten)]
    pub context: AttemptContext,
}

impl VerificationRequest {
    /// Creates a request without origin context.
    pub fn new(
        content_digest: impl Into<String>,
        signature: impl Into<String>,
        public_key_id: impl Into<String>,
        claimed_timestamp: impl Into<String>,
    ) -> Self {
        Self {
            content_digest: content_digest.into(),
            signature: signature.into(),
            public_key_id: public_key_id.into(),
            claimed_timestamp: claimed_timestamp.into(),
            context: AttemptContext::default(),
        }
    }

    /// Attaches origin context.
    pub fn with_context(mut self, context: AttemptContext) -> Self {
        self.context = context;
        self
    }
}

//! Configuration types for Provenance.
//!
//! Every section has defaults, so a TOML file only needs the keys it
//! changes:
//!
//! ```toml
//! log_filter = "provenance_core=debug,info"
//!
//! [storage]
//! db_path = "/var/lib/provenance/db"
//!
//! [verification]
//! replay_window_secs = 120
//! ```

use crate::error::ProvenanceError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Upper bound for `audit.recent_window_hours` (100 years).
pub const MAX_RECENT_WINDOW_HOURS: i64 = 100 * 365 * 24;

/// Configuration for the Provenance facade.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvenanceConfig {
    /// `tracing` filter directive used by the binary.
    pub log_filter: String,

    /// Database location.
    pub storage: StorageConfig,

    /// Device registry settings.
    pub registry: RegistryConfig,

    /// Verification pipeline settings.
    pub verification: VerificationConfig,

    /// Audit statistics settings.
    pub audit: AuditConfig,
}

impl Default for ProvenanceConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            storage: StorageConfig::default(),
            registry: RegistryConfig::default(),
            verification: VerificationConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

impl ProvenanceConfig {
    /// Loads and validates a TOML configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ProvenanceError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&raw)
    }

    /// Parses and validates TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| ProvenanceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// An in-memory configuration for tests and dry runs.
    pub fn temporary() -> Self {
        let mut config = Self::default();
        config.storage.temporary = true;
        config
    }

    /// Rejects settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.verification.replay_window_secs == 0 {
            return Err(ProvenanceError::Config(
                "verification.replay_window_secs must be positive".to_string(),
            ));
        }
        if self.verification.max_content_bytes == 0 {
            return Err(ProvenanceError::Config(
                "verification.max_content_bytes must be positive".to_string(),
            ));
        }
        if !(1..=MAX_RECENT_WINDOW_HOURS).contains(&self.audit.recent_window_hours) {
            return Err(ProvenanceError::Config(format!(
                "audit.recent_window_hours must be between 1 and {}",
                MAX_RECENT_WINDOW_HOURS
            )));
        }
        if self.registry.supported_algorithm.trim().is_empty() {
            return Err(ProvenanceError::Config(
                "registry.supported_algorithm must not be empty".to_string(),
            ));
        }
        if !self.storage.temporary && self.storage.db_path.as_os_str().is_empty() {
            return Err(ProvenanceError::Config(
                "storage.db_path must be set unless storage.temporary is true".to_string(),
            ));
        }
        Ok(())
    }
}

/// Database location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the sled database shared by registry and audit log.
    pub db_path: PathBuf,

    /// Use an in-memory database discarded on drop.
    pub temporary: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./provenance.db"),
            temporary: false,
        }
    }
}

/// Device registry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Prefix of the human-facing device name, e.g. `Device7`.
    pub display_prefix: String,

    /// The only key algorithm accepted at registration.
    pub supported_algorithm: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            display_prefix: "Device".to_string(),
            supported_algorithm: "secp256k1".to_string(),
        }
    }
}

/// Verification pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Tolerated skew of a claimed timestamp, in both directions.
    pub replay_window_secs: u64,

    /// Largest image accepted by the image-bytes entry point.
    pub max_content_bytes: usize,

    /// Keep the submitted signature on the audit entry.
    pub record_raw_signature: bool,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            replay_window_secs: provenance_crypto::DEFAULT_WINDOW_SECS,
            max_content_bytes: 50 * 1024 * 1024, // 50MB
            record_raw_signature: true,
        }
    }
}

/// Audit statistics settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Window for the `recent` counter in statistics.
    pub recent_window_hours: i64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            recent_window_hours: 24,
        }
    }
}

//! # Provenance Device Registry
//!
//! Durable mapping from a device's identities to its public key, with a
//! dense, registry-assigned sequence number ("device #N").
//!
//! ## Purpose
//!
//! 1. **Idempotent registration** - a device that registers again with any
//!    known `public_key_id`, `installation_id` or `device_fingerprint` gets
//!    its existing record back instead of a duplicate.
//!
//! 2. **Collision-safe sequence allocation** - concurrent first-time
//!    registrations each obtain a distinct sequence, gap-free, using bounded
//!    optimistic retry instead of a global lock.
//!
//! 3. **Key lookup** - verification resolves a `public_key_id` to the stored
//!    key bytes.
//!
//! The registry owns no cryptography. Key bytes are stored as given; the
//! caller validates them before registering and again before verifying.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       DEVICE REGISTRY                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │   ┌──────────────────┐         ┌──────────────────────────┐  │
//! │   │  DeviceRegistry  │         │     DeviceStore (port)   │  │
//! │   │                  │ ──────▶ │                          │  │
//! │   │  • idempotency   │         │  • unique installation   │  │
//! │   │  • max + 1       │         │  • unique key id         │  │
//! │   │  • retry x3      │         │  • unique sequence       │  │
//! │   └──────────────────┘         └────────────┬─────────────┘  │
//! │                                             │                │
//! │                                ┌────────────▼─────────────┐  │
//! │                                │     SledDeviceStore      │  │
//! │                                │  records + index trees   │  │
//! │                                │  one transaction/insert  │  │
//! │                                └──────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Failure Semantics
//!
//! | Condition | Result |
//! |-----------|--------|
//! | Identity already registered | `Ok`, `created = false` |
//! | Sequence race lost 3 times | `RegistryError::SequenceExhausted` |
//! | Storage fault | `RegistryError::Database`, not retried |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use provenance_registry::{DeviceRegistration, DeviceRegistry};
//!
//! let registry = DeviceRegistry::open("./devices.db").unwrap();
//!
//! let outcome = registry.register(&DeviceRegistration {
//!     installation_id: "3f0c".to_string(),
//!     device_model: "Pixel 8".to_string(),
//!     os_name: "Android".to_string(),
//!     os_version: "15".to_string(),
//!     public_key_id: "k1".to_string(),
//!     public_key_bytes: vec![0x02; 33],
//!     public_key_fingerprint: "9a8b7c6d5e4f3a2b".to_string(),
//!     device_fingerprint: "a1b2".to_string(),
//! }).unwrap();
//!
//! println!("registered as device #{}", outcome.sequence);
//!
//! for device in registry.list_all().unwrap() {
//!     println!("{} {}", device.display_name("Device"), device.device_model);
//! }
//! ```

pub mod models;
pub mod registry;
pub mod storage;
pub mod store;

pub use models::{
    DeviceRecord, DeviceRef, DeviceRegistration, IdentityField, InsertOutcome, Registration,
    RegistryError, Result,
};
pub use registry::{DeviceRegistry, SEQUENCE_ATTEMPTS};
pub use storage::SledDeviceStore;
pub use store::DeviceStore;

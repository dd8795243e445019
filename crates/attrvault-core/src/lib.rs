//! # Attrvault Core
//!
//! Core library for Attrvault - an attribute-level encryption engine.
//!
//! Given a plaintext value and a named attribute, the engine produces an
//! encrypted representation plus the auxiliary material (IV, salt) needed to
//! decrypt it later, and performs the inverse deterministically. Values
//! encrypted by older engine configurations keep decrypting byte-for-byte;
//! the derivation constants and the marshalling wire format are frozen
//! contracts.
//!
//! ## Architecture
//!
//! - **config**: per-attribute configuration (mode, key/salt sources)
//! - **kdf**: frozen key-stretching primitives
//! - **material**: key/salt resolution for one call
//! - **cipher**: AES-256-CBC primitive and CSPRNG
//! - **marshal**: typed values and the legacy marshalling format
//! - **codec**: value to/from the encrypted field triple
//! - **coordinator**: per-attribute registry and the write/read contract
//! - **record**: host-object slot boundary
//!
//! The engine is stateless and re-entrant per call; caller-supplied key and
//! salt sources must be `Send + Sync`.

pub mod cipher;
pub mod codec;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod kdf;
pub mod marshal;
pub mod material;
pub mod record;

pub use codec::EncryptedField;
pub use config::{Algorithm, AttributeConfig, KeySource, Mode, SaltSource};
pub use coordinator::{slot_names, AttributeCoordinator};
pub use error::{Result, VaultError};
pub use marshal::Value;
pub use record::{MemoryRecord, Record};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}

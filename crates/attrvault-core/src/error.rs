//! Error types for attrvault core operations.
//!
//! This module defines the error hierarchy for all engine operations.
//! Errors are descriptive at the core level; the CLI layer maps these
//! to user-friendly messages.

use thiserror::Error;

/// Result type alias for attrvault operations.
pub type Result<T> = std::result::Result<T, VaultError>;

/// Core error type for attrvault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Key or salt source failed, returned empty material, or produced
    /// material of the wrong length for the algorithm
    #[error("Key resolution error: {0}")]
    KeyResolution(String),

    /// Stored text is not valid encoded binary, or a required slot is missing
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Cipher operation failed: wrong key, tampered ciphertext, or
    /// IV/salt mismatch
    #[error("Decryption error: {0}")]
    Decryption(String),

    /// Marshalling or unmarshalling of a typed value failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid attribute configuration or unknown attribute name
    #[error("Config error: {0}")]
    Config(String),
}

//! Per-attribute encryption configuration.
//!
//! An [`AttributeConfig`] associates a logical attribute name with a cipher
//! mode, key/salt sources, and marshalling behavior. Configurations are
//! built once at startup, registered with the
//! [`AttributeCoordinator`](crate::coordinator::AttributeCoordinator), and
//! treated as immutable thereafter.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::Result;

/// IV/salt generation strategy for an attribute.
///
/// Structural and fixed at declare time, not a per-call choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// No stored IV or salt: key and IV are derived together from the key
    /// source. Legacy mode for shared-key data; deterministic ciphertexts.
    SingleIvAndSalt,

    /// Fresh random IV per write, stored alongside the ciphertext. The key
    /// is used directly (salt assumed to be baked into it).
    PerAttributeIv,

    /// Fresh random IV and salt per write, both stored. The salt is mixed
    /// into the key with PBKDF2. Strongest default.
    PerAttributeIvAndSalt,
}

/// Symmetric cipher identifier.
///
/// Closed set: AES-256-CBC with PKCS7 padding is the only algorithm the
/// persisted format has ever used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    Aes256Cbc,
}

/// Callback producing key or salt bytes at call time.
pub type SourceFn = dyn Fn() -> Result<Vec<u8>> + Send + Sync;

/// Source of key material for an attribute.
///
/// Resolved freshly on every encrypt/decrypt call, never memoized, so a
/// `Derived` source may re-derive (e.g. via a password-based scheme) as long
/// as it is deterministic for the same logical key. Callers are responsible
/// for thread safety of the callback.
#[derive(Clone)]
pub enum KeySource {
    /// A fixed key value, used verbatim.
    Static(Zeroizing<Vec<u8>>),
    /// A zero-argument function producing the key value.
    Derived(Arc<SourceFn>),
}

impl KeySource {
    /// Build a static source from raw key bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        KeySource::Static(Zeroizing::new(bytes.into()))
    }

    /// Build a callback source.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() -> Result<Vec<u8>> + Send + Sync + 'static,
    {
        KeySource::Derived(Arc::new(f))
    }
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Static(_) => f.debug_tuple("Static").field(&"[REDACTED]").finish(),
            KeySource::Derived(_) => f.debug_tuple("Derived").field(&"[REDACTED]").finish(),
        }
    }
}

/// Source of salt material, consulted only by [`Mode::PerAttributeIvAndSalt`].
#[derive(Clone, Default)]
pub enum SaltSource {
    /// Fresh CSPRNG bytes per write (the default).
    #[default]
    Random,
    /// A fixed salt value.
    Static(Zeroizing<Vec<u8>>),
    /// A zero-argument function producing salt bytes.
    Derived(Arc<SourceFn>),
}

impl SaltSource {
    /// Build a static source from raw salt bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        SaltSource::Static(Zeroizing::new(bytes.into()))
    }

    /// Build a callback source.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() -> Result<Vec<u8>> + Send + Sync + 'static,
    {
        SaltSource::Derived(Arc::new(f))
    }
}

impl fmt::Debug for SaltSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaltSource::Random => f.write_str("Random"),
            SaltSource::Static(_) => f.debug_tuple("Static").field(&"[REDACTED]").finish(),
            SaltSource::Derived(_) => f.debug_tuple("Derived").field(&"[REDACTED]").finish(),
        }
    }
}

/// Per-attribute configuration, immutable once declared.
#[derive(Debug, Clone)]
pub struct AttributeConfig {
    /// Logical attribute name (e.g. "nickname").
    pub name: String,

    /// IV/salt strategy.
    pub mode: Mode,

    /// Symmetric cipher identifier.
    pub algorithm: Algorithm,

    /// Key material source, re-invoked on every operation.
    pub key_source: KeySource,

    /// Salt material source; only used when `mode` requires a salt.
    pub salt_source: SaltSource,

    /// Whether plaintext is marshalled to/from a typed value.
    pub marshal: bool,

    /// Relax minimum key/salt strength validation for legacy data.
    ///
    /// Exists solely to keep historical low-entropy material decryptable;
    /// never required for new data.
    pub insecure_mode: bool,
}

impl AttributeConfig {
    /// Create a configuration with the strongest defaults:
    /// `PerAttributeIvAndSalt`, AES-256-CBC, no marshalling.
    pub fn new(name: impl Into<String>, key_source: KeySource) -> Self {
        Self {
            name: name.into(),
            mode: Mode::PerAttributeIvAndSalt,
            algorithm: Algorithm::Aes256Cbc,
            key_source,
            salt_source: SaltSource::Random,
            marshal: false,
            insecure_mode: false,
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_salt_source(mut self, salt_source: SaltSource) -> Self {
        self.salt_source = salt_source;
        self
    }

    pub fn with_marshal(mut self, marshal: bool) -> Self {
        self.marshal = marshal;
        self
    }

    pub fn with_insecure_mode(mut self, insecure_mode: bool) -> Self {
        self.insecure_mode = insecure_mode;
        self
    }
}

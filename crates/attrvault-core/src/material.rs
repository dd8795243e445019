//! Key material resolution.
//!
//! Resolves the concrete symmetric key (and salt, and implicit IV where the
//! mode calls for one) used by a single encrypt or decrypt call. Nothing is
//! cached: key and salt sources are re-invoked every time, so callers may
//! rotate a static key between restarts without the engine holding a stale
//! reference.

use zeroize::Zeroizing;

use crate::cipher;
use crate::config::{AttributeConfig, KeySource, Mode, SaltSource};
use crate::error::{Result, VaultError};
use crate::kdf::{self, IV_LEN, KEY_LEN};

/// Fresh salt length in bytes for [`SaltSource::Random`].
///
/// Matches the historical writer; the legacy raw hex-string salts decode to
/// 16 bytes and both lengths satisfy the minimum below.
pub const RANDOM_SALT_LEN: usize = 8;

/// Minimum salt length accepted unless `insecure_mode` is set.
pub const MIN_SALT_LEN: usize = 8;

/// Resolved material for one cipher operation.
pub struct KeyMaterial {
    /// The AES-256 key, post key-stretching.
    key: Zeroizing<[u8; KEY_LEN]>,

    /// IV derived together with the key, for modes that store no IV.
    pub implicit_iv: Option<[u8; IV_LEN]>,

    /// Salt that was mixed into the key, if the mode uses one. On the
    /// encrypt path this is what must be persisted alongside the ciphertext.
    pub salt: Option<Zeroizing<Vec<u8>>>,
}

impl KeyMaterial {
    pub fn key(&self) -> &[u8; KEY_LEN] {
        &self.key
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key", &"[REDACTED]")
            .field("implicit_iv", &self.implicit_iv.map(|_| "[REDACTED]"))
            .field("salt", &self.salt.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Resolve key and salt material for one call.
///
/// `stored_salt` is the salt persisted with an existing field (decrypt
/// path); `generate_salt` permits drawing a fresh salt from the configured
/// source when none is stored (encrypt path).
pub fn resolve(
    config: &AttributeConfig,
    stored_salt: Option<&[u8]>,
    generate_salt: bool,
) -> Result<KeyMaterial> {
    let raw_key = resolve_key_source(&config.key_source)?;

    match config.mode {
        Mode::SingleIvAndSalt => {
            // Key and IV derived together from the key source; any
            // configured salt source is structurally unused in this mode.
            let (key, iv) = kdf::bytes_to_key_iv(&raw_key);
            Ok(KeyMaterial {
                key,
                implicit_iv: Some(iv),
                salt: None,
            })
        }
        Mode::PerAttributeIv => {
            let key = direct_key(&raw_key)?;
            Ok(KeyMaterial {
                key,
                implicit_iv: None,
                salt: None,
            })
        }
        Mode::PerAttributeIvAndSalt => {
            let salt: Zeroizing<Vec<u8>> = match stored_salt {
                Some(stored) => Zeroizing::new(stored.to_vec()),
                None if generate_salt => resolve_salt_source(&config.salt_source)?,
                None => {
                    return Err(VaultError::KeyResolution(format!(
                        "attribute '{}' has no stored salt to decrypt with",
                        config.name
                    )))
                }
            };

            if !config.insecure_mode {
                if raw_key.len() < KEY_LEN {
                    return Err(VaultError::KeyResolution(format!(
                        "key must be at least {KEY_LEN} bytes, got {}",
                        raw_key.len()
                    )));
                }
                if salt.len() < MIN_SALT_LEN {
                    return Err(VaultError::KeyResolution(format!(
                        "salt must be at least {MIN_SALT_LEN} bytes, got {}",
                        salt.len()
                    )));
                }
            }

            let key = kdf::mix_salt_into_key(&raw_key, &salt);
            Ok(KeyMaterial {
                key,
                implicit_iv: None,
                salt: Some(salt),
            })
        }
    }
}

fn resolve_key_source(source: &KeySource) -> Result<Zeroizing<Vec<u8>>> {
    let raw = match source {
        KeySource::Static(bytes) => Zeroizing::new(bytes.to_vec()),
        KeySource::Derived(f) => Zeroizing::new(
            f().map_err(|e| VaultError::KeyResolution(format!("key source failed: {e}")))?,
        ),
    };
    if raw.is_empty() {
        return Err(VaultError::KeyResolution(
            "key source returned empty material".to_string(),
        ));
    }
    Ok(raw)
}

fn resolve_salt_source(source: &SaltSource) -> Result<Zeroizing<Vec<u8>>> {
    let salt = match source {
        SaltSource::Random => Zeroizing::new(cipher::random_salt(RANDOM_SALT_LEN)),
        SaltSource::Static(bytes) => Zeroizing::new(bytes.to_vec()),
        SaltSource::Derived(f) => Zeroizing::new(
            f().map_err(|e| VaultError::KeyResolution(format!("salt source failed: {e}")))?,
        ),
    };
    if salt.is_empty() {
        return Err(VaultError::KeyResolution(
            "salt source returned empty material".to_string(),
        ));
    }
    Ok(salt)
}

/// A [`Mode::PerAttributeIv`] key is used as-is (the salt is assumed to be
/// baked in), so it must carry a full key's worth of bytes; longer historical
/// keys are truncated the way the original cipher binding did.
fn direct_key(raw: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    if raw.len() < KEY_LEN {
        return Err(VaultError::KeyResolution(format!(
            "key must be at least {KEY_LEN} bytes, got {}",
            raw.len()
        )));
    }
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    key.copy_from_slice(&raw[..KEY_LEN]);
    Ok(key)
}

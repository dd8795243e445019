//! Encrypt/decrypt codec for a single attribute value.
//!
//! Everything the host persists is text: ciphertext, IV, and salt are each
//! base64-encoded independently. The salt slot additionally uses the legacy
//! prefix convention: a leading `_` marks a base64-encoded salt, anything
//! else is the literal salt bytes of the stored string (how pre-existing
//! rows carry their hex-string salts).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::cipher;
use crate::config::AttributeConfig;
use crate::error::{Result, VaultError};
use crate::kdf::IV_LEN;
use crate::marshal::{self, Value};
use crate::material::KeyMaterial;

/// Marker distinguishing an encoded salt slot from legacy literal salts.
const SALT_ENCODED_PREFIX: char = '_';

/// The persisted form of one encrypted attribute: three opaque text slots.
///
/// The triple is only ever written as a unit; an empty logical value is an
/// empty triple.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedField {
    /// Base64 ciphertext, or `None` for an empty value.
    pub encrypted_value: Option<String>,

    /// Base64 IV; present only for modes that store a per-attribute IV.
    pub encrypted_iv: Option<String>,

    /// Salt slot; present only for modes that store a per-attribute salt.
    pub encrypted_salt: Option<String>,
}

impl EncryptedField {
    /// The empty triple: the persisted form of "no value".
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when the value slot is absent or blank.
    pub fn is_empty(&self) -> bool {
        self.encrypted_value
            .as_deref()
            .map_or(true, |v| v.is_empty())
    }
}

/// Encrypt one value under resolved key material.
///
/// `iv` forces a specific IV (re-encrypt of an existing field); when `None`,
/// the IV is the material's implicit IV if the mode has one, otherwise fresh
/// random bytes. The caller handles empty values; they never reach here.
pub fn encrypt(
    config: &AttributeConfig,
    value: &Value,
    material: &KeyMaterial,
    iv: Option<&[u8]>,
) -> Result<EncryptedField> {
    let plaintext: Zeroizing<Vec<u8>> = if config.marshal {
        Zeroizing::new(marshal::dump(value)?)
    } else {
        Zeroizing::new(value.to_plain_string().into_bytes())
    };

    let (iv, store_iv) = match (iv, material.implicit_iv) {
        (Some(supplied), _) => (to_iv(supplied)?, true),
        (None, Some(implicit)) => (implicit, false),
        (None, None) => (cipher::random_iv(), true),
    };

    let ciphertext = cipher::encrypt(material.key(), &iv, &plaintext);

    Ok(EncryptedField {
        encrypted_value: Some(STANDARD.encode(&ciphertext)),
        encrypted_iv: store_iv.then(|| STANDARD.encode(iv)),
        encrypted_salt: material
            .salt
            .as_ref()
            .map(|salt| format!("{SALT_ENCODED_PREFIX}{}", STANDARD.encode(salt.as_slice()))),
    })
}

/// Decrypt one field under resolved key material.
///
/// The IV comes from the stored slot, or from the material's implicit IV for
/// modes that store none; a stored IV is deliberately ignored there, so a
/// field written under a different mode fails to decrypt instead of being
/// silently misread.
pub fn decrypt(config: &AttributeConfig, field: &EncryptedField, material: &KeyMaterial) -> Result<Value> {
    let encoded = field.encrypted_value.as_deref().ok_or_else(|| {
        VaultError::Encoding(format!("attribute '{}' has no stored value", config.name))
    })?;
    let ciphertext = decode_base64(encoded, "value")?;

    let iv = match material.implicit_iv {
        Some(implicit) => implicit,
        None => {
            let encoded_iv = field.encrypted_iv.as_deref().ok_or_else(|| {
                VaultError::Encoding(format!("attribute '{}' has no stored IV", config.name))
            })?;
            to_iv(&decode_base64(encoded_iv, "iv")?)?
        }
    };

    let plaintext = Zeroizing::new(cipher::decrypt(material.key(), &iv, &ciphertext)?);

    if config.marshal {
        marshal::load(&plaintext)
    } else {
        let s = std::str::from_utf8(&plaintext).map_err(|_| {
            VaultError::Decryption(
                "decrypted plaintext is not valid UTF-8 (wrong key or tampered data)".to_string(),
            )
        })?;
        Ok(Value::Str(s.to_string()))
    }
}

/// Decode a stored salt slot to raw salt bytes.
pub fn decode_salt_slot(stored: &str) -> Result<Zeroizing<Vec<u8>>> {
    match stored.strip_prefix(SALT_ENCODED_PREFIX) {
        Some(encoded) => Ok(Zeroizing::new(decode_base64(encoded, "salt")?)),
        None => Ok(Zeroizing::new(stored.as_bytes().to_vec())),
    }
}

fn decode_base64(encoded: &str, slot: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(encoded)
        .map_err(|e| VaultError::Encoding(format!("stored {slot} is not valid base64: {e}")))
}

fn to_iv(bytes: &[u8]) -> Result<[u8; IV_LEN]> {
    bytes.try_into().map_err(|_| {
        VaultError::Encoding(format!(
            "IV must be {IV_LEN} bytes, got {}",
            bytes.len()
        ))
    })
}

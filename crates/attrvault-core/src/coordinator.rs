//! Per-attribute orchestration.
//!
//! The [`AttributeCoordinator`] owns the configuration map (built once at
//! startup, immutable afterwards) and drives key resolution and the codec
//! for each `write`/`read`. It holds no other state: every call freshly
//! resolves key material, so a caller may rotate a static key between
//! application restarts without the coordinator keeping a stale reference.

use std::collections::HashMap;

use crate::codec::{self, EncryptedField};
use crate::config::AttributeConfig;
use crate::error::{Result, VaultError};
use crate::marshal::Value;
use crate::material;

/// Names of the three storage slots backing one encrypted attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotNames {
    pub value: String,
    pub iv: String,
    pub salt: String,
}

/// Fixed slot-naming convention the host must expose per attribute.
pub fn slot_names(attribute: &str) -> SlotNames {
    SlotNames {
        value: format!("encrypted_{attribute}"),
        iv: format!("encrypted_{attribute}_iv"),
        salt: format!("encrypted_{attribute}_salt"),
    }
}

/// Registry of attribute configurations plus the encode/decode entry points.
#[derive(Debug, Default)]
pub struct AttributeCoordinator {
    attributes: HashMap<String, AttributeConfig>,
}

impl AttributeCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an attribute configuration.
    ///
    /// Each name is declared exactly once; re-declaration is rejected
    /// rather than silently replacing the original parameters.
    pub fn declare(&mut self, config: AttributeConfig) -> Result<()> {
        if self.attributes.contains_key(&config.name) {
            return Err(VaultError::Config(format!(
                "attribute '{}' is already declared",
                config.name
            )));
        }
        self.attributes.insert(config.name.clone(), config);
        Ok(())
    }

    /// Look up the configuration for a declared attribute.
    pub fn config(&self, attribute: &str) -> Result<&AttributeConfig> {
        self.attributes.get(attribute).ok_or_else(|| {
            VaultError::Config(format!("attribute '{attribute}' is not declared"))
        })
    }

    /// Encrypt a value, returning the field triple for the host to persist.
    ///
    /// Empty values (nil or empty string) yield the empty triple without
    /// touching key material or the cipher.
    pub fn write(&self, attribute: &str, value: &Value) -> Result<EncryptedField> {
        let config = self.config(attribute)?;
        if value.is_empty() {
            return Ok(EncryptedField::empty());
        }
        let material = material::resolve(config, None, true)?;
        codec::encrypt(config, value, &material, None)
    }

    /// Decrypt a stored field triple back into its value.
    ///
    /// An empty triple reads as [`Value::Nil`] without touching key
    /// material or the cipher.
    pub fn read(&self, attribute: &str, field: &EncryptedField) -> Result<Value> {
        let config = self.config(attribute)?;
        if field.is_empty() {
            return Ok(Value::Nil);
        }
        let stored_salt = field
            .encrypted_salt
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(codec::decode_salt_slot)
            .transpose()?;
        let material = material::resolve(config, stored_salt.as_deref().map(|s| s.as_slice()), false)?;
        codec::decrypt(config, field, &material)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KeySource, Mode};

    const KEY: &[u8; 32] = b"0123456789abcdef0123456789abcdef";

    fn coordinator() -> AttributeCoordinator {
        let mut c = AttributeCoordinator::new();
        c.declare(AttributeConfig::new(
            "nickname",
            KeySource::from_bytes(KEY.to_vec()),
        ))
        .unwrap();
        c
    }

    #[test]
    fn test_write_read_round_trip() {
        let c = coordinator();
        let field = c.write("nickname", &Value::from("Fido the Dog")).unwrap();

        assert!(field.encrypted_value.is_some());
        assert!(field.encrypted_iv.is_some());
        assert!(field.encrypted_salt.is_some());
        assert_eq!(c.read("nickname", &field).unwrap(), Value::from("Fido the Dog"));
    }

    #[test]
    fn test_each_write_regenerates_iv_and_salt() {
        let c = coordinator();
        let a = c.write("nickname", &Value::from("same")).unwrap();
        let b = c.write("nickname", &Value::from("same")).unwrap();

        assert_ne!(a.encrypted_value, b.encrypted_value);
        assert_ne!(a.encrypted_iv, b.encrypted_iv);
        assert_ne!(a.encrypted_salt, b.encrypted_salt);
    }

    #[test]
    fn test_redeclaration_rejected() {
        let mut c = coordinator();
        let err = c
            .declare(AttributeConfig::new(
                "nickname",
                KeySource::from_bytes(vec![9u8; 32]),
            ))
            .unwrap_err();
        assert!(matches!(err, VaultError::Config(_)));
    }

    #[test]
    fn test_unknown_attribute_rejected() {
        let c = coordinator();
        assert!(matches!(
            c.write("mystery", &Value::from("x")),
            Err(VaultError::Config(_))
        ));
        assert!(matches!(
            c.read("mystery", &EncryptedField::empty()),
            Err(VaultError::Config(_))
        ));
    }

    #[test]
    fn test_empty_value_writes_empty_triple() {
        let c = coordinator();
        assert_eq!(
            c.write("nickname", &Value::Nil).unwrap(),
            EncryptedField::empty()
        );
        assert_eq!(
            c.write("nickname", &Value::from("")).unwrap(),
            EncryptedField::empty()
        );
    }

    #[test]
    fn test_empty_triple_reads_as_nil_even_with_failing_key_source() {
        // Empty values must never touch key material.
        let mut c = AttributeCoordinator::new();
        c.declare(AttributeConfig::new(
            "secret",
            KeySource::from_fn(|| Err(VaultError::Config("never call me".to_string()))),
        ))
        .unwrap();

        assert_eq!(c.read("secret", &EncryptedField::empty()).unwrap(), Value::Nil);
        assert_eq!(c.write("secret", &Value::Nil).unwrap(), EncryptedField::empty());
    }

    #[test]
    fn test_mode_isolation() {
        // A salted-mode triple must not silently decrypt under a
        // single-IV config for the same key. Fixed triple (key above,
        // salt "saltsalt", sequential IV) so the failure is deterministic.
        let mut c = AttributeCoordinator::new();
        c.declare(
            AttributeConfig::new("single", KeySource::from_bytes(KEY.to_vec()))
                .with_mode(Mode::SingleIvAndSalt),
        )
        .unwrap();

        let field = EncryptedField {
            encrypted_value: Some("bp3Hoh7ImmS+GfuX04cC4Q==".to_string()),
            encrypted_iv: Some("AAECAwQFBgcICQoLDA0ODw==".to_string()),
            encrypted_salt: Some("saltsalt".to_string()),
        };
        assert!(matches!(
            c.read("single", &field),
            Err(VaultError::Decryption(_))
        ));
    }

    #[test]
    fn test_slot_names_convention() {
        let names = slot_names("nickname");
        assert_eq!(names.value, "encrypted_nickname");
        assert_eq!(names.iv, "encrypted_nickname_iv");
        assert_eq!(names.salt, "encrypted_nickname_salt");
    }
}

//! Host-object boundary.
//!
//! The engine knows nothing about records, schemas, or queries; the host
//! only has to expose three string-typed storage slots per attribute, named
//! by the convention in [`slot_names`](crate::coordinator::slot_names).
//! [`store`]/[`load`] on the coordinator keep the triple atomic: the field
//! is fully computed before any slot is touched, so a failed operation
//! never leaves a partial triple behind.

use std::collections::HashMap;

use crate::codec::EncryptedField;
use crate::coordinator::{slot_names, AttributeCoordinator};
use crate::error::Result;
use crate::marshal::Value;

/// Storage slots of a host object, keyed by slot name.
///
/// `None` clears a slot; implementations decide how "absent" is persisted.
pub trait Record {
    fn get(&self, slot: &str) -> Option<String>;
    fn set(&mut self, slot: &str, value: Option<String>);
}

impl AttributeCoordinator {
    /// Encrypt `value` and write the resulting triple into the record's
    /// slots, all three as a unit.
    pub fn store(&self, record: &mut dyn Record, attribute: &str, value: &Value) -> Result<()> {
        let field = self.write(attribute, value)?;
        let names = slot_names(attribute);
        record.set(&names.value, field.encrypted_value);
        record.set(&names.iv, field.encrypted_iv);
        record.set(&names.salt, field.encrypted_salt);
        Ok(())
    }

    /// Read the record's slot triple and decrypt it.
    pub fn load(&self, record: &dyn Record, attribute: &str) -> Result<Value> {
        let names = slot_names(attribute);
        let field = EncryptedField {
            encrypted_value: record.get(&names.value),
            encrypted_iv: record.get(&names.iv),
            encrypted_salt: record.get(&names.salt),
        };
        self.read(attribute, &field)
    }
}

/// In-memory record, for tests and one-off tooling.
#[derive(Debug, Default, Clone)]
pub struct MemoryRecord {
    slots: HashMap<String, String>,
}

impl MemoryRecord {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Record for MemoryRecord {
    fn get(&self, slot: &str) -> Option<String> {
        self.slots.get(slot).cloned()
    }

    fn set(&mut self, slot: &str, value: Option<String>) {
        match value {
            Some(v) => {
                self.slots.insert(slot.to_string(), v);
            }
            None => {
                self.slots.remove(slot);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AttributeConfig, KeySource};
    use crate::error::VaultError;

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
    fn test_store_and_load() {
        let c = coordinator();
        let mut record = MemoryRecord::new();

        c.store(&mut record, "nickname", &Value::from("Fido the Dog"))
            .unwrap();
        assert!(record.get("encrypted_nickname").is_some());
        assert!(record.get("encrypted_nickname_iv").is_some());
        assert!(record.get("encrypted_nickname_salt").is_some());

        assert_eq!(
            c.load(&record, "nickname").unwrap(),
            Value::from("Fido the Dog")
        );
    }

    #[test]
    fn test_store_empty_clears_all_slots() {
        let c = coordinator();
        let mut record = MemoryRecord::new();

        c.store(&mut record, "nickname", &Value::from("Fido")).unwrap();
        c.store(&mut record, "nickname", &Value::Nil).unwrap();

        assert_eq!(record.get("encrypted_nickname"), None);
        assert_eq!(record.get("encrypted_nickname_iv"), None);
        assert_eq!(record.get("encrypted_nickname_salt"), None);
        assert_eq!(c.load(&record, "nickname").unwrap(), Value::Nil);
    }

    #[test]
    fn test_failed_store_leaves_record_untouched() {
        let mut c = AttributeCoordinator::new();
        c.declare(AttributeConfig::new(
            "broken",
            KeySource::from_fn(|| Err(VaultError::Config("source down".to_string()))),
        ))
        .unwrap();

        let mut record = MemoryRecord::new();
        record.set("encrypted_broken", Some("pre-existing".to_string()));

        assert!(c.store(&mut record, "broken", &Value::from("x")).is_err());
        assert_eq!(record.get("encrypted_broken").as_deref(), Some("pre-existing"));
    }

    #[test]
    fn test_load_missing_slots_is_nil() {
        let c = coordinator();
        let record = MemoryRecord::new();
        assert_eq!(c.load(&record, "nickname").unwrap(), Value::Nil);
    }
}

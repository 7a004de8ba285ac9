//! In-memory key store.
//!
//! Keys live for the lifetime of the process. Concurrent generation for the
//! same alias is last-writer-wins.

use dashmap::DashMap;
use tracing::debug;

use super::{KeyAlias, KeyHandle, KeyMaterial, KeyStore, KeyStoreError};

/// Process-local key store backed by a concurrent map.
#[derive(Default)]
pub struct MemoryKeyStore {
    keys: DashMap<KeyAlias, KeyMaterial>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl KeyStore for MemoryKeyStore {
    fn generate(&self, alias: &KeyAlias) -> Result<KeyHandle, KeyStoreError> {
        let key = KeyMaterial::generate();
        let handle = key.handle(alias);
        if self.keys.insert(alias.clone(), key).is_some() {
            debug!(alias = %alias, "Replaced existing key");
        }
        Ok(handle)
    }

    fn sign(&self, handle: &KeyHandle, message: &[u8]) -> Result<Vec<u8>, KeyStoreError> {
        let key = self
            .keys
            .get(&handle.alias)
            .ok_or_else(|| KeyStoreError::NotFound(handle.alias.to_string()))?;
        key.sign(handle, message)
    }

    fn delete(&self, alias: &KeyAlias) -> Result<(), KeyStoreError> {
        self.keys.remove(alias);
        Ok(())
    }

    fn contains(&self, alias: &KeyAlias) -> bool {
        self.keys.contains_key(alias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::verify_signature;

    #[test]
    fn test_generate_sign_delete() {
        let store = MemoryKeyStore::new();
        let alias = KeyAlias::for_user("alice");

        let handle = store.generate(&alias).unwrap();
        assert!(store.contains(&alias));

        let signature = store.sign(&handle, b"payload").unwrap();
        assert!(verify_signature(&handle.public_key, b"payload", &signature));

        store.delete(&alias).unwrap();
        assert!(!store.contains(&alias));
        // Idempotent
        store.delete(&alias).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_generate_overwrites() {
        let store = MemoryKeyStore::new();
        let alias = KeyAlias::for_user("alice");

        let first = store.generate(&alias).unwrap();
        let second = store.generate(&alias).unwrap();
        assert_ne!(first.public_key, second.public_key);
        assert_eq!(store.len(), 1);

        assert!(matches!(
            store.sign(&first, b"payload"),
            Err(KeyStoreError::KeyMismatch(_))
        ));
        assert!(store.sign(&second, b"payload").is_ok());
    }

    #[test]
    fn test_sign_missing_key() {
        let store = MemoryKeyStore::new();
        let alias = KeyAlias::for_user("alice");
        let handle = store.generate(&alias).unwrap();
        store.delete(&alias).unwrap();

        assert!(matches!(
            store.sign(&handle, b"payload"),
            Err(KeyStoreError::NotFound(_))
        ));
    }
}

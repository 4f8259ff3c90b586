//! Storage adapter seam and the in-memory backend.

use crate::errors::Result;
use std::collections::HashMap;
use std::sync::RwLock;

/// Persisted keys. Both live under the `paycheck:` namespace.
pub mod keys {
    /// Current license token.
    pub const TOKEN: &str = "paycheck:token";
    /// Stable device id.
    pub const DEVICE_ID: &str = "paycheck:device_id";
}

/// Key/value storage for opaque string blobs.
///
/// Implementations must make each `set` atomic with respect to `get`: a
/// reader sees either the old value or the new one.
pub trait StorageAdapter: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &str) -> Option<String>;

    /// Set a value by key.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a value by key. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory storage; state is lost with the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    store: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create an empty memory storage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageAdapter for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.store.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut store = self
            .store
            .write()
            .map_err(|_| crate::PaycheckError::storage("memory storage lock poisoned"))?;
        store.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut store = self
            .store
            .write()
            .map_err(|_| crate::PaycheckError::storage("memory storage lock poisoned"))?;
        store.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get(keys::TOKEN), None);

        storage.set(keys::TOKEN, "a.b.c").unwrap();
        assert_eq!(storage.get(keys::TOKEN).as_deref(), Some("a.b.c"));

        storage.set(keys::TOKEN, "d.e.f").unwrap();
        assert_eq!(storage.get(keys::TOKEN).as_deref(), Some("d.e.f"));

        storage.remove(keys::TOKEN).unwrap();
        assert_eq!(storage.get(keys::TOKEN), None);
    }

    #[test]
    fn test_memory_storage_remove_absent() {
        let storage = MemoryStorage::new();
        assert!(storage.remove("missing").is_ok());
    }
}

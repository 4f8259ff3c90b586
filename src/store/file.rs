//! File-based storage backend with atomic writes.
//!
//! Stores all keys as one JSON object in
//! `dirs::data_dir()/<namespace>/paycheck.json`.
//! Uses temp file + rename for atomic writes.

use crate::errors::{PaycheckError, Result};
use crate::store::adapter::StorageAdapter;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

const STATE_FILE: &str = "paycheck.json";

/// File-based storage backend.
pub struct FileStorage {
    /// Path of the state file.
    path: PathBuf,
    /// Last successfully persisted contents.
    cache: RwLock<HashMap<String, String>>,
}

impl FileStorage {
    /// Create a file storage with the given namespace.
    ///
    /// Files are stored under `dirs::data_dir()/<namespace>/`.
    pub fn new(namespace: &str) -> Result<Self> {
        let base_dir = dirs::data_dir()
            .ok_or_else(|| PaycheckError::storage("Could not find data directory"))?;
        Self::with_path(base_dir.join(namespace))
    }

    /// Create a file storage rooted at a specific directory.
    pub fn with_path(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .map_err(|e| PaycheckError::storage(format!("Failed to create storage dir: {}", e)))?;

        let path = dir.join(STATE_FILE);
        let cache = if path.exists() {
            let json = fs::read_to_string(&path)
                .map_err(|e| PaycheckError::storage(format!("Failed to read state file: {}", e)))?;
            serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "discarding unreadable state file");
                HashMap::new()
            })
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            cache: RwLock::new(cache),
        })
    }

    /// Path of the backing state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `change` to a copy of the state, persist it, then publish it.
    ///
    /// The in-memory view only changes once the file has been replaced.
    fn update(&self, change: impl FnOnce(&mut HashMap<String, String>)) -> Result<()> {
        let mut cache = self
            .cache
            .write()
            .map_err(|_| PaycheckError::storage("file storage lock poisoned"))?;

        let mut next = cache.clone();
        change(&mut next);
        self.persist(&next)?;
        *cache = next;
        Ok(())
    }

    fn persist(&self, state: &HashMap<String, String>) -> Result<()> {
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| PaycheckError::storage(format!("Failed to serialize state: {}", e)))?;

        let temp_path = self.path.with_extension("json.tmp");

        // Write to temp file
        fs::write(&temp_path, json)
            .map_err(|e| PaycheckError::storage(format!("Failed to write temp file: {}", e)))?;

        // Atomic rename
        fs::rename(&temp_path, &self.path)
            .map_err(|e| PaycheckError::storage(format!("Failed to rename state file: {}", e)))?;

        Ok(())
    }
}

impl StorageAdapter for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.cache.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|state| {
            state.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|state| {
            state.remove(key);
        })
    }
}

impl std::fmt::Debug for FileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStorage")
            .field("path", &self.path)
            .finish()
    }
}

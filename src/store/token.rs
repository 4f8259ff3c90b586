//! The single persisted license token.
//!
//! Reads are served from an in-memory copy; writes go to storage first and
//! only then replace the copy, all under one write lock. A reader therefore
//! sees the previous token or the next one, never a partial write.

use crate::crypto::digest::token_fingerprint;
use crate::errors::{PaycheckError, Result};
use crate::store::adapter::{keys, StorageAdapter};
use std::sync::{Arc, RwLock};

/// Owner of the persisted token slot.
pub struct TokenStore {
    storage: Arc<dyn StorageAdapter>,
    current: RwLock<Option<String>>,
}

impl TokenStore {
    /// Load the token slot from storage.
    pub fn load(storage: Arc<dyn StorageAdapter>) -> Self {
        let current = storage.get(keys::TOKEN).filter(|t| !t.is_empty());
        Self {
            storage,
            current: RwLock::new(current),
        }
    }

    /// The stored token, if any.
    pub fn get(&self) -> Option<String> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Overwrite the stored token.
    pub fn replace(&self, token: &str) -> Result<()> {
        let mut current = self.write_guard()?;
        self.storage.set(keys::TOKEN, token)?;
        *current = Some(token.to_string());
        tracing::debug!(token = %token_fingerprint(token), "token stored");
        Ok(())
    }

    /// Overwrite the stored token only if it still equals `expected`.
    ///
    /// Returns `false` without writing when another operation changed the
    /// slot in the meantime.
    pub fn replace_if_current(&self, expected: &str, token: &str) -> Result<bool> {
        let mut current = self.write_guard()?;
        if current.as_deref() != Some(expected) {
            return Ok(false);
        }
        self.storage.set(keys::TOKEN, token)?;
        *current = Some(token.to_string());
        tracing::debug!(token = %token_fingerprint(token), "token rotated");
        Ok(true)
    }

    /// Remove the stored token.
    ///
    /// The in-memory slot is emptied even if the backend fails, so this
    /// process stops treating the token as present.
    pub fn clear(&self) -> Result<()> {
        let mut current = self.write_guard()?;
        *current = None;
        self.storage.remove(keys::TOKEN)
    }

    fn write_guard(&self) -> Result<std::sync::RwLockWriteGuard<'_, Option<String>>> {
        self.current
            .write()
            .map_err(|_| PaycheckError::storage("token store lock poisoned"))
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("has_token", &self.get().is_some())
            .finish()
    }
}

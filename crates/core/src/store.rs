//! Persistent key-value storage
//!
//! Values are JSON-encoded strings under an application-scoped prefix. Reads
//! never fail: a missing key, a storage error and malformed JSON all read as
//! "unset".

use crate::error::{SessionError, SessionResult};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, warn};

/// Key of the serialized session record
pub const AUTH_KEY: &str = "AUTH";

/// Key of the shared "active until" timestamp
pub const ACTIVE_UNTIL_KEY: &str = "ACTIVE_UNTIL";

/// Raw string storage backend (e.g. `window.localStorage`)
#[cfg_attr(test, mockall::automock)]
pub trait KeyValueStore {
    fn get(&self, key: &str) -> SessionResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> SessionResult<()>;
    fn remove(&self, key: &str) -> SessionResult<()>;
}

/// JSON view over a [`KeyValueStore`] with every key under a fixed prefix
#[derive(Clone)]
pub struct PrefixedStore {
    backend: Rc<dyn KeyValueStore>,
    prefix: String,
}

impl PrefixedStore {
    pub fn new(backend: Rc<dyn KeyValueStore>, prefix: impl Into<String>) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
        }
    }

    /// Full storage key for `key`
    pub fn key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    /// Read and decode a value, treating anything unreadable as unset
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let full_key = self.key(key);
        let raw = match self.backend.get(&full_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %full_key, error = %e, "Failed to read from storage");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %full_key, error = %e, "Ignoring malformed stored value");
                None
            }
        }
    }

    /// Encode and write a value
    pub fn write<T: Serialize>(&self, key: &str, value: &T) -> SessionResult<()> {
        let full_key = self.key(key);
        let serialized = serde_json::to_string(value)?;
        self.backend.set(&full_key, &serialized)?;
        debug!(key = %full_key, "Persisted value");
        Ok(())
    }

    pub fn remove(&self, key: &str) -> SessionResult<()> {
        self.backend.remove(&self.key(key))
    }
}

/// In-memory backend. Clones share the same map, the way two tabs of one
/// origin share `localStorage`.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stored string, bypassing any prefix handling
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> SessionResult<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> SessionResult<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> SessionResult<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.entries.borrow().len())
            .finish()
    }
}

/// Convenience for a backend that always fails, e.g. when storage is
/// disabled by the browser
pub fn unavailable_store_error(operation: &str) -> SessionError {
    SessionError::unavailable(format!("storage is not available for {operation}"))
}

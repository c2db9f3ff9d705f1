//! `localStorage` backend

use tenure_core::store::unavailable_store_error;
use tenure_core::{KeyValueStore, SessionError, SessionResult};
use web_sys::Storage;

/// [`KeyValueStore`] over `window.localStorage`, shared by every tab of the
/// origin. Storage is looked up per call so that a page without a window
/// (prerender, worker) degrades to errors instead of panicking.
#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserStore;

impl BrowserStore {
    pub const fn new() -> Self {
        Self
    }

    /// Whether `localStorage` can be reached from this context
    pub fn is_available() -> bool {
        local_storage().is_some()
    }
}

fn local_storage() -> Option<Storage> {
    web_sys::window().and_then(|w| w.local_storage().ok().flatten())
}

fn js_error(operation: &str, key: &str) -> SessionError {
    SessionError::storage(format!("localStorage {operation} failed for {key}"))
}

impl KeyValueStore for BrowserStore {
    fn get(&self, key: &str) -> SessionResult<Option<String>> {
        let storage = local_storage().ok_or_else(|| unavailable_store_error("get"))?;
        storage.get_item(key).map_err(|_| js_error("get", key))
    }

    fn set(&self, key: &str, value: &str) -> SessionResult<()> {
        let storage = local_storage().ok_or_else(|| unavailable_store_error("set"))?;
        // Fails when the quota is exhausted or storage is disabled
        storage.set_item(key, value).map_err(|_| js_error("set", key))
    }

    fn remove(&self, key: &str) -> SessionResult<()> {
        let storage = local_storage().ok_or_else(|| unavailable_store_error("remove"))?;
        storage.remove_item(key).map_err(|_| js_error("remove", key))
    }
}

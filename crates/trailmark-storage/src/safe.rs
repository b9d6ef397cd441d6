//! Never-failing wrappers over the storage and cookie ports
//!
//! Every failure degrades to "no value" (reads) or `false` (writes) and is
//! logged at debug level. When storage is unavailable the pipeline keeps
//! working, it only loses persistence.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use trailmark_core::ports::{CookieOptions, ICookieJar, IKeyValueStore};

/// Safe view over an [`IKeyValueStore`]
#[derive(Clone)]
pub struct SafeStorage {
    inner: Arc<dyn IKeyValueStore>,
}

impl SafeStorage {
    pub fn new(inner: Arc<dyn IKeyValueStore>) -> Self {
        Self { inner }
    }

    /// Reads `key`; errors read as `None`
    pub fn get(&self, key: &str) -> Option<String> {
        match self.inner.get(key) {
            Ok(value) => value,
            Err(e) => {
                debug!(key, error = %e, "Storage read failed");
                None
            }
        }
    }

    /// Writes `key`; returns false on failure
    pub fn set(&self, key: &str, value: &str) -> bool {
        match self.inner.set(key, value) {
            Ok(()) => true,
            Err(e) => {
                debug!(key, error = %e, "Storage write failed");
                false
            }
        }
    }

    /// Removes `key`; returns false on failure
    pub fn remove(&self, key: &str) -> bool {
        match self.inner.remove(key) {
            Ok(()) => true,
            Err(e) => {
                debug!(key, error = %e, "Storage remove failed");
                false
            }
        }
    }

    /// Reads and deserializes a JSON value; invalid JSON reads as `None`
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(key, error = %e, "Stored value is not valid JSON");
                None
            }
        }
    }

    /// Serializes `value` as JSON and writes it
    pub fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        match serde_json::to_string(value) {
            Ok(raw) => self.set(key, &raw),
            Err(e) => {
                debug!(key, error = %e, "Failed to serialize value for storage");
                false
            }
        }
    }

    /// Removes every key starting with `prefix`; returns how many were removed
    pub fn purge_prefix(&self, prefix: &str) -> usize {
        let keys = match self.inner.keys() {
            Ok(keys) => keys,
            Err(e) => {
                debug!(prefix, error = %e, "Storage key listing failed");
                return 0;
            }
        };

        keys.iter()
            .filter(|k| k.starts_with(prefix))
            .filter(|k| self.remove(k))
            .count()
    }
}

impl std::fmt::Debug for SafeStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeStorage").finish_non_exhaustive()
    }
}

/// Safe view over an [`ICookieJar`]
#[derive(Clone)]
pub struct SafeCookies {
    inner: Arc<dyn ICookieJar>,
}

impl SafeCookies {
    pub fn new(inner: Arc<dyn ICookieJar>) -> Self {
        Self { inner }
    }

    pub fn get(&self, name: &str) -> Option<String> {
        match self.inner.get(name) {
            Ok(value) => value,
            Err(e) => {
                debug!(name, error = %e, "Cookie read failed");
                None
            }
        }
    }

    pub fn set(&self, name: &str, value: &str, options: &CookieOptions) -> bool {
        match self.inner.set(name, value, options) {
            Ok(()) => true,
            Err(e) => {
                debug!(name, error = %e, "Cookie write failed");
                false
            }
        }
    }

    pub fn remove(&self, name: &str, domain: Option<&str>) -> bool {
        match self.inner.remove(name, domain) {
            Ok(()) => true,
            Err(e) => {
                debug!(name, error = %e, "Cookie remove failed");
                false
            }
        }
    }
}

impl std::fmt::Debug for SafeCookies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeCookies").finish_non_exhaustive()
    }
}

//! Key-value persistence capability.
//!
//! The SDK persists identifiers, session state, and queued events through
//! this interface. Implementations are cookie- or storage-backed in a real
//! embedding; this crate ships an in-memory store for tests and for hosts
//! without durable storage.
//!
//! Unavailable storage is a degraded mode, not an error: `get` returns
//! `None` and `set`/`remove` are no-ops. Callers treat missing values as
//! "feature unavailable".

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Write options for a stored value.
///
/// Mirrors cookie scoping: domain, path, expiry, SameSite, Secure. Stores
/// that have no notion of scoping ignore these.
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Cookie domain
    pub domain: Option<String>,
    /// Cookie path
    pub path: Option<String>,
    /// Max age in milliseconds
    pub max_age_ms: Option<u64>,
    /// SameSite attribute (Lax, Strict, None)
    pub same_site: Option<String>,
    /// Secure attribute
    pub secure: bool,
}

/// A shared key-value store handle.
pub type SharedStore = Arc<dyn KeyValueStore>;

/// Key-value persistence capability.
///
/// All methods are infallible by contract: an unavailable backing store
/// returns `None` / silently drops writes rather than erroring.
pub trait KeyValueStore: Send + Sync {
    /// Read a value, or `None` if absent or the store is unavailable.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value with options. No-op if the store is unavailable.
    fn set(&self, key: &str, value: &str, options: &StoreOptions);

    /// Remove a value. No-op if absent or unavailable.
    fn remove(&self, key: &str);

    /// List all keys with the given prefix.
    ///
    /// Used by the retry queue to reload persisted items after a reload.
    fn keys_with_prefix(&self, prefix: &str) -> Vec<String>;

    /// Whether the backing store is currently usable.
    fn is_available(&self) -> bool {
        true
    }
}

/// Extension helpers for JSON-encoded values.
pub trait KeyValueStoreExt: KeyValueStore {
    /// Read and deserialize a JSON value. Malformed stored data reads as
    /// absent.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|raw| serde_json::from_str(&raw).ok())
    }

    /// Serialize and write a JSON value with default options.
    fn set_json<T: Serialize>(&self, key: &str, value: &T) {
        if let Ok(raw) = serde_json::to_string(value) {
            self.set(key, &raw, &StoreOptions::default());
        }
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStoreExt for S {}

/// In-memory store.
///
/// Shared across clones; used in tests and as the fallback when the host
/// provides no durable storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap in a shared handle.
    #[must_use]
    pub fn shared() -> SharedStore {
        Arc::new(Self::new())
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str, _options: &StoreOptions) {
        let _ = self
            .entries
            .write()
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        let _ = self.entries.write().remove(key);
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }
}

/// A store that is permanently unavailable.
///
/// Models private browsing / disabled cookies: reads return `None`, writes
/// vanish. Lets the rest of the SDK exercise its degraded paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableStore;

impl KeyValueStore for UnavailableStore {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&self, _key: &str, _value: &str, _options: &StoreOptions) {}

    fn remove(&self, _key: &str) {}

    fn keys_with_prefix(&self, _prefix: &str) -> Vec<String> {
        Vec::new()
    }

    fn is_available(&self) -> bool {
        false
    }
}

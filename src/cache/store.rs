use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error};

/// One cached value under a logical resource name.
///
/// `invalidate` clears the timestamp but keeps the value, so views can keep
/// showing last-known content while a revalidating fetch runs.
#[derive(Debug, Clone, Default)]
pub struct CacheEntry {
    value: Option<serde_json::Value>,
    last_updated: Option<DateTime<Utc>>,
}

impl CacheEntry {
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    pub fn age(&self) -> Option<Duration> {
        self.last_updated.map(|at| Utc::now() - at)
    }
}

/// Per-domain rule deciding whether a cached read may be served without a
/// refetch. Supplied by callers, not global.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidityPolicy {
    /// Valid while younger than the window.
    MaxAge(Duration),
    /// Valid until explicitly invalidated.
    UntilInvalidated,
}

impl ValidityPolicy {
    fn allows(&self, entry: &CacheEntry) -> bool {
        let Some(age) = entry.age() else {
            // No timestamp: never written, or explicitly invalidated.
            return false;
        };
        match self {
            ValidityPolicy::MaxAge(window) => age <= *window,
            ValidityPolicy::UntilInvalidated => true,
        }
    }
}

/// Process-lifetime keyed store of cached values.
///
/// Entries are created lazily on first write and survive until session
/// teardown. The store performs no I/O; every mutation is synchronous.
#[derive(Debug, Default)]
pub struct CacheStore {
    entries: HashMap<String, CacheEntry>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last-known value under `key`, stale or not.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.entries.get(key)?.value.clone()?;
        match serde_json::from_value(raw) {
            Ok(value) => Some(value),
            Err(e) => {
                error!(key, error = %e, "Cached value does not match requested type");
                None
            }
        }
    }

    pub fn entry(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Replace the value under `key` and stamp it fresh.
    pub fn write<T: Serialize>(&mut self, key: &str, value: &T) {
        let raw = match serde_json::to_value(value) {
            Ok(raw) => raw,
            Err(e) => {
                error!(key, error = %e, "Failed to serialize value for cache");
                return;
            }
        };
        let entry = self.entries.entry(key.to_string()).or_default();
        entry.value = Some(raw);
        entry.last_updated = Some(Utc::now());
        debug!(key, "cache write");
    }

    /// Mark `key` stale without discarding the last-known value.
    pub fn invalidate(&mut self, key: &str) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.last_updated = None;
            debug!(key, "cache invalidated");
        }
    }

    /// Whether a read of `key` may be served without refetching.
    pub fn is_valid(&self, key: &str, policy: &ValidityPolicy) -> bool {
        self.entries
            .get(key)
            .map(|entry| policy.allows(entry))
            .unwrap_or(false)
    }

    /// Session teardown (sign-out). Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        debug!("cache cleared");
    }
}

/// Cloneable handle to the session cache.
///
/// Injected through construction rather than reached as a singleton, so
/// tests substitute their own instance.
#[derive(Debug, Clone, Default)]
pub struct SharedCache {
    inner: Arc<Mutex<CacheStore>>,
}

impl SharedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.lock().get(key)
    }

    pub fn write<T: Serialize>(&self, key: &str, value: &T) {
        self.lock().write(key, value);
    }

    pub fn invalidate(&self, key: &str) {
        self.lock().invalidate(key);
    }

    pub fn is_valid(&self, key: &str, policy: &ValidityPolicy) -> bool {
        self.lock().is_valid(key, policy)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn last_updated(&self, key: &str) -> Option<DateTime<Utc>> {
        self.lock().entry(key).and_then(|e| e.last_updated())
    }

    pub(crate) fn lock(&self) -> std::sync::MutexGuard<'_, CacheStore> {
        // A poisoned cache lock means a panic mid-mutation; the cached data
        // is advisory, so keep serving it.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

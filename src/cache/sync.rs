use tokio::sync::broadcast;
use tracing::debug;

use super::store::SharedCache;

/// Capacity of the patch broadcast channel.
/// Patches are small and consumed promptly by mounted views; 32 covers
/// bursts from batch accept flows.
const PATCH_CHANNEL_CAPACITY: usize = 32;

/// A cache mutation applied out of band, fanned out to list views.
#[derive(Debug, Clone)]
pub struct CachePatch {
    pub key: String,
    /// The full merged value now stored under `key`.
    pub value: serde_json::Value,
}

/// Propagates out-of-band cache mutations into shared state.
///
/// When an action in one view (accepting a join request in the detail
/// screen) changes an aggregate another view renders (the pending-count
/// badges on the list), the confirmed server response is merged into the
/// cache here and every subscriber is notified - nobody refetches.
///
/// Patches must be derived from a confirmed write response, never from
/// speculative UI state.
#[derive(Debug, Clone)]
pub struct CacheSync {
    cache: SharedCache,
    tx: broadcast::Sender<CachePatch>,
}

impl CacheSync {
    pub fn new(cache: SharedCache) -> Self {
        let (tx, _) = broadcast::channel(PATCH_CHANNEL_CAPACITY);
        Self { cache, tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CachePatch> {
        self.tx.subscribe()
    }

    /// Merge `partial` into the aggregate cached under `key` and notify
    /// subscribers. Object partials are merged key-by-key; anything else
    /// replaces the aggregate wholesale.
    pub fn patch(&self, key: &str, partial: serde_json::Value) {
        let merged = {
            let mut store = self.cache.lock();
            let merged = match (store.get::<serde_json::Value>(key), partial) {
                (Some(serde_json::Value::Object(mut current)), serde_json::Value::Object(update)) => {
                    for (k, v) in update {
                        current.insert(k, v);
                    }
                    serde_json::Value::Object(current)
                }
                (_, replacement) => replacement,
            };
            // The patch carries server-confirmed data, so it counts as fresh.
            store.write(key, &merged);
            merged
        };
        debug!(key, "cache patched");
        if let Err(e) = self.tx.send(CachePatch {
            key: key.to_string(),
            value: merged,
        }) {
            // No mounted subscribers; the cache write alone is enough.
            debug!(key, error = %e, "no subscribers for cache patch");
        }
    }

    /// Convenience for the pending-counts aggregate: one event's confirmed
    /// count.
    pub fn patch_pending_count(&self, key: &str, event_id: i64, pending: u32) {
        self.patch(key, serde_json::json!({ event_id.to_string(): pending }));
    }
}

//! Session cache shared across views.
//!
//! The store keeps one entry per logical resource name for the lifetime of
//! the session. Validity is a per-domain policy supplied by callers, so the
//! feed can run a tight window while list resources stay warm longer.

pub mod resource;
pub mod store;
pub mod sync;

pub use resource::{CachedQuery, QuerySnapshot};
pub use store::{CacheEntry, CacheStore, SharedCache, ValidityPolicy};
pub use sync::{CachePatch, CacheSync};

/// Cache key for the feed's current-candidate snapshot.
pub const FEED_CANDIDATE_KEY: &str = "feed.currentCandidate";

/// Cache key for the signed-in user's event list.
pub const MY_EVENTS_KEY: &str = "events.mine";

/// Cache key for the pending join-request counts aggregate.
pub const PENDING_COUNTS_KEY: &str = "events.pendingCounts";

/// Cache key for the signed-in user's profile.
pub const PROFILE_KEY: &str = "profile.me";

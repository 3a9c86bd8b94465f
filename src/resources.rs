//! Per-resource cache bindings.
//!
//! Each view-facing resource gets one [`CachedQuery`] under a fixed cache
//! key, with the validity window configured per domain. These constructors
//! are the only place keys and policies are paired, so unrelated views
//! sharing a resource agree on both.

use crate::cache::{
    CacheSync, CachedQuery, SharedCache, ValidityPolicy, MY_EVENTS_KEY, PENDING_COUNTS_KEY,
    PROFILE_KEY,
};
use crate::config::Config;
use crate::models::{EventSummary, PendingCounts, Profile, RequestAck};

/// Events the signed-in user organizes.
pub fn my_events_query(cache: SharedCache, config: &Config) -> CachedQuery<Vec<EventSummary>> {
    CachedQuery::new(
        cache,
        MY_EVENTS_KEY,
        ValidityPolicy::MaxAge(config.resource_validity()),
    )
}

/// Pending join-request counts across the user's events.
pub fn pending_counts_query(cache: SharedCache, config: &Config) -> CachedQuery<PendingCounts> {
    CachedQuery::new(
        cache,
        PENDING_COUNTS_KEY,
        ValidityPolicy::MaxAge(config.resource_validity()),
    )
}

/// The signed-in user's profile. Edited rarely; stays valid until the edit
/// flow invalidates it explicitly.
pub fn profile_query(cache: SharedCache, _config: &Config) -> CachedQuery<Profile> {
    CachedQuery::new(cache, PROFILE_KEY, ValidityPolicy::UntilInvalidated)
}

/// Fold a confirmed join-request response into the pending-counts aggregate
/// and notify list views. Derived from the server ack, never from
/// speculative UI state.
pub fn apply_request_ack(sync: &CacheSync, ack: &RequestAck) {
    sync.patch_pending_count(PENDING_COUNTS_KEY, ack.event_id, ack.pending);
}

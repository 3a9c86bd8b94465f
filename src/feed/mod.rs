//! Swipe feed session: filter, backend contract, and the session
//! controller that owns the current candidate and the fetch-ahead pipeline.

pub mod controller;
pub mod filter;

use async_trait::async_trait;

use crate::api::ApiError;
use crate::models::{EventCard, PendingDecision};

pub use controller::{FeedController, FeedSnapshot};
pub use filter::FeedFilter;

/// Backend operations the feed session depends on.
///
/// Injected as a trait object so tests drive the controller with a scripted
/// backend instead of a live API. [`crate::api::ApiClient`] is the
/// production implementation.
#[async_trait]
pub trait FeedBackend: Send + Sync {
    /// Next candidate for `filter`. Exhaustion is reported as
    /// [`ApiError::NotFound`], which the controller treats as domain state,
    /// not failure.
    async fn next_candidate(&self, filter: &FeedFilter) -> Result<EventCard, ApiError>;

    /// Durably record a decision. The candidate slot may not be reused
    /// until this resolves.
    async fn record_decision(&self, decision: &PendingDecision) -> Result<(), ApiError>;

    /// Forget recorded skips within the filter scope so skipped events can
    /// reappear.
    async fn reset_skips(&self, filter: &FeedFilter) -> Result<(), ApiError>;
}

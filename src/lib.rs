//! Core library for Townmeet - a mini-app with a swipeable feed of town
//! events, event management, and profile editing over a REST backend.
//!
//! The interesting part is the session engine behind the swipe feed:
//! [`feed::FeedController`] reconciles the server's "next candidate" cursor
//! with a validity-windowed session cache shared across views
//! ([`cache::SharedCache`]), cancels in-flight fetches when their parameters
//! change, and prefetches the next candidate concurrently with recording a
//! decision while guaranteeing the decision is durably recorded before the
//! displayed card changes. [`cache::CachedQuery`] is the generic
//! cache-backed binding the simpler resources (my events, pending counts,
//! profile) are built from, and [`cache::CacheSync`] fans confirmed
//! out-of-band mutations back into list views without a refetch.

pub mod api;
pub mod cache;
pub mod config;
pub mod feed;
pub mod fetch;
pub mod models;
pub mod resources;

pub use api::{ApiClient, ApiError};
pub use cache::{CacheSync, CachedQuery, SharedCache, ValidityPolicy};
pub use config::Config;
pub use feed::{FeedBackend, FeedController, FeedFilter, FeedSnapshot};
pub use fetch::FetchOutcome;

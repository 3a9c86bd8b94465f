//! REST API client module for the Townmeet backend.
//!
//! Wraps the feed, event, join-request, and profile endpoints behind typed
//! methods. Authentication is handled elsewhere; this client only carries
//! an opaque bearer token.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;

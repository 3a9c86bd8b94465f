//! Fetch executor: runs one asynchronous backend operation under a
//! cancellation token.
//!
//! Cancellation is cooperative. The token being signalled means the result
//! is no longer wanted; the outcome is a distinguished [`FetchOutcome::Cancelled`]
//! that callers treat as a no-op, never as a user-visible error.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::ApiError;

/// Outcome of a single executed fetch.
#[derive(Debug)]
pub enum FetchOutcome<T> {
    /// The operation completed and its result is wanted.
    Done(T),
    /// The token was signalled before completion. Absorb silently.
    Cancelled,
    /// The operation failed with a classified error.
    Failed(ApiError),
}

impl<T> FetchOutcome<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchOutcome::Cancelled)
    }
}

/// Race `op` against `token`. The executor performs no side effects of its
/// own and never touches the cache.
pub async fn execute<T, F>(op: F, token: CancellationToken) -> FetchOutcome<T>
where
    F: Future<Output = Result<T, ApiError>>,
{
    tokio::select! {
        _ = token.cancelled() => {
            debug!("fetch cancelled before completion");
            FetchOutcome::Cancelled
        }
        result = op => match result {
            Ok(value) => FetchOutcome::Done(value),
            Err(err) => FetchOutcome::Failed(err),
        },
    }
}

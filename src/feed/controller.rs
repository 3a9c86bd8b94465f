//! Feed session controller.
//!
//! Owns the currently displayed candidate, the filter, decision recording,
//! and the fetch-ahead pipeline. Exactly one fetch is live per controller at
//! a time: issuing a new one bumps the generation and cancels its
//! predecessor, and a superseded result is discarded unconditionally however
//! it resolves. The displayed candidate only changes after a decision write
//! has been confirmed by the backend.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::ApiError;
use crate::cache::{SharedCache, ValidityPolicy, FEED_CANDIDATE_KEY};
use crate::fetch::{execute, FetchOutcome};
use crate::models::{DecisionKind, EventCard, PendingDecision};

use super::{FeedBackend, FeedFilter};

/// Observable state of the feed session, published on every transition.
#[derive(Debug, Clone, Default)]
pub struct FeedSnapshot {
    pub current_candidate: Option<EventCard>,
    /// No further candidates satisfy the filter right now. Domain state,
    /// not an error.
    pub exhausted: bool,
    pub fetching: bool,
    pub error: Option<String>,
    pub filter: FeedFilter,
}

/// Serialized slice of feed state kept in the session cache so a remount
/// within the validity window skips the network round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FeedCacheSnapshot {
    candidate: Option<EventCard>,
    #[serde(rename = "filterSignature")]
    filter_signature: String,
    exhausted: bool,
}

struct FeedState {
    candidate: Option<EventCard>,
    exhausted: bool,
    fetching: bool,
    error: Option<String>,
    filter: FeedFilter,
    generation: u64,
    live: Option<CancellationToken>,
    decision_pending: bool,
}

impl FeedState {
    fn new(filter: FeedFilter) -> Self {
        Self {
            candidate: None,
            exhausted: false,
            fetching: false,
            error: None,
            filter,
            generation: 0,
            live: None,
            decision_pending: false,
        }
    }

    /// Issue a new live fetch: cancel the predecessor and hand out a fresh
    /// token under a bumped generation.
    fn supersede(&mut self) -> CancellationToken {
        self.generation += 1;
        if let Some(prev) = self.live.take() {
            prev.cancel();
        }
        let token = CancellationToken::new();
        self.live = Some(token.clone());
        token
    }

    /// Stop the live fetch without issuing a successor.
    fn abandon_live(&mut self) {
        self.generation += 1;
        if let Some(prev) = self.live.take() {
            prev.cancel();
        }
    }

    fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            current_candidate: self.candidate.clone(),
            exhausted: self.exhausted,
            fetching: self.fetching,
            error: self.error.clone(),
            filter: self.filter.clone(),
        }
    }
}

struct FeedInner {
    backend: Arc<dyn FeedBackend>,
    cache: SharedCache,
    validity: ValidityPolicy,
    state: Mutex<FeedState>,
    watch_tx: watch::Sender<FeedSnapshot>,
}

/// Stateful controller behind the swipe feed view.
#[derive(Clone)]
pub struct FeedController {
    inner: Arc<FeedInner>,
}

impl FeedController {
    pub fn new(
        backend: Arc<dyn FeedBackend>,
        cache: SharedCache,
        filter: FeedFilter,
        validity: ValidityPolicy,
    ) -> Self {
        let state = FeedState::new(filter);
        let (watch_tx, _) = watch::channel(state.snapshot());
        Self {
            inner: Arc::new(FeedInner {
                backend,
                cache,
                validity,
                state: Mutex::new(state),
                watch_tx,
            }),
        }
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.inner.state().snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.inner.watch_tx.subscribe()
    }

    /// Mount: rehydrate from a valid cached snapshot for the same filter
    /// signature, otherwise enter the fetch pipeline.
    pub fn start(&self) {
        let filter = self.inner.state().filter.clone();
        if let Err(msg) = filter.validate() {
            self.enter_validation_error(msg);
            return;
        }
        if self.inner.cache.is_valid(FEED_CANDIDATE_KEY, &self.inner.validity) {
            if let Some(cached) = self.inner.cache.get::<FeedCacheSnapshot>(FEED_CANDIDATE_KEY) {
                if cached.filter_signature == filter.signature() {
                    debug!("rehydrating feed from cached snapshot");
                    {
                        let mut st = self.inner.state();
                        st.candidate = cached.candidate;
                        st.exhausted = cached.exhausted;
                        st.fetching = false;
                        st.error = None;
                    }
                    self.inner.publish();
                    return;
                }
                debug!("cached feed snapshot is for a different filter");
            }
            self.inner.cache.invalidate(FEED_CANDIDATE_KEY);
        }
        self.spawn_fetch();
    }

    /// Apply a new filter. A structurally equal filter is ignored; a real
    /// change invalidates the cached snapshot, cancels any in-flight fetch,
    /// and restarts the pipeline.
    pub fn set_filter(&self, filter: FeedFilter) {
        {
            let mut st = self.inner.state();
            if st.filter == filter {
                debug!("filter unchanged, ignoring");
                return;
            }
            st.filter = filter.clone();
        }
        if let Err(msg) = filter.validate() {
            self.enter_validation_error(msg);
            return;
        }
        self.inner.cache.invalidate(FEED_CANDIDATE_KEY);
        self.spawn_fetch();
    }

    /// Record a decision for the displayed candidate.
    ///
    /// The write and the next-candidate prefetch run concurrently, but the
    /// displayed swap is gated on the write: the backend has durably
    /// recorded the decision before the candidate that produced it is
    /// discarded. A failed write keeps the candidate, surfaces the error,
    /// and throws the prefetched candidate away.
    pub async fn decide(
        &self,
        kind: DecisionKind,
        message: Option<String>,
    ) -> Result<(), ApiError> {
        if kind.requires_message() && message.as_deref().map_or(true, |m| m.trim().is_empty()) {
            return Err(ApiError::Validation(
                "Add a message to send with your like".to_string(),
            ));
        }
        let (candidate_id, filter, generation, token) = {
            let mut st = self.inner.state();
            let Some(candidate_id) = st.candidate.as_ref().map(|c| c.id) else {
                return Err(ApiError::Validation("No event to decide on".to_string()));
            };
            if st.decision_pending {
                return Err(ApiError::Validation(
                    "Hold on - the previous decision is still being saved".to_string(),
                ));
            }
            st.decision_pending = true;
            let token = st.supersede();
            st.fetching = true;
            st.error = None;
            (candidate_id, st.filter.clone(), st.generation, token)
        };
        self.inner.publish();

        let decision = PendingDecision {
            candidate_id,
            kind,
            message,
        };
        let backend = Arc::clone(&self.inner.backend);
        let write = self.inner.backend.record_decision(&decision);
        let prefetch = execute(async move { backend.next_candidate(&filter).await }, token);
        let (write_res, prefetch_out) = tokio::join!(write, prefetch);

        let mut st = self.inner.state();
        st.decision_pending = false;
        match write_res {
            Ok(()) => {
                drop(st);
                self.inner.apply_fetch(generation, prefetch_out);
                Ok(())
            }
            Err(err) => {
                warn!(candidate_id, error = %err, "decision write failed");
                if st.generation == generation {
                    st.live = None;
                    st.fetching = false;
                    st.error = Some(err.user_message());
                }
                drop(st);
                self.inner.publish();
                Err(err)
            }
        }
    }

    /// Clear recorded skips for the current filter scope and refetch.
    pub async fn reset_skips(&self) -> Result<(), ApiError> {
        let filter = self.inner.state().filter.clone();
        match self.inner.backend.reset_skips(&filter).await {
            Ok(()) => {
                {
                    let mut st = self.inner.state();
                    st.exhausted = false;
                }
                self.inner.cache.invalidate(FEED_CANDIDATE_KEY);
                self.spawn_fetch();
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "reset skips failed");
                {
                    let mut st = self.inner.state();
                    st.error = Some(err.user_message());
                }
                self.inner.publish();
                Err(err)
            }
        }
    }

    /// Manual retry after an error.
    pub fn retry(&self) {
        let filter = self.inner.state().filter.clone();
        if let Err(msg) = filter.validate() {
            self.enter_validation_error(msg);
            return;
        }
        self.spawn_fetch();
    }

    /// Unmount: stop delivering results. The session cache keeps the last
    /// snapshot for the next mount.
    pub fn shutdown(&self) {
        let mut st = self.inner.state();
        st.abandon_live();
        st.fetching = false;
    }

    /// Local validation failure: no network call is attempted.
    fn enter_validation_error(&self, msg: String) {
        {
            let mut st = self.inner.state();
            st.abandon_live();
            st.fetching = false;
            st.error = Some(msg);
        }
        self.inner.publish();
    }

    fn spawn_fetch(&self) {
        let (generation, token, filter) = {
            let mut st = self.inner.state();
            let token = st.supersede();
            st.fetching = true;
            st.error = None;
            (st.generation, token, st.filter.clone())
        };
        self.inner.publish();

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let backend = Arc::clone(&inner.backend);
            let outcome = execute(
                async move { backend.next_candidate(&filter).await },
                token,
            )
            .await;
            inner.apply_fetch(generation, outcome);
        });
    }
}

impl FeedInner {
    fn state(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self) {
        let snap = self.state().snapshot();
        self.watch_tx.send_replace(snap);
    }

    /// Apply a completed fetch, unless a later fetch has been issued since.
    /// Cancellation always comes paired with a generation bump, so the
    /// generation check alone decides whether a result is still wanted.
    fn apply_fetch(&self, generation: u64, outcome: FetchOutcome<EventCard>) {
        {
            let mut st = self.state();
            if st.generation != generation {
                debug!("discarding superseded feed fetch result");
                return;
            }
            st.live = None;
            match outcome {
                FetchOutcome::Done(card) => {
                    debug!(candidate_id = card.id, "feed candidate loaded");
                    st.candidate = Some(card);
                    st.exhausted = false;
                    st.fetching = false;
                    st.error = None;
                    self.write_snapshot(&st);
                }
                FetchOutcome::Cancelled => return,
                FetchOutcome::Failed(err) if err.is_not_found() => {
                    debug!("feed exhausted for current filter");
                    st.candidate = None;
                    st.exhausted = true;
                    st.fetching = false;
                    st.error = None;
                    self.write_snapshot(&st);
                }
                FetchOutcome::Failed(err) => {
                    warn!(error = %err, "feed fetch failed");
                    st.fetching = false;
                    st.error = Some(err.user_message());
                    // last-known candidate stays untouched
                }
            }
        }
        self.publish();
    }

    fn write_snapshot(&self, st: &FeedState) {
        let snapshot = FeedCacheSnapshot {
            candidate: st.candidate.clone(),
            filter_signature: st.filter.signature(),
            exhausted: st.exhausted,
        };
        self.cache.write(FEED_CANDIDATE_KEY, &snapshot);
    }
}

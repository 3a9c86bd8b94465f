use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::ApiError;
use crate::fetch::{execute, FetchOutcome};

use super::store::{SharedCache, ValidityPolicy};

/// Observable state of a cached resource.
#[derive(Debug, Clone)]
pub struct QuerySnapshot<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for QuerySnapshot<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }
}

struct QueryState<T> {
    data: Option<T>,
    loading: bool,
    error: Option<String>,
    enabled: bool,
    /// Monotonic issue counter. A completed fetch applies its result only if
    /// no later fetch has been issued, regardless of completion order.
    generation: u64,
    live: Option<CancellationToken>,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
            enabled: true,
            generation: 0,
            live: None,
        }
    }
}

struct QueryInner<T> {
    cache: SharedCache,
    key: String,
    policy: ValidityPolicy,
    transform: Option<Box<dyn Fn(T) -> T + Send + Sync>>,
    state: Mutex<QueryState<T>>,
    watch_tx: watch::Sender<QuerySnapshot<T>>,
}

/// Generic binding of one fetchable resource to the session cache.
///
/// Views construct one per resource (`events.mine`, `events.pendingCounts`,
/// `profile.me`) and observe `{ data, loading, error }` through
/// [`CachedQuery::subscribe`]. The swipe feed has its own controller and does
/// not go through this type.
pub struct CachedQuery<T> {
    inner: Arc<QueryInner<T>>,
}

impl<T> Clone for CachedQuery<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> CachedQuery<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(cache: SharedCache, key: impl Into<String>, policy: ValidityPolicy) -> Self {
        Self::build(cache, key.into(), policy, None)
    }

    /// Like [`CachedQuery::new`], with a transform applied to every fetched
    /// value before it is cached and exposed.
    pub fn with_transform(
        cache: SharedCache,
        key: impl Into<String>,
        policy: ValidityPolicy,
        transform: impl Fn(T) -> T + Send + Sync + 'static,
    ) -> Self {
        Self::build(cache, key.into(), policy, Some(Box::new(transform)))
    }

    fn build(
        cache: SharedCache,
        key: String,
        policy: ValidityPolicy,
        transform: Option<Box<dyn Fn(T) -> T + Send + Sync>>,
    ) -> Self {
        let (watch_tx, _) = watch::channel(QuerySnapshot::default());
        Self {
            inner: Arc::new(QueryInner {
                cache,
                key,
                policy,
                transform,
                state: Mutex::new(QueryState::default()),
                watch_tx,
            }),
        }
    }

    pub fn snapshot(&self) -> QuerySnapshot<T> {
        self.inner.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<QuerySnapshot<T>> {
        self.inner.watch_tx.subscribe()
    }

    /// First activation: serve a valid cached value without fetching,
    /// otherwise fetch.
    pub fn activate<F, Fut>(&self, fetch: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        if !self.inner.state().enabled {
            return;
        }
        if self.inner.cache.is_valid(&self.inner.key, &self.inner.policy) {
            if let Some(value) = self.inner.cache.get::<T>(&self.inner.key) {
                debug!(key = %self.inner.key, "serving cached value");
                {
                    let mut st = self.inner.state();
                    st.data = Some(value);
                    st.loading = false;
                    st.error = None;
                }
                self.inner.publish();
                return;
            }
        }
        self.refetch(fetch);
    }

    /// Fetch unconditionally, bypassing the validity check. Each call
    /// supersedes any fetch still in flight.
    pub fn refetch<F, Fut>(&self, fetch: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let (generation, token) = {
            let mut st = self.inner.state();
            if !st.enabled {
                debug!(key = %self.inner.key, "refetch ignored while disabled");
                return;
            }
            st.generation += 1;
            if let Some(prev) = st.live.take() {
                prev.cancel();
            }
            let token = CancellationToken::new();
            st.live = Some(token.clone());
            st.loading = true;
            st.error = None;
            (st.generation, token)
        };
        self.inner.publish();

        let fut = fetch();
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let outcome = execute(fut, token).await;
            inner.apply(generation, outcome);
        });
    }

    /// Collaborator precondition toggled (e.g. signed out mid-flight).
    /// Disabling cancels any in-flight fetch and forces `loading` off.
    pub fn set_enabled(&self, enabled: bool) {
        {
            let mut st = self.inner.state();
            if st.enabled == enabled {
                return;
            }
            st.enabled = enabled;
            if !enabled {
                if let Some(token) = st.live.take() {
                    token.cancel();
                }
                st.loading = false;
            }
        }
        self.inner.publish();
    }
}

impl<T> QueryInner<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn state(&self) -> MutexGuard<'_, QueryState<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn snapshot(&self) -> QuerySnapshot<T> {
        let st = self.state();
        QuerySnapshot {
            data: st.data.clone(),
            loading: st.loading,
            error: st.error.clone(),
        }
    }

    fn publish(&self) {
        let snap = self.snapshot();
        self.watch_tx.send_replace(snap);
    }

    fn apply(&self, generation: u64, outcome: FetchOutcome<T>) {
        {
            let mut st = self.state();
            if st.generation != generation {
                debug!(key = %self.key, "discarding superseded fetch result");
                return;
            }
            st.live = None;
            match outcome {
                FetchOutcome::Done(value) => {
                    let value = match &self.transform {
                        Some(f) => f(value),
                        None => value,
                    };
                    self.cache.write(&self.key, &value);
                    st.data = Some(value);
                    st.loading = false;
                    st.error = None;
                }
                FetchOutcome::Cancelled => return,
                FetchOutcome::Failed(err) => {
                    debug!(key = %self.key, error = %err, "fetch failed");
                    st.loading = false;
                    st.error = Some(err.user_message());
                }
            }
        }
        self.publish();
    }
}

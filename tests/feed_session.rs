//! End-to-end feed session scenarios against a scripted backend.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, Notify};
use tokio::time::timeout;

use townmeet_core::api::ApiError;
use townmeet_core::cache::{SharedCache, ValidityPolicy, FEED_CANDIDATE_KEY};
use townmeet_core::feed::{FeedBackend, FeedController, FeedFilter, FeedSnapshot};
use townmeet_core::models::{DecisionKind, EventCard, PendingDecision};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One scripted backend response, optionally gated on a [`Notify`] so tests
/// control completion order.
enum Scripted<T> {
    Ready(Result<T, ApiError>),
    Gated(Arc<Notify>, Result<T, ApiError>),
}

#[derive(Default)]
struct MockBackend {
    candidates: Mutex<VecDeque<Scripted<EventCard>>>,
    decisions: Mutex<VecDeque<Scripted<()>>>,
    resets: Mutex<VecDeque<Scripted<()>>>,
    candidate_calls: AtomicUsize,
    decision_log: Mutex<Vec<PendingDecision>>,
}

impl MockBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push_candidate(&self, result: Result<EventCard, ApiError>) {
        self.candidates
            .lock()
            .unwrap()
            .push_back(Scripted::Ready(result));
    }

    fn push_gated_candidate(&self, result: Result<EventCard, ApiError>) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.candidates
            .lock()
            .unwrap()
            .push_back(Scripted::Gated(Arc::clone(&gate), result));
        gate
    }

    fn push_decision(&self, result: Result<(), ApiError>) {
        self.decisions
            .lock()
            .unwrap()
            .push_back(Scripted::Ready(result));
    }

    fn push_gated_decision(&self, result: Result<(), ApiError>) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.decisions
            .lock()
            .unwrap()
            .push_back(Scripted::Gated(Arc::clone(&gate), result));
        gate
    }

    fn push_reset(&self, result: Result<(), ApiError>) {
        self.resets
            .lock()
            .unwrap()
            .push_back(Scripted::Ready(result));
    }
}

async fn resolve<T>(entry: Option<Scripted<T>>, what: &str) -> Result<T, ApiError> {
    match entry {
        Some(Scripted::Ready(result)) => result,
        Some(Scripted::Gated(gate, result)) => {
            gate.notified().await;
            result
        }
        None => Err(ApiError::Unknown(format!("{} script exhausted", what))),
    }
}

#[async_trait]
impl FeedBackend for MockBackend {
    async fn next_candidate(&self, _filter: &FeedFilter) -> Result<EventCard, ApiError> {
        self.candidate_calls.fetch_add(1, Ordering::SeqCst);
        let entry = self.candidates.lock().unwrap().pop_front();
        resolve(entry, "candidate").await
    }

    async fn record_decision(&self, decision: &PendingDecision) -> Result<(), ApiError> {
        self.decision_log.lock().unwrap().push(decision.clone());
        let entry = self.decisions.lock().unwrap().pop_front();
        resolve(entry, "decision").await
    }

    async fn reset_skips(&self, _filter: &FeedFilter) -> Result<(), ApiError> {
        let entry = self.resets.lock().unwrap().pop_front();
        resolve(entry, "reset").await
    }
}

fn card(id: i64) -> EventCard {
    EventCard {
        id,
        title: format!("Event {}", id),
        description: None,
        town_id: "t-1".to_string(),
        starts_at: None,
        ends_at: None,
        photo_url: None,
        organizer_name: None,
        spots_left: None,
    }
}

fn exhausted_err() -> ApiError {
    ApiError::NotFound("no candidate".to_string())
}

fn open_filter() -> FeedFilter {
    FeedFilter::default()
}

fn town_filter(town: &str) -> FeedFilter {
    FeedFilter {
        town_id: Some(town.to_string()),
        from_day: None,
        to_day: None,
        enabled: true,
    }
}

fn controller(backend: Arc<MockBackend>, cache: SharedCache, filter: FeedFilter) -> FeedController {
    FeedController::new(
        backend,
        cache,
        filter,
        ValidityPolicy::MaxAge(chrono::Duration::minutes(5)),
    )
}

async fn wait_for<P>(rx: &mut watch::Receiver<FeedSnapshot>, mut pred: P)
where
    P: FnMut(&FeedSnapshot) -> bool,
{
    timeout(Duration::from_secs(2), async {
        loop {
            let done = pred(&rx.borrow());
            if done {
                return;
            }
            rx.changed().await.expect("feed snapshot sender dropped");
        }
    })
    .await
    .expect("condition not reached in time");
}

fn cached_candidate_id(cache: &SharedCache) -> Option<i64> {
    cache
        .get::<serde_json::Value>(FEED_CANDIDATE_KEY)
        .and_then(|v| v["candidate"]["id"].as_i64())
}

// Scenario A: open filter, server returns a candidate.
#[tokio::test]
async fn initial_fetch_yields_candidate() {
    let backend = MockBackend::new();
    backend.push_candidate(Ok(card(1)));
    let feed = controller(backend, SharedCache::new(), open_filter());
    let mut rx = feed.subscribe();

    feed.start();
    wait_for(&mut rx, |s| !s.fetching && s.current_candidate.is_some()).await;

    let snap = feed.snapshot();
    assert_eq!(snap.current_candidate.unwrap().id, 1);
    assert!(!snap.exhausted);
    assert!(snap.error.is_none());
}

// Scenario B: 404 on the initial fetch is exhaustion, not an error.
#[tokio::test]
async fn not_found_means_exhausted() {
    let backend = MockBackend::new();
    backend.push_candidate(Err(exhausted_err()));
    let feed = controller(backend, SharedCache::new(), open_filter());
    let mut rx = feed.subscribe();

    feed.start();
    wait_for(&mut rx, |s| s.exhausted).await;

    let snap = feed.snapshot();
    assert!(snap.current_candidate.is_none());
    assert!(snap.error.is_none());
    assert!(!snap.fetching);
}

// Scenario C: skip succeeds, prefetched candidate swaps in, cache follows.
#[tokio::test]
async fn successful_decision_swaps_to_prefetched_candidate() {
    let backend = MockBackend::new();
    backend.push_candidate(Ok(card(1)));
    backend.push_candidate(Ok(card(2)));
    backend.push_decision(Ok(()));
    let cache = SharedCache::new();
    let feed = controller(Arc::clone(&backend), cache.clone(), open_filter());
    let mut rx = feed.subscribe();

    feed.start();
    wait_for(&mut rx, |s| s.current_candidate.is_some()).await;

    feed.decide(DecisionKind::Skip, None).await.unwrap();

    let snap = feed.snapshot();
    assert_eq!(snap.current_candidate.unwrap().id, 2);
    assert_eq!(cached_candidate_id(&cache), Some(2));
    let log = backend.decision_log.lock().unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].candidate_id, 1);
    assert_eq!(log[0].kind, DecisionKind::Skip);
}

// Scenario D: failed write keeps the candidate and discards the prefetch.
#[tokio::test]
async fn failed_decision_write_keeps_candidate() {
    let backend = MockBackend::new();
    backend.push_candidate(Ok(card(1)));
    backend.push_candidate(Ok(card(2)));
    backend.push_decision(Err(ApiError::Server("rejected".to_string())));
    let cache = SharedCache::new();
    let feed = controller(backend, cache.clone(), open_filter());
    let mut rx = feed.subscribe();

    feed.start();
    wait_for(&mut rx, |s| s.current_candidate.is_some()).await;

    let result = feed.decide(DecisionKind::Like, None).await;
    assert!(matches!(result, Err(ApiError::Server(_))));

    let snap = feed.snapshot();
    assert_eq!(snap.current_candidate.unwrap().id, 1);
    assert!(snap.error.is_some());
    assert!(!snap.fetching);
    // No cache mutation past the one made when candidate 1 loaded.
    assert_eq!(cached_candidate_id(&cache), Some(1));
}

// Scenario E: a filter change supersedes the in-flight fetch; only the new
// filter's result is ever observed.
#[tokio::test]
async fn filter_change_discards_in_flight_fetch() {
    init_tracing();
    let backend = MockBackend::new();
    let gate = backend.push_gated_candidate(Ok(card(1)));
    backend.push_candidate(Ok(card(2)));
    let feed = controller(backend, SharedCache::new(), town_filter("t-a"));
    let mut rx = feed.subscribe();

    feed.start();
    wait_for(&mut rx, |s| s.fetching).await;

    feed.set_filter(town_filter("t-b"));
    wait_for(&mut rx, |s| {
        s.current_candidate.as_ref().map(|c| c.id) == Some(2)
    })
    .await;

    // Release the superseded fetch; its result must never surface.
    gate.notify_one();
    tokio::task::yield_now().await;
    assert_eq!(feed.snapshot().current_candidate.unwrap().id, 2);
}

// Happens-before: the displayed candidate never changes before the paired
// decision write has resolved, even when the prefetch finishes first.
#[tokio::test]
async fn swap_waits_for_decision_write() {
    init_tracing();
    let backend = MockBackend::new();
    backend.push_candidate(Ok(card(1)));
    backend.push_candidate(Ok(card(2)));
    let write_gate = backend.push_gated_decision(Ok(()));
    let feed = controller(backend, SharedCache::new(), open_filter());
    let mut rx = feed.subscribe();

    feed.start();
    wait_for(&mut rx, |s| s.current_candidate.is_some()).await;

    let deciding = feed.clone();
    let handle = tokio::spawn(async move { deciding.decide(DecisionKind::Like, None).await });

    // Give the prefetch every chance to complete while the write is held.
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    assert_eq!(feed.snapshot().current_candidate.unwrap().id, 1);
    assert!(feed.snapshot().fetching);

    write_gate.notify_one();
    handle.await.unwrap().unwrap();
    assert_eq!(feed.snapshot().current_candidate.unwrap().id, 2);
}

// A second decision for the same slot is rejected while one is in flight.
#[tokio::test]
async fn decision_slot_is_not_reused_while_pending() {
    init_tracing();
    let backend = MockBackend::new();
    backend.push_candidate(Ok(card(1)));
    backend.push_candidate(Ok(card(2)));
    let write_gate = backend.push_gated_decision(Ok(()));
    let feed = controller(backend, SharedCache::new(), open_filter());
    let mut rx = feed.subscribe();

    feed.start();
    wait_for(&mut rx, |s| s.current_candidate.is_some()).await;

    let deciding = feed.clone();
    let handle = tokio::spawn(async move { deciding.decide(DecisionKind::Skip, None).await });
    tokio::task::yield_now().await;

    let second = feed.decide(DecisionKind::Like, None).await;
    assert!(matches!(second, Err(ApiError::Validation(_))));

    write_gate.notify_one();
    handle.await.unwrap().unwrap();
}

// Reset-skips clears exhaustion and re-enters the fetch pipeline.
#[tokio::test]
async fn reset_skips_recovers_from_exhaustion() {
    let backend = MockBackend::new();
    backend.push_candidate(Err(exhausted_err()));
    backend.push_candidate(Ok(card(3)));
    backend.push_reset(Ok(()));
    let feed = controller(backend, SharedCache::new(), open_filter());
    let mut rx = feed.subscribe();

    feed.start();
    wait_for(&mut rx, |s| s.exhausted).await;

    feed.reset_skips().await.unwrap();
    wait_for(&mut rx, |s| s.current_candidate.is_some()).await;

    let snap = feed.snapshot();
    assert_eq!(snap.current_candidate.unwrap().id, 3);
    assert!(!snap.exhausted);
}

// Transport errors surface as messages and retry() recovers.
#[tokio::test]
async fn retry_recovers_from_server_error() {
    let backend = MockBackend::new();
    backend.push_candidate(Err(ApiError::Server("down".to_string())));
    backend.push_candidate(Ok(card(4)));
    let feed = controller(backend, SharedCache::new(), open_filter());
    let mut rx = feed.subscribe();

    feed.start();
    wait_for(&mut rx, |s| s.error.is_some()).await;
    assert!(!feed.snapshot().exhausted);

    feed.retry();
    wait_for(&mut rx, |s| s.current_candidate.is_some()).await;
    assert!(feed.snapshot().error.is_none());
}

// A fresh mount within the validity window rehydrates from the cache
// without touching the backend.
#[tokio::test]
async fn remount_rehydrates_from_cache() {
    let cache = SharedCache::new();
    let first_backend = MockBackend::new();
    first_backend.push_candidate(Ok(card(7)));
    let first = controller(Arc::clone(&first_backend), cache.clone(), open_filter());
    let mut rx = first.subscribe();
    first.start();
    wait_for(&mut rx, |s| s.current_candidate.is_some()).await;
    first.shutdown();

    let second_backend = MockBackend::new();
    let second = controller(Arc::clone(&second_backend), cache.clone(), open_filter());
    second.start();

    let snap = second.snapshot();
    assert_eq!(snap.current_candidate.unwrap().id, 7);
    assert!(!snap.fetching);
    assert_eq!(second_backend.candidate_calls.load(Ordering::SeqCst), 0);
}

// A cached snapshot for a different filter signature is ignored.
#[tokio::test]
async fn rehydration_requires_matching_filter_signature() {
    let cache = SharedCache::new();
    let first_backend = MockBackend::new();
    first_backend.push_candidate(Ok(card(7)));
    let first = controller(Arc::clone(&first_backend), cache.clone(), open_filter());
    let mut rx = first.subscribe();
    first.start();
    wait_for(&mut rx, |s| s.current_candidate.is_some()).await;
    first.shutdown();

    let second_backend = MockBackend::new();
    second_backend.push_candidate(Ok(card(8)));
    let second = controller(
        Arc::clone(&second_backend),
        cache.clone(),
        town_filter("t-z"),
    );
    let mut rx2 = second.subscribe();
    second.start();
    wait_for(&mut rx2, |s| s.current_candidate.is_some()).await;

    assert_eq!(second.snapshot().current_candidate.unwrap().id, 8);
    assert_eq!(second_backend.candidate_calls.load(Ordering::SeqCst), 1);
}

// Switching to a filter that fails validation cancels the live fetch and
// reports the message without a network call.
#[tokio::test]
async fn invalid_filter_change_cancels_and_reports() {
    let backend = MockBackend::new();
    let _gate = backend.push_gated_candidate(Ok(card(1)));
    let feed = controller(Arc::clone(&backend), SharedCache::new(), open_filter());
    let mut rx = feed.subscribe();

    feed.start();
    wait_for(&mut rx, |s| s.fetching).await;

    feed.set_filter(FeedFilter {
        enabled: true,
        town_id: None,
        from_day: None,
        to_day: None,
    });
    wait_for(&mut rx, |s| s.error.is_some() && !s.fetching).await;

    // Only the original mount fetch ever reached the backend.
    assert_eq!(backend.candidate_calls.load(Ordering::SeqCst), 1);
}

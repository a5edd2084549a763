//! Query orchestration: cache, fetch, sequencing and event emission.
//!
//! # Query lifecycle
//!
//! ```text
//! Idle ──begin──▶ Loading ──cache hit / fetch ok──▶ Success
//!                    │
//!                    └──────fetch failed──────────▶ Error
//! ```
//!
//! Every committed query gets a monotonically increasing sequence number when
//! it is dispatched. Fetches are never cancelled, so completions can arrive
//! out of order; a completion whose sequence number is no longer the latest
//! is stale and is dropped without touching the phase or emitting anything.
//!
//! Events are emitted outside the state lock, so an [`EventBus`] may read
//! [`Orchestrator::phase`] and [`Orchestrator::latest_seq`] from `emit`. It
//! must not dispatch or select from there.
//!
//! [`EventBus`]: dropsearch_events::EventBus

use crate::callbacks::SearchCallbacks;
use dropsearch_cache::QueryCache;
use dropsearch_events::{EventBusRef, NullEventBus, SearchEvent};
use dropsearch_fetch::{FetchError, ResultFetcher};
use dropsearch_input::SuppressionFlag;
use dropsearch_records::{display_text, Record, ResultSet, DEFAULT_DISPLAY_FIELD};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Where the most recent query stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPhase {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

/// How a dispatched query ended.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Succeeded { results: ResultSet, cached: bool },
    Failed(FetchError),
    /// A newer query was dispatched before this one completed.
    Stale,
}

#[derive(Debug, Default)]
struct DispatchState {
    latest_seq: u64,
    phase: SearchPhase,
}

/// Drives committed queries through the cache and the fetcher.
pub struct Orchestrator {
    cache: Arc<QueryCache>,
    fetcher: ResultFetcher,
    endpoint: Mutex<String>,
    bus: EventBusRef,
    callbacks: SearchCallbacks,
    suppression: SuppressionFlag,
    display_field: String,
    dispatch: Mutex<DispatchState>,
    // Serializes state change plus emit so events leave in state order.
    emit_order: Mutex<()>,
    selected: Mutex<Option<Record>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dispatch = lock(&self.dispatch);
        f.debug_struct("Orchestrator")
            .field("endpoint", &*lock(&self.endpoint))
            .field("latest_seq", &dispatch.latest_seq)
            .field("phase", &dispatch.phase)
            .finish_non_exhaustive()
    }
}

// Guarded values are plain data that is always left consistent.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Orchestrator {
    pub fn new(endpoint: impl Into<String>, cache: Arc<QueryCache>, fetcher: ResultFetcher) -> Self {
        Self {
            cache,
            fetcher,
            endpoint: Mutex::new(endpoint.into()),
            bus: Arc::new(NullEventBus),
            callbacks: SearchCallbacks::default(),
            suppression: SuppressionFlag::new(),
            display_field: DEFAULT_DISPLAY_FIELD.to_string(),
            dispatch: Mutex::new(DispatchState::default()),
            emit_order: Mutex::new(()),
            selected: Mutex::new(None),
        }
    }

    pub fn with_event_bus(mut self, bus: EventBusRef) -> Self {
        self.bus = bus;
        self
    }

    pub fn with_callbacks(mut self, callbacks: SearchCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Share the suppression flag with the input debouncer.
    pub fn with_suppression(mut self, suppression: SuppressionFlag) -> Self {
        self.suppression = suppression;
        self
    }

    pub fn with_display_field(mut self, display_field: impl Into<String>) -> Self {
        self.display_field = display_field.into();
        self
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn suppression(&self) -> &SuppressionFlag {
        &self.suppression
    }

    pub fn phase(&self) -> SearchPhase {
        lock(&self.dispatch).phase
    }

    /// Sequence number of the most recently dispatched query (0 before any).
    pub fn latest_seq(&self) -> u64 {
        lock(&self.dispatch).latest_seq
    }

    /// The most recently chosen record.
    pub fn selected(&self) -> Option<Record> {
        lock(&self.selected).clone()
    }

    pub fn endpoint(&self) -> String {
        lock(&self.endpoint).clone()
    }

    /// Point future fetches at a new endpoint template.
    ///
    /// Cached entries are keyed by query only and stay in place.
    pub fn set_endpoint(&self, endpoint: impl Into<String>) {
        *lock(&self.endpoint) = endpoint.into();
    }

    pub fn set_cache_ttl(&self, ttl_secs: u64) {
        self.cache.set_ttl(ttl_secs);
    }

    /// Dispatch `query` and wait for it to finish.
    pub async fn dispatch(&self, query: String) -> QueryOutcome {
        let seq = self.begin(&query);
        self.resolve(seq, query).await
    }

    /// Assign a sequence number to `query` and enter Loading.
    pub fn begin(&self, query: &str) -> u64 {
        let _order = lock(&self.emit_order);
        let seq = {
            let mut dispatch = lock(&self.dispatch);
            dispatch.latest_seq += 1;
            dispatch.phase = SearchPhase::Loading;
            dispatch.latest_seq
        };

        tracing::debug!(seq, query, "query dispatched");
        self.bus.emit(SearchEvent::LoadingStarted {
            seq,
            query: query.to_string(),
        });
        seq
    }

    /// Resolve a query started with [`begin`](Self::begin).
    pub async fn resolve(&self, seq: u64, query: String) -> QueryOutcome {
        if let Some(results) = self.cache.lookup(&query) {
            return self.deliver_success(seq, query, results, true);
        }

        let endpoint = self.endpoint();
        match self.fetcher.fetch(&endpoint, &query).await {
            Ok(results) => {
                // Valid for its own key even if the display has moved on.
                self.cache.store(&query, results.clone());
                self.deliver_success(seq, query, results, false)
            }
            Err(error) => self.deliver_failure(seq, query, error),
        }
    }

    /// Move to `phase` if `seq` is still the latest query.
    fn settle(&self, seq: u64, phase: SearchPhase) -> bool {
        let mut dispatch = lock(&self.dispatch);
        if dispatch.latest_seq != seq {
            return false;
        }
        dispatch.phase = phase;
        true
    }

    fn deliver_success(
        &self,
        seq: u64,
        query: String,
        results: ResultSet,
        cached: bool,
    ) -> QueryOutcome {
        {
            let _order = lock(&self.emit_order);
            if !self.settle(seq, SearchPhase::Success) {
                tracing::debug!(seq, query, "discarding stale results");
                return QueryOutcome::Stale;
            }

            tracing::debug!(seq, query, count = results.len(), cached, "query succeeded");
            self.bus.emit(SearchEvent::Succeeded {
                seq,
                query,
                results: results.clone(),
                cached,
            });
        }

        self.callbacks.notify_success(&results);
        QueryOutcome::Succeeded { results, cached }
    }

    fn deliver_failure(&self, seq: u64, query: String, error: FetchError) -> QueryOutcome {
        {
            let _order = lock(&self.emit_order);
            if !self.settle(seq, SearchPhase::Error) {
                tracing::debug!(seq, query, "discarding stale failure");
                return QueryOutcome::Stale;
            }

            tracing::warn!(seq, query, error = %error, "query failed");
            self.bus.emit(SearchEvent::Failed {
                seq,
                query,
                error: error.clone(),
            });
        }

        self.callbacks.notify_error(&error);
        QueryOutcome::Failed(error)
    }

    /// Record a user selection.
    ///
    /// Arms the suppression flag so the edit that fills the field with the
    /// chosen text does not start a search, and returns that text.
    pub fn select(&self, record: Record) -> String {
        let text = display_text(&record, &self.display_field);

        *lock(&self.selected) = Some(record.clone());
        self.suppression.set();

        tracing::debug!(text = %text, "selection changed");
        {
            let _order = lock(&self.emit_order);
            self.bus.emit(SearchEvent::SelectionChanged {
                record: record.clone(),
            });
        }
        self.callbacks.notify_selection(&record);
        text
    }

    /// Consume committed queries until `cancel` fires or the channel closes.
    ///
    /// Each query is sequenced here, in arrival order, then resolved on its
    /// own task so a slow fetch never holds up newer queries.
    pub async fn run(
        self: Arc<Self>,
        mut committed_rx: mpsc::Receiver<String>,
        cancel: CancellationToken,
    ) {
        let mut inflight = JoinSet::new();
        tracing::debug!("orchestrator started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some(_) = inflight.join_next(), if !inflight.is_empty() => {}
                next = committed_rx.recv() => {
                    let Some(query) = next else { break };
                    let seq = self.begin(&query);
                    let this = Arc::clone(&self);
                    inflight.spawn(async move {
                        this.resolve(seq, query).await;
                    });
                }
            }
        }

        if cancel.is_cancelled() {
            inflight.shutdown().await;
        } else {
            while inflight.join_next().await.is_some() {}
        }
        tracing::debug!("orchestrator stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dropsearch_cache::ManualClock;
    use dropsearch_events::{event_names, EventBus, InMemoryEventBus};
    use dropsearch_fetch::SearchBackend;
    use dropsearch_records::record_from;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{OnceLock, Weak};
    use tokio::sync::Notify;

    /// Backend answering from a fixed table, optionally holding one URL until released.
    #[derive(Default)]
    struct ScriptedBackend {
        responses: Mutex<HashMap<String, Result<ResultSet, FetchError>>>,
        urls: Mutex<Vec<String>>,
        held_url: Mutex<Option<String>>,
        release: Notify,
    }

    impl ScriptedBackend {
        fn respond(&self, url: &str, response: Result<ResultSet, FetchError>) {
            self.responses.lock().unwrap().insert(url.to_string(), response);
        }

        fn hold(&self, url: &str) {
            *self.held_url.lock().unwrap() = Some(url.to_string());
        }

        fn calls(&self) -> usize {
            self.urls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SearchBackend for ScriptedBackend {
        async fn search(&self, url: &str) -> Result<ResultSet, FetchError> {
            self.urls.lock().unwrap().push(url.to_string());
            let held = self.held_url.lock().unwrap().as_deref() == Some(url);
            if held {
                self.release.notified().await;
            }
            self.responses
                .lock()
                .unwrap()
                .get(url)
                .cloned()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn cities(names: &[&str]) -> ResultSet {
        names
            .iter()
            .map(|n| record_from([("display_name", json!(n))]))
            .collect()
    }

    struct Harness {
        orchestrator: Arc<Orchestrator>,
        backend: Arc<ScriptedBackend>,
        bus: Arc<InMemoryEventBus>,
        clock: Arc<ManualClock>,
    }

    fn harness(ttl_secs: u64) -> Harness {
        harness_with(ttl_secs, SearchCallbacks::default())
    }

    fn harness_with(ttl_secs: u64, callbacks: SearchCallbacks) -> Harness {
        let backend = Arc::new(ScriptedBackend::default());
        let bus = Arc::new(InMemoryEventBus::new());
        let clock = Arc::new(ManualClock::new(0));
        let cache = Arc::new(QueryCache::with_clock(ttl_secs, clock.clone()));
        let orchestrator = Orchestrator::new(
            "https://geo.test/search",
            cache,
            ResultFetcher::new(backend.clone()),
        )
        .with_event_bus(bus.clone())
        .with_callbacks(callbacks);

        Harness {
            orchestrator: Arc::new(orchestrator),
            backend,
            bus,
            clock,
        }
    }

    #[tokio::test]
    async fn test_miss_fetches_then_hit_serves_from_cache() {
        let h = harness(5);
        let paris = cities(&["Paris", "Paris, TX", "Parisot"]);
        h.backend.respond("https://geo.test/search?q=paris", Ok(paris.clone()));

        let first = h.orchestrator.dispatch("paris".to_string()).await;
        assert_eq!(
            first,
            QueryOutcome::Succeeded {
                results: paris.clone(),
                cached: false
            }
        );
        assert_eq!(h.backend.calls(), 1);
        assert_eq!(h.orchestrator.phase(), SearchPhase::Success);

        h.clock.advance(4_000);
        let second = h.orchestrator.dispatch("paris".to_string()).await;
        assert_eq!(
            second,
            QueryOutcome::Succeeded {
                results: paris.clone(),
                cached: true
            }
        );
        assert_eq!(h.backend.calls(), 1, "cache hit must not fetch");

        assert_eq!(
            h.bus.topics(),
            vec![
                event_names::LOADING,
                event_names::SUCCESS,
                event_names::LOADING,
                event_names::SUCCESS
            ]
        );
        let successes = h.bus.events_for(event_names::SUCCESS);
        assert!(matches!(
            &successes[1],
            SearchEvent::Succeeded { results, cached: true, .. } if *results == paris
        ));
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let h = harness(5);
        h.backend.respond("https://geo.test/search?q=rome", Ok(cities(&["Rome"])));

        h.orchestrator.dispatch("rome".to_string()).await;
        h.clock.advance(5_000);
        let outcome = h.orchestrator.dispatch("rome".to_string()).await;

        assert!(matches!(outcome, QueryOutcome::Succeeded { cached: false, .. }));
        assert_eq!(h.backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_zero_ttl_always_fetches() {
        let h = harness(5);
        h.orchestrator.set_cache_ttl(0);

        h.orchestrator.dispatch("oslo".to_string()).await;
        h.orchestrator.dispatch("oslo".to_string()).await;

        assert_eq!(h.backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_is_surfaced_once_and_not_cached() {
        let errors = Arc::new(AtomicUsize::new(0));
        let errors_clone = Arc::clone(&errors);
        let callbacks = SearchCallbacks::new().on_error(move |_| {
            errors_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let h = harness_with(5, callbacks);
        let error = FetchError::Network("HTTP 503 Service Unavailable".to_string());
        h.backend.respond("https://geo.test/search?q=lima", Err(error.clone()));

        let outcome = h.orchestrator.dispatch("lima".to_string()).await;

        assert_eq!(outcome, QueryOutcome::Failed(error.clone()));
        assert_eq!(h.orchestrator.phase(), SearchPhase::Error);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(
            h.bus.events_for(event_names::ERROR),
            vec![SearchEvent::Failed {
                seq: 1,
                query: "lima".to_string(),
                error,
            }]
        );
        assert!(h.bus.events_for(event_names::SUCCESS).is_empty());

        // No retry happened, and nothing was cached.
        assert_eq!(h.backend.calls(), 1);
        assert!(h.orchestrator.cache().is_empty());
    }

    #[tokio::test]
    async fn test_stale_completion_is_discarded() {
        let h = harness(60);
        h.backend.respond("https://geo.test/search?q=par", Ok(cities(&["Parma"])));
        h.backend.respond("https://geo.test/search?q=paris", Ok(cities(&["Paris"])));
        h.backend.hold("https://geo.test/search?q=par");

        let older_seq = h.orchestrator.begin("par");
        let older = tokio::spawn({
            let orchestrator = Arc::clone(&h.orchestrator);
            async move { orchestrator.resolve(older_seq, "par".to_string()).await }
        });

        let newer = h.orchestrator.dispatch("paris".to_string()).await;
        assert!(matches!(newer, QueryOutcome::Succeeded { cached: false, .. }));

        h.backend.release.notify_one();
        let older = older.await.unwrap();
        assert_eq!(older, QueryOutcome::Stale);

        let successes = h.bus.events_for(event_names::SUCCESS);
        assert_eq!(successes.len(), 1);
        assert!(matches!(
            &successes[0],
            SearchEvent::Succeeded { query, .. } if query == "paris"
        ));
        assert_eq!(h.orchestrator.phase(), SearchPhase::Success);

        // The late answer is still valid for its own query.
        assert_eq!(h.orchestrator.cache().lookup("par"), Some(cities(&["Parma"])));
    }

    #[tokio::test]
    async fn test_stale_failure_is_discarded() {
        let h = harness(60);
        h.backend.respond(
            "https://geo.test/search?q=ber",
            Err(FetchError::Network("timeout".to_string())),
        );
        h.backend.hold("https://geo.test/search?q=ber");

        let older_seq = h.orchestrator.begin("ber");
        let older = tokio::spawn({
            let orchestrator = Arc::clone(&h.orchestrator);
            async move { orchestrator.resolve(older_seq, "ber".to_string()).await }
        });

        h.orchestrator.dispatch("berlin".to_string()).await;
        h.backend.release.notify_one();

        assert_eq!(older.await.unwrap(), QueryOutcome::Stale);
        assert!(h.bus.events_for(event_names::ERROR).is_empty());
        assert_eq!(h.orchestrator.phase(), SearchPhase::Success);
    }

    #[tokio::test]
    async fn test_select_records_state_and_arms_suppression() {
        let picked = Arc::new(Mutex::new(None));
        let picked_clone = Arc::clone(&picked);
        let callbacks = SearchCallbacks::new().on_selection(move |record| {
            *picked_clone.lock().unwrap() = Some(record.clone());
            Ok(())
        });
        let h = harness_with(5, callbacks);
        let record = record_from([("display_name", json!("Paris, France")), ("id", json!(7))]);

        let text = h.orchestrator.select(record.clone());

        assert_eq!(text, "Paris, France");
        assert_eq!(h.orchestrator.selected(), Some(record.clone()));
        assert!(h.orchestrator.suppression().is_set());
        assert_eq!(*picked.lock().unwrap(), Some(record.clone()));
        assert_eq!(
            h.bus.events(),
            vec![SearchEvent::SelectionChanged { record }]
        );
        assert_eq!(h.orchestrator.phase(), SearchPhase::Idle);
    }

    #[tokio::test]
    async fn test_select_uses_configured_display_field() {
        let clock = Arc::new(ManualClock::new(0));
        let orchestrator = Orchestrator::new(
            "https://geo.test/{query}",
            Arc::new(QueryCache::with_clock(5, clock)),
            ResultFetcher::new(Arc::new(ScriptedBackend::default())),
        )
        .with_display_field("title");

        let text = orchestrator.select(record_from([("title", "Dune"), ("display_name", "x")]));
        assert_eq!(text, "Dune");
    }

    #[tokio::test]
    async fn test_new_selection_replaces_previous() {
        let h = harness(5);
        h.orchestrator.select(record_from([("id", 1)]));
        h.orchestrator.select(record_from([("id", 2)]));

        assert_eq!(h.orchestrator.selected(), Some(record_from([("id", 2)])));
    }

    #[tokio::test]
    async fn test_failing_callbacks_do_not_break_pipeline() {
        let callbacks = SearchCallbacks::new()
            .on_success(|_| Err(anyhow::anyhow!("handler missing")))
            .on_selection(|_| panic!("handler exploded"));
        let h = harness_with(5, callbacks);
        h.backend.respond("https://geo.test/search?q=kyiv", Ok(cities(&["Kyiv"])));

        let outcome = h.orchestrator.dispatch("kyiv".to_string()).await;
        assert!(matches!(outcome, QueryOutcome::Succeeded { .. }));
        assert_eq!(h.bus.events_for(event_names::SUCCESS).len(), 1);

        h.orchestrator.select(record_from([("display_name", "Kyiv")]));
        assert_eq!(h.bus.events_for(event_names::SELECTION).len(), 1);
    }

    #[tokio::test]
    async fn test_set_endpoint_changes_request_url() {
        let h = harness(5);
        h.orchestrator.set_endpoint("https://other.test/find/{query}.json");

        h.orchestrator.dispatch("new york".to_string()).await;

        assert_eq!(
            h.backend.urls.lock().unwrap().as_slice(),
            ["https://other.test/find/new%20york.json"]
        );
    }

    #[tokio::test]
    async fn test_sequence_numbers_increase() {
        let h = harness(5);
        assert_eq!(h.orchestrator.latest_seq(), 0);

        h.orchestrator.dispatch("a".to_string()).await;
        h.orchestrator.dispatch("b".to_string()).await;

        assert_eq!(h.orchestrator.latest_seq(), 2);
        let seqs: Vec<_> = h.bus.events().iter().filter_map(SearchEvent::seq).collect();
        assert_eq!(seqs, vec![1, 1, 2, 2]);
    }

    /// Bus that reads orchestrator state from inside `emit`, like a UI would.
    #[derive(Default)]
    struct StateReadingBus {
        orchestrator: OnceLock<Weak<Orchestrator>>,
        seen: Mutex<Vec<(&'static str, SearchPhase, u64)>>,
    }

    impl EventBus for StateReadingBus {
        fn emit(&self, event: SearchEvent) {
            if let Some(o) = self.orchestrator.get().and_then(Weak::upgrade) {
                let phase = o.phase();
                let latest = o.latest_seq();
                self.seen.lock().unwrap().push((event.topic(), phase, latest));
            }
        }
    }

    #[test]
    fn test_bus_can_read_state_while_emitting() {
        let bus = Arc::new(StateReadingBus::default());
        let backend = Arc::new(ScriptedBackend::default());
        backend.respond("https://geo.test/search?q=paris", Ok(cities(&["Paris"])));
        backend.respond(
            "https://geo.test/search?q=lima",
            Err(FetchError::Network("down".to_string())),
        );
        let orchestrator = Arc::new(
            Orchestrator::new(
                "https://geo.test/search",
                Arc::new(QueryCache::with_clock(5, Arc::new(ManualClock::new(0)))),
                ResultFetcher::new(backend),
            )
            .with_event_bus(bus.clone()),
        );
        let _ = bus.orchestrator.set(Arc::downgrade(&orchestrator));

        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let worker = Arc::clone(&orchestrator);
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();
            rt.block_on(async {
                worker.dispatch("paris".to_string()).await;
                worker.dispatch("lima".to_string()).await;
            });
            worker.select(record_from([("display_name", "Paris")]));
            let _ = done_tx.send(());
        });

        done_rx
            .recv_timeout(std::time::Duration::from_secs(3))
            .expect("emit reading orchestrator state must not block");
        assert_eq!(
            *bus.seen.lock().unwrap(),
            vec![
                (event_names::LOADING, SearchPhase::Loading, 1),
                (event_names::SUCCESS, SearchPhase::Success, 1),
                (event_names::LOADING, SearchPhase::Loading, 2),
                (event_names::ERROR, SearchPhase::Error, 2),
                (event_names::SELECTION, SearchPhase::Error, 2),
            ]
        );
    }

    #[tokio::test]
    async fn test_run_consumes_committed_queries() {
        let h = harness(5);
        h.backend.respond("https://geo.test/search?q=a", Ok(cities(&["A"])));
        let (tx, rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(Arc::clone(&h.orchestrator).run(rx, cancel.clone()));
        tx.send("a".to_string()).await.unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(h.backend.calls(), 1);
        assert_eq!(
            h.bus.topics(),
            vec![event_names::LOADING, event_names::SUCCESS]
        );
    }
}

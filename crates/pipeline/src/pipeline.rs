use crate::callbacks::SearchCallbacks;
use crate::config::SearchConfig;
use crate::error::Result;
use crate::orchestrator::Orchestrator;
use dropsearch_cache::{ClockRef, QueryCache, SystemClock};
use dropsearch_events::{EventBusRef, NullEventBus};
use dropsearch_fetch::{BackendRef, HttpBackend, ResultFetcher};
use dropsearch_input::{InputDebouncer, InputSender, SuppressionFlag};
use dropsearch_records::Record;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Assembles a [`SearchPipeline`]. Anything not set falls back to a default:
/// an [`HttpBackend`], a [`NullEventBus`] and the system clock.
pub struct SearchPipelineBuilder {
    config: SearchConfig,
    backend: Option<BackendRef>,
    bus: Option<EventBusRef>,
    callbacks: SearchCallbacks,
    clock: Option<ClockRef>,
}

impl SearchPipelineBuilder {
    pub fn backend(mut self, backend: BackendRef) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn bus(mut self, bus: EventBusRef) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn callbacks(mut self, callbacks: SearchCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn clock(mut self, clock: ClockRef) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate the configuration and start the debouncer and orchestrator
    /// tasks on the current tokio runtime.
    pub fn spawn(self) -> Result<SearchPipeline> {
        self.config.validate()?;
        let config = self.config;

        let backend = self.backend.unwrap_or_else(|| {
            let mut http = HttpBackend::new();
            if let Some(timeout) = config.request_timeout() {
                http = http.with_timeout(timeout);
            }
            Arc::new(http) as BackendRef
        });
        let bus = self.bus.unwrap_or_else(|| Arc::new(NullEventBus) as EventBusRef);
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock) as ClockRef);

        let suppression = SuppressionFlag::new();
        let cache = Arc::new(QueryCache::with_clock(config.cache_ttl_secs, clock));
        let orchestrator = Arc::new(
            Orchestrator::new(config.api_url.clone(), cache, ResultFetcher::new(backend))
                .with_event_bus(bus)
                .with_callbacks(self.callbacks)
                .with_suppression(suppression.clone())
                .with_display_field(config.display_field.clone()),
        );

        let cancel = CancellationToken::new();
        let (input, committed_rx, debouncer_task) =
            InputDebouncer::new(config.debounce_config(), suppression).spawn(cancel.clone());
        let orchestrator_task =
            tokio::spawn(Arc::clone(&orchestrator).run(committed_rx, cancel.clone()));

        tracing::info!(
            api_url = %config.api_url,
            debounce_ms = config.debounce_ms,
            min_chars = config.min_chars,
            cache_ttl_secs = config.cache_ttl_secs,
            "search pipeline started"
        );

        Ok(SearchPipeline {
            input,
            orchestrator,
            cancel,
            tasks: vec![debouncer_task, orchestrator_task],
        })
    }
}

/// Handle to a running pipeline.
///
/// Dropping the handle closes the input side; pending text is still
/// committed and in-flight queries run to completion. Use
/// [`shutdown`](Self::shutdown) to stop everything right away.
pub struct SearchPipeline {
    input: InputSender,
    orchestrator: Arc<Orchestrator>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for SearchPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchPipeline")
            .field("orchestrator", &self.orchestrator)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl SearchPipeline {
    pub fn builder(config: SearchConfig) -> SearchPipelineBuilder {
        SearchPipelineBuilder {
            config,
            backend: None,
            bus: None,
            callbacks: SearchCallbacks::default(),
            clock: None,
        }
    }

    /// Feed the current contents of the search field.
    pub fn text_changed(&self, text: impl Into<String>) -> bool {
        self.input.text_changed(text)
    }

    /// The user picked `record`; returns the text to show in the field.
    pub fn select(&self, record: Record) -> String {
        self.orchestrator.select(record)
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn set_cache_ttl(&self, ttl_secs: u64) {
        self.orchestrator.set_cache_ttl(ttl_secs);
    }

    /// Cancel both tasks and wait for them to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "pipeline task ended abnormally");
            }
        }
        tracing::info!("search pipeline stopped");
    }
}

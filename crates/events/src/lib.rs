//! Event contracts between the search pipeline and its presentation layer.
//!
//! The pipeline has exactly four observable outputs: loading started, results
//! delivered, lookup failed, and selection changed. They are modelled as one
//! [`SearchEvent`] enum and delivered through the [`EventBus`] trait so the
//! core can be driven by any UI, a CLI, or a test harness.

mod bus;

pub use bus::{ChannelEventBus, EventBus, EventBusRef, InMemoryEventBus, NullEventBus};

use dropsearch_fetch::FetchError;
use dropsearch_records::{Record, ResultSet};
use serde::Serialize;

/// Event emitted by the pipeline orchestrator.
///
/// `seq` is the dispatch sequence number of the query the event belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchEvent {
    /// A committed query started loading.
    LoadingStarted { seq: u64, query: String },
    /// Results are ready for display.
    Succeeded {
        seq: u64,
        query: String,
        results: ResultSet,
        /// Whether the results were served from the cache.
        cached: bool,
    },
    /// The lookup failed. Terminal for this query.
    Failed {
        seq: u64,
        query: String,
        error: FetchError,
    },
    /// The user picked a result.
    SelectionChanged { record: Record },
}

impl SearchEvent {
    /// Topic name for this event.
    pub fn topic(&self) -> &'static str {
        match self {
            SearchEvent::LoadingStarted { .. } => event_names::LOADING,
            SearchEvent::Succeeded { .. } => event_names::SUCCESS,
            SearchEvent::Failed { .. } => event_names::ERROR,
            SearchEvent::SelectionChanged { .. } => event_names::SELECTION,
        }
    }

    /// Sequence number of the query, if the event belongs to one.
    pub fn seq(&self) -> Option<u64> {
        match self {
            SearchEvent::LoadingStarted { seq, .. }
            | SearchEvent::Succeeded { seq, .. }
            | SearchEvent::Failed { seq, .. } => Some(*seq),
            SearchEvent::SelectionChanged { .. } => None,
        }
    }

    /// JSON payload, for buses that forward events as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Event names as constants to prevent typos.
pub mod event_names {
    /// Loading started.
    pub const LOADING: &str = "search:loading";
    /// Results delivered.
    pub const SUCCESS: &str = "search:success";
    /// Lookup failed.
    pub const ERROR: &str = "search:error";
    /// Selection changed.
    pub const SELECTION: &str = "search:selection";
}

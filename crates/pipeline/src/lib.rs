//! Search-as-you-type pipeline.
//!
//! Wires the pieces from the sibling crates into one running unit:
//!
//! ```text
//! keystrokes ─▶ InputDebouncer ─▶ Orchestrator ─┬─▶ QueryCache (hit)
//!                                                └─▶ ResultFetcher ─▶ QueryCache::store
//!                                                         │
//!                                EventBus / callbacks ◀───┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use dropsearch_pipeline::{SearchConfig, SearchPipeline};
//!
//! let config = SearchConfig::new("https://nominatim.openstreetmap.org/search?format=json");
//! let pipeline = SearchPipeline::builder(config).spawn()?;
//!
//! pipeline.text_changed("pari");
//! pipeline.text_changed("paris");
//! // ... one request for "paris" goes out 300 ms after the last edit
//! pipeline.shutdown().await;
//! ```

mod callbacks;
mod config;
mod error;
mod orchestrator;
mod pipeline;

pub use callbacks::{Callback, SearchCallbacks};
pub use config::SearchConfig;
pub use error::{ConfigError, PipelineError, Result};
pub use orchestrator::{Orchestrator, QueryOutcome, SearchPhase};
pub use pipeline::{SearchPipeline, SearchPipelineBuilder};

pub use dropsearch_events::{
    event_names, ChannelEventBus, EventBus, EventBusRef, InMemoryEventBus, NullEventBus,
    SearchEvent,
};
pub use dropsearch_fetch::{FetchError, HttpBackend, SearchBackend};
pub use dropsearch_records::{Record, ResultSet};

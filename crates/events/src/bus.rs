//! Event bus abstraction for decoupled event emission.
//!
//! The orchestrator only talks to [`EventBus`], which keeps it free of any
//! UI framework and lets tests capture what a presentation layer would see.

use crate::SearchEvent;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// Receives pipeline events.
///
/// Implementations must not block: events are emitted from async tasks.
pub trait EventBus: Send + Sync {
    fn emit(&self, event: SearchEvent);
}

/// Type alias for shared event bus reference.
pub type EventBusRef = Arc<dyn EventBus>;

/// In-memory event bus for testing.
///
/// Captures all emitted events for later inspection.
#[derive(Debug, Default)]
pub struct InMemoryEventBus {
    events: Mutex<Vec<SearchEvent>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<SearchEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get all captured events.
    pub fn events(&self) -> Vec<SearchEvent> {
        self.guard().clone()
    }

    /// Get events for a specific topic.
    pub fn events_for(&self, topic: &str) -> Vec<SearchEvent> {
        self.guard()
            .iter()
            .filter(|e| e.topic() == topic)
            .cloned()
            .collect()
    }

    /// Topics in emission order.
    pub fn topics(&self) -> Vec<&'static str> {
        self.guard().iter().map(SearchEvent::topic).collect()
    }

    pub fn clear(&self) {
        self.guard().clear();
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }
}

impl EventBus for InMemoryEventBus {
    fn emit(&self, event: SearchEvent) {
        self.guard().push(event);
    }
}

/// Forwards events to a tokio channel.
///
/// Lets a presentation loop receive events on its own task.
#[derive(Debug, Clone)]
pub struct ChannelEventBus {
    tx: mpsc::UnboundedSender<SearchEvent>,
}

impl ChannelEventBus {
    /// Create the bus together with the receiving end.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SearchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventBus for ChannelEventBus {
    fn emit(&self, event: SearchEvent) {
        // A closed receiver just means nobody is listening anymore.
        let _ = self.tx.send(event);
    }
}

/// No-op event bus that discards all events.
pub struct NullEventBus;

impl EventBus for NullEventBus {
    fn emit(&self, _event: SearchEvent) {}
}

//! One-shot suppression of the next input edit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared one-shot guard.
///
/// Set when the user picks a result; the debouncer consumes it on the very
/// next raw edit, whatever that edit contains. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct SuppressionFlag {
    flag: Arc<AtomicBool>,
}

impl SuppressionFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the flag so the next edit is dropped.
    pub fn set(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clear the flag, returning whether it was armed.
    pub fn consume(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

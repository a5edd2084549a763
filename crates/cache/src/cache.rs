//! The TTL query cache.

use crate::clock::{ClockRef, SystemClock};
use crate::stats::{CacheStats, CacheStatsSnapshot};
use dropsearch_records::ResultSet;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Default time-to-live for cached results.
pub const DEFAULT_TTL_SECS: u64 = 5;

#[derive(Debug, Clone)]
struct CacheEntry {
    results: ResultSet,
    fetched_at_ms: i64,
}

#[derive(Debug)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    ttl_secs: u64,
}

impl CacheState {
    fn ttl_ms(&self) -> i64 {
        i64::try_from(self.ttl_secs.saturating_mul(1_000)).unwrap_or(i64::MAX)
    }

    /// Drop every entry whose age has reached the TTL. Returns how many went.
    fn prune(&mut self, now_ms: i64) -> usize {
        let ttl_ms = self.ttl_ms();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now_ms.saturating_sub(entry.fetched_at_ms) < ttl_ms);
        before - self.entries.len()
    }
}

/// Memoizes result sets by raw query string.
///
/// Keys are used verbatim: no trimming, no case folding. Every operation
/// runs inside one critical section, so prune+lookup and store are atomic
/// with respect to each other and no caller can observe a half-pruned map.
pub struct QueryCache {
    state: Mutex<CacheState>,
    clock: ClockRef,
    stats: CacheStats,
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("QueryCache")
            .field("entries", &state.entries.len())
            .field("ttl_secs", &state.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL_SECS)
    }
}

impl QueryCache {
    /// Create a cache on the system clock.
    pub fn new(ttl_secs: u64) -> Self {
        Self::with_clock(ttl_secs, Arc::new(SystemClock))
    }

    /// Create a cache with an injected clock.
    pub fn with_clock(ttl_secs: u64, clock: ClockRef) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                ttl_secs,
            }),
            clock,
            stats: CacheStats::new(),
        }
    }

    // The map is never left half-written, so a poisoned lock is still usable.
    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up `query`, pruning expired entries first.
    ///
    /// Returns a copy of the cached results, or `None` on a miss.
    pub fn lookup(&self, query: &str) -> Option<ResultSet> {
        let now_ms = self.clock.now_millis();
        let mut state = self.state();

        let expired = state.prune(now_ms);
        if expired > 0 {
            tracing::debug!(expired, "pruned stale cache entries");
        }
        self.stats.record_expirations(expired as u64);

        match state.entries.get(query) {
            Some(entry) => {
                self.stats.record_hit();
                tracing::debug!(query, age_ms = now_ms - entry.fetched_at_ms, "cache hit");
                Some(entry.results.clone())
            }
            None => {
                self.stats.record_miss();
                tracing::debug!(query, "cache miss");
                None
            }
        }
    }

    /// Insert or overwrite the entry for `query`, stamped with the current time.
    pub fn store(&self, query: &str, results: ResultSet) {
        let fetched_at_ms = self.clock.now_millis();
        let mut state = self.state();
        state.entries.insert(
            query.to_string(),
            CacheEntry {
                results,
                fetched_at_ms,
            },
        );
        self.stats.record_store();
    }

    /// Change the TTL used by future prunes.
    ///
    /// Nothing is evicted here; the new value takes effect on the next lookup.
    pub fn set_ttl(&self, ttl_secs: u64) {
        let mut state = self.state();
        if state.ttl_secs != ttl_secs {
            tracing::info!(from = state.ttl_secs, to = ttl_secs, "cache TTL changed");
        }
        state.ttl_secs = ttl_secs;
    }

    pub fn ttl_secs(&self) -> u64 {
        self.state().ttl_secs
    }

    /// Number of entries currently held, stale ones included until the next prune.
    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().entries.is_empty()
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }
}

//! Time-to-live query cache for dropsearch.
//!
//! Memoizes search results by their raw query string. Entries older than the
//! configured TTL are pruned on every lookup, so a lookup never returns stale
//! data. The cache performs no I/O itself; time comes from an injected
//! [`Clock`] so expiry can be tested deterministically.
//!
//! # Example
//!
//! ```ignore
//! use dropsearch_cache::QueryCache;
//!
//! let cache = QueryCache::new(5);
//! cache.store("paris", results.clone());
//! assert_eq!(cache.lookup("paris"), Some(results));
//! ```

mod cache;
mod clock;
mod stats;

pub use cache::{QueryCache, DEFAULT_TTL_SECS};
pub use clock::{Clock, ClockRef, ManualClock, SystemClock};
pub use stats::{CacheStats, CacheStatsSnapshot};

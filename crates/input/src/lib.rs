//! Keystroke debouncing for dropsearch.
//!
//! Turns a live stream of raw text edits into committed search queries.
//!
//! # Rules
//!
//! - **Conflation**: edits closer together than the quiet interval collapse
//!   into one commit carrying only the latest text
//! - **Minimum length**: text shorter than `min_chars` characters is never committed
//! - **Post-selection suppression**: after a result is chosen, the next raw
//!   edit (usually the field being filled with the chosen text) is swallowed
//!
//! # Example
//!
//! ```ignore
//! use dropsearch_input::{DebounceConfig, InputDebouncer, SuppressionFlag};
//! use tokio_util::sync::CancellationToken;
//!
//! let debouncer = InputDebouncer::new(DebounceConfig::default(), SuppressionFlag::new());
//! let (input, mut committed, _task) = debouncer.spawn(CancellationToken::new());
//!
//! input.text_changed("par");
//! input.text_changed("paris");
//! assert_eq!(committed.recv().await.as_deref(), Some("paris"));
//! ```

mod debouncer;
mod suppression;

pub use debouncer::{
    DebounceConfig, InputDebouncer, InputSender, COMMITTED_CAPACITY, DEFAULT_MIN_CHARS,
    DEFAULT_QUIET_INTERVAL,
};
pub use suppression::SuppressionFlag;

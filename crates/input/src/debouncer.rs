//! Debounce worker turning raw edits into committed queries.

use crate::suppression::SuppressionFlag;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Quiet interval that must pass after the last edit before committing.
pub const DEFAULT_QUIET_INTERVAL: Duration = Duration::from_millis(300);

/// Shortest text (in characters) that is committed by default.
pub const DEFAULT_MIN_CHARS: usize = 1;

/// Capacity of the committed query channel.
pub const COMMITTED_CAPACITY: usize = 16;

/// Debounce settings.
#[derive(Debug, Clone)]
pub struct DebounceConfig {
    /// Silence required after the last accepted edit.
    pub quiet_interval: Duration,
    /// Committed text shorter than this many characters is dropped.
    pub min_chars: usize,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            quiet_interval: DEFAULT_QUIET_INTERVAL,
            min_chars: DEFAULT_MIN_CHARS,
        }
    }
}

impl DebounceConfig {
    pub fn with_quiet_interval(mut self, quiet_interval: Duration) -> Self {
        self.quiet_interval = quiet_interval;
        self
    }

    pub fn with_min_chars(mut self, min_chars: usize) -> Self {
        self.min_chars = min_chars;
        self
    }

    fn passes_length_gate(&self, text: &str) -> bool {
        text.chars().count() >= self.min_chars
    }
}

/// Feeds raw text edits into a running debouncer.
#[derive(Debug, Clone)]
pub struct InputSender {
    tx: mpsc::UnboundedSender<String>,
}

impl InputSender {
    /// Report the field's full text after an edit.
    ///
    /// Returns `false` once the debouncer has stopped.
    pub fn text_changed(&self, text: impl Into<String>) -> bool {
        self.tx.send(text.into()).is_ok()
    }
}

/// Conflating debouncer with a length gate and post-selection suppression.
#[derive(Debug, Clone)]
pub struct InputDebouncer {
    config: DebounceConfig,
    suppression: SuppressionFlag,
}

impl InputDebouncer {
    pub fn new(config: DebounceConfig, suppression: SuppressionFlag) -> Self {
        Self {
            config,
            suppression,
        }
    }

    pub fn suppression(&self) -> &SuppressionFlag {
        &self.suppression
    }

    /// Spawn the debounce loop on the current tokio runtime.
    ///
    /// Returns the edit sender, the committed query receiver and the task
    /// handle. The task ends when `cancel` fires, when every sender is
    /// dropped, or when the receiver is dropped.
    pub fn spawn(
        self,
        cancel: CancellationToken,
    ) -> (InputSender, mpsc::Receiver<String>, JoinHandle<()>) {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (committed_tx, committed_rx) = mpsc::channel(COMMITTED_CAPACITY);
        let handle = tokio::spawn(self.run(raw_rx, committed_tx, cancel));
        (InputSender { tx: raw_tx }, committed_rx, handle)
    }

    /// Debounce loop.
    ///
    /// The quiet timer restarts only on accepted edits; a suppressed edit
    /// neither replaces the pending text nor delays its commit. If input
    /// closes while text is pending, it is committed right away.
    pub async fn run(
        self,
        mut raw_rx: mpsc::UnboundedReceiver<String>,
        committed_tx: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) {
        let quiet = self.config.quiet_interval;
        tracing::debug!(
            quiet_ms = quiet.as_millis() as u64,
            min_chars = self.config.min_chars,
            "input debouncer started"
        );

        let mut pending: Option<String> = None;
        let timer = tokio::time::sleep(quiet);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("input debouncer cancelled");
                    break;
                }
                next = raw_rx.recv() => match next {
                    Some(text) => {
                        if self.suppression.consume() {
                            tracing::debug!(text = %text, "edit suppressed after selection");
                            continue;
                        }
                        pending = Some(text);
                        timer.as_mut().reset(Instant::now() + quiet);
                    }
                    None => {
                        if let Some(text) = pending.take() {
                            self.commit(text, &committed_tx).await;
                        }
                        break;
                    }
                },
                _ = &mut timer, if pending.is_some() => {
                    if let Some(text) = pending.take() {
                        if !self.commit(text, &committed_tx).await {
                            break;
                        }
                    }
                }
            }
        }

        tracing::debug!("input debouncer stopped");
    }

    /// Forward `text` if it passes the length gate.
    ///
    /// Returns `false` when the committed receiver is gone.
    async fn commit(&self, text: String, committed_tx: &mpsc::Sender<String>) -> bool {
        if !self.config.passes_length_gate(&text) {
            tracing::debug!(
                len = text.chars().count(),
                min_chars = self.config.min_chars,
                "edit below minimum length"
            );
            return true;
        }

        tracing::debug!(query = %text, "query committed");
        committed_tx.send(text).await.is_ok()
    }
}

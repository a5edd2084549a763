//! Optional typed callbacks, a secondary notification channel next to the event bus.
//!
//! Callbacks are best-effort: an error or a panic inside one is logged and
//! dropped, it never reaches the pipeline.

use crate::error::PipelineError;
use dropsearch_fetch::FetchError;
use dropsearch_records::{Record, ResultSet};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// A fallible callback taking a borrowed argument.
pub type Callback<T> = Arc<dyn Fn(&T) -> anyhow::Result<()> + Send + Sync>;

/// Callbacks registered by the embedding code. All are optional.
#[derive(Clone, Default)]
pub struct SearchCallbacks {
    on_success: Option<Callback<ResultSet>>,
    on_error: Option<Callback<FetchError>>,
    on_selection: Option<Callback<Record>>,
}

impl std::fmt::Debug for SearchCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchCallbacks")
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_selection", &self.on_selection.is_some())
            .finish()
    }
}

impl SearchCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(&ResultSet) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(f));
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&FetchError) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn on_selection<F>(mut self, f: F) -> Self
    where
        F: Fn(&Record) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_selection = Some(Arc::new(f));
        self
    }

    pub(crate) fn notify_success(&self, results: &ResultSet) {
        notify("success", self.on_success.as_ref(), results);
    }

    pub(crate) fn notify_error(&self, error: &FetchError) {
        notify("error", self.on_error.as_ref(), error);
    }

    pub(crate) fn notify_selection(&self, record: &Record) {
        notify("selection", self.on_selection.as_ref(), record);
    }
}

/// Run a callback and log any failure. Never propagates.
fn notify<T>(name: &str, callback: Option<&Callback<T>>, arg: &T) {
    if let Err(e) = invoke(name, callback, arg) {
        tracing::warn!(callback = name, error = %e, "secondary callback failed");
    }
}

fn invoke<T>(name: &str, callback: Option<&Callback<T>>, arg: &T) -> Result<(), PipelineError> {
    let Some(callback) = callback else {
        return Ok(());
    };

    match catch_unwind(AssertUnwindSafe(|| callback(arg))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(PipelineError::CallbackDispatch(format!(
            "{name} callback failed: {e:#}"
        ))),
        Err(panic) => Err(PipelineError::CallbackDispatch(format!(
            "{name} callback panicked: {}",
            panic_message(panic.as_ref())
        ))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

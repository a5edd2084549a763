//! Pipeline configuration.

use crate::error::ConfigError;
use dropsearch_cache::DEFAULT_TTL_SECS;
use dropsearch_input::{DebounceConfig, DEFAULT_MIN_CHARS, DEFAULT_QUIET_INTERVAL};
use dropsearch_records::DEFAULT_DISPLAY_FIELD;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for one search field.
///
/// Missing fields take their defaults when loaded from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Endpoint template. `{query}` is replaced by the encoded query;
    /// without it, `q=<query>` is appended.
    pub api_url: String,
    /// Shortest query (in characters) that is searched.
    pub min_chars: usize,
    /// How long fetched results stay cached. 0 disables caching.
    pub cache_ttl_secs: u64,
    /// Quiet interval after the last keystroke.
    pub debounce_ms: u64,
    /// Record field written into the search box after a selection.
    pub display_field: String,
    /// Per-request timeout for the HTTP backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            min_chars: DEFAULT_MIN_CHARS,
            cache_ttl_secs: DEFAULT_TTL_SECS,
            debounce_ms: DEFAULT_QUIET_INTERVAL.as_millis() as u64,
            display_field: DEFAULT_DISPLAY_FIELD.to_string(),
            request_timeout_ms: None,
        }
    }
}

impl SearchConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Default::default()
        }
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_url.trim().is_empty() {
            return Err(ConfigError::MissingApiUrl);
        }
        Ok(())
    }

    pub fn with_min_chars(mut self, min_chars: usize) -> Self {
        self.min_chars = min_chars;
        self
    }

    pub fn with_cache_ttl_secs(mut self, cache_ttl_secs: u64) -> Self {
        self.cache_ttl_secs = cache_ttl_secs;
        self
    }

    pub fn with_debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = debounce_ms;
        self
    }

    pub fn with_display_field(mut self, display_field: impl Into<String>) -> Self {
        self.display_field = display_field.into();
        self
    }

    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = Some(timeout_ms);
        self
    }

    pub fn debounce_config(&self) -> DebounceConfig {
        DebounceConfig::default()
            .with_quiet_interval(Duration::from_millis(self.debounce_ms))
            .with_min_chars(self.min_chars)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

//! The remote call boundary.

use crate::error::FetchError;
use async_trait::async_trait;
use dropsearch_records::ResultSet;
use reqwest::header;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// User agent sent by [`HttpBackend`].
pub const USER_AGENT: &str = concat!("dropsearch/", env!("CARGO_PKG_VERSION"));

/// Performs one search request against a fully built URL.
///
/// Failures come back as errors, never as partial data.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, url: &str) -> Result<ResultSet, FetchError>;
}

/// Shared backend reference.
pub type BackendRef = Arc<dyn SearchBackend>;

/// HTTP GET transport expecting a JSON array of objects.
#[derive(Debug, Clone, Default)]
pub struct HttpBackend {
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl HttpBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuse an existing client (connection pool, proxy settings, ...).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: None,
        }
    }

    /// Per-request timeout. Expiry is reported as a network error.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl SearchBackend for HttpBackend {
    async fn search(&self, url: &str) -> Result<ResultSet, FetchError> {
        let mut request = self
            .client
            .get(url)
            .header(header::USER_AGENT, USER_AGENT)
            .header(header::ACCEPT, "application/json");
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(FetchError::Network(format!("HTTP {}", resp.status())));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        decode_results(&body)
    }
}

/// Decode a response body into records.
///
/// The body must be a JSON array whose items are all JSON objects.
pub fn decode_results(body: &[u8]) -> Result<ResultSet, FetchError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| FetchError::Decode(e.to_string()))?;

    let Value::Array(items) = value else {
        return Err(FetchError::Decode(format!(
            "expected a JSON array, got {}",
            kind_of(&value)
        )));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(record) => Ok(record),
            other => Err(FetchError::Decode(format!(
                "item {index} is {}, expected an object",
                kind_of(&other)
            ))),
        })
        .collect()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

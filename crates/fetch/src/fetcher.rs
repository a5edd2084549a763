//! Template-aware fetcher used on cache misses.

use crate::backend::BackendRef;
use crate::error::FetchError;
use crate::url::build_request_url;
use dropsearch_records::ResultSet;

/// Builds the request URL for a query and hands it to the backend.
#[derive(Clone)]
pub struct ResultFetcher {
    backend: BackendRef,
}

impl std::fmt::Debug for ResultFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultFetcher").finish_non_exhaustive()
    }
}

impl ResultFetcher {
    pub fn new(backend: BackendRef) -> Self {
        Self { backend }
    }

    /// Fetch results for `query` from the endpoint described by `template`.
    pub async fn fetch(&self, template: &str, query: &str) -> Result<ResultSet, FetchError> {
        let url = build_request_url(template, query);
        tracing::info!(%url, "fetching search results");

        match self.backend.search(&url).await {
            Ok(results) => {
                tracing::debug!(count = results.len(), "search results received");
                Ok(results)
            }
            Err(e) => {
                tracing::warn!(%url, error = %e, "search request failed");
                Err(e)
            }
        }
    }
}

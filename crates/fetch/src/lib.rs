//! Remote lookup for dropsearch cache misses.
//!
//! Splits the fetch into a pure part ([`build_request_url`], turning an
//! endpoint template and a query into a request URL) and a transport part
//! behind the [`SearchBackend`] trait. [`HttpBackend`] is the reqwest-based
//! transport; tests plug in their own backend.

mod backend;
mod error;
mod fetcher;
mod url;

pub use backend::{decode_results, BackendRef, HttpBackend, SearchBackend, USER_AGENT};
pub use error::FetchError;
pub use fetcher::ResultFetcher;
pub use url::{build_request_url, encode_query, QUERY_PARAM, QUERY_PLACEHOLDER};

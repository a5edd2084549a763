//! Request URL construction from an endpoint template.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Token replaced by the encoded query inside an endpoint template.
pub const QUERY_PLACEHOLDER: &str = "{query}";

/// Parameter name used when the template has no placeholder.
pub const QUERY_PARAM: &str = "q";

/// Everything except RFC 3986 unreserved characters.
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode a query for use in a URL. Spaces become `%20`.
pub fn encode_query(query: &str) -> String {
    utf8_percent_encode(query, QUERY_ENCODE_SET).to_string()
}

/// Build the request URL for `query`.
///
/// Every `{query}` in the template is replaced with the encoded query. A
/// template without the placeholder gets `q=<query>` appended, joined with
/// `&` if it already has a `?` and with `?` otherwise.
pub fn build_request_url(template: &str, query: &str) -> String {
    let encoded = encode_query(query);

    if template.contains(QUERY_PLACEHOLDER) {
        return template.replace(QUERY_PLACEHOLDER, &encoded);
    }

    let separator = if template.contains('?') { '&' } else { '?' };
    format!("{template}{separator}{QUERY_PARAM}={encoded}")
}

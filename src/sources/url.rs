//! Shared URL predicates used by the URL-based source handlers

use ::url::Url;

/// True when `source` parses as an absolute http(s) URL with a host
pub fn is_url(source: &str) -> bool {
    match Url::parse(source.trim()) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

/// Prefix check used by the search fallback
///
/// Looser than [`is_url`]: anything starting with an http(s) scheme counts,
/// parseable or not. The scheme is matched case-insensitively.
pub fn has_http_scheme(source: &str) -> bool {
    let source = source.trim_start();
    ["http://", "https://"].iter().any(|scheme| {
        source
            .get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

/// True when any marker is a substring of `source`
pub fn contains_any(source: &str, markers: &[String]) -> bool {
    markers.iter().any(|marker| source.contains(marker.as_str()))
}

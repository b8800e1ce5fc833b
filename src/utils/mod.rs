//! Utility functions and helpers.

pub mod http;
pub mod single_flight;

use url::Url;

pub use single_flight::SingleFlight;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> Option<Url> {
    base.join(href.trim()).ok()
}

/// Lowercase `haystack` once and check it for any of `needles`.
pub fn contains_any_ignore_case(haystack: &str, needles: &[String]) -> bool {
    let haystack = haystack.to_lowercase();
    needles
        .iter()
        .filter(|n| !n.is_empty())
        .any(|n| haystack.contains(&n.to_lowercase()))
}

/// Collapse whitespace runs and trim; tabs and newlines disappear.
pub fn clean_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

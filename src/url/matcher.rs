/// Checks if a host matches a CDN allow-list pattern
///
/// Two kinds of pattern are supported:
/// 1. Exact: "cdn.example.org" matches only "cdn.example.org"
/// 2. Wildcard: "*.example.org" matches "example.org" and any subdomain of it
///
/// Hosts are expected in lowercase, as produced by the URL parser.
///
/// # Examples
///
/// ```
/// use langmirror::url::matches_wildcard;
///
/// assert!(matches_wildcard("cdn.example.org", "cdn.example.org"));
/// assert!(matches_wildcard("*.example.org", "media.v2.example.org"));
/// assert!(!matches_wildcard("*.example.org", "example.org.evil.net"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base
            || candidate
                .strip_suffix(base)
                .is_some_and(|head| head.ends_with('.'))
    } else {
        candidate == pattern
    }
}

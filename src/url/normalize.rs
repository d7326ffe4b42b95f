use crate::UrlError;
use url::Url;

/// List of tracking query parameters to remove during normalization
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
];

/// Normalizes a URL into the form used as the frontier key
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Accept only http and https
/// 3. Lowercase the host (done by the parser) and require one
/// 4. Collapse repeated slashes and dot segments and drop a trailing slash
///    (except for the root path), so `/es` and `/es/` share one entry
/// 5. Remove fragment (everything after #)
/// 6. Remove tracking query parameters
/// 7. Sort remaining query parameters alphabetically
/// 8. Remove empty query string (trailing ?)
///
/// The host is kept as-is (including any `www.`) because the mirror replaces
/// the configured source origin textually.
///
/// # Examples
///
/// ```
/// use langmirror::url::normalize_url;
///
/// let url = normalize_url("https://WWW.EXAMPLE.ORG/es//foo/#top").unwrap();
/// assert_eq!(url.as_str(), "https://www.example.org/es/foo");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let filtered_params = filter_and_sort_query_params(&url);

        if filtered_params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut()
                .clear()
                .extend_pairs(filtered_params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
    }

    Ok(url)
}

/// Collapses empty and dot segments; the result never ends in `/` unless it
/// is the root
fn normalize_path(path: &str) -> String {
    let mut normalized_segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                normalized_segments.pop();
            }
            _ => normalized_segments.push(segment),
        }
    }

    if normalized_segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", normalized_segments.join("/"))
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort_by(|a, b| a.0.cmp(&b.0));

    params
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_scheme_and_www() {
        let result = normalize_url("http://www.example.org/es/").unwrap();
        assert_eq!(result.as_str(), "http://www.example.org/es");
    }

    #[test]
    fn test_trailing_slash_shares_a_key() {
        let with_slash = normalize_url("https://example.org/es/").unwrap();
        let without_slash = normalize_url("https://example.org/es").unwrap();
        assert_eq!(with_slash, without_slash);
        assert_eq!(with_slash.as_str(), "https://example.org/es");

        let result = normalize_url("https://example.org/es/page/?b=1").unwrap();
        assert_eq!(result.as_str(), "https://example.org/es/page?b=1");
    }

    #[test]
    fn test_remove_fragment() {
        let result = normalize_url("https://example.org/es/page#section").unwrap();
        assert_eq!(result.as_str(), "https://example.org/es/page");
    }

    #[test]
    fn test_remove_tracking_params() {
        let result = normalize_url("https://example.org/page?utm_source=twitter").unwrap();
        assert_eq!(result.as_str(), "https://example.org/page");

        let result = normalize_url("https://example.org/page?utm_custom=value&fbclid=1").unwrap();
        assert_eq!(result.as_str(), "https://example.org/page");
    }

    #[test]
    fn test_sort_query_params() {
        let result = normalize_url("https://example.org/page?b=2&a=1").unwrap();
        assert_eq!(result.as_str(), "https://example.org/page?a=1&b=2");
    }

    #[test]
    fn test_normalize_path_with_dots() {
        let result = normalize_url("https://example.org/a/../b/./c").unwrap();
        assert_eq!(result.as_str(), "https://example.org/b/c");
    }

    #[test]
    fn test_lowercase_host_only() {
        let result = normalize_url("https://EXAMPLE.ORG/Es/Page").unwrap();
        assert_eq!(result.as_str(), "https://example.org/Es/Page");
    }

    #[test]
    fn test_multiple_slashes() {
        let result = normalize_url("https://example.org///path//to///page/").unwrap();
        assert_eq!(result.as_str(), "https://example.org/path/to/page");
    }

    #[test]
    fn test_empty_path_becomes_root() {
        let result = normalize_url("https://example.org").unwrap();
        assert_eq!(result.as_str(), "https://example.org/");

        let result = normalize_url("https://example.org//").unwrap();
        assert_eq!(result.as_str(), "https://example.org/");
    }

    #[test]
    fn test_invalid_scheme() {
        let result = normalize_url("ftp://example.org/page");
        assert!(matches!(result.unwrap_err(), UrlError::InvalidScheme(_)));
    }

    #[test]
    fn test_malformed_url() {
        assert!(normalize_url("not a url").is_err());
    }

    #[test]
    fn test_equivalent_spellings_share_a_key() {
        let a = normalize_url("https://www.example.org/es/foo/#x").unwrap();
        let b = normalize_url("https://WWW.example.org/es//foo/?utm_medium=mail").unwrap();
        assert_eq!(a, b);
    }
}

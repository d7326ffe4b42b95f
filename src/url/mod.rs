//! URL handling module for Langmirror
//!
//! This module provides URL normalization (the frontier's dedup key) and
//! wildcard host matching for the CDN allow-list.

mod matcher;
mod normalize;

pub use matcher::matches_wildcard;
pub use normalize::normalize_url;

/// Returns true if `path` is the language root or lies below it
///
/// `prefix` is the language prefix without trailing slash, e.g. "/es".
pub fn is_under_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

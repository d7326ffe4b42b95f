//! Decides which attribute values are assets to download
//!
//! # Classification Rules
//!
//! A candidate is an asset when it is
//! 1. root-relative (`/img/logo.png`, not `//host/...`), resolved against the
//!    source site root, or
//! 2. an absolute (or protocol-relative) URL whose host is on the CDN
//!    allow-list, or
//! 3. an absolute URL on the page's own host whose last path segment looks
//!    like a file name (contains a `.`).
//!
//! `data:`, `javascript:`, `mailto:`, `tel:`, fragment-only and empty values
//! are never assets. A `meta[content]` is only a candidate when the tag names
//! an image or media resource (`og:image`, `twitter:image`, ...).

use crate::config::Config;
use crate::mirror::asset::AssetKind;
use crate::mirror::markup::StartTag;
use crate::url::matches_wildcard;
use crate::ConfigError;
use url::Url;

/// `link` relations that point at documents rather than resources
const NAVIGATIONAL_RELS: &[&str] = &["canonical", "alternate", "prev", "next"];

const NEVER_ASSET_SCHEMES: &[&str] = &["data:", "javascript:", "mailto:", "tel:"];

/// `meta` names and properties whose `content` is a resource URL
const RESOURCE_META_KEYS: &[&str] = &[
    "og:image",
    "og:image:url",
    "og:image:secure_url",
    "og:video",
    "og:video:url",
    "og:video:secure_url",
    "og:audio",
    "twitter:image",
    "twitter:image:src",
    "twitter:player:stream",
];

/// Classifies candidate references found in a rendered page
#[derive(Debug, Clone)]
pub struct AssetClassifier {
    site_root: Url,
    cdn_hosts: Vec<String>,
}

impl AssetClassifier {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let site_root = Url::parse(config.site.source_origin_trimmed()).map_err(|e| {
            ConfigError::InvalidUrl(format!(
                "Invalid source origin '{}': {}",
                config.site.source_origin, e
            ))
        })?;

        Ok(Self {
            site_root,
            cdn_hosts: config.assets.cdn_hosts.clone(),
        })
    }

    /// Returns the kind an attribute would have if its value is an asset
    ///
    /// `None` means the attribute is not an asset candidate at all.
    pub fn candidate_kind(tag: &StartTag, attribute: &str) -> Option<AssetKind> {
        match (tag.name.as_str(), attribute) {
            ("link", "href") => {
                let rels = tag.rel_tokens();
                if rels.iter().any(|r| NAVIGATIONAL_RELS.contains(&r.as_str())) {
                    None
                } else if rels.iter().any(|r| r == "stylesheet") {
                    Some(AssetKind::Stylesheet)
                } else {
                    Some(kind_from_value(tag.attr("href")))
                }
            }
            ("meta", "content") if names_resource(tag) => {
                Some(kind_from_value(tag.attr("content")))
            }
            ("script", "src") => Some(AssetKind::Script),
            ("video", "src") => Some(AssetKind::Video),
            ("video", "poster") | ("img", "src") => Some(AssetKind::Image),
            _ => None,
        }
    }

    /// Resolves a candidate value to the asset URL, or `None` if it is not one
    pub fn classify(&self, raw: &str, page_url: &Url) -> Option<Url> {
        let value = raw.trim();

        if value.is_empty() || value.starts_with('#') {
            return None;
        }

        let lowered = value.to_ascii_lowercase();
        if NEVER_ASSET_SCHEMES.iter().any(|s| lowered.starts_with(s)) {
            return None;
        }

        if value.starts_with('/') && !value.starts_with("//") {
            return self.site_root.join(value).ok();
        }

        let absolute = if value.starts_with("//") {
            page_url.join(value).ok()?
        } else {
            Url::parse(value).ok()?
        };

        if absolute.scheme() != "http" && absolute.scheme() != "https" {
            return None;
        }

        let host = absolute.host_str()?;

        if self
            .cdn_hosts
            .iter()
            .any(|pattern| matches_wildcard(pattern, host))
        {
            return Some(absolute);
        }

        if Some(host) == page_url.host_str() && last_segment_is_file(&absolute) {
            return Some(absolute);
        }

        None
    }
}

/// Returns true if a `meta` tag's `property` or `name` marks its content as a
/// resource (Open Graph, Twitter cards, `msapplication-*` tiles)
fn names_resource(tag: &StartTag) -> bool {
    ["property", "name"]
        .iter()
        .filter_map(|key| tag.attr(key))
        .map(|key| key.trim().to_ascii_lowercase())
        .any(|key| RESOURCE_META_KEYS.contains(&key.as_str()) || key.starts_with("msapplication-"))
}

fn last_segment_is_file(url: &Url) -> bool {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .is_some_and(|segment| segment.contains('.'))
}

fn kind_from_value(value: Option<&str>) -> AssetKind {
    let path = value
        .unwrap_or_default()
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    AssetKind::from_file_name(path.rsplit('/').next().unwrap_or_default())
}

//! Document rewriter
//!
//! Points navigation at the mirror origin, swaps localized asset references
//! for their mirror URLs and strips interstitial elements. Both are streaming
//! passes (see [`crate::mirror::markup`]), so everything else in the document
//! is written out exactly as rendered.

use crate::config::Config;
use crate::mirror::classifier::AssetClassifier;
use crate::mirror::markup::{remove_elements, rewrite_attributes};
use crate::url::is_under_prefix;
use crate::ConfigError;
use lol_html::errors::RewritingError;
use lol_html::Selector;
use std::collections::HashMap;

/// Elements whose `href` is navigation
const HREF_ELEMENTS: &[&str] = &["a", "link", "base"];

#[derive(Debug, Clone)]
pub struct DocumentRewriter {
    source_origin: String,
    mirror_origin: String,
    language_prefix: String,
    remove_selectors: Vec<String>,
}

impl DocumentRewriter {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        for selector in &config.cleanup.remove_selectors {
            selector.parse::<Selector>().map_err(|e| {
                ConfigError::Validation(format!("Invalid selector '{}': {}", selector, e))
            })?;
        }

        Ok(Self {
            source_origin: config.site.source_origin_trimmed().to_string(),
            mirror_origin: config.site.mirror_origin_trimmed().to_string(),
            language_prefix: config.site.language_prefix(),
            remove_selectors: config.cleanup.remove_selectors.clone(),
        })
    }

    /// Rewrites a navigational `href`
    ///
    /// Returns `None` when the value is left as written.
    ///
    /// # Rules
    ///
    /// - `{source}/path` becomes `{mirror}/path`
    /// - `/{lang}/path` becomes `{mirror}/{lang}/path`
    /// - any other root-relative `/path` becomes `{mirror}/{lang}/path`
    pub fn rewrite_href(&self, href: &str) -> Option<String> {
        if let Some(rest) = href.strip_prefix(&self.source_origin) {
            if rest.is_empty() || rest.starts_with('/') {
                return Some(format!("{}{}", self.mirror_origin, rest));
            }
            return None;
        }

        if href.starts_with('/') && !href.starts_with("//") {
            let path = href.split(['?', '#']).next().unwrap_or_default();
            if is_under_prefix(path, &self.language_prefix) {
                return Some(format!("{}{}", self.mirror_origin, href));
            }
            return Some(format!(
                "{}{}{}",
                self.mirror_origin, self.language_prefix, href
            ));
        }

        None
    }

    /// Removes interstitial elements
    ///
    /// Returns the cleaned document only if something was removed.
    pub fn remove_interstitials(&self, html: &str) -> Result<Option<String>, RewritingError> {
        if self.remove_selectors.is_empty() {
            return Ok(None);
        }
        remove_elements(html, &self.remove_selectors)
    }

    /// Applies asset localization and navigation rewriting in one pass
    ///
    /// `localized` maps an asset attribute value, as written in the page, to
    /// the mirror URL of the downloaded file.
    pub fn rewrite(
        &self,
        markup: &str,
        localized: &HashMap<String, String>,
    ) -> Result<String, RewritingError> {
        rewrite_attributes(markup, |tag, attribute| {
            let value = attribute.value.as_str();

            if AssetClassifier::candidate_kind(tag, &attribute.name).is_some() {
                if let Some(mirror_url) = localized.get(value) {
                    return Some(mirror_url.clone());
                }
            }

            if attribute.name == "href" && HREF_ELEMENTS.contains(&tag.name.as_str()) {
                return self.rewrite_href(value.trim());
            }

            None
        })
    }
}

//! Stylesheet post-processing
//!
//! Every `url(...)` reference inside a downloaded stylesheet is pointed at
//! the mirror's asset directory, fetching the target first. Only `data:` URIs
//! and fragment references are left as written; a target without a usable
//! file name is stored under a digest of its URL.

use crate::mirror::asset::{digest_name, AssetStore};
use crate::mirror::downloader::AssetDownloader;
use regex::{Captures, Regex};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;
use url::Url;

static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*(?:"([^"]*)"|'([^']*)'|([^)'"\s]*))\s*\)"#)
        .expect("constant regex pattern is valid")
});

/// Counts for one processed stylesheet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StylesheetReport {
    pub references: usize,
    pub fetched: usize,
    pub failed: usize,
}

/// Rewrites `url(...)` references of stylesheets stored in the asset directory
#[derive(Debug, Clone)]
pub struct StylesheetProcessor {
    downloader: AssetDownloader,
    store: AssetStore,
    fallback_origins: Vec<String>,
}

impl StylesheetProcessor {
    pub fn new(
        downloader: AssetDownloader,
        store: AssetStore,
        fallback_origins: Vec<String>,
    ) -> Self {
        Self {
            downloader,
            store,
            fallback_origins,
        }
    }

    /// Processes the stylesheet fetched from `stylesheet_url` into `path`
    ///
    /// Files that are not UTF-8 are left untouched.
    pub async fn process(&self, stylesheet_url: &Url, path: &Path) -> StylesheetReport {
        let mut report = StylesheetReport::default();

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot read stylesheet");
                return report;
            }
        };
        let Ok(text) = String::from_utf8(bytes) else {
            tracing::debug!(url = %stylesheet_url, "Stylesheet is not UTF-8, leaving as is");
            return report;
        };

        let mut seen = HashSet::new();
        let mut targets: HashMap<String, String> = HashMap::new();
        for reference in references(&text) {
            if !seen.insert(reference.clone()) {
                continue;
            }
            report.references += 1;

            if let Some(mirror_url) = self.localize(&reference, stylesheet_url, &mut report).await
            {
                targets.insert(reference, mirror_url);
            }
        }

        if targets.is_empty() {
            return report;
        }

        let rewritten = replace_references(&text, &targets);
        if rewritten != text {
            if let Err(e) = tokio::fs::write(path, rewritten).await {
                tracing::warn!(path = %path.display(), error = %e, "Cannot write stylesheet");
            }
        }

        report
    }

    /// Fetches one reference and returns the mirror URL it should become
    async fn localize(
        &self,
        reference: &str,
        stylesheet_url: &Url,
        report: &mut StylesheetReport,
    ) -> Option<String> {
        if is_kept(reference) || self.store.is_mirror_asset_url(reference) {
            return None;
        }

        let resolved = match stylesheet_url.join(reference) {
            Ok(url) => url,
            Err(e) => {
                report.failed += 1;
                tracing::warn!(
                    reference,
                    stylesheet = %stylesheet_url,
                    error = %e,
                    "Unresolvable stylesheet reference, mirror reference will not resolve"
                );
                return Some(self.store.mirror_url(&digest_name(reference)));
            }
        };
        let file_name = self.store.file_name_or_digest(&resolved);
        let local_path = self.store.local_path(&file_name);

        if self.downloader.fetch(&resolved, &local_path).await {
            report.fetched += 1;
        } else if self.fetch_from_fallbacks(&resolved, &local_path).await {
            report.fetched += 1;
        } else {
            report.failed += 1;
            tracing::warn!(
                url = %resolved,
                stylesheet = %stylesheet_url,
                "Stylesheet resource unavailable, mirror reference will not resolve"
            );
        }

        Some(self.store.mirror_url(&file_name))
    }

    async fn fetch_from_fallbacks(&self, resolved: &Url, local_path: &Path) -> bool {
        let Some(basename) = resolved.path().rsplit('/').next().filter(|b| !b.is_empty()) else {
            return false;
        };

        for origin in &self.fallback_origins {
            let Ok(candidate) = Url::parse(&format!("{}{}", origin, basename)) else {
                continue;
            };
            if self.downloader.fetch(&candidate, local_path).await {
                tracing::debug!(url = %candidate, "Fetched stylesheet resource from fallback");
                return true;
            }
        }

        false
    }
}

/// Lists the raw `url(...)` arguments in order of appearance
pub fn references(css: &str) -> Vec<String> {
    CSS_URL
        .captures_iter(css)
        .filter_map(|caps| reference_of(&caps).map(str::to_string))
        .collect()
}

fn reference_of<'t>(caps: &Captures<'t>) -> Option<&'t str> {
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str())
}

/// `data:` URIs, fragment references and empty values stay as written
fn is_kept(reference: &str) -> bool {
    let reference = reference.trim();
    reference.is_empty()
        || reference.starts_with('#')
        || reference.to_ascii_lowercase().starts_with("data:")
}

fn replace_references(css: &str, targets: &HashMap<String, String>) -> String {
    CSS_URL
        .replace_all(css, |caps: &Captures<'_>| {
            let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            let Some(target) = reference_of(caps).and_then(|r| targets.get(r)) else {
                return whole.to_string();
            };

            if caps.get(1).is_some() {
                format!("url(\"{}\")", target)
            } else if caps.get(2).is_some() {
                format!("url('{}')", target)
            } else {
                format!("url({})", target)
            }
        })
        .into_owned()
}

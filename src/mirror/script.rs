//! Script post-processing
//!
//! Scripts often carry absolute resource URLs in string literals. Each
//! file-like `https://` URL found in a downloaded script is fetched into the
//! asset directory and, only when that succeeds, replaced by its mirror URL.

use crate::mirror::asset::AssetStore;
use crate::mirror::downloader::AssetDownloader;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;
use url::Url;

static ABSOLUTE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https://[A-Za-z0-9.-]+(?::[0-9]+)?/[^\s"'`<>()\\{}\[\],;]*"#)
        .expect("constant regex pattern is valid")
});

/// Last path segment with a file extension
///
/// Extensionless URLs in scripts are mostly API endpoints and page routes the
/// client calls at run time; fetching one would freeze a response as a file.
static FILE_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^/]+\.[A-Za-z0-9]{1,8}$").expect("constant regex pattern is valid")
});

/// Counts for one processed script
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptReport {
    pub fetched: usize,
    pub failed: usize,
}

/// Localizes resource URLs embedded in scripts
#[derive(Debug, Clone)]
pub struct ScriptProcessor {
    downloader: AssetDownloader,
    store: AssetStore,
    mirror_host: Option<String>,
}

impl ScriptProcessor {
    pub fn new(downloader: AssetDownloader, store: AssetStore, mirror_origin: &str) -> Self {
        let mirror_host = Url::parse(mirror_origin)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string));

        Self {
            downloader,
            store,
            mirror_host,
        }
    }

    /// Processes the script stored at `path`
    pub async fn process(&self, script_url: &Url, path: &Path) -> ScriptReport {
        let mut report = ScriptReport::default();

        let text = match tokio::fs::read(path).await.map(String::from_utf8) {
            Ok(Ok(text)) => text,
            Ok(Err(_)) => {
                tracing::debug!(url = %script_url, "Script is not UTF-8, leaving as is");
                return report;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot read script");
                return report;
            }
        };

        let mut replacements: HashMap<String, String> = HashMap::new();
        for candidate in self.embedded_urls(&text) {
            let Ok(url) = Url::parse(&candidate) else {
                continue;
            };
            let Some(file_name) = self.store.file_name_for(&url) else {
                continue;
            };

            if self
                .downloader
                .fetch(&url, &self.store.local_path(&file_name))
                .await
            {
                report.fetched += 1;
                replacements.insert(candidate, self.store.mirror_url(&file_name));
            } else {
                report.failed += 1;
            }
        }

        if replacements.is_empty() {
            return report;
        }

        let rewritten = ABSOLUTE_URL.replace_all(&text, |caps: &Captures<'_>| {
            let found = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            replacements
                .get(found)
                .cloned()
                .unwrap_or_else(|| found.to_string())
        });

        if let Err(e) = tokio::fs::write(path, rewritten.as_bytes()).await {
            tracing::warn!(path = %path.display(), error = %e, "Cannot write script");
        }

        report
    }

    /// Unique file-like `https://` URLs not already on the mirror, in order
    pub fn embedded_urls(&self, text: &str) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();

        for found in ABSOLUTE_URL.find_iter(text) {
            let candidate = found.as_str();
            if urls.iter().any(|u| u == candidate) {
                continue;
            }

            let Ok(url) = Url::parse(candidate) else {
                continue;
            };
            if url.host_str().is_some() && url.host_str() == self.mirror_host.as_deref() {
                continue;
            }

            let last = url.path().rsplit('/').next().unwrap_or_default();
            if FILE_SEGMENT.is_match(last) {
                urls.push(candidate.to_string());
            }
        }

        urls
    }
}

//! Seed URLs from the site's sitemap
//!
//! The sitemap of a language section is fetched once and cached on disk.
//! A cached copy younger than the configured age is used without a request;
//! an older one is still used when the site cannot be reached.

use crate::config::Config;
use crate::url::normalize_url;
use crate::MirrorError;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub struct SitemapSource {
    client: Client,
    source_origin: String,
    cache_dir: PathBuf,
    max_age: Duration,
}

impl SitemapSource {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            source_origin: config.site.source_origin_trimmed().to_string(),
            cache_dir: config.output.cache_path(),
            max_age: Duration::from_secs(config.sitemap.max_age_hours * 3600),
        }
    }

    /// Returns the language root followed by every sitemap location on the
    /// source host, normalized and without duplicates
    pub async fn list_seed_urls(&self, language: &str) -> Result<Vec<String>, MirrorError> {
        let xml = self.load(language).await?;

        let source_host = normalize_url(&self.source_origin)?
            .host_str()
            .map(str::to_string);

        let root = format!("{}/{}/", self.source_origin, language);
        let mut seen = HashSet::new();
        let mut seeds = Vec::new();

        for location in std::iter::once(root).chain(parse_locations(&xml)) {
            let Ok(url) = normalize_url(&location) else {
                tracing::debug!(location = %location, "Skipping malformed sitemap location");
                continue;
            };
            if url.host_str().map(str::to_string) != source_host {
                continue;
            }
            let url = url.to_string();
            if seen.insert(url.clone()) {
                seeds.push(url);
            }
        }

        tracing::info!(language = %language, seeds = seeds.len(), "Sitemap loaded");
        Ok(seeds)
    }

    fn cache_file(&self, language: &str) -> PathBuf {
        self.cache_dir.join(format!("sitemap-{}.xml", language))
    }

    async fn load(&self, language: &str) -> Result<String, MirrorError> {
        let cache_file = self.cache_file(language);

        if let Some(age) = cache_age(&cache_file).await {
            if age < self.max_age {
                tracing::debug!(path = %cache_file.display(), "Using cached sitemap");
                return Ok(tokio::fs::read_to_string(&cache_file).await?);
            }
        }

        let url = format!("{}/{}/sitemap.xml", self.source_origin, language);
        match self.fetch(&url).await {
            Ok(xml) => {
                if let Err(e) = store(&cache_file, &xml).await {
                    tracing::warn!(path = %cache_file.display(), error = %e, "Cannot cache sitemap");
                }
                Ok(xml)
            }
            Err(e) => match tokio::fs::read_to_string(&cache_file).await {
                Ok(stale) => {
                    tracing::warn!(url = %url, error = %e, "Sitemap fetch failed, using stale cache");
                    Ok(stale)
                }
                Err(_) => Err(e),
            },
        }
    }

    async fn fetch(&self, url: &str) -> Result<String, MirrorError> {
        tracing::info!(url = %url, "Fetching sitemap");
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

/// Text of every `<loc>` element, in document order
pub fn parse_locations(xml: &str) -> Vec<String> {
    let document = Html::parse_document(xml);
    let mut locations = Vec::new();

    if let Ok(loc_selector) = Selector::parse("loc") {
        for element in document.select(&loc_selector) {
            let text = element.text().collect::<String>();
            let text = text.trim();
            if !text.is_empty() {
                locations.push(text.to_string());
            }
        }
    }

    locations
}

async fn cache_age(path: &Path) -> Option<Duration> {
    let modified = tokio::fs::metadata(path).await.ok()?.modified().ok()?;
    // A timestamp in the future counts as fresh
    Some(modified.elapsed().unwrap_or_default())
}

async fn store(path: &Path, xml: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, xml).await
}

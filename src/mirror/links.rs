//! Link extraction
//!
//! Collects the same-language anchors of a rewritten page so they can be
//! queued. Anchors already point at the mirror, so they are mapped back to
//! the source origin before resolution.

use crate::config::Config;
use crate::mirror::markup::start_tags;
use crate::url::{is_under_prefix, normalize_url};
use crate::ConfigError;
use lol_html::errors::RewritingError;
use std::collections::HashSet;
use url::Url;

#[derive(Debug, Clone)]
pub struct LinkExtractor {
    source_origin: String,
    mirror_origin: String,
    source_host: String,
    language_prefix: String,
}

impl LinkExtractor {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let source = Url::parse(config.site.source_origin_trimmed()).map_err(|e| {
            ConfigError::InvalidUrl(format!(
                "Invalid source origin '{}': {}",
                config.site.source_origin, e
            ))
        })?;
        let source_host = source
            .host_str()
            .ok_or_else(|| {
                ConfigError::InvalidUrl(format!(
                    "source origin '{}' has no host",
                    config.site.source_origin
                ))
            })?
            .to_string();

        Ok(Self {
            source_origin: config.site.source_origin_trimmed().to_string(),
            mirror_origin: config.site.mirror_origin_trimmed().to_string(),
            source_host,
            language_prefix: config.site.language_prefix(),
        })
    }

    /// Returns the normalized same-language links of a page
    ///
    /// # Link Extraction Rules
    ///
    /// **Include:** `<a href>` targets on the source host whose path is the
    /// language root or lies below it.
    ///
    /// **Exclude:**
    /// - `<a href="..." download>`
    /// - `javascript:`, `mailto:`, `tel:`, `data:` and fragment-only links
    /// - other hosts and other languages
    ///
    /// The result keeps discovery order and holds each URL once.
    pub fn extract(&self, markup: &str, page_url: &Url) -> Result<Vec<String>, RewritingError> {
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for tag in start_tags(markup, "a[href]")? {
            if tag.has_attr("download") {
                continue;
            }
            let Some(href) = tag.attr("href") else {
                continue;
            };
            let Some(link) = self.resolve(href, page_url) else {
                continue;
            };

            if seen.insert(link.clone()) {
                links.push(link);
            }
        }

        Ok(links)
    }

    fn resolve(&self, href: &str, page_url: &Url) -> Option<String> {
        let href = href.trim();

        if href.is_empty() || href.starts_with('#') {
            return None;
        }

        let lowered = href.to_ascii_lowercase();
        if lowered.starts_with("javascript:")
            || lowered.starts_with("mailto:")
            || lowered.starts_with("tel:")
            || lowered.starts_with("data:")
        {
            return None;
        }

        let unmirrored = match href.strip_prefix(&self.mirror_origin) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => {
                format!("{}{}", self.source_origin, rest)
            }
            _ => href.to_string(),
        };

        let absolute = page_url.join(&unmirrored).ok()?;
        let normalized = normalize_url(absolute.as_str()).ok()?;

        if normalized.host_str() != Some(self.source_host.as_str()) {
            return None;
        }
        if !is_under_prefix(normalized.path(), &self.language_prefix) {
            return None;
        }

        Some(normalized.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::asset::tests::test_config;
    use std::path::Path;

    fn extractor() -> LinkExtractor {
        LinkExtractor::new(&test_config(Path::new("/tmp/mirror"))).unwrap()
    }

    fn page() -> Url {
        Url::parse("https://www.example.org/es/biblioteca/").unwrap()
    }

    #[test]
    fn test_mirror_links_map_back_to_source() {
        let html = r#"<a href="https://mirror.example.net/es/foo">Foo</a>"#;
        assert_eq!(
            extractor().extract(html, &page()).unwrap(),
            vec!["https://www.example.org/es/foo"]
        );
    }

    #[test]
    fn test_relative_links_resolve_against_page() {
        let html = r#"<a href="libros/">Libros</a><a href="../noticias#top">News</a>"#;
        assert_eq!(
            extractor().extract(html, &page()).unwrap(),
            vec![
                "https://www.example.org/es/biblioteca/libros",
                "https://www.example.org/es/noticias",
            ]
        );
    }

    #[test]
    fn test_duplicates_collapse_in_discovery_order() {
        let html = r#"
            <a href="https://mirror.example.net/es/b">B</a>
            <a href="https://mirror.example.net/es/a">A</a>
            <a href="https://www.example.org/es/b#again">B again</a>
            <a href="https://mirror.example.net/es/a?utm_source=x">A again</a>
        "#;
        assert_eq!(
            extractor().extract(html, &page()).unwrap(),
            vec!["https://www.example.org/es/b", "https://www.example.org/es/a"]
        );
    }

    #[test]
    fn test_other_languages_and_hosts_dropped() {
        let html = r#"
            <a href="https://mirror.example.net/en/foo">EN</a>
            <a href="https://mirror.example.net/esperanto/">Lookalike</a>
            <a href="https://other.example.com/es/foo">Other host</a>
            <a href="https://mirror.example.net/">Root</a>
        "#;
        assert!(extractor().extract(html, &page()).unwrap().is_empty());
    }

    #[test]
    fn test_skipped_href_kinds() {
        let html = r##"
            <a href="">Empty</a>
            <a href="#section">Fragment</a>
            <a href="mailto:info@example.org">Mail</a>
            <a href="javascript:void(0)">JS</a>
            <a href="/es/file.pdf" download>Download</a>
            <a name="anchor">No href</a>
        "##;
        assert!(extractor().extract(html, &page()).unwrap().is_empty());
    }

    #[test]
    fn test_anchors_in_scripts_and_comments_ignored() {
        let html = r#"
            <script>document.write('<a href="/es/from-script">x</a>');</script>
            <!-- <a href="/es/commented-out">old</a> -->
            <a href="/es/real">Real</a>
        "#;
        assert_eq!(
            extractor().extract(html, &page()).unwrap(),
            vec!["https://www.example.org/es/real"]
        );
    }

    #[test]
    fn test_language_root_is_kept() {
        let html = r#"<a href="https://mirror.example.net/es">Inicio</a>"#;
        assert_eq!(
            extractor().extract(html, &page()).unwrap(),
            vec!["https://www.example.org/es"]
        );
    }
}

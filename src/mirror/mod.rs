//! Page transformation pipeline
//!
//! This module turns one rendered page into its self-hosting copy:
//! - Classifying and downloading the assets it references
//! - Post-processing downloaded stylesheets and scripts
//! - Rewriting navigation to the mirror origin
//! - Extracting same-language links for the frontier
//! - Writing the document to its place in the output tree

mod asset;
mod classifier;
mod downloader;
mod links;
mod markup;
mod rewriter;
mod script;
mod stylesheet;

pub use asset::{Asset, AssetKind, AssetStore};
pub use classifier::AssetClassifier;
pub use downloader::{build_http_client, AssetDownloader, AssetFetchError};
pub use links::LinkExtractor;
pub use markup::{remove_elements, rewrite_attributes, start_tags, Attribute, StartTag};
pub use rewriter::DocumentRewriter;
pub use script::{ScriptProcessor, ScriptReport};
pub use stylesheet::{StylesheetProcessor, StylesheetReport};

#[cfg(test)]
pub(crate) use asset::tests::test_config;

use crate::config::Config;
use crate::{MirrorError, PersistError};
use percent_encoding::percent_decode_str;
use reqwest::Client;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use url::Url;

/// Asset download counts for one page, nested resources included
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssetTally {
    pub fetched: usize,
    pub failed: usize,
}

/// A rendered page after transformation, ready to be written
#[derive(Debug, Clone)]
pub struct MirroredPage {
    pub source_url: Url,
    /// Where the document is written under the output root
    pub local_path: PathBuf,
    pub document: String,
    pub embedded_assets: Vec<Asset>,
    /// Normalized same-language links, in discovery order
    pub discovered_links: Vec<String>,
    pub has_video: bool,
    pub tally: AssetTally,
}

/// Runs every transformation step for a page
pub struct PagePipeline {
    root_dir: PathBuf,
    store: AssetStore,
    classifier: AssetClassifier,
    downloader: AssetDownloader,
    stylesheets: StylesheetProcessor,
    scripts: ScriptProcessor,
    rewriter: DocumentRewriter,
    links: LinkExtractor,
}

impl PagePipeline {
    /// Builds the pipeline and creates the asset directory
    pub fn new(config: &Config, client: Client) -> Result<Self, MirrorError> {
        let store = AssetStore::new(config);
        store.ensure_dir()?;

        let downloader = AssetDownloader::new(client);

        Ok(Self {
            root_dir: config.output.root_dir.clone(),
            classifier: AssetClassifier::new(config)?,
            stylesheets: StylesheetProcessor::new(
                downloader.clone(),
                store.clone(),
                config.assets.fallback_origins.clone(),
            ),
            scripts: ScriptProcessor::new(
                downloader.clone(),
                store.clone(),
                &config.site.mirror_origin,
            ),
            rewriter: DocumentRewriter::new(config)?,
            links: LinkExtractor::new(config)?,
            downloader,
            store,
        })
    }

    /// Transforms rendered markup into its mirrored form
    ///
    /// Asset failures are absorbed: the reference keeps its original value and
    /// the page is still produced. Only markup the rewriter cannot stream
    /// fails the page.
    pub async fn transform(
        &self,
        page_url: &Url,
        html: &str,
    ) -> Result<MirroredPage, MirrorError> {
        let cleaned = self.rewriter.remove_interstitials(html)?;
        let markup = cleaned.as_deref().unwrap_or(html);

        let tags = start_tags(markup, "*")?;
        let has_video = tags.iter().any(|tag| tag.name == "video");

        // Unique asset URLs with every raw value that referenced them
        let mut candidates: Vec<(Url, AssetKind, Vec<String>)> = Vec::new();
        for tag in &tags {
            for attribute in &tag.attributes {
                let value = attribute.value.as_str();
                let Some(kind) = AssetClassifier::candidate_kind(tag, &attribute.name) else {
                    continue;
                };
                let Some(url) = self.classifier.classify(value, page_url) else {
                    continue;
                };

                match candidates.iter_mut().find(|(known, _, _)| *known == url) {
                    Some((_, _, raws)) => {
                        if !raws.iter().any(|r| r == value) {
                            raws.push(value.to_string());
                        }
                    }
                    None => candidates.push((url, kind, vec![value.to_string()])),
                }
            }
        }

        let mut tally = AssetTally::default();
        let mut localized: HashMap<String, String> = HashMap::new();
        let mut embedded_assets = Vec::with_capacity(candidates.len());

        for (url, kind, raws) in candidates {
            let Some(mut asset) = self.store.asset_for(&url, kind) else {
                continue;
            };
            asset.fetched = self.localize(&asset, &mut tally).await;

            if asset.fetched {
                let mirror_url = self.store.mirror_url(&asset.file_name);
                for raw in raws {
                    localized.insert(raw, mirror_url.clone());
                }
            }
            embedded_assets.push(asset);
        }

        let document = self.rewriter.rewrite(markup, &localized)?;
        let discovered_links = self
            .links
            .extract(&document, &document_base(page_url, has_video))?;

        Ok(MirroredPage {
            local_path: local_page_path(&self.root_dir, page_url, has_video),
            source_url: page_url.clone(),
            document,
            embedded_assets,
            discovered_links,
            has_video,
            tally,
        })
    }

    /// Downloads one asset and post-processes stylesheets and scripts
    async fn localize(&self, asset: &Asset, tally: &mut AssetTally) -> bool {
        let path = self.store.local_path(&asset.file_name);

        if !self.downloader.fetch(&asset.source_url, &path).await {
            tally.failed += 1;
            return false;
        }
        tally.fetched += 1;

        match asset.kind {
            AssetKind::Stylesheet => {
                let report = self.stylesheets.process(&asset.source_url, &path).await;
                tally.fetched += report.fetched;
                tally.failed += report.failed;
            }
            AssetKind::Script => {
                let report = self.scripts.process(&asset.source_url, &path).await;
                tally.fetched += report.fetched;
                tally.failed += report.failed;
            }
            _ => {}
        }

        true
    }

    /// Writes the document, creating parent directories as needed
    pub async fn persist(&self, page: &MirroredPage) -> Result<(), PersistError> {
        let persist_error = |source| PersistError {
            path: page.local_path.clone(),
            source,
        };

        if let Some(parent) = page.local_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(persist_error)?;
        }

        tokio::fs::write(&page.local_path, page.document.as_bytes())
            .await
            .map_err(persist_error)
    }
}

/// URL the mirror serves a page under, against which its relative links
/// resolve
///
/// Frontier keys carry no trailing slash, but a page written as
/// `<path>/index.html` is served as `<path>/`.
fn document_base(url: &Url, has_video: bool) -> Url {
    let mut base = url.clone();
    if !has_video && !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

/// Maps a page URL to its file under the output root
///
/// The percent-decoded URL path becomes a directory holding `index.html`.
/// Pages with a `video` element are written as `<path>.html` instead. Empty,
/// `.` and `..` segments are dropped so nothing escapes the root.
pub fn local_page_path(root: &Path, url: &Url, has_video: bool) -> PathBuf {
    let decoded = percent_decode_str(url.path()).decode_utf8_lossy();

    let segments: Vec<&str> = Path::new(&*decoded)
        .components()
        .filter_map(|component| match component {
            Component::Normal(segment) => segment.to_str(),
            _ => None,
        })
        .collect();

    let Some((last, parents)) = segments.split_last() else {
        return root.join("index.html");
    };

    let mut path = root.to_path_buf();
    path.extend(parents);

    if has_video {
        path.push(format!("{}.html", last));
    } else {
        path.push(last);
        path.push("index.html");
    }

    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;
    use crate::mirror::asset::tests::test_config;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_local_page_path_directory_page() {
        let root = Path::new("/m");
        assert_eq!(
            local_page_path(root, &url("https://www.example.org/es/noticias/"), false),
            Path::new("/m/es/noticias/index.html")
        );
        assert_eq!(
            local_page_path(root, &url("https://www.example.org/es/noticias"), false),
            Path::new("/m/es/noticias/index.html")
        );
    }

    #[test]
    fn test_local_page_path_video_page() {
        assert_eq!(
            local_page_path(
                Path::new("/m"),
                &url("https://www.example.org/es/videos/intro/"),
                true
            ),
            Path::new("/m/es/videos/intro.html")
        );
    }

    #[test]
    fn test_local_page_path_root_and_decoding() {
        let root = Path::new("/m");
        assert_eq!(
            local_page_path(root, &url("https://www.example.org/"), true),
            Path::new("/m/index.html")
        );
        assert_eq!(
            local_page_path(root, &url("https://www.example.org/es/b%C3%ADblia/"), false),
            Path::new("/m/es/bíblia/index.html")
        );
    }

    #[test]
    fn test_local_page_path_stays_under_root() {
        assert_eq!(
            local_page_path(
                Path::new("/m"),
                &url("https://www.example.org/es/..%2F..%2Fetc/"),
                false
            ),
            Path::new("/m/es/etc/index.html")
        );
    }

    #[test]
    fn test_document_base_follows_output_layout() {
        assert_eq!(
            document_base(&url("https://www.example.org/es/biblioteca"), false).as_str(),
            "https://www.example.org/es/biblioteca/"
        );
        assert_eq!(
            document_base(&url("https://www.example.org/es/videos/intro"), true).as_str(),
            "https://www.example.org/es/videos/intro"
        );
        assert_eq!(
            document_base(&url("https://www.example.org/"), false).as_str(),
            "https://www.example.org/"
        );
    }

    #[tokio::test]
    async fn test_relative_links_resolve_under_page_directory() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let client = build_http_client(&NetworkConfig::default()).unwrap();
        let pipeline = PagePipeline::new(&config, client).unwrap();

        let page = pipeline
            .transform(
                &url("https://www.example.org/es/biblioteca"),
                r#"<a href="libros/">Libros</a>"#,
            )
            .await
            .unwrap();

        assert_eq!(
            page.discovered_links,
            vec!["https://www.example.org/es/biblioteca/libros"]
        );
        assert!(page.local_path.ends_with("es/biblioteca/index.html"));
    }

    #[tokio::test]
    async fn test_transform_localizes_assets_and_links() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img/logo.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PNG".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let client = build_http_client(&NetworkConfig::default()).unwrap();
        let pipeline = PagePipeline::new(&config, client).unwrap();

        let logo = format!("{}/img/logo.png", server.uri());
        let html = format!(
            r#"<html><body><img src="{logo}"><img src="{logo}"><a href="/es/foo">Foo</a><a href="https://www.example.org/es/foo">Foo</a></body></html>"#
        );

        // The page lives on the mock host so the logo counts as same-host
        let page_url = url(&format!("{}/es/", server.uri()));
        let page = pipeline.transform(&page_url, &html).await.unwrap();

        assert_eq!(page.embedded_assets.len(), 1);
        assert!(page.embedded_assets[0].fetched);
        assert_eq!(page.tally, AssetTally { fetched: 1, failed: 0 });
        assert_eq!(
            page.document.matches("https://mirror.example.net/assets/logo.png").count(),
            2
        );
        assert_eq!(
            page.document.matches("https://mirror.example.net/es/foo").count(),
            2
        );
        assert_eq!(page.discovered_links, vec!["https://www.example.org/es/foo"]);
        assert!(!page.has_video);
        assert!(dir.path().join("assets").join("logo.png").exists());
    }

    #[tokio::test]
    async fn test_failed_asset_keeps_original_reference() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let client = build_http_client(&NetworkConfig::default()).unwrap();
        let pipeline = PagePipeline::new(&config, client).unwrap();

        let missing = format!("{}/img/missing.png", server.uri());
        let html = format!(r#"<video poster="{missing}"></video>"#);
        let page = pipeline
            .transform(&url(&format!("{}/es/clip", server.uri())), &html)
            .await
            .unwrap();

        assert!(page.has_video);
        assert_eq!(page.tally.failed, 1);
        assert!(page.document.contains(&missing));
        assert!(page.local_path.ends_with("es/clip.html"));
    }

    #[tokio::test]
    async fn test_persist_creates_directories() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let client = build_http_client(&NetworkConfig::default()).unwrap();
        let pipeline = PagePipeline::new(&config, client).unwrap();

        let page = pipeline
            .transform(&url("https://www.example.org/es/a/b/"), "<p>hola</p>")
            .await
            .unwrap();
        pipeline.persist(&page).await.unwrap();

        let written = dir.path().join("es").join("a").join("b").join("index.html");
        assert_eq!(std::fs::read_to_string(written).unwrap(), "<p>hola</p>");
    }

    #[tokio::test]
    async fn test_persist_error_names_path() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let client = build_http_client(&NetworkConfig::default()).unwrap();
        let pipeline = PagePipeline::new(&config, client).unwrap();

        // A file where a directory is needed
        std::fs::write(dir.path().join("es"), "not a directory").unwrap();

        let page = pipeline
            .transform(&url("https://www.example.org/es/a/"), "<p>hola</p>")
            .await
            .unwrap();
        let err = pipeline.persist(&page).await.unwrap_err();

        assert_eq!(err.path, page.local_path);
    }
}

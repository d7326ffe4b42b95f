//! Integration tests for a full mirror run
//!
//! Pages come from a canned renderer; assets are served by wiremock so the
//! whole pipeline, downloads included, runs end-to-end.

use async_trait::async_trait;
use langmirror::config::{parse_config, Config};
use langmirror::crawler::{Coordinator, NavigationError, Renderer, RetryPolicy};
use langmirror::mirror::build_http_client;
use langmirror::state::FrontierState;
use langmirror::storage::{Frontier, RunStatus, SqliteFrontier};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tracing::Span;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ROOT: &str = "https://www.example.org/es";
const FOO: &str = "https://www.example.org/es/foo";

/// Renders documents from a fixed table
#[derive(Default)]
struct CannedRenderer {
    pages: HashMap<String, String>,
}

impl CannedRenderer {
    fn with_page(mut self, url: &str, html: String) -> Self {
        self.pages.insert(url.to_string(), html);
        self
    }
}

#[async_trait]
impl Renderer for CannedRenderer {
    async fn render(&self, url: &Url) -> Result<String, NavigationError> {
        self.pages
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| NavigationError::Engine(format!("no page at {}", url)))
    }

    async fn shutdown(&self) -> Result<(), NavigationError> {
        Ok(())
    }
}

fn test_config(root: &Path) -> Config {
    parse_config(&format!(
        r##"
[site]
source-origin = "https://www.example.org"
language = "es"
mirror-origin = "https://mirror.example.net"

[output]
root-dir = "{root}"
database-path = "{root}/frontier.db"

[renderer]
endpoint = "http://localhost:4444"
settle-time-ms = 0

[assets]
cdn-hosts = ["127.0.0.1"]

[cleanup]
remove-selectors = ["#firstRunPopup"]
"##,
        root = root.display()
    ))
    .expect("test config is valid")
}

fn coordinator(config: &Config, renderer: CannedRenderer) -> Coordinator<CannedRenderer> {
    let frontier = SqliteFrontier::new(&config.output.database_path).unwrap();
    let client = build_http_client(&config.network).unwrap();
    Coordinator::new(config, "test", frontier, renderer, client, Span::none())
        .unwrap()
        .with_retry_policy(RetryPolicy::new(2, |_| Duration::ZERO))
}

async fn mount(server: &MockServer, at: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .expect(1)
        .mount(server)
        .await;
}

fn site(server: &MockServer) -> CannedRenderer {
    let assets = server.uri();
    CannedRenderer::default()
        .with_page(
            ROOT,
            format!(
                r#"<html><head><link rel="stylesheet" href="{assets}/css/site.css"></head>
<body><div id="firstRunPopup">Bienvenido</div>
<a href="https://www.example.org/es/foo">Foo</a>
<p>Otra vez: <a href="https://www.example.org/es/foo">Foo</a></p>
<a href="https://www.example.org/en/">English</a>
</body></html>"#
            ),
        )
        .with_page(
            FOO,
            format!(
                r#"<html><body><video src="{assets}/media/clip.mp4" poster="{assets}/img/poster.jpg"></video>
<a href="/es/">Inicio</a></body></html>"#
            ),
        )
}

#[tokio::test]
async fn test_full_mirror_run() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/css/site.css",
        b"body{background:url(../img/bg.png)} .i{background:url('data:image/png;base64,AAAA')}",
    )
    .await;
    mount(&server, "/img/bg.png", b"PNG").await;
    mount(&server, "/media/clip.mp4", b"MP4").await;
    mount(&server, "/img/poster.jpg", b"JPG").await;

    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let mut coordinator = coordinator(&config, site(&server));

    coordinator.seed(&[ROOT.to_string()]).unwrap();
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.pages_persisted, 2);
    assert_eq!(summary.pages_abandoned, 0);
    assert_eq!(summary.links_discovered, 1);
    assert_eq!(summary.assets_failed, 0);
    assert_eq!(summary.assets_fetched, 4);

    // The duplicate anchor produced a single frontier entry
    let frontier = coordinator.frontier();
    assert_eq!(frontier.count_total().unwrap(), 2);
    assert_eq!(
        frontier.get_entry(FOO).unwrap().unwrap().state,
        FrontierState::Done
    );

    let index = std::fs::read_to_string(dir.path().join("es").join("index.html")).unwrap();
    assert_eq!(index.matches("https://mirror.example.net/es/foo").count(), 2);
    assert!(!index.contains("https://www.example.org/es/foo"));
    assert!(index.contains(r#"href="https://mirror.example.net/assets/site.css""#));
    assert!(index.contains("https://mirror.example.net/en/"));
    assert!(!index.contains("firstRunPopup"));

    let css = std::fs::read_to_string(dir.path().join("assets").join("site.css")).unwrap();
    assert!(css.contains("url(https://mirror.example.net/assets/bg.png)"));
    assert!(css.contains("data:image/png;base64,AAAA"));

    // A page with a video is written next to its parent, not as a directory
    let foo = dir.path().join("es").join("foo.html");
    assert!(foo.exists());
    assert!(!dir.path().join("es").join("foo").exists());
    let foo = std::fs::read_to_string(foo).unwrap();
    assert!(foo.contains(r#"src="https://mirror.example.net/assets/clip.mp4""#));
    assert!(foo.contains(r#"poster="https://mirror.example.net/assets/poster.jpg""#));

    for asset in ["bg.png", "clip.mp4", "poster.jpg"] {
        assert!(dir.path().join("assets").join(asset).exists(), "{asset}");
    }
}

#[tokio::test]
async fn test_second_run_resumes_without_repeating_work() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"X".to_vec()))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    {
        let mut first = coordinator(&config, site(&server));
        first.seed(&[ROOT.to_string()]).unwrap();
        assert_eq!(first.run().await.unwrap().pages_persisted, 2);
    }

    let mut second = coordinator(&config, site(&server));
    assert_eq!(second.seed(&[ROOT.to_string()]).unwrap(), 0);
    let summary = second.run().await.unwrap();

    assert_eq!(summary.pages_persisted, 0);
    assert_eq!(
        second.frontier().get_latest_run().unwrap().unwrap().status,
        RunStatus::Completed
    );
}

#[tokio::test]
async fn test_unrenderable_page_is_failed_once() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let renderer = CannedRenderer::default();

    let mut coordinator = coordinator(&config, renderer);
    coordinator.seed(&[ROOT.to_string()]).unwrap();
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.pages_abandoned, 1);
    let entry = coordinator.frontier().get_entry(ROOT).unwrap().unwrap();
    assert_eq!(entry.state, FrontierState::Failed);
    assert!(entry.error_message.unwrap().contains("no page at"));
    assert!(!dir.path().join("es").join("index.html").exists());
}

//! Browser rendering through a WebDriver session
//!
//! Pages are rendered in a real browser so that client-side content is part
//! of the mirrored document. One session is held for the whole run; every
//! page gets a fresh tab that is closed again whatever the outcome.

use crate::config::{Browser, NetworkConfig, RendererConfig};
use crate::MirrorError;
use async_trait::async_trait;
use fantoccini::error::CmdError;
use fantoccini::wd::{Capabilities, WindowHandle};
use fantoccini::{Client, ClientBuilder};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// A failed attempt to render one page
///
/// These are transient: the page is retried and only abandoned once the
/// retry bound is reached.
#[derive(Debug, Clone, Error)]
pub enum NavigationError {
    #[error("timed out: {0}")]
    Timeout(String),

    #[error("lost connection to the browser: {0}")]
    Connection(String),

    #[error("browser error: {0}")]
    Engine(String),
}

impl From<CmdError> for NavigationError {
    fn from(err: CmdError) -> Self {
        match err {
            CmdError::Lost(e) => NavigationError::Connection(e.to_string()),
            other => NavigationError::Engine(other.to_string()),
        }
    }
}

/// Produces the rendered document of a URL
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Navigates to `url` and returns the document source after rendering
    async fn render(&self, url: &Url) -> Result<String, NavigationError>;

    /// Ends the browser session
    async fn shutdown(&self) -> Result<(), NavigationError>;
}

/// [`Renderer`] backed by a WebDriver server (geckodriver, chromedriver or a
/// remote grid)
pub struct WebDriverRenderer {
    client: Client,
    home: WindowHandle,
    settle_time: Duration,
    page_timeout: Duration,
}

impl WebDriverRenderer {
    /// Opens the browser session
    pub async fn connect(
        config: &RendererConfig,
        network: &NetworkConfig,
    ) -> Result<Self, MirrorError> {
        let endpoint = session_url(&config.endpoint, config.token.as_deref())?;

        let mut builder = ClientBuilder::native();
        builder.capabilities(capabilities(config, network));

        let client = builder.connect(endpoint.as_str()).await.map_err(|e| {
            MirrorError::Renderer(format!(
                "cannot start a session at {}: {}",
                config.endpoint, e
            ))
        })?;

        let home = client
            .window()
            .await
            .map_err(|e| MirrorError::Renderer(format!("cannot read window handle: {}", e)))?;

        tracing::info!(
            endpoint = %config.endpoint,
            browser = %config.browser,
            headless = config.headless,
            "Browser session started"
        );

        Ok(Self {
            client,
            home,
            settle_time: Duration::from_millis(config.settle_time_ms),
            page_timeout: Duration::from_secs(config.page_timeout_secs),
        })
    }

    async fn load_in_new_tab(&self, url: &Url) -> Result<String, CmdError> {
        let tab = self.client.new_window(true).await?;
        self.client.switch_to_window(tab.handle).await?;
        self.client.goto(url.as_str()).await?;
        tokio::time::sleep(self.settle_time).await;
        self.client.source().await
    }

    async fn render_in_tab(&self, url: &Url) -> Result<String, NavigationError> {
        let load = tokio::time::timeout(self.page_timeout, self.load_in_new_tab(url));
        let result = match load.await {
            Ok(loaded) => loaded.map_err(NavigationError::from),
            Err(_) => Err(NavigationError::Timeout(format!(
                "{} not rendered within {}s",
                url,
                self.page_timeout.as_secs()
            ))),
        };

        self.close_tabs().await;
        result
    }

    /// Closes every window but the home one and switches back to it
    ///
    /// Runs after every load, so a tab opened by an attempt that failed
    /// half-way is released too.
    async fn close_tabs(&self) {
        let handles = match self.client.windows().await {
            Ok(handles) => handles,
            Err(e) => {
                tracing::debug!(error = %e, "Cannot list browser windows");
                return;
            }
        };

        for handle in handles.into_iter().filter(|handle| *handle != self.home) {
            if let Err(e) = self.client.switch_to_window(handle).await {
                tracing::debug!(error = %e, "Cannot switch to tab");
                continue;
            }
            if let Err(e) = self.client.close_window().await {
                tracing::debug!(error = %e, "Cannot close tab");
            }
        }

        if let Err(e) = self.client.switch_to_window(self.home.clone()).await {
            tracing::debug!(error = %e, "Cannot switch back to the home window");
        }
    }
}

#[async_trait]
impl Renderer for WebDriverRenderer {
    async fn render(&self, url: &Url) -> Result<String, NavigationError> {
        tracing::debug!(url = %url, "Rendering");
        self.render_in_tab(url).await
    }

    async fn shutdown(&self) -> Result<(), NavigationError> {
        self.client.clone().close().await?;
        tracing::info!("Browser session closed");
        Ok(())
    }
}

/// WebDriver endpoint with the optional access token as a query parameter
fn session_url(endpoint: &str, token: Option<&str>) -> Result<Url, MirrorError> {
    let mut url = Url::parse(endpoint)?;
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        url.query_pairs_mut().append_pair("token", token);
    }
    Ok(url)
}

/// Session capabilities for the configured browser
///
/// The user agent and `Accept-Language` are overridden so that the rendered
/// pages match what the asset downloader requests.
fn capabilities(config: &RendererConfig, network: &NetworkConfig) -> Capabilities {
    let mut caps = Capabilities::new();

    match config.browser {
        Browser::Firefox => {
            let args: Vec<&str> = if config.headless {
                vec!["-headless"]
            } else {
                Vec::new()
            };
            caps.insert("browserName".to_string(), json!("firefox"));
            caps.insert(
                "moz:firefoxOptions".to_string(),
                json!({
                    "args": args,
                    "prefs": {
                        "general.useragent.override": network.user_agent,
                        "intl.accept_languages": network.accept_language,
                    }
                }),
            );
        }
        Browser::Chrome => {
            let mut args = vec![
                format!("--user-agent={}", network.user_agent),
                format!("--lang={}", network.accept_language),
            ];
            if config.headless {
                args.push("--headless=new".to_string());
            }
            caps.insert("browserName".to_string(), json!("chrome"));
            caps.insert(
                "goog:chromeOptions".to_string(),
                json!({
                    "args": args,
                    "prefs": { "intl.accept_languages": network.accept_language },
                }),
            );
        }
    }

    caps
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn renderer_config(browser: Browser, headless: bool) -> RendererConfig {
        RendererConfig {
            endpoint: "http://localhost:4444".to_string(),
            token: None,
            browser,
            headless,
            settle_time_ms: 0,
            page_timeout_secs: 5,
        }
    }

    #[test]
    fn test_session_url_appends_token() {
        let url = session_url("wss://grid.example.net/webdriver", Some("s3cret")).unwrap();
        assert_eq!(url.as_str(), "wss://grid.example.net/webdriver?token=s3cret");
    }

    #[test]
    fn test_session_url_without_token() {
        let url = session_url("http://localhost:4444", None).unwrap();
        assert_eq!(url.query(), None);
        let url = session_url("http://localhost:4444", Some("")).unwrap();
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_session_url_rejects_garbage() {
        assert!(session_url("not a url", None).is_err());
    }

    #[test]
    fn test_firefox_capabilities() {
        let network = NetworkConfig::default();
        let caps = capabilities(&renderer_config(Browser::Firefox, true), &network);

        assert_eq!(caps["browserName"], "firefox");
        let options = &caps["moz:firefoxOptions"];
        assert_eq!(options["args"], json!(["-headless"]));
        assert_eq!(
            options["prefs"]["general.useragent.override"],
            json!(network.user_agent)
        );
        assert_eq!(
            options["prefs"]["intl.accept_languages"],
            json!(network.accept_language)
        );
    }

    #[test]
    fn test_chrome_capabilities_headed() {
        let network = NetworkConfig::default();
        let caps = capabilities(&renderer_config(Browser::Chrome, false), &network);

        assert_eq!(caps["browserName"], "chrome");
        let args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        let user_agent = format!("--user-agent={}", network.user_agent);
        assert!(args.iter().any(|a| a.as_str() == Some(user_agent.as_str())));
        assert!(!args.iter().any(|a| a == "--headless=new"));
    }

    fn value(value: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "value": value }))
    }

    /// A WebDriver server with one session whose home window is `home` and
    /// whose new tab is `tab1`
    async fn webdriver() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/session"))
            .respond_with(value(json!({ "sessionId": "s1", "capabilities": {} })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/session/s1/window"))
            .respond_with(value(json!("home")))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/session/s1/window/new"))
            .respond_with(value(json!({ "handle": "tab1", "type": "tab" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/session/s1/window/handles"))
            .respond_with(value(json!(["home", "tab1"])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/session/s1/url"))
            .respond_with(value(json!("about:blank")))
            .mount(&server)
            .await;
        server
    }

    async fn connect(server: &MockServer) -> WebDriverRenderer {
        let mut config = renderer_config(Browser::Firefox, true);
        config.endpoint = server.uri();
        WebDriverRenderer::connect(&config, &NetworkConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_render_returns_source_and_closes_tab() {
        let server = webdriver().await;
        Mock::given(method("POST"))
            .and(path("/session/s1/window"))
            .respond_with(value(Value::Null))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/session/s1/url"))
            .respond_with(value(Value::Null))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/session/s1/source"))
            .respond_with(value(json!("<p>hola</p>")))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/session/s1/window"))
            .respond_with(value(json!(["home"])))
            .expect(1)
            .mount(&server)
            .await;

        let renderer = connect(&server).await;
        let html = renderer
            .render(&Url::parse("https://www.example.org/es").unwrap())
            .await
            .unwrap();

        assert_eq!(html, "<p>hola</p>");
    }

    #[tokio::test]
    async fn test_tab_closed_when_switching_to_it_fails() {
        let server = webdriver().await;
        Mock::given(method("POST"))
            .and(path("/session/s1/window"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "value": { "error": "no such window", "message": "gone", "stacktrace": "" }
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/session/s1/window"))
            .respond_with(value(Value::Null))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/session/s1/url"))
            .respond_with(value(Value::Null))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/session/s1/window"))
            .respond_with(value(json!(["home"])))
            .expect(1)
            .mount(&server)
            .await;

        let renderer = connect(&server).await;
        let err = renderer
            .render(&Url::parse("https://www.example.org/es").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, NavigationError::Engine(_)), "{err}");
    }
}

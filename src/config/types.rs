use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Langmirror
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    pub output: OutputConfig,
    pub renderer: RendererConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub sitemap: SitemapConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

/// The site being mirrored and where the copy is served
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Origin of the source site (e.g., "https://www.example.org")
    #[serde(rename = "source-origin")]
    pub source_origin: String,

    /// Language code, also the first path segment of in-language pages
    pub language: String,

    /// Origin substituted for the source origin in the copy
    #[serde(rename = "mirror-origin")]
    pub mirror_origin: String,
}

impl SiteConfig {
    /// Source origin without a trailing slash
    pub fn source_origin_trimmed(&self) -> &str {
        self.source_origin.trim_end_matches('/')
    }

    /// Mirror origin without a trailing slash
    pub fn mirror_origin_trimmed(&self) -> &str {
        self.mirror_origin.trim_end_matches('/')
    }

    /// Path prefix of in-language pages, e.g. "/es"
    pub fn language_prefix(&self) -> String {
        format!("/{}", self.language)
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory the mirrored pages are written under
    #[serde(rename = "root-dir")]
    pub root_dir: PathBuf,

    /// Path to the SQLite frontier database
    #[serde(rename = "database-path")]
    pub database_path: PathBuf,

    /// Name of the shared asset directory below `root-dir`
    #[serde(rename = "assets-dir", default = "default_assets_dir")]
    pub assets_dir: String,
}

impl OutputConfig {
    pub fn assets_path(&self) -> PathBuf {
        self.root_dir.join(&self.assets_dir)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.root_dir.join(".cache")
    }
}

/// Browser engine selection for the WebDriver session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    Firefox,
    Chrome,
}

impl std::fmt::Display for Browser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Browser::Firefox => write!(f, "firefox"),
            Browser::Chrome => write!(f, "chrome"),
        }
    }
}

/// WebDriver renderer configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RendererConfig {
    /// WebDriver endpoint (e.g., "http://localhost:4444")
    pub endpoint: String,

    /// Access token appended to the endpoint as a `token` query parameter
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default = "default_browser")]
    pub browser: Browser,

    #[serde(default = "default_true")]
    pub headless: bool,

    /// Time to let client-side rendering settle after load (milliseconds)
    #[serde(rename = "settle-time-ms", default = "default_settle_time_ms")]
    pub settle_time_ms: u64,

    /// Upper bound for one navigation, settle included (seconds)
    #[serde(rename = "page-timeout-secs", default = "default_page_timeout_secs")]
    pub page_timeout_secs: u64,
}

/// Network settings for asset and sitemap downloads
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    #[serde(rename = "accept-language", default = "default_accept_language")]
    pub accept_language: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
        }
    }
}

/// Retry policy for page rendering
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay, doubled per attempt (milliseconds)
    #[serde(rename = "backoff-base-ms", default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound of the random jitter added to each delay (milliseconds)
    #[serde(rename = "max-jitter-ms", default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            max_jitter_ms: default_max_jitter_ms(),
        }
    }
}

/// Asset classification and naming
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetsConfig {
    /// Hosts whose URLs are always assets (supports "*.example.com")
    #[serde(rename = "cdn-hosts", default)]
    pub cdn_hosts: Vec<String>,

    /// Origin prefixes tried, in order, when a stylesheet resource fails
    #[serde(rename = "fallback-origins", default)]
    pub fallback_origins: Vec<String>,

    /// Fixed local names for filenames that change across site versions
    #[serde(rename = "canonical-names", default)]
    pub canonical_names: Vec<CanonicalName>,
}

/// Maps every basename starting with `prefix` to the fixed `name`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CanonicalName {
    pub prefix: String,
    pub name: String,
}

/// Sitemap seeding
#[derive(Debug, Clone, Deserialize)]
pub struct SitemapConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(rename = "max-age-hours", default = "default_max_age_hours")]
    pub max_age_hours: u64,
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_age_hours: default_max_age_hours(),
        }
    }
}

/// Cosmetic document cleanup
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CleanupConfig {
    /// CSS selectors of interstitial elements removed from every page
    #[serde(rename = "remove-selectors", default)]
    pub remove_selectors: Vec<String>,
}

fn default_assets_dir() -> String {
    "assets".to_string()
}

fn default_browser() -> Browser {
    Browser::Firefox
}

fn default_true() -> bool {
    true
}

fn default_settle_time_ms() -> u64 {
    3000
}

fn default_page_timeout_secs() -> u64 {
    90
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_accept_language() -> String {
    "en-GB,en;q=0.9".to_string()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_max_jitter_ms() -> u64 {
    1000
}

fn default_max_age_hours() -> u64 {
    24
}

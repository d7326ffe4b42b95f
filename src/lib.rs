//! Langmirror: a language-scoped static site mirror
//!
//! This crate discovers every page of one language section of a website,
//! renders it through a WebDriver browser session, rewrites links and embedded
//! resources so the copy is self-hosting under a different origin, and
//! downloads the referenced assets exactly once.

pub mod config;
pub mod crawler;
pub mod mirror;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Langmirror operations
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Frontier error: {0}")]
    Frontier(#[from] storage::FrontierError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Renderer error: {0}")]
    Renderer(String),

    #[error("Mirror run interrupted")]
    Interrupted,

    #[error("Cannot process markup: {0}")]
    Markup(#[from] lol_html::errors::RewritingError),

    #[error("Failed to persist page: {0}")]
    Persist(#[from] PersistError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Failure to write a transformed page to disk
///
/// Fatal to the page being persisted, never to the run.
#[derive(Debug, Error)]
#[error("cannot write {}: {source}", .path.display())]
pub struct PersistError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Result type alias for Langmirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use state::{FrontierState, PageStage};
pub use crate::url::{matches_wildcard, normalize_url};

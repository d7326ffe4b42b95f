//! Configuration module for Langmirror
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use langmirror::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("mirror.toml")).unwrap();
//! println!("Mirroring language: {}", config.site.language);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AssetsConfig, Browser, CanonicalName, CleanupConfig, Config, NetworkConfig, OutputConfig,
    RendererConfig, RetryConfig, SiteConfig, SitemapConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};

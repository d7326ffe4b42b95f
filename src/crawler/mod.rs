//! Crawler module for rendering and mirroring pages
//!
//! This module contains the core mirroring logic, including:
//! - Browser rendering through WebDriver
//! - Bounded retry with backoff
//! - Sitemap seeding
//! - Overall run coordination

mod coordinator;
mod renderer;
mod retry;
mod sitemap;

pub use coordinator::{Coordinator, CrawlSummary};
pub use renderer::{NavigationError, Renderer, WebDriverRenderer};
pub use retry::{Backoff, RetryOutcome, RetryPolicy};
pub use sitemap::{parse_locations, SitemapSource};

use crate::config::Config;
use crate::mirror::build_http_client;
use crate::storage::open_frontier;
use crate::MirrorError;

/// Per-invocation choices that are not part of the configuration file
#[derive(Debug, Clone, Default)]
pub struct MirrorOptions {
    /// URLs processed before anything already queued, in the order given
    pub seeds: Vec<String>,
    /// Seed only the language root, without reading the sitemap
    pub skip_sitemap: bool,
}

/// Runs a complete mirror operation
///
/// This is the main entry point for a run. It will:
/// 1. Open the frontier store (the only failure that aborts a run)
/// 2. Start the browser session
/// 3. Seed the frontier from the sitemap and the given seeds
/// 4. Process pages until the frontier is drained or Ctrl-C is pressed
/// 5. Close the browser session
///
/// # Arguments
///
/// * `config` - The mirror configuration
/// * `config_hash` - Hash of the configuration file, recorded with the run
/// * `options` - Extra seeds and sitemap switch from the command line
pub async fn mirror(
    config: Config,
    config_hash: &str,
    options: MirrorOptions,
) -> Result<CrawlSummary, MirrorError> {
    let frontier = open_frontier(&config.output.database_path)?;
    let client = build_http_client(&config.network)?;
    let renderer = WebDriverRenderer::connect(&config.renderer, &config.network).await?;

    let span = tracing::info_span!("mirror", language = %config.site.language);
    let mut coordinator = Coordinator::new(
        &config,
        config_hash,
        frontier,
        renderer,
        client.clone(),
        span,
    )?;

    let language = &config.site.language;
    let mut seeds = vec![format!(
        "{}/{}/",
        config.site.source_origin_trimmed(),
        language
    )];

    if config.sitemap.enabled && !options.skip_sitemap {
        match SitemapSource::new(client, &config)
            .list_seed_urls(language)
            .await
        {
            Ok(listed) => seeds = listed,
            Err(e) => {
                tracing::warn!(error = %e, "Sitemap unavailable, seeding the language root only")
            }
        }
    }

    coordinator.seed(&seeds)?;

    // Each priority insert goes ahead of the previous one
    for seed in options.seeds.iter().rev() {
        if let Err(e) = coordinator.seed_priority(seed) {
            tracing::warn!(url = %seed, error = %e, "Skipping seed");
        }
    }

    let finished = tokio::select! {
        result = coordinator.run() => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    let result = match finished {
        Some(result) => result,
        None => {
            tracing::warn!("Interrupted, pending pages will be resumed on the next run");
            coordinator.mark_interrupted()?;
            Err(MirrorError::Interrupted)
        }
    };

    if let Err(e) = coordinator.shutdown().await {
        tracing::warn!(error = %e, "Cannot close the browser session");
    }

    result
}

//! Mirror coordinator - main orchestration logic
//!
//! This module contains the loop that drives a mirror run:
//! - Recovering state left by an interrupted process
//! - Seeding the frontier
//! - Rendering each page with bounded retries
//! - Transforming, persisting and recording the outcome
//! - Feeding discovered links back into the frontier

use crate::config::Config;
use crate::crawler::renderer::Renderer;
use crate::crawler::retry::{RetryOutcome, RetryPolicy};
use crate::mirror::PagePipeline;
use crate::state::{FrontierState, PageStage};
use crate::storage::{Frontier, RunStatus, SqliteFrontier};
use crate::url::normalize_url;
use crate::MirrorError;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{Instrument, Span};
use url::Url;

/// Totals for one run, logged when the frontier is drained
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub pages_persisted: u64,
    pub pages_abandoned: u64,
    /// Links that became new frontier entries
    pub links_discovered: u64,
    pub assets_fetched: u64,
    pub assets_failed: u64,
    pub duration: Duration,
}

/// Main mirror coordinator structure
///
/// Processes one URL at a time: nothing is dequeued before the previous page
/// has been persisted or abandoned.
pub struct Coordinator<R: Renderer> {
    frontier: SqliteFrontier,
    renderer: R,
    pipeline: PagePipeline,
    retry: RetryPolicy,
    run_id: i64,
    span: Span,
}

impl<R: Renderer> Coordinator<R> {
    /// Creates a new coordinator instance
    ///
    /// Claims left by a killed process are released and a run that was still
    /// marked running is recorded as interrupted before the new run starts.
    ///
    /// # Arguments
    ///
    /// * `config` - The mirror configuration
    /// * `config_hash` - Hash of the configuration file, stored with the run
    /// * `frontier` - The opened frontier store
    /// * `renderer` - Browser session used for every page
    /// * `client` - HTTP client for asset downloads
    /// * `span` - Parent span for every page processed
    pub fn new(
        config: &Config,
        config_hash: &str,
        mut frontier: SqliteFrontier,
        renderer: R,
        client: Client,
        span: Span,
    ) -> Result<Self, MirrorError> {
        let released = frontier.release_claims()?;
        if released > 0 {
            tracing::info!(parent: &span, released, "Released claims from an interrupted run");
        }

        if let Some(previous) = frontier.get_latest_run()? {
            if previous.status == RunStatus::Running {
                tracing::info!(parent: &span, run_id = previous.id, "Previous run was interrupted");
                frontier.update_run_status(previous.id, RunStatus::Interrupted)?;
            }
        }

        let run_id = frontier.create_run(config_hash)?;
        let pipeline = PagePipeline::new(config, client)?;

        Ok(Self {
            frontier,
            renderer,
            pipeline,
            retry: RetryPolicy::from_config(&config.retry),
            run_id,
            span,
        })
    }

    /// Replaces the retry policy built from the configuration
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    pub fn frontier(&self) -> &SqliteFrontier {
        &self.frontier
    }

    /// Queues URLs in the order given, skipping known and malformed ones
    ///
    /// Returns how many became new frontier entries.
    pub fn seed(&mut self, urls: &[String]) -> Result<usize, MirrorError> {
        let normalized: Vec<String> = urls
            .iter()
            .filter_map(|url| match normalize_url(url) {
                Ok(normalized) => Some(normalized.to_string()),
                Err(e) => {
                    tracing::warn!(parent: &self.span, url = %url, error = %e, "Skipping seed");
                    None
                }
            })
            .collect();

        let inserted = self.frontier.enqueue_many(&normalized)?;
        tracing::info!(parent: &self.span, seeds = urls.len(), inserted, "Frontier seeded");
        Ok(inserted)
    }

    /// Queues a URL ahead of everything already pending
    ///
    /// Returns `false` when the URL was already mirrored or abandoned.
    pub fn seed_priority(&mut self, url: &str) -> Result<bool, MirrorError> {
        let normalized = normalize_url(url)?;
        let bumped = self.frontier.insert_priority(normalized.as_str())?;
        if !bumped {
            tracing::info!(parent: &self.span, url = %normalized, "Already processed, not requeued");
        }
        Ok(bumped)
    }

    /// Runs the main mirror loop until the frontier is drained
    ///
    /// Page failures are recorded on the frontier and never end the run. Only
    /// a frontier that can no longer be read stops it, with the run marked
    /// failed.
    pub async fn run(&mut self) -> Result<CrawlSummary, MirrorError> {
        tracing::info!(parent: &self.span, run_id = self.run_id, "Starting mirror run");

        let started = Instant::now();
        let mut summary = CrawlSummary::default();
        let mut processed: u64 = 0;

        loop {
            let entry = match self.frontier.dequeue_next() {
                Ok(Some(entry)) => entry,
                Ok(None) => {
                    tracing::info!(parent: &self.span, "Frontier is empty, run complete");
                    break;
                }
                Err(e) => {
                    tracing::error!(parent: &self.span, error = %e, "Cannot read the frontier");
                    if let Err(status_err) =
                        self.frontier.update_run_status(self.run_id, RunStatus::Failed)
                    {
                        tracing::warn!(parent: &self.span, error = %status_err, "Cannot record run failure");
                    }
                    return Err(e.into());
                }
            };

            let page_span = tracing::info_span!(parent: &self.span, "page", url = %entry.url);
            self.process_url(&entry.url, &mut summary)
                .instrument(page_span)
                .await;

            processed += 1;

            // Progress reporting every 10 pages
            if processed % 10 == 0 {
                let rate = processed as f64 / started.elapsed().as_secs_f64().max(0.001);
                let pending = self
                    .frontier
                    .count_by_state(FrontierState::Pending)
                    .unwrap_or_default();
                tracing::info!(
                    parent: &self.span,
                    processed,
                    pending,
                    rate,
                    "Progress"
                );
            }
        }

        summary.duration = started.elapsed();
        self.frontier.complete_run(self.run_id)?;

        tracing::info!(
            parent: &self.span,
            pages_persisted = summary.pages_persisted,
            pages_abandoned = summary.pages_abandoned,
            links_discovered = summary.links_discovered,
            assets_fetched = summary.assets_fetched,
            assets_failed = summary.assets_failed,
            duration = ?summary.duration,
            "Mirror run finished"
        );

        Ok(summary)
    }

    /// Records that the run stopped before the frontier was drained
    pub fn mark_interrupted(&mut self) -> Result<(), MirrorError> {
        self.frontier
            .update_run_status(self.run_id, RunStatus::Interrupted)?;
        Ok(())
    }

    /// Ends the browser session
    pub async fn shutdown(self) -> Result<(), MirrorError> {
        self.renderer
            .shutdown()
            .await
            .map_err(|e| MirrorError::Renderer(e.to_string()))
    }

    /// Takes one URL through every stage
    async fn process_url(&mut self, url: &str, summary: &mut CrawlSummary) {
        let mut stage = PageStage::Pending;

        let page_url = match Url::parse(url) {
            Ok(page_url) => page_url,
            Err(e) => {
                self.record_failure(url, &format!("invalid URL: {}", e), stage, summary);
                return;
            }
        };

        stage = stage.advance();
        tracing::debug!(stage = %stage, "Rendering page");

        let renderer = &self.renderer;
        let target = &page_url;
        let outcome = self.retry.run(move |_| renderer.render(target)).await;
        let html = match outcome {
            RetryOutcome::Ok { value, attempts } => {
                if attempts > 1 {
                    tracing::info!(attempts, "Rendered after retrying");
                }
                value
            }
            RetryOutcome::Exhausted { ref errors } => {
                let reason = outcome
                    .last_error()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "no attempt made".to_string());
                let reason = format!("gave up after {} attempts: {}", errors.len(), reason);
                self.record_failure(url, &reason, stage, summary);
                return;
            }
        };

        stage = stage.advance();
        tracing::debug!(stage = %stage, "Transforming page");

        let page = match self.pipeline.transform(&page_url, &html).await {
            Ok(page) => page,
            Err(e) => {
                self.record_failure(url, &e.to_string(), stage, summary);
                return;
            }
        };
        summary.assets_fetched += page.tally.fetched as u64;
        summary.assets_failed += page.tally.failed as u64;

        if let Err(e) = self.pipeline.persist(&page).await {
            self.record_failure(url, &e.to_string(), stage, summary);
            return;
        }

        match self.frontier.enqueue_many(&page.discovered_links) {
            Ok(inserted) => summary.links_discovered += inserted as u64,
            Err(e) => tracing::error!(error = %e, "Cannot queue discovered links"),
        }

        if let Err(e) = self.frontier.mark_done(url) {
            tracing::error!(error = %e, "Cannot mark page done");
        }

        stage = stage.advance();
        summary.pages_persisted += 1;
        tracing::info!(
            stage = %stage,
            path = %page.local_path.display(),
            links = page.discovered_links.len(),
            assets = page.embedded_assets.len(),
            video = page.has_video,
            "Page mirrored"
        );
    }

    fn record_failure(
        &mut self,
        url: &str,
        reason: &str,
        stage: PageStage,
        summary: &mut CrawlSummary,
    ) {
        let stage = stage.abandon();
        summary.pages_abandoned += 1;
        tracing::warn!(stage = %stage, reason = %reason, "Page abandoned");

        if let Err(e) = self.frontier.mark_failed(url, reason) {
            tracing::error!(error = %e, "Cannot mark page failed");
        }
    }
}

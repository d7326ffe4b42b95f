//! Frontier trait and error types
//!
//! This module defines the trait interface for frontier backends and
//! associated error types.

use crate::state::FrontierState;
use crate::storage::{FrontierEntry, RunRecord, RunStatus};
use thiserror::Error;

/// Errors that can occur during frontier operations
#[derive(Debug, Error)]
pub enum FrontierError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Frontier entry not found: {0}")]
    EntryNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Invalid state transition for {url}: {from} -> {to}")]
    InvalidTransition {
        url: String,
        from: FrontierState,
        to: FrontierState,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for frontier operations
pub type FrontierResult<T> = Result<T, FrontierError>;

/// Persistent, deduplicated work queue of URLs to mirror
///
/// Entries are keyed by normalized URL and never deleted. Their state only
/// moves from pending to done or failed.
pub trait Frontier {
    // ===== Queue =====

    /// Adds a URL as pending
    ///
    /// Returns `false` without touching the existing row when the URL is
    /// already known, whatever its state.
    fn enqueue(&mut self, url: &str) -> FrontierResult<bool>;

    /// Enqueues every URL, returning how many were new
    fn enqueue_many(&mut self, urls: &[String]) -> FrontierResult<usize> {
        let mut inserted = 0;
        for url in urls {
            if self.enqueue(url)? {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    /// Claims the next pending entry
    ///
    /// Highest priority first, then smallest sequence id. Selection and claim
    /// happen in one transaction so a claimed entry is never handed out twice.
    fn dequeue_next(&mut self) -> FrontierResult<Option<FrontierEntry>>;

    /// Queues a URL ahead of everything queued before it
    ///
    /// Inserts the URL or raises the priority of its pending entry. Returns
    /// `false` when the entry is already done or failed; it stays untouched.
    fn insert_priority(&mut self, url: &str) -> FrontierResult<bool>;

    /// Moves a pending entry to done
    fn mark_done(&mut self, url: &str) -> FrontierResult<()>;

    /// Moves a pending entry to failed, recording why
    fn mark_failed(&mut self, url: &str, reason: &str) -> FrontierResult<()>;

    /// Releases claims left behind by an interrupted process
    fn release_claims(&mut self) -> FrontierResult<usize>;

    // ===== Queries =====

    fn get_entry(&self, url: &str) -> FrontierResult<Option<FrontierEntry>>;

    fn count_by_state(&self, state: FrontierState) -> FrontierResult<u64>;

    fn count_total(&self) -> FrontierResult<u64>;

    /// Failed entries, most recent first
    fn get_failed(&self, limit: usize) -> FrontierResult<Vec<FrontierEntry>>;

    // ===== Run Management =====

    /// Creates a new run and returns its ID
    fn create_run(&mut self, config_hash: &str) -> FrontierResult<i64>;

    fn get_latest_run(&self) -> FrontierResult<Option<RunRecord>>;

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> FrontierResult<()>;

    /// Marks a run as completed with a finish timestamp
    fn complete_run(&mut self, run_id: i64) -> FrontierResult<()>;
}

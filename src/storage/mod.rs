//! Storage module for the crawl frontier
//!
//! This module handles all database operations for the mirror, including:
//! - SQLite database initialization and schema management
//! - The persistent, deduplicated frontier of discovered URLs
//! - Atomic dequeue-and-claim of the next URL
//! - Run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteFrontier;
pub use traits::{Frontier, FrontierError, FrontierResult};

use crate::state::FrontierState;
use crate::MirrorError;

use std::path::Path;

/// Opens (creating if needed) the frontier database
///
/// Failure here is the only error that aborts a run before any work begins.
pub fn open_frontier(path: &Path) -> Result<SqliteFrontier, MirrorError> {
    SqliteFrontier::new(path)
}

/// Represents one URL in the frontier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    /// Monotonic insertion order
    pub sequence_id: i64,
    pub url: String,
    pub state: FrontierState,
    /// Higher values are dequeued first; zero for ordinary discoveries
    pub priority: i64,
    pub discovered_at: String,
    pub error_message: Option<String>,
}

/// Represents a mirror run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a mirror run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

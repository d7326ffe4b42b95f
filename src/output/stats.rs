//! Statistics generation from the frontier database
//!
//! This module provides functionality for extracting and displaying
//! mirror progress from the frontier store.

use crate::state::FrontierState;
use crate::storage::{Frontier, FrontierEntry, RunRecord};
use crate::MirrorError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// How many failed URLs the report lists
pub const RECENT_FAILURES: usize = 10;

/// Mirror statistics summary
#[derive(Debug, Clone)]
pub struct MirrorStatistics {
    /// Total number of URLs ever discovered
    pub total_entries: u64,

    /// Count of entries by state
    pub entries_by_state: HashMap<FrontierState, u64>,

    /// Most recent run, if any
    pub latest_run: Option<RunRecord>,

    /// Latest failures with their reasons
    pub recent_failures: Vec<FrontierEntry>,
}

impl MirrorStatistics {
    pub fn count(&self, state: FrontierState) -> u64 {
        self.entries_by_state.get(&state).copied().unwrap_or(0)
    }

    /// Wall-clock seconds of the latest run, once it has finished
    pub fn latest_run_seconds(&self) -> Option<i64> {
        let run = self.latest_run.as_ref()?;
        let started = run.started_at.parse::<DateTime<Utc>>().ok()?;
        let finished = run.finished_at.as_deref()?.parse::<DateTime<Utc>>().ok()?;
        Some((finished - started).num_seconds())
    }
}

/// Loads statistics from the frontier
///
/// # Arguments
///
/// * `frontier` - The frontier store to query
///
/// # Returns
///
/// * `Ok(MirrorStatistics)` - Successfully loaded statistics
/// * `Err(MirrorError)` - Failed to query statistics
pub fn load_statistics(frontier: &dyn Frontier) -> Result<MirrorStatistics, MirrorError> {
    let total_entries = frontier.count_total()?;

    let mut entries_by_state = HashMap::new();
    for state in FrontierState::all_states() {
        entries_by_state.insert(state, frontier.count_by_state(state)?);
    }

    Ok(MirrorStatistics {
        total_entries,
        entries_by_state,
        latest_run: frontier.get_latest_run()?,
        recent_failures: frontier.get_failed(RECENT_FAILURES)?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &MirrorStatistics) {
    println!("=== Mirror Statistics ===\n");

    println!("Frontier:");
    println!("  Total URLs discovered: {}", stats.total_entries);
    for state in FrontierState::all_states() {
        let count = stats.count(state);
        let percentage = if stats.total_entries > 0 {
            (count as f64 / stats.total_entries as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", state, count, percentage);
    }
    println!();

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run:");
            println!("  Id: {}", run.id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            if let Some(seconds) = stats.latest_run_seconds() {
                println!("  Duration: {}s", seconds);
            }
            println!("  Config hash: {}", run.config_hash);
        }
        None => println!("No runs recorded yet"),
    }
    println!();

    if !stats.recent_failures.is_empty() {
        println!("Recent Failures:");
        for entry in &stats.recent_failures {
            println!(
                "  - {}: {}",
                entry.url,
                entry.error_message.as_deref().unwrap_or("unknown")
            );
        }
        println!();
    }
}

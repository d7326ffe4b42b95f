//! SQLite frontier implementation
//!
//! This module provides a SQLite-based implementation of the Frontier trait.

use crate::state::FrontierState;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Frontier, FrontierError, FrontierResult};
use crate::storage::{FrontierEntry, RunRecord, RunStatus};
use crate::MirrorError;
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;

const ENTRY_COLUMNS: &str = "id, url, state, priority, discovered_at, error_message";

/// SQLite frontier backend
pub struct SqliteFrontier {
    conn: Connection,
}

impl SqliteFrontier {
    /// Opens or creates the frontier database
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteFrontier)` - Successfully opened/created database
    /// * `Err(MirrorError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, MirrorError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, MirrorError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Finishes a pending entry, refusing any other transition
    fn finish(
        &mut self,
        url: &str,
        target: FrontierState,
        reason: Option<&str>,
    ) -> FrontierResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current: Option<String> = tx
            .query_row(
                "SELECT state FROM frontier WHERE url = ?1",
                params![url],
                |row| row.get(0),
            )
            .optional()?;

        let current = current.ok_or_else(|| FrontierError::EntryNotFound(url.to_string()))?;
        let current = parse_state(&current)?;

        if !current.can_transition_to(target) {
            return Err(FrontierError::InvalidTransition {
                url: url.to_string(),
                from: current,
                to: target,
            });
        }

        tx.execute(
            "UPDATE frontier
             SET state = ?1, finished_at = ?2, error_message = ?3, claimed_at = NULL
             WHERE url = ?4",
            params![target.to_db_string(), Utc::now().to_rfc3339(), reason, url],
        )?;
        tx.commit()?;

        Ok(())
    }
}

fn parse_state(s: &str) -> FrontierResult<FrontierState> {
    FrontierState::from_db_string(s)
        .ok_or_else(|| FrontierError::Database(format!("unknown frontier state '{}'", s)))
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<FrontierEntry> {
    let state: String = row.get(2)?;
    let state = FrontierState::from_db_string(&state).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(2, "state".to_string(), Type::Text)
    })?;

    Ok(FrontierEntry {
        sequence_id: row.get(0)?,
        url: row.get(1)?,
        state,
        priority: row.get(3)?,
        discovered_at: row.get(4)?,
        error_message: row.get(5)?,
    })
}

fn row_to_run(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
    })
}

impl Frontier for SqliteFrontier {
    // ===== Queue =====

    fn enqueue(&mut self, url: &str) -> FrontierResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO frontier (url, state, priority, discovered_at)
             VALUES (?1, ?2, 0, ?3)",
            params![
                url,
                FrontierState::Pending.to_db_string(),
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(inserted > 0)
    }

    fn enqueue_many(&mut self, urls: &[String]) -> FrontierResult<usize> {
        let tx = self.conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO frontier (url, state, priority, discovered_at)
                 VALUES (?1, ?2, 0, ?3)",
            )?;
            for url in urls {
                inserted += stmt.execute(params![
                    url,
                    FrontierState::Pending.to_db_string(),
                    now
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn dequeue_next(&mut self) -> FrontierResult<Option<FrontierEntry>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let entry = tx
            .query_row(
                &format!(
                    "SELECT {} FROM frontier
                     WHERE state = ?1 AND claimed_at IS NULL
                     ORDER BY priority DESC, id ASC
                     LIMIT 1",
                    ENTRY_COLUMNS
                ),
                params![FrontierState::Pending.to_db_string()],
                row_to_entry,
            )
            .optional()?;

        let Some(entry) = entry else {
            return Ok(None);
        };

        tx.execute(
            "UPDATE frontier SET claimed_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), entry.sequence_id],
        )?;
        tx.commit()?;

        Ok(Some(entry))
    }

    fn insert_priority(&mut self, url: &str) -> FrontierResult<bool> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let top: i64 = tx.query_row(
            "SELECT COALESCE(MAX(priority), 0) FROM frontier",
            [],
            |row| row.get(0),
        )?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT state FROM frontier WHERE url = ?1",
                params![url],
                |row| row.get(0),
            )
            .optional()?;

        let queued = match existing {
            None => {
                tx.execute(
                    "INSERT INTO frontier (url, state, priority, discovered_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        url,
                        FrontierState::Pending.to_db_string(),
                        top + 1,
                        Utc::now().to_rfc3339()
                    ],
                )?;
                true
            }
            Some(state) if parse_state(&state)? == FrontierState::Pending => {
                tx.execute(
                    "UPDATE frontier SET priority = ?1 WHERE url = ?2",
                    params![top + 1, url],
                )?;
                true
            }
            Some(_) => false,
        };

        tx.commit()?;
        Ok(queued)
    }

    fn mark_done(&mut self, url: &str) -> FrontierResult<()> {
        self.finish(url, FrontierState::Done, None)
    }

    fn mark_failed(&mut self, url: &str, reason: &str) -> FrontierResult<()> {
        self.finish(url, FrontierState::Failed, Some(reason))
    }

    fn release_claims(&mut self) -> FrontierResult<usize> {
        let released = self.conn.execute(
            "UPDATE frontier SET claimed_at = NULL WHERE state = ?1 AND claimed_at IS NOT NULL",
            params![FrontierState::Pending.to_db_string()],
        )?;
        Ok(released)
    }

    // ===== Queries =====

    fn get_entry(&self, url: &str) -> FrontierResult<Option<FrontierEntry>> {
        let entry = self
            .conn
            .query_row(
                &format!("SELECT {} FROM frontier WHERE url = ?1", ENTRY_COLUMNS),
                params![url],
                row_to_entry,
            )
            .optional()?;

        Ok(entry)
    }

    fn count_by_state(&self, state: FrontierState) -> FrontierResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM frontier WHERE state = ?1",
            params![state.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_total(&self) -> FrontierResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM frontier", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn get_failed(&self, limit: usize) -> FrontierResult<Vec<FrontierEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM frontier WHERE state = ?1 ORDER BY finished_at DESC, id DESC LIMIT ?2",
            ENTRY_COLUMNS
        ))?;

        let entries = stmt
            .query_map(
                params![FrontierState::Failed.to_db_string(), limit as i64],
                row_to_entry,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> FrontierResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_latest_run(&self) -> FrontierResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                row_to_run,
            )
            .optional()?;

        Ok(run)
    }

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> FrontierResult<()> {
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1 WHERE id = ?2",
            params![status.to_db_string(), run_id],
        )?;
        if updated == 0 {
            return Err(FrontierError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn complete_run(&mut self, run_id: i64) -> FrontierResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![RunStatus::Completed.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(FrontierError::RunNotFound(run_id));
        }
        Ok(())
    }
}

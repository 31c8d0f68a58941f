//! Sync run log.
//!
//! Every `sync` invocation records a row in `sync_runs` when it starts and
//! updates it with the terminal outcome when it ends.

use rusqlite::{Connection, OptionalExtension, Result};
use serde::Serialize;

/// Terminal (or in-flight) state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

impl RunStatus {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "success" => Self::Success,
            "failed" => Self::Failed,
            _ => Self::Running,
        }
    }
}

/// A recorded sync run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncRun {
    pub id: String,
    pub status: RunStatus,
    pub error: Option<String>,
    /// JSON-encoded sync report.
    pub stats: Option<String>,
    pub started_at: i64,
    pub finished_at: Option<i64>,
}

/// Record the start of a run and return its id.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn start_run(conn: &Connection) -> Result<String> {
    let id = uuid::Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO sync_runs (id, status, started_at) VALUES (?1, 'running', ?2)",
        rusqlite::params![id, chrono::Utc::now().timestamp_millis()],
    )?;
    Ok(id)
}

/// Record the terminal outcome of a run.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn finish_run(
    conn: &Connection,
    id: &str,
    status: RunStatus,
    error: Option<&str>,
    stats: Option<&str>,
) -> Result<()> {
    conn.execute(
        "UPDATE sync_runs SET status = ?2, error = ?3, stats = ?4, finished_at = ?5 WHERE id = ?1",
        rusqlite::params![
            id,
            status.as_str(),
            error,
            stats,
            chrono::Utc::now().timestamp_millis()
        ],
    )?;
    Ok(())
}

/// Most recent runs first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_runs(conn: &Connection, limit: u32) -> Result<Vec<SyncRun>> {
    let mut stmt = conn.prepare(
        "SELECT id, status, error, stats, started_at, finished_at
         FROM sync_runs
         ORDER BY started_at DESC, rowid DESC
         LIMIT ?1",
    )?;

    let rows = stmt.query_map([limit], map_run_row)?;
    rows.collect()
}

/// The latest run that finished successfully, if any.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn last_success(conn: &Connection) -> Result<Option<SyncRun>> {
    conn.query_row(
        "SELECT id, status, error, stats, started_at, finished_at
         FROM sync_runs
         WHERE status = 'success'
         ORDER BY started_at DESC, rowid DESC
         LIMIT 1",
        [],
        map_run_row,
    )
    .optional()
}

fn map_run_row(row: &rusqlite::Row) -> Result<SyncRun> {
    Ok(SyncRun {
        id: row.get(0)?,
        status: RunStatus::parse(row.get::<_, String>(1)?.as_str()),
        error: row.get(2)?,
        stats: row.get(3)?,
        started_at: row.get(4)?,
        finished_at: row.get(5)?,
    })
}

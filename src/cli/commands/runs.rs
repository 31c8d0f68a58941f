//! Runs command implementation.

use crate::error::Result;
use crate::storage::{RunStatus, SqliteStorage, runs};
use colored::Colorize;
use std::path::PathBuf;

/// List recent sync runs, newest first.
///
/// # Errors
///
/// Returns an error if the database cannot be read.
pub fn execute(db_path: Option<&PathBuf>, limit: u32, json: bool) -> Result<()> {
    let db_path = super::db_path(db_path)?;

    let runs = if db_path.exists() {
        let storage = SqliteStorage::open(&db_path)?;
        runs::list_runs(storage.conn(), limit)?
    } else {
        Vec::new()
    };

    if json {
        let output = serde_json::json!({
            "count": runs.len(),
            "runs": runs,
        });
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!("No sync runs recorded.");
        return Ok(());
    }

    for run in &runs {
        let status = match run.status {
            RunStatus::Success => "success".green(),
            RunStatus::Failed => "failed ".red(),
            RunStatus::Running => "running".yellow(),
        };
        let duration = run
            .finished_at
            .map(|end| format!("{:.1}s", (end - run.started_at) as f64 / 1000.0))
            .unwrap_or_default();
        println!(
            "{status}  {}  {:>8}  {}",
            super::format_millis(run.started_at),
            duration,
            &run.id[..8]
        );
        if let Some(error) = &run.error {
            println!("         {error}");
        }
    }

    Ok(())
}

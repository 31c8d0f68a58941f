//! Status command implementation.

use crate::error::Result;
use crate::storage::{RunStatus, SqliteStorage, SyncRun, runs};
use crate::sync::Entity;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

/// Output for status command.
#[derive(Serialize)]
struct StatusOutput {
    db: String,
    initialized: bool,
    tables: Vec<TableInfo>,
    last_run: Option<SyncRun>,
    last_success: Option<SyncRun>,
}

#[derive(Serialize)]
struct TableInfo {
    entity: Entity,
    table: &'static str,
    /// `None` when the table has not been created yet.
    rows: Option<u64>,
}

/// Execute status command.
///
/// A database that does not exist yet is reported, not created.
///
/// # Errors
///
/// Returns an error if the database cannot be read.
pub fn execute(db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let db_path = super::db_path(db_path)?;

    let mut output = StatusOutput {
        db: db_path.display().to_string(),
        initialized: db_path.exists(),
        tables: Vec::new(),
        last_run: None,
        last_success: None,
    };

    if output.initialized {
        let storage = SqliteStorage::open(&db_path)?;
        for entity in Entity::ALL {
            output.tables.push(TableInfo {
                entity,
                table: entity.table(),
                rows: storage.row_count(entity.table())?,
            });
        }
        output.last_run = runs::list_runs(storage.conn(), 1)?.into_iter().next();
        output.last_success = runs::last_success(storage.conn())?;
    }

    if json {
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("{}", "Jira Mirror Status".bold());
    println!("==================");
    println!();
    println!("Database: {}", output.db);

    if !output.initialized {
        println!();
        println!("No mirror yet.");
        println!("Create one with: jmirror sync");
        return Ok(());
    }

    println!();
    for table in &output.tables {
        let rows = table
            .rows
            .map_or_else(|| "-".dimmed().to_string(), |n| n.to_string());
        println!("  {:<16} {rows:>8}", table.entity.to_string());
    }

    println!();
    match &output.last_run {
        Some(run) => {
            let status = match run.status {
                RunStatus::Success => "success".green(),
                RunStatus::Failed => "failed".red(),
                RunStatus::Running => "running".yellow(),
            };
            println!("Last run: {status} at {}", super::format_millis(run.started_at));
            if let Some(error) = &run.error {
                println!("  {}", error.red());
            }
        }
        None => println!("Last run: never"),
    }
    if let Some(run) = output
        .last_success
        .as_ref()
        .filter(|s| output.last_run.as_ref().is_some_and(|l| l.id != s.id))
    {
        println!(
            "Last success: {}",
            super::format_millis(run.finished_at.unwrap_or(run.started_at))
        );
    }

    Ok(())
}

//! Sync command implementation.
//!
//! Runs the mirror sync, records the outcome in the run log and sends one
//! notification when notifications are enabled.

use crate::cli::SyncArgs;
use crate::config::MirrorConfig;
use crate::error::{Error, Result};
use crate::notify::{Notification, RunOutcome, create_notifier};
use crate::remote::JiraClient;
use crate::storage::{RunStatus, SqliteStorage, runs};
use crate::sync::{Entity, SyncContext, SyncReport, run_sync};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Serialize)]
struct SyncOutput<'a> {
    success: bool,
    run_id: &'a str,
    db: String,
    report: &'a SyncReport,
}

/// Execute the sync command.
///
/// # Errors
///
/// Returns config and store errors raised before the run starts, and the
/// run's own error after it has been recorded and notified.
pub fn execute(
    args: &SyncArgs,
    db_path: Option<&PathBuf>,
    config_path: Option<&PathBuf>,
    json: bool,
) -> Result<()> {
    let config = MirrorConfig::load(config_path.map(PathBuf::as_path))?;
    let db_path = super::db_path(db_path)?;
    let mut storage = SqliteStorage::open(&db_path)?;
    let notifier = if args.no_notify {
        None
    } else {
        create_notifier(&config.notify)?
    };

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))?;

    let run_id = runs::start_run(storage.conn())?;
    info!(run_id = %run_id, db = %db_path.display(), "Sync started");

    let result = rt.block_on(mirror(&config, &mut storage, args.skip_history));

    let (status, error, stats) = match &result {
        Ok(report) => (RunStatus::Success, None, Some(serde_json::to_string(report)?)),
        Err(e) => (RunStatus::Failed, Some(e.to_string()), None),
    };
    if let Err(e) = runs::finish_run(
        storage.conn(),
        &run_id,
        status,
        error.as_deref(),
        stats.as_deref(),
    ) {
        warn!(run_id = %run_id, error = %e, "Failed to record run outcome");
    }

    if let Some(notifier) = &notifier {
        let outcome = match &error {
            None => RunOutcome::Success,
            Some(detail) => RunOutcome::Failure(detail.clone()),
        };
        let notification = Notification::new(config.notify.job_name.clone(), outcome);
        if let Err(e) = rt.block_on(notifier.notify(&notification)) {
            warn!(channel = notifier.name(), error = %e, "Notification failed");
        }
    }

    let report = result?;

    if json {
        let output = SyncOutput {
            success: true,
            run_id: &run_id,
            db: db_path.display().to_string(),
            report: &report,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

async fn mirror(
    config: &MirrorConfig,
    storage: &mut SqliteStorage,
    skip_history: bool,
) -> Result<SyncReport> {
    let creds = config.credentials()?;
    let client = JiraClient::new(creds.base_url, creds.user, creds.token, config.timeout)?;
    let options = config.sync_options(skip_history);
    let mut ctx = SyncContext::new(&client, storage, &options);
    run_sync(&mut ctx).await
}

fn print_report(report: &SyncReport) {
    if report.cold_start {
        println!("Sync complete (first run).");
    } else {
        println!("Sync complete.");
    }
    println!();
    for step in &report.steps {
        print!(
            "  {:<16} fetched {:>6}  written {:>6}",
            step.entity.to_string(),
            step.fetched,
            step.written
        );
        if step.deleted > 0 {
            print!("  replaced {:>6}", step.deleted);
        }
        println!();
    }
    if report.step(Entity::ChangeHistory).is_none() {
        println!("  {:<16} skipped", Entity::ChangeHistory.to_string());
    }

    if let Some(backfill) = &report.backfill {
        if !backfill.is_clean() {
            println!();
            println!(
                "Change history failed for {} of {} issues (retried next run):",
                backfill.failed(),
                backfill.attempted
            );
            for failure in &backfill.failures {
                println!("  {}: {}", failure.key, failure.error);
            }
        }
    }
}

//! Sync orchestration.
//!
//! A run walks the entities in dependency order. Each step reads what it
//! needs from the mirror written by the steps before it, so a step can be
//! re-run on its own against an existing mirror.
//!
//! Failure semantics:
//! - any fetch, projection or store error aborts the run at that step
//! - per-key change-history failures are collected and the run continues

use crate::error::{Error, Result};
use crate::projection::mappings::{self, CustomFields};
use crate::projection::{Cell, ColumnKind, ColumnSpec, FieldMap, RowBatch, project_batch};
use crate::remote::{RemoteSource, Resource, fetch_collection};
use crate::storage::SqliteStorage;
use serde_json::json;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info, instrument, warn};

use super::diff::{
    issue_refresh_targets, key_set, keys_in_sprints, missing_keys, partition_sprints,
};
use super::types::{BackfillFailure, BackfillReport, Entity, StepReport, SyncReport};

/// Parent keys per bulk fetch request, under Jira's limit of 100.
const PARENT_CHUNK: usize = 50;

/// Board type that carries sprints.
const SCRUM_BOARD: &str = "scrum";

/// Log backfill progress every this many keys.
const PROGRESS_EVERY: usize = 100;

/// Per-run settings.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Records requested per page.
    pub page_size: u32,
    /// Only sync boards of projects in this category. `None` syncs all projects.
    pub project_category: Option<String>,
    pub custom_fields: CustomFields,
    /// Skip the change-history step.
    pub skip_history: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            page_size: 100,
            project_category: None,
            custom_fields: CustomFields::default(),
            skip_history: false,
        }
    }
}

/// Everything a step needs, passed explicitly to each step.
pub struct SyncContext<'a, R: RemoteSource> {
    pub remote: &'a R,
    pub storage: &'a mut SqliteStorage,
    pub options: &'a SyncOptions,
}

impl<'a, R: RemoteSource> SyncContext<'a, R> {
    pub fn new(remote: &'a R, storage: &'a mut SqliteStorage, options: &'a SyncOptions) -> Self {
        Self {
            remote,
            storage,
            options,
        }
    }
}

/// Run every step in order.
///
/// # Errors
///
/// Returns the first step error. Mirror tables written by earlier steps
/// keep their new contents.
pub async fn run_sync<R: RemoteSource>(ctx: &mut SyncContext<'_, R>) -> Result<SyncReport> {
    let mut report = SyncReport {
        cold_start: !ctx.storage.table_exists(Entity::Issues.table())?,
        ..SyncReport::default()
    };
    if report.cold_start {
        info!("No issues mirror yet, fetching every sprint");
    }

    report.steps.push(sync_projects(ctx).await?);
    report.steps.push(sync_boards(ctx).await?);
    report.steps.push(sync_sprints(ctx).await?);
    report.steps.push(sync_issues(ctx).await?);
    report.steps.push(sync_parent_issues(ctx).await?);

    if ctx.options.skip_history {
        info!("Skipping change history");
    } else {
        let (step, backfill) = sync_change_history(ctx).await?;
        report.steps.push(step);
        report.backfill = Some(backfill);
    }

    info!(written = report.total_written(), "Sync complete");
    Ok(report)
}

/// Mirror every visible project.
///
/// # Errors
///
/// Returns fetch, projection or store errors.
#[instrument(skip_all)]
pub async fn sync_projects<R: RemoteSource>(ctx: &mut SyncContext<'_, R>) -> Result<StepReport> {
    let mut step = StepReport::new(Entity::Projects);
    let records = fetch_collection(ctx.remote, &Resource::Projects, ctx.options.page_size).await?;
    let batch = project_batch(&mappings::projects(), &records)?;

    step.fetched = records.len();
    step.written = ctx.storage.replace(Entity::Projects.table(), &batch)?;
    info!(fetched = step.fetched, written = step.written, "Projects mirrored");
    Ok(step)
}

/// Mirror the boards of every selected project.
///
/// # Errors
///
/// Returns `NoMatchingProjects` when a category is configured and no
/// mirrored project carries it, otherwise fetch, projection or store errors.
#[instrument(skip_all)]
pub async fn sync_boards<R: RemoteSource>(ctx: &mut SyncContext<'_, R>) -> Result<StepReport> {
    let mut step = StepReport::new(Entity::Boards);
    let projects = read_or_empty(ctx.storage, Entity::Projects, mappings::projects().columns())?;
    let keys = select_projects(&projects, ctx.options.project_category.as_deref())?;

    let map = mappings::boards();
    let mut batch = RowBatch::new(map.columns());
    for key in keys {
        let resource = Resource::Boards { project_key: key };
        let records = fetch_collection(ctx.remote, &resource, ctx.options.page_size).await?;
        step.fetched += records.len();
        step.partitions += 1;
        batch.extend(project_batch(&map, &records)?)?;
    }

    let batch = dedupe_by(batch, "id");
    step.written = ctx.storage.replace(Entity::Boards.table(), &batch)?;
    info!(
        projects = step.partitions,
        written = step.written,
        "Boards mirrored"
    );
    Ok(step)
}

/// Mirror the sprints of every scrum board.
///
/// # Errors
///
/// Returns fetch, projection or store errors.
#[instrument(skip_all)]
pub async fn sync_sprints<R: RemoteSource>(ctx: &mut SyncContext<'_, R>) -> Result<StepReport> {
    let mut step = StepReport::new(Entity::Sprints);
    let boards = read_or_empty(ctx.storage, Entity::Boards, mappings::boards().columns())?;
    let board_ids = scrum_board_ids(&boards);

    let map = mappings::sprints();
    let mut batch = RowBatch::new(map.columns());
    for board_id in board_ids {
        let resource = Resource::Sprints { board_id };
        let records = fetch_collection(ctx.remote, &resource, ctx.options.page_size).await?;
        step.fetched += records.len();
        step.partitions += 1;
        batch.extend(project_batch(&map, &records)?)?;
    }

    // A sprint shared by several boards is listed once per board.
    let batch = dedupe_by(batch, "id");
    step.written = ctx.storage.replace(Entity::Sprints.table(), &batch)?;
    info!(
        boards = step.partitions,
        written = step.written,
        "Sprints mirrored"
    );
    Ok(step)
}

/// Refresh the issue partitions of every sprint that can still change.
///
/// All target sprints are fetched before anything is deleted, so a fetch
/// error leaves the issues mirror as it was.
///
/// # Errors
///
/// Returns fetch, projection or store errors.
#[instrument(skip_all)]
pub async fn sync_issues<R: RemoteSource>(ctx: &mut SyncContext<'_, R>) -> Result<StepReport> {
    let mut step = StepReport::new(Entity::Issues);
    let table = Entity::Issues.table();
    let cold_start = !ctx.storage.table_exists(table)?;

    let sprints = read_or_empty(ctx.storage, Entity::Sprints, mappings::sprints().columns())?;
    let partition = partition_sprints(&sprints)?;
    let mirrored: BTreeSet<i64> = ctx
        .storage
        .read_column_keys(table, "sprint_id")?
        .iter()
        .filter_map(|k| k.parse().ok())
        .collect();
    let targets = issue_refresh_targets(&partition, &mirrored, cold_start);
    info!(
        closed = partition.closed.len(),
        open = partition.open.len(),
        targets = targets.len(),
        cold_start,
        "Refreshing sprint issues"
    );

    let map = mappings::issues(&ctx.options.custom_fields);
    let fields = mappings::requested_fields(&map);
    let sprint_column = ColumnSpec::new("sprint_id", ColumnKind::Integer);
    let mut batch =
        RowBatch::new(map.columns()).with_leading_column(sprint_column.clone(), &Cell::Null);

    for &sprint_id in &targets {
        let resource = Resource::SprintIssues {
            sprint_id,
            fields: fields.clone(),
        };
        let records = fetch_collection(ctx.remote, &resource, ctx.options.page_size).await?;
        step.fetched += records.len();
        step.partitions += 1;

        let rows = dedupe_by(project_batch(&map, &records)?, "issue_key")
            .with_leading_column(sprint_column.clone(), &Cell::Integer(sprint_id));
        debug!(sprint_id, rows = rows.len(), "Sprint issues projected");
        batch.extend(rows)?;
    }

    let ids: Vec<i64> = targets.into_iter().collect();
    (step.deleted, step.written) = ctx
        .storage
        .replace_partitions(table, "sprint_id", &ids, &batch)?;
    info!(
        sprints = step.partitions,
        deleted = step.deleted,
        written = step.written,
        "Issues mirrored"
    );
    Ok(step)
}

/// Mirror the parents of every mirrored issue.
///
/// # Errors
///
/// Returns fetch, projection or store errors.
#[instrument(skip_all)]
pub async fn sync_parent_issues<R: RemoteSource>(
    ctx: &mut SyncContext<'_, R>,
) -> Result<StepReport> {
    let mut step = StepReport::new(Entity::ParentIssues);
    let parents: Vec<String> = ctx
        .storage
        .read_column_keys(Entity::Issues.table(), "parent_key")?
        .into_iter()
        .collect();
    if parents.is_empty() {
        debug!("No parent keys to fetch");
        return Ok(step);
    }

    let map = mappings::parent_issues(&ctx.options.custom_fields);
    let fields = mappings::requested_fields(&map);
    let mut batch = RowBatch::new(map.columns());
    for chunk in parents.chunks(PARENT_CHUNK) {
        let resource = Resource::IssueBatch {
            keys: chunk.to_vec(),
            fields: fields.clone(),
        };
        let records = fetch_collection(ctx.remote, &resource, ctx.options.page_size).await?;
        step.fetched += records.len();
        step.partitions += 1;
        batch.extend(project_batch(&map, &records)?)?;
    }

    let batch = dedupe_by(batch, "issue_key");
    step.written = ctx.storage.replace(Entity::ParentIssues.table(), &batch)?;
    info!(
        requested = parents.len(),
        written = step.written,
        "Parent issues mirrored"
    );
    Ok(step)
}

/// Re-read history for open-sprint issues and backfill issues without any.
///
/// Each key is fetched and stored on its own. A failing key is recorded in
/// the [`BackfillReport`] and the remaining keys still run.
///
/// # Errors
///
/// Returns store errors raised outside the per-key loop.
#[instrument(skip_all)]
pub async fn sync_change_history<R: RemoteSource>(
    ctx: &mut SyncContext<'_, R>,
) -> Result<(StepReport, BackfillReport)> {
    let mut step = StepReport::new(Entity::ChangeHistory);
    let mut backfill = BackfillReport::default();
    let table = Entity::ChangeHistory.table();

    let Some(issues) = ctx.storage.read_table(Entity::Issues.table())? else {
        debug!("No issues mirror, nothing to backfill");
        return Ok((step, backfill));
    };
    let sprints = read_or_empty(ctx.storage, Entity::Sprints, mappings::sprints().columns())?;
    let partition = partition_sprints(&sprints)?;

    // Open-sprint issues may have gained history since the last run.
    let stale: Vec<String> = keys_in_sprints(&issues, &partition.open)?
        .into_iter()
        .collect();
    step.deleted = ctx.storage.delete_where(table, "issue_key", &stale)?;

    let mirrored = ctx.storage.read_column_keys(table, "issue_key")?;
    let needed = missing_keys(&key_set(&issues, "issue_key"), &mirrored);
    backfill.attempted = needed.len();
    info!(
        stale = stale.len(),
        needed = needed.len(),
        "Backfilling change history"
    );

    let map = mappings::change_history();
    for (done, key) in needed.into_iter().enumerate() {
        if done > 0 && done % PROGRESS_EVERY == 0 {
            info!(done, total = backfill.attempted, "Change history progress");
        }
        match backfill_key(ctx, &map, &key).await {
            Ok((fetched, written)) => {
                step.fetched += fetched;
                step.written += written;
                backfill.succeeded += 1;
                backfill.rows_written += written;
            }
            Err(err) => {
                warn!(key = %key, error = %err, "Change history backfill failed");
                backfill.failures.push(BackfillFailure::new(key, &err));
            }
        }
    }

    step.partitions = backfill.succeeded;
    info!(
        succeeded = backfill.succeeded,
        failed = backfill.failed(),
        written = backfill.rows_written,
        "Change history mirrored"
    );
    Ok((step, backfill))
}

/// Fetch, project and append one issue's history. Returns `(fetched, written)`.
async fn backfill_key<R: RemoteSource>(
    ctx: &mut SyncContext<'_, R>,
    map: &FieldMap,
    key: &str,
) -> Result<(usize, usize)> {
    let Some(mut issue) = ctx.remote.fetch_single(key).await? else {
        debug!(key, "Issue gone, no history to mirror");
        return Ok((0, 0));
    };
    if mappings::changelog_is_truncated(&issue) {
        let resource = Resource::Changelog {
            key: key.to_string(),
        };
        let histories = fetch_collection(ctx.remote, &resource, ctx.options.page_size).await?;
        debug!(key, histories = histories.len(), "Embedded changelog truncated, paged in full");
        issue["changelog"] = json!({ "histories": histories });
    }
    let records = mappings::explode_changelog(key, &issue);
    let batch = project_batch(map, &records)?;
    let written = ctx.storage.append(Entity::ChangeHistory.table(), &batch)?;
    Ok((records.len(), written))
}

/// Keys of the projects whose boards are synced.
///
/// # Errors
///
/// Returns `NoMatchingProjects` when `category` matches nothing.
pub fn select_projects(projects: &RowBatch, category: Option<&str>) -> Result<Vec<String>> {
    let key_idx = projects.column_index("key");
    let category_idx = projects.column_index("category");
    let cell = |row: &Vec<Cell>, idx: Option<usize>| {
        idx.and_then(|i| row.get(i)).and_then(Cell::to_key)
    };

    let Some(wanted) = category else {
        return Ok(projects.rows.iter().filter_map(|r| cell(r, key_idx)).collect());
    };

    let keys: Vec<String> = projects
        .rows
        .iter()
        .filter(|r| cell(r, category_idx).is_some_and(|c| c.eq_ignore_ascii_case(wanted)))
        .filter_map(|r| cell(r, key_idx))
        .collect();

    if keys.is_empty() {
        let available: BTreeSet<String> = key_set(projects, "category");
        return Err(Error::NoMatchingProjects {
            category: wanted.to_string(),
            available: available.into_iter().collect(),
        });
    }
    info!(category = wanted, projects = keys.len(), "Projects selected");
    Ok(keys)
}

fn scrum_board_ids(boards: &RowBatch) -> Vec<i64> {
    let id_idx = boards.column_index("id");
    let type_idx = boards.column_index("board_type");
    boards
        .rows
        .iter()
        .filter(|row| {
            type_idx
                .and_then(|i| row.get(i))
                .and_then(Cell::as_str)
                .is_some_and(|t| t.eq_ignore_ascii_case(SCRUM_BOARD))
        })
        .filter_map(|row| id_idx.and_then(|i| row.get(i)).and_then(Cell::as_i64))
        .collect()
}

/// Keep the first row per non-null `column` value. Rows without one are kept.
fn dedupe_by(mut batch: RowBatch, column: &str) -> RowBatch {
    let Some(idx) = batch.column_index(column) else {
        return batch;
    };
    let mut seen = HashSet::new();
    batch.rows.retain(|row| match row.get(idx).and_then(Cell::to_key) {
        Some(key) => seen.insert(key),
        None => true,
    });
    batch
}

fn read_or_empty(
    storage: &SqliteStorage,
    entity: Entity,
    columns: Vec<ColumnSpec>,
) -> Result<RowBatch> {
    Ok(storage
        .read_table(entity.table())?
        .unwrap_or_else(|| RowBatch::new(columns)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::fake::FakeJira;
    use serde_json::Value;

    fn options() -> SyncOptions {
        SyncOptions {
            page_size: 2,
            ..SyncOptions::default()
        }
    }

    async fn run(
        remote: &FakeJira,
        storage: &mut SqliteStorage,
        opts: &SyncOptions,
    ) -> Result<SyncReport> {
        let mut ctx = SyncContext::new(remote, storage, opts);
        run_sync(&mut ctx).await
    }

    fn issue_count(storage: &SqliteStorage) -> u64 {
        storage.row_count(Entity::Issues.table()).unwrap().unwrap_or(0)
    }

    #[tokio::test]
    async fn test_cold_start_mirrors_everything() {
        let remote = FakeJira::standard();
        let mut storage = SqliteStorage::open_memory().unwrap();

        let report = run(&remote, &mut storage, &options()).await.unwrap();

        assert!(report.cold_start);
        assert_eq!(storage.row_count("jira_projects").unwrap(), Some(2));
        // Kanban board 11 has no sprints and is skipped.
        assert_eq!(storage.row_count("jira_boards").unwrap(), Some(2));
        assert_eq!(storage.row_count("jira_sprints").unwrap(), Some(2));
        assert_eq!(issue_count(&storage), 3);
        assert_eq!(storage.row_count("jira_parent_issues").unwrap(), Some(1));
        assert!(remote.calls().iter().all(|c| !c.starts_with("sprints[board 11]")));

        let backfill = report.backfill.unwrap();
        assert_eq!(backfill.attempted, 3);
        assert!(backfill.is_clean());
        assert_eq!(storage.row_count("jira_changelog").unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let remote = FakeJira::standard();
        let mut storage = SqliteStorage::open_memory().unwrap();
        run(&remote, &mut storage, &options()).await.unwrap();
        let issues_before = storage.read_table("jira_issues").unwrap();

        let report = run(&remote, &mut storage, &options()).await.unwrap();

        assert!(!report.cold_start);
        assert_eq!(issue_count(&storage), 3);
        let mut before = issues_before.unwrap().rows;
        let mut after = storage.read_table("jira_issues").unwrap().unwrap().rows;
        let by_key = |r: &Vec<Cell>| r[2].to_key();
        before.sort_by_key(by_key);
        after.sort_by_key(by_key);
        assert_eq!(before, after);
        assert_eq!(storage.row_count("jira_changelog").unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_closed_sprint_is_not_refetched() {
        let remote = FakeJira::standard();
        let mut storage = SqliteStorage::open_memory().unwrap();
        run(&remote, &mut storage, &options()).await.unwrap();

        remote.clear_calls();
        remote.set_sprint_issues(1, vec![FakeJira::issue(90, "PROJ-90", None)]);
        run(&remote, &mut storage, &options()).await.unwrap();

        assert!(remote.calls().iter().all(|c| !c.starts_with("issues[sprint 1]")));
        assert!(remote.calls().iter().any(|c| c.starts_with("issues[sprint 2]")));
        let keys = storage.read_column_keys("jira_issues", "issue_key").unwrap();
        assert!(!keys.contains("PROJ-90"));
        assert!(keys.contains("PROJ-1"));
    }

    #[tokio::test]
    async fn test_open_sprint_changes_are_picked_up() {
        let remote = FakeJira::standard();
        let mut storage = SqliteStorage::open_memory().unwrap();
        run(&remote, &mut storage, &options()).await.unwrap();

        remote.set_sprint_issues(2, vec![FakeJira::issue(4, "PROJ-4", None)]);
        let report = run(&remote, &mut storage, &options()).await.unwrap();

        let keys = storage.read_column_keys("jira_issues", "issue_key").unwrap();
        assert!(keys.contains("PROJ-4"));
        assert!(!keys.contains("PROJ-2"));
        assert_eq!(report.step(Entity::Issues).unwrap().deleted, 2);
    }

    #[tokio::test]
    async fn test_open_sprint_history_is_refreshed() {
        let remote = FakeJira::standard();
        let mut storage = SqliteStorage::open_memory().unwrap();
        run(&remote, &mut storage, &options()).await.unwrap();

        let mut reworked = FakeJira::issue(2, "PROJ-2", Some("PROJ-10"));
        reworked["changelog"]["histories"][0]["id"] = json!("2500");
        remote.set_sprint_issues(2, vec![reworked, FakeJira::issue(3, "PROJ-3", None)]);
        remote.clear_calls();
        run(&remote, &mut storage, &options()).await.unwrap();

        let history = storage.read_column_keys("jira_changelog", "history_id").unwrap();
        assert!(history.contains("2500"));
        assert!(!history.contains("2000"));
        assert!(history.contains("1000"));
        assert!(!remote.calls().contains(&"issue[PROJ-1]".to_string()));
        assert!(remote.calls().contains(&"issue[PROJ-2]".to_string()));
    }

    #[tokio::test]
    async fn test_truncated_changelog_is_paged_in_full() {
        let remote = FakeJira::standard();
        let mut long = FakeJira::issue(3, "PROJ-3", None);
        let entry = long["changelog"]["histories"][0].clone();
        let histories: Vec<Value> = (0..5)
            .map(|i| {
                let mut h = entry.clone();
                h["id"] = json!((3000 + i).to_string());
                h
            })
            .collect();
        long["changelog"]["histories"] = json!(histories);
        remote.set_sprint_issues(2, vec![FakeJira::issue(2, "PROJ-2", Some("PROJ-10")), long]);
        remote.embed_history_up_to(2);
        let mut storage = SqliteStorage::open_memory().unwrap();

        let report = run(&remote, &mut storage, &options()).await.unwrap();

        assert!(report.backfill.unwrap().is_clean());
        assert!(remote.calls().iter().any(|c| c.starts_with("changelog[PROJ-3]")));
        let history = storage.read_column_keys("jira_changelog", "history_id").unwrap();
        for id in 3000..3005 {
            assert!(history.contains(&id.to_string()), "missing {id}");
        }
        // Fully embedded histories are not paged again.
        assert!(remote.calls().iter().all(|c| !c.starts_with("changelog[PROJ-1]")));
    }

    #[tokio::test]
    async fn test_rejected_issue_write_keeps_partitions() {
        let remote = FakeJira::standard();
        let mut storage = SqliteStorage::open_memory().unwrap();
        run(&remote, &mut storage, &options()).await.unwrap();
        storage
            .conn()
            .execute_batch(
                "CREATE TRIGGER reject_issues BEFORE INSERT ON jira_issues
                 BEGIN SELECT RAISE(ABORT, 'store rejected write'); END;",
            )
            .unwrap();

        let opts = options();
        let mut ctx = SyncContext::new(&remote, &mut storage, &opts);
        let err = sync_issues(&mut ctx).await.unwrap_err();

        assert!(matches!(err, Error::Database(_)));
        assert_eq!(issue_count(&storage), 3);
        let keys = storage.read_column_keys("jira_issues", "issue_key").unwrap();
        assert!(keys.contains("PROJ-2"));
        assert!(keys.contains("PROJ-3"));
    }

    #[tokio::test]
    async fn test_backfill_failure_is_isolated() {
        let remote = FakeJira::standard();
        remote.fail_history("PROJ-2");
        let mut storage = SqliteStorage::open_memory().unwrap();

        let report = run(&remote, &mut storage, &options()).await.unwrap();

        let backfill = report.backfill.unwrap();
        assert_eq!(backfill.succeeded, 2);
        assert_eq!(backfill.failures.len(), 1);
        assert_eq!(backfill.failures[0].key, "PROJ-2");
        let keys = storage.read_column_keys("jira_changelog", "issue_key").unwrap();
        assert!(keys.contains("PROJ-1"));
        assert!(!keys.contains("PROJ-2"));
    }

    #[tokio::test]
    async fn test_failed_key_is_retried_next_run() {
        let remote = FakeJira::standard();
        remote.fail_history("PROJ-1");
        let mut storage = SqliteStorage::open_memory().unwrap();
        run(&remote, &mut storage, &options()).await.unwrap();

        remote.clear_failures();
        remote.clear_calls();
        let report = run(&remote, &mut storage, &options()).await.unwrap();

        assert!(remote.calls().contains(&"issue[PROJ-1]".to_string()));
        assert!(report.backfill.unwrap().is_clean());
        let keys = storage.read_column_keys("jira_changelog", "issue_key").unwrap();
        assert!(keys.contains("PROJ-1"));
    }

    #[tokio::test]
    async fn test_skip_history() {
        let remote = FakeJira::standard();
        let mut storage = SqliteStorage::open_memory().unwrap();
        let opts = SyncOptions {
            skip_history: true,
            ..options()
        };

        let report = run(&remote, &mut storage, &opts).await.unwrap();

        assert!(report.backfill.is_none());
        assert!(!storage.table_exists("jira_changelog").unwrap());
    }

    #[tokio::test]
    async fn test_fetch_error_aborts_before_delete() {
        let remote = FakeJira::standard();
        let mut storage = SqliteStorage::open_memory().unwrap();
        run(&remote, &mut storage, &options()).await.unwrap();

        remote.fail_resource("issues[sprint 2]");
        let err = run(&remote, &mut storage, &options()).await.unwrap_err();

        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(issue_count(&storage), 3);
    }

    #[tokio::test]
    async fn test_category_filter() {
        let remote = FakeJira::standard();
        let mut storage = SqliteStorage::open_memory().unwrap();
        let opts = SyncOptions {
            project_category: Some("delivery".to_string()),
            ..options()
        };

        run(&remote, &mut storage, &opts).await.unwrap();

        assert!(remote.calls().iter().any(|c| c.starts_with("boards[PROJ]")));
        assert!(remote.calls().iter().all(|c| !c.starts_with("boards[OPS]")));
    }

    #[tokio::test]
    async fn test_unknown_category_fails() {
        let remote = FakeJira::standard();
        let mut storage = SqliteStorage::open_memory().unwrap();
        let opts = SyncOptions {
            project_category: Some("Marketing".to_string()),
            ..options()
        };

        let err = run(&remote, &mut storage, &opts).await.unwrap_err();

        match err {
            Error::NoMatchingProjects { category, available } => {
                assert_eq!(category, "Marketing");
                assert_eq!(available, vec!["Delivery".to_string(), "Operations".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_timestamp_aborts_issue_step() {
        let remote = FakeJira::standard();
        remote.set_sprint_issues(
            2,
            vec![json!({"id": "7", "key": "PROJ-7", "fields": {"created": "yesterday"}})],
        );
        let mut storage = SqliteStorage::open_memory().unwrap();

        let err = run(&remote, &mut storage, &options()).await.unwrap_err();

        assert!(matches!(err, Error::MalformedTemporalValue { .. }));
        assert!(!storage.table_exists("jira_issues").unwrap());
    }

    #[test]
    fn test_dedupe_keeps_first() {
        let batch = RowBatch {
            columns: vec![ColumnSpec::new("id", ColumnKind::Integer)],
            rows: vec![
                vec![Cell::Integer(1)],
                vec![Cell::Integer(1)],
                vec![Cell::Null],
                vec![Cell::Null],
            ],
        };
        assert_eq!(dedupe_by(batch, "id").len(), 3);
    }
}

//! Key-set diffing.
//!
//! Decides what a run re-fetches, always from persisted mirror state:
//! - change history is backfilled for issue keys with no history rows
//! - issue partitions are refreshed for sprints that can still change

use crate::error::{Error, Result};
use crate::projection::{Cell, RowBatch};
use std::collections::BTreeSet;

/// Lifecycle state of a sprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SprintState {
    Future,
    Active,
    Closed,
}

impl SprintState {
    /// Parse Jira's sprint state. Unknown states are `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "future" => Some(Self::Future),
            "active" => Some(Self::Active),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Sprint ids split by mutability.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SprintPartition {
    /// Final; their issues are fetched once.
    pub closed: BTreeSet<i64>,
    /// Active, future or unknown; their issues are refreshed every run.
    pub open: BTreeSet<i64>,
}

impl SprintPartition {
    /// Every sprint id.
    #[must_use]
    pub fn all(&self) -> BTreeSet<i64> {
        self.closed.union(&self.open).copied().collect()
    }
}

/// `source - mirrored`.
#[must_use]
pub fn missing_keys(source: &BTreeSet<String>, mirrored: &BTreeSet<String>) -> BTreeSet<String> {
    source.difference(mirrored).cloned().collect()
}

/// Split the sprints mirror into closed and not-closed sprint ids.
///
/// Rows without an id are skipped.
///
/// # Errors
///
/// Returns `Projection` if the batch lacks an `id` or `state` column.
pub fn partition_sprints(sprints: &RowBatch) -> Result<SprintPartition> {
    let id_idx = required_column(sprints, "id")?;
    let state_idx = required_column(sprints, "state")?;

    let mut partition = SprintPartition::default();
    for row in &sprints.rows {
        let Some(id) = row.get(id_idx).and_then(Cell::as_i64) else {
            continue;
        };
        let closed = row
            .get(state_idx)
            .and_then(Cell::as_str)
            .and_then(SprintState::parse)
            .is_some_and(|s| s.is_closed());
        if closed {
            partition.closed.insert(id);
        } else {
            partition.open.insert(id);
        }
    }
    Ok(partition)
}

/// Sprints whose issue partitions this run must (re)write.
///
/// On a cold start every sprint is fetched. Otherwise every not-closed
/// sprint, plus closed sprints that never made it into the issues mirror.
#[must_use]
pub fn issue_refresh_targets(
    partition: &SprintPartition,
    mirrored_sprints: &BTreeSet<i64>,
    cold_start: bool,
) -> BTreeSet<i64> {
    if cold_start {
        return partition.all();
    }
    let mut targets = partition.open.clone();
    targets.extend(partition.closed.difference(mirrored_sprints).copied());
    targets
}

/// Issue keys belonging to any of the given sprints.
///
/// # Errors
///
/// Returns `Projection` if the batch lacks `sprint_id` or `issue_key`.
pub fn keys_in_sprints(issues: &RowBatch, sprint_ids: &BTreeSet<i64>) -> Result<BTreeSet<String>> {
    let sprint_idx = required_column(issues, "sprint_id")?;
    let key_idx = required_column(issues, "issue_key")?;

    Ok(issues
        .rows
        .iter()
        .filter(|row| {
            row.get(sprint_idx)
                .and_then(Cell::as_i64)
                .is_some_and(|id| sprint_ids.contains(&id))
        })
        .filter_map(|row| row.get(key_idx).and_then(Cell::to_key))
        .collect())
}

/// Distinct non-null values of a column.
#[must_use]
pub fn key_set(batch: &RowBatch, column: &str) -> BTreeSet<String> {
    batch.column(column).filter_map(Cell::to_key).collect()
}

fn required_column(batch: &RowBatch, name: &str) -> Result<usize> {
    batch
        .column_index(name)
        .ok_or_else(|| Error::Projection(format!("mirror table has no '{name}' column")))
}

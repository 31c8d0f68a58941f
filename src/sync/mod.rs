//! Incremental mirror sync.
//!
//! A run mirrors Jira into SQLite in dependency order:
//!
//! 1. **Projects**, then the **boards** of the selected projects
//! 2. **Sprints** of every scrum board
//! 3. **Issues** per sprint; closed sprints are fetched once, the rest every run
//! 4. **Parent issues** referenced by mirrored issues
//! 5. **Change history** for issues that have none yet
//!
//! What to re-fetch is always derived from the mirror itself, so a run
//! interrupted at any point is completed by the next one.
//!
//! # Example
//!
//! ```ignore
//! use jmirror::sync::{SyncContext, SyncOptions, run_sync};
//!
//! let options = SyncOptions::default();
//! let mut ctx = SyncContext::new(&client, &mut storage, &options);
//! let report = run_sync(&mut ctx).await?;
//! ```

mod diff;
mod engine;
#[cfg(test)]
mod fake;
mod types;

pub use diff::{
    SprintPartition, SprintState, issue_refresh_targets, key_set, keys_in_sprints, missing_keys,
    partition_sprints,
};
pub use engine::{
    SyncContext, SyncOptions, run_sync, select_projects, sync_boards, sync_change_history,
    sync_issues, sync_parent_issues, sync_projects, sync_sprints,
};
pub use types::{BackfillFailure, BackfillReport, Entity, StepReport, SyncReport};

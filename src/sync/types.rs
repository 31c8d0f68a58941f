//! Sync types: mirrored entities and run reports.

use serde::Serialize;

use crate::error::Error;

/// Entities mirrored by a sync run, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Projects,
    Boards,
    Sprints,
    Issues,
    ParentIssues,
    ChangeHistory,
}

impl Entity {
    /// Every entity, in the order a run syncs them.
    pub const ALL: [Self; 6] = [
        Self::Projects,
        Self::Boards,
        Self::Sprints,
        Self::Issues,
        Self::ParentIssues,
        Self::ChangeHistory,
    ];

    /// Mirror table holding this entity.
    #[must_use]
    pub const fn table(&self) -> &'static str {
        match self {
            Self::Projects => "jira_projects",
            Self::Boards => "jira_boards",
            Self::Sprints => "jira_sprints",
            Self::Issues => "jira_issues",
            Self::ParentIssues => "jira_parent_issues",
            Self::ChangeHistory => "jira_changelog",
        }
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Projects => write!(f, "projects"),
            Self::Boards => write!(f, "boards"),
            Self::Sprints => write!(f, "sprints"),
            Self::Issues => write!(f, "issues"),
            Self::ParentIssues => write!(f, "parent_issues"),
            Self::ChangeHistory => write!(f, "change_history"),
        }
    }
}

impl std::str::FromStr for Entity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "projects" => Ok(Self::Projects),
            "boards" => Ok(Self::Boards),
            "sprints" => Ok(Self::Sprints),
            "issues" => Ok(Self::Issues),
            "parent_issues" => Ok(Self::ParentIssues),
            "change_history" => Ok(Self::ChangeHistory),
            _ => Err(format!("Unknown entity: {s}")),
        }
    }
}

/// Counts for one sync step.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub entity: Entity,
    /// Remote records received.
    pub fetched: usize,
    /// Mirror rows written.
    pub written: usize,
    /// Mirror rows deleted before writing.
    pub deleted: usize,
    /// Partitions (sprints, projects, boards) fetched individually.
    pub partitions: usize,
}

impl StepReport {
    #[must_use]
    pub const fn new(entity: Entity) -> Self {
        Self {
            entity,
            fetched: 0,
            written: 0,
            deleted: 0,
            partitions: 0,
        }
    }
}

/// One issue key whose change history could not be mirrored.
#[derive(Debug, Clone, Serialize)]
pub struct BackfillFailure {
    pub key: String,
    pub code: String,
    pub error: String,
}

impl BackfillFailure {
    #[must_use]
    pub fn new(key: impl Into<String>, error: &Error) -> Self {
        Self {
            key: key.into(),
            code: error.error_code().as_str().to_string(),
            error: error.to_string(),
        }
    }
}

/// Outcome of the per-key change-history backfill.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BackfillReport {
    /// Keys that had no history rows.
    pub attempted: usize,
    pub succeeded: usize,
    pub rows_written: usize,
    pub failures: Vec<BackfillFailure>,
}

impl BackfillReport {
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Summary of a complete run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// The issues mirror did not exist when the run started.
    pub cold_start: bool,
    pub steps: Vec<StepReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backfill: Option<BackfillReport>,
}

impl SyncReport {
    /// Step report for an entity, if that step ran.
    #[must_use]
    pub fn step(&self, entity: Entity) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.entity == entity)
    }

    #[must_use]
    pub fn total_written(&self) -> usize {
        self.steps.iter().map(|s| s.written).sum()
    }
}

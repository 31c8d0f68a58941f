//! Remote source trait.
//!
//! Defines the interface the sync engine pulls from. Uses async methods for
//! the HTTP-backed implementation; tests substitute an in-process fake.

use crate::error::Result;
use serde_json::Value;
use std::fmt;

/// A remote collection endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// Every project visible to the account.
    Projects,
    /// Boards located in one project.
    Boards { project_key: String },
    /// Sprints of one (scrum) board.
    Sprints { board_id: i64 },
    /// Issues currently or previously in one sprint.
    SprintIssues { sprint_id: i64, fields: Vec<String> },
    /// Named issues in one request. Keys that no longer exist are skipped.
    IssueBatch { keys: Vec<String>, fields: Vec<String> },
    /// Full change history of one issue.
    Changelog { key: String },
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Projects => write!(f, "projects"),
            Self::Boards { project_key } => write!(f, "boards[{project_key}]"),
            Self::Sprints { board_id } => write!(f, "sprints[board {board_id}]"),
            Self::SprintIssues { sprint_id, .. } => write!(f, "issues[sprint {sprint_id}]"),
            Self::IssueBatch { keys, .. } => write!(f, "issue-batch[{}]", keys.join(",")),
            Self::Changelog { key } => write!(f, "changelog[{key}]"),
        }
    }
}

/// One page of a collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    /// Total size of the collection, when the endpoint reports it.
    pub total: Option<u64>,
    /// Endpoint-reported last-page flag, used only when `total` is absent.
    pub is_last: bool,
}

impl Page {
    #[must_use]
    pub fn new(items: Vec<Value>, total: u64) -> Self {
        Self {
            items,
            total: Some(total),
            is_last: false,
        }
    }
}

/// Trait for remote sources.
///
/// Implementations must report `total` consistently across the pages of one
/// collection fetch.
pub trait RemoteSource: Send + Sync {
    /// Fetch one page of a collection starting at offset `start`.
    fn fetch_page(
        &self,
        resource: &Resource,
        start: u64,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Page>> + Send;

    /// Fetch one issue with its change history expanded.
    ///
    /// Returns `None` when the issue no longer exists.
    fn fetch_single(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<Value>>> + Send;
}

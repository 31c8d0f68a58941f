//! Field maps for each mirrored Jira entity.

use super::{ColumnKind, FieldMap, FieldSpec};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Instance-specific custom field ids used by the issue projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomFields {
    /// Story points.
    pub estimate: String,
    pub start_date: String,
    pub strategic_goal: String,
}

impl Default for CustomFields {
    fn default() -> Self {
        Self {
            estimate: "customfield_10015".to_string(),
            start_date: "customfield_10014".to_string(),
            strategic_goal: "customfield_10040".to_string(),
        }
    }
}

#[must_use]
pub fn projects() -> FieldMap {
    FieldMap::new(vec![
        FieldSpec::new("id", "id", ColumnKind::Integer).required(),
        FieldSpec::new("key", "key", ColumnKind::Text).required(),
        FieldSpec::new("name", "name", ColumnKind::Text),
        FieldSpec::new("projectCategory.name", "category", ColumnKind::Text),
        FieldSpec::new("projectTypeKey", "project_type", ColumnKind::Text),
        FieldSpec::new("style", "style", ColumnKind::Text),
    ])
}

#[must_use]
pub fn boards() -> FieldMap {
    FieldMap::new(vec![
        FieldSpec::new("id", "id", ColumnKind::Integer).required(),
        FieldSpec::new("name", "name", ColumnKind::Text),
        FieldSpec::new("type", "board_type", ColumnKind::Text),
        FieldSpec::new("location.projectId", "project_id", ColumnKind::Integer),
        FieldSpec::new("location.projectKey", "project_key", ColumnKind::Text),
    ])
}

#[must_use]
pub fn sprints() -> FieldMap {
    FieldMap::new(vec![
        FieldSpec::new("id", "id", ColumnKind::Integer).required(),
        FieldSpec::new("name", "name", ColumnKind::Text),
        FieldSpec::new("state", "state", ColumnKind::Text).required(),
        FieldSpec::new("originBoardId", "origin_board_id", ColumnKind::Integer),
        FieldSpec::new("goal", "goal", ColumnKind::Text),
        FieldSpec::new("startDate", "start_date", ColumnKind::Timestamp),
        FieldSpec::new("endDate", "end_date", ColumnKind::Timestamp),
        FieldSpec::new("completeDate", "complete_date", ColumnKind::Timestamp),
    ])
}

/// Sprint issues. The engine prepends the owning `sprint_id` column.
#[must_use]
pub fn issues(custom: &CustomFields) -> FieldMap {
    FieldMap::new(vec![
        FieldSpec::new("id", "id", ColumnKind::Integer).required(),
        FieldSpec::new("key", "issue_key", ColumnKind::Text).required(),
        FieldSpec::new("fields.issuetype.name", "issue_type", ColumnKind::Text),
        FieldSpec::new("fields.parent.key", "parent_key", ColumnKind::Text),
        FieldSpec::new("fields.status.name", "status", ColumnKind::Text),
        FieldSpec::new("fields.priority.name", "priority", ColumnKind::Text),
        FieldSpec::new(format!("fields.{}", custom.estimate), "estimate", ColumnKind::Real),
        FieldSpec::new("fields.summary", "summary", ColumnKind::Text),
        FieldSpec::new(
            format!("fields.{}", custom.strategic_goal),
            "strategic_goal",
            ColumnKind::Text,
        ),
        FieldSpec::new("fields.assignee", "assignee", ColumnKind::Text),
        FieldSpec::new(
            format!("fields.{}", custom.start_date),
            "start_date",
            ColumnKind::Timestamp,
        ),
        FieldSpec::new("fields.duedate", "due_date", ColumnKind::Timestamp),
        FieldSpec::new("fields.created", "created", ColumnKind::Timestamp),
        FieldSpec::new("fields.updated", "updated", ColumnKind::Timestamp),
    ])
}

#[must_use]
pub fn parent_issues(custom: &CustomFields) -> FieldMap {
    FieldMap::new(vec![
        FieldSpec::new("id", "id", ColumnKind::Integer).required(),
        FieldSpec::new("key", "issue_key", ColumnKind::Text).required(),
        FieldSpec::new("fields.issuetype.name", "issue_type", ColumnKind::Text),
        FieldSpec::new("fields.status.name", "status", ColumnKind::Text),
        FieldSpec::new("fields.summary", "summary", ColumnKind::Text),
        FieldSpec::new(
            format!("fields.{}", custom.strategic_goal),
            "strategic_goal",
            ColumnKind::Text,
        ),
        FieldSpec::new(
            format!("fields.{}", custom.start_date),
            "start_date",
            ColumnKind::Timestamp,
        ),
        FieldSpec::new("fields.duedate", "due_date", ColumnKind::Timestamp),
        FieldSpec::new("fields.created", "created", ColumnKind::Timestamp),
        FieldSpec::new("fields.updated", "updated", ColumnKind::Timestamp),
    ])
}

/// One row per changed field, applied to the output of [`explode_changelog`].
#[must_use]
pub fn change_history() -> FieldMap {
    FieldMap::new(vec![
        FieldSpec::new("issue_key", "issue_key", ColumnKind::Text).required(),
        FieldSpec::new("history_id", "history_id", ColumnKind::Integer).required(),
        FieldSpec::new("author", "author", ColumnKind::Text),
        FieldSpec::new("created", "created", ColumnKind::Timestamp).required(),
        FieldSpec::new("field", "field", ColumnKind::Text),
        FieldSpec::new("fromString", "from_value", ColumnKind::Text),
        FieldSpec::new("toString", "to_value", ColumnKind::Text),
    ])
}

/// Top-level Jira field names a map reads under `fields.*`.
///
/// Used for the `fields=` query parameter so Jira only returns what is mirrored.
#[must_use]
pub fn requested_fields(map: &FieldMap) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for path in map.paths() {
        if let Some(name) = path.strip_prefix("fields.").and_then(|p| p.split('.').next()) {
            if !out.iter().any(|f| f == name) {
                out.push(name.to_string());
            }
        }
    }
    out
}

/// Whether the history embedded by `expand=changelog` is cut short.
///
/// Jira embeds at most one page of histories and reports the full count in
/// `changelog.total`.
#[must_use]
pub fn changelog_is_truncated(issue: &Value) -> bool {
    let Some(changelog) = issue.get("changelog") else {
        return false;
    };
    let embedded = changelog
        .get("histories")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    changelog
        .get("total")
        .and_then(Value::as_u64)
        .is_some_and(|total| total > embedded as u64)
}

/// Flatten an issue fetched with `expand=changelog` into one record per
/// changed field.
///
/// Histories without items still produce nothing; an issue with no history
/// yields an empty list.
#[must_use]
pub fn explode_changelog(issue_key: &str, issue: &Value) -> Vec<Value> {
    let Some(histories) = issue
        .get("changelog")
        .and_then(|c| c.get("histories"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for history in histories {
        let items = history.get("items").and_then(Value::as_array);
        for item in items.into_iter().flatten() {
            out.push(json!({
                "issue_key": issue_key,
                "history_id": history.get("id"),
                "author": history.get("author"),
                "created": history.get("created"),
                "field": item.get("field"),
                "fromString": item.get("fromString"),
                "toString": item.get("toString"),
            }));
        }
    }
    out
}

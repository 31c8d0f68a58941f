//! In-process remote source for engine tests.

use crate::error::{Error, Result};
use crate::remote::{Page, RemoteSource, Resource};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Default)]
struct State {
    projects: Vec<Value>,
    boards: HashMap<String, Vec<Value>>,
    sprints: HashMap<i64, Vec<Value>>,
    sprint_issues: HashMap<i64, Vec<Value>>,
    parents: Vec<Value>,
    failing_keys: HashSet<String>,
    failing_resources: HashSet<String>,
    embedded_history_limit: Option<usize>,
    calls: Vec<String>,
}

/// Fake Jira serving fixed collections, paginated like the real API.
#[derive(Default)]
pub struct FakeJira {
    state: Mutex<State>,
}

impl FakeJira {
    /// Two projects; PROJ has a scrum board (10) with one closed sprint (1)
    /// holding PROJ-1 and one active sprint (2) holding PROJ-2 and PROJ-3,
    /// plus a kanban board (11). PROJ-2's parent is PROJ-10.
    pub fn standard() -> Self {
        let fake = Self::default();
        {
            let mut s = fake.state.lock().unwrap();
            s.projects = vec![
                json!({"id": "100", "key": "PROJ", "name": "Product", "projectCategory": {"name": "Delivery"}}),
                json!({"id": "200", "key": "OPS", "name": "Operations", "projectCategory": {"name": "Operations"}}),
            ];
            s.boards.insert(
                "PROJ".into(),
                vec![
                    json!({"id": 10, "name": "PROJ board", "type": "scrum", "location": {"projectId": 100, "projectKey": "PROJ"}}),
                    json!({"id": 11, "name": "PROJ flow", "type": "kanban", "location": {"projectId": 100, "projectKey": "PROJ"}}),
                ],
            );
            s.sprints.insert(
                10,
                vec![
                    json!({"id": 1, "name": "Sprint 1", "state": "closed", "originBoardId": 10,
                           "startDate": "2024-01-01T09:00:00.000Z", "endDate": "2024-01-14T17:00:00.000Z",
                           "completeDate": "2024-01-14T18:00:00.000Z"}),
                    json!({"id": 2, "name": "Sprint 2", "state": "active", "originBoardId": 10,
                           "startDate": "2024-01-15T09:00:00.000Z"}),
                ],
            );
            s.sprint_issues.insert(1, vec![Self::issue(1, "PROJ-1", None)]);
            s.sprint_issues.insert(
                2,
                vec![
                    Self::issue(2, "PROJ-2", Some("PROJ-10")),
                    Self::issue(3, "PROJ-3", None),
                ],
            );
            s.parents = vec![Self::issue(10, "PROJ-10", None)];
        }
        fake
    }

    /// A minimal issue record with one changelog entry.
    pub fn issue(id: i64, key: &str, parent: Option<&str>) -> Value {
        let mut fields = json!({
            "summary": format!("Work for {key}"),
            "status": {"name": "In Progress"},
            "issuetype": {"name": "Story"},
            "created": "2024-01-02T10:00:00.000+0000",
            "updated": "2024-01-05T10:00:00.000+0000",
        });
        if let Some(parent) = parent {
            fields["parent"] = json!({"key": parent});
        }
        json!({
            "id": id.to_string(),
            "key": key,
            "fields": fields,
            "changelog": {"histories": [{
                "id": (id * 1000).to_string(),
                "author": {"displayName": "Ana Ruiz"},
                "created": "2024-01-03T10:00:00.000+0000",
                "items": [{"field": "status", "fromString": "To Do", "toString": "In Progress"}]
            }]}
        })
    }

    pub fn set_sprint_issues(&self, sprint_id: i64, issues: Vec<Value>) {
        self.state.lock().unwrap().sprint_issues.insert(sprint_id, issues);
    }

    /// Embed at most `limit` histories in `fetch_single`, reporting the
    /// full count in `changelog.total` like Jira does.
    pub fn embed_history_up_to(&self, limit: usize) {
        self.state.lock().unwrap().embedded_history_limit = Some(limit);
    }

    /// Make `fetch_single` fail for this key.
    pub fn fail_history(&self, key: &str) {
        self.state.lock().unwrap().failing_keys.insert(key.to_string());
    }

    /// Make every page of this resource (by its display form) fail.
    pub fn fail_resource(&self, resource: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_resources
            .insert(resource.to_string());
    }

    pub fn clear_failures(&self) {
        let mut s = self.state.lock().unwrap();
        s.failing_keys.clear();
        s.failing_resources.clear();
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    fn collection(state: &State, resource: &Resource) -> Vec<Value> {
        match resource {
            Resource::Projects => state.projects.clone(),
            Resource::Boards { project_key } => {
                state.boards.get(project_key).cloned().unwrap_or_default()
            }
            Resource::Sprints { board_id } => {
                state.sprints.get(board_id).cloned().unwrap_or_default()
            }
            Resource::SprintIssues { sprint_id, .. } => state
                .sprint_issues
                .get(sprint_id)
                .cloned()
                .unwrap_or_default(),
            Resource::IssueBatch { keys, .. } => state
                .parents
                .iter()
                .filter(|p| p["key"].as_str().is_some_and(|k| keys.iter().any(|w| w == k)))
                .cloned()
                .collect(),
            Resource::Changelog { key } => Self::find_issue(state, key)
                .and_then(|i| i["changelog"]["histories"].as_array().cloned())
                .unwrap_or_default(),
        }
    }

    fn find_issue<'a>(state: &'a State, key: &str) -> Option<&'a Value> {
        state
            .sprint_issues
            .values()
            .flatten()
            .chain(state.parents.iter())
            .find(|i| i["key"] == key)
    }
}

impl RemoteSource for FakeJira {
    async fn fetch_page(&self, resource: &Resource, start: u64, limit: u32) -> Result<Page> {
        let mut state = self.state.lock().unwrap();
        let name = resource.to_string();
        state.calls.push(format!("{name}@{start}"));
        if state.failing_resources.contains(&name) {
            return Err(Error::Transport(format!("{name}: HTTP 503")));
        }

        let all = Self::collection(&state, resource);
        let start = usize::try_from(start).unwrap();
        let items: Vec<Value> = all.iter().skip(start).take(limit as usize).cloned().collect();

        // The agile sprint listing reports no total, only a last-page flag.
        if matches!(resource, Resource::Sprints { .. }) {
            let is_last = start + items.len() >= all.len();
            return Ok(Page {
                items,
                total: None,
                is_last,
            });
        }
        Ok(Page::new(items, all.len() as u64))
    }

    async fn fetch_single(&self, key: &str) -> Result<Option<Value>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("issue[{key}]"));
        if state.failing_keys.contains(key) {
            return Err(Error::Transport(format!("issue {key}: HTTP 500")));
        }
        let Some(mut issue) = Self::find_issue(&state, key).cloned() else {
            return Ok(None);
        };
        if let Some(limit) = state.embedded_history_limit {
            if let Some(histories) = issue["changelog"]["histories"].as_array_mut() {
                let total = histories.len();
                histories.truncate(limit);
                issue["changelog"]["total"] = json!(total);
                issue["changelog"]["maxResults"] = json!(limit);
            }
        }
        Ok(Some(issue))
    }
}

//! Jira Cloud REST client.
//!
//! Basic auth with an account email and API token. Collection endpoints are
//! offset-paginated with `startAt`/`maxResults`; the platform API reports a
//! `total`, while the agile sprint listing only reports `isLast`. Issue
//! batches go through the bulk fetch endpoint, which answers in one page.

use crate::error::{Error, Result};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, instrument};

use super::source::{Page, RemoteSource, Resource};

/// Maximum number of response body characters echoed into an error.
const BODY_EXCERPT: usize = 300;

/// HTTP-backed [`RemoteSource`] for Jira Cloud.
pub struct JiraClient {
    client: reqwest::Client,
    base_url: String,
    user: String,
    token: String,
}

/// Request path, query parameters, optional JSON body and the response
/// field holding the items. A body makes the request a POST.
#[derive(Debug, PartialEq, Eq)]
struct Endpoint {
    path: String,
    query: Vec<(&'static str, String)>,
    body: Option<Value>,
    items_key: &'static str,
}

impl JiraClient {
    /// Create a client for `base_url` (e.g. `https://acme.atlassian.net`).
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        user: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user: user.into(),
            token: token.into(),
        })
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.user, Some(&self.token))
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await?;
        Ok(response)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<reqwest::Response> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.user, Some(&self.token))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await?;
        Ok(response)
    }
}

fn endpoint(resource: &Resource, start: u64, limit: u32) -> Endpoint {
    let mut query = vec![
        ("startAt", start.to_string()),
        ("maxResults", limit.to_string()),
    ];
    let paged = |path: String, query, items_key| Endpoint {
        path,
        query,
        body: None,
        items_key,
    };

    match resource {
        Resource::Projects => paged("/rest/api/2/project/search".to_string(), query, "values"),
        Resource::Boards { project_key } => {
            query.push(("projectKeyOrId", project_key.clone()));
            paged("/rest/agile/1.0/board".to_string(), query, "values")
        }
        Resource::Sprints { board_id } => {
            paged(format!("/rest/agile/1.0/board/{board_id}/sprint"), query, "values")
        }
        Resource::SprintIssues { sprint_id, fields } => {
            if !fields.is_empty() {
                query.push(("fields", fields.join(",")));
            }
            paged(format!("/rest/agile/1.0/sprint/{sprint_id}/issue"), query, "issues")
        }
        Resource::Changelog { key } => {
            paged(format!("/rest/api/2/issue/{key}/changelog"), query, "values")
        }
        Resource::IssueBatch { keys, fields } => {
            let mut body = json!({ "issueIdsOrKeys": keys });
            if !fields.is_empty() {
                body["fields"] = json!(fields);
            }
            Endpoint {
                path: "/rest/api/2/issue/bulkfetch".to_string(),
                query: Vec::new(),
                body: Some(body),
                items_key: "issues",
            }
        }
    }
}

/// Decode a collection response body into a [`Page`].
fn decode_page(body: &Value, items_key: &str) -> Result<Page> {
    let items = body
        .get(items_key)
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| {
            Error::Transport(format!("unexpected response: missing '{items_key}' array"))
        })?;
    let total = body.get("total").and_then(Value::as_u64);
    // No total and no flag means the endpoint is not paginated.
    let is_last = body.get("isLast").and_then(Value::as_bool).unwrap_or(true);

    Ok(Page {
        items,
        total,
        is_last,
    })
}

async fn error_for_status(path: &str, response: reqwest::Response) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let excerpt: String = body.chars().take(BODY_EXCERPT).collect();
    Error::Transport(format!("GET {path} returned HTTP {status}: {excerpt}"))
}

impl RemoteSource for JiraClient {
    #[instrument(level = "debug", skip(self, resource), fields(resource = %resource))]
    async fn fetch_page(&self, resource: &Resource, start: u64, limit: u32) -> Result<Page> {
        let ep = endpoint(resource, start, limit);
        let response = match &ep.body {
            Some(body) => self.post(&ep.path, body).await?,
            None => self.get(&ep.path, &ep.query).await?,
        };

        if !response.status().is_success() {
            return Err(error_for_status(&ep.path, response).await);
        }

        let body: Value = response.json().await?;
        if let Some(errors) = body
            .get("issueErrors")
            .and_then(Value::as_array)
            .filter(|e| !e.is_empty())
        {
            debug!(skipped = errors.len(), "Bulk fetch skipped unknown keys");
        }
        decode_page(&body, ep.items_key)
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_single(&self, key: &str) -> Result<Option<Value>> {
        let path = format!("/rest/api/2/issue/{key}");
        let query = [("expand", "changelog".to_string())];
        let response = self.get(&path, &query).await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(key, "Issue not found");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(error_for_status(&path, response).await);
        }

        Ok(Some(response.json().await?))
    }
}

//! JIRA Integration Adapter
//!
//! Writes synchronized copies into one Jira project and one agile board,
//! using the REST v2 API for issues, comments, links and versions and the
//! Agile 1.0 API for sprints, estimates and the backlog.

use super::http::{send, send_json};
use super::pagination::{paginate, Page};
use super::retry::RetryConfig;
use super::JiraApi;
use crate::model::{
    IssueFields, JiraField, JiraIssue, JiraIssueRef, NewSprint, RemoteLink, Sprint,
    TransitionOutcome, Version,
};
use crate::{Result, SyncError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

/// Per-request timeout for search/query operations (large result sets)
const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);
/// Per-request timeout for single entity fetches
const GET_TIMEOUT: Duration = Duration::from_secs(10);
/// Per-request timeout for create/update operations
const WRITE_TIMEOUT: Duration = Duration::from_secs(15);

/// Jira accepts at most this many issues per backlog move
const BACKLOG_BATCH: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JiraCredentials {
    pub user: String,
    pub password: String,
}

/// Jira API client bound to a project key and an agile board
pub struct JiraAdapter {
    client: Client,
    api_url: String,
    agile_url: String,
    project_key: String,
    board_id: u64,
    credentials: JiraCredentials,
    retry: RetryConfig,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<JiraIssue>,
}

#[derive(Debug, Deserialize)]
struct SprintPage {
    #[serde(rename = "startAt", default)]
    start_at: u32,
    #[serde(rename = "maxResults", default)]
    max_results: u32,
    #[serde(rename = "isLast", default)]
    is_last: bool,
    #[serde(default)]
    values: Vec<Sprint>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Estimation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Transition {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct TransitionsResponse {
    #[serde(default)]
    transitions: Vec<Transition>,
}

#[derive(Debug, Deserialize)]
struct ProjectResponse {
    id: String,
}

#[derive(Debug, Serialize)]
struct SprintCreate<'a> {
    name: &'a str,
    #[serde(rename = "startDate", skip_serializing_if = "Option::is_none")]
    start_date: Option<DateTime<Utc>>,
    #[serde(rename = "endDate", skip_serializing_if = "Option::is_none")]
    end_date: Option<DateTime<Utc>>,
    #[serde(rename = "originBoardId")]
    origin_board_id: u64,
}

impl JiraAdapter {
    /// Create a new Jira adapter
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(
        base_url: &str,
        project_key: impl Into<String>,
        board_id: u64,
        credentials: JiraCredentials,
    ) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        let base_url = base_url.trim_end_matches('/');

        Ok(Self {
            client,
            api_url: format!("{}/rest/api/2", base_url),
            agile_url: format!("{}/rest/agile/1.0", base_url),
            project_key: project_key.into(),
            board_id,
            credentials,
            retry: RetryConfig::default(),
        })
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn project(&self) -> &str {
        &self.project_key
    }

    pub fn board_id(&self) -> u64 {
        self.board_id
    }

    fn authed(&self, request: RequestBuilder, timeout: Duration) -> RequestBuilder {
        request
            .basic_auth(&self.credentials.user, Some(&self.credentials.password))
            .timeout(timeout)
    }

    fn estimation_url(&self, key: &str) -> String {
        format!(
            "{}/issue/{}/estimation?boardId={}",
            self.agile_url, key, self.board_id
        )
    }

    async fn sprint_page(&self, start_at: u32) -> Result<Page<Sprint>> {
        let url = format!("{}/board/{}/sprint", self.agile_url, self.board_id);
        let request = self.authed(self.client.get(&url), SEARCH_TIMEOUT).query(&[
            ("state", "future,active,closed".to_string()),
            ("startAt", start_at.to_string()),
        ]);
        let operation = format!("list sprints of board {}", self.board_id);
        let page: SprintPage = send_json(&self.retry, &operation, request).await?;

        let next = if page.is_last || page.values.is_empty() {
            None
        } else {
            Some(page.start_at + page.max_results.max(page.values.len() as u32))
        };
        Ok(Page::new(page.values, next))
    }
}

/// JQL selecting project issues whose custom field equals a number
fn field_equals_jql(project_key: &str, field_name: &str, value: u64) -> String {
    format!(
        "project = \"{}\" AND \"{}\" = {}",
        project_key.replace('"', ""),
        field_name.replace('"', ""),
        value
    )
}

/// Jira takes either a planned or an actual release date per request, and
/// derives the planned one from the actual one
fn version_payload(version: &Version) -> Version {
    let mut payload = version.clone();
    if payload.release_date.is_some() {
        payload.user_release_date = None;
    }
    payload
}

#[async_trait]
impl JiraApi for JiraAdapter {
    async fn list_fields(&self) -> Result<Vec<JiraField>> {
        let url = format!("{}/field", self.api_url);
        let request = self.authed(self.client.get(&url), GET_TIMEOUT);
        let fields: Vec<JiraField> = send_json(&self.retry, "list Jira fields", request).await?;
        debug!(count = fields.len(), "Listed Jira fields");
        Ok(fields)
    }

    async fn search_issue_by_field(
        &self,
        field_name: &str,
        value: u64,
    ) -> Result<Option<JiraIssue>> {
        let url = format!("{}/search", self.api_url);
        let jql = field_equals_jql(&self.project_key, field_name, value);
        debug!(jql = %jql, "Searching Jira issue");

        let request = self.authed(self.client.get(&url), SEARCH_TIMEOUT).query(&[
            ("jql", jql.as_str()),
            ("maxResults", "1"),
            ("fields", "*all"),
        ]);
        let operation = format!("search Jira issue with {} {}", field_name, value);
        let result: SearchResponse = send_json(&self.retry, &operation, request).await?;
        Ok(result.issues.into_iter().next())
    }

    async fn create_issue(&self, mut fields: IssueFields) -> Result<JiraIssueRef> {
        let url = format!("{}/issue", self.api_url);
        fields.insert("project".to_string(), json!({ "key": self.project_key }));

        let request = self
            .authed(self.client.post(&url), WRITE_TIMEOUT)
            .json(&json!({ "fields": fields }));
        let created: JiraIssueRef = send_json(&self.retry, "create Jira issue", request).await?;
        info!(key = %created.key, "Created Jira issue");
        Ok(created)
    }

    async fn update_issue(&self, key: &str, fields: IssueFields) -> Result<()> {
        let url = format!("{}/issue/{}", self.api_url, key);
        let request = self
            .authed(self.client.put(&url), WRITE_TIMEOUT)
            .json(&json!({ "fields": fields }));
        send(&self.retry, &format!("update Jira issue {}", key), request).await?;
        info!(key = %key, "Updated Jira issue");
        Ok(())
    }

    async fn set_fix_versions(&self, key: &str, version_ids: &[String]) -> Result<()> {
        let url = format!("{}/issue/{}", self.api_url, key);
        let versions: Vec<Value> = version_ids.iter().map(|id| json!({ "id": id })).collect();
        let request = self
            .authed(self.client.put(&url), WRITE_TIMEOUT)
            .json(&json!({ "fields": { "fixVersions": versions } }));
        send(&self.retry, &format!("set fix versions of {}", key), request).await?;
        Ok(())
    }

    async fn get_estimate(&self, key: &str) -> Result<f64> {
        let request = self.authed(self.client.get(self.estimation_url(key)), GET_TIMEOUT);
        let estimation: Estimation =
            send_json(&self.retry, &format!("get estimate of {}", key), request).await?;
        Ok(estimation.value.unwrap_or(0.0))
    }

    async fn set_estimate(&self, key: &str, value: f64) -> Result<()> {
        let request = self
            .authed(self.client.put(self.estimation_url(key)), WRITE_TIMEOUT)
            .json(&Estimation { value: Some(value) });
        send(&self.retry, &format!("estimate issue {}", key), request).await?;
        Ok(())
    }

    async fn add_comment(&self, key: &str, body: &str) -> Result<()> {
        let url = format!("{}/issue/{}/comment", self.api_url, key);
        let request = self
            .authed(self.client.post(&url), WRITE_TIMEOUT)
            .json(&json!({ "body": body }));
        send(&self.retry, &format!("add comment to {}", key), request).await?;
        Ok(())
    }

    async fn update_comment(&self, key: &str, comment_id: &str, body: &str) -> Result<()> {
        let url = format!("{}/issue/{}/comment/{}", self.api_url, key, comment_id);
        let request = self
            .authed(self.client.put(&url), WRITE_TIMEOUT)
            .json(&json!({ "body": body }));
        let operation = format!("update comment {} of {}", comment_id, key);
        send(&self.retry, &operation, request).await?;
        Ok(())
    }

    async fn list_remote_links(&self, key: &str) -> Result<Vec<RemoteLink>> {
        let url = format!("{}/issue/{}/remotelink", self.api_url, key);
        let request = self.authed(self.client.get(&url), GET_TIMEOUT);
        send_json(&self.retry, &format!("list remote links of {}", key), request).await
    }

    async fn add_remote_link(&self, key: &str, link: &RemoteLink) -> Result<()> {
        let url = format!("{}/issue/{}/remotelink", self.api_url, key);
        let request = self.authed(self.client.post(&url), WRITE_TIMEOUT).json(link);
        send(&self.retry, &format!("add remote link to {}", key), request).await?;
        Ok(())
    }

    async fn transition_issue(&self, key: &str, name: &str) -> Result<TransitionOutcome> {
        let url = format!("{}/issue/{}/transitions", self.api_url, key);
        let request = self.authed(self.client.get(&url), GET_TIMEOUT);
        let available: TransitionsResponse =
            send_json(&self.retry, &format!("list transitions of {}", key), request).await?;

        let Some(transition) = available.transitions.iter().find(|t| t.name == name) else {
            debug!(key = %key, transition = %name, "Transition not offered by workflow");
            return Ok(TransitionOutcome::Unavailable);
        };

        info!(key = %key, transition = %name, "Transitioning Jira issue");
        let request = self
            .authed(self.client.post(&url), WRITE_TIMEOUT)
            .json(&json!({ "transition": { "id": transition.id } }));
        send(&self.retry, &format!("transition {} with {:?}", key, name), request).await?;
        Ok(TransitionOutcome::Applied)
    }

    async fn move_to_backlog(&self, keys: &[String]) -> Result<()> {
        let url = format!("{}/backlog/issue", self.agile_url);
        for batch in keys.chunks(BACKLOG_BATCH) {
            let request = self
                .authed(self.client.post(&url), WRITE_TIMEOUT)
                .json(&json!({ "issues": batch }));
            send(&self.retry, "move issues to backlog", request).await?;
            info!(issues = ?batch, "Moved issues to backlog");
        }
        Ok(())
    }

    async fn list_sprints(&self) -> Result<Vec<Sprint>> {
        let sprints: Vec<Sprint> = paginate(0, |start_at| self.sprint_page(start_at))
            .try_collect()
            .await?;
        info!(board = self.board_id, count = sprints.len(), "Listed Jira sprints");
        Ok(sprints)
    }

    async fn create_sprint(&self, sprint: &NewSprint) -> Result<Sprint> {
        let url = format!("{}/sprint", self.agile_url);
        let body = SprintCreate {
            name: &sprint.name,
            start_date: sprint.start_date,
            end_date: sprint.end_date,
            origin_board_id: self.board_id,
        };
        let request = self.authed(self.client.post(&url), WRITE_TIMEOUT).json(&body);
        let operation = format!("create sprint {:?}", sprint.name);
        send_json(&self.retry, &operation, request).await
    }

    async fn update_sprint(&self, sprint: &Sprint) -> Result<Sprint> {
        let url = format!("{}/sprint/{}", self.agile_url, sprint.id);
        let request = self.authed(self.client.put(&url), WRITE_TIMEOUT).json(sprint);
        let operation = format!("update sprint {:?}", sprint.name);
        send_json(&self.retry, &operation, request).await
    }

    async fn get_project_id(&self) -> Result<u64> {
        let url = format!("{}/project/{}", self.api_url, self.project_key);
        let request = self.authed(self.client.get(&url), GET_TIMEOUT);
        let operation = format!("get Jira project {}", self.project_key);
        let project: ProjectResponse = send_json(&self.retry, &operation, request).await?;
        project.id.parse().map_err(|_| {
            SyncError::Other(format!(
                "Jira project {} has a non-numeric id {:?}",
                self.project_key, project.id
            ))
        })
    }

    async fn list_versions(&self) -> Result<Vec<Version>> {
        let url = format!("{}/project/{}/versions", self.api_url, self.project_key);
        let request = self.authed(self.client.get(&url), SEARCH_TIMEOUT);
        let operation = format!("list versions of {}", self.project_key);
        send_json(&self.retry, &operation, request).await
    }

    async fn create_version(&self, version: &Version) -> Result<Version> {
        let url = format!("{}/version", self.api_url);
        let request = self
            .authed(self.client.post(&url), WRITE_TIMEOUT)
            .json(&version_payload(version));
        let operation = format!("create version {:?}", version.name);
        let created: Version = send_json(&self.retry, &operation, request).await?;
        info!(version = %created.name, id = %created.id, "Created Jira version");
        Ok(created)
    }

    async fn update_version(&self, version: &Version) -> Result<Version> {
        let url = format!("{}/version/{}", self.api_url, version.id);
        let request = self
            .authed(self.client.put(&url), WRITE_TIMEOUT)
            .json(&version_payload(version));
        let operation = format!("update version {:?}", version.name);
        send_json(&self.retry, &operation, request).await
    }
}

//! ZenHub Integration Adapter
//!
//! REST access to the board data ZenHub layers on top of one GitHub
//! repository. ZenHub addresses repositories by their numeric GitHub id.

use super::http::{send, send_json};
use super::retry::RetryConfig;
use super::ZenHubApi;
use crate::model::{Board, Epic, EpicRef, ReleaseIssue, ReleaseReport};
use crate::{Result, SyncError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_API_URL: &str = "https://api.zenhub.io";

/// ZenHub API client bound to one repository id
pub struct ZenHubAdapter {
    client: Client,
    base_url: String,
    repo_id: u64,
    retry: RetryConfig,
}

#[derive(Debug, Deserialize)]
struct EpicList {
    #[serde(default)]
    epic_issues: Vec<EpicRef>,
}

#[derive(Debug, Deserialize)]
struct StartDate {
    #[serde(default)]
    start_date: Option<DateTime<Utc>>,
}

impl ZenHubAdapter {
    pub fn new(api_url: Option<&str>, token: &str, repo_id: u64) -> Result<Self> {
        let token = header::HeaderValue::from_str(token)
            .map_err(|e| SyncError::Config(format!("invalid ZenHub API token: {}", e)))?;

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers({
                let mut headers = header::HeaderMap::new();
                headers.insert("x-authentication-token", token);
                headers.insert(
                    header::USER_AGENT,
                    header::HeaderValue::from_static("tracker-sync/0.3"),
                );
                headers
            })
            .build()?;

        Ok(Self {
            client,
            base_url: api_url
                .unwrap_or(DEFAULT_API_URL)
                .trim_end_matches('/')
                .to_string(),
            repo_id,
            retry: RetryConfig::default(),
        })
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn repo_url(&self, path: &str) -> String {
        format!("{}/p1/repositories/{}{}", self.base_url, self.repo_id, path)
    }
}

#[async_trait]
impl ZenHubApi for ZenHubAdapter {
    async fn get_board(&self) -> Result<Board> {
        let url = self.repo_url("/board");
        debug!(repo_id = self.repo_id, "Fetching ZenHub board");
        let board: Board = send_json(&self.retry, "get ZenHub board", self.client.get(&url)).await?;
        info!(
            repo_id = self.repo_id,
            pipelines = board.pipelines.len(),
            "Fetched ZenHub board"
        );
        Ok(board)
    }

    async fn list_epics(&self) -> Result<Vec<EpicRef>> {
        let url = self.repo_url("/epics");
        let list: EpicList =
            send_json(&self.retry, "list ZenHub epics", self.client.get(&url)).await?;
        Ok(list.epic_issues)
    }

    async fn get_epic(&self, number: u64) -> Result<Epic> {
        let url = self.repo_url(&format!("/epics/{}", number));
        let operation = format!("get ZenHub epic #{}", number);
        let mut epic: Epic = send_json(&self.retry, &operation, self.client.get(&url)).await?;

        epic.issue_number = number;
        epic.repo_id = self.repo_id;
        epic.issues.retain(|child| child.repo_id == self.repo_id);
        Ok(epic)
    }

    async fn get_milestone_start_date(&self, number: u64) -> Result<Option<DateTime<Utc>>> {
        let url = self.repo_url(&format!("/milestones/{}/start_date", number));
        let operation = format!("get start date of milestone #{}", number);
        match send(&self.retry, &operation, self.client.get(&url)).await {
            Ok(response) => {
                let body: StartDate = response.json().await?;
                Ok(body.start_date)
            }
            // ZenHub answers 404 for milestones without a start date
            Err(SyncError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_release_reports(&self) -> Result<Vec<ReleaseReport>> {
        let url = self.repo_url("/reports/releases");
        send_json(&self.retry, "list ZenHub release reports", self.client.get(&url)).await
    }

    async fn list_release_issues(&self, release_id: &str) -> Result<Vec<ReleaseIssue>> {
        let url = format!("{}/p1/reports/release/{}/issues", self.base_url, release_id);
        let operation = format!("list issues of release {}", release_id);
        let mut issues: Vec<ReleaseIssue> =
            send_json(&self.retry, &operation, self.client.get(&url)).await?;
        issues.retain(|issue| issue.repo_id == self.repo_id);
        Ok(issues)
    }
}

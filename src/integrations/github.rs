//! GitHub Integration Adapter
//!
//! Read-only REST access to one repository: issues, milestones and comments.

use super::http::send_json;
use super::pagination::{next_page_number, paginate, Page};
use super::retry::RetryConfig;
use super::GitHubApi;
use crate::model::{GitHubComment, GitHubIssue, GitHubMilestone, ItemState, Repository};
use crate::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::{header, Client};
use std::time::Duration;
use tracing::{debug, info};

/// Per-request timeout for listings (can return large result sets)
const LIST_TIMEOUT: Duration = Duration::from_secs(30);
/// Per-request timeout for single entity fetches
const GET_TIMEOUT: Duration = Duration::from_secs(10);

const PER_PAGE: usize = 100;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// GitHub API client bound to `owner/repository`
pub struct GitHubAdapter {
    client: Client,
    base_url: String,
    owner: String,
    repository: String,
    auth_token: Option<String>,
    retry: RetryConfig,
}

impl GitHubAdapter {
    /// Create a new GitHub adapter
    ///
    /// `api_url` defaults to the public API; GitHub Enterprise hosts are
    /// addressed through their `/api/v3` prefix.
    pub fn new(
        api_url: Option<&str>,
        owner: impl Into<String>,
        repository: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers({
                let mut headers = header::HeaderMap::new();
                headers.insert(
                    header::USER_AGENT,
                    header::HeaderValue::from_static("tracker-sync/0.3"),
                );
                headers.insert(
                    header::ACCEPT,
                    header::HeaderValue::from_static("application/vnd.github.v3+json"),
                );
                headers
            })
            .build()?;

        Ok(Self {
            client,
            base_url: rest_base_url(api_url.unwrap_or(DEFAULT_API_URL)),
            owner: owner.into(),
            repository: repository.into(),
            auth_token: None,
            retry: RetryConfig::default(),
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// `owner/repository`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repository)
    }

    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}{}",
            self.base_url, self.owner, self.repository, path
        )
    }

    fn get(&self, url: &str, timeout: Duration) -> reqwest::RequestBuilder {
        let request = self.client.get(url).timeout(timeout);
        match self.auth_token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn list_page<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        url: &str,
        state: &str,
        page: u32,
    ) -> Result<Page<T>> {
        debug!(url = %url, page, "Fetching GitHub page");
        let request = self.get(url, LIST_TIMEOUT).query(&[
            ("state", state.to_string()),
            ("per_page", PER_PAGE.to_string()),
            ("page", page.to_string()),
        ]);
        let items: Vec<T> = send_json(&self.retry, operation, request).await?;
        let next = next_page_number(page, items.len(), PER_PAGE);
        Ok(Page::new(items, next))
    }
}

/// REST root for a configured GitHub URL
fn rest_base_url(api_url: &str) -> String {
    let base_url = api_url.trim_end_matches('/');
    if base_url.contains("api.github.com") || base_url.ends_with("/api/v3") {
        base_url.to_string()
    } else if base_url.contains("github.com") {
        DEFAULT_API_URL.to_string()
    } else {
        format!("{}/api/v3", base_url)
    }
}

#[async_trait]
impl GitHubApi for GitHubAdapter {
    async fn get_repository(&self) -> Result<Repository> {
        let url = self.repo_url("");
        debug!(repository = %self.full_name(), "Fetching GitHub repository");
        let operation = format!("get GitHub repository {}", self.full_name());
        send_json(&self.retry, &operation, self.get(&url, GET_TIMEOUT)).await
    }

    async fn get_repository_by_id(&self, id: u64) -> Result<Repository> {
        let url = format!("{}/repositories/{}", self.base_url, id);
        let operation = format!("get GitHub repository with id {}", id);
        send_json(&self.retry, &operation, self.get(&url, GET_TIMEOUT)).await
    }

    async fn get_issue(&self, number: u64) -> Result<GitHubIssue> {
        let url = self.repo_url(&format!("/issues/{}", number));
        debug!(repository = %self.full_name(), number, "Fetching GitHub issue");
        let operation = format!("get issue {}#{}", self.full_name(), number);
        send_json(&self.retry, &operation, self.get(&url, GET_TIMEOUT)).await
    }

    async fn list_issues(&self, state: ItemState) -> Result<Vec<GitHubIssue>> {
        let url = self.repo_url("/issues");
        let operation = format!("list {} issues of {}", state, self.full_name());
        let issues: Vec<GitHubIssue> = paginate(1, |page| {
            self.list_page(&operation, &url, state.as_str(), page)
        })
        .try_collect()
        .await?;

        info!(repository = %self.full_name(), state = %state, count = issues.len(), "Listed GitHub issues");
        Ok(issues)
    }

    async fn list_milestones(&self) -> Result<Vec<GitHubMilestone>> {
        let url = self.repo_url("/milestones");
        let operation = format!("list milestones of {}", self.full_name());
        let milestones: Vec<GitHubMilestone> =
            paginate(1, |page| self.list_page(&operation, &url, "all", page))
                .try_collect()
                .await?;

        info!(repository = %self.full_name(), count = milestones.len(), "Listed GitHub milestones");
        Ok(milestones)
    }

    async fn list_comments(&self, number: u64) -> Result<Vec<GitHubComment>> {
        let url = self.repo_url(&format!("/issues/{}/comments", number));
        let operation = format!("list comments of {}#{}", self.full_name(), number);
        paginate(1, |page| self.list_page(&operation, &url, "all", page))
            .try_collect()
            .await
    }
}

//! External Integrations
//!
//! One capability trait per remote service, each bound to the repository,
//! board or project of a single synchronization pairing, plus the
//! reqwest-backed adapters implementing them.
//!
//! # Services
//!
//! - **GitHub**: REST API, origin of issue content, milestones and comments
//! - **ZenHub**: REST API, board pipelines, epics, estimates, milestone
//!   start dates and release reports layered on a GitHub repository
//! - **Jira**: REST v2 and Agile APIs, the tracker receiving the copies
//!
//! Reconcilers only see the traits, so tests drive them with in-memory
//! doubles.

pub mod github;
pub mod http;
pub mod jira;
pub mod pagination;
pub mod retry;
pub mod zenhub;

use crate::model::{
    Board, Epic, EpicRef, GitHubComment, GitHubIssue, GitHubMilestone, IssueFields, ItemState,
    JiraField, JiraIssue, JiraIssueRef, NewSprint, ReleaseIssue, ReleaseReport, RemoteLink,
    Repository, Sprint, TransitionOutcome, Version,
};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use github::GitHubAdapter;
pub use jira::{JiraAdapter, JiraCredentials};
pub use pagination::{paginate, Page};
pub use retry::{with_retry, RetryConfig, RetryDecision, RetryableError};
pub use zenhub::ZenHubAdapter;

/// Origin system, bound to one repository
#[async_trait]
pub trait GitHubApi: Send + Sync {
    async fn get_repository(&self) -> Result<Repository>;

    async fn get_repository_by_id(&self, id: u64) -> Result<Repository>;

    async fn get_issue(&self, number: u64) -> Result<GitHubIssue>;

    /// Issues (pull requests included) in the given state, every page
    async fn list_issues(&self, state: ItemState) -> Result<Vec<GitHubIssue>>;

    /// Milestones in every state
    async fn list_milestones(&self) -> Result<Vec<GitHubMilestone>>;

    async fn list_comments(&self, number: u64) -> Result<Vec<GitHubComment>>;
}

/// Board system, bound to one repository id
#[async_trait]
pub trait ZenHubApi: Send + Sync {
    async fn get_board(&self) -> Result<Board>;

    async fn list_epics(&self) -> Result<Vec<EpicRef>>;

    /// Epic with its children, restricted to the bound repository
    async fn get_epic(&self, number: u64) -> Result<Epic>;

    async fn get_milestone_start_date(&self, number: u64) -> Result<Option<DateTime<Utc>>>;

    async fn list_release_reports(&self) -> Result<Vec<ReleaseReport>>;

    /// Issues of a release, restricted to the bound repository
    async fn list_release_issues(&self, release_id: &str) -> Result<Vec<ReleaseIssue>>;
}

/// Tracker system, bound to one project and one agile board
#[async_trait]
pub trait JiraApi: Send + Sync {
    async fn list_fields(&self) -> Result<Vec<JiraField>>;

    /// First issue of the project whose custom field `field_name` equals `value`
    async fn search_issue_by_field(&self, field_name: &str, value: u64)
        -> Result<Option<JiraIssue>>;

    /// Create an issue in the bound project; `fields` must not carry the project
    async fn create_issue(&self, fields: IssueFields) -> Result<JiraIssueRef>;

    async fn update_issue(&self, key: &str, fields: IssueFields) -> Result<()>;

    /// Replace the fix versions of an issue
    async fn set_fix_versions(&self, key: &str, version_ids: &[String]) -> Result<()>;

    async fn get_estimate(&self, key: &str) -> Result<f64>;

    async fn set_estimate(&self, key: &str, value: f64) -> Result<()>;

    async fn add_comment(&self, key: &str, body: &str) -> Result<()>;

    async fn update_comment(&self, key: &str, comment_id: &str, body: &str) -> Result<()>;

    async fn list_remote_links(&self, key: &str) -> Result<Vec<RemoteLink>>;

    async fn add_remote_link(&self, key: &str, link: &RemoteLink) -> Result<()>;

    /// Apply the workflow transition called `name`, if the issue offers it
    async fn transition_issue(&self, key: &str, name: &str) -> Result<TransitionOutcome>;

    async fn move_to_backlog(&self, keys: &[String]) -> Result<()>;

    /// Sprints of the bound board, every page
    async fn list_sprints(&self) -> Result<Vec<Sprint>>;

    async fn create_sprint(&self, sprint: &NewSprint) -> Result<Sprint>;

    async fn update_sprint(&self, sprint: &Sprint) -> Result<Sprint>;

    async fn get_project_id(&self) -> Result<u64>;

    async fn list_versions(&self) -> Result<Vec<Version>>;

    async fn create_version(&self, version: &Version) -> Result<Version>;

    async fn update_version(&self, version: &Version) -> Result<Version>;
}

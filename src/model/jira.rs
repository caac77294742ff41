//! Jira representations (tracker system)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Field payload for issue create/update calls, keyed by Jira field id
pub type IssueFields = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraIssue {
    pub id: String,
    pub key: String,
    pub fields: JiraFields,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JiraFields {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "issuetype", default)]
    pub issue_type: Option<JiraIssueType>,
    #[serde(default)]
    pub status: Option<JiraStatus>,
    #[serde(default)]
    pub components: Vec<JiraComponent>,
    #[serde(rename = "fixVersions", default)]
    pub fix_versions: Vec<VersionRef>,
    #[serde(default)]
    pub comment: Option<JiraCommentPage>,
    /// Everything else, custom fields included, keyed by field id
    #[serde(flatten)]
    pub other: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraIssueType {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraStatus {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JiraComponent {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRef {
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JiraCommentPage {
    #[serde(default)]
    pub comments: Vec<JiraComment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraComment {
    pub id: String,
    #[serde(default)]
    pub body: String,
}

impl JiraIssue {
    /// Value of a field by id; JSON `null` counts as absent
    pub fn field(&self, id: &str) -> Option<&Value> {
        self.fields.other.get(id).filter(|v| !v.is_null())
    }

    pub fn issue_type_name(&self) -> &str {
        self.fields
            .issue_type
            .as_ref()
            .map(|t| t.name.as_str())
            .unwrap_or_default()
    }

    pub fn status_name(&self) -> &str {
        self.fields
            .status
            .as_ref()
            .map(|s| s.name.as_str())
            .unwrap_or_default()
    }

    pub fn comments(&self) -> &[JiraComment] {
        self.fields
            .comment
            .as_ref()
            .map(|c| c.comments.as_slice())
            .unwrap_or_default()
    }
}

/// Identity returned by issue creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JiraIssueRef {
    pub id: String,
    pub key: String,
}

/// Field metadata, used to resolve custom field ids from display names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraField {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub custom: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SprintState {
    Future,
    Active,
    Closed,
}

impl SprintState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SprintState::Future => "future",
            SprintState::Active => "active",
            SprintState::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sprint {
    pub id: u64,
    pub name: String,
    pub state: SprintState,
    #[serde(rename = "startDate", default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(rename = "endDate", default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(rename = "completeDate", default, skip_serializing_if = "Option::is_none")]
    pub complete_date: Option<DateTime<Utc>>,
    #[serde(rename = "originBoardId", default, skip_serializing_if = "Option::is_none")]
    pub origin_board_id: Option<u64>,
}

/// Sprint creation request; the adapter fills in the board
#[derive(Debug, Clone, PartialEq)]
pub struct NewSprint {
    pub name: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Version {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub released: bool,
    #[serde(default)]
    pub archived: bool,
    /// `%Y-%m-%d`
    #[serde(rename = "startDate", default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    /// `%-d/%b/%Y`, the format Jira displays and accepts for planned dates
    #[serde(rename = "userReleaseDate", default, skip_serializing_if = "Option::is_none")]
    pub user_release_date: Option<String>,
    /// `%Y-%m-%d`
    #[serde(rename = "releaseDate", default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(rename = "projectId", default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLink {
    #[serde(rename = "globalId", default, skip_serializing_if = "Option::is_none")]
    pub global_id: Option<String>,
    pub object: RemoteLinkObject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLinkObject {
    pub url: String,
    pub title: String,
}

/// Outcome of a transition-by-name request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied,
    /// The issue's workflow has no transition with that name
    Unavailable,
}

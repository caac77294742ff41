//! ZenHub representations (board decorations on top of GitHub)

use super::github::ItemState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Estimate {
    pub value: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardIssue {
    pub issue_number: u64,
    #[serde(default)]
    pub estimate: Option<Estimate>,
    #[serde(default)]
    pub is_epic: bool,
    #[serde(default)]
    pub position: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub issues: Vec<BoardIssue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Board {
    #[serde(default)]
    pub pipelines: Vec<Pipeline>,
}

/// Entry of the epic listing of a repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpicRef {
    pub issue_number: u64,
    pub repo_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRef {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpicChild {
    pub issue_number: u64,
    pub repo_id: u64,
    #[serde(default)]
    pub is_epic: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Epic {
    /// Filled by the adapter, the epic payload does not carry its own number
    #[serde(default)]
    pub issue_number: u64,
    #[serde(default)]
    pub repo_id: u64,
    #[serde(default)]
    pub estimate: Option<Estimate>,
    #[serde(default)]
    pub pipeline: Option<PipelineRef>,
    #[serde(default)]
    pub issues: Vec<EpicChild>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseReport {
    pub release_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub state: ItemState,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub desired_end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseIssue {
    pub issue_number: u64,
    pub repo_id: u64,
}

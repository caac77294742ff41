//! Origin-side snapshots assembled from GitHub data and ZenHub decorations

use super::github::{GitHubIssue, GitHubMilestone, ItemState};
use chrono::{DateTime, Utc};

/// ZenHub board data attached to a GitHub issue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardDecoration {
    pub is_epic: bool,
    pub estimate: Option<i64>,
    pub pipeline: Option<String>,
}

/// A GitHub issue as the synchronization sees it
///
/// Built fresh for every run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceIssue {
    /// Numeric identity, the correlation key stored in Jira
    pub id: u64,
    pub number: u64,
    pub repo_id: u64,
    pub title: String,
    pub body: String,
    pub state: ItemState,
    pub html_url: String,
    pub author: Option<String>,
    pub labels: Vec<String>,
    pub milestone: Option<String>,
    pub comment_count: u32,
    pub is_epic: bool,
    pub estimate: Option<i64>,
    pub pipeline: Option<String>,
}

impl SourceIssue {
    pub fn new(issue: GitHubIssue, repo_id: u64, decoration: BoardDecoration) -> Self {
        Self {
            id: issue.id,
            number: issue.number,
            repo_id,
            title: issue.title,
            body: issue.body.unwrap_or_default(),
            state: issue.state,
            html_url: issue.html_url,
            author: issue.user.map(|u| u.login),
            labels: issue.labels.into_iter().map(|l| l.name).collect(),
            milestone: issue.milestone.map(|m| m.title),
            comment_count: issue.comments,
            is_epic: decoration.is_epic,
            estimate: decoration.estimate,
            pipeline: decoration.pipeline,
        }
    }

    /// Labels in origin order, space separated
    pub fn joined_labels(&self) -> String {
        self.labels.join(" ")
    }

    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l == name)
    }

    /// Board coordinate used by the epic and release indexes
    pub fn coordinate(&self) -> (u64, u64) {
        (self.repo_id, self.number)
    }
}

/// A GitHub milestone with its ZenHub start date
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMilestone {
    pub number: u64,
    pub title: String,
    pub state: ItemState,
    pub start_date: Option<DateTime<Utc>>,
    pub due_on: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl SourceMilestone {
    pub fn new(milestone: GitHubMilestone, start_date: Option<DateTime<Utc>>) -> Self {
        Self {
            number: milestone.number,
            title: milestone.title,
            state: milestone.state,
            start_date,
            due_on: milestone.due_on,
            closed_at: milestone.closed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::github::{GitHubLabel, GitHubUser};

    #[test]
    fn test_source_issue_from_github_and_board() {
        let issue = GitHubIssue {
            id: 99,
            number: 4,
            title: "Add login".to_string(),
            body: None,
            state: ItemState::Open,
            html_url: "https://github.com/octo/app/issues/4".to_string(),
            user: Some(GitHubUser {
                login: "octocat".to_string(),
            }),
            labels: vec![
                GitHubLabel {
                    name: "feature".to_string(),
                },
                GitHubLabel {
                    name: "ui".to_string(),
                },
            ],
            milestone: None,
            comments: 0,
            pull_request: None,
        };
        let source = SourceIssue::new(
            issue,
            55,
            BoardDecoration {
                is_epic: false,
                estimate: Some(5),
                pipeline: Some("In Progress".to_string()),
            },
        );

        assert_eq!(source.body, "");
        assert_eq!(source.joined_labels(), "feature ui");
        assert!(source.has_label("ui"));
        assert_eq!(source.coordinate(), (55, 4));
        assert_eq!(source.author.as_deref(), Some("octocat"));
    }
}

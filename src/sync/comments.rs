//! Comment mirroring
//!
//! Each GitHub comment is copied into the Jira issue with a marker holding
//! the GitHub comment id, which is how later runs find it again.

use super::{Services, SyncReport};
use crate::model::{GitHubComment, JiraComment, SourceIssue};
use crate::{Result, ResultExt};
use tracing::{debug, info};

/// Write needed to bring one Jira comment in line with GitHub
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentAction {
    Create { body: String },
    Update { comment_id: String, body: String },
}

pub fn comment_marker(github_comment_id: u64) -> String {
    format!("GitHub Comment: ID: [{}]", github_comment_id)
}

/// Jira body for a GitHub comment
pub fn comment_body(comment: &GitHubComment) -> String {
    let login = comment
        .user
        .as_ref()
        .map(|u| u.login.as_str())
        .unwrap_or_default();
    format!(
        "GitHub Comment: ID: [{}], User: [{}]\n\n---------------------\n\n{}",
        comment.id,
        login,
        comment.body.as_deref().unwrap_or_default()
    )
}

/// Writes needed for `origin` comments given the comments already in Jira
///
/// A Jira comment is left alone as long as it still contains the GitHub
/// body, so edits made around the copied text survive.
pub fn plan_comments(origin: &[GitHubComment], existing: &[JiraComment]) -> Vec<CommentAction> {
    origin
        .iter()
        .filter_map(|comment| {
            let marker = comment_marker(comment.id);
            match existing.iter().find(|c| c.body.contains(&marker)) {
                None => Some(CommentAction::Create {
                    body: comment_body(comment),
                }),
                Some(jira_comment) => {
                    let body = comment.body.as_deref().unwrap_or_default();
                    (!jira_comment.body.contains(body)).then(|| CommentAction::Update {
                        comment_id: jira_comment.id.clone(),
                        body: comment_body(comment),
                    })
                }
            }
        })
        .collect()
}

/// Mirror the comments of `issue` into Jira issue `key`
pub async fn sync_comments(
    services: Services<'_>,
    issue: &SourceIssue,
    key: &str,
    existing: &[JiraComment],
    report: &mut SyncReport,
) -> Result<()> {
    if issue.comment_count == 0 {
        return Ok(());
    }

    let origin = services
        .github
        .list_comments(issue.number)
        .await
        .context(|| format!("list comments of GitHub issue #{}", issue.number))?;

    for action in plan_comments(&origin, existing) {
        match action {
            CommentAction::Create { body } => {
                services
                    .jira
                    .add_comment(key, &body)
                    .await
                    .context(|| format!("add comment to {}", key))?;
                report.comments_created += 1;
                info!(key = %key, number = issue.number, "Copied GitHub comment");
            }
            CommentAction::Update { comment_id, body } => {
                services
                    .jira
                    .update_comment(key, &comment_id, &body)
                    .await
                    .context(|| format!("update comment {} of {}", comment_id, key))?;
                report.comments_updated += 1;
                debug!(key = %key, comment_id = %comment_id, "Refreshed copied comment");
            }
        }
    }

    Ok(())
}

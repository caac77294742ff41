//! Data model
//!
//! Wire representations of the three remote systems plus the origin-side
//! snapshots the reconcilers work on.

pub mod fields;
pub mod github;
pub mod jira;
pub mod source;
pub mod zenhub;

pub use fields::{CustomField, FieldIds};
pub use github::{
    GitHubComment, GitHubIssue, GitHubLabel, GitHubMilestone, GitHubUser, ItemState, Repository,
};
pub use jira::{
    IssueFields, JiraComment, JiraCommentPage, JiraComponent, JiraField, JiraFields, JiraIssue,
    JiraIssueRef, JiraIssueType, JiraStatus, NewSprint, RemoteLink, RemoteLinkObject, Sprint,
    SprintState, TransitionOutcome, Version, VersionRef,
};
pub use source::{BoardDecoration, SourceIssue, SourceMilestone};
pub use zenhub::{
    Board, BoardIssue, Epic, EpicChild, EpicRef, Estimate, Pipeline, PipelineRef, ReleaseIssue,
    ReleaseReport,
};

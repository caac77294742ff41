//! In-memory doubles of the three services
//!
//! The Jira double keeps real state (issues, sprints, versions, links,
//! estimates) so a second run can be checked for idempotence, and records
//! every write call in order.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracker_sync::integrations::{GitHubApi, JiraApi, ZenHubApi};
use tracker_sync::model::{
    Board, BoardIssue, CustomField, Epic, EpicChild, EpicRef, Estimate, GitHubComment,
    GitHubIssue, GitHubLabel, GitHubMilestone, GitHubUser, IssueFields, ItemState, JiraComment,
    JiraCommentPage, JiraComponent, JiraField, JiraFields, JiraIssue, JiraIssueRef,
    JiraIssueType, JiraStatus, NewSprint, Pipeline, ReleaseIssue, ReleaseReport, RemoteLink,
    Repository, Sprint, SprintState, TransitionOutcome, Version, VersionRef,
};
use tracker_sync::sync::Services;
use tracker_sync::{Result, SyncError};

pub const REPO_ID: u64 = 10;
pub const OTHER_REPO_ID: u64 = 20;
pub const PROJECT_ID: u64 = 10000;

pub fn at(month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, month, day, 9, 0, 0).unwrap()
}

/// Jira field id used by the doubles for a custom field
pub fn field_id(field: CustomField) -> String {
    format!("customfield_{}", 10100 + field as usize)
}

pub fn repository() -> Repository {
    Repository {
        id: REPO_ID,
        name: "app".to_string(),
        full_name: "octo/app".to_string(),
        html_url: "https://github.com/octo/app".to_string(),
    }
}

pub fn milestone(number: u64, title: &str, state: ItemState) -> GitHubMilestone {
    GitHubMilestone {
        number,
        title: title.to_string(),
        state,
        due_on: None,
        closed_at: None,
    }
}

/// Open issue `number` with GitHub id `1000 + number`
pub fn issue(number: u64, title: &str) -> GitHubIssue {
    GitHubIssue {
        id: 1000 + number,
        number,
        title: title.to_string(),
        body: Some(format!("Body of {}", title)),
        state: ItemState::Open,
        html_url: format!("https://github.com/octo/app/issues/{}", number),
        user: Some(GitHubUser {
            login: "octocat".to_string(),
        }),
        labels: Vec::new(),
        milestone: None,
        comments: 0,
        pull_request: None,
    }
}

pub fn with_labels(mut issue: GitHubIssue, labels: &[&str]) -> GitHubIssue {
    issue.labels = labels
        .iter()
        .map(|name| GitHubLabel {
            name: name.to_string(),
        })
        .collect();
    issue
}

pub fn in_milestone(mut issue: GitHubIssue, title: &str) -> GitHubIssue {
    issue.milestone = Some(milestone(1, title, ItemState::Open));
    issue
}

pub fn comment(id: u64, body: &str) -> GitHubComment {
    GitHubComment {
        id,
        body: Some(body.to_string()),
        user: Some(GitHubUser {
            login: "reviewer".to_string(),
        }),
    }
}

pub fn board_issue(number: u64, estimate: Option<i64>) -> BoardIssue {
    BoardIssue {
        issue_number: number,
        estimate: estimate.map(|value| Estimate { value }),
        is_epic: false,
        position: None,
    }
}

pub fn pipeline(name: &str, issues: Vec<BoardIssue>) -> Pipeline {
    Pipeline {
        id: name.to_lowercase(),
        name: name.to_string(),
        issues,
    }
}

pub fn release(id: &str, title: &str, state: ItemState) -> ReleaseReport {
    ReleaseReport {
        release_id: id.to_string(),
        title: title.to_string(),
        description: format!("Release {}", title),
        state,
        start_date: Some(at(1, 8)),
        desired_end_date: Some(at(2, 1)),
        closed_at: None,
    }
}

pub fn epic(number: u64, children: &[(u64, u64)]) -> Epic {
    Epic {
        issue_number: number,
        repo_id: REPO_ID,
        estimate: None,
        pipeline: None,
        issues: children
            .iter()
            .map(|&(repo_id, issue_number)| EpicChild {
                issue_number,
                repo_id,
                is_epic: false,
            })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// GitHub

#[derive(Default)]
pub struct GitHubState {
    pub issues: Vec<GitHubIssue>,
    pub milestones: Vec<GitHubMilestone>,
    pub comments: HashMap<u64, Vec<GitHubComment>>,
    pub repositories: HashMap<u64, Repository>,
}

pub struct FakeGitHub {
    repository: Repository,
    state: Mutex<GitHubState>,
}

impl FakeGitHub {
    pub fn new() -> Self {
        Self {
            repository: repository(),
            state: Mutex::new(GitHubState::default()),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, GitHubState> {
        self.state.lock().unwrap()
    }

    pub fn add_issue(&self, issue: GitHubIssue) {
        self.state().issues.push(issue);
    }

    pub fn edit_issue(&self, number: u64, edit: impl FnOnce(&mut GitHubIssue)) {
        let mut state = self.state();
        let issue = state
            .issues
            .iter_mut()
            .find(|i| i.number == number)
            .unwrap();
        edit(issue);
    }
}

#[async_trait]
impl GitHubApi for FakeGitHub {
    async fn get_repository(&self) -> Result<Repository> {
        Ok(self.repository.clone())
    }

    async fn get_repository_by_id(&self, id: u64) -> Result<Repository> {
        self.state()
            .repositories
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("get repository", id))
    }

    async fn get_issue(&self, number: u64) -> Result<GitHubIssue> {
        self.state()
            .issues
            .iter()
            .find(|i| i.number == number)
            .cloned()
            .ok_or_else(|| not_found("get issue", number))
    }

    async fn list_issues(&self, state: ItemState) -> Result<Vec<GitHubIssue>> {
        Ok(self
            .state()
            .issues
            .iter()
            .filter(|i| i.state == state)
            .cloned()
            .collect())
    }

    async fn list_milestones(&self) -> Result<Vec<GitHubMilestone>> {
        Ok(self.state().milestones.clone())
    }

    async fn list_comments(&self, number: u64) -> Result<Vec<GitHubComment>> {
        Ok(self
            .state()
            .comments
            .get(&number)
            .cloned()
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// ZenHub

#[derive(Default)]
pub struct ZenHubState {
    pub board: Board,
    pub epics: Vec<EpicRef>,
    pub epic_details: HashMap<u64, Epic>,
    pub start_dates: HashMap<u64, DateTime<Utc>>,
    pub releases: Vec<ReleaseReport>,
    pub release_issues: HashMap<String, Vec<ReleaseIssue>>,
}

#[derive(Default)]
pub struct FakeZenHub {
    state: Mutex<ZenHubState>,
}

impl FakeZenHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, ZenHubState> {
        self.state.lock().unwrap()
    }

    pub fn set_board(&self, pipelines: Vec<Pipeline>) {
        self.state().board = Board { pipelines };
    }

    pub fn add_epic(&self, epic: Epic) {
        let mut state = self.state();
        state.epics.push(EpicRef {
            issue_number: epic.issue_number,
            repo_id: epic.repo_id,
        });
        state.epic_details.insert(epic.issue_number, epic);
    }

    pub fn add_release(&self, release: ReleaseReport, numbers: &[u64]) {
        let mut state = self.state();
        state.release_issues.insert(
            release.release_id.clone(),
            numbers
                .iter()
                .map(|&issue_number| ReleaseIssue {
                    issue_number,
                    repo_id: REPO_ID,
                })
                .collect(),
        );
        state.releases.push(release);
    }
}

#[async_trait]
impl ZenHubApi for FakeZenHub {
    async fn get_board(&self) -> Result<Board> {
        Ok(self.state().board.clone())
    }

    async fn list_epics(&self) -> Result<Vec<EpicRef>> {
        Ok(self.state().epics.clone())
    }

    async fn get_epic(&self, number: u64) -> Result<Epic> {
        self.state()
            .epic_details
            .get(&number)
            .cloned()
            .ok_or_else(|| not_found("get epic", number))
    }

    async fn get_milestone_start_date(&self, number: u64) -> Result<Option<DateTime<Utc>>> {
        Ok(self.state().start_dates.get(&number).copied())
    }

    async fn list_release_reports(&self) -> Result<Vec<ReleaseReport>> {
        Ok(self.state().releases.clone())
    }

    async fn list_release_issues(&self, release_id: &str) -> Result<Vec<ReleaseIssue>> {
        Ok(self
            .state()
            .release_issues
            .get(release_id)
            .cloned()
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Jira

pub struct JiraState {
    pub fields: Vec<JiraField>,
    pub issues: Vec<JiraIssue>,
    /// Forced search answers by GitHub id
    pub search_overrides: HashMap<u64, JiraIssue>,
    pub estimates: HashMap<String, f64>,
    pub failing_estimates: bool,
    pub remote_links: HashMap<String, Vec<RemoteLink>>,
    /// Transition names offered by every issue
    pub transitions: Vec<String>,
    /// Every transition request, applied or not
    pub transition_attempts: Vec<String>,
    pub sprints: Vec<Sprint>,
    pub versions: Vec<Version>,
    /// Every write call, in order
    pub writes: Vec<String>,
    next_id: u64,
}

pub struct FakeJira {
    state: Mutex<JiraState>,
}

impl FakeJira {
    pub fn new() -> Self {
        let fields = CustomField::ALL
            .iter()
            .map(|f| JiraField {
                id: field_id(*f),
                name: f.display_name().to_string(),
                custom: true,
            })
            .chain(std::iter::once(JiraField {
                id: "summary".to_string(),
                name: "Summary".to_string(),
                custom: false,
            }))
            .collect();

        Self {
            state: Mutex::new(JiraState {
                fields,
                issues: Vec::new(),
                search_overrides: HashMap::new(),
                estimates: HashMap::new(),
                failing_estimates: false,
                remote_links: HashMap::new(),
                transitions: vec!["Close Issue".to_string()],
                transition_attempts: Vec::new(),
                sprints: Vec::new(),
                versions: Vec::new(),
                writes: Vec::new(),
                next_id: 1,
            }),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, JiraState> {
        self.state.lock().unwrap()
    }

    pub fn writes(&self) -> Vec<String> {
        self.state().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state().writes.clear();
    }

    pub fn issue(&self, key: &str) -> JiraIssue {
        self.state()
            .issues
            .iter()
            .find(|i| i.key == key)
            .cloned()
            .unwrap()
    }

    /// Issue correlated with GitHub id `github_id`
    pub fn issue_for(&self, github_id: u64) -> Option<JiraIssue> {
        let id = field_id(CustomField::GitHubId);
        self.state()
            .issues
            .iter()
            .find(|i| i.field(&id).and_then(Value::as_u64) == Some(github_id))
            .cloned()
    }

    pub fn add_sprint(&self, name: &str, state: SprintState) -> Sprint {
        let mut jira = self.state();
        let sprint = Sprint {
            id: 100 + jira.sprints.len() as u64,
            name: name.to_string(),
            state,
            start_date: None,
            end_date: None,
            complete_date: None,
            origin_board_id: Some(1),
        };
        jira.sprints.push(sprint.clone());
        sprint
    }

    /// Insert an existing issue as if created by an earlier run
    pub fn seed_issue(&self, key: &str, issue_type: &str, fields: IssueFields) {
        let mut jira = self.state();
        let mut issue = JiraIssue {
            id: format!("{}", 20000 + jira.issues.len()),
            key: key.to_string(),
            fields: JiraFields {
                issue_type: Some(JiraIssueType {
                    name: issue_type.to_string(),
                }),
                status: Some(JiraStatus {
                    name: "To Do".to_string(),
                }),
                ..Default::default()
            },
        };
        apply_fields(&mut issue, fields);
        jira.issues.push(issue);
    }

    fn record(&self, call: String) {
        self.state().writes.push(call);
    }
}

fn apply_fields(issue: &mut JiraIssue, fields: IssueFields) {
    for (key, value) in fields {
        match key.as_str() {
            "summary" => issue.fields.summary = value.as_str().unwrap_or_default().to_string(),
            "description" => issue.fields.description = value.as_str().map(str::to_string),
            "issuetype" => {
                issue.fields.issue_type = value["name"].as_str().map(|name| JiraIssueType {
                    name: name.to_string(),
                })
            }
            "components" => {
                issue.fields.components = value
                    .as_array()
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|c| c["name"].as_str())
                            .map(|name| JiraComponent {
                                name: name.to_string(),
                            })
                            .collect()
                    })
                    .unwrap_or_default()
            }
            _ => {
                issue.fields.other.insert(key, value);
            }
        }
    }
}

fn not_found(operation: &str, id: impl std::fmt::Display) -> SyncError {
    SyncError::Status {
        operation: format!("{} {}", operation, id),
        status: 404,
        body: "Not Found".to_string(),
    }
}

#[async_trait]
impl JiraApi for FakeJira {
    async fn list_fields(&self) -> Result<Vec<JiraField>> {
        Ok(self.state().fields.clone())
    }

    async fn search_issue_by_field(
        &self,
        field_name: &str,
        value: u64,
    ) -> Result<Option<JiraIssue>> {
        assert_eq!(field_name, "GitHub ID");
        let forced = self.state().search_overrides.get(&value).cloned();
        Ok(forced.or_else(|| self.issue_for(value)))
    }

    async fn create_issue(&self, fields: IssueFields) -> Result<JiraIssueRef> {
        let mut jira = self.state();
        let id = jira.next_id;
        jira.next_id += 1;
        let mut issue = JiraIssue {
            id: format!("{}", 10000 + id),
            key: format!("PROJ-{}", id),
            fields: JiraFields {
                status: Some(JiraStatus {
                    name: "To Do".to_string(),
                }),
                ..Default::default()
            },
        };
        apply_fields(&mut issue, fields);
        let created = JiraIssueRef {
            id: issue.id.clone(),
            key: issue.key.clone(),
        };
        jira.issues.push(issue);
        jira.writes.push(format!("create_issue {}", created.key));
        Ok(created)
    }

    async fn update_issue(&self, key: &str, fields: IssueFields) -> Result<()> {
        let mut names: Vec<String> = fields.keys().cloned().collect();
        names.sort();
        {
            let mut jira = self.state();
            let issue = jira
                .issues
                .iter_mut()
                .find(|i| i.key == key)
                .ok_or_else(|| not_found("update issue", key))?;
            apply_fields(issue, fields);
        }
        self.record(format!("update_issue {} {}", key, names.join(",")));
        Ok(())
    }

    async fn set_fix_versions(&self, key: &str, version_ids: &[String]) -> Result<()> {
        {
            let mut jira = self.state();
            let issue = jira
                .issues
                .iter_mut()
                .find(|i| i.key == key)
                .ok_or_else(|| not_found("set fix versions", key))?;
            issue.fields.fix_versions = version_ids
                .iter()
                .map(|id| VersionRef { id: id.clone() })
                .collect();
        }
        self.record(format!("set_fix_versions {} {}", key, version_ids.join(",")));
        Ok(())
    }

    async fn get_estimate(&self, key: &str) -> Result<f64> {
        let jira = self.state();
        if jira.failing_estimates {
            return Err(SyncError::Status {
                operation: format!("get estimate {}", key),
                status: 400,
                body: "Estimation is not configured".to_string(),
            });
        }
        Ok(jira.estimates.get(key).copied().unwrap_or(0.0))
    }

    async fn set_estimate(&self, key: &str, value: f64) -> Result<()> {
        self.state().estimates.insert(key.to_string(), value);
        self.record(format!("set_estimate {} {}", key, value));
        Ok(())
    }

    async fn add_comment(&self, key: &str, body: &str) -> Result<()> {
        {
            let mut jira = self.state();
            let issue = jira
                .issues
                .iter_mut()
                .find(|i| i.key == key)
                .ok_or_else(|| not_found("add comment", key))?;
            let page = issue.fields.comment.get_or_insert_with(JiraCommentPage::default);
            let id = format!("{}", 500 + page.comments.len());
            page.comments.push(JiraComment {
                id,
                body: body.to_string(),
            });
        }
        self.record(format!("add_comment {}", key));
        Ok(())
    }

    async fn update_comment(&self, key: &str, comment_id: &str, body: &str) -> Result<()> {
        {
            let mut jira = self.state();
            let comment = jira
                .issues
                .iter_mut()
                .find(|i| i.key == key)
                .and_then(|i| i.fields.comment.as_mut())
                .and_then(|page| page.comments.iter_mut().find(|c| c.id == comment_id))
                .ok_or_else(|| not_found("update comment", comment_id))?;
            comment.body = body.to_string();
        }
        self.record(format!("update_comment {} {}", key, comment_id));
        Ok(())
    }

    async fn list_remote_links(&self, key: &str) -> Result<Vec<RemoteLink>> {
        Ok(self
            .state()
            .remote_links
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_remote_link(&self, key: &str, link: &RemoteLink) -> Result<()> {
        self.state()
            .remote_links
            .entry(key.to_string())
            .or_default()
            .push(link.clone());
        self.record(format!("add_remote_link {}", key));
        Ok(())
    }

    async fn transition_issue(&self, key: &str, name: &str) -> Result<TransitionOutcome> {
        {
            let mut jira = self.state();
            jira.transition_attempts.push(format!("{} {}", key, name));
            if !jira.transitions.iter().any(|t| t == name) {
                return Ok(TransitionOutcome::Unavailable);
            }
            let issue = jira
                .issues
                .iter_mut()
                .find(|i| i.key == key)
                .ok_or_else(|| not_found("transition issue", key))?;
            issue.fields.status = Some(JiraStatus {
                name: if name == "Done" { "Done" } else { "Closed" }.to_string(),
            });
        }
        self.record(format!("transition_issue {} {}", key, name));
        Ok(TransitionOutcome::Applied)
    }

    async fn move_to_backlog(&self, keys: &[String]) -> Result<()> {
        {
            let sprint = field_id(CustomField::Sprint);
            let mut jira = self.state();
            for issue in jira.issues.iter_mut().filter(|i| keys.contains(&i.key)) {
                issue.fields.other.remove(&sprint);
            }
        }
        self.record(format!("move_to_backlog {}", keys.join(",")));
        Ok(())
    }

    async fn list_sprints(&self) -> Result<Vec<Sprint>> {
        Ok(self.state().sprints.clone())
    }

    async fn create_sprint(&self, sprint: &NewSprint) -> Result<Sprint> {
        let created = {
            let mut jira = self.state();
            let created = Sprint {
                id: 100 + jira.sprints.len() as u64,
                name: sprint.name.clone(),
                state: SprintState::Future,
                start_date: sprint.start_date,
                end_date: sprint.end_date,
                complete_date: None,
                origin_board_id: Some(1),
            };
            jira.sprints.push(created.clone());
            created
        };
        self.record(format!("create_sprint {}", created.name));
        Ok(created)
    }

    async fn update_sprint(&self, sprint: &Sprint) -> Result<Sprint> {
        {
            let mut jira = self.state();
            let stored = jira
                .sprints
                .iter_mut()
                .find(|s| s.id == sprint.id)
                .ok_or_else(|| not_found("update sprint", sprint.id))?;
            *stored = sprint.clone();
        }
        self.record(format!(
            "update_sprint {} {}",
            sprint.name,
            sprint.state.as_str()
        ));
        Ok(sprint.clone())
    }

    async fn get_project_id(&self) -> Result<u64> {
        Ok(PROJECT_ID)
    }

    async fn list_versions(&self) -> Result<Vec<Version>> {
        Ok(self.state().versions.clone())
    }

    async fn create_version(&self, version: &Version) -> Result<Version> {
        let created = {
            let mut jira = self.state();
            let mut created = as_stored(version);
            created.id = format!("{}", 300 + jira.versions.len());
            jira.versions.push(created.clone());
            created
        };
        self.record(format!("create_version {}", created.name));
        Ok(created)
    }

    async fn update_version(&self, version: &Version) -> Result<Version> {
        let updated = {
            let mut jira = self.state();
            let stored = jira
                .versions
                .iter_mut()
                .find(|v| v.id == version.id)
                .ok_or_else(|| not_found("update version", &version.id))?;
            *stored = as_stored(version);
            stored.clone()
        };
        self.record(format!("update_version {}", version.name));
        Ok(updated)
    }
}

/// A version as Jira keeps it: the planned date follows the actual one
fn as_stored(version: &Version) -> Version {
    let mut stored = version.clone();
    if let Some(released) = version.release_date.as_deref() {
        stored.user_release_date = NaiveDate::parse_from_str(released, "%Y-%m-%d")
            .ok()
            .map(|d| d.format("%-d/%b/%Y").to_string());
    }
    stored
}

// ---------------------------------------------------------------------------

/// The three doubles of one pairing
pub struct World {
    pub github: FakeGitHub,
    pub zenhub: FakeZenHub,
    pub jira: FakeJira,
}

impl World {
    pub fn new() -> Self {
        Self {
            github: FakeGitHub::new(),
            zenhub: FakeZenHub::new(),
            jira: FakeJira::new(),
        }
    }

    pub fn services(&self) -> Services<'_> {
        Services {
            github: &self.github,
            zenhub: &self.zenhub,
            jira: &self.jira,
        }
    }
}

/// Field payload with the correlation id of `issue` set
pub fn correlated_fields(issue: &GitHubIssue) -> IssueFields {
    let mut fields = IssueFields::new();
    fields.insert("summary".to_string(), json!(issue.title));
    fields.insert(field_id(CustomField::GitHubId), json!(issue.id));
    fields
}

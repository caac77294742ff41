//! Issue reconciliation
//!
//! For every GitHub issue on the board the reconciler either creates the
//! Jira counterpart or diffs the existing one field by field and writes
//! only what changed. Sprint removal, estimates, fix versions, remote
//! links and comments go through their own calls.

use super::comments::sync_comments;
use super::correlation::{sprint_id_from_field, Correlator, EpicIndex, SprintTable};
use super::releases::ReleaseIndex;
use super::{Services, SyncOptions, SyncReport};
use crate::model::{
    BoardDecoration, CustomField, FieldIds, IssueFields, ItemState, JiraIssue, RemoteLink,
    RemoteLinkObject, Repository, SourceIssue, TransitionOutcome,
};
use crate::{Result, ResultExt, SyncError};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// Format of the `Last Issue-Sync Update` field
pub const SYNC_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

/// Statuses the closed sweep leaves alone
const TERMINAL_STATUSES: [&str; 2] = ["Closed", "Done"];
/// Transitions tried, in order, to close an issue
const CLOSE_TRANSITIONS: [&str; 2] = ["Close Issue", "Done"];

/// Changes found by comparing a GitHub issue with its Jira counterpart
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueDelta {
    /// Changed fields only, keyed by Jira field id
    pub fields: IssueFields,
    pub move_to_backlog: bool,
}

impl IssueDelta {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && !self.move_to_backlog
    }
}

/// Pure mapping from GitHub issues to Jira field payloads
pub struct IssueMapper<'a> {
    repository: &'a Repository,
    fields: &'a FieldIds,
    options: &'a SyncOptions,
    sprints: &'a SprintTable,
    now: DateTime<Utc>,
}

pub struct IssueReconciler<'a> {
    services: Services<'a>,
    mapper: IssueMapper<'a>,
    releases: &'a ReleaseIndex,
}

impl<'a> IssueReconciler<'a> {
    pub fn new(
        services: Services<'a>,
        mapper: IssueMapper<'a>,
        releases: &'a ReleaseIndex,
    ) -> Self {
        Self {
            services,
            mapper,
            releases,
        }
    }

    fn correlator(&self) -> Correlator<'a> {
        Correlator::new(self.services.jira, self.mapper.fields)
    }

    fn repository(&self) -> &Repository {
        self.mapper.repository
    }

    /// Epics, then board pipelines, then the closed sweep
    pub async fn run(&self, report: &mut SyncReport) -> Result<()> {
        let epics = self.sync_epics(report).await?;
        self.sync_board(&epics, report).await?;
        self.close_resolved(report).await
    }

    /// Synchronize every epic of the repository and index their children
    pub async fn sync_epics(&self, report: &mut SyncReport) -> Result<EpicIndex> {
        let mut index = EpicIndex::new();
        let refs = self
            .services
            .zenhub
            .list_epics()
            .await
            .context(|| "list ZenHub epics")?;

        for epic_ref in refs {
            if epic_ref.repo_id != self.repository().id {
                debug!(
                    number = epic_ref.issue_number,
                    repo_id = epic_ref.repo_id,
                    "Skipping epic of another repository"
                );
                continue;
            }

            let epic = self
                .services
                .zenhub
                .get_epic(epic_ref.issue_number)
                .await
                .context(|| format!("get ZenHub epic #{}", epic_ref.issue_number))?;
            let decoration = BoardDecoration {
                is_epic: true,
                estimate: epic.estimate.map(|e| e.value),
                pipeline: epic.pipeline.as_ref().map(|p| p.name.clone()),
            };
            let source = self.fetch_source(epic.issue_number, decoration).await?;
            let key = self.sync_issue(&source, None, report).await?;
            index.record(&epic, &key);
        }

        info!(epics = index.len(), "Indexed epic children");
        Ok(index)
    }

    /// Synchronize every non-epic issue of every board pipeline
    pub async fn sync_board(&self, epics: &EpicIndex, report: &mut SyncReport) -> Result<()> {
        let board = self
            .services
            .zenhub
            .get_board()
            .await
            .context(|| "get ZenHub board")?;

        for pipeline in &board.pipelines {
            info!(pipeline = %pipeline.name, issues = pipeline.issues.len(), "Synchronizing pipeline");
            for board_issue in pipeline.issues.iter().filter(|i| !i.is_epic) {
                let decoration = BoardDecoration {
                    is_epic: false,
                    estimate: board_issue.estimate.map(|e| e.value),
                    pipeline: Some(pipeline.name.clone()),
                };
                let source = self.fetch_source(board_issue.issue_number, decoration).await?;
                let epic_key = epics.parent_of(source.coordinate());
                self.sync_issue(&source, epic_key, report).await?;
            }
        }
        Ok(())
    }

    async fn fetch_source(&self, number: u64, decoration: BoardDecoration) -> Result<SourceIssue> {
        let issue = self
            .services
            .github
            .get_issue(number)
            .await
            .context(|| format!("get GitHub issue #{}", number))?;
        Ok(SourceIssue::new(issue, self.repository().id, decoration))
    }

    /// Create or reconcile the Jira counterpart of one issue
    ///
    /// Returns the Jira key.
    pub async fn sync_issue(
        &self,
        source: &SourceIssue,
        epic_key: Option<&str>,
        report: &mut SyncReport,
    ) -> Result<String> {
        debug!(
            number = source.number,
            epic = source.is_epic,
            pipeline = source.pipeline.as_deref().unwrap_or("-"),
            "Synchronizing issue"
        );
        let existing = self.correlator().resolve(source.id).await?;

        let key = match existing {
            None => {
                let key = self.create(source, epic_key, report).await?;
                sync_comments(self.services, source, &key, &[], report).await?;
                key
            }
            Some(target) => {
                self.reconcile(source, &target, epic_key, report).await?;
                sync_comments(self.services, source, &target.key, target.comments(), report)
                    .await?;
                target.key
            }
        };
        Ok(key)
    }

    async fn create(
        &self,
        source: &SourceIssue,
        epic_key: Option<&str>,
        report: &mut SyncReport,
    ) -> Result<String> {
        let issue_type = self.mapper.options.issue_type_for(source).to_string();
        let fields = self.mapper.create_fields(source, &issue_type, epic_key);

        let created = self
            .services
            .jira
            .create_issue(fields)
            .await
            .context(|| format!("create Jira issue for GitHub issue #{}", source.number))?;
        report.issues_created += 1;
        info!(number = source.number, key = %created.key, issue_type = %issue_type, "Created Jira issue");

        if let Some(estimate) = source.estimate {
            if self.mapper.options.is_estimable(&issue_type) {
                self.services
                    .jira
                    .set_estimate(&created.key, estimate as f64)
                    .await
                    .context(|| format!("estimate {}", created.key))?;
                report.estimates_set += 1;
            }
        }

        self.add_fix_versions(source, &created.key, &[], report)
            .await?;
        self.add_remote_link(source, &created.key, report).await?;
        Ok(created.key)
    }

    async fn reconcile(
        &self,
        source: &SourceIssue,
        target: &JiraIssue,
        epic_key: Option<&str>,
        report: &mut SyncReport,
    ) -> Result<()> {
        let mut delta = self.mapper.diff(source, target, epic_key);

        if delta.is_empty() {
            debug!(number = source.number, key = %target.key, "Jira issue up to date");
            report.issues_unchanged += 1;
        }

        if !delta.fields.is_empty() {
            let changed: Vec<String> = delta.fields.keys().cloned().collect();
            info!(number = source.number, key = %target.key, fields = ?changed, "Updating Jira issue");
            delta.fields.insert(
                self.mapper.field_id(CustomField::LastIssueSync),
                json!(self.mapper.sync_timestamp()),
            );
            self.services
                .jira
                .update_issue(&target.key, std::mem::take(&mut delta.fields))
                .await
                .context(|| format!("update Jira issue {}", target.key))?;
            report.issues_updated += 1;
        }

        if delta.move_to_backlog {
            info!(number = source.number, key = %target.key, "Moving issue to backlog");
            self.services
                .jira
                .move_to_backlog(std::slice::from_ref(&target.key))
                .await
                .context(|| format!("move {} to backlog", target.key))?;
            report.backlog_moves += 1;
        }

        self.reconcile_estimate(source, target, report).await?;

        let current: Vec<String> = target
            .fields
            .fix_versions
            .iter()
            .map(|v| v.id.clone())
            .collect();
        self.add_fix_versions(source, &target.key, &current, report)
            .await?;
        self.heal_remote_link(source, &target.key, report).await
    }

    async fn reconcile_estimate(
        &self,
        source: &SourceIssue,
        target: &JiraIssue,
        report: &mut SyncReport,
    ) -> Result<()> {
        if !self.mapper.options.is_estimable(target.issue_type_name()) {
            return Ok(());
        }

        let current = match self.services.jira.get_estimate(&target.key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %target.key, error = %e, "Failed to get issue estimate, not updating it");
                return Ok(());
            }
        };

        let wanted = source.estimate.unwrap_or(0) as f64;
        if (current - wanted).abs() < f64::EPSILON {
            return Ok(());
        }

        info!(key = %target.key, from = current, to = wanted, "Updating estimate");
        self.services
            .jira
            .set_estimate(&target.key, wanted)
            .await
            .context(|| format!("estimate {}", target.key))?;
        report.estimates_set += 1;
        Ok(())
    }

    /// Append the versions of the releases holding `source`
    async fn add_fix_versions(
        &self,
        source: &SourceIssue,
        key: &str,
        current: &[String],
        report: &mut SyncReport,
    ) -> Result<()> {
        let wanted = self.releases.versions_for(source.coordinate());
        let missing: Vec<&String> = wanted.iter().filter(|id| !current.contains(id)).collect();
        if missing.is_empty() {
            return Ok(());
        }

        let ids: Vec<String> = current.iter().chain(missing).cloned().collect();
        info!(key = %key, versions = ?ids, "Setting fix versions");
        self.services
            .jira
            .set_fix_versions(key, &ids)
            .await
            .context(|| format!("set fix versions of {}", key))?;
        report.fix_versions_set += 1;
        Ok(())
    }

    async fn add_remote_link(
        &self,
        source: &SourceIssue,
        key: &str,
        report: &mut SyncReport,
    ) -> Result<()> {
        self.services
            .jira
            .add_remote_link(key, &self.mapper.remote_link(source))
            .await
            .context(|| format!("link {} to {}", key, source.html_url))?;
        report.remote_links_added += 1;
        Ok(())
    }

    async fn heal_remote_link(
        &self,
        source: &SourceIssue,
        key: &str,
        report: &mut SyncReport,
    ) -> Result<()> {
        let links = self
            .services
            .jira
            .list_remote_links(key)
            .await
            .context(|| format!("list remote links of {}", key))?;
        if links.iter().any(|l| l.object.url == source.html_url) {
            return Ok(());
        }
        debug!(key = %key, url = %source.html_url, "Restoring missing remote link");
        self.add_remote_link(source, key, report).await
    }

    /// Close the Jira counterpart of every closed GitHub issue
    pub async fn close_resolved(&self, report: &mut SyncReport) -> Result<()> {
        let closed = self
            .services
            .github
            .list_issues(ItemState::Closed)
            .await
            .context(|| format!("list closed issues of {}", self.repository().full_name))?;

        for issue in closed.iter().filter(|i| !i.is_pull_request()) {
            let Some(target) = self.correlator().resolve(issue.id).await? else {
                continue;
            };
            if TERMINAL_STATUSES.contains(&target.status_name()) {
                continue;
            }

            self.close(&target).await?;
            report.issues_closed += 1;
            info!(number = issue.number, key = %target.key, "Closed Jira issue");
        }
        Ok(())
    }

    async fn close(&self, target: &JiraIssue) -> Result<()> {
        for name in CLOSE_TRANSITIONS {
            let outcome = self
                .services
                .jira
                .transition_issue(&target.key, name)
                .await
                .context(|| format!("transition {} with {:?}", target.key, name))?;
            if outcome == TransitionOutcome::Applied {
                return Ok(());
            }
            debug!(key = %target.key, transition = name, "Transition unavailable");
        }

        Err(SyncError::MissingTransition {
            issue: target.key.clone(),
            tried: CLOSE_TRANSITIONS.iter().map(|t| t.to_string()).collect(),
        })
    }
}

impl<'a> IssueMapper<'a> {
    pub fn new(
        repository: &'a Repository,
        fields: &'a FieldIds,
        options: &'a SyncOptions,
        sprints: &'a SprintTable,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            repository,
            fields,
            options,
            sprints,
            now,
        }
    }

    fn field_id(&self, field: CustomField) -> String {
        self.fields.id(field).to_string()
    }

    /// Full field set for a new Jira issue
    pub fn create_fields(
        &self,
        source: &SourceIssue,
        issue_type: &str,
        epic_key: Option<&str>,
    ) -> IssueFields {
        let mut fields = IssueFields::new();
        fields.insert("issuetype".to_string(), json!({ "name": issue_type }));
        fields.insert("summary".to_string(), json!(source.title));
        fields.insert("description".to_string(), json!(source.body));
        fields.insert(self.field_id(CustomField::GitHubId), json!(source.id));
        fields.insert(self.field_id(CustomField::GitHubNumber), json!(source.number));
        fields.insert(
            self.field_id(CustomField::GitHubLabels),
            json!(source.joined_labels()),
        );
        fields.insert(
            self.field_id(CustomField::GitHubStatus),
            json!(source.state.as_str()),
        );
        if let Some(author) = &source.author {
            fields.insert(self.field_id(CustomField::GitHubReporter), json!(author));
        }
        fields.insert(
            self.field_id(CustomField::LastIssueSync),
            json!(self.sync_timestamp()),
        );
        if !self.options.default_components.is_empty() {
            fields.insert(
                "components".to_string(),
                components_value(self.options.default_components.iter()),
            );
        }
        if self.options.is_epic_type(issue_type) {
            fields.insert(self.field_id(CustomField::EpicName), json!(source.title));
        }
        if let Some(epic_key) = epic_key {
            fields.insert(self.field_id(CustomField::EpicLink), json!(epic_key));
        }
        if let Some(sprint_id) = self.sprint_for(source) {
            fields.insert(self.field_id(CustomField::Sprint), json!(sprint_id));
        }
        fields
    }

    /// Field-by-field comparison of `source` against `target`
    pub fn diff(&self, source: &SourceIssue, target: &JiraIssue, epic_key: Option<&str>) -> IssueDelta {
        let mut delta = IssueDelta::default();
        let fields = &mut delta.fields;

        if source.title != target.fields.summary {
            fields.insert("summary".to_string(), json!(source.title));
        }
        if source.body != target.fields.description.as_deref().unwrap_or_default() {
            fields.insert("description".to_string(), json!(source.body));
        }

        let labels_id = self.field_id(CustomField::GitHubLabels);
        let labels = source.joined_labels();
        if field_str(target, &labels_id) != labels {
            fields.insert(labels_id, json!(labels));
        }

        let sprint_id = self.field_id(CustomField::Sprint);
        let current_sprint = target.field(&sprint_id).and_then(sprint_id_from_field);
        match self.sprint_for(source) {
            None if current_sprint.is_some() => delta.move_to_backlog = true,
            Some(wanted) if current_sprint != Some(wanted) => {
                fields.insert(sprint_id, json!(wanted));
            }
            _ => {}
        }

        let status_id = self.field_id(CustomField::GitHubStatus);
        if field_str(target, &status_id) != source.state.as_str() {
            fields.insert(status_id, json!(source.state.as_str()));
        }

        let missing: Vec<&String> = self
            .options
            .default_components
            .iter()
            .filter(|name| !target.fields.components.iter().any(|c| &&c.name == name))
            .collect();
        if !missing.is_empty() {
            let all = target
                .fields
                .components
                .iter()
                .map(|c| &c.name)
                .chain(missing);
            fields.insert("components".to_string(), components_value(all));
        }

        if let Some(epic_key) = epic_key {
            let link_id = self.field_id(CustomField::EpicLink);
            if field_str(target, &link_id) != epic_key {
                fields.insert(link_id, json!(epic_key));
            }
        }

        delta
    }

    fn remote_link(&self, source: &SourceIssue) -> RemoteLink {
        RemoteLink {
            global_id: Some(source.html_url.clone()),
            object: RemoteLinkObject {
                url: source.html_url.clone(),
                title: format!("{}#{}", self.repository.full_name, source.number),
            },
        }
    }

    fn sprint_for(&self, source: &SourceIssue) -> Option<u64> {
        source
            .milestone
            .as_deref()
            .and_then(|title| self.sprints.id_for(title))
    }

    fn sync_timestamp(&self) -> String {
        self.now.format(SYNC_TIMESTAMP_FORMAT).to_string()
    }
}

/// Text value of a Jira field, empty when absent
fn field_str<'i>(issue: &'i JiraIssue, id: &str) -> &'i str {
    issue.field(id).and_then(Value::as_str).unwrap_or_default()
}

fn components_value<'n>(names: impl Iterator<Item = &'n String>) -> Value {
    Value::Array(names.map(|name| json!({ "name": name })).collect())
}

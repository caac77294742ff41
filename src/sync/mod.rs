//! Reconciliation engine
//!
//! One [`Synchronizer`] handles one GitHub repository ↔ Jira board pairing.
//! A run is a single batch pass:
//!
//! 1. **Milestones → sprints**: create missing sprints, align states and dates
//! 2. **Releases → versions**: create or update versions for matching releases
//! 3. **Issues**: epics first, then every board pipeline, then a sweep
//!    closing the Jira counterparts of closed GitHub issues
//!
//! Every write is preceded by a fresh read and diff, so an unchanged origin
//! produces no writes on the next run.

pub mod comments;
pub mod correlation;
pub mod issues;
pub mod milestones;
pub mod releases;

use crate::integrations::{GitHubApi, JiraApi, ZenHubApi};
use crate::model::{FieldIds, Repository, SourceIssue};
use crate::{Result, ResultExt, SyncError};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::fmt;
use tracing::info;

pub use correlation::{sprint_id_from_field, Correlator, EpicIndex, SprintTable};
pub use issues::{IssueDelta, IssueMapper, IssueReconciler};
pub use milestones::MilestoneReconciler;
pub use releases::{ReleaseIndex, ReleaseMapper, ReleasePair, ReleaseReconciler};

pub const DEFAULT_ISSUE_TYPE: &str = "User story";
pub const DEFAULT_EPIC_ISSUE_TYPE: &str = "Epic";
pub const DEFAULT_RELEASE_SOURCE: &str = "^(.*)$";
pub const DEFAULT_RELEASE_TARGET: &str = "${0}";

/// The three remote services of one pairing
#[derive(Clone, Copy)]
pub struct Services<'a> {
    pub github: &'a dyn GitHubApi,
    pub zenhub: &'a dyn ZenHubApi,
    pub jira: &'a dyn JiraApi,
}

/// Issues carrying `label` are created with type `issue_type`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRule {
    pub label: String,
    pub issue_type: String,
}

/// Per-pairing behaviour knobs
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Releases whose title does not match are ignored
    pub release_pattern: Regex,
    /// Replacement applied to matching release titles, `${0}` is the whole match
    pub version_rename: String,
    pub default_issue_type: String,
    /// First matching rule wins
    pub label_rules: Vec<LabelRule>,
    pub default_components: Vec<String>,
    /// Issue types supporting story point estimates on the board
    pub estimable_types: Vec<String>,
    pub epic_issue_type: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        let release_pattern = match Regex::new(DEFAULT_RELEASE_SOURCE) {
            Ok(re) => re,
            Err(_) => unreachable!("static regex pattern"),
        };
        Self {
            release_pattern,
            version_rename: DEFAULT_RELEASE_TARGET.to_string(),
            default_issue_type: DEFAULT_ISSUE_TYPE.to_string(),
            label_rules: Vec::new(),
            default_components: Vec::new(),
            estimable_types: vec![DEFAULT_ISSUE_TYPE.to_string()],
            epic_issue_type: DEFAULT_EPIC_ISSUE_TYPE.to_string(),
        }
    }
}

impl SyncOptions {
    pub fn with_release_renamer(mut self, source: &str, target: impl Into<String>) -> Result<Self> {
        self.release_pattern = Regex::new(source)?;
        self.version_rename = target.into();
        Ok(self)
    }

    /// Jira issue type for a new issue
    pub fn issue_type_for(&self, issue: &SourceIssue) -> &str {
        self.label_rules
            .iter()
            .find(|rule| issue.has_label(&rule.label))
            .map(|rule| rule.issue_type.as_str())
            .unwrap_or(&self.default_issue_type)
    }

    pub fn is_estimable(&self, issue_type: &str) -> bool {
        self.estimable_types.iter().any(|t| t == issue_type)
    }

    pub fn is_epic_type(&self, issue_type: &str) -> bool {
        self.epic_issue_type == issue_type
    }
}

/// Counters for one pairing run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub sprints_created: u32,
    pub sprints_updated: u32,
    pub versions_created: u32,
    pub versions_updated: u32,
    pub issues_created: u32,
    pub issues_updated: u32,
    pub issues_unchanged: u32,
    pub backlog_moves: u32,
    pub estimates_set: u32,
    pub fix_versions_set: u32,
    pub remote_links_added: u32,
    pub comments_created: u32,
    pub comments_updated: u32,
    pub issues_closed: u32,
}

impl SyncReport {
    /// Number of write calls issued against Jira
    pub fn writes(&self) -> u32 {
        self.sprints_created
            + self.sprints_updated
            + self.versions_created
            + self.versions_updated
            + self.issues_created
            + self.issues_updated
            + self.backlog_moves
            + self.estimates_set
            + self.fix_versions_set
            + self.remote_links_added
            + self.comments_created
            + self.comments_updated
            + self.issues_closed
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sprints {}+/{}~, versions {}+/{}~, issues {}+/{}~/{}=, closed {}, comments {}+/{}~",
            self.sprints_created,
            self.sprints_updated,
            self.versions_created,
            self.versions_updated,
            self.issues_created,
            self.issues_updated,
            self.issues_unchanged,
            self.issues_closed,
            self.comments_created,
            self.comments_updated,
        )
    }
}

/// Synchronization of one repository into one Jira board
pub struct Synchronizer<'a> {
    services: Services<'a>,
    repository: Repository,
    options: SyncOptions,
    fields: FieldIds,
}

impl<'a> Synchronizer<'a> {
    /// Resolve the Jira custom field ids
    ///
    /// Must succeed before anything else touches Jira: every reconciler
    /// addresses custom fields through the resolved table.
    pub async fn init(
        services: Services<'a>,
        repository: Repository,
        options: SyncOptions,
    ) -> Result<Self> {
        let jira_fields = services
            .jira
            .list_fields()
            .await
            .context(|| "list Jira fields")?;
        let fields = FieldIds::resolve(&jira_fields)?;

        Ok(Self {
            services,
            repository,
            options,
            fields,
        })
    }

    pub fn fields(&self) -> &FieldIds {
        &self.fields
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    pub async fn run(&self) -> Result<SyncReport> {
        self.run_at(Utc::now()).await
    }

    /// Run every stage, treating `now` as the current time
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let name = self.repository.full_name.as_str();
        info!(repository = %name, "Starting synchronization");

        MilestoneReconciler::new(self.services, now)
            .run(&mut report)
            .await
            .map_err(|e| stage_error(e, "milestones", name))?;

        let pairs = ReleaseReconciler::new(self.services, &self.options)
            .run(&mut report)
            .await
            .map_err(|e| stage_error(e, "releases", name))?;
        let releases = ReleaseIndex::build(self.services.zenhub, &pairs)
            .await
            .map_err(|e| stage_error(e, "release issues", name))?;

        let sprints = self
            .services
            .jira
            .list_sprints()
            .await
            .context(|| "list Jira sprints")?;
        let sprint_table = SprintTable::new(&sprints);

        let mapper = IssueMapper::new(
            &self.repository,
            &self.fields,
            &self.options,
            &sprint_table,
            now,
        );
        IssueReconciler::new(self.services, mapper, &releases)
            .run(&mut report)
            .await
            .map_err(|e| stage_error(e, "issues", name))?;

        info!(repository = %name, summary = %report, "Synchronization complete");
        Ok(report)
    }
}

fn stage_error(err: SyncError, stage: &str, repository: &str) -> SyncError {
    err.context(format!("synchronize {} of {}", stage, repository))
}

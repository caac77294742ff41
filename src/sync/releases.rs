//! Release report → version reconciliation
//!
//! Only releases whose title matches the configured pattern take part; the
//! version name is the title rewritten by the pattern.

use super::{Services, SyncOptions, SyncReport};
use crate::integrations::ZenHubApi;
use crate::model::{ItemState, ReleaseReport, Version};
use crate::{Result, ResultExt};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, info};

const DAY_FORMAT: &str = "%Y-%m-%d";
const USER_DAY_FORMAT: &str = "%-d/%b/%Y";

/// A release and the Jira version it resolved to
#[derive(Debug, Clone)]
pub struct ReleasePair {
    pub release: ReleaseReport,
    pub version: Version,
}

/// Release title → version name rewrite
pub struct ReleaseMapper<'a> {
    pattern: &'a Regex,
    rename: &'a str,
}

impl<'a> ReleaseMapper<'a> {
    pub fn new(pattern: &'a Regex, rename: &'a str) -> Self {
        Self { pattern, rename }
    }

    /// Version name for a release title, `None` when the title does not match
    pub fn version_name(&self, title: &str) -> Option<String> {
        self.pattern
            .is_match(title)
            .then(|| self.pattern.replace_all(title, self.rename).into_owned())
    }
}

pub struct ReleaseReconciler<'a> {
    services: Services<'a>,
    mapper: ReleaseMapper<'a>,
}

impl<'a> ReleaseReconciler<'a> {
    pub fn new(services: Services<'a>, options: &'a SyncOptions) -> Self {
        Self {
            services,
            mapper: ReleaseMapper::new(&options.release_pattern, &options.version_rename),
        }
    }

    /// Create or update the version of every matching release
    pub async fn run(&self, report: &mut SyncReport) -> Result<Vec<ReleasePair>> {
        let jira = self.services.jira;
        let project_id = jira.get_project_id().await.context(|| "get Jira project id")?;
        let releases = self
            .services
            .zenhub
            .list_release_reports()
            .await
            .context(|| "list ZenHub release reports")?;
        let versions = jira.list_versions().await.context(|| "list Jira versions")?;

        let mut pairs = Vec::new();
        for release in releases {
            let Some(name) = self.mapper.version_name(&release.title) else {
                debug!(release = %release.title, "Release does not match the release name pattern, ignoring");
                continue;
            };

            // Last version with the name wins
            let version = match versions.iter().rev().find(|v| v.name == name) {
                Some(existing) => match version_update(&release, existing) {
                    Some(updated) => {
                        info!(version = %name, release = %release.title, "Updating version");
                        let version = jira
                            .update_version(&updated)
                            .await
                            .context(|| format!("update version {:?}", name))?;
                        report.versions_updated += 1;
                        version
                    }
                    None => existing.clone(),
                },
                None if release.state == ItemState::Open => {
                    let version = jira
                        .create_version(&new_version(&release, &name, project_id))
                        .await
                        .context(|| format!("create version {:?}", name))?;
                    report.versions_created += 1;
                    version
                }
                None => {
                    debug!(release = %release.title, "Closed release without version, skipping");
                    continue;
                }
            };
            pairs.push(ReleasePair { release, version });
        }

        Ok(pairs)
    }
}

fn day(date: Option<DateTime<Utc>>, format: &str) -> Option<String> {
    date.map(|d| d.format(format).to_string())
}

/// Version for a release that has none yet
pub fn new_version(release: &ReleaseReport, name: &str, project_id: u64) -> Version {
    Version {
        id: String::new(),
        name: name.to_string(),
        description: Some(release.description.clone()),
        released: release.state.is_closed(),
        archived: false,
        start_date: day(release.start_date, DAY_FORMAT),
        user_release_date: day(release.desired_end_date, USER_DAY_FORMAT),
        release_date: day(release.closed_at, DAY_FORMAT),
        project_id: Some(project_id),
    }
}

/// Version as it should be after applying `release`, if anything changes
pub fn version_update(release: &ReleaseReport, version: &Version) -> Option<Version> {
    let mut updated = version.clone();

    updated.released = release.state.is_closed();
    if version.description.as_deref().unwrap_or_default() != release.description {
        updated.description = Some(release.description.clone());
    }
    if let Some(start) = day(release.start_date, DAY_FORMAT) {
        updated.start_date = Some(start);
    }
    if let Some(closed) = day(release.closed_at, DAY_FORMAT) {
        updated.release_date = Some(closed);
    }
    // Jira derives the planned date from the actual one once it is set
    if updated.release_date.is_none() {
        if let Some(end) = day(release.desired_end_date, USER_DAY_FORMAT) {
            updated.user_release_date = Some(end);
        }
    }

    (updated != *version).then_some(updated)
}

/// `(repository id, issue number)` → ids of the versions the issue ships in
#[derive(Debug, Clone, Default)]
pub struct ReleaseIndex {
    versions: HashMap<(u64, u64), Vec<String>>,
}

impl ReleaseIndex {
    pub async fn build(zenhub: &dyn ZenHubApi, pairs: &[ReleasePair]) -> Result<Self> {
        let mut index = Self::default();
        for pair in pairs {
            let issues = zenhub
                .list_release_issues(&pair.release.release_id)
                .await
                .context(|| format!("list issues of release {:?}", pair.release.title))?;
            for issue in issues {
                index.insert(issue.repo_id, issue.issue_number, &pair.version.id);
            }
        }
        Ok(index)
    }

    pub fn insert(&mut self, repo_id: u64, number: u64, version_id: &str) {
        let ids = self.versions.entry((repo_id, number)).or_default();
        if !ids.iter().any(|id| id == version_id) {
            ids.push(version_id.to_string());
        }
    }

    pub fn versions_for(&self, coordinate: (u64, u64)) -> &[String] {
        self.versions
            .get(&coordinate)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

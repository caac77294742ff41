//! Cross-system correlation
//!
//! Issues are joined on the `GitHub ID` custom field, sprints on their
//! name, and epic children on their `(repository id, issue number)` board
//! coordinate.

use crate::integrations::JiraApi;
use crate::model::{CustomField, Epic, FieldIds, JiraIssue, Sprint};
use crate::{Result, ResultExt};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{debug, warn};

static SPRINT_ID_RE: LazyLock<Regex> = LazyLock::new(|| match Regex::new(r"id=(\d+)") {
    Ok(re) => re,
    Err(_) => unreachable!("static regex pattern"),
});

/// Finds the Jira counterpart of a GitHub issue
pub struct Correlator<'a> {
    jira: &'a dyn JiraApi,
    fields: &'a FieldIds,
}

impl<'a> Correlator<'a> {
    pub fn new(jira: &'a dyn JiraApi, fields: &'a FieldIds) -> Self {
        Self { jira, fields }
    }

    /// Jira issue whose correlation field equals `github_id`, if any
    ///
    /// Only the first search hit is considered. A hit whose stored id does
    /// not match is reported as not found.
    pub async fn resolve(&self, github_id: u64) -> Result<Option<JiraIssue>> {
        let issue = self
            .jira
            .search_issue_by_field(CustomField::GitHubId.display_name(), github_id)
            .await
            .context(|| format!("look up Jira issue for GitHub issue id {}", github_id))?;

        let Some(issue) = issue else {
            debug!(github_id, "No Jira counterpart");
            return Ok(None);
        };

        let stored = issue
            .field(self.fields.id(CustomField::GitHubId))
            .and_then(value_as_u64);
        if stored != Some(github_id) {
            warn!(
                github_id,
                key = %issue.key,
                stored = ?stored,
                "Jira search returned an issue with a different GitHub ID, ignoring it"
            );
            return Ok(None);
        }

        Ok(Some(issue))
    }
}

/// `(repository id, issue number)` of every epic child → epic key in Jira
#[derive(Debug, Clone, Default)]
pub struct EpicIndex {
    parents: HashMap<(u64, u64), String>,
}

impl EpicIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the children of an epic synchronized as `epic_key`
    ///
    /// Children that are epics themselves are skipped: Jira epics do not nest.
    pub fn record(&mut self, epic: &Epic, epic_key: &str) {
        for child in epic.issues.iter().filter(|c| !c.is_epic) {
            self.parents
                .insert((child.repo_id, child.issue_number), epic_key.to_string());
        }
    }

    pub fn parent_of(&self, coordinate: (u64, u64)) -> Option<&str> {
        self.parents.get(&coordinate).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

/// Sprint name → sprint id for one board
#[derive(Debug, Clone, Default)]
pub struct SprintTable {
    ids: HashMap<String, u64>,
}

impl SprintTable {
    /// Later sprints override earlier ones with the same name
    pub fn new(sprints: &[Sprint]) -> Self {
        let mut ids = HashMap::new();
        for sprint in sprints {
            ids.insert(sprint.name.clone(), sprint.id);
        }
        Self { ids }
    }

    pub fn id_for(&self, name: &str) -> Option<u64> {
        self.ids.get(name).copied()
    }
}

/// Sprint id held by a Jira `Sprint` field value
///
/// Jira has represented the field as a bare id, an object, an array of
/// either (the current sprint last), and a serialized
/// `com.atlassian.greenhopper...Sprint@...[id=12,...]` string.
pub fn sprint_id_from_field(value: &Value) -> Option<u64> {
    match value {
        Value::Number(_) => value_as_u64(value),
        Value::Object(map) => map.get("id").and_then(value_as_u64),
        Value::Array(items) => items.last().and_then(sprint_id_from_field),
        Value::String(s) => SPRINT_ID_RE
            .captures(s)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok()),
        Value::Null | Value::Bool(_) => None,
    }
}

/// Numeric custom field values come back as floats; some installations
/// store them as text
pub fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

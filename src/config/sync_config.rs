use crate::sync::{
    LabelRule, SyncOptions, DEFAULT_EPIC_ISSUE_TYPE, DEFAULT_ISSUE_TYPE, DEFAULT_RELEASE_SOURCE,
    DEFAULT_RELEASE_TARGET,
};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable consulted when `github_api_token` is empty
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub jira_uri: String,

    #[serde(default)]
    pub jira_project_key: String,

    #[serde(default)]
    pub jira_authentication: JiraAuthentication,

    #[serde(default)]
    pub zenhub_api_token: String,

    #[serde(default)]
    pub github_api_token: String,

    /// ZenHub API root, for on-premise installations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zenhub_api_url: Option<String>,

    /// GitHub API root, for GitHub Enterprise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issues_label_to_type: Option<IssueLabelToType>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default_jira_components: Vec<String>,

    #[serde(default = "default_estimable_issue_types")]
    pub estimable_issue_types: Vec<String>,

    #[serde(default = "default_epic_issue_type")]
    pub epic_issue_type: String,

    #[serde(default)]
    pub synchronizations: Vec<Synchronization>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JiraAuthentication {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
}

/// One GitHub repository synchronized into one Jira board
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Synchronization {
    #[serde(default)]
    pub github_owner: String,

    #[serde(default)]
    pub github_repository: String,

    #[serde(default)]
    pub jira_board_id: u64,

    #[serde(default)]
    pub release_renamer: ReleaseRenamer,

    /// Overrides the global mapping when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issues_label_to_type: Option<IssueLabelToType>,

    /// Added to the global components
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default_jira_components: Vec<String>,
}

/// Regex rewrite from release title to version name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRenamer {
    #[serde(default = "default_release_source")]
    pub source: String,
    #[serde(default = "default_release_target")]
    pub target: String,
}

impl Default for ReleaseRenamer {
    fn default() -> Self {
        Self {
            source: default_release_source(),
            target: default_release_target(),
        }
    }
}

impl ReleaseRenamer {
    /// Pattern matched against release titles; empty means match all
    pub fn effective_source(&self) -> &str {
        if self.source.is_empty() {
            DEFAULT_RELEASE_SOURCE
        } else {
            &self.source
        }
    }

    /// Replacement template; empty means keep the whole title
    pub fn effective_target(&self) -> &str {
        if self.target.is_empty() {
            DEFAULT_RELEASE_TARGET
        } else {
            &self.target
        }
    }
}

/// Label → issue type rules applied when creating Jira issues
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueLabelToType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Ordered list of `{label: type}` entries
    #[serde(default)]
    pub labels_mapping: Vec<BTreeMap<String, String>>,
}

impl IssueLabelToType {
    pub fn rules(&self) -> Vec<LabelRule> {
        self.labels_mapping
            .iter()
            .flat_map(|entry| entry.iter())
            .map(|(label, issue_type)| LabelRule {
                label: label.clone(),
                issue_type: issue_type.clone(),
            })
            .collect()
    }
}

fn default_estimable_issue_types() -> Vec<String> {
    vec![DEFAULT_ISSUE_TYPE.to_string()]
}

fn default_epic_issue_type() -> String {
    DEFAULT_EPIC_ISSUE_TYPE.to_string()
}

fn default_release_source() -> String {
    DEFAULT_RELEASE_SOURCE.to_string()
}

fn default_release_target() -> String {
    DEFAULT_RELEASE_TARGET.to_string()
}

impl Synchronization {
    /// `owner/repository`
    pub fn slug(&self) -> String {
        format!("{}/{}", self.github_owner, self.github_repository)
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self {
            jira_uri: String::new(),
            jira_project_key: String::new(),
            jira_authentication: JiraAuthentication::default(),
            zenhub_api_token: String::new(),
            github_api_token: String::new(),
            zenhub_api_url: None,
            github_api_url: None,
            issues_label_to_type: None,
            default_jira_components: Vec::new(),
            estimable_issue_types: default_estimable_issue_types(),
            epic_issue_type: default_epic_issue_type(),
            synchronizations: Vec::new(),
        }
    }

    /// Load configuration from the default path (~/.config/tracker-sync/config.yaml)
    pub fn load_default() -> Result<Self> {
        Self::load(Self::default_path())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(crate::SyncError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading configuration");

        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;

        tracing::debug!(
            synchronizations = config.synchronizations.len(),
            project = %config.jira_project_key,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Saving configuration");

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    /// Get the default config path (~/.config/tracker-sync/config.yaml)
    pub fn default_path() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("tracker-sync");
        path.push("config.yaml");
        path
    }

    /// GitHub token from the file, else from `GITHUB_TOKEN`
    pub fn github_token(&self) -> Option<String> {
        if !self.github_api_token.is_empty() {
            return Some(self.github_api_token.clone());
        }
        std::env::var(GITHUB_TOKEN_ENV)
            .ok()
            .filter(|token| !token.is_empty())
    }

    /// Pairing for `owner/repository`
    pub fn find(&self, slug: &str) -> Option<&Synchronization> {
        self.synchronizations.iter().find(|s| s.slug() == slug)
    }

    /// Behaviour of one pairing, merged with the global settings
    pub fn options_for(&self, sync: &Synchronization) -> Result<SyncOptions> {
        let label_mapping = sync
            .issues_label_to_type
            .as_ref()
            .or(self.issues_label_to_type.as_ref());

        let mut components: Vec<String> = Vec::new();
        for name in sync
            .default_jira_components
            .iter()
            .chain(&self.default_jira_components)
        {
            if !components.contains(name) {
                components.push(name.clone());
            }
        }

        let options = SyncOptions {
            default_issue_type: label_mapping
                .and_then(|m| m.default.clone())
                .unwrap_or_else(|| DEFAULT_ISSUE_TYPE.to_string()),
            label_rules: label_mapping.map(|m| m.rules()).unwrap_or_default(),
            default_components: components,
            estimable_types: self.estimable_issue_types.clone(),
            epic_issue_type: self.epic_issue_type.clone(),
            ..SyncOptions::default()
        };
        options.with_release_renamer(
            sync.release_renamer.effective_source(),
            sync.release_renamer.effective_target(),
        )
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

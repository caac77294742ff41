//! Configuration validation
//!
//! Checks a [`SyncConfig`] before any remote call is made:
//! - Jira location, project and credentials are present
//! - Both API tokens are available (GitHub may come from the environment)
//! - Every synchronization names a repository and a board
//! - No repository is synchronized twice
//! - Release renamer patterns compile

use super::sync_config::{SyncConfig, Synchronization, GITHUB_TOKEN_ENV};
use crate::SyncError;
use regex::Regex;
use std::collections::HashSet;

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub context: Option<String>,
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            context: None,
            field: field.into(),
            message: message.into(),
        }
    }

    fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref ctx) = self.context {
            write!(f, "[{}] {}: {}", ctx, self.field, self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

/// Validation result
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

/// Validate a configuration, collecting every problem
pub fn validate_config(config: &SyncConfig) -> ValidationResult {
    let mut errors = Vec::new();

    if config.jira_uri.is_empty() {
        errors.push(ValidationError::new("jira_uri", "Jira URI is required"));
    } else if !config.jira_uri.starts_with("http://") && !config.jira_uri.starts_with("https://") {
        errors.push(ValidationError::new(
            "jira_uri",
            format!("Invalid Jira URI: {}", config.jira_uri),
        ));
    }

    if config.jira_project_key.is_empty() {
        errors.push(ValidationError::new(
            "jira_project_key",
            "Jira project key is required",
        ));
    }

    if config.jira_authentication.user.is_empty() {
        errors.push(ValidationError::new(
            "jira_authentication.user",
            "Jira user is required",
        ));
    }
    if config.jira_authentication.password.is_empty() {
        errors.push(ValidationError::new(
            "jira_authentication.password",
            "Jira password is required",
        ));
    }

    if config.zenhub_api_token.is_empty() {
        errors.push(ValidationError::new(
            "zenhub_api_token",
            "ZenHub API token is required",
        ));
    }

    if config.github_token().is_none() {
        errors.push(ValidationError::new(
            "github_api_token",
            format!(
                "GitHub API token is required (or set the {} environment variable)",
                GITHUB_TOKEN_ENV
            ),
        ));
    }

    if config.synchronizations.is_empty() {
        errors.push(ValidationError::new(
            "synchronizations",
            "At least one synchronization must be defined",
        ));
    }

    let mut seen = HashSet::new();
    for sync in &config.synchronizations {
        let slug = sync.slug();
        if !seen.insert(slug.clone()) {
            errors.push(ValidationError::new(
                "synchronizations",
                format!("Duplicate synchronization for repository {}", slug),
            ));
        }
        if let Err(mut sync_errors) = validate_synchronization(sync) {
            errors.append(&mut sync_errors);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate one repository ↔ board pairing
fn validate_synchronization(sync: &Synchronization) -> ValidationResult {
    let mut errors = Vec::new();
    let slug = sync.slug();

    if sync.github_owner.is_empty() {
        errors.push(
            ValidationError::new("github_owner", "GitHub owner is required").with_context(&slug),
        );
    }
    if sync.github_repository.is_empty() {
        errors.push(
            ValidationError::new("github_repository", "GitHub repository is required")
                .with_context(&slug),
        );
    }
    if sync.jira_board_id == 0 {
        errors.push(
            ValidationError::new("jira_board_id", "Jira board id is required").with_context(&slug),
        );
    }

    if let Err(e) = Regex::new(sync.release_renamer.effective_source()) {
        errors.push(
            ValidationError::new(
                "release_renamer.source",
                format!("Invalid release name pattern: {}", e),
            )
            .with_context(&slug),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate configuration and return a Result
pub fn validate_config_result(config: &SyncConfig) -> crate::Result<()> {
    validate_config(config).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        SyncError::Config(format!(
            "Configuration validation failed:\n  - {}",
            messages.join("\n  - ")
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JiraAuthentication;

    fn valid_config() -> SyncConfig {
        SyncConfig {
            jira_uri: "https://jira.example.com".to_string(),
            jira_project_key: "PROJ".to_string(),
            jira_authentication: JiraAuthentication {
                user: "bot".to_string(),
                password: "secret".to_string(),
            },
            zenhub_api_token: "zh".to_string(),
            github_api_token: "gh".to_string(),
            synchronizations: vec![Synchronization {
                github_owner: "octo".to_string(),
                github_repository: "app".to_string(),
                jira_board_id: 12,
                ..Default::default()
            }],
            ..SyncConfig::new()
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
        assert!(validate_config_result(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_jira_settings_are_all_reported() {
        let mut config = valid_config();
        config.jira_uri.clear();
        config.jira_project_key.clear();
        config.jira_authentication = JiraAuthentication::default();
        config.zenhub_api_token.clear();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "jira_uri",
                "jira_project_key",
                "jira_authentication.user",
                "jira_authentication.password",
                "zenhub_api_token",
            ]
        );
    }

    #[test]
    fn test_invalid_jira_uri() {
        let mut config = valid_config();
        config.jira_uri = "jira.example.com".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].message.contains("Invalid Jira URI"));
    }

    #[test]
    fn test_empty_synchronizations() {
        let mut config = valid_config();
        config.synchronizations.clear();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("At least one synchronization"));
    }

    #[test]
    fn test_synchronization_fields() {
        let mut config = valid_config();
        config.synchronizations.push(Synchronization {
            github_owner: "octo".to_string(),
            ..Default::default()
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].to_string(), "[octo/] github_repository: GitHub repository is required");
        assert_eq!(errors[1].field, "jira_board_id");
    }

    #[test]
    fn test_duplicate_synchronization() {
        let mut config = valid_config();
        let duplicate = config.synchronizations[0].clone();
        config.synchronizations.push(duplicate);

        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.message.contains("Duplicate synchronization for repository octo/app")));
    }

    #[test]
    fn test_invalid_release_pattern() {
        let mut config = valid_config();
        config.synchronizations[0].release_renamer.source = "v(".to_string();

        let err = validate_config_result(&config).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Configuration validation failed"));
        assert!(message.contains("[octo/app] release_renamer.source"));
    }
}

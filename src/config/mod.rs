//! Configuration system
//!
//! Loads ~/.config/tracker-sync/config.yaml with:
//! - Jira location, project and credentials
//! - ZenHub and GitHub API tokens
//! - Label → issue type rules and default components
//! - One entry per GitHub repository ↔ Jira board synchronization

mod sync_config;
pub mod validation;

pub use sync_config::{
    IssueLabelToType, JiraAuthentication, ReleaseRenamer, SyncConfig, Synchronization,
    GITHUB_TOKEN_ENV,
};
pub use validation::{validate_config, validate_config_result, ValidationError};

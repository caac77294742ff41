//! tracker-sync - batch reconciliation of GitHub/ZenHub planning data into Jira
//!
//! Each configured synchronization pairs one GitHub repository (decorated by
//! ZenHub with epics, estimates, pipelines, milestone start dates and release
//! reports) with one Jira project board. A run reads both sides and issues
//! only the writes needed to make Jira reflect GitHub.
//!
//! # Architecture
//!
//! - **config**: YAML configuration and validation
//! - **model**: Wire types of the three services and the merged source view
//! - **integrations**: HTTP adapters (GitHub, ZenHub, Jira) behind async traits
//! - **sync**: Reconcilers for milestones, releases, issues and comments

pub mod config;
pub mod error;
pub mod integrations;
pub mod logging;
pub mod model;
pub mod sync;

// Re-exports
pub use error::{Result, ResultExt, SyncError};

//! Error types for tracker-sync
//!
//! A single error enum covers remote failures, configuration problems and
//! lookup failures. Reconcilers wrap remote errors with the operation and
//! entity they were working on via [`SyncError::context`].

use crate::integrations::retry::{RetryDecision, RetryableError};
use std::time::Duration;
use thiserror::Error;

/// Result type alias for tracker-sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A custom field expected by the synchronization is not defined in Jira
    #[error("failed to get ID of field {0:?} in Jira, make sure it has been properly created")]
    MissingCustomField(String),

    /// None of the candidate workflow transitions exist for an issue
    #[error("none of the transitions {tried:?} is available for issue {issue}")]
    MissingTransition { issue: String, tried: Vec<String> },

    /// Remote service answered with a non-2xx status
    #[error("{operation}: HTTP {status}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Rate limited (retry-after duration in seconds)
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid release name pattern
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// An error annotated with the operation that produced it
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<SyncError>,
    },

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl SyncError {
    /// Wrap this error with the operation and entity being processed
    pub fn context(self, context: impl Into<String>) -> Self {
        SyncError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, skipping any context layers
    pub fn root(&self) -> &SyncError {
        match self {
            SyncError::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Attach context to the error side of a [`Result`]
pub trait ResultExt<T> {
    fn context<C: Into<String>>(self, context: impl FnOnce() -> C) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context<C: Into<String>>(self, context: impl FnOnce() -> C) -> Result<T> {
        self.map_err(|e| e.context(context()))
    }
}

impl RetryableError for SyncError {
    fn retry_decision(&self) -> RetryDecision {
        match self {
            SyncError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    RetryDecision::Retry
                } else if let Some(status) = e.status() {
                    status_decision(status.as_u16())
                } else if e.is_decode() || e.is_builder() {
                    RetryDecision::NoRetry
                } else {
                    RetryDecision::Retry
                }
            }
            SyncError::Status { status, .. } => status_decision(*status),
            SyncError::RateLimited(secs) => RetryDecision::RetryAfter(Duration::from_secs(*secs)),
            SyncError::Context { source, .. } => source.retry_decision(),
            SyncError::Config(_)
            | SyncError::MissingCustomField(_)
            | SyncError::MissingTransition { .. }
            | SyncError::Auth(_)
            | SyncError::Json(_)
            | SyncError::Yaml(_)
            | SyncError::Io(_)
            | SyncError::Regex(_)
            | SyncError::Other(_) => RetryDecision::NoRetry,
        }
    }
}

fn status_decision(status: u16) -> RetryDecision {
    match status {
        429 => RetryDecision::RetryAfter(Duration::from_secs(60)),
        500..=599 => RetryDecision::Retry,
        _ => RetryDecision::NoRetry,
    }
}

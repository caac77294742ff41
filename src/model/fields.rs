//! Jira custom fields used by the synchronization
//!
//! Field ids differ per Jira installation. They are resolved once from the
//! display names below, before any other tracker operation, and every other
//! module addresses fields through [`CustomField`] only.

use super::jira::JiraField;
use crate::{Result, SyncError};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CustomField {
    /// Correlation key: the GitHub numeric issue id
    GitHubId,
    GitHubNumber,
    GitHubLabels,
    GitHubStatus,
    GitHubReporter,
    LastIssueSync,
    EpicName,
    EpicLink,
    Sprint,
}

const FIELD_COUNT: usize = 9;

impl CustomField {
    pub const ALL: [CustomField; FIELD_COUNT] = [
        CustomField::GitHubId,
        CustomField::GitHubNumber,
        CustomField::GitHubLabels,
        CustomField::GitHubStatus,
        CustomField::GitHubReporter,
        CustomField::LastIssueSync,
        CustomField::EpicName,
        CustomField::EpicLink,
        CustomField::Sprint,
    ];

    /// Display name as configured in Jira
    pub fn display_name(&self) -> &'static str {
        match self {
            CustomField::GitHubId => "GitHub ID",
            CustomField::GitHubNumber => "GitHub Number",
            CustomField::GitHubLabels => "GitHub Labels",
            CustomField::GitHubStatus => "GitHub Status",
            CustomField::GitHubReporter => "GitHub Reporter",
            CustomField::LastIssueSync => "Last Issue-Sync Update",
            CustomField::EpicName => "Epic Name",
            CustomField::EpicLink => "Epic Link",
            CustomField::Sprint => "Sprint",
        }
    }
}

/// Display name → field id table for every [`CustomField`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIds {
    ids: [String; FIELD_COUNT],
}

impl FieldIds {
    /// Resolve every expected field from the installation's field list
    ///
    /// A missing name is fatal: the synchronization cannot run without it.
    pub fn resolve(fields: &[JiraField]) -> Result<Self> {
        let by_name: HashMap<&str, &str> = fields
            .iter()
            .map(|f| (f.name.as_str(), f.id.as_str()))
            .collect();

        let mut ids: [String; FIELD_COUNT] = Default::default();
        for field in CustomField::ALL {
            let id = by_name
                .get(field.display_name())
                .filter(|id| !id.is_empty())
                .ok_or_else(|| SyncError::MissingCustomField(field.display_name().to_string()))?;
            ids[field as usize] = (*id).to_string();
        }

        Ok(Self { ids })
    }

    pub fn id(&self, field: CustomField) -> &str {
        &self.ids[field as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(id: &str, name: &str) -> JiraField {
        JiraField {
            id: id.to_string(),
            name: name.to_string(),
            custom: id.starts_with("customfield_"),
        }
    }

    fn all_fields() -> Vec<JiraField> {
        CustomField::ALL
            .iter()
            .enumerate()
            .map(|(i, f)| field(&format!("customfield_{}", 10100 + i), f.display_name()))
            .chain(std::iter::once(field("summary", "Summary")))
            .collect()
    }

    #[test]
    fn test_resolve_all_fields() {
        let ids = FieldIds::resolve(&all_fields()).unwrap();
        assert_eq!(ids.id(CustomField::GitHubId), "customfield_10100");
        assert_eq!(ids.id(CustomField::Sprint), "customfield_10108");
    }

    #[test]
    fn test_missing_field_is_fatal() {
        let fields: Vec<JiraField> = all_fields()
            .into_iter()
            .filter(|f| f.name != "Epic Link")
            .collect();

        let err = FieldIds::resolve(&fields).unwrap_err();
        assert!(matches!(err, SyncError::MissingCustomField(ref name) if name == "Epic Link"));
    }
}

//! Finished validation results

use serde::Serialize;
use std::fmt;

use super::{Severity, ValidationIssue};
use crate::error::Result;

/// The issues of a completed validation run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    num_errors: usize,
    num_warnings: usize,
    num_infos: usize,
    issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Wrap a list of issues
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        let count = |severity| issues.iter().filter(|i| i.severity == severity).count();
        Self {
            num_errors: count(Severity::Error),
            num_warnings: count(Severity::Warning),
            num_infos: count(Severity::Info),
            issues,
        }
    }

    /// Combine the results of independently validated items
    pub fn merge(results: impl IntoIterator<Item = ValidationResult>) -> Self {
        Self::new(results.into_iter().flat_map(|r| r.issues).collect())
    }

    /// `true` if no issue has [`Severity::Error`]
    pub fn is_valid(&self) -> bool {
        self.num_errors == 0
    }

    /// All top-level issues, in the order they were found
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// Number of top-level errors
    pub fn num_errors(&self) -> usize {
        self.num_errors
    }

    /// Number of top-level warnings
    pub fn num_warnings(&self) -> usize {
        self.num_warnings
    }

    /// Number of top-level informational issues
    pub fn num_infos(&self) -> usize {
        self.num_infos
    }

    /// Render the result as pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} error(s), {} warning(s), {} info(s)",
            self.num_errors, self.num_warnings, self.num_infos
        )?;
        for issue in &self.issues {
            write!(f, "{}", issue)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issues::IssueType;

    fn sample() -> ValidationResult {
        ValidationResult::new(vec![
            ValidationIssue::new(IssueType::BinaryInvalid, "a", "bad"),
            ValidationIssue::new(IssueType::PropertyRedundant, "b", "ignored"),
        ])
    }

    #[test]
    fn test_counts() {
        let result = sample();
        assert_eq!(result.num_errors(), 1);
        assert_eq!(result.num_warnings(), 1);
        assert_eq!(result.num_infos(), 0);
        assert!(!result.is_valid());
    }

    #[test]
    fn test_merge_keeps_order() {
        let merged = ValidationResult::merge([sample(), ValidationResult::new(Vec::new())]);
        assert_eq!(merged.issues().len(), 2);
        assert_eq!(merged.issues()[0].path, "a");
    }

    #[test]
    fn test_json_report() {
        let json = sample().to_json_string().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["numErrors"], 1);
        assert_eq!(value["issues"][1]["type"], "PROPERTY_REDUNDANT");
    }
}

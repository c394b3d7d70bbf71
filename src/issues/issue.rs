//! Validation issue types

use serde::Serialize;
use std::fmt;

/// Severity of a validation issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// The content violates a requirement
    Error,
    /// The content is valid but likely not what the author intended
    Warning,
    /// Purely informational
    Info,
}

impl Severity {
    /// Upper-case name used in reports
    pub fn name(&self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind of a validation issue
///
/// Every issue type has a stable code (the serialized name) and a default
/// severity. The groups follow the kind of problem that was found:
///
/// - binary structure of the tile content (always fatal for the content item)
/// - feature table and batch table semantics (accumulated)
/// - metadata values of a property table (reported per row)
/// - embedded or external resources (folded into one issue with causes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueType {
    /// Generic binary structure error (bad magic, truncated buffer)
    BinaryInvalid,
    /// A binary field holds a value that is not allowed (e.g. the version)
    BinaryInvalidValue,
    /// A declared byte length does not match the data
    BinaryInvalidLength,
    /// An offset is not aligned to the required boundary
    BinaryInvalidAlignment,
    /// The header uses a pre-1.0 layout
    BinaryLegacyHeader,
    /// A JSON section could not be parsed
    JsonParseError,
    /// A required property or semantic is missing
    PropertyMissing,
    /// Properties that must appear together do not
    PropertyInconsistent,
    /// A property is present but ignored because another one takes precedence
    PropertyRedundant,
    /// A feature table property is malformed
    FeatureTablePropertyInvalid,
    /// A batch table property is malformed
    BatchTablePropertyInvalid,
    /// A declared value lies outside the allowed range
    ValueNotInRange,
    /// A metadata value lies outside the declared minimum/maximum
    MetadataValueNotInRange,
    /// A declared metadata minimum/maximum is not the computed one
    MetadataValueBoundMismatch,
    /// A metadata enum value is not one of the enum's values
    MetadataInvalidEnumValue,
    /// A resource could not be read
    IoError,
    /// An embedded or referenced resource contains errors
    ContentValidationError,
    /// An embedded or referenced resource contains warnings
    ContentValidationWarning,
    /// An embedded or referenced resource contains informational issues
    ContentValidationInfo,
}

impl IssueType {
    /// Stable code used in reports
    pub fn code(&self) -> &'static str {
        match self {
            IssueType::BinaryInvalid => "BINARY_INVALID",
            IssueType::BinaryInvalidValue => "BINARY_INVALID_VALUE",
            IssueType::BinaryInvalidLength => "BINARY_INVALID_LENGTH",
            IssueType::BinaryInvalidAlignment => "BINARY_INVALID_ALIGNMENT",
            IssueType::BinaryLegacyHeader => "BINARY_LEGACY_HEADER",
            IssueType::JsonParseError => "JSON_PARSE_ERROR",
            IssueType::PropertyMissing => "PROPERTY_MISSING",
            IssueType::PropertyInconsistent => "PROPERTY_INCONSISTENT",
            IssueType::PropertyRedundant => "PROPERTY_REDUNDANT",
            IssueType::FeatureTablePropertyInvalid => "FEATURE_TABLE_PROPERTY_INVALID",
            IssueType::BatchTablePropertyInvalid => "BATCH_TABLE_PROPERTY_INVALID",
            IssueType::ValueNotInRange => "VALUE_NOT_IN_RANGE",
            IssueType::MetadataValueNotInRange => "METADATA_VALUE_NOT_IN_RANGE",
            IssueType::MetadataValueBoundMismatch => "METADATA_VALUE_BOUND_MISMATCH",
            IssueType::MetadataInvalidEnumValue => "METADATA_INVALID_ENUM_VALUE",
            IssueType::IoError => "IO_ERROR",
            IssueType::ContentValidationError => "CONTENT_VALIDATION_ERROR",
            IssueType::ContentValidationWarning => "CONTENT_VALIDATION_WARNING",
            IssueType::ContentValidationInfo => "CONTENT_VALIDATION_INFO",
        }
    }

    /// Severity an issue of this type gets unless stated otherwise
    pub fn default_severity(&self) -> Severity {
        match self {
            IssueType::PropertyRedundant | IssueType::ContentValidationWarning => {
                Severity::Warning
            }
            IssueType::ContentValidationInfo => Severity::Info,
            _ => Severity::Error,
        }
    }

    /// Whether this issue describes the byte layout of the content
    pub fn is_binary_structural(&self) -> bool {
        matches!(
            self,
            IssueType::BinaryInvalid
                | IssueType::BinaryInvalidValue
                | IssueType::BinaryInvalidLength
                | IssueType::BinaryInvalidAlignment
                | IssueType::BinaryLegacyHeader
        )
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A single finding, located by a path string
///
/// Issues produced while validating an embedded or external resource are
/// attached as `causes` of one issue on the referencing content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    /// The kind of the issue
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    /// Where the issue was found, e.g. `tile.b3dm/featureTable/BATCH_LENGTH`
    pub path: String,
    /// Human-readable description
    pub message: String,
    /// Severity of the issue
    pub severity: Severity,
    /// Issues that caused this one
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<ValidationIssue>,
}

impl ValidationIssue {
    /// Create an issue with the default severity of its type
    pub fn new(issue_type: IssueType, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            issue_type,
            path: path.into(),
            message: message.into(),
            severity: issue_type.default_severity(),
            causes: Vec::new(),
        }
    }

    /// Override the severity
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Attach a cause
    pub fn with_cause(mut self, cause: ValidationIssue) -> Self {
        self.causes.push(cause);
        self
    }

    /// Attach several causes
    pub fn with_causes(mut self, causes: impl IntoIterator<Item = ValidationIssue>) -> Self {
        self.causes.extend(causes);
        self
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(
            f,
            "{:indent$}[{}] {} {}: {}",
            "",
            self.severity,
            self.issue_type,
            self.path,
            self.message,
            indent = depth * 2
        )?;
        for cause in &self.causes {
            cause.fmt_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_severities() {
        assert_eq!(
            IssueType::BinaryInvalidLength.default_severity(),
            Severity::Error
        );
        assert_eq!(
            IssueType::PropertyRedundant.default_severity(),
            Severity::Warning
        );
        assert_eq!(
            IssueType::ContentValidationInfo.default_severity(),
            Severity::Info
        );
    }

    #[test]
    fn test_issue_display_includes_causes() {
        let issue = ValidationIssue::new(
            IssueType::ContentValidationError,
            "tile.i3dm",
            "External glTF is invalid",
        )
        .with_cause(ValidationIssue::new(
            IssueType::BinaryInvalid,
            "model.glb",
            "Invalid magic",
        ));

        let text = issue.to_string();
        assert!(text.contains("[ERROR] CONTENT_VALIDATION_ERROR tile.i3dm"));
        assert!(text.contains("  [ERROR] BINARY_INVALID model.glb: Invalid magic"));
    }

    #[test]
    fn test_issue_serializes_with_codes() {
        let issue = ValidationIssue::new(IssueType::BinaryLegacyHeader, "a.b3dm", "legacy");
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["type"], "BINARY_LEGACY_HEADER");
        assert_eq!(json["severity"], "ERROR");
        assert!(json.get("causes").is_none());
    }

    #[test]
    fn test_serialized_name_matches_code() {
        for issue_type in [
            IssueType::BinaryInvalidAlignment,
            IssueType::MetadataValueBoundMismatch,
            IssueType::IoError,
        ] {
            let json = serde_json::to_value(issue_type).unwrap();
            assert_eq!(json, issue_type.code());
        }
    }
}

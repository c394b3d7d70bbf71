//! Issue-collecting validation context

use std::sync::Arc;

use super::{IssueType, Severity, ValidationIssue, ValidationResult};
use crate::options::ValidationOptions;
use crate::resolver::{MemoryResourceResolver, ResourceResolver};
use crate::scene_graph::{GlbContainerValidator, SceneGraphValidator};

/// Append-only sink for the issues of one validation run
///
/// A context is owned by a single validation at a time. Validating many tiles
/// concurrently requires one context per tile; the caller merges the
/// [`ValidationResult`]s afterwards.
///
/// Resources that are validated in isolation (an embedded glTF, an external
/// glTF referenced by an instanced model) get a [`derive`](Self::derive)d
/// context. Its issues are folded into a single issue of the parent with
/// [`add_derived`](Self::add_derived).
pub struct ValidationContext {
    issues: Vec<ValidationIssue>,
    options: Arc<ValidationOptions>,
    resolver: Arc<dyn ResourceResolver>,
    scene_graph_validator: Arc<dyn SceneGraphValidator>,
}

impl ValidationContext {
    /// Create a context that resolves external resources with `resolver`
    pub fn new(resolver: Arc<dyn ResourceResolver>) -> Self {
        Self {
            issues: Vec::new(),
            options: Arc::new(ValidationOptions::default()),
            resolver,
            scene_graph_validator: Arc::new(GlbContainerValidator),
        }
    }

    /// Replace the validation options
    pub fn with_options(mut self, options: ValidationOptions) -> Self {
        self.options = Arc::new(options);
        self
    }

    /// Replace the validator used for embedded and external glTF payloads
    pub fn with_scene_graph_validator(mut self, validator: Arc<dyn SceneGraphValidator>) -> Self {
        self.scene_graph_validator = validator;
        self
    }

    /// Create an empty child context for a resource referenced by `uri`
    ///
    /// The child shares options and the scene graph validator, and resolves
    /// further URIs relative to the referenced resource.
    pub fn derive(&self, uri: &str) -> ValidationContext {
        Self {
            issues: Vec::new(),
            options: Arc::clone(&self.options),
            resolver: self.resolver.derive(uri),
            scene_graph_validator: Arc::clone(&self.scene_graph_validator),
        }
    }

    /// Create an empty child context that resolves URIs like this one
    pub fn derive_embedded(&self) -> ValidationContext {
        Self {
            issues: Vec::new(),
            options: Arc::clone(&self.options),
            resolver: Arc::clone(&self.resolver),
            scene_graph_validator: Arc::clone(&self.scene_graph_validator),
        }
    }

    /// Append an issue
    pub fn add_issue(&mut self, issue: ValidationIssue) {
        tracing::trace!(
            issue_type = issue.issue_type.code(),
            path = %issue.path,
            "{}",
            issue.message
        );
        self.issues.push(issue);
    }

    /// Fold the issues of a derived context into one issue of this context
    ///
    /// Nothing is added when the derived context is empty. Otherwise a single
    /// `CONTENT_VALIDATION_ERROR`, `_WARNING` or `_INFO` issue (after the most
    /// severe cause) is added, carrying all derived issues as causes.
    ///
    /// Returns `false` if the derived context contained any error.
    pub fn add_derived(&mut self, path: &str, subject: &str, derived: ValidationContext) -> bool {
        let causes = derived.issues;
        if causes.is_empty() {
            return true;
        }
        let worst = causes
            .iter()
            .map(|issue| issue.severity)
            .min()
            .unwrap_or(Severity::Info);
        let (issue_type, what) = match worst {
            Severity::Error => (IssueType::ContentValidationError, "errors"),
            Severity::Warning => (IssueType::ContentValidationWarning, "warnings"),
            Severity::Info => (IssueType::ContentValidationInfo, "information"),
        };
        let message = format!(
            "{} contains {} ({} issue(s))",
            subject,
            what,
            causes.len()
        );
        self.add_issue(ValidationIssue::new(issue_type, path, message).with_causes(causes));
        worst != Severity::Error
    }

    /// Issues collected so far
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// Number of collected issues with the given severity
    pub fn count(&self, severity: Severity) -> usize {
        self.issues
            .iter()
            .filter(|issue| issue.severity == severity)
            .count()
    }

    /// The options of this validation run
    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    /// The resolver for external resources
    pub fn resolver(&self) -> &dyn ResourceResolver {
        self.resolver.as_ref()
    }

    /// The validator for glTF payloads
    pub fn scene_graph_validator(&self) -> Arc<dyn SceneGraphValidator> {
        Arc::clone(&self.scene_graph_validator)
    }

    /// Finish the run
    pub fn into_result(self) -> ValidationResult {
        ValidationResult::new(self.issues)
    }
}

impl Default for ValidationContext {
    fn default() -> Self {
        Self::new(Arc::new(MemoryResourceResolver::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_derived_empty_adds_nothing() {
        let mut context = ValidationContext::default();
        let derived = context.derive_embedded();
        assert!(context.add_derived("tile.b3dm", "Embedded glTF", derived));
        assert!(context.issues().is_empty());
    }

    #[test]
    fn test_add_derived_folds_into_one_issue() {
        let mut context = ValidationContext::default();
        let mut derived = context.derive("model.glb");
        derived.add_issue(ValidationIssue::new(
            IssueType::BinaryInvalid,
            "model.glb",
            "first",
        ));
        derived.add_issue(ValidationIssue::new(
            IssueType::PropertyRedundant,
            "model.glb",
            "second",
        ));

        assert!(!context.add_derived("tile.i3dm", "External glTF 'model.glb'", derived));
        assert_eq!(context.issues().len(), 1);

        let folded = &context.issues()[0];
        assert_eq!(folded.issue_type, IssueType::ContentValidationError);
        assert_eq!(folded.path, "tile.i3dm");
        assert_eq!(folded.causes.len(), 2);
    }

    #[test]
    fn test_add_derived_warnings_only() {
        let mut context = ValidationContext::default();
        let mut derived = context.derive_embedded();
        derived.add_issue(ValidationIssue::new(
            IssueType::PropertyRedundant,
            "x",
            "ignored",
        ));

        assert!(context.add_derived("tile.b3dm", "Embedded glTF", derived));
        assert_eq!(
            context.issues()[0].issue_type,
            IssueType::ContentValidationWarning
        );
        assert_eq!(context.count(Severity::Warning), 1);
        assert_eq!(context.count(Severity::Error), 0);
    }
}

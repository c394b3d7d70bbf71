//! Validation issues and the context that collects them

mod context;
mod issue;
mod result;

pub use context::ValidationContext;
pub use issue::{IssueType, Severity, ValidationIssue};
pub use result::ValidationResult;

/// Join a parent path and a child segment with `/`
pub(crate) fn child_path(parent: &str, child: impl std::fmt::Display) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{}/{}", parent, child)
    }
}

//! Error types for tile content validation
//!
//! Validation *findings* are never errors: they are collected as
//! [`ValidationIssue`](crate::issues::ValidationIssue)s in a
//! [`ValidationContext`](crate::issues::ValidationContext). The errors in this
//! module describe situations where the validator itself cannot run, such as a
//! caller naming a metadata class that does not exist in the schema.
//!
//! # Error Codes
//!
//! Error codes follow the pattern: `E<category><number>`
//!
//! Categories:
//! - **E1xxx**: I/O and resource errors
//! - **E2xxx**: JSON and configuration errors
//! - **E3xxx**: Invalid caller input
//!
//! ## Common Error Codes
//!
//! - `E1001`: I/O error reading a resource
//! - `E1002`: Resource could not be resolved
//! - `E2001`: JSON parsing error
//! - `E2002`: Invalid validation options
//! - `E3001`: Metadata class or enum not found in the schema
//! - `E3002`: Invalid input passed to a validator

use std::io;
use thiserror::Error;

/// Result type for validator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that prevent a validation from running at all
#[derive(Error, Debug)]
pub enum Error {
    /// IO error occurred while reading a resource
    ///
    /// **Error Code**: E1001
    ///
    /// **Common Causes**:
    /// - File not found
    /// - Insufficient permissions
    #[error("[E1001] I/O error: {0}")]
    Io(#[from] io::Error),

    /// A resource URI could not be resolved
    ///
    /// **Error Code**: E1002
    ///
    /// **Common Causes**:
    /// - The URI points outside the root of a sandboxed resolver
    /// - The URI uses an unsupported scheme (`data:`, `http:`)
    #[error("[E1002] Resource not found: {0}")]
    ResourceNotFound(String),

    /// JSON parsing error
    ///
    /// **Error Code**: E2001
    ///
    /// **Common Causes**:
    /// - Malformed JSON syntax
    /// - JSON that does not match the expected structure
    #[error("[E2001] JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation options could not be interpreted
    ///
    /// **Error Code**: E2002
    #[error("[E2002] Invalid options: {0}")]
    InvalidOptions(String),

    /// A metadata class or enum referenced by the caller is not defined
    ///
    /// **Error Code**: E3001
    ///
    /// **Suggestions**:
    /// - Check that the property table's `class` names a class of the schema
    /// - Check that every `ENUM` property names an enum of the schema
    #[error("[E3001] Schema element not found: {0}")]
    SchemaElementNotFound(String),

    /// Input that a validator cannot work with
    ///
    /// **Error Code**: E3002
    #[error("[E3002] Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Create a SchemaElementNotFound error for a missing class
    pub fn missing_class(class_name: &str) -> Self {
        Error::SchemaElementNotFound(format!(
            "The schema does not define the class '{}'",
            class_name
        ))
    }

    /// Create a SchemaElementNotFound error for a missing enum
    ///
    /// # Arguments
    /// * `property_name` - The class property that refers to the enum
    /// * `enum_type` - The name of the enum that was not found
    pub fn missing_enum(property_name: &str, enum_type: &str) -> Self {
        Error::SchemaElementNotFound(format!(
            "Property '{}' refers to the enum '{}', which the schema does not define",
            property_name, enum_type
        ))
    }

    /// Create an InvalidInput error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Error::InvalidInput(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_in_messages() {
        let io_err = Error::Io(io::Error::new(io::ErrorKind::NotFound, "test"));
        assert!(io_err.to_string().contains("[E1001]"));

        let not_found = Error::ResourceNotFound("tile.glb".to_string());
        assert!(not_found.to_string().contains("[E1002]"));

        let options = Error::InvalidOptions("bad".to_string());
        assert!(options.to_string().contains("[E2002]"));

        let input = Error::invalid_input("no rows");
        assert!(input.to_string().contains("[E3002]"));
    }

    #[test]
    fn test_json_error_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = Error::from(parse_err);
        assert!(err.to_string().contains("[E2001]"));
    }

    #[test]
    fn test_missing_schema_element_helpers() {
        let err = Error::missing_class("building");
        assert!(err.to_string().contains("'building'"));
        assert!(err.to_string().contains("[E3001]"));

        let err = Error::missing_enum("kind", "KindEnum");
        assert!(err.to_string().contains("'kind'"));
        assert!(err.to_string().contains("'KindEnum'"));
    }
}

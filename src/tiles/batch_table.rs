//! Structural validation of batch tables

use serde_json::{Map, Value};

use super::feature_table::binary_reference;
use super::semantics::{TableComponentType, TableElementType};
use crate::issues::{IssueType, ValidationContext, ValidationIssue};

/// Validate every property of a batch table
///
/// A property is either an array with one entry per feature, or a reference
/// into the batch table binary with a `byteOffset`, a `type` and a
/// `componentType`. Binary references must be aligned to their component size
/// and must fit into the binary body. `extensions` and `extras` are skipped.
pub fn validate_batch_table(
    path: &str,
    json: &Map<String, Value>,
    binary: &[u8],
    features_length: u64,
    context: &mut ValidationContext,
) -> bool {
    let mut valid = true;
    for (name, value) in json {
        if name == "extensions" || name == "extras" {
            continue;
        }
        let result = if binary_reference(value).is_some() {
            validate_binary_property(name, value, binary, features_length)
        } else {
            validate_json_property(name, value, features_length)
        };
        if let Err(message) = result {
            context.add_issue(ValidationIssue::new(
                IssueType::BatchTablePropertyInvalid,
                path,
                message,
            ));
            valid = false;
        }
    }
    valid
}

fn validate_binary_property(
    name: &str,
    value: &Value,
    binary: &[u8],
    features_length: u64,
) -> Result<(), String> {
    let byte_offset = value
        .get("byteOffset")
        .and_then(Value::as_u64)
        .ok_or_else(|| format!("The byteOffset of batch table property '{}' must be a non-negative integer", name))?;
    let element_type = match value.get("type").and_then(Value::as_str) {
        None => {
            return Err(format!(
                "Batch table binary property '{}' must have a type",
                name
            ))
        }
        Some(type_name) => TableElementType::from_name(type_name).ok_or_else(|| {
            format!(
                "Batch table binary property '{}' has invalid type '{}'",
                name, type_name
            )
        })?,
    };
    let component_type = match value.get("componentType").and_then(Value::as_str) {
        None => {
            return Err(format!(
                "Batch table binary property '{}' must have a componentType",
                name
            ))
        }
        Some(type_name) => TableComponentType::from_name(type_name).ok_or_else(|| {
            format!(
                "Batch table binary property '{}' has invalid componentType '{}'",
                name, type_name
            )
        })?,
    };

    let component_size = component_type.byte_size() as u64;
    if byte_offset % component_size != 0 {
        return Err(format!(
            "Batch table binary property '{}' must be aligned to a {}-byte boundary, but has byteOffset {}",
            name, component_size, byte_offset
        ));
    }
    let byte_length = element_type.byte_length(component_type, features_length);
    let end = byte_offset.saturating_add(byte_length);
    if end > binary.len() as u64 {
        return Err(format!(
            "Batch table binary property '{}' exceeds the batch table binary byte length: \
             {} (byteOffset) + {} features × {} × {} bytes ({}) = {} > {}",
            name,
            byte_offset,
            features_length,
            element_type.component_count(),
            component_size,
            component_type,
            end,
            binary.len()
        ));
    }
    Ok(())
}

fn validate_json_property(name: &str, value: &Value, features_length: u64) -> Result<(), String> {
    let Some(array) = value.as_array() else {
        return Err(format!(
            "Batch table property '{}' must be an array or a binary reference",
            name
        ));
    };
    if array.len() as u64 != features_length {
        return Err(format!(
            "Batch table property '{}' must have one entry per feature ({}), but has {}",
            name,
            features_length,
            array.len()
        ));
    }
    Ok(())
}

//! Structural validation of feature tables

use byteorder::{ByteOrder, LittleEndian};
use serde_json::{Map, Value};

use super::semantics::{
    Semantic, SemanticDefinition, SemanticTable, TableComponentType, TableElementType,
};
use crate::issues::{IssueType, ValidationContext, ValidationIssue};

const DRACO_EXTENSION: &str = "3DTILES_draco_point_compression";

/// A feature table: its JSON header and binary body
#[derive(Debug, Clone, Copy)]
pub struct FeatureTable<'a> {
    json: &'a Map<String, Value>,
    binary: &'a [u8],
}

/// Outcome of reading a global count such as `BATCH_LENGTH`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobalCount {
    /// The semantic is not present
    Missing,
    /// The semantic is present but does not hold a count
    Invalid(String),
    /// The count
    Count(u64),
}

impl<'a> FeatureTable<'a> {
    /// Wrap the parsed JSON and the binary body
    pub fn new(json: &'a Map<String, Value>, binary: &'a [u8]) -> Self {
        Self { json, binary }
    }

    /// The JSON header
    pub fn json(&self) -> &'a Map<String, Value> {
        self.json
    }

    /// The binary body
    pub fn binary(&self) -> &'a [u8] {
        self.binary
    }

    /// Whether the semantic is present
    pub fn has(&self, semantic: Semantic) -> bool {
        self.json.contains_key(semantic.name())
    }

    /// Read a global unsigned integer, inline or from the binary body
    pub fn global_count(&self, semantic: Semantic) -> GlobalCount {
        let Some(value) = self.json.get(semantic.name()) else {
            return GlobalCount::Missing;
        };
        if let Some(count) = value.as_u64() {
            return GlobalCount::Count(count);
        }
        if let Some(byte_offset) = binary_reference(value) {
            let Some(offset) = byte_offset.as_u64() else {
                return GlobalCount::Invalid(format!(
                    "The byteOffset of {} must be a non-negative integer",
                    semantic
                ));
            };
            let component_type = match value.get("componentType").and_then(Value::as_str) {
                None => TableComponentType::UnsignedInt,
                Some(name) => match TableComponentType::from_name(name) {
                    Some(t) => t,
                    None => {
                        return GlobalCount::Invalid(format!(
                            "{} has an invalid componentType '{}'",
                            semantic, name
                        ))
                    }
                },
            };
            return match read_unsigned(self.binary, offset, component_type) {
                Some(count) => GlobalCount::Count(count),
                None => GlobalCount::Invalid(format!(
                    "{} at byteOffset {} with componentType {} cannot be read from the \
                     feature table binary with a length of {} bytes",
                    semantic,
                    offset,
                    component_type,
                    self.binary.len()
                )),
            };
        }
        GlobalCount::Invalid(format!(
            "{} must be a non-negative integer or a binary reference, but is {}",
            semantic, value
        ))
    }

    fn draco_compressed(&self, name: &str) -> bool {
        self.json
            .get("extensions")
            .and_then(|e| e.get(DRACO_EXTENSION))
            .and_then(|d| d.get("properties"))
            .and_then(Value::as_object)
            .is_some_and(|properties| properties.contains_key(name))
    }
}

/// The `byteOffset` of a binary reference, if `value` is one
pub(crate) fn binary_reference(value: &Value) -> Option<&Value> {
    value.as_object().and_then(|o| o.get("byteOffset"))
}

fn read_unsigned(binary: &[u8], offset: u64, component_type: TableComponentType) -> Option<u64> {
    let start = usize::try_from(offset).ok()?;
    let bytes = binary.get(start..start.checked_add(component_type.byte_size())?)?;
    match component_type {
        TableComponentType::UnsignedByte => Some(bytes[0] as u64),
        TableComponentType::UnsignedShort => Some(LittleEndian::read_u16(bytes) as u64),
        TableComponentType::UnsignedInt => Some(LittleEndian::read_u32(bytes) as u64),
        _ => None,
    }
}

/// Validate every property of a feature table against the format's semantics
///
/// Unknown semantics, binary references that are misaligned or exceed the
/// binary body, disallowed component types and JSON values of the wrong shape
/// are reported. All properties are checked; the result is `false` if any
/// issue was found.
///
/// # Arguments
///
/// * `path` - Path of the feature table, used for issues
/// * `table` - The feature table
/// * `features_length` - Number of features, the item count of per-feature semantics
/// * `semantics` - The semantics of the format
/// * `context` - Receives the issues
pub fn validate_feature_table(
    path: &str,
    table: &FeatureTable<'_>,
    features_length: u64,
    semantics: &SemanticTable,
    context: &mut ValidationContext,
) -> bool {
    let mut valid = true;
    for (name, value) in table.json {
        if name == "extensions" || name == "extras" {
            continue;
        }
        let Some(definition) = semantics.lookup(name) else {
            context.add_issue(ValidationIssue::new(
                IssueType::FeatureTablePropertyInvalid,
                path,
                format!("Invalid feature table property '{}'", name),
            ));
            valid = false;
            continue;
        };
        if table.draco_compressed(name) {
            tracing::trace!(path, semantic = name.as_str(), "draco compressed, extent not checked");
            continue;
        }
        let items = if definition.global { 1 } else { features_length };
        if let Err(message) = validate_property(definition, value, items, table.binary) {
            context.add_issue(ValidationIssue::new(
                IssueType::FeatureTablePropertyInvalid,
                path,
                message,
            ));
            valid = false;
        }
    }
    valid
}

fn validate_property(
    definition: &SemanticDefinition,
    value: &Value,
    items: u64,
    binary: &[u8],
) -> Result<(), String> {
    let name = definition.semantic.name();
    if let Some(byte_offset) = binary_reference(value) {
        let byte_offset = byte_offset
            .as_u64()
            .ok_or_else(|| format!("The byteOffset of feature table property {} must be a non-negative integer", name))?;
        let component_type = match value.get("componentType") {
            None => definition.component_type,
            Some(Value::String(type_name)) => TableComponentType::from_name(type_name)
                .ok_or_else(|| format!("Feature table property {} has invalid componentType '{}'", name, type_name))?,
            Some(other) => {
                return Err(format!(
                    "The componentType of feature table property {} must be a string, but is {}",
                    name, other
                ))
            }
        };
        if !definition.allows(component_type) {
            return Err(format!(
                "Feature table property {} has componentType {}, which is not allowed",
                name, component_type
            ));
        }
        let component_size = component_type.byte_size() as u64;
        if definition.element_type != TableElementType::Boolean && byte_offset % component_size != 0 {
            return Err(format!(
                "Feature table binary property {} must be aligned to a {}-byte boundary, but has byteOffset {}",
                name, component_size, byte_offset
            ));
        }
        let byte_length = definition.element_type.byte_length(component_type, items);
        let end = byte_offset.saturating_add(byte_length);
        if end > binary.len() as u64 {
            return Err(format!(
                "Feature table binary property {} exceeds the feature table binary byte length: \
                 {} (byteOffset) + {} = {} > {}",
                name,
                byte_offset,
                byte_length,
                end,
                binary.len()
            ));
        }
        return Ok(());
    }

    match definition.element_type {
        TableElementType::Boolean => {
            if !value.is_boolean() {
                return Err(format!("Feature table property {} must be a boolean", name));
            }
        }
        element_type => {
            let expected = (element_type.component_count() as u64).saturating_mul(items);
            if definition.global && element_type == TableElementType::Scalar {
                if !value.is_number() {
                    return Err(format!(
                        "Feature table property {} must be a number or a binary reference",
                        name
                    ));
                }
            } else {
                let Some(array) = value.as_array() else {
                    return Err(format!(
                        "Feature table property {} must be an array or a binary reference",
                        name
                    ));
                };
                if array.len() as u64 != expected {
                    return Err(format!(
                        "Feature table property {} must be an array of length {}, but has length {}",
                        name,
                        expected,
                        array.len()
                    ));
                }
                if !array.iter().all(Value::is_number) {
                    return Err(format!(
                        "Feature table property {} must only contain numbers",
                        name
                    ));
                }
            }
        }
    }
    Ok(())
}

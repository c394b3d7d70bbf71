//! Byte layout of the buffer views of a binary property table

use tracing::trace;

use super::property_table::BinaryPropertyTable;
use super::schema::{ClassProperty, ComponentType, PropertyTableProperty, PropertyType};
use crate::issues::{IssueType, ValidationContext, ValidationIssue};

/// Validate the byte layout of every property of a property table
///
/// For each class property that the table stores, the array offsets (for
/// variable-length arrays), the string offsets (for strings) and the values
/// are checked in that order. Offsets must be aligned to their component
/// size, have exactly one more entry than the elements they delimit and must
/// not decrease. The values must be aligned to their component size and have
/// exactly the byte length that the row count and the offsets imply.
///
/// Returns `true` if the layout of every property is valid.
pub fn validate_property_table_layout(
    path: &str,
    table: &BinaryPropertyTable,
    context: &mut ValidationContext,
) -> bool {
    let mut valid = true;
    for (name, class_property) in &table.metadata_class().properties {
        let Some(table_property) = table.property_table().properties.get(name) else {
            trace!(path, property = name.as_str(), "property not stored in the table");
            continue;
        };
        let property_path = format!("{}/{}", path, name);
        valid &= validate_property_layout(
            &property_path,
            name,
            class_property,
            table_property,
            table,
            context,
        );
    }
    valid
}

fn validate_property_layout(
    path: &str,
    name: &str,
    class_property: &ClassProperty,
    table_property: &PropertyTableProperty,
    table: &BinaryPropertyTable,
    context: &mut ValidationContext,
) -> bool {
    let count = table.count();

    let mut array_offsets = None;
    if class_property.is_variable_length_array() {
        let Some(index) = table_property.array_offsets else {
            context.add_issue(ValidationIssue::new(
                IssueType::PropertyMissing,
                path,
                format!(
                    "The variable-length array property '{}' does not define arrayOffsets",
                    name
                ),
            ));
            return false;
        };
        let offset_type = table_property
            .array_offset_type
            .unwrap_or(ComponentType::Uint32);
        let Some(offsets) = validate_offsets(
            path,
            name,
            "arrayOffsets",
            index,
            offset_type,
            count,
            table,
            context,
        ) else {
            return false;
        };
        array_offsets = Some(offsets);
    }

    let mut string_offsets = None;
    if class_property.property_type == PropertyType::String {
        let num_strings = match (&array_offsets, class_property.count) {
            (Some(offsets), _) => offsets.last().copied().unwrap_or(0),
            (None, Some(fixed)) if class_property.array => count.saturating_mul(fixed),
            (None, _) => count,
        };
        let Some(index) = table_property.string_offsets else {
            context.add_issue(ValidationIssue::new(
                IssueType::PropertyMissing,
                path,
                format!("The STRING property '{}' does not define stringOffsets", name),
            ));
            return false;
        };
        let offset_type = table_property
            .string_offset_type
            .unwrap_or(ComponentType::Uint32);
        let Some(offsets) = validate_offsets(
            path,
            name,
            "stringOffsets",
            index,
            offset_type,
            num_strings,
            table,
            context,
        ) else {
            return false;
        };
        string_offsets = Some(offsets);
    }

    validate_values(
        path,
        name,
        class_property,
        table_property.values,
        array_offsets.as_deref(),
        string_offsets.as_deref(),
        table,
        context,
    )
}

/// Check an offsets buffer view and return its decoded entries
#[allow(clippy::too_many_arguments)]
fn validate_offsets(
    path: &str,
    name: &str,
    kind: &str,
    index: usize,
    offset_type: ComponentType,
    num_elements: u64,
    table: &BinaryPropertyTable,
    context: &mut ValidationContext,
) -> Option<Vec<u64>> {
    if !offset_type.is_unsigned() {
        context.add_issue(ValidationIssue::new(
            IssueType::BinaryInvalidValue,
            path,
            format!(
                "The {} of property '{}' have the type {}, but must be UINT8, UINT16, UINT32 or UINT64",
                kind, name, offset_type
            ),
        ));
        return None;
    }
    let data = buffer_view(path, name, kind, index, table, context)?;

    let size = offset_type.byte_size() as u64;
    let mut valid = check_alignment(path, name, kind, index, offset_type, table, context);
    let num_offsets = num_elements.saturating_add(1);
    let expected = num_offsets.saturating_mul(size);
    if data.len() as u64 != expected {
        context.add_issue(ValidationIssue::new(
            IssueType::BinaryInvalidLength,
            path,
            format!(
                "The {} buffer view {} of property '{}' has a byteLength of {}, but must have a \
                 byteLength of {}: ({} elements + 1) × {} bytes ({})",
                kind,
                index,
                name,
                data.len(),
                expected,
                num_elements,
                size,
                offset_type
            ),
        ));
        valid = false;
    }
    if !valid {
        return None;
    }

    let offsets = (0..num_offsets as usize)
        .map(|i| offset_type.read_offset(data, i))
        .collect::<Option<Vec<_>>>()?;
    for (i, pair) in offsets.windows(2).enumerate() {
        if pair[1] < pair[0] {
            context.add_issue(ValidationIssue::new(
                IssueType::BinaryInvalidValue,
                path,
                format!(
                    "The {} of property '{}' must not decrease, but the entry at index {} is {} \
                     and the entry at index {} is {}",
                    kind,
                    name,
                    i,
                    pair[0],
                    i + 1,
                    pair[1]
                ),
            ));
            return None;
        }
    }
    Some(offsets)
}

#[allow(clippy::too_many_arguments)]
fn validate_values(
    path: &str,
    name: &str,
    class_property: &ClassProperty,
    index: usize,
    array_offsets: Option<&[u64]>,
    string_offsets: Option<&[u64]>,
    table: &BinaryPropertyTable,
    context: &mut ValidationContext,
) -> bool {
    let Some(data) = buffer_view(path, name, "values", index, table, context) else {
        return false;
    };
    let component_type = table.values_component_type(class_property);
    let mut valid = true;
    if component_type.byte_size() > 1 {
        valid &= check_alignment(path, name, "values", index, component_type, table, context);
    }

    let (expected, derivation) = expected_values_length(
        class_property,
        component_type,
        table.count(),
        array_offsets,
        string_offsets,
    );
    if data.len() as u64 != expected {
        context.add_issue(ValidationIssue::new(
            IssueType::BinaryInvalidLength,
            path,
            format!(
                "The values buffer view {} of property '{}' has a byteLength of {}, but must have a \
                 byteLength of {}: {}",
                index,
                name,
                data.len(),
                expected,
                derivation
            ),
        ));
        valid = false;
    }
    valid
}

/// The byte length of the values and how it was computed
fn expected_values_length(
    class_property: &ClassProperty,
    component_type: ComponentType,
    count: u64,
    array_offsets: Option<&[u64]>,
    string_offsets: Option<&[u64]>,
) -> (u64, String) {
    let size = component_type.byte_size() as u64;
    if let Some(offsets) = string_offsets {
        let total = offsets.last().copied().unwrap_or(0);
        return (
            total,
            format!("the last stringOffsets entry is {}", total),
        );
    }

    let (elements, element_derivation) = match (array_offsets, class_property.count) {
        (Some(offsets), _) => {
            let last = offsets.last().copied().unwrap_or(0);
            (last, format!("{} elements (the last arrayOffsets entry)", last))
        }
        (None, Some(fixed)) if class_property.array => (
            count.saturating_mul(fixed),
            format!("{} rows × {} elements", count, fixed),
        ),
        (None, _) => (count, format!("{} rows", count)),
    };

    if class_property.property_type == PropertyType::Boolean {
        let bytes = elements.div_ceil(8);
        return (
            bytes.saturating_mul(size),
            format!("ceil({} / 8) bytes of bits", element_derivation),
        );
    }
    let components = class_property.property_type.component_count() as u64;
    (
        elements.saturating_mul(components).saturating_mul(size),
        format!(
            "{} × {} component(s) × {} bytes ({})",
            element_derivation, components, size, component_type
        ),
    )
}

fn buffer_view<'t>(
    path: &str,
    name: &str,
    kind: &str,
    index: usize,
    table: &'t BinaryPropertyTable,
    context: &mut ValidationContext,
) -> Option<&'t [u8]> {
    match table.buffer_view_data(index) {
        Ok(data) => Some(data),
        Err(reason) => {
            context.add_issue(ValidationIssue::new(
                IssueType::BinaryInvalidLength,
                path,
                format!("The {} of property '{}' cannot be read: {}", kind, name, reason),
            ));
            None
        }
    }
}

fn check_alignment(
    path: &str,
    name: &str,
    kind: &str,
    index: usize,
    component_type: ComponentType,
    table: &BinaryPropertyTable,
    context: &mut ValidationContext,
) -> bool {
    let Some(view) = table.buffer_views().get(index) else {
        return false;
    };
    let size = component_type.byte_size() as u64;
    if view.byte_offset % size != 0 {
        context.add_issue(ValidationIssue::new(
            IssueType::BinaryInvalidAlignment,
            path,
            format!(
                "The {} buffer view {} of property '{}' has a byteOffset of {}, which is not \
                 aligned to the {}-byte size of its component type {}",
                kind, index, name, view.byte_offset, size, component_type
            ),
        ));
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::schema::{BufferView, PropertyTable, Schema};

    fn table(property_json: &str, table_json: &str, count: u64, views: Vec<(u64, Vec<u8>)>) -> BinaryPropertyTable {
        let schema: Schema = serde_json::from_str(&format!(
            r#"{{"classes": {{"c": {{"properties": {{"p": {}}}}}}}}}"#,
            property_json
        ))
        .unwrap();
        let property_table: PropertyTable = serde_json::from_str(&format!(
            r#"{{"class": "c", "count": {}, "properties": {{"p": {}}}}}"#,
            count, table_json
        ))
        .unwrap();
        let mut buffer_views = Vec::new();
        let mut buffers = Vec::new();
        for (i, (offset, data)) in views.into_iter().enumerate() {
            let mut buffer = vec![0; offset as usize];
            buffer_views.push(BufferView::new(i, offset, data.len() as u64));
            buffer.extend(data);
            buffers.push(buffer);
        }
        BinaryPropertyTable::new(&schema, property_table, buffer_views, buffers).unwrap()
    }

    fn validate(table: &BinaryPropertyTable) -> (bool, Vec<ValidationIssue>) {
        let mut context = ValidationContext::default();
        let valid = validate_property_table_layout("pt", table, &mut context);
        (valid, context.issues().to_vec())
    }

    #[test]
    fn test_uint16_values_length() {
        let property = r#"{"type": "SCALAR", "componentType": "UINT16"}"#;
        let (valid, _) = validate(&table(property, r#"{"values": 0}"#, 4, vec![(0, vec![0; 8])]));
        assert!(valid);

        for length in [7, 9] {
            let (valid, issues) =
                validate(&table(property, r#"{"values": 0}"#, 4, vec![(0, vec![0; length])]));
            assert!(!valid);
            assert_eq!(issues.len(), 1);
            assert_eq!(issues[0].issue_type, IssueType::BinaryInvalidLength);
            assert!(issues[0].message.contains("must have a byteLength of 8"));
            assert!(issues[0].message.contains("4 rows × 1 component(s) × 2 bytes (UINT16)"));
        }
    }

    #[test]
    fn test_values_alignment() {
        let property = r#"{"type": "SCALAR", "componentType": "FLOAT32"}"#;
        let (valid, issues) = validate(&table(property, r#"{"values": 0}"#, 1, vec![(2, vec![0; 4])]));
        assert!(!valid);
        assert_eq!(issues[0].issue_type, IssueType::BinaryInvalidAlignment);

        let property = r#"{"type": "SCALAR", "componentType": "UINT8"}"#;
        let (valid, _) = validate(&table(property, r#"{"values": 0}"#, 1, vec![(3, vec![0; 1])]));
        assert!(valid);
    }

    #[test]
    fn test_fixed_arrays_and_vectors() {
        let property = r#"{"type": "VEC3", "componentType": "FLOAT32", "array": true, "count": 2}"#;
        let (valid, _) = validate(&table(property, r#"{"values": 0}"#, 3, vec![(0, vec![0; 72])]));
        assert!(valid);
    }

    #[test]
    fn test_booleans_round_up() {
        let property = r#"{"type": "BOOLEAN"}"#;
        let (valid, _) = validate(&table(property, r#"{"values": 0}"#, 9, vec![(0, vec![0; 2])]));
        assert!(valid);
        let (valid, issues) = validate(&table(property, r#"{"values": 0}"#, 9, vec![(0, vec![0; 1])]));
        assert!(!valid);
        assert!(issues[0].message.contains("ceil(9 rows / 8)"));
    }

    #[test]
    fn test_string_offsets_monotonic() {
        let property = r#"{"type": "STRING"}"#;
        let table_json = r#"{"values": 0, "stringOffsets": 1, "stringOffsetType": "UINT8"}"#;
        let (valid, issues) = validate(&table(
            property,
            table_json,
            3,
            vec![(0, b"abcdefg".to_vec()), (0, vec![0, 3, 3, 7])],
        ));
        assert!(valid, "{:?}", issues);

        let (valid, issues) = validate(&table(
            property,
            table_json,
            3,
            vec![(0, b"abcdefg".to_vec()), (0, vec![0, 3, 2, 7])],
        ));
        assert!(!valid);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("index 1 is 3 and the entry at index 2 is 2"));
    }

    #[test]
    fn test_variable_length_string_arrays() {
        let property = r#"{"type": "STRING", "array": true}"#;
        let table_json = r#"{"values": 0, "arrayOffsets": 1, "stringOffsets": 2,
            "arrayOffsetType": "UINT8", "stringOffsetType": "UINT16"}"#;
        // two rows with 2 and 1 strings
        let string_offsets: Vec<u8> = [0u16, 3, 3, 7].iter().flat_map(|v| v.to_le_bytes()).collect();
        let (valid, issues) = validate(&table(
            property,
            table_json,
            2,
            vec![(0, b"abcdefg".to_vec()), (0, vec![0, 2, 3]), (0, string_offsets)],
        ));
        assert!(valid, "{:?}", issues);
    }

    #[test]
    fn test_array_offsets_failure_stops_property() {
        let property = r#"{"type": "SCALAR", "componentType": "UINT32", "array": true}"#;
        let (valid, issues) = validate(&table(
            property,
            r#"{"values": 0, "arrayOffsets": 1}"#,
            2,
            vec![(0, vec![0; 5]), (0, vec![0; 8])],
        ));
        assert!(!valid);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("(2 elements + 1) × 4 bytes (UINT32)"));
    }

    #[test]
    fn test_variable_length_values() {
        let property = r#"{"type": "SCALAR", "componentType": "UINT32", "array": true}"#;
        let offsets: Vec<u8> = [0u32, 1, 3].iter().flat_map(|v| v.to_le_bytes()).collect();
        let (valid, issues) = validate(&table(
            property,
            r#"{"values": 0, "arrayOffsets": 1}"#,
            2,
            vec![(0, vec![0; 8]), (0, offsets)],
        ));
        assert!(!valid);
        assert!(issues[0].message.contains("byteLength of 12: 3 elements (the last arrayOffsets entry)"));
    }

    #[test]
    fn test_buffer_view_out_of_range() {
        let property = r#"{"type": "SCALAR", "componentType": "UINT8"}"#;
        let (valid, issues) = validate(&table(property, r#"{"values": 4}"#, 1, vec![(0, vec![0])]));
        assert!(!valid);
        assert!(issues[0].message.contains("out of range"));
    }

    #[test]
    fn test_enum_values_use_enum_value_type() {
        let schema: Schema = serde_json::from_str(
            r#"{"classes": {"c": {"properties": {"e": {"type": "ENUM", "enumType": "k"}}}},
                "enums": {"k": {"values": [{"name": "a", "value": 0}]}}}"#,
        )
        .unwrap();
        let property_table: PropertyTable = serde_json::from_str(
            r#"{"class": "c", "count": 3, "properties": {"e": {"values": 0}}}"#,
        )
        .unwrap();
        let table = BinaryPropertyTable::new(
            &schema,
            property_table,
            vec![BufferView::new(0, 0, 6)],
            vec![vec![0; 6]],
        )
        .unwrap();
        let (valid, issues) = validate(&table);
        assert!(valid, "{:?}", issues);
    }
}

//! Integration tests for binary property table validation

mod common;

use common::*;
use tiles3d_validator::metadata::{
    create_property_model, validate_property_table_layout, BinaryPropertyTable, MetadataPropertyModel,
    MetadataValue,
};
use tiles3d_validator::{
    validate_binary_property_table, Error, IssueType, ValidationContext, ValidationOptions,
};

const HEIGHT_SCHEMA: &str = r#"{
    "id": "buildings",
    "classes": {
        "building": {
            "properties": {
                "height": {"type": "SCALAR", "componentType": "UINT16"}
            }
        }
    }
}"#;

fn heights(min: Option<u16>, values: &[u16], view_length: u64) -> BinaryPropertyTable {
    let min = min.map(|m| format!(r#", "min": {}"#, m)).unwrap_or_default();
    let table = format!(
        r#"{{"class": "building", "count": 4, "properties": {{"height": {{"values": 0{}}}}}}}"#,
        min
    );
    let mut data = u16_bytes(values);
    data.resize(16, 0);
    property_table(HEIGHT_SCHEMA, &table, &[(0, view_length)], data)
}

#[test]
fn test_values_byte_length_must_match_row_count() {
    init_tracing();
    let mut context = ValidationContext::default();
    assert!(validate_binary_property_table("pt", &heights(None, &[1, 2, 3, 4], 8), &mut context));
    assert!(context.issues().is_empty());

    for length in [7, 9] {
        let mut context = ValidationContext::default();
        assert!(!validate_binary_property_table(
            "pt",
            &heights(None, &[1, 2, 3, 4], length),
            &mut context
        ));
        assert_eq!(context.issues().len(), 1);
        let issue = &context.issues()[0];
        assert_eq!(issue.issue_type, IssueType::BinaryInvalidLength);
        assert_eq!(issue.path, "pt/height");
        assert!(issue.message.contains("byteLength of 8"));
    }
}

#[test]
fn test_table_minimum_must_equal_computed_minimum() {
    let mut context = ValidationContext::default();
    assert!(!validate_binary_property_table(
        "pt",
        &heights(Some(10), &[12, 15, 20, 30], 8),
        &mut context
    ));
    assert_eq!(context.issues().len(), 1);
    assert_eq!(context.issues()[0].issue_type, IssueType::MetadataValueBoundMismatch);

    let mut context = ValidationContext::default();
    assert!(validate_binary_property_table(
        "pt",
        &heights(Some(12), &[12, 15, 20, 30], 8),
        &mut context
    ));
}

#[test]
fn test_layout_errors_skip_value_checks() {
    let mut context = ValidationContext::default();
    assert!(!validate_binary_property_table(
        "pt",
        &heights(Some(10), &[12, 15, 20, 30], 9),
        &mut context
    ));
    let types: Vec<_> = context.issues().iter().map(|i| i.issue_type).collect();
    assert_eq!(types, vec![IssueType::BinaryInvalidLength]);
}

#[test]
fn test_values_can_be_skipped_by_options() {
    let options =
        ValidationOptions::from_json_str(r#"{"validateMetadataValues": false}"#).unwrap();
    let mut context = ValidationContext::default().with_options(options);
    assert!(validate_binary_property_table(
        "pt",
        &heights(Some(10), &[12, 15, 20, 30], 8),
        &mut context
    ));
}

const NAME_SCHEMA: &str = r#"{
    "classes": {
        "tree": {
            "properties": {
                "name": {"type": "STRING"}
            }
        }
    }
}"#;

fn names(offsets: &[u32]) -> BinaryPropertyTable {
    let mut data = b"oakpine\0".to_vec();
    data.extend(u32_bytes(offsets));
    property_table(
        NAME_SCHEMA,
        r#"{"class": "tree", "count": 3, "properties": {"name": {"values": 0, "stringOffsets": 1}}}"#,
        &[(0, 7), (8, 16)],
        data,
    )
}

#[test]
fn test_string_offsets_must_not_decrease() {
    let mut context = ValidationContext::default();
    let table = names(&[0, 3, 3, 7]);
    assert!(validate_binary_property_table("pt", &table, &mut context), "{:?}", context.issues());

    let model = create_property_model(&table, "name").unwrap();
    assert_eq!(model.property_value(0), Some(MetadataValue::String("oak".into())));
    assert_eq!(model.property_value(1), Some(MetadataValue::String(String::new())));
    assert_eq!(model.property_value(2), Some(MetadataValue::String("pine".into())));

    let mut context = ValidationContext::default();
    assert!(!validate_binary_property_table("pt", &names(&[0, 3, 2, 7]), &mut context));
    assert_eq!(context.issues().len(), 1);
    assert_eq!(context.issues()[0].issue_type, IssueType::BinaryInvalidValue);
    assert!(context.issues()[0].message.contains("entry at index 2 is 2"));
}

#[test]
fn test_enum_and_range_issues_accumulate() {
    let schema = r#"{
        "classes": {
            "parcel": {
                "properties": {
                    "zone": {"type": "ENUM", "enumType": "zoning"},
                    "area": {"type": "SCALAR", "componentType": "FLOAT32", "min": 0.0}
                }
            }
        },
        "enums": {
            "zoning": {
                "valueType": "UINT8",
                "values": [{"name": "RESIDENTIAL", "value": 0}, {"name": "COMMERCIAL", "value": 1}]
            }
        }
    }"#;
    let table = r#"{"class": "parcel", "count": 2,
        "properties": {"zone": {"values": 0}, "area": {"values": 1}}}"#;
    let mut data = vec![1, 7, 0, 0, 0, 0, 0, 0];
    data.extend((12.5f32).to_le_bytes());
    data.extend((-1.0f32).to_le_bytes());
    let table = property_table(schema, table, &[(0, 2), (8, 8)], data);

    let mut context = ValidationContext::default();
    assert!(!validate_binary_property_table("parcels", &table, &mut context));
    let issues = context.issues();
    assert_eq!(issues.len(), 2, "{:?}", issues);
    assert_eq!(issues[0].issue_type, IssueType::MetadataValueNotInRange);
    assert_eq!(issues[0].path, "parcels/area");
    assert_eq!(issues[1].issue_type, IssueType::MetadataInvalidEnumValue);
    assert_eq!(issues[1].path, "parcels/zone");
    assert!(issues[1].message.contains("row 1 contains 7"));
}

#[test]
fn test_layout_only_validation() {
    let mut context = ValidationContext::default();
    assert!(validate_property_table_layout(
        "pt",
        &heights(Some(10), &[12, 15, 20, 30], 8),
        &mut context
    ));
    assert!(context.issues().is_empty());
}

#[test]
fn test_unknown_class_is_an_error() {
    let schema = serde_json::from_str(HEIGHT_SCHEMA).unwrap();
    let table = serde_json::from_str(r#"{"class": "bridge", "count": 1, "properties": {}}"#).unwrap();
    let result = BinaryPropertyTable::new(&schema, table, vec![], vec![]);
    assert!(matches!(result, Err(Error::SchemaElementNotFound(_))));
}

//! Instanced 3D models

use tracing::debug;

use super::batch_table::validate_batch_table;
use super::feature_table::{validate_feature_table, FeatureTable, GlobalCount};
use super::header::{extract_binary_table_data, read_u32, validate_header, TableLayoutOptions};
use super::semantics::{Semantic, INSTANCED_SEMANTICS};
use super::{TileContentValidator, TileFormat};
use crate::issues::{child_path, IssueType, Severity, ValidationContext, ValidationIssue};
use crate::scene_graph::{validate_embedded_glb, validate_external_glb};

/// Header length of instanced models
pub const I3DM_HEADER_LENGTH: usize = 32;

const GLTF_FORMAT_OFFSET: usize = 28;

/// Validator for instanced 3D models (`i3dm`)
#[derive(Debug, Clone, Copy, Default)]
pub struct I3dmValidator;

impl TileContentValidator for I3dmValidator {
    fn format(&self) -> TileFormat {
        TileFormat::Instanced
    }

    fn validate(&self, path: &str, content: &[u8], context: &mut ValidationContext) -> bool {
        debug!(path, length = content.len(), "validating instanced model");
        if !validate_header(path, content, I3DM_HEADER_LENGTH, self.format().magic(), context) {
            return false;
        }
        let gltf_format = read_u32(content, GLTF_FORMAT_OFFSET).unwrap_or(u32::MAX);
        if gltf_format > 1 {
            context.add_issue(ValidationIssue::new(
                IssueType::BinaryInvalidValue,
                path,
                format!("Glb format must be 0 or 1, but is {}", gltf_format),
            ));
            return false;
        }

        let layout = TableLayoutOptions::new(I3DM_HEADER_LENGTH, true);
        let Some(tables) = extract_binary_table_data(path, content, &layout, context) else {
            return false;
        };

        let feature_table = FeatureTable::new(&tables.feature_table_json, tables.feature_table_binary);
        let feature_table_path = child_path(path, "featureTable");
        let mut valid = validate_semantic_rules(&feature_table_path, &feature_table, context);

        match feature_table.global_count(Semantic::InstancesLength) {
            GlobalCount::Count(instances_length) => {
                valid &= validate_feature_table(
                    &feature_table_path,
                    &feature_table,
                    instances_length,
                    &INSTANCED_SEMANTICS,
                    context,
                );
                if let Some(batch_table_json) = &tables.batch_table_json {
                    valid &= validate_batch_table(
                        &child_path(path, "batchTable"),
                        batch_table_json,
                        tables.batch_table_binary,
                        instances_length,
                        context,
                    );
                }
            }
            GlobalCount::Missing => {
                context.add_issue(ValidationIssue::new(
                    IssueType::PropertyMissing,
                    &feature_table_path,
                    "Feature table must contain an INSTANCES_LENGTH property.",
                ));
                valid = false;
            }
            GlobalCount::Invalid(message) => {
                context.add_issue(ValidationIssue::new(
                    IssueType::FeatureTablePropertyInvalid,
                    &feature_table_path,
                    message,
                ));
                valid = false;
            }
        }

        if gltf_format == 0 {
            valid &= validate_gltf_uri(path, tables.payload, context);
        } else {
            valid &= validate_embedded_glb(path, tables.payload, context);
        }
        valid
    }
}

fn validate_semantic_rules(
    path: &str,
    feature_table: &FeatureTable<'_>,
    context: &mut ValidationContext,
) -> bool {
    let mut valid = true;
    let has = |semantic| feature_table.has(semantic);

    match (has(Semantic::Position), has(Semantic::PositionQuantized)) {
        (false, false) => {
            context.add_issue(ValidationIssue::new(
                IssueType::PropertyMissing,
                path,
                "Feature table must contain either the POSITION or the POSITION_QUANTIZED property.",
            ));
            valid = false;
        }
        (true, true) => {
            context.add_issue(
                ValidationIssue::new(
                    IssueType::PropertyRedundant,
                    path,
                    "Feature table contains both POSITION and POSITION_QUANTIZED; POSITION takes precedence.",
                )
                .with_severity(Severity::Warning),
            );
        }
        _ => {}
    }

    for (first, second) in [
        (Semantic::NormalUp, Semantic::NormalRight),
        (Semantic::NormalUpOct32p, Semantic::NormalRightOct32p),
    ] {
        if has(first) != has(second) {
            let (present, absent) = if has(first) { (first, second) } else { (second, first) };
            context.add_issue(ValidationIssue::new(
                IssueType::PropertyInconsistent,
                path,
                format!(
                    "Feature table property {} requires {} to be defined",
                    present, absent
                ),
            ));
            valid = false;
        }
    }

    if has(Semantic::PositionQuantized) {
        valid &= require_quantized_volume(path, feature_table, context);
    }
    valid
}

/// `POSITION_QUANTIZED` needs both quantized volume properties
pub(super) fn require_quantized_volume(
    path: &str,
    feature_table: &FeatureTable<'_>,
    context: &mut ValidationContext,
) -> bool {
    let mut valid = true;
    for semantic in [Semantic::QuantizedVolumeOffset, Semantic::QuantizedVolumeScale] {
        if !feature_table.has(semantic) {
            context.add_issue(ValidationIssue::new(
                IssueType::PropertyMissing,
                path,
                format!(
                    "Feature table property {} is required when POSITION_QUANTIZED is present",
                    semantic
                ),
            ));
            valid = false;
        }
    }
    valid
}

/// Validate the glTF that a `gltfFormat` 0 payload refers to by URI
fn validate_gltf_uri(path: &str, payload: &[u8], context: &mut ValidationContext) -> bool {
    let end = payload
        .iter()
        .rposition(|&b| b != 0 && b != b' ')
        .map_or(0, |i| i + 1);
    let uri = match std::str::from_utf8(&payload[..end]) {
        Ok(uri) if !uri.is_empty() => uri,
        Ok(_) => {
            context.add_issue(ValidationIssue::new(
                IssueType::BinaryInvalidValue,
                path,
                "The glTF URI of the instanced model is empty",
            ));
            return false;
        }
        Err(e) => {
            context.add_issue(ValidationIssue::new(
                IssueType::BinaryInvalidValue,
                path,
                format!("The glTF URI of the instanced model is not valid UTF-8: {}", e),
            ));
            return false;
        }
    };
    validate_external_glb(path, uri, context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::MemoryResourceResolver;
    use crate::scene_graph::build_glb;
    use byteorder::{LittleEndian, WriteBytesExt};
    use std::sync::Arc;

    fn pad(mut bytes: Vec<u8>, start: usize, fill: u8) -> Vec<u8> {
        while (start + bytes.len()) % 8 != 0 {
            bytes.push(fill);
        }
        bytes
    }

    fn i3dm(feature_table: &str, binary: &[u8], gltf_format: u32, payload: &[u8]) -> Vec<u8> {
        let ft = pad(feature_table.as_bytes().to_vec(), I3DM_HEADER_LENGTH, b' ');
        let ft_binary = pad(binary.to_vec(), 0, 0);
        let payload = pad(payload.to_vec(), 0, 0);
        let total = I3DM_HEADER_LENGTH + ft.len() + ft_binary.len() + payload.len();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"i3dm");
        for value in [1, total as u32, ft.len() as u32, ft_binary.len() as u32, 0, 0, gltf_format] {
            bytes.write_u32::<LittleEndian>(value).unwrap();
        }
        bytes.extend(ft);
        bytes.extend(ft_binary);
        bytes.extend(payload);
        bytes
    }

    fn glb() -> Vec<u8> {
        build_glb(r#"{"asset":{"version":"2.0"}}"#)
    }

    #[test]
    fn test_valid_embedded() {
        let content = i3dm(
            r#"{"INSTANCES_LENGTH":2,"POSITION":{"byteOffset":0}}"#,
            &[0; 24],
            1,
            &glb(),
        );
        let mut context = ValidationContext::default();
        assert!(I3dmValidator.validate("t.i3dm", &content, &mut context));
        assert!(context.issues().is_empty(), "{:?}", context.issues());
    }

    #[test]
    fn test_invalid_gltf_format() {
        let content = i3dm(r#"{"INSTANCES_LENGTH":0}"#, &[], 2, &[]);
        let mut context = ValidationContext::default();
        assert!(!I3dmValidator.validate("t.i3dm", &content, &mut context));
        assert_eq!(context.issues().len(), 1);
        assert!(context.issues()[0].message.starts_with("Glb format must be 0 or 1"));
    }

    #[test]
    fn test_semantic_rules() {
        let content = i3dm(
            r#"{"INSTANCES_LENGTH":1,"POSITION_QUANTIZED":[0,0,0],"NORMAL_UP":[0,0,1],
                "QUANTIZED_VOLUME_SCALE":[1,1,1]}"#,
            &[],
            1,
            &glb(),
        );
        let mut context = ValidationContext::default();
        assert!(!I3dmValidator.validate("t.i3dm", &content, &mut context));
        let types: Vec<_> = context.issues().iter().map(|i| i.issue_type).collect();
        assert_eq!(
            types,
            vec![IssueType::PropertyInconsistent, IssueType::PropertyMissing]
        );
        assert!(context.issues()[0].message.contains("NORMAL_UP requires NORMAL_RIGHT"));
        assert!(context.issues()[1].message.contains("QUANTIZED_VOLUME_OFFSET"));
    }

    #[test]
    fn test_both_positions_is_a_warning() {
        let content = i3dm(
            r#"{"INSTANCES_LENGTH":1,"POSITION":[0,0,0],"POSITION_QUANTIZED":[0,0,0],
                "QUANTIZED_VOLUME_OFFSET":[0,0,0],"QUANTIZED_VOLUME_SCALE":[1,1,1]}"#,
            &[],
            1,
            &glb(),
        );
        let mut context = ValidationContext::default();
        assert!(I3dmValidator.validate("t.i3dm", &content, &mut context));
        assert_eq!(context.issues().len(), 1);
        assert_eq!(context.issues()[0].severity, Severity::Warning);
    }

    #[test]
    fn test_external_gltf() {
        let content = i3dm(
            r#"{"INSTANCES_LENGTH":1,"POSITION":[0,0,0]}"#,
            &[],
            0,
            b"models/tree.glb",
        );
        let resolver = MemoryResourceResolver::new().with_resource("models/tree.glb", glb());
        let mut context = ValidationContext::new(Arc::new(resolver));
        assert!(I3dmValidator.validate("t.i3dm", &content, &mut context));
        assert!(context.issues().is_empty(), "{:?}", context.issues());

        let mut context = ValidationContext::default();
        assert!(!I3dmValidator.validate("t.i3dm", &content, &mut context));
        assert_eq!(context.issues()[0].issue_type, IssueType::IoError);
        assert!(context.issues()[0].message.contains("'models/tree.glb'"));
    }
}

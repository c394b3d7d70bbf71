//! Batched 3D models

use tracing::debug;

use super::batch_table::validate_batch_table;
use super::feature_table::{validate_feature_table, FeatureTable, GlobalCount};
use super::header::{extract_binary_table_data, validate_header, TableLayoutOptions};
use super::semantics::{Semantic, BATCHED_SEMANTICS};
use super::{TileContentValidator, TileFormat};
use crate::issues::{child_path, IssueType, ValidationContext, ValidationIssue};
use crate::scene_graph::validate_embedded_glb;

/// Header length of batched models
pub const B3DM_HEADER_LENGTH: usize = 28;

/// Validator for batched 3D models (`b3dm`)
#[derive(Debug, Clone, Copy, Default)]
pub struct B3dmValidator;

impl TileContentValidator for B3dmValidator {
    fn format(&self) -> TileFormat {
        TileFormat::Batched
    }

    fn validate(&self, path: &str, content: &[u8], context: &mut ValidationContext) -> bool {
        debug!(path, length = content.len(), "validating batched model");
        if !validate_header(path, content, B3DM_HEADER_LENGTH, self.format().magic(), context) {
            return false;
        }
        let layout =
            TableLayoutOptions::new(B3DM_HEADER_LENGTH, true).with_legacy_header_detection();
        let Some(tables) = extract_binary_table_data(path, content, &layout, context) else {
            return false;
        };

        let mut valid = true;
        let feature_table = FeatureTable::new(&tables.feature_table_json, tables.feature_table_binary);
        let feature_table_path = child_path(path, "featureTable");
        let batch_length = match feature_table.global_count(Semantic::BatchLength) {
            GlobalCount::Count(count) => Some(count),
            GlobalCount::Missing => {
                context.add_issue(ValidationIssue::new(
                    IssueType::PropertyMissing,
                    &feature_table_path,
                    "Feature table must contain a BATCH_LENGTH property.",
                ));
                None
            }
            GlobalCount::Invalid(message) => {
                context.add_issue(ValidationIssue::new(
                    IssueType::FeatureTablePropertyInvalid,
                    &feature_table_path,
                    message,
                ));
                None
            }
        };

        match batch_length {
            Some(batch_length) => {
                valid &= validate_feature_table(
                    &feature_table_path,
                    &feature_table,
                    batch_length,
                    &BATCHED_SEMANTICS,
                    context,
                );
                if let Some(batch_table_json) = &tables.batch_table_json {
                    valid &= validate_batch_table(
                        &child_path(path, "batchTable"),
                        batch_table_json,
                        tables.batch_table_binary,
                        batch_length,
                        context,
                    );
                }
            }
            None => valid = false,
        }

        valid &= validate_embedded_glb(path, tables.payload, context);
        valid
    }
}

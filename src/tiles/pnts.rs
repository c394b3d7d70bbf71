//! Point clouds

use tracing::debug;

use super::batch_table::validate_batch_table;
use super::feature_table::{validate_feature_table, FeatureTable, GlobalCount};
use super::header::{extract_binary_table_data, validate_header, TableLayoutOptions};
use super::i3dm::require_quantized_volume;
use super::semantics::{Semantic, POINT_CLOUD_SEMANTICS};
use super::{TileContentValidator, TileFormat};
use crate::issues::{child_path, IssueType, Severity, ValidationContext, ValidationIssue};

/// Header length of point clouds
pub const PNTS_HEADER_LENGTH: usize = 28;

/// Validator for point clouds (`pnts`)
///
/// Point clouds have no glTF payload; bytes after the batch table are padding.
#[derive(Debug, Clone, Copy, Default)]
pub struct PntsValidator;

impl TileContentValidator for PntsValidator {
    fn format(&self) -> TileFormat {
        TileFormat::PointCloud
    }

    fn validate(&self, path: &str, content: &[u8], context: &mut ValidationContext) -> bool {
        debug!(path, length = content.len(), "validating point cloud");
        if !validate_header(path, content, PNTS_HEADER_LENGTH, self.format().magic(), context) {
            return false;
        }
        let layout = TableLayoutOptions::new(PNTS_HEADER_LENGTH, false);
        let Some(tables) = extract_binary_table_data(path, content, &layout, context) else {
            return false;
        };

        let feature_table = FeatureTable::new(&tables.feature_table_json, tables.feature_table_binary);
        let feature_table_path = child_path(path, "featureTable");
        let mut valid = true;

        let points_length = read_count(
            &feature_table_path,
            &feature_table,
            Semantic::PointsLength,
            true,
            context,
        );
        let batch_length = read_count(
            &feature_table_path,
            &feature_table,
            Semantic::BatchLength,
            false,
            context,
        );
        if points_length.is_none() {
            valid = false;
        }

        match (
            feature_table.has(Semantic::Position),
            feature_table.has(Semantic::PositionQuantized),
        ) {
            (false, false) => {
                context.add_issue(ValidationIssue::new(
                    IssueType::PropertyMissing,
                    &feature_table_path,
                    "Feature table must contain either the POSITION or the POSITION_QUANTIZED property.",
                ));
                valid = false;
            }
            (true, true) => {
                context.add_issue(
                    ValidationIssue::new(
                        IssueType::PropertyRedundant,
                        &feature_table_path,
                        "Feature table contains both POSITION and POSITION_QUANTIZED; POSITION takes precedence.",
                    )
                    .with_severity(Severity::Warning),
                );
            }
            _ => {}
        }
        if feature_table.has(Semantic::PositionQuantized) {
            valid &= require_quantized_volume(&feature_table_path, &feature_table, context);
        }

        let has_batch_id = feature_table.has(Semantic::BatchId);
        let has_batch_length = feature_table.has(Semantic::BatchLength);
        if has_batch_id != has_batch_length {
            let message = if has_batch_id {
                "Feature table must contain a BATCH_LENGTH property when BATCH_ID is present."
            } else {
                "Feature table must contain a BATCH_ID property when BATCH_LENGTH is present."
            };
            context.add_issue(ValidationIssue::new(
                IssueType::PropertyInconsistent,
                &feature_table_path,
                message,
            ));
            valid = false;
        }

        if let (Some(points_length), Some(batch_length)) = (points_length, batch_length) {
            if batch_length > points_length {
                context.add_issue(ValidationIssue::new(
                    IssueType::ValueNotInRange,
                    &feature_table_path,
                    format!(
                        "The BATCH_LENGTH ({}) must be less than or equal to the POINTS_LENGTH ({})",
                        batch_length, points_length
                    ),
                ));
                valid = false;
            }
        }

        let Some(points_length) = points_length else {
            return false;
        };
        valid &= validate_feature_table(
            &feature_table_path,
            &feature_table,
            points_length,
            &POINT_CLOUD_SEMANTICS,
            context,
        );

        if let Some(batch_table_json) = &tables.batch_table_json {
            let features_length = match batch_length {
                Some(batch_length) if has_batch_id => batch_length,
                _ => points_length,
            };
            valid &= validate_batch_table(
                &child_path(path, "batchTable"),
                batch_table_json,
                tables.batch_table_binary,
                features_length,
                context,
            );
        }
        valid
    }
}

/// Read a global count, reporting it if it is missing (when `required`) or invalid
fn read_count(
    path: &str,
    feature_table: &FeatureTable<'_>,
    semantic: Semantic,
    required: bool,
    context: &mut ValidationContext,
) -> Option<u64> {
    match feature_table.global_count(semantic) {
        GlobalCount::Count(count) => Some(count),
        GlobalCount::Missing => {
            if required {
                context.add_issue(ValidationIssue::new(
                    IssueType::PropertyMissing,
                    path,
                    format!("Feature table must contain a {} property.", semantic),
                ));
            }
            None
        }
        GlobalCount::Invalid(message) => {
            context.add_issue(ValidationIssue::new(
                IssueType::FeatureTablePropertyInvalid,
                path,
                message,
            ));
            None
        }
    }
}

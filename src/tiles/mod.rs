//! Validation of binary tile content
//!
//! Every binary tile format starts with the same 12 byte header (magic,
//! version, byte length). Batched models, instanced models and point clouds
//! continue with the byte lengths of a feature table and a batch table; a
//! composite continues with the number of inner tiles.
//!
//! | Format      | Magic  | Header | Payload                     |
//! |-------------|--------|--------|-----------------------------|
//! | Batched     | `b3dm` | 28     | embedded glTF               |
//! | Instanced   | `i3dm` | 32     | embedded glTF or glTF URI   |
//! | Point cloud | `pnts` | 28     | none                        |
//! | Composite   | `cmpt` | 16     | inner tiles                 |

mod b3dm;
mod batch_table;
mod cmpt;
mod feature_table;
mod header;
mod i3dm;
mod pnts;
mod semantics;

pub use b3dm::B3dmValidator;
pub use batch_table::validate_batch_table;
pub use cmpt::CmptValidator;
pub use feature_table::{validate_feature_table, FeatureTable, GlobalCount};
pub use header::{
    extract_binary_table_data, validate_header, BinaryTableData, TableLayout, TableLayoutOptions,
    COMMON_HEADER_LENGTH, LEGACY_HEADER_THRESHOLD, TABLE_HEADER_LENGTH,
};
pub use i3dm::I3dmValidator;
pub use pnts::PntsValidator;
pub use semantics::{
    Semantic, SemanticDefinition, SemanticTable, TableComponentType, TableElementType,
    BATCHED_SEMANTICS, INSTANCED_SEMANTICS, POINT_CLOUD_SEMANTICS,
};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::issues::{IssueType, Severity, ValidationContext, ValidationIssue};

/// The binary tile content formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileFormat {
    /// Batched 3D model
    #[serde(rename = "b3dm")]
    Batched,
    /// Instanced 3D model
    #[serde(rename = "i3dm")]
    Instanced,
    /// Point cloud
    #[serde(rename = "pnts")]
    PointCloud,
    /// Composite of other tiles
    #[serde(rename = "cmpt")]
    Composite,
}

impl TileFormat {
    /// All formats
    pub const ALL: [TileFormat; 4] = [
        TileFormat::Batched,
        TileFormat::Instanced,
        TileFormat::PointCloud,
        TileFormat::Composite,
    ];

    /// The four magic bytes at the start of the content
    pub fn magic(&self) -> &'static [u8; 4] {
        match self {
            TileFormat::Batched => b"b3dm",
            TileFormat::Instanced => b"i3dm",
            TileFormat::PointCloud => b"pnts",
            TileFormat::Composite => b"cmpt",
        }
    }

    /// Detect the format from the first bytes of the content
    pub fn from_magic(bytes: &[u8]) -> Option<Self> {
        let magic = bytes.get(0..4)?;
        TileFormat::ALL
            .into_iter()
            .find(|format| format.magic().as_slice() == magic)
    }

    /// Length of the format's header in bytes
    pub fn header_length(&self) -> usize {
        match self {
            TileFormat::Batched => b3dm::B3DM_HEADER_LENGTH,
            TileFormat::Instanced => i3dm::I3DM_HEADER_LENGTH,
            TileFormat::PointCloud => pnts::PNTS_HEADER_LENGTH,
            TileFormat::Composite => cmpt::CMPT_HEADER_LENGTH,
        }
    }

    /// The magic as a string
    pub fn name(&self) -> &'static str {
        match self {
            TileFormat::Batched => "b3dm",
            TileFormat::Instanced => "i3dm",
            TileFormat::PointCloud => "pnts",
            TileFormat::Composite => "cmpt",
        }
    }
}

impl fmt::Display for TileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Validator for one binary tile format
pub trait TileContentValidator {
    /// The format this validator handles
    fn format(&self) -> TileFormat;

    /// Validate `content`, adding issues to `context`
    ///
    /// Returns `true` if the content is valid.
    fn validate(&self, path: &str, content: &[u8], context: &mut ValidationContext) -> bool;
}

/// Validate content of a known format with that format's validator
pub fn validate_format(
    format: TileFormat,
    path: &str,
    content: &[u8],
    context: &mut ValidationContext,
) -> bool {
    match format {
        TileFormat::Batched => B3dmValidator.validate(path, content, context),
        TileFormat::Instanced => I3dmValidator.validate(path, content, context),
        TileFormat::PointCloud => PntsValidator.validate(path, content, context),
        TileFormat::Composite => CmptValidator.validate(path, content, context),
    }
}

/// Validate tile content of any binary format
///
/// The format is detected from the magic. Content whose format is excluded
/// by the options is skipped with an informational issue.
///
/// # Example
///
/// ```
/// use tiles3d_validator::{validate_tile_content, ValidationContext};
///
/// let mut context = ValidationContext::default();
/// assert!(!validate_tile_content("tile.bin", b"nope", &mut context));
/// assert_eq!(context.issues().len(), 1);
/// ```
pub fn validate_tile_content(path: &str, content: &[u8], context: &mut ValidationContext) -> bool {
    let Some(format) = TileFormat::from_magic(content) else {
        let magic = content.get(0..4).unwrap_or(content);
        context.add_issue(ValidationIssue::new(
            IssueType::BinaryInvalid,
            path,
            format!(
                "The content magic '{}' does not match any of the binary tile formats (b3dm, i3dm, pnts, cmpt)",
                String::from_utf8_lossy(magic)
            ),
        ));
        return false;
    };
    if context.options().is_excluded(format) {
        context.add_issue(
            ValidationIssue::new(
                IssueType::ContentValidationInfo,
                path,
                format!("Validation of {} content was skipped", format),
            )
            .with_severity(Severity::Info),
        );
        return true;
    }
    validate_format(format, path, content, context)
}

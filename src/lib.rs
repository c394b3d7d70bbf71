//! # tiles3d-validator
//!
//! A pure Rust validator for binary 3D Tiles content and binary structural
//! metadata.
//!
//! The validator checks the byte-level layout of batched models (`b3dm`),
//! instanced models (`i3dm`), point clouds (`pnts`) and composites (`cmpt`),
//! the feature table and batch table semantics of each format, and the buffer
//! views and values of binary property tables. It reports every deviation as a
//! located [`ValidationIssue`] instead of stopping at the first one.
//!
//! ## Features
//!
//! - Pure Rust implementation with no unsafe code
//! - Header and table layout checks shared by all formats
//! - Recursive validation of composites
//! - Embedded and external glTF payloads validated in a derived context
//! - Property table layout, range and enum checks
//!
//! ## Example
//!
//! ```
//! use tiles3d_validator::{validate_tile_content, ValidationContext};
//!
//! let content = std::fs::read("tile.b3dm").unwrap_or_default();
//! let mut context = ValidationContext::default();
//! let valid = validate_tile_content("tile.b3dm", &content, &mut context);
//!
//! let result = context.into_result();
//! assert_eq!(valid, result.is_valid());
//! println!("{}", result);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod issues;
pub mod metadata;
pub mod options;
pub mod resolver;
pub mod scene_graph;
pub mod tiles;

pub use error::{Error, Result};
pub use issues::{IssueType, Severity, ValidationContext, ValidationIssue, ValidationResult};
pub use metadata::validate_binary_property_table;
pub use options::ValidationOptions;
pub use resolver::{FileResourceResolver, MemoryResourceResolver, ResourceResolver};
pub use scene_graph::{GlbContainerValidator, NoopSceneGraphValidator, SceneGraphValidator};
pub use tiles::{validate_tile_content, TileContentValidator, TileFormat};

use std::path::Path;
use std::sync::Arc;

/// Validate a tile content file
///
/// External resources are resolved relative to the directory of the file.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be read. Problems with the content
/// are reported in the returned [`ValidationResult`].
///
/// # Example
///
/// ```no_run
/// # fn main() -> tiles3d_validator::Result<()> {
/// let result = tiles3d_validator::validate_tile_file("tiles/0.cmpt")?;
/// for issue in result.issues() {
///     println!("{}", issue);
/// }
/// # Ok(())
/// # }
/// ```
pub fn validate_tile_file(path: impl AsRef<Path>) -> Result<ValidationResult> {
    validate_tile_file_with_options(path, ValidationOptions::default())
}

/// Validate a tile content file with the given options
pub fn validate_tile_file_with_options(
    path: impl AsRef<Path>,
    options: ValidationOptions,
) -> Result<ValidationResult> {
    let path = path.as_ref();
    let content = std::fs::read(path)?;
    let base_directory = path.parent().unwrap_or_else(|| Path::new("."));
    let resolver = Arc::new(FileResourceResolver::new(base_directory));
    let mut context = ValidationContext::new(resolver).with_options(options);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    validate_tile_content(&name, &content, &mut context);
    Ok(context.into_result())
}

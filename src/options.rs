//! Options that control a validation run

use serde::Deserialize;
use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::tiles::TileFormat;

/// Options for a validation run
///
/// # Example
///
/// ```
/// use tiles3d_validator::{TileFormat, ValidationOptions};
///
/// let options = ValidationOptions::new()
///     .with_scene_graph_validation(false)
///     .excluding(TileFormat::PointCloud);
/// assert!(!options.validate_scene_graph());
/// assert!(options.is_excluded(TileFormat::PointCloud));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ValidationOptions {
    /// Whether embedded and external glTF payloads are handed to the scene
    /// graph validator
    validate_scene_graph: bool,
    /// Whether property table values are checked after their layout
    validate_metadata_values: bool,
    /// Formats that the top-level dispatcher skips
    excluded_formats: HashSet<TileFormat>,
}

impl ValidationOptions {
    /// Options with every check enabled
    pub fn new() -> Self {
        Self {
            validate_scene_graph: true,
            validate_metadata_values: true,
            excluded_formats: HashSet::new(),
        }
    }

    /// Parse options from a JSON document such as
    /// `{"validateSceneGraph": false, "excludedFormats": ["pnts"]}`
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidOptions(e.to_string()))
    }

    /// Enable or disable glTF payload validation
    pub fn with_scene_graph_validation(mut self, enabled: bool) -> Self {
        self.validate_scene_graph = enabled;
        self
    }

    /// Enable or disable property table value checks
    pub fn with_metadata_value_validation(mut self, enabled: bool) -> Self {
        self.validate_metadata_values = enabled;
        self
    }

    /// Skip content of the given format at the top level
    pub fn excluding(mut self, format: TileFormat) -> Self {
        self.excluded_formats.insert(format);
        self
    }

    /// Whether glTF payloads are validated
    pub fn validate_scene_graph(&self) -> bool {
        self.validate_scene_graph
    }

    /// Whether property table values are validated
    pub fn validate_metadata_values(&self) -> bool {
        self.validate_metadata_values
    }

    /// Whether content of `format` is skipped
    pub fn is_excluded(&self, format: TileFormat) -> bool {
        self.excluded_formats.contains(&format)
    }
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self::new()
    }
}

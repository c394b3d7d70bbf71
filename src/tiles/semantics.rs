//! Feature table semantics of the tile formats

use std::fmt;

/// Component types of feature table and batch table binary properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableComponentType {
    /// `BYTE`
    Byte,
    /// `UNSIGNED_BYTE`
    UnsignedByte,
    /// `SHORT`
    Short,
    /// `UNSIGNED_SHORT`
    UnsignedShort,
    /// `INT`
    Int,
    /// `UNSIGNED_INT`
    UnsignedInt,
    /// `FLOAT`
    Float,
    /// `DOUBLE`
    Double,
}

impl TableComponentType {
    /// Parse the name used in table JSON
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "BYTE" => Some(Self::Byte),
            "UNSIGNED_BYTE" => Some(Self::UnsignedByte),
            "SHORT" => Some(Self::Short),
            "UNSIGNED_SHORT" => Some(Self::UnsignedShort),
            "INT" => Some(Self::Int),
            "UNSIGNED_INT" => Some(Self::UnsignedInt),
            "FLOAT" => Some(Self::Float),
            "DOUBLE" => Some(Self::Double),
            _ => None,
        }
    }

    /// The name used in table JSON
    pub fn name(&self) -> &'static str {
        match self {
            Self::Byte => "BYTE",
            Self::UnsignedByte => "UNSIGNED_BYTE",
            Self::Short => "SHORT",
            Self::UnsignedShort => "UNSIGNED_SHORT",
            Self::Int => "INT",
            Self::UnsignedInt => "UNSIGNED_INT",
            Self::Float => "FLOAT",
            Self::Double => "DOUBLE",
        }
    }

    /// Size of one component in bytes
    pub fn byte_size(&self) -> usize {
        match self {
            Self::Byte | Self::UnsignedByte => 1,
            Self::Short | Self::UnsignedShort => 2,
            Self::Int | Self::UnsignedInt | Self::Float => 4,
            Self::Double => 8,
        }
    }
}

impl fmt::Display for TableComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Element types of feature table and batch table properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableElementType {
    /// One component
    Scalar,
    /// Two components
    Vec2,
    /// Three components
    Vec3,
    /// Four components
    Vec4,
    /// A JSON boolean, bit-packed when stored in binary
    Boolean,
}

impl TableElementType {
    /// Parse the `type` of a batch table binary property
    ///
    /// Booleans are not a valid batch table type.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "SCALAR" => Some(Self::Scalar),
            "VEC2" => Some(Self::Vec2),
            "VEC3" => Some(Self::Vec3),
            "VEC4" => Some(Self::Vec4),
            _ => None,
        }
    }

    /// Number of components per element
    pub fn component_count(&self) -> usize {
        match self {
            Self::Scalar | Self::Boolean => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 => 4,
        }
    }

    /// Number of bytes that `items` elements of this type occupy
    pub fn byte_length(&self, component_type: TableComponentType, items: u64) -> u64 {
        match self {
            Self::Boolean => items.div_ceil(8),
            _ => items
                .saturating_mul(self.component_count() as u64)
                .saturating_mul(component_type.byte_size() as u64),
        }
    }
}

/// The feature table semantics of all formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Semantic {
    Position,
    PositionQuantized,
    NormalUp,
    NormalRight,
    NormalUpOct32p,
    NormalRightOct32p,
    Scale,
    ScaleNonUniform,
    BatchId,
    InstancesLength,
    RtcCenter,
    QuantizedVolumeOffset,
    QuantizedVolumeScale,
    EastNorthUp,
    Rgba,
    Rgb,
    Rgb565,
    Normal,
    NormalOct16p,
    PointsLength,
    ConstantRgba,
    BatchLength,
}

impl Semantic {
    /// The property name in the feature table JSON
    pub fn name(&self) -> &'static str {
        match self {
            Self::Position => "POSITION",
            Self::PositionQuantized => "POSITION_QUANTIZED",
            Self::NormalUp => "NORMAL_UP",
            Self::NormalRight => "NORMAL_RIGHT",
            Self::NormalUpOct32p => "NORMAL_UP_OCT32P",
            Self::NormalRightOct32p => "NORMAL_RIGHT_OCT32P",
            Self::Scale => "SCALE",
            Self::ScaleNonUniform => "SCALE_NON_UNIFORM",
            Self::BatchId => "BATCH_ID",
            Self::InstancesLength => "INSTANCES_LENGTH",
            Self::RtcCenter => "RTC_CENTER",
            Self::QuantizedVolumeOffset => "QUANTIZED_VOLUME_OFFSET",
            Self::QuantizedVolumeScale => "QUANTIZED_VOLUME_SCALE",
            Self::EastNorthUp => "EAST_NORTH_UP",
            Self::Rgba => "RGBA",
            Self::Rgb => "RGB",
            Self::Rgb565 => "RGB565",
            Self::Normal => "NORMAL",
            Self::NormalOct16p => "NORMAL_OCT16P",
            Self::PointsLength => "POINTS_LENGTH",
            Self::ConstantRgba => "CONSTANT_RGBA",
            Self::BatchLength => "BATCH_LENGTH",
        }
    }
}

impl fmt::Display for Semantic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The shape a semantic must have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemanticDefinition {
    /// The semantic
    pub semantic: Semantic,
    /// Whether there is one value for the whole tile instead of one per feature
    pub global: bool,
    /// The element type
    pub element_type: TableElementType,
    /// The default component type
    pub component_type: TableComponentType,
    /// Component types allowed through an explicit `componentType`
    pub alternate_component_types: &'static [TableComponentType],
}

impl SemanticDefinition {
    const fn per_feature(
        semantic: Semantic,
        element_type: TableElementType,
        component_type: TableComponentType,
    ) -> Self {
        Self {
            semantic,
            global: false,
            element_type,
            component_type,
            alternate_component_types: &[],
        }
    }

    const fn global(
        semantic: Semantic,
        element_type: TableElementType,
        component_type: TableComponentType,
    ) -> Self {
        Self {
            semantic,
            global: true,
            element_type,
            component_type,
            alternate_component_types: &[],
        }
    }

    const fn with_alternates(mut self, alternates: &'static [TableComponentType]) -> Self {
        self.alternate_component_types = alternates;
        self
    }

    /// Whether `component_type` may be used for this semantic
    pub fn allows(&self, component_type: TableComponentType) -> bool {
        if self.alternate_component_types.is_empty() {
            component_type == self.component_type
        } else {
            self.alternate_component_types.contains(&component_type)
        }
    }
}

/// The semantics known to one format
#[derive(Debug)]
pub struct SemanticTable {
    definitions: &'static [SemanticDefinition],
}

impl SemanticTable {
    /// Look up a semantic by its feature table property name
    pub fn lookup(&self, name: &str) -> Option<&SemanticDefinition> {
        self.definitions.iter().find(|d| d.semantic.name() == name)
    }

    /// Look up a semantic
    pub fn get(&self, semantic: Semantic) -> Option<&SemanticDefinition> {
        self.definitions.iter().find(|d| d.semantic == semantic)
    }
}

use TableComponentType::*;
use TableElementType::*;

const BATCH_ID_TYPES: &[TableComponentType] = &[UnsignedByte, UnsignedShort, UnsignedInt];

/// Semantics of batched models
pub static BATCHED_SEMANTICS: SemanticTable = SemanticTable {
    definitions: &[
        SemanticDefinition::global(Semantic::BatchLength, Scalar, UnsignedInt),
        SemanticDefinition::global(Semantic::RtcCenter, Vec3, Float),
    ],
};

/// Semantics of instanced models
pub static INSTANCED_SEMANTICS: SemanticTable = SemanticTable {
    definitions: &[
        SemanticDefinition::per_feature(Semantic::Position, Vec3, Float),
        SemanticDefinition::per_feature(Semantic::PositionQuantized, Vec3, UnsignedShort),
        SemanticDefinition::per_feature(Semantic::NormalUp, Vec3, Float),
        SemanticDefinition::per_feature(Semantic::NormalRight, Vec3, Float),
        SemanticDefinition::per_feature(Semantic::NormalUpOct32p, Vec2, UnsignedShort),
        SemanticDefinition::per_feature(Semantic::NormalRightOct32p, Vec2, UnsignedShort),
        SemanticDefinition::per_feature(Semantic::Scale, Scalar, Float),
        SemanticDefinition::per_feature(Semantic::ScaleNonUniform, Vec3, Float),
        SemanticDefinition::per_feature(Semantic::BatchId, Scalar, UnsignedShort)
            .with_alternates(BATCH_ID_TYPES),
        SemanticDefinition::global(Semantic::InstancesLength, Scalar, UnsignedInt),
        SemanticDefinition::global(Semantic::RtcCenter, Vec3, Float),
        SemanticDefinition::global(Semantic::QuantizedVolumeOffset, Vec3, Float),
        SemanticDefinition::global(Semantic::QuantizedVolumeScale, Vec3, Float),
        SemanticDefinition::global(Semantic::EastNorthUp, Boolean, UnsignedByte),
    ],
};

/// Semantics of point clouds
pub static POINT_CLOUD_SEMANTICS: SemanticTable = SemanticTable {
    definitions: &[
        SemanticDefinition::per_feature(Semantic::Position, Vec3, Float),
        SemanticDefinition::per_feature(Semantic::PositionQuantized, Vec3, UnsignedShort),
        SemanticDefinition::per_feature(Semantic::Rgba, Vec4, UnsignedByte),
        SemanticDefinition::per_feature(Semantic::Rgb, Vec3, UnsignedByte),
        SemanticDefinition::per_feature(Semantic::Rgb565, Scalar, UnsignedShort),
        SemanticDefinition::per_feature(Semantic::Normal, Vec3, Float),
        SemanticDefinition::per_feature(Semantic::NormalOct16p, Vec2, UnsignedByte),
        SemanticDefinition::per_feature(Semantic::BatchId, Scalar, UnsignedShort)
            .with_alternates(BATCH_ID_TYPES),
        SemanticDefinition::global(Semantic::PointsLength, Scalar, UnsignedInt),
        SemanticDefinition::global(Semantic::RtcCenter, Vec3, Float),
        SemanticDefinition::global(Semantic::QuantizedVolumeOffset, Vec3, Float),
        SemanticDefinition::global(Semantic::QuantizedVolumeScale, Vec3, Float),
        SemanticDefinition::global(Semantic::ConstantRgba, Vec4, UnsignedByte),
        SemanticDefinition::global(Semantic::BatchLength, Scalar, UnsignedInt),
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name() {
        let definition = INSTANCED_SEMANTICS.lookup("NORMAL_UP_OCT32P").unwrap();
        assert_eq!(definition.semantic, Semantic::NormalUpOct32p);
        assert_eq!(definition.element_type.component_count(), 2);
        assert!(!definition.global);
        assert!(INSTANCED_SEMANTICS.lookup("RGB").is_none());
        assert!(BATCHED_SEMANTICS.lookup("POSITION").is_none());
    }

    #[test]
    fn test_batch_id_alternates() {
        let batch_id = POINT_CLOUD_SEMANTICS.get(Semantic::BatchId).unwrap();
        assert!(batch_id.allows(UnsignedByte));
        assert!(batch_id.allows(UnsignedInt));
        assert!(!batch_id.allows(Float));

        let position = POINT_CLOUD_SEMANTICS.get(Semantic::Position).unwrap();
        assert!(position.allows(Float));
        assert!(!position.allows(Double));
    }

    #[test]
    fn test_byte_length() {
        assert_eq!(Vec3.byte_length(Float, 10), 120);
        assert_eq!(Boolean.byte_length(UnsignedByte, 9), 2);
        assert_eq!(Scalar.byte_length(UnsignedShort, 0), 0);
    }

    #[test]
    fn test_component_type_names() {
        for name in ["BYTE", "UNSIGNED_SHORT", "DOUBLE"] {
            assert_eq!(TableComponentType::from_name(name).unwrap().name(), name);
        }
        assert!(TableComponentType::from_name("UINT8").is_none());
    }
}

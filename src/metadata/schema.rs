//! Metadata schema and property table definitions
//!
//! These types are deserialized from the JSON of a structural metadata
//! extension. Their structure is assumed to be valid already; the binary
//! validators only check byte layout and values against them.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::Result;

/// Type of a class property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[allow(missing_docs)]
pub enum PropertyType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
    String,
    Boolean,
    Enum,
}

impl PropertyType {
    /// Number of components of one element
    pub fn component_count(&self) -> usize {
        match self {
            PropertyType::Vec2 => 2,
            PropertyType::Vec3 => 3,
            PropertyType::Vec4 | PropertyType::Mat2 => 4,
            PropertyType::Mat3 => 9,
            PropertyType::Mat4 => 16,
            PropertyType::Scalar
            | PropertyType::String
            | PropertyType::Boolean
            | PropertyType::Enum => 1,
        }
    }

    /// Whether elements are numbers with a `componentType`
    pub fn is_numeric(&self) -> bool {
        !matches!(
            self,
            PropertyType::String | PropertyType::Boolean | PropertyType::Enum
        )
    }

    /// The name used in the schema
    pub fn name(&self) -> &'static str {
        match self {
            PropertyType::Scalar => "SCALAR",
            PropertyType::Vec2 => "VEC2",
            PropertyType::Vec3 => "VEC3",
            PropertyType::Vec4 => "VEC4",
            PropertyType::Mat2 => "MAT2",
            PropertyType::Mat3 => "MAT3",
            PropertyType::Mat4 => "MAT4",
            PropertyType::String => "STRING",
            PropertyType::Boolean => "BOOLEAN",
            PropertyType::Enum => "ENUM",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Component type of numeric properties, enum values and offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[allow(missing_docs)]
pub enum ComponentType {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float32,
    Float64,
}

/// A metadata schema
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Identifier of the schema
    #[serde(default)]
    pub id: Option<String>,
    /// Classes by name
    #[serde(default)]
    pub classes: BTreeMap<String, MetadataClass>,
    /// Enums by name
    #[serde(default)]
    pub enums: BTreeMap<String, MetadataEnum>,
}

impl Schema {
    /// Parse a schema from its JSON text
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if the text is not a valid schema.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A class: a set of properties
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataClass {
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Properties by name
    #[serde(default)]
    pub properties: BTreeMap<String, ClassProperty>,
}

/// Definition of one property of a class
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassProperty {
    /// Element type
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    /// Component type of numeric types
    #[serde(default)]
    pub component_type: Option<ComponentType>,
    /// Name of the enum of `ENUM` properties
    #[serde(default)]
    pub enum_type: Option<String>,
    /// Whether each value is an array of elements
    #[serde(default)]
    pub array: bool,
    /// Length of fixed-length arrays; variable-length when absent
    #[serde(default)]
    pub count: Option<u64>,
    /// Whether integer components are normalized
    #[serde(default)]
    pub normalized: bool,
    /// Offset added after scaling
    #[serde(default)]
    pub offset: Option<Value>,
    /// Scale applied to the raw value
    #[serde(default)]
    pub scale: Option<Value>,
    /// Maximum of the processed values
    #[serde(default)]
    pub max: Option<Value>,
    /// Minimum of the processed values
    #[serde(default)]
    pub min: Option<Value>,
    /// Value used when none is stored
    #[serde(default)]
    pub default: Option<Value>,
    /// Raw value that means "no data"
    #[serde(default)]
    pub no_data: Option<Value>,
    /// Whether every entity must have a value
    #[serde(default)]
    pub required: bool,
}

impl ClassProperty {
    /// A property of the given type with everything else unset
    pub fn new(property_type: PropertyType) -> Self {
        Self {
            property_type,
            component_type: None,
            enum_type: None,
            array: false,
            count: None,
            normalized: false,
            offset: None,
            scale: None,
            max: None,
            min: None,
            default: None,
            no_data: None,
            required: false,
        }
    }

    /// Whether values are arrays without a fixed length
    pub fn is_variable_length_array(&self) -> bool {
        self.array && self.count.is_none()
    }

    /// Number of elements of a fixed-length array, 1 for non-arrays
    pub fn fixed_element_count(&self) -> Option<u64> {
        if self.array {
            self.count
        } else {
            Some(1)
        }
    }
}

/// An enum: named integer values
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataEnum {
    /// Component type of the stored values
    #[serde(default = "default_enum_value_type")]
    pub value_type: ComponentType,
    /// The values
    pub values: Vec<EnumValue>,
}

fn default_enum_value_type() -> ComponentType {
    ComponentType::Uint16
}

impl MetadataEnum {
    /// The name of the value, if it is one of the enum's values
    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.value == value)
            .map(|v| v.name.as_str())
    }
}

/// One value of an enum
#[derive(Debug, Clone, Deserialize)]
pub struct EnumValue {
    /// Name of the value
    pub name: String,
    /// The integer value
    pub value: i64,
}

/// A property table: a class and one buffer view per property
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyTable {
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Name of the class of the rows
    pub class: String,
    /// Number of rows
    pub count: u64,
    /// Properties by name
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyTableProperty>,
}

impl PropertyTable {
    /// Parse a property table from its JSON text
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if the text is not a valid property table.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Where one property of a property table is stored
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyTableProperty {
    /// Buffer view index of the values
    pub values: usize,
    /// Buffer view index of the array offsets of variable-length arrays
    #[serde(default)]
    pub array_offsets: Option<usize>,
    /// Buffer view index of the string offsets of strings
    #[serde(default)]
    pub string_offsets: Option<usize>,
    /// Component type of the array offsets, `UINT32` when absent
    #[serde(default)]
    pub array_offset_type: Option<ComponentType>,
    /// Component type of the string offsets, `UINT32` when absent
    #[serde(default)]
    pub string_offset_type: Option<ComponentType>,
    /// Overrides the class offset
    #[serde(default)]
    pub offset: Option<Value>,
    /// Overrides the class scale
    #[serde(default)]
    pub scale: Option<Value>,
    /// Maximum of the processed values in this table
    #[serde(default)]
    pub max: Option<Value>,
    /// Minimum of the processed values in this table
    #[serde(default)]
    pub min: Option<Value>,
}

/// A byte range of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferView {
    /// Index of the buffer
    pub buffer: usize,
    /// Start of the range in the buffer
    #[serde(default)]
    pub byte_offset: u64,
    /// Length of the range
    pub byte_length: u64,
}

impl BufferView {
    /// A view of `byte_length` bytes at `byte_offset` of `buffer`
    pub fn new(buffer: usize, byte_offset: u64, byte_length: u64) -> Self {
        Self {
            buffer,
            byte_offset,
            byte_length,
        }
    }
}

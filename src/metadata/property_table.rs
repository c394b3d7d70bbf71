//! A property table together with the binary data it refers to

use std::collections::BTreeMap;

use super::schema::{
    BufferView, ClassProperty, ComponentType, MetadataClass, MetadataEnum, PropertyTable,
    PropertyType, Schema,
};
use crate::error::{Error, Result};

/// A property table, its class and the buffers its buffer views point into
///
/// # Example
///
/// ```
/// use tiles3d_validator::metadata::{BinaryPropertyTable, BufferView, PropertyTable, Schema};
///
/// let schema: Schema = serde_json::from_str(
///     r#"{"classes": {"tree": {"properties": {
///         "height": {"type": "SCALAR", "componentType": "UINT16"}
///     }}}}"#,
/// ).unwrap();
/// let table: PropertyTable = serde_json::from_str(
///     r#"{"class": "tree", "count": 2, "properties": {"height": {"values": 0}}}"#,
/// ).unwrap();
/// let table = BinaryPropertyTable::new(
///     &schema,
///     table,
///     vec![BufferView::new(0, 0, 4)],
///     vec![vec![1, 0, 2, 0]],
/// ).unwrap();
/// assert_eq!(table.count(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct BinaryPropertyTable {
    property_table: PropertyTable,
    metadata_class: MetadataClass,
    enums: BTreeMap<String, MetadataEnum>,
    buffer_views: Vec<BufferView>,
    buffers: Vec<Vec<u8>>,
}

impl BinaryPropertyTable {
    /// Combine a property table with its schema and binary data
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaElementNotFound`] if the schema lacks the
    /// table's class or an enum that one of its properties refers to, and
    /// [`Error::InvalidInput`] for a numeric property without a component
    /// type or an enum property without an enum type.
    pub fn new(
        schema: &Schema,
        property_table: PropertyTable,
        buffer_views: Vec<BufferView>,
        buffers: Vec<Vec<u8>>,
    ) -> Result<Self> {
        let metadata_class = schema
            .classes
            .get(&property_table.class)
            .ok_or_else(|| Error::missing_class(&property_table.class))?
            .clone();

        let mut enums = BTreeMap::new();
        for (name, property) in &metadata_class.properties {
            match property.property_type {
                PropertyType::Enum => {
                    let enum_type = property.enum_type.as_deref().ok_or_else(|| {
                        Error::invalid_input(format!("ENUM property '{}' has no enumType", name))
                    })?;
                    let metadata_enum = schema
                        .enums
                        .get(enum_type)
                        .ok_or_else(|| Error::missing_enum(name, enum_type))?;
                    enums.insert(enum_type.to_string(), metadata_enum.clone());
                }
                t if t.is_numeric() && property.component_type.is_none() => {
                    return Err(Error::invalid_input(format!(
                        "{} property '{}' has no componentType",
                        t, name
                    )));
                }
                _ => {}
            }
        }

        Ok(Self {
            property_table,
            metadata_class,
            enums,
            buffer_views,
            buffers,
        })
    }

    /// The property table
    pub fn property_table(&self) -> &PropertyTable {
        &self.property_table
    }

    /// The class of the rows
    pub fn metadata_class(&self) -> &MetadataClass {
        &self.metadata_class
    }

    /// Number of rows
    pub fn count(&self) -> u64 {
        self.property_table.count
    }

    /// The buffer views
    pub fn buffer_views(&self) -> &[BufferView] {
        &self.buffer_views
    }

    /// The enum of an `ENUM` property
    pub fn metadata_enum(&self, property: &ClassProperty) -> Option<&MetadataEnum> {
        self.enums.get(property.enum_type.as_deref()?)
    }

    /// Component type of the `values` buffer view of a property
    ///
    /// `UINT8` for strings and booleans, the enum's value type for enums.
    pub fn values_component_type(&self, property: &ClassProperty) -> ComponentType {
        match property.property_type {
            PropertyType::String | PropertyType::Boolean => ComponentType::Uint8,
            PropertyType::Enum => self
                .metadata_enum(property)
                .map_or(ComponentType::Uint16, |e| e.value_type),
            // presence is checked in `new`
            _ => property.component_type.unwrap_or(ComponentType::Uint8),
        }
    }

    /// The bytes of a buffer view
    ///
    /// Returns a description of the problem if the index is out of range or
    /// the view does not lie inside its buffer.
    pub fn buffer_view_data(&self, index: usize) -> std::result::Result<&[u8], String> {
        let view = self.buffer_views.get(index).ok_or_else(|| {
            format!(
                "The buffer view index {} is out of range, there are {} buffer views",
                index,
                self.buffer_views.len()
            )
        })?;
        let buffer = self.buffers.get(view.buffer).ok_or_else(|| {
            format!(
                "Buffer view {} refers to buffer {}, but there are {} buffers",
                index,
                view.buffer,
                self.buffers.len()
            )
        })?;
        let end = view.byte_offset.saturating_add(view.byte_length);
        if end > buffer.len() as u64 {
            return Err(format!(
                "Buffer view {} with byteOffset {} and byteLength {} exceeds its buffer of {} bytes",
                index,
                view.byte_offset,
                view.byte_length,
                buffer.len()
            ));
        }
        Ok(&buffer[view.byte_offset as usize..end as usize])
    }
}

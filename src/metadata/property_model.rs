//! Access to the values of one property, row by row

use super::component::read_bit;
use super::property_table::BinaryPropertyTable;
use super::schema::{ComponentType, MetadataEnum, PropertyType};
use super::value::{json_numbers, MetadataValue};
use crate::error::{Error, Result};

/// Values of one property, addressed by row key
///
/// Implementations may be backed by a binary property table or by any other
/// storage; the values validator only depends on this trait.
pub trait MetadataPropertyModel {
    /// The value with normalization, offset and scale applied, and with enum
    /// values replaced by their names
    ///
    /// Returns `None` if the key is out of range or the value cannot be read.
    fn property_value(&self, key: usize) -> Option<MetadataValue>;

    /// The value as stored
    fn raw_property_value(&self, key: usize) -> Option<MetadataValue>;
}

/// The decoding of one column of a binary property table
#[derive(Debug, Clone)]
struct BinaryColumn<'a> {
    property_type: PropertyType,
    component_type: ComponentType,
    array: bool,
    fixed_count: u64,
    values: &'a [u8],
    array_offsets: Option<(&'a [u8], ComponentType)>,
    string_offsets: Option<(&'a [u8], ComponentType)>,
}

impl BinaryColumn<'_> {
    fn element_range(&self, key: usize) -> Option<(usize, usize)> {
        match self.array_offsets {
            Some((bytes, offset_type)) => {
                let start = offset_type.read_offset(bytes, key)?;
                let end = offset_type.read_offset(bytes, key.checked_add(1)?)?;
                if end < start {
                    return None;
                }
                Some((usize::try_from(start).ok()?, usize::try_from(end).ok()?))
            }
            None => {
                let count = usize::try_from(self.fixed_count).ok()?;
                let start = key.checked_mul(count)?;
                Some((start, start.checked_add(count)?))
            }
        }
    }

    fn element(&self, index: usize) -> Option<MetadataValue> {
        match self.property_type {
            PropertyType::String => {
                let (bytes, offset_type) = self.string_offsets?;
                let start = offset_type.read_offset(bytes, index)? as usize;
                let end = offset_type.read_offset(bytes, index + 1)? as usize;
                let data = self.values.get(start..end)?;
                Some(MetadataValue::String(String::from_utf8_lossy(data).into_owned()))
            }
            PropertyType::Boolean => read_bit(self.values, index).map(MetadataValue::Boolean),
            property_type => {
                let components = property_type.component_count();
                if components == 1 {
                    return self.component_type.read(self.values, index);
                }
                let first = index.checked_mul(components)?;
                (first..first + components)
                    .map(|i| self.component_type.read(self.values, i))
                    .collect::<Option<Vec<_>>>()
                    .map(MetadataValue::Array)
            }
        }
    }

    fn raw(&self, key: usize) -> Option<MetadataValue> {
        let (start, end) = self.element_range(key)?;
        if !self.array {
            return self.element(start);
        }
        (start..end)
            .map(|i| self.element(i))
            .collect::<Option<Vec<_>>>()
            .map(MetadataValue::Array)
    }
}

/// Numeric, string and boolean properties of a binary property table
#[derive(Debug, Clone)]
pub struct BinaryPropertyModel<'a> {
    column: BinaryColumn<'a>,
    normalized: bool,
    offset: Option<Vec<f64>>,
    scale: Option<Vec<f64>>,
}

impl MetadataPropertyModel for BinaryPropertyModel<'_> {
    fn property_value(&self, key: usize) -> Option<MetadataValue> {
        let raw = self.column.raw(key)?;
        if !self.column.property_type.is_numeric()
            || (!self.normalized && self.offset.is_none() && self.scale.is_none())
        {
            return Some(raw);
        }
        let component_type = self.column.component_type;
        Some(raw.map_numbers(&mut |i, v| {
            let v = if self.normalized {
                component_type.normalize(v)
            } else {
                v
            };
            let scale = broadcast(self.scale.as_deref(), i).unwrap_or(1.0);
            let offset = broadcast(self.offset.as_deref(), i).unwrap_or(0.0);
            v * scale + offset
        }))
    }

    fn raw_property_value(&self, key: usize) -> Option<MetadataValue> {
        self.column.raw(key)
    }
}

/// Enum properties of a binary property table
#[derive(Debug, Clone)]
pub struct BinaryEnumPropertyModel<'a> {
    column: BinaryColumn<'a>,
    metadata_enum: &'a MetadataEnum,
}

impl BinaryEnumPropertyModel<'_> {
    fn to_name(&self, raw: MetadataValue) -> MetadataValue {
        match raw {
            MetadataValue::Array(items) => {
                MetadataValue::Array(items.into_iter().map(|v| self.to_name(v)).collect())
            }
            other => match other.as_i64().and_then(|v| self.metadata_enum.name_of(v)) {
                Some(name) => MetadataValue::String(name.to_string()),
                None => other,
            },
        }
    }
}

impl MetadataPropertyModel for BinaryEnumPropertyModel<'_> {
    fn property_value(&self, key: usize) -> Option<MetadataValue> {
        self.column.raw(key).map(|raw| self.to_name(raw))
    }

    fn raw_property_value(&self, key: usize) -> Option<MetadataValue> {
        self.column.raw(key)
    }
}

/// The entry of a per-component list for component `index`
///
/// A single entry applies to every component.
pub(crate) fn broadcast(values: Option<&[f64]>, index: usize) -> Option<f64> {
    match values? {
        [] => None,
        values => Some(values[index % values.len()]),
    }
}

/// Create the model for one property of a binary property table
///
/// Offset and scale of the property table override those of the class.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the property is not defined by the class
/// and the table, or if one of its buffer views cannot be accessed.
pub fn create_property_model<'a>(
    table: &'a BinaryPropertyTable,
    property_name: &str,
) -> Result<Box<dyn MetadataPropertyModel + 'a>> {
    let class_property = table
        .metadata_class()
        .properties
        .get(property_name)
        .ok_or_else(|| Error::invalid_input(format!("The class has no property '{}'", property_name)))?;
    let table_property = table
        .property_table()
        .properties
        .get(property_name)
        .ok_or_else(|| {
            Error::invalid_input(format!("The property table has no property '{}'", property_name))
        })?;

    let view = |index: usize| table.buffer_view_data(index).map_err(Error::invalid_input);
    let array_offsets = match (class_property.is_variable_length_array(), table_property.array_offsets) {
        (true, Some(index)) => Some((
            view(index)?,
            table_property.array_offset_type.unwrap_or(ComponentType::Uint32),
        )),
        (true, None) => {
            return Err(Error::invalid_input(format!(
                "Variable-length array property '{}' has no arrayOffsets",
                property_name
            )))
        }
        (false, _) => None,
    };
    let string_offsets = match (class_property.property_type, table_property.string_offsets) {
        (PropertyType::String, Some(index)) => Some((
            view(index)?,
            table_property.string_offset_type.unwrap_or(ComponentType::Uint32),
        )),
        (PropertyType::String, None) => {
            return Err(Error::invalid_input(format!(
                "STRING property '{}' has no stringOffsets",
                property_name
            )))
        }
        _ => None,
    };

    let column = BinaryColumn {
        property_type: class_property.property_type,
        component_type: table.values_component_type(class_property),
        array: class_property.array,
        fixed_count: class_property.fixed_element_count().unwrap_or(1),
        values: view(table_property.values)?,
        array_offsets,
        string_offsets,
    };

    if class_property.property_type == PropertyType::Enum {
        let metadata_enum = table.metadata_enum(class_property).ok_or_else(|| {
            Error::missing_enum(
                property_name,
                class_property.enum_type.as_deref().unwrap_or_default(),
            )
        })?;
        return Ok(Box::new(BinaryEnumPropertyModel {
            column,
            metadata_enum,
        }));
    }

    let offset = table_property
        .offset
        .as_ref()
        .or(class_property.offset.as_ref())
        .and_then(json_numbers);
    let scale = table_property
        .scale
        .as_ref()
        .or(class_property.scale.as_ref())
        .and_then(json_numbers);
    Ok(Box::new(BinaryPropertyModel {
        column,
        normalized: class_property.normalized,
        offset,
        scale,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::schema::{BufferView, PropertyTable, Schema};

    fn table(class_json: &str, properties_json: &str, count: u64, views: Vec<Vec<u8>>) -> BinaryPropertyTable {
        let schema: Schema = serde_json::from_str(&format!(
            r#"{{"classes": {{"c": {{"properties": {}}}}},
                "enums": {{"kind": {{"valueType": "UINT8", "values": [
                    {{"name": "a", "value": 1}}, {{"name": "b", "value": 2}}]}}}}}}"#,
            class_json
        ))
        .unwrap();
        let property_table: PropertyTable = serde_json::from_str(&format!(
            r#"{{"class": "c", "count": {}, "properties": {}}}"#,
            count, properties_json
        ))
        .unwrap();
        let buffer_views = views
            .iter()
            .enumerate()
            .map(|(i, v)| BufferView::new(i, 0, v.len() as u64))
            .collect();
        BinaryPropertyTable::new(&schema, property_table, buffer_views, views).unwrap()
    }

    #[test]
    fn test_scalar_with_offset_and_scale() {
        let t = table(
            r#"{"p": {"type": "SCALAR", "componentType": "UINT8", "offset": 1, "scale": 2}}"#,
            r#"{"p": {"values": 0, "scale": 10}}"#,
            2,
            vec![vec![3, 4]],
        );
        let model = create_property_model(&t, "p").unwrap();
        assert_eq!(model.raw_property_value(0), Some(MetadataValue::UInt(3)));
        assert_eq!(model.property_value(0), Some(MetadataValue::Float(31.0)));
        assert_eq!(model.property_value(1), Some(MetadataValue::Float(41.0)));
        assert_eq!(model.property_value(2), None);
    }

    #[test]
    fn test_normalized_vector() {
        let t = table(
            r#"{"p": {"type": "VEC2", "componentType": "UINT8", "normalized": true}}"#,
            r#"{"p": {"values": 0}}"#,
            1,
            vec![vec![0, 255]],
        );
        let model = create_property_model(&t, "p").unwrap();
        assert_eq!(
            model.property_value(0),
            Some(MetadataValue::Array(vec![MetadataValue::Float(0.0), MetadataValue::Float(1.0)]))
        );
    }

    #[test]
    fn test_variable_length_string_arrays() {
        let t = table(
            r#"{"p": {"type": "STRING", "array": true}}"#,
            r#"{"p": {"values": 0, "arrayOffsets": 1, "stringOffsets": 2,
                      "arrayOffsetType": "UINT8", "stringOffsetType": "UINT8"}}"#,
            2,
            vec![b"oakelmash".to_vec(), vec![0, 2, 3], vec![0, 3, 6, 9]],
        );
        let model = create_property_model(&t, "p").unwrap();
        assert_eq!(
            model.property_value(0),
            Some(MetadataValue::Array(vec![
                MetadataValue::String("oak".into()),
                MetadataValue::String("elm".into())
            ]))
        );
        assert_eq!(
            model.property_value(1),
            Some(MetadataValue::Array(vec![MetadataValue::String("ash".into())]))
        );
    }

    #[test]
    fn test_booleans_and_fixed_arrays() {
        let t = table(
            r#"{"b": {"type": "BOOLEAN", "array": true, "count": 2}}"#,
            r#"{"b": {"values": 0}}"#,
            2,
            vec![vec![0b0000_1001]],
        );
        let model = create_property_model(&t, "b").unwrap();
        assert_eq!(
            model.property_value(1),
            Some(MetadataValue::Array(vec![
                MetadataValue::Boolean(false),
                MetadataValue::Boolean(true)
            ]))
        );
    }

    #[test]
    fn test_enum_names() {
        let t = table(
            r#"{"e": {"type": "ENUM", "enumType": "kind"}}"#,
            r#"{"e": {"values": 0}}"#,
            2,
            vec![vec![2, 7]],
        );
        let model = create_property_model(&t, "e").unwrap();
        assert_eq!(model.property_value(0), Some(MetadataValue::String("b".into())));
        assert_eq!(model.raw_property_value(1), Some(MetadataValue::UInt(7)));
        assert_eq!(model.property_value(1), Some(MetadataValue::UInt(7)));
    }

    #[test]
    fn test_unknown_property() {
        let t = table(r#"{}"#, r#"{}"#, 0, vec![]);
        assert!(create_property_model(&t, "p").is_err());
    }
}

//! Binary property tables of structural metadata
//!
//! A property table stores one column per class property in buffer views.
//! Validation runs in two stages: the byte layout of every column is checked
//! against the class definition, and only if the layout is valid are the
//! decoded values checked against the declared ranges and enums.

mod component;
mod property_model;
mod property_table;
mod schema;
mod table_layout;
mod table_values;
mod value;

pub use component::read_bit;
pub use property_model::{
    create_property_model, BinaryEnumPropertyModel, BinaryPropertyModel, MetadataPropertyModel,
};
pub use property_table::BinaryPropertyTable;
pub use schema::{
    BufferView, ClassProperty, ComponentType, EnumValue, MetadataClass, MetadataEnum,
    PropertyTable, PropertyTableProperty, PropertyType, Schema,
};
pub use table_layout::validate_property_table_layout;
pub use table_values::{validate_property_table_values, validate_property_values, PropertyValues};
pub use value::{json_numbers, MetadataValue};

use tracing::debug;

use crate::issues::ValidationContext;

/// Validate the layout and the values of a binary property table
///
/// Values are only validated when the layout is valid and the options enable
/// metadata value validation. A failed value validation fails the table.
pub fn validate_binary_property_table(
    path: &str,
    table: &BinaryPropertyTable,
    context: &mut ValidationContext,
) -> bool {
    debug!(
        path,
        class = table.property_table().class.as_str(),
        rows = table.count(),
        "validating property table"
    );
    if !validate_property_table_layout(path, table, context) {
        return false;
    }
    if !context.options().validate_metadata_values() {
        return true;
    }
    validate_property_table_values(path, table, context)
}

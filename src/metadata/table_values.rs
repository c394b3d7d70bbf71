//! Values of a binary property table: ranges and enum membership

use super::property_model::{broadcast, create_property_model, MetadataPropertyModel};
use super::property_table::BinaryPropertyTable;
use super::schema::{ClassProperty, ComponentType, MetadataEnum, PropertyTableProperty, PropertyType};
use super::value::{format_components, json_numbers, MetadataValue};
use crate::issues::{IssueType, ValidationContext, ValidationIssue};

/// Validate the values of every property of a property table
///
/// The layout of the table must have been validated before.
pub fn validate_property_table_values(
    path: &str,
    table: &BinaryPropertyTable,
    context: &mut ValidationContext,
) -> bool {
    let mut valid = true;
    for (name, class_property) in &table.metadata_class().properties {
        let Some(table_property) = table.property_table().properties.get(name) else {
            continue;
        };
        let property_path = format!("{}/{}", path, name);
        let model = match create_property_model(table, name) {
            Ok(model) => model,
            Err(e) => {
                context.add_issue(ValidationIssue::new(
                    IssueType::BinaryInvalid,
                    &property_path,
                    format!("The values of property '{}' cannot be accessed: {}", name, e),
                ));
                valid = false;
                continue;
            }
        };
        let property = PropertyValues {
            name,
            class_property,
            table_property,
            metadata_enum: table.metadata_enum(class_property),
        };
        valid &= validate_property_values(&property_path, &property, model.as_ref(), table.count(), context);
    }
    valid
}

/// A property whose values are validated, with its definitions
#[derive(Debug, Clone, Copy)]
pub struct PropertyValues<'a> {
    /// Name of the property
    pub name: &'a str,
    /// Definition in the class
    pub class_property: &'a ClassProperty,
    /// Overrides of the property table
    pub table_property: &'a PropertyTableProperty,
    /// The enum of `ENUM` properties
    pub metadata_enum: Option<&'a MetadataEnum>,
}

/// Validate the values of one property for the rows `0..count`
///
/// Enum properties must only contain values of their enum. Numeric
/// properties must lie within the `min` and `max` of the class and of the
/// property table, and the bounds declared by the property table must equal
/// the bounds of the values. Rows equal to the class `noData` are ignored.
/// Every offending row is reported.
pub fn validate_property_values(
    path: &str,
    property: &PropertyValues<'_>,
    model: &dyn MetadataPropertyModel,
    count: u64,
    context: &mut ValidationContext,
) -> bool {
    match property.class_property.property_type {
        PropertyType::Enum => match property.metadata_enum {
            Some(metadata_enum) => validate_enum_values(path, property.name, metadata_enum, model, count, context),
            None => true,
        },
        t if t.is_numeric() => NumericCheck::new(property).run(path, model, count, context),
        _ => true,
    }
}

/// Collect the codes of `value` that name no value of the enum
///
/// Integer codes are compared exactly, so 64-bit codes never match a
/// neighbouring value through rounding.
fn collect_invalid_enum_codes(
    value: &MetadataValue,
    metadata_enum: &MetadataEnum,
    invalid: &mut Vec<String>,
) {
    match value {
        MetadataValue::Array(items) => {
            for item in items {
                collect_invalid_enum_codes(item, metadata_enum, invalid);
            }
        }
        MetadataValue::Int(_) | MetadataValue::UInt(_) => {
            if value.as_i64().and_then(|code| metadata_enum.name_of(code)).is_none() {
                invalid.push(value.to_string());
            }
        }
        MetadataValue::Float(code) => invalid.push(code.to_string()),
        MetadataValue::Boolean(_) | MetadataValue::String(_) => {}
    }
}

fn validate_enum_values(
    path: &str,
    name: &str,
    metadata_enum: &MetadataEnum,
    model: &dyn MetadataPropertyModel,
    count: u64,
    context: &mut ValidationContext,
) -> bool {
    let mut valid = true;
    for key in 0..count as usize {
        let Some(raw) = model.raw_property_value(key) else {
            continue;
        };
        let mut invalid = Vec::new();
        collect_invalid_enum_codes(&raw, metadata_enum, &mut invalid);
        if invalid.is_empty() {
            continue;
        }
        let allowed: Vec<String> = metadata_enum
            .values
            .iter()
            .map(|v| format!("{} ({})", v.value, v.name))
            .collect();
        context.add_issue(ValidationIssue::new(
            IssueType::MetadataInvalidEnumValue,
            path,
            format!(
                "The value of property '{}' in row {} contains {}, which is not a value of its enum. \
                 Valid values are {}",
                name,
                key,
                invalid.join(", "),
                allowed.join(", ")
            ),
        ));
        valid = false;
    }
    valid
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundKind {
    Min,
    Max,
}

impl BoundKind {
    fn name(&self) -> &'static str {
        match self {
            BoundKind::Min => "min",
            BoundKind::Max => "max",
        }
    }

    fn violated(&self, value: f64, bound: f64) -> bool {
        match self {
            BoundKind::Min => value < bound,
            BoundKind::Max => value > bound,
        }
    }
}

/// A declared bound and where it was declared
#[derive(Debug)]
struct Bound {
    kind: BoundKind,
    origin: &'static str,
    values: Vec<f64>,
    /// The extreme values of the rows, per bound component
    computed: Vec<Option<f64>>,
}

impl Bound {
    fn new(kind: BoundKind, origin: &'static str, values: Option<Vec<f64>>) -> Option<Self> {
        let values = values.filter(|v| !v.is_empty())?;
        let computed = vec![None; values.len()];
        Some(Self {
            kind,
            origin,
            values,
            computed,
        })
    }

    fn update(&mut self, components: &[f64]) {
        let len = self.values.len();
        for (j, &value) in components.iter().enumerate() {
            let slot = &mut self.computed[j % len];
            *slot = Some(match (*slot, self.kind) {
                (None, _) => value,
                (Some(current), BoundKind::Min) => current.min(value),
                (Some(current), BoundKind::Max) => current.max(value),
            });
        }
    }
}

struct NumericCheck<'a> {
    property: &'a PropertyValues<'a>,
    component_type: ComponentType,
    offset: Option<Vec<f64>>,
    scale: Option<Vec<f64>>,
    no_data: Option<Vec<f64>>,
    /// Class bounds are only checked; property table bounds must also be tight
    class_bounds: Vec<Bound>,
    table_bounds: Vec<Bound>,
}

impl<'a> NumericCheck<'a> {
    fn new(property: &'a PropertyValues<'a>) -> Self {
        let class_property = property.class_property;
        let table_property = property.table_property;
        let numbers = |value: &Option<serde_json::Value>| value.as_ref().and_then(json_numbers);
        let class_bounds = [
            Bound::new(BoundKind::Min, "class", numbers(&class_property.min)),
            Bound::new(BoundKind::Max, "class", numbers(&class_property.max)),
        ];
        let table_bounds = [
            Bound::new(BoundKind::Min, "property table", numbers(&table_property.min)),
            Bound::new(BoundKind::Max, "property table", numbers(&table_property.max)),
        ];
        Self {
            property,
            component_type: class_property.component_type.unwrap_or(ComponentType::Float64),
            offset: numbers(&table_property.offset).or_else(|| numbers(&class_property.offset)),
            scale: numbers(&table_property.scale).or_else(|| numbers(&class_property.scale)),
            no_data: numbers(&class_property.no_data),
            class_bounds: class_bounds.into_iter().flatten().collect(),
            table_bounds: table_bounds.into_iter().flatten().collect(),
        }
    }

    fn run(
        mut self,
        path: &str,
        model: &dyn MetadataPropertyModel,
        count: u64,
        context: &mut ValidationContext,
    ) -> bool {
        if self.class_bounds.is_empty() && self.table_bounds.is_empty() {
            return true;
        }
        let mut valid = true;
        for key in 0..count as usize {
            let Some(processed) = model
                .property_value(key)
                .and_then(|v| v.numeric_components())
            else {
                continue;
            };
            let raw = model
                .raw_property_value(key)
                .and_then(|v| v.numeric_components())
                .unwrap_or_default();
            if self.no_data.as_ref().is_some_and(|no_data| *no_data == raw) {
                continue;
            }

            for bound in self.class_bounds.iter().chain(self.table_bounds.iter()) {
                if let Some(issue) = self.check_row(path, key, bound, &raw, &processed) {
                    context.add_issue(issue);
                    valid = false;
                }
            }
            for bound in &mut self.table_bounds {
                bound.update(&processed);
            }
        }

        for bound in &self.table_bounds {
            if bound.computed.iter().any(Option::is_none) {
                continue;
            }
            let computed: Vec<f64> = bound.computed.iter().flatten().copied().collect();
            let tight = computed
                .iter()
                .zip(&bound.values)
                .all(|(&c, &d)| self.bounds_equal(c, d));
            if !tight {
                context.add_issue(ValidationIssue::new(
                    IssueType::MetadataValueBoundMismatch,
                    path,
                    format!(
                        "The {} {} of property '{}' is {}, but the {} of the values is {}",
                        bound.origin,
                        bound.kind.name(),
                        self.property.name,
                        format_components(&bound.values),
                        match bound.kind {
                            BoundKind::Min => "minimum",
                            BoundKind::Max => "maximum",
                        },
                        format_components(&computed)
                    ),
                ));
                valid = false;
            }
        }
        valid
    }

    fn bounds_equal(&self, computed: f64, declared: f64) -> bool {
        match self.component_type {
            ComponentType::Float32 => (computed as f32) == (declared as f32),
            _ => computed == declared,
        }
    }

    fn check_row(
        &self,
        path: &str,
        key: usize,
        bound: &Bound,
        raw: &[f64],
        processed: &[f64],
    ) -> Option<ValidationIssue> {
        let violations: Vec<String> = processed
            .iter()
            .enumerate()
            .filter_map(|(j, &value)| {
                let limit = bound.values[j % bound.values.len()];
                if !bound.kind.violated(value, limit) {
                    return None;
                }
                let relation = match bound.kind {
                    BoundKind::Min => "less than",
                    BoundKind::Max => "greater than",
                };
                let component = if processed.len() > 1 {
                    format!("component {} ", j)
                } else {
                    String::new()
                };
                Some(format!(
                    "{}{} ({}) is {} {}",
                    component,
                    value,
                    self.derivation(raw.get(j).copied(), j),
                    relation,
                    limit
                ))
            })
            .collect();
        if violations.is_empty() {
            return None;
        }
        Some(ValidationIssue::new(
            IssueType::MetadataValueNotInRange,
            path,
            format!(
                "The value of property '{}' in row {} is not within the {} {}: {}",
                self.property.name,
                key,
                bound.origin,
                bound.kind.name(),
                violations.join("; ")
            ),
        ))
    }

    /// How a processed component was computed from its raw value
    fn derivation(&self, raw: Option<f64>, index: usize) -> String {
        let Some(raw) = raw else {
            return "raw value unavailable".to_string();
        };
        let mut text = format!("raw value {}", raw);
        if self.property.class_property.normalized {
            text.push_str(&format!(
                ", normalized {} to {}",
                self.component_type,
                self.component_type.normalize(raw)
            ));
        }
        if let Some(scale) = broadcast(self.scale.as_deref(), index) {
            text.push_str(&format!(" × scale {}", scale));
        }
        if let Some(offset) = broadcast(self.offset.as_deref(), index) {
            text.push_str(&format!(" + offset {}", offset));
        }
        text
    }
}

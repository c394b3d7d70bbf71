//! Decoded metadata values

use serde_json::Value;
use std::fmt;

/// A decoded property value
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    /// A boolean
    Boolean(bool),
    /// A signed integer component
    Int(i64),
    /// An unsigned integer component
    UInt(u64),
    /// A floating point component, or a normalized/transformed integer
    Float(f64),
    /// A string, or the name of an enum value
    String(String),
    /// Components of a vector or matrix, or the elements of an array
    Array(Vec<MetadataValue>),
}

impl MetadataValue {
    /// The value as a number, if it is one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Int(v) => Some(*v as f64),
            MetadataValue::UInt(v) => Some(*v as f64),
            MetadataValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as a signed integer, if it is an integer that fits
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetadataValue::Int(v) => Some(*v),
            MetadataValue::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// All numeric components in order, or `None` if any leaf is not a number
    ///
    /// Scalars yield one component. Arrays of vectors yield the components
    /// of every element in turn.
    pub fn numeric_components(&self) -> Option<Vec<f64>> {
        let mut components = Vec::new();
        self.collect_numbers(&mut components)?;
        Some(components)
    }

    fn collect_numbers(&self, out: &mut Vec<f64>) -> Option<()> {
        match self {
            MetadataValue::Array(items) => {
                for item in items {
                    item.collect_numbers(out)?;
                }
                Some(())
            }
            other => {
                out.push(other.as_f64()?);
                Some(())
            }
        }
    }

    /// Apply `f` to every numeric component, preserving the structure
    ///
    /// `f` receives the running index of the component.
    pub(crate) fn map_numbers(&self, f: &mut impl FnMut(usize, f64) -> f64) -> MetadataValue {
        let mut index = 0;
        self.map_numbers_from(&mut index, f)
    }

    fn map_numbers_from(
        &self,
        index: &mut usize,
        f: &mut impl FnMut(usize, f64) -> f64,
    ) -> MetadataValue {
        match self {
            MetadataValue::Array(items) => MetadataValue::Array(
                items
                    .iter()
                    .map(|item| item.map_numbers_from(index, f))
                    .collect(),
            ),
            other => match other.as_f64() {
                Some(v) => {
                    let mapped = f(*index, v);
                    *index += 1;
                    MetadataValue::Float(mapped)
                }
                None => other.clone(),
            },
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Boolean(v) => write!(f, "{}", v),
            MetadataValue::Int(v) => write!(f, "{}", v),
            MetadataValue::UInt(v) => write!(f, "{}", v),
            MetadataValue::Float(v) => write!(f, "{}", v),
            MetadataValue::String(v) => write!(f, "\"{}\"", v),
            MetadataValue::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Flatten a JSON number or (nested) array of numbers
///
/// Returns `None` if the value contains anything but numbers.
pub fn json_numbers(value: &Value) -> Option<Vec<f64>> {
    let mut out = Vec::new();
    collect_json_numbers(value, &mut out)?;
    Some(out)
}

fn collect_json_numbers(value: &Value, out: &mut Vec<f64>) -> Option<()> {
    match value {
        Value::Number(n) => {
            out.push(n.as_f64()?);
            Some(())
        }
        Value::Array(items) => {
            for item in items {
                collect_json_numbers(item, out)?;
            }
            Some(())
        }
        _ => None,
    }
}

/// Format a list of components as a scalar or a bracketed list
pub(crate) fn format_components(components: &[f64]) -> String {
    match components {
        [single] => single.to_string(),
        _ => format!(
            "[{}]",
            components
                .iter()
                .map(f64::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

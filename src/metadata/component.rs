//! Sizes and little-endian decoding of component types

use byteorder::{ByteOrder, LittleEndian};
use std::fmt;

use super::schema::ComponentType;
use super::value::MetadataValue;

impl ComponentType {
    /// Size of one component in bytes
    pub fn byte_size(&self) -> usize {
        match self {
            ComponentType::Int8 | ComponentType::Uint8 => 1,
            ComponentType::Int16 | ComponentType::Uint16 => 2,
            ComponentType::Int32 | ComponentType::Uint32 | ComponentType::Float32 => 4,
            ComponentType::Int64 | ComponentType::Uint64 | ComponentType::Float64 => 8,
        }
    }

    /// The name used in the schema
    pub fn name(&self) -> &'static str {
        match self {
            ComponentType::Int8 => "INT8",
            ComponentType::Uint8 => "UINT8",
            ComponentType::Int16 => "INT16",
            ComponentType::Uint16 => "UINT16",
            ComponentType::Int32 => "INT32",
            ComponentType::Uint32 => "UINT32",
            ComponentType::Int64 => "INT64",
            ComponentType::Uint64 => "UINT64",
            ComponentType::Float32 => "FLOAT32",
            ComponentType::Float64 => "FLOAT64",
        }
    }

    /// Whether this is a floating point type
    pub fn is_float(&self) -> bool {
        matches!(self, ComponentType::Float32 | ComponentType::Float64)
    }

    /// Whether this is an unsigned integer type
    pub fn is_unsigned(&self) -> bool {
        matches!(
            self,
            ComponentType::Uint8
                | ComponentType::Uint16
                | ComponentType::Uint32
                | ComponentType::Uint64
        )
    }

    /// Read the component at `index`, or `None` if it is out of bounds
    pub fn read(&self, bytes: &[u8], index: usize) -> Option<MetadataValue> {
        let size = self.byte_size();
        let start = index.checked_mul(size)?;
        let b = bytes.get(start..start.checked_add(size)?)?;
        Some(match self {
            ComponentType::Int8 => MetadataValue::Int(b[0] as i8 as i64),
            ComponentType::Uint8 => MetadataValue::UInt(b[0] as u64),
            ComponentType::Int16 => MetadataValue::Int(LittleEndian::read_i16(b) as i64),
            ComponentType::Uint16 => MetadataValue::UInt(LittleEndian::read_u16(b) as u64),
            ComponentType::Int32 => MetadataValue::Int(LittleEndian::read_i32(b) as i64),
            ComponentType::Uint32 => MetadataValue::UInt(LittleEndian::read_u32(b) as u64),
            ComponentType::Int64 => MetadataValue::Int(LittleEndian::read_i64(b)),
            ComponentType::Uint64 => MetadataValue::UInt(LittleEndian::read_u64(b)),
            ComponentType::Float32 => MetadataValue::Float(LittleEndian::read_f32(b) as f64),
            ComponentType::Float64 => MetadataValue::Float(LittleEndian::read_f64(b)),
        })
    }

    /// Read an array or string offset at `index`
    ///
    /// Offsets are unsigned; signed and float types yield `None`.
    pub fn read_offset(&self, bytes: &[u8], index: usize) -> Option<u64> {
        if !self.is_unsigned() {
            return None;
        }
        match self.read(bytes, index)? {
            MetadataValue::UInt(v) => Some(v),
            _ => None,
        }
    }

    /// Largest value of an integer type, as used for normalization
    fn normalization_divisor(&self) -> Option<f64> {
        match self {
            ComponentType::Int8 => Some(i8::MAX as f64),
            ComponentType::Uint8 => Some(u8::MAX as f64),
            ComponentType::Int16 => Some(i16::MAX as f64),
            ComponentType::Uint16 => Some(u16::MAX as f64),
            ComponentType::Int32 => Some(i32::MAX as f64),
            ComponentType::Uint32 => Some(u32::MAX as f64),
            ComponentType::Int64 => Some(i64::MAX as f64),
            ComponentType::Uint64 => Some(u64::MAX as f64),
            ComponentType::Float32 | ComponentType::Float64 => None,
        }
    }

    /// Map a raw integer to `[0, 1]` (unsigned) or `[-1, 1]` (signed)
    ///
    /// Float types are returned unchanged.
    pub fn normalize(&self, raw: f64) -> f64 {
        match self.normalization_divisor() {
            Some(divisor) if self.is_unsigned() => raw / divisor,
            Some(divisor) => (raw / divisor).max(-1.0),
            None => raw,
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Read the bit at `index` of bit-packed booleans (least significant bit first)
pub fn read_bit(bytes: &[u8], index: usize) -> Option<bool> {
    let byte = bytes.get(index / 8)?;
    Some((byte >> (index % 8)) & 1 == 1)
}

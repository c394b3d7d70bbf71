//! Builders for binary tile content and property tables used across the
//! integration tests
//!
//! All builders produce content that follows the alignment rules: table JSON
//! is padded with spaces, binary sections and payloads with zeros, so that
//! every section starts on an 8-byte boundary.

#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};
use tiles3d_validator::metadata::{BinaryPropertyTable, BufferView, PropertyTable, Schema};
use tiles3d_validator::scene_graph::build_glb;

/// Install a test subscriber so `RUST_LOG=trace` shows the validator logs
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Pad `bytes` so that `start + bytes.len()` is a multiple of 8
pub fn padded(mut bytes: Vec<u8>, start: usize, fill: u8) -> Vec<u8> {
    while (start + bytes.len()) % 8 != 0 {
        bytes.push(fill);
    }
    bytes
}

/// A minimal valid glTF 2.0 asset
pub fn glb() -> Vec<u8> {
    build_glb(r#"{"asset":{"version":"2.0"}}"#)
}

fn header(magic: &[u8; 4], fields: &[usize]) -> Vec<u8> {
    let mut bytes = magic.to_vec();
    bytes.write_u32::<LittleEndian>(1).unwrap();
    for field in fields {
        bytes.write_u32::<LittleEndian>(*field as u32).unwrap();
    }
    bytes
}

/// A batched model with the given feature table JSON, batch table JSON and
/// embedded glTF
pub fn b3dm(feature_table: &str, batch_table: &str, payload: &[u8]) -> Vec<u8> {
    let ft = padded(feature_table.as_bytes().to_vec(), 28, b' ');
    let bt = padded(batch_table.as_bytes().to_vec(), 0, b' ');
    let payload = padded(payload.to_vec(), 0, 0);
    let total = 28 + ft.len() + bt.len() + payload.len();
    let mut bytes = header(b"b3dm", &[total, ft.len(), 0, bt.len(), 0]);
    bytes.extend(ft);
    bytes.extend(bt);
    bytes.extend(payload);
    bytes
}

/// An instanced model with an embedded glTF
pub fn i3dm(feature_table: &str, feature_binary: &[u8], payload: &[u8]) -> Vec<u8> {
    i3dm_with_format(feature_table, feature_binary, 1, payload)
}

/// An instanced model with the given `gltfFormat`
pub fn i3dm_with_format(
    feature_table: &str,
    feature_binary: &[u8],
    gltf_format: u32,
    payload: &[u8],
) -> Vec<u8> {
    let ft = padded(feature_table.as_bytes().to_vec(), 32, b' ');
    let ft_binary = padded(feature_binary.to_vec(), 0, 0);
    let payload = padded(payload.to_vec(), 0, 0);
    let total = 32 + ft.len() + ft_binary.len() + payload.len();
    let mut bytes = header(
        b"i3dm",
        &[total, ft.len(), ft_binary.len(), 0, 0, gltf_format as usize],
    );
    bytes.extend(ft);
    bytes.extend(ft_binary);
    bytes.extend(payload);
    bytes
}

/// A point cloud with `binary_length` zero bytes of feature table binary
pub fn pnts(feature_table: &str, binary_length: usize, batch_table: &str) -> Vec<u8> {
    let ft = padded(feature_table.as_bytes().to_vec(), 28, b' ');
    let bt = padded(batch_table.as_bytes().to_vec(), 0, b' ');
    let binary_length = binary_length.next_multiple_of(8);
    let total = 28 + ft.len() + binary_length + bt.len();
    let mut bytes = header(b"pnts", &[total, ft.len(), binary_length, bt.len(), 0]);
    bytes.extend(ft);
    bytes.resize(bytes.len() + binary_length, 0);
    bytes.extend(bt);
    bytes
}

/// A point cloud with four points at the origin
pub fn simple_pnts() -> Vec<u8> {
    pnts(r#"{"POINTS_LENGTH":4,"POSITION":{"byteOffset":0}}"#, 48, "")
}

/// A composite of the given inner tiles
pub fn cmpt(inner: &[Vec<u8>]) -> Vec<u8> {
    let total = 16 + inner.iter().map(Vec::len).sum::<usize>();
    let mut bytes = header(b"cmpt", &[total, inner.len()]);
    for tile in inner {
        bytes.extend_from_slice(tile);
    }
    bytes
}

/// A property table over a single buffer holding `data`
///
/// Buffer views are given as `(byteOffset, byteLength)` into that buffer.
pub fn property_table(
    schema: &str,
    property_table: &str,
    views: &[(u64, u64)],
    data: Vec<u8>,
) -> BinaryPropertyTable {
    let schema = Schema::from_json_str(schema).unwrap();
    let property_table = PropertyTable::from_json_str(property_table).unwrap();
    let buffer_views = views
        .iter()
        .map(|(offset, length)| BufferView::new(0, *offset, *length))
        .collect();
    BinaryPropertyTable::new(&schema, property_table, buffer_views, vec![data]).unwrap()
}

/// Little-endian bytes of u16 values
pub fn u16_bytes(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Little-endian bytes of u32 values
pub fn u32_bytes(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

#![no_main]

use libfuzzer_sys::fuzz_target;
use tiles3d_validator::metadata::{BinaryPropertyTable, BufferView, PropertyTable, Schema};
use tiles3d_validator::{ValidationContext, validate_binary_property_table};

const SCHEMA: &str = r#"{"classes": {"c": {"properties": {
    "scalar": {"type": "SCALAR", "componentType": "INT16", "min": -100, "max": 100},
    "vector": {"type": "VEC2", "componentType": "UINT8", "normalized": true, "array": true},
    "label": {"type": "STRING", "array": true, "count": 2},
    "flag": {"type": "BOOLEAN"}
}}}}"#;

const TABLE: &str = r#"{"class": "c", "count": 4, "properties": {
    "scalar": {"values": 0},
    "vector": {"values": 1, "arrayOffsets": 2, "arrayOffsetType": "UINT8"},
    "label": {"values": 3, "stringOffsets": 2, "stringOffsetType": "UINT8"},
    "flag": {"values": 0}
}}"#;

fuzz_target!(|data: &[u8]| {
    // One buffer, split into four views by the first bytes of the input
    if data.len() < 8 {
        return;
    }
    let (header, buffer) = data.split_at(8);
    let views = header
        .chunks(2)
        .map(|pair| BufferView::new(0, pair[0] as u64, pair[1] as u64))
        .collect();

    let (Ok(schema), Ok(property_table)) = (
        serde_json::from_str::<Schema>(SCHEMA),
        serde_json::from_str::<PropertyTable>(TABLE),
    ) else {
        return;
    };
    let Ok(table) = BinaryPropertyTable::new(&schema, property_table, views, vec![buffer.to_vec()])
    else {
        return;
    };
    let mut context = ValidationContext::default();
    let _ = validate_binary_property_table("fuzz", &table, &mut context);
});

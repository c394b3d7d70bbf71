#![no_main]

use libfuzzer_sys::fuzz_target;
use tiles3d_validator::{ValidationContext, validate_tile_content};

fuzz_target!(|data: &[u8]| {
    // Whatever the bytes, validation must report issues instead of panicking
    let mut context = ValidationContext::default();
    let _ = validate_tile_content("fuzz", data, &mut context);
});

#![no_main]

use libfuzzer_sys::fuzz_target;
use studio_compositor::engine::{decode_raster, detect};

fuzz_target!(|data: &[u8]| {
    if let Ok((raster, _)) = decode_raster(data) {
        let _ = detect(&raster, 10);
    }
});

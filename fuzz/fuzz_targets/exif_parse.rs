#![no_main]

//! Exercises detect_exif_orientation() on arbitrary data.

use libfuzzer_sys::fuzz_target;
use studio_compositor::engine::detect_exif_orientation;

fuzz_target!(|data: &[u8]| {
    if let Some(orientation) = detect_exif_orientation(data) {
        assert!((1..=8).contains(&orientation));
    }
});

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use studio_compositor::engine::{apply_watermark, RasterImage};
use studio_compositor::ops::WatermarkSpec;

#[derive(Arbitrary, Debug)]
struct Input {
    base_w: u8,
    base_h: u8,
    mark_w: u8,
    mark_h: u8,
    x_percent: f64,
    y_percent: f64,
    size_percent: f64,
    opacity: f64,
    mark_alpha: u8,
}

fuzz_target!(|input: Input| {
    let (bw, bh) = (u32::from(input.base_w) + 1, u32::from(input.base_h) + 1);
    let (mw, mh) = (u32::from(input.mark_w) + 1, u32::from(input.mark_h) + 1);
    let (Ok(base), Ok(mark)) = (
        RasterImage::filled(bw, bh, [0, 0, 0, 255]),
        RasterImage::filled(mw, mh, [255, 255, 255, input.mark_alpha]),
    ) else {
        return;
    };
    let spec = WatermarkSpec {
        x_percent: input.x_percent,
        y_percent: input.y_percent,
        size_percent: input.size_percent,
        opacity: input.opacity,
        ..Default::default()
    };
    if let Ok(out) = apply_watermark(&base, &mark, &spec) {
        assert_eq!(out.dimensions(), (bw, bh));
    }
});

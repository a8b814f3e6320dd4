#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use studio_compositor::engine::{composite_raster, place, Limits, RasterImage};
use studio_compositor::ops::{
    BackdropSpec, CanvasSpec, CompositeOptions, OutputFormat, PaddingSpec, PlacementPolicy, Rgb,
};

#[derive(Arbitrary, Debug)]
struct Input {
    subject_w: u8,
    subject_h: u8,
    canvas_w: u16,
    canvas_h: u16,
    padding: [f64; 4],
    threshold: u8,
    photo_backdrop: bool,
    alphas: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let padding = PaddingSpec::new(
        input.padding[0],
        input.padding[1],
        input.padding[2],
        input.padding[3],
    );

    // Pure geometry over the full input range: either rejected or contained.
    for policy in [PlacementPolicy::FloorAligned, PlacementPolicy::Centered] {
        let sw = u32::from(input.subject_w);
        let sh = u32::from(input.subject_h);
        let cw = u32::from(input.canvas_w);
        let ch = u32::from(input.canvas_h);
        if let Ok(g) = place(sw, sh, cw, ch, &padding, policy) {
            let rect = g.to_pixel_rect(cw, ch);
            assert!(rect.x + rect.width <= cw && rect.y + rect.height <= ch);
        }
    }

    // Keep the canvas small so each run stays fast.
    let (w, h) = (
        u32::from(input.subject_w % 64) + 1,
        u32::from(input.subject_h % 64) + 1,
    );
    let alphas = if input.alphas.is_empty() { vec![255] } else { input.alphas };
    let pixels: Vec<u8> = (0..(w * h) as usize)
        .flat_map(|i| [(i % 251) as u8, 40, 90, alphas[i % alphas.len()]])
        .collect();
    let Ok(subject) = RasterImage::new(w, h, pixels) else {
        return;
    };

    let backdrop = if input.photo_backdrop {
        match RasterImage::filled(7, 5, [10, 20, 30, 255]) {
            Ok(img) => BackdropSpec::BackgroundImage(img),
            Err(_) => return,
        }
    } else {
        BackdropSpec::SolidColor(Rgb::WHITE)
    };
    let options = CompositeOptions {
        canvas: CanvasSpec::new(
            u32::from(input.canvas_w % 256),
            u32::from(input.canvas_h % 256),
            0.9,
        ),
        padding,
        format: OutputFormat::Png,
        alpha_threshold: input.threshold,
    };
    if let Ok(out) = composite_raster(&subject, &backdrop, &options, &Limits::default()) {
        assert_eq!(
            out.image.dimensions(),
            (options.canvas.output_width, options.canvas.output_height)
        );
        assert!(out.image.is_opaque());
    }
});

// src/engine/watermark.rs
//
// Logo/plate overlay: scale the mark relative to the base width, place it by
// percentage offsets from the top-left, blend with a global opacity.

use crate::engine::blend::Canvas;
use crate::engine::common::EngineResult;
use crate::engine::placement::PixelRect;
use crate::engine::raster::RasterImage;
use crate::engine::resample::{proportional_height, resize_window};
use crate::ops::WatermarkSpec;
use tracing::debug;

/// Where and how large the mark is drawn on the base, in base pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatermarkLayout {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// Compute the mark's scaled size and offset. Sizes round to the nearest pixel, minimum 1.
///
/// The size may exceed the base; only the overlapping part is ever resampled.
pub fn watermark_layout(
    base: (u32, u32),
    mark: (u32, u32),
    spec: &WatermarkSpec,
) -> EngineResult<WatermarkLayout> {
    spec.validate()?;
    let (base_w, base_h) = (f64::from(base.0), f64::from(base.1));

    let width = ((base_w * spec.size_percent / 100.0).round() as u32).max(1);
    let height = proportional_height(mark.0, mark.1, width);

    // `as` saturates, so far-off offsets just end up fully clipped.
    let x = (base_w * spec.x_percent / 100.0).round() as i64;
    let y = (base_h * spec.y_percent / 100.0).round() as i64;

    Ok(WatermarkLayout {
        x,
        y,
        width,
        height,
    })
}

impl WatermarkLayout {
    /// Part of the scaled mark that lands on a `base_w x base_h` base, in mark
    /// coordinates. `None` when the mark is entirely off the base.
    pub fn visible_window(&self, base_w: u32, base_h: u32) -> Option<PixelRect> {
        let (x, width) = clip_span(self.x, self.width, base_w)?;
        let (y, height) = clip_span(self.y, self.height, base_h)?;
        Some(PixelRect {
            x,
            y,
            width,
            height,
        })
    }
}

/// Clip `[origin, origin + len)` to `[0, limit)`; returns the offset into the span and its length.
fn clip_span(origin: i64, len: u32, limit: u32) -> Option<(u32, u32)> {
    let start = origin.max(0);
    let end = origin.saturating_add(i64::from(len)).min(i64::from(limit));
    if start >= end {
        return None;
    }
    Some(((start - origin) as u32, (end - start) as u32))
}

/// Overlay `mark` on `base`. The result always has the base's dimensions.
pub fn apply_watermark(
    base: &RasterImage,
    mark: &RasterImage,
    spec: &WatermarkSpec,
) -> EngineResult<RasterImage> {
    let layout = watermark_layout(base.dimensions(), mark.dimensions(), spec)?;
    debug!(
        target: "studio_compositor::watermark",
        base_w = base.width(),
        base_h = base.height(),
        x = layout.x,
        y = layout.y,
        w = layout.width,
        h = layout.height,
        opacity = spec.opacity,
        "placing watermark"
    );

    if spec.opacity == 0.0 {
        return Ok(base.clone());
    }

    let Some(window) = layout.visible_window(base.width(), base.height()) else {
        return Ok(base.clone());
    };
    let visible = resize_window(mark.clone(), layout.width, layout.height, window)?;
    let mut canvas = Canvas::from_raster(base.clone());
    canvas.draw_over(
        &visible,
        layout.x + i64::from(window.x),
        layout.y + i64::from(window.y),
        spec.opacity as f32,
    );
    canvas.into_raster()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn layout_matches_percentages() {
        // 200x100 mark at 15% on a 2000x1000 base
        let layout =
            watermark_layout((2000, 1000), (200, 100), &WatermarkSpec::default()).unwrap();
        assert_eq!(
            layout,
            WatermarkLayout {
                x: 40,
                y: 20,
                width: 300,
                height: 150
            }
        );
    }

    #[test]
    fn tiny_percent_still_draws_one_pixel() {
        let spec = WatermarkSpec {
            size_percent: 0.01,
            ..Default::default()
        };
        let layout = watermark_layout((100, 100), (10, 10), &spec).unwrap();
        assert_eq!((layout.width, layout.height), (1, 1));
    }

    #[test]
    fn rejects_invalid_spec() {
        let spec = WatermarkSpec {
            opacity: -0.5,
            ..Default::default()
        };
        let err = watermark_layout((100, 100), (10, 10), &spec).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn tall_mark_on_short_base_is_clipped() {
        let base = RasterImage::filled(3000, 10, [0, 0, 0, 255]).unwrap();
        let mark = RasterImage::filled(10, 120, [255, 255, 255, 255]).unwrap();
        let spec = WatermarkSpec {
            x_percent: 0.0,
            y_percent: 0.0,
            size_percent: 100.0,
            ..Default::default()
        };
        let layout = watermark_layout(base.dimensions(), mark.dimensions(), &spec).unwrap();
        assert_eq!((layout.width, layout.height), (3000, 36000));
        assert_eq!(
            layout.visible_window(3000, 10),
            Some(PixelRect {
                x: 0,
                y: 0,
                width: 3000,
                height: 10
            })
        );

        let out = apply_watermark(&base, &mark, &spec).unwrap();
        assert_eq!(out.dimensions(), (3000, 10));
        assert!(out.pixels().chunks_exact(4).all(|p| p == [255, 255, 255, 255]));
    }

    #[test]
    fn visible_window_maps_clipped_edges() {
        let layout = WatermarkLayout {
            x: -5,
            y: 45,
            width: 20,
            height: 20,
        };
        assert_eq!(
            layout.visible_window(50, 50),
            Some(PixelRect {
                x: 5,
                y: 0,
                width: 15,
                height: 5
            })
        );
        let off = WatermarkLayout { x: 50, ..layout };
        assert_eq!(off.visible_window(50, 50), None);
    }

    #[test]
    fn output_keeps_base_dimensions_and_blends() {
        let base = RasterImage::filled(200, 100, [0, 0, 0, 255]).unwrap();
        let mark = RasterImage::filled(40, 20, [255, 255, 255, 255]).unwrap();
        let spec = WatermarkSpec {
            x_percent: 10.0,
            y_percent: 10.0,
            size_percent: 20.0,
            opacity: 0.5,
            ..Default::default()
        };
        let out = apply_watermark(&base, &mark, &spec).unwrap();
        assert_eq!(out.dimensions(), (200, 100));

        // Mark is 40x20 at (20, 10); centre pixel is a 50% mix
        let p = out.pixel(40, 20).unwrap();
        assert!((i32::from(p[0]) - 128).abs() <= 1, "{p:?}");
        assert_eq!(p[3], 255);
        assert_eq!(out.pixel(5, 5), Some([0, 0, 0, 255]));
    }

    #[test]
    fn zero_opacity_is_identity() {
        let base = RasterImage::filled(20, 20, [9, 9, 9, 255]).unwrap();
        let mark = RasterImage::filled(4, 4, [255, 0, 0, 255]).unwrap();
        let spec = WatermarkSpec {
            opacity: 0.0,
            ..Default::default()
        };
        assert_eq!(apply_watermark(&base, &mark, &spec).unwrap(), base);
    }

    #[test]
    fn mark_outside_base_is_clipped() {
        let base = RasterImage::filled(50, 50, [0, 0, 0, 255]).unwrap();
        let mark = RasterImage::filled(10, 10, [255, 255, 255, 255]).unwrap();
        let spec = WatermarkSpec {
            x_percent: 90.0,
            y_percent: -10.0,
            size_percent: 40.0,
            ..Default::default()
        };
        // 20x20 mark at (45, -5): visible block is x 45..50, y 0..15
        let out = apply_watermark(&base, &mark, &spec).unwrap();
        assert_eq!(out.dimensions(), (50, 50));
        assert_eq!(out.pixel(49, 0), Some([255, 255, 255, 255]));
        assert_eq!(out.pixel(49, 14), Some([255, 255, 255, 255]));
        assert_eq!(out.pixel(49, 15), Some([0, 0, 0, 255]));
        assert_eq!(out.pixel(44, 0), Some([0, 0, 0, 255]));

        let far = WatermarkSpec {
            x_percent: 1e300,
            ..Default::default()
        };
        assert_eq!(apply_watermark(&base, &mark, &far).unwrap(), base);
    }
}

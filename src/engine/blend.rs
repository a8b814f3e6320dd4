// src/engine/blend.rs
//
// Source-over drawing on straight-alpha RGBA8 and the mutable scratch canvas
// the pipeline draws into. The canvas never leaves the engine; callers get a
// RasterImage back.

use crate::engine::common::EngineResult;
use crate::engine::raster::{RasterImage, CHANNELS};
use rayon::prelude::*;

/// Below this many destination pixels the row loop stays on the calling thread.
const PARALLEL_MIN_PIXELS: u64 = 64 * 1024;

/// `src` over `dst` with straight alpha, `src.a` scaled by `opacity` (clamped to `[0, 1]`).
///
/// `out.a = sa + da(1 - sa)` and `out.rgb = (src.rgb*sa + dst.rgb*da(1 - sa)) / out.a`.
/// On an opaque destination this is `src.rgb*sa + dst.rgb*(1 - sa)`.
#[inline]
pub fn over(dst: [u8; 4], src: [u8; 4], opacity: f32) -> [u8; 4] {
    let op = opacity_to_u8(opacity);
    let sa = mul_div255(u32::from(src[3]), op);
    if sa == 0 {
        return dst;
    }
    if sa == 255 {
        return [src[0], src[1], src[2], 255];
    }

    let inv = 255 - sa;
    let da = u32::from(dst[3]);
    // 255 * out.a, kept unrounded so the color division stays exact
    let den = sa * 255 + da * inv;
    if den == 0 {
        return [0; 4];
    }

    let mut out = [0u8; 4];
    for i in 0..3 {
        let num = u32::from(src[i]) * sa * 255 + u32::from(dst[i]) * da * inv;
        out[i] = ((num + den / 2) / den) as u8;
    }
    out[3] = (sa + mul_div255(da, inv)).min(255) as u8;
    out
}

#[inline]
fn opacity_to_u8(opacity: f32) -> u32 {
    if opacity.is_nan() {
        return 0;
    }
    (opacity.clamp(0.0, 1.0) * 255.0).round() as u32
}

#[inline]
fn mul_div255(x: u32, y: u32) -> u32 {
    (x * y + 127) / 255
}

/// Mutable RGBA8 drawing surface.
pub(crate) struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    /// Canvas filled with `rgba`. The buffer is reserved fallibly.
    pub(crate) fn new(width: u32, height: u32, rgba: [u8; 4]) -> EngineResult<Self> {
        let raster = RasterImage::filled(width, height, rgba)?;
        Ok(Self::from_raster(raster))
    }

    /// Take ownership of an existing raster as the starting surface.
    pub(crate) fn from_raster(raster: RasterImage) -> Self {
        let (width, height) = raster.dimensions();
        Self {
            width,
            height,
            pixels: raster.into_pixels(),
        }
    }

    /// Draw `src` with its top-left at `(x, y)`. Parts outside the canvas are clipped.
    pub(crate) fn draw_over(&mut self, src: &RasterImage, x: i64, y: i64, opacity: f32) {
        if opacity_to_u8(opacity) == 0 {
            return;
        }
        let (cw, ch) = (i64::from(self.width), i64::from(self.height));
        let (sw, sh) = (i64::from(src.width()), i64::from(src.height()));

        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = x.saturating_add(sw).min(cw);
        let y1 = y.saturating_add(sh).min(ch);
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        // Offsets into src for the first visible column/row.
        let src_x = (x0 - x) as usize;
        let src_y = (y0 - y) as u32;
        let span = (x1 - x0) as usize * CHANNELS;
        let dst_col = x0 as usize * CHANNELS;

        let stride = self.width as usize * CHANNELS;
        let rows = &mut self.pixels[y0 as usize * stride..y1 as usize * stride];

        let blend_row = |(i, dst_row): (usize, &mut [u8])| {
            let src_row = &src.row(src_y + i as u32)[src_x * CHANNELS..src_x * CHANNELS + span];
            let dst_row = &mut dst_row[dst_col..dst_col + span];
            for (d, s) in dst_row
                .chunks_exact_mut(CHANNELS)
                .zip(src_row.chunks_exact(CHANNELS))
            {
                let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]], opacity);
                d.copy_from_slice(&out);
            }
        };

        let visible = ((x1 - x0) * (y1 - y0)) as u64;
        if visible >= PARALLEL_MIN_PIXELS {
            rows.par_chunks_mut(stride).enumerate().for_each(blend_row);
        } else {
            rows.chunks_mut(stride).enumerate().for_each(blend_row);
        }
    }

    pub(crate) fn into_raster(self) -> EngineResult<RasterImage> {
        RasterImage::new(self.width, self.height, self.pixels)
    }
}

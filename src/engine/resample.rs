// src/engine/resample.rs
//
// RGBA8 scaling on fast_image_resize with alpha premultiplication,
// falling back to image::imageops when fir rejects the buffer.

use crate::engine::common::EngineResult;
use crate::engine::placement::PixelRect;
use crate::engine::raster::RasterImage;
use crate::error::CompositorError;
use fast_image_resize::{self as fir, ImageBufferError, MulDiv, PixelType, ResizeOptions};
use image::{imageops::FilterType, RgbaImage};
use tracing::debug;

/// Skip the opacity scan below this size; premultiplying small images is cheaper than checking.
const OPAQUE_SCAN_MIN_PIXELS: u64 = 1_000_000;

fn default_resize_options() -> ResizeOptions {
    ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3))
}

/// Resize to exactly `dst_width x dst_height`, ignoring the source aspect ratio.
///
/// Takes ownership so fir can read the pixel buffer without a copy.
pub fn resize_exact(src: RasterImage, dst_width: u32, dst_height: u32) -> EngineResult<RasterImage> {
    if src.dimensions() == (dst_width, dst_height) {
        return Ok(src);
    }
    resize_cropped(src, None, dst_width, dst_height)
}

/// Resample only `window` out of the `full_width x full_height` scaling of `src`.
///
/// The result is `window.width x window.height`. Callers that clip most of a scaled
/// image use this so the clipped pixels are never allocated.
pub(crate) fn resize_window(
    src: RasterImage,
    full_width: u32,
    full_height: u32,
    window: PixelRect,
) -> EngineResult<RasterImage> {
    let (src_width, src_height) = src.dimensions();
    if full_width == 0
        || full_height == 0
        || window.width == 0
        || window.height == 0
        || u64::from(window.x) + u64::from(window.width) > u64::from(full_width)
        || u64::from(window.y) + u64::from(window.height) > u64::from(full_height)
    {
        return Err(CompositorError::resize_failed(
            (src_width, src_height),
            (window.width, window.height),
            format!("window {window:?} outside {full_width}x{full_height} target"),
        ));
    }
    if (window.x, window.y, window.width, window.height) == (0, 0, full_width, full_height) {
        return resize_exact(src, full_width, full_height);
    }

    let sx = f64::from(src_width) / f64::from(full_width);
    let sy = f64::from(src_height) / f64::from(full_height);
    let left = f64::from(window.x) * sx;
    let top = f64::from(window.y) * sy;
    // Clamp so float error never pushes the box past the source edge.
    let crop = SourceCrop {
        left,
        top,
        width: (f64::from(window.width) * sx).min(f64::from(src_width) - left),
        height: (f64::from(window.height) * sy).min(f64::from(src_height) - top),
    };
    resize_cropped(src, Some(crop), window.width, window.height)
}

/// Region of the source, in source pixels, that maps onto the whole destination.
#[derive(Clone, Copy, Debug)]
struct SourceCrop {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
}

fn resize_cropped(
    src: RasterImage,
    crop: Option<SourceCrop>,
    dst_width: u32,
    dst_height: u32,
) -> EngineResult<RasterImage> {
    let (src_width, src_height) = src.dimensions();
    if dst_width == 0 || dst_height == 0 {
        return Err(CompositorError::resize_failed(
            (src_width, src_height),
            (dst_width, dst_height),
            "invalid dimensions for resize",
        ));
    }

    let opaque = is_fully_opaque(&src);
    let mut pixels = src.into_pixels();
    let mut options = default_resize_options();
    if let Some(c) = crop {
        options = options.crop(c.left, c.top, c.width, c.height);
    }

    // fir never writes through `pixels`; the fallback below gets them straight-alpha.
    let primary = match fir::images::Image::from_slice_u8(
        src_width,
        src_height,
        pixels.as_mut_slice(),
        PixelType::U8x4,
    ) {
        Ok(image) => resize_with_source_image(&image, opaque, dst_width, dst_height, &options),
        Err(ImageBufferError::InvalidBufferAlignment) => {
            let aligned = copy_pixels_to_aligned_image(src_width, src_height, &pixels)?;
            resize_with_source_image(&aligned, opaque, dst_width, dst_height, &options)
        }
        Err(other) => Err(format!("fir source image error: {other:?}")),
    };

    let resized = match primary {
        Ok(buf) => buf,
        Err(err) => {
            debug!(target: "studio_compositor::resample", %err, "fir failed, using image crate");
            resize_with_image_crate_fallback(
                pixels,
                (src_width, src_height),
                crop,
                dst_width,
                dst_height,
            )
            .map_err(|fallback| {
                CompositorError::resize_failed(
                    (src_width, src_height),
                    (dst_width, dst_height),
                    format!("{err}; image crate fallback failed: {fallback}"),
                )
            })?
        }
    };

    RasterImage::new(dst_width, dst_height, resized)
}

/// Scale uniformly so the width becomes `dst_width`; height keeps the aspect ratio,
/// rounded to the nearest pixel and at least 1.
pub fn resize_to_width(src: RasterImage, dst_width: u32) -> EngineResult<RasterImage> {
    let dst_height = proportional_height(src.width(), src.height(), dst_width);
    resize_exact(src, dst_width, dst_height)
}

pub(crate) fn proportional_height(src_width: u32, src_height: u32, dst_width: u32) -> u32 {
    let h = f64::from(dst_width) * f64::from(src_height) / f64::from(src_width);
    (h.round() as u32).max(1)
}

fn is_fully_opaque(src: &RasterImage) -> bool {
    let (w, h) = src.dimensions();
    if u64::from(w) * u64::from(h) < OPAQUE_SCAN_MIN_PIXELS {
        return false;
    }
    src.is_opaque()
}

fn copy_pixels_to_aligned_image(
    width: u32,
    height: u32,
    src_pixels: &[u8],
) -> EngineResult<fir::images::Image<'static>> {
    let mut aligned = fir::images::Image::new(width, height, PixelType::U8x4);
    let buffer = aligned.buffer_mut();
    if buffer.len() != src_pixels.len() {
        return Err(CompositorError::resize_failed(
            (width, height),
            (width, height),
            format!(
                "fir alignment fallback buffer mismatch. expected {} bytes, got {} bytes",
                src_pixels.len(),
                buffer.len()
            ),
        ));
    }
    buffer.copy_from_slice(src_pixels);
    Ok(aligned)
}

fn resize_with_source_image(
    src_image: &fir::images::Image<'_>,
    opaque: bool,
    dst_width: u32,
    dst_height: u32,
    options: &ResizeOptions,
) -> Result<Vec<u8>, String> {
    let mut dst_image = fir::images::Image::new(dst_width, dst_height, PixelType::U8x4);
    let mut resizer = fir::Resizer::new();

    if opaque {
        resizer
            .resize(src_image, &mut dst_image, options)
            .map_err(|e| format!("fir resize error: {e:?}"))?;
        return Ok(dst_image.into_vec());
    }

    // Premultiply into scratch so the source buffer stays straight-alpha.
    let mul_div = MulDiv::default();
    let mut premultiplied =
        fir::images::Image::new(src_image.width(), src_image.height(), PixelType::U8x4);
    mul_div
        .multiply_alpha(src_image, &mut premultiplied)
        .map_err(|e| format!("failed to premultiply alpha: {e}"))?;
    resizer
        .resize(&premultiplied, &mut dst_image, options)
        .map_err(|e| format!("fir resize error: {e:?}"))?;
    mul_div
        .divide_alpha_inplace(&mut dst_image)
        .map_err(|e| format!("failed to unpremultiply alpha: {e}"))?;

    Ok(dst_image.into_vec())
}

/// Expects straight-alpha `src_pixels`; imageops filters them as they are.
fn resize_with_image_crate_fallback(
    src_pixels: Vec<u8>,
    (src_width, src_height): (u32, u32),
    crop: Option<SourceCrop>,
    dst_width: u32,
    dst_height: u32,
) -> Result<Vec<u8>, String> {
    let rgba = RgbaImage::from_raw(src_width, src_height, src_pixels)
        .ok_or_else(|| "failed to build rgba image for fallback resize".to_string())?;
    let Some(c) = crop else {
        return Ok(image::imageops::resize(&rgba, dst_width, dst_height, FilterType::Lanczos3)
            .into_raw());
    };
    // Whole-pixel box enclosing the fractional crop.
    let left = (c.left.floor().max(0.0) as u32).min(src_width - 1);
    let top = (c.top.floor().max(0.0) as u32).min(src_height - 1);
    let right = ((c.left + c.width).ceil() as u32).clamp(left + 1, src_width);
    let bottom = ((c.top + c.height).ceil() as u32).clamp(top + 1, src_height);
    let view = image::imageops::crop_imm(&rgba, left, top, right - left, bottom - top).to_image();
    Ok(image::imageops::resize(&view, dst_width, dst_height, FilterType::Lanczos3).into_raw())
}

// src/engine/encoder.rs
//
// Output encoding: JPEG (mozjpeg), PNG (image + oxipng), WebP (libwebp).

use crate::engine::common::{run_with_panic_policy, EngineResult};
use crate::engine::raster::{RasterImage, CHANNELS};
use crate::engine::MAX_DIMENSION;
use crate::error::CompositorError;
use crate::ops::OutputFormat;
use image::ImageFormat;
use mozjpeg::{ColorSpace, Compress, ScanMode};
use std::io::Cursor;

/// Derives per-format encoder tuning from a 1..=100 quality value.
/// Bands: High (>=85), Balanced (70-84), Fast (50-69), Fastest (<50).
#[derive(Debug, Clone, Copy)]
pub struct QualitySettings {
    quality: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QualityBand {
    High,
    Balanced,
    Fast,
    Fastest,
}

impl QualitySettings {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: f32::from(quality.clamp(1, 100)),
        }
    }

    pub fn quality(&self) -> f32 {
        self.quality
    }

    fn band(&self) -> QualityBand {
        if self.quality >= 85.0 {
            QualityBand::High
        } else if self.quality >= 70.0 {
            QualityBand::Balanced
        } else if self.quality >= 50.0 {
            QualityBand::Fast
        } else {
            QualityBand::Fastest
        }
    }

    /// mozjpeg smoothing factor; low-quality output hides blocking better smoothed.
    pub fn jpeg_smoothing(&self) -> u8 {
        match self.band() {
            QualityBand::High => 0,
            QualityBand::Balanced => 5,
            QualityBand::Fast => 10,
            QualityBand::Fastest => 18,
        }
    }

    pub fn webp_sns_strength(&self) -> i32 {
        match self.band() {
            QualityBand::High => 50,
            QualityBand::Balanced => 70,
            QualityBand::Fast | QualityBand::Fastest => 80,
        }
    }

    pub fn webp_filter_strength(&self) -> i32 {
        if self.quality >= 80.0 {
            20
        } else if self.quality >= 60.0 {
            30
        } else {
            40
        }
    }

    pub fn webp_filter_sharpness(&self) -> i32 {
        match self.band() {
            QualityBand::High => 2,
            QualityBand::Balanced | QualityBand::Fast | QualityBand::Fastest => 0,
        }
    }
}

/// Encode `img` as `format`. `quality` (1..=100) applies to JPEG and WebP only.
pub fn encode(img: &RasterImage, format: OutputFormat, quality: u8) -> EngineResult<Vec<u8>> {
    let (w, h) = img.dimensions();
    if w > MAX_DIMENSION || h > MAX_DIMENSION {
        return Err(CompositorError::dimension_exceeds_limit(
            w.max(h),
            MAX_DIMENSION,
        ));
    }
    match format {
        OutputFormat::Jpeg => encode_jpeg(img, quality),
        OutputFormat::Png => encode_png(img),
        OutputFormat::WebP => encode_webp(img, quality),
    }
}

/// RGB bytes for formats without alpha. Translucent pixels are flattened onto black.
fn flatten_to_rgb(img: &RasterImage) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(img.pixels().len() / CHANNELS * 3);
    for p in img.pixels().chunks_exact(CHANNELS) {
        let a = u32::from(p[3]);
        if a == 255 {
            rgb.extend_from_slice(&p[..3]);
        } else {
            rgb.extend(p[..3].iter().map(|&c| ((u32::from(c) * a + 127) / 255) as u8));
        }
    }
    rgb
}

/// Encode to JPEG using mozjpeg: progressive, optimized Huffman coding, 4:2:0 chroma.
pub fn encode_jpeg(img: &RasterImage, quality: u8) -> EngineResult<Vec<u8>> {
    run_with_panic_policy("encode:jpeg", || {
        let settings = QualitySettings::new(quality);
        let (w, h) = img.dimensions();
        let pixels = flatten_to_rgb(img);

        let mut comp = Compress::new(ColorSpace::JCS_RGB);
        comp.set_size(w as usize, h as usize);
        comp.set_color_space(ColorSpace::JCS_YCbCr);
        comp.set_quality(settings.quality());
        comp.set_chroma_sampling_pixel_sizes((2, 2), (2, 2));
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);
        comp.set_optimize_scans(true);
        comp.set_scan_optimization_mode(ScanMode::AllComponentsTogether);
        comp.set_smoothing_factor(settings.jpeg_smoothing());

        let estimated_size = (w as usize * h as usize * 3 / 10).max(4096);
        let mut output = Vec::with_capacity(estimated_size);
        {
            let mut writer = comp.start_compress(&mut output).map_err(|e| {
                CompositorError::encode_failed(
                    "jpeg",
                    format!("mozjpeg: failed to start compress: {e:?}"),
                )
            })?;
            for row in pixels.chunks(w as usize * 3) {
                writer.write_scanlines(row).map_err(|e| {
                    CompositorError::encode_failed(
                        "jpeg",
                        format!("mozjpeg: failed to write scanlines: {e:?}"),
                    )
                })?;
            }
            writer.finish().map_err(|e| {
                CompositorError::encode_failed("jpeg", format!("mozjpeg: failed to finish: {e:?}"))
            })?;
        }
        Ok(output)
    })
}

/// Encode to PNG with the image crate, then recompress losslessly with oxipng.
/// Alpha is kept; fully opaque images are written as RGB.
pub fn encode_png(img: &RasterImage) -> EngineResult<Vec<u8>> {
    run_with_panic_policy("encode:png", || {
        let dynamic = if img.is_opaque() {
            image::DynamicImage::ImageRgb8(
                image::RgbImage::from_raw(img.width(), img.height(), flatten_to_rgb(img))
                    .ok_or_else(|| {
                        CompositorError::encode_failed("png", "rgb buffer size mismatch")
                    })?,
            )
        } else {
            img.clone().into_dynamic()
        };

        let mut buf = Vec::new();
        dynamic
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| CompositorError::encode_failed("png", format!("PNG encode failed: {e}")))?;

        let mut options = oxipng::Options::from_preset(2);
        options.strip = oxipng::StripChunks::Safe;
        oxipng::optimize_from_memory(&buf, &options).map_err(|e| {
            CompositorError::encode_failed("png", format!("oxipng optimization failed: {e}"))
        })
    })
}

/// Encode to lossy WebP. Alpha is written only when the image has translucent pixels.
pub fn encode_webp(img: &RasterImage, quality: u8) -> EngineResult<Vec<u8>> {
    run_with_panic_policy("encode:webp", || {
        let (w, h) = img.dimensions();
        let rgb;
        let encoder = if img.is_opaque() {
            rgb = flatten_to_rgb(img);
            webp::Encoder::from_rgb(&rgb, w, h)
        } else {
            webp::Encoder::from_rgba(img.pixels(), w, h)
        };

        let mut config = webp::WebPConfig::new()
            .map_err(|_| CompositorError::internal_panic("failed to create WebPConfig"))?;
        let settings = QualitySettings::new(quality);
        config.quality = settings.quality();
        config.method = 4;
        config.pass = 1;
        config.preprocessing = 0;
        config.sns_strength = settings.webp_sns_strength();
        config.autofilter = 1;
        config.filter_strength = settings.webp_filter_strength();
        config.filter_sharpness = settings.webp_filter_sharpness();

        let mem = encoder.encode_advanced(&config).map_err(|e| {
            CompositorError::encode_failed("webp", format!("WebP encode failed: {e:?}"))
        })?;
        Ok(mem.to_vec())
    })
}

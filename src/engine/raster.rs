// src/engine/raster.rs
//
// RGBA8 raster and the inclusive bounding box computed against it.

use crate::engine::common::EngineResult;
use crate::error::CompositorError;
use image::{DynamicImage, RgbaImage};
use std::fmt;

/// Bytes per RGBA8 pixel.
pub const CHANNELS: usize = 4;

/// Row-major RGBA8 image with straight (non-premultiplied) alpha.
///
/// `pixels.len() == width * height * 4` and both dimensions are at least 1.
/// Stages never mutate an input raster; they return a new one.
#[derive(Clone, PartialEq, Eq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RasterImage {
    /// Wrap an existing pixel buffer, validating its length.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> EngineResult<Self> {
        if width == 0 || height == 0 {
            return Err(CompositorError::invalid_dimensions(
                width,
                height,
                "raster dimensions must be at least 1x1",
            ));
        }
        let expected = buffer_len(width, height)?;
        if pixels.len() != expected {
            return Err(CompositorError::invalid_dimensions(
                width,
                height,
                format!(
                    "pixel buffer has {} bytes, expected {expected}",
                    pixels.len()
                ),
            ));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// A raster where every pixel is `rgba`. Allocation failure is reported, not aborted on.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> EngineResult<Self> {
        if width == 0 || height == 0 {
            return Err(CompositorError::invalid_dimensions(
                width,
                height,
                "raster dimensions must be at least 1x1",
            ));
        }
        let len = buffer_len(width, height)?;
        let mut pixels = try_alloc(width, height)?;
        while pixels.len() < len {
            pixels.extend_from_slice(&rgba);
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn from_rgba_image(img: RgbaImage) -> EngineResult<Self> {
        let (w, h) = img.dimensions();
        Self::new(w, h, img.into_raw())
    }

    /// Convert any decoded image to RGBA8. Grayscale and RGB inputs become opaque.
    pub fn from_dynamic(img: DynamicImage) -> EngineResult<Self> {
        Self::from_rgba_image(img.into_rgba8())
    }

    pub fn into_rgba_image(self) -> RgbaImage {
        let (w, h) = (self.width, self.height);
        // Length is an invariant of RasterImage, so from_raw cannot fail here.
        RgbaImage::from_raw(w, h, self.pixels)
            .unwrap_or_else(|| RgbaImage::new(w, h))
    }

    pub fn into_dynamic(self) -> DynamicImage {
        DynamicImage::ImageRgba8(self.into_rgba_image())
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.width as usize * CHANNELS
    }

    /// One row of RGBA bytes. Panics if `y >= height`.
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.stride();
        let start = y as usize * stride;
        &self.pixels[start..start + stride]
    }

    /// RGBA at `(x, y)`, or `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * CHANNELS;
        Some([
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ])
    }

    /// True when every pixel has alpha 255.
    pub fn is_opaque(&self) -> bool {
        self.pixels.chunks_exact(CHANNELS).all(|p| p[3] == u8::MAX)
    }
}

// Pixel buffers can be tens of megabytes; keep Debug output to the header.
impl fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Byte length of a `width x height` RGBA8 buffer, checked for overflow.
pub(crate) fn buffer_len(width: u32, height: u32) -> EngineResult<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|p| p.checked_mul(CHANNELS))
        .ok_or_else(|| {
            CompositorError::allocation_failed(width, height, u64::MAX)
        })
}

/// Empty buffer with capacity reserved for `width x height` RGBA8 pixels.
pub(crate) fn try_alloc(width: u32, height: u32) -> EngineResult<Vec<u8>> {
    let len = buffer_len(width, height)?;
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| CompositorError::allocation_failed(width, height, len as u64))?;
    Ok(buf)
}

/// Inclusive pixel rectangle `[min_x, max_x] x [min_y, max_y]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl BoundingBox {
    pub fn new(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Box covering the whole image.
    pub fn full(image: &RasterImage) -> Self {
        Self::new(0, 0, image.width() - 1, image.height() - 1)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    /// True when `min <= max` on both axes and the box lies inside `image`.
    pub fn fits(&self, image: &RasterImage) -> bool {
        self.min_x <= self.max_x
            && self.min_y <= self.max_y
            && self.max_x < image.width()
            && self.max_y < image.height()
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_y..=self.max_y).contains(&y)
    }
}

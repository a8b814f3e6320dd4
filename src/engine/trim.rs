// src/engine/trim.rs
//
// Alpha bounding-box detection and content cropping.
//
// A pixel counts as content when its alpha is strictly greater than the
// threshold. The default threshold ignores the faint halo that background
// removal leaves around a cut-out.

use crate::engine::common::EngineResult;
use crate::engine::raster::{try_alloc, BoundingBox, RasterImage, CHANNELS};
use crate::error::CompositorError;

/// Alpha at or below this value is treated as background.
pub const DEFAULT_ALPHA_THRESHOLD: u8 = 10;

/// Smallest box containing every pixel with `alpha > alpha_threshold`.
///
/// Returns `None` when no such pixel exists. Single pass over the image.
pub fn detect(image: &RasterImage, alpha_threshold: u8) -> Option<BoundingBox> {
    let is_content = move |p: &[u8]| p[3] > alpha_threshold;

    let mut bbox: Option<BoundingBox> = None;
    for (y, row) in image.pixels().chunks_exact(image.stride()).enumerate() {
        // Leftmost hit decides min_x for this row, rightmost decides max_x.
        let Some(first) = row.chunks_exact(CHANNELS).position(is_content) else {
            continue;
        };
        let last = row
            .chunks_exact(CHANNELS)
            .rposition(is_content)
            .unwrap_or(first);
        let (first, last, y) = (first as u32, last as u32, y as u32);

        bbox = Some(match bbox {
            None => BoundingBox::new(first, y, last, y),
            Some(b) => BoundingBox::new(b.min_x.min(first), b.min_y, b.max_x.max(last), y),
        });
    }
    bbox
}

/// [`detect`] with [`DEFAULT_ALPHA_THRESHOLD`].
pub fn detect_default(image: &RasterImage) -> Option<BoundingBox> {
    detect(image, DEFAULT_ALPHA_THRESHOLD)
}

/// Byte-exact copy of the pixels inside `bbox`.
///
/// Fails with `InvalidDimensions` when the box is inverted or extends past the image.
pub fn crop(image: &RasterImage, bbox: &BoundingBox) -> EngineResult<RasterImage> {
    if !bbox.fits(image) {
        return Err(CompositorError::invalid_dimensions(
            image.width(),
            image.height(),
            format!(
                "crop box ({}, {})..=({}, {}) is outside the image",
                bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y
            ),
        ));
    }
    if *bbox == BoundingBox::full(image) {
        return Ok(image.clone());
    }

    let (w, h) = (bbox.width(), bbox.height());
    let mut out = try_alloc(w, h)?;
    let start = bbox.min_x as usize * CHANNELS;
    let end = start + w as usize * CHANNELS;
    for y in bbox.min_y..=bbox.max_y {
        out.extend_from_slice(&image.row(y)[start..end]);
    }
    RasterImage::new(w, h, out)
}

/// Result of [`trim`].
#[derive(Debug, Clone)]
pub struct Trimmed {
    pub image: RasterImage,
    /// Detected content box, or `None` when the input had no content pixel.
    pub bbox: Option<BoundingBox>,
}

impl Trimmed {
    /// True when nothing exceeded the threshold and `image` is the uncropped input.
    pub fn fully_transparent(&self) -> bool {
        self.bbox.is_none()
    }
}

/// Detect then crop. A fully transparent input comes back unchanged.
pub fn trim(image: &RasterImage, alpha_threshold: u8) -> EngineResult<Trimmed> {
    match detect(image, alpha_threshold) {
        Some(bbox) => Ok(Trimmed {
            image: crop(image, &bbox)?,
            bbox: Some(bbox),
        }),
        None => Ok(Trimmed {
            image: image.clone(),
            bbox: None,
        }),
    }
}

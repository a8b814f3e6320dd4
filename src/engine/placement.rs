// src/engine/placement.rs
//
// Aspect-fit placement of the trimmed subject inside the padded canvas.

use crate::engine::common::EngineResult;
use crate::error::CompositorError;
use crate::ops::{PaddingSpec, PlacementPolicy};

/// Destination rectangle for the subject, in canvas pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Geometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Integer drawing rectangle derived from a [`Geometry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    /// Round to whole pixels, keep at least 1x1 and stay inside the canvas.
    pub fn to_pixel_rect(&self, canvas_w: u32, canvas_h: u32) -> PixelRect {
        let width = (self.width.round() as u32).clamp(1, canvas_w.max(1));
        let height = (self.height.round() as u32).clamp(1, canvas_h.max(1));
        let x = (self.x.round().max(0.0) as u32).min(canvas_w.saturating_sub(width));
        let y = (self.y.round().max(0.0) as u32).min(canvas_h.saturating_sub(height));
        PixelRect {
            x,
            y,
            width,
            height,
        }
    }

    pub fn aspect(&self) -> f64 {
        self.width / self.height
    }
}

/// Fit a `subject_w x subject_h` subject into the canvas minus padding.
///
/// The subject fills the available width unless that would overflow the available
/// height, in which case it fills the height. Horizontally it is centered on the
/// full canvas. Vertically, `FloorAligned` rests it on the bottom-padding line and
/// `Centered` centers it on the full canvas height.
pub fn place(
    subject_w: u32,
    subject_h: u32,
    canvas_w: u32,
    canvas_h: u32,
    padding: &PaddingSpec,
    policy: PlacementPolicy,
) -> EngineResult<Geometry> {
    if subject_w == 0 || subject_h == 0 {
        return Err(CompositorError::invalid_dimensions(
            subject_w,
            subject_h,
            "subject must be at least 1x1",
        ));
    }
    if canvas_w == 0 || canvas_h == 0 {
        return Err(CompositorError::invalid_dimensions(
            canvas_w,
            canvas_h,
            "canvas must be at least 1x1",
        ));
    }
    padding.validate()?;

    let (canvas_w, canvas_h) = (f64::from(canvas_w), f64::from(canvas_h));
    let avail_w = canvas_w * (1.0 - padding.left - padding.right);
    let avail_h = canvas_h * (1.0 - padding.top - padding.bottom);
    let aspect = f64::from(subject_w) / f64::from(subject_h);

    let (mut width, mut height) = (avail_w, avail_w / aspect);
    if height > avail_h {
        height = avail_h;
        width = height * aspect;
    }

    let x = (canvas_w - width) / 2.0;
    let y = match policy {
        PlacementPolicy::FloorAligned => canvas_h * (1.0 - padding.bottom) - height,
        PlacementPolicy::Centered => (canvas_h - height) / 2.0,
    };

    Ok(Geometry {
        x,
        y,
        width,
        height,
    })
}

// src/engine/pipeline.rs
//
// Compositing pipeline: trim the subject, paint the backdrop, place and draw
// the subject, encode.

use crate::engine::blend::Canvas;
use crate::engine::common::EngineResult;
use crate::engine::encoder;
use crate::engine::limits::Limits;
use crate::engine::placement::{place, Geometry, PixelRect};
use crate::engine::raster::{BoundingBox, RasterImage};
use crate::engine::resample::resize_exact;
use crate::engine::trim::trim;
use crate::ops::{BackdropSpec, CompositeOptions, PlacementPolicy};
use std::time::Instant;
use tracing::{debug, warn};

/// Un-encoded pipeline output with the placement diagnostics.
#[derive(Debug, Clone)]
pub struct Composited {
    pub image: RasterImage,
    /// Exact placement before rounding.
    pub geometry: Geometry,
    /// Rectangle the subject was actually drawn into.
    pub rect: PixelRect,
    pub policy: PlacementPolicy,
    /// Content box of the subject, `None` when it had no visible pixel.
    pub trimmed_bbox: Option<BoundingBox>,
}

impl Composited {
    pub fn fully_transparent_subject(&self) -> bool {
        self.trimmed_bbox.is_none()
    }
}

/// Run the pipeline and return the canvas without encoding it.
pub fn composite_raster(
    subject: &RasterImage,
    backdrop: &BackdropSpec,
    options: &CompositeOptions,
    limits: &Limits,
) -> EngineResult<Composited> {
    let started = Instant::now();
    options.validate()?;
    let (canvas_w, canvas_h) = (options.canvas.output_width, options.canvas.output_height);
    // Hard precondition: nothing canvas-sized is allocated before this check.
    limits.enforce_canvas(canvas_w, canvas_h)?;

    let trimmed = trim(subject, options.alpha_threshold)?;
    match trimmed.bbox {
        Some(bbox) => debug!(
            target: "studio_compositor::pipeline",
            width = subject.width(),
            height = subject.height(),
            trimmed_width = bbox.width(),
            trimmed_height = bbox.height(),
            "subject trimmed"
        ),
        None => warn!(
            target: "studio_compositor::pipeline",
            width = subject.width(),
            height = subject.height(),
            threshold = options.alpha_threshold,
            "subject is fully transparent, compositing it uncropped"
        ),
    }

    let mut canvas = match backdrop {
        BackdropSpec::SolidColor(rgb) => Canvas::new(canvas_w, canvas_h, rgb.to_rgba())?,
        BackdropSpec::BackgroundImage(image) => {
            Canvas::from_raster(resize_exact(image.clone(), canvas_w, canvas_h)?)
        }
    };
    limits.enforce_timeout(started, "backdrop")?;

    let policy = backdrop.placement_policy();
    let geometry = place(
        trimmed.image.width(),
        trimmed.image.height(),
        canvas_w,
        canvas_h,
        &options.padding,
        policy,
    )?;
    let rect = geometry.to_pixel_rect(canvas_w, canvas_h);

    let scaled = resize_exact(trimmed.image, rect.width, rect.height)?;
    canvas.draw_over(&scaled, i64::from(rect.x), i64::from(rect.y), 1.0);
    limits.enforce_timeout(started, "compose")?;

    debug!(
        target: "studio_compositor::pipeline",
        canvas_w,
        canvas_h,
        x = rect.x,
        y = rect.y,
        w = rect.width,
        h = rect.height,
        ?policy,
        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
        "subject composited"
    );

    Ok(Composited {
        image: canvas.into_raster()?,
        geometry,
        rect,
        policy,
        trimmed_bbox: trimmed.bbox,
    })
}

/// Composite `subject` over `backdrop` and encode with `options.format`.
pub fn composite(
    subject: &RasterImage,
    backdrop: &BackdropSpec,
    options: &CompositeOptions,
    limits: &Limits,
) -> EngineResult<Vec<u8>> {
    let composited = composite_raster(subject, backdrop, options, limits)?;
    let started = Instant::now();
    let bytes = encoder::encode(
        &composited.image,
        options.format,
        options.canvas.encoder_quality(),
    )?;
    debug!(
        target: "studio_compositor::pipeline",
        format = %options.format,
        bytes = bytes.len(),
        encode_ms = started.elapsed().as_secs_f64() * 1000.0,
        "canvas encoded"
    );
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::trim::detect;
    use crate::error::ErrorKind;
    use crate::ops::{CanvasSpec, OutputFormat, PaddingSpec, Rgb};

    /// Opaque red block of `bw x bh` at `(bx, by)` on a transparent `w x h` image.
    fn subject_with_block(w: u32, h: u32, bx: u32, by: u32, bw: u32, bh: u32) -> RasterImage {
        let mut buf = vec![0u8; (w * h * 4) as usize];
        for y in by..by + bh {
            for x in bx..bx + bw {
                let i = ((y * w + x) * 4) as usize;
                buf[i..i + 4].copy_from_slice(&[255, 0, 0, 255]);
            }
        }
        RasterImage::new(w, h, buf).unwrap()
    }

    fn options(w: u32, h: u32) -> CompositeOptions {
        CompositeOptions {
            canvas: CanvasSpec::new(w, h, 0.9),
            padding: PaddingSpec::default(),
            format: OutputFormat::Png,
            alpha_threshold: 10,
        }
    }

    #[test]
    fn solid_backdrop_centers_trimmed_subject() {
        // 60x40 content inside lots of transparent margin
        let subject = subject_with_block(300, 200, 50, 70, 60, 40);
        let backdrop = BackdropSpec::SolidColor(Rgb::WHITE);
        let out = composite_raster(&subject, &backdrop, &options(1000, 1000), &Limits::default())
            .unwrap();

        assert_eq!(out.policy, PlacementPolicy::Centered);
        assert_eq!(out.trimmed_bbox, Some(BoundingBox::new(50, 70, 109, 109)));
        assert_eq!(
            out.rect,
            PixelRect {
                x: 100,
                y: 233,
                width: 800,
                height: 533
            }
        );
        assert_eq!(out.image.dimensions(), (1000, 1000));
        assert_eq!(out.image.pixel(0, 0), Some([255, 255, 255, 255]));
        assert_eq!(out.image.pixel(500, 500), Some([255, 0, 0, 255]));
        assert!(out.image.is_opaque());
    }

    #[test]
    fn photo_backdrop_floor_aligns_and_stretches() {
        let subject = subject_with_block(120, 80, 0, 0, 120, 80);
        let backdrop =
            BackdropSpec::BackgroundImage(RasterImage::filled(50, 20, [0, 0, 200, 255]).unwrap());
        let out = composite_raster(&subject, &backdrop, &options(1000, 1000), &Limits::default())
            .unwrap();

        assert_eq!(out.policy, PlacementPolicy::FloorAligned);
        assert_eq!(out.rect.y + out.rect.height, 900);
        // Backdrop stretched to fill; corners are backdrop blue
        let corner = out.image.pixel(999, 999).unwrap();
        assert!(corner[2] > 190 && corner[0] < 10, "{corner:?}");
        // Subject pixels are drawn above the floor line
        assert_eq!(out.image.pixel(500, 899), Some([255, 0, 0, 255]));
        assert_ne!(out.image.pixel(500, 901), Some([255, 0, 0, 255]));
    }

    #[test]
    fn fully_transparent_subject_falls_back_to_uncropped() {
        let subject = RasterImage::filled(40, 20, [0, 0, 0, 0]).unwrap();
        let backdrop = BackdropSpec::SolidColor(Rgb::new(10, 20, 30));
        let out = composite_raster(&subject, &backdrop, &options(200, 100), &Limits::default())
            .unwrap();
        assert!(out.fully_transparent_subject());
        // Uncropped 2:1 subject fills the available width
        assert_eq!(out.rect.width, 160);
        assert_eq!(out.rect.height, 80);
        // Nothing visible was drawn
        assert!(out
            .image
            .pixels()
            .chunks_exact(4)
            .all(|p| p == [10, 20, 30, 255]));
    }

    #[test]
    fn canvas_cap_is_enforced_before_work() {
        let subject = subject_with_block(4, 4, 0, 0, 4, 4);
        let backdrop = BackdropSpec::SolidColor(Rgb::WHITE);
        let limits = Limits::default().with_canvas_cap(512, 512 * 512);
        let err = composite_raster(&subject, &backdrop, &options(1024, 256), &limits).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AllocationFailed);
    }

    #[test]
    fn invalid_padding_is_rejected() {
        let subject = subject_with_block(4, 4, 0, 0, 4, 4);
        let mut opts = options(100, 100);
        opts.padding = PaddingSpec::new(0.6, 0.4, 0.0, 0.0);
        let err = composite_raster(
            &subject,
            &BackdropSpec::SolidColor(Rgb::WHITE),
            &opts,
            &Limits::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPadding);
    }

    #[test]
    fn composite_encodes_requested_format() {
        let subject = subject_with_block(30, 30, 5, 5, 20, 10);
        let backdrop = BackdropSpec::SolidColor(Rgb::WHITE);
        let mut opts = options(64, 48);

        let png = composite(&subject, &backdrop, &opts, &Limits::default()).unwrap();
        assert_eq!(&png[..4], b"\x89PNG");

        opts.format = OutputFormat::Jpeg;
        let jpeg = composite(&subject, &backdrop, &opts, &Limits::default()).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn drawn_subject_detects_inside_rect() {
        // The subject's visible pixels on a transparent canvas land inside the rect
        let subject = subject_with_block(90, 90, 10, 20, 30, 50);
        let backdrop = BackdropSpec::SolidColor(Rgb::WHITE);
        let out = composite_raster(&subject, &backdrop, &options(320, 240), &Limits::default())
            .unwrap();
        let r = out.rect;
        assert!(r.x + r.width <= 320 && r.y + r.height <= 240);
        assert!(detect(&out.image, 0).is_some());
    }
}

// tests/integration_tests.rs
//
// End-to-end tests through the public API: encoded bytes in, encoded bytes out.

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::Once;
use studio_compositor::engine::{
    composite_batch, composite_raster, decode_raster, detect, BackdropSource, CompositeTask,
    Limits, RasterImage, Source, WatermarkTask,
};
use studio_compositor::error::ErrorKind;
use studio_compositor::ops::{
    BackdropSpec, CanvasSpec, CompositeOptions, OutputFormat, PaddingSpec, PlacementPolicy, Rgb,
    WatermarkSpec,
};
use studio_compositor::{
    inspect_header_from_bytes, CompositeConfig, ProcessingMetrics, WatermarkConfig,
};

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("studio_compositor=debug")
            .with_test_writer()
            .try_init();
    });
}

fn png(img: RgbaImage) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn jpeg(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(image::RgbImage::from_pixel(width, height, image::Rgb(rgb)))
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
        .unwrap();
    buf
}

/// Car-like cut-out: opaque 60x40 body at (20, 30) on a transparent 100x120 frame.
fn cutout() -> RgbaImage {
    RgbaImage::from_fn(100, 120, |x, y| {
        if (20..80).contains(&x) && (30..70).contains(&y) {
            Rgba([255, 0, 0, 255])
        } else if x == 5 && y == 5 {
            // stray matting noise below the threshold
            Rgba([255, 255, 255, 8])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

#[test]
fn studio_photo_scenario() {
    init_tracing();
    let subject = RasterImage::from_rgba_image(cutout()).unwrap();
    assert_eq!(
        detect(&subject, 10).map(|b| (b.min_x, b.min_y, b.max_x, b.max_y)),
        Some((20, 30, 79, 69))
    );

    let (backdrop, _) = decode_raster(&jpeg(64, 36, [40, 40, 40])).unwrap();
    let options = CompositeOptions {
        canvas: CanvasSpec::new(1000, 1000, 0.9),
        padding: PaddingSpec::default(),
        format: OutputFormat::Jpeg,
        alpha_threshold: 10,
    };
    let out = composite_raster(
        &subject,
        &BackdropSpec::BackgroundImage(backdrop),
        &options,
        &Limits::default(),
    )
    .unwrap();

    // 60x40 content fits to 800x533.33 at (100, 366.67)
    assert_eq!(out.policy, PlacementPolicy::FloorAligned);
    assert!((out.geometry.width - 800.0).abs() < 1e-9);
    assert!((out.geometry.height - 533.333).abs() < 1e-2);
    assert!((out.geometry.x - 100.0).abs() < 1e-9);
    assert!((out.geometry.y - 366.667).abs() < 1e-2);
    assert_eq!((out.rect.x, out.rect.y), (100, 367));
    assert_eq!((out.rect.width, out.rect.height), (800, 533));
}

#[test]
fn composite_task_end_to_end_jpeg() {
    init_tracing();
    let task = CompositeTask::new(
        Source::from_bytes(png(cutout())),
        BackdropSource::Image(Source::from_bytes(jpeg(320, 180, [200, 200, 210]))),
        CompositeOptions {
            canvas: CanvasSpec::new(640, 360, 0.85),
            ..CompositeOptions::studio()
        },
    );
    let mut metrics = ProcessingMetrics::default();
    let bytes = task.run_with_metrics(Some(&mut metrics)).unwrap();

    assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    let info = inspect_header_from_bytes(&bytes).unwrap();
    assert_eq!((info.width, info.height), (640, 360));
    assert_eq!(info.format.as_deref(), Some("jpeg"));

    assert_eq!((metrics.output_width, metrics.output_height), (640, 360));
    assert_eq!(metrics.format_out, "jpeg");
    assert!(metrics.total_ms >= metrics.encode_ms);
}

#[test]
fn solid_backdrop_from_config() {
    let config = CompositeConfig::from_json(
        r##"{"outputWidth":300,"outputHeight":200,"format":"png","backgroundColor":"#0a0"}"##,
    )
    .unwrap();
    let color = config.backdrop_color().unwrap();
    assert_eq!(color, Rgb::new(0, 0xaa, 0));
    let options = config.into_options().unwrap();

    let bytes = CompositeTask::new(
        Source::from_bytes(png(cutout())),
        BackdropSource::SolidColor(color),
        options,
    )
    .run()
    .unwrap();
    let (out, format) = decode_raster(&bytes).unwrap();
    assert_eq!(format, Some(ImageFormat::Png));
    assert_eq!(out.dimensions(), (300, 200));
    // Corners keep the backdrop, the centre shows the subject
    assert_eq!(out.pixel(0, 0), Some([0, 0xaa, 0, 255]));
    assert_eq!(out.pixel(299, 199), Some([0, 0xaa, 0, 255]));
    assert_eq!(out.pixel(150, 100), Some([255, 0, 0, 255]));
}

#[test]
fn fully_transparent_subject_still_produces_output() {
    init_tracing();
    let blank = png(RgbaImage::new(40, 30));
    let task = CompositeTask::new(
        Source::from_bytes(blank),
        BackdropSource::SolidColor(Rgb::WHITE),
        CompositeOptions {
            canvas: CanvasSpec::new(80, 60, 0.9),
            format: OutputFormat::Png,
            ..CompositeOptions::default()
        },
    );
    let mut metrics = ProcessingMetrics::default();
    let bytes = task.run_with_metrics(Some(&mut metrics)).unwrap();
    assert!(metrics.fully_transparent_subject);

    let (out, _) = decode_raster(&bytes).unwrap();
    assert!(out
        .pixels()
        .chunks_exact(4)
        .all(|p| p == [255, 255, 255, 255]));
}

#[test]
fn watermark_scenario() {
    let base = png(RgbaImage::from_pixel(2000, 1000, Rgba([0, 0, 0, 255])));
    let mark = png(RgbaImage::from_pixel(200, 100, Rgba([255, 255, 255, 255])));
    let bytes = WatermarkTask::new(
        Source::from_bytes(base),
        Source::from_bytes(mark),
        WatermarkSpec::default(),
    )
    .run()
    .unwrap();

    let (out, format) = decode_raster(&bytes).unwrap();
    assert_eq!(format, Some(ImageFormat::Png));
    assert_eq!(out.dimensions(), (2000, 1000));
    // 300x150 mark at (40, 20)
    assert_eq!(out.pixel(40, 20), Some([255, 255, 255, 255]));
    assert_eq!(out.pixel(339, 169), Some([255, 255, 255, 255]));
    assert_eq!(out.pixel(39, 20), Some([0, 0, 0, 255]));
    assert_eq!(out.pixel(340, 20), Some([0, 0, 0, 255]));
    assert_eq!(out.pixel(40, 170), Some([0, 0, 0, 255]));
}

#[test]
fn watermark_from_config_as_webp() {
    let (spec, format) =
        WatermarkConfig::from_json(r#"{"xPercent":50,"yPercent":50,"opacity":0.5,"format":"webp"}"#)
            .unwrap()
            .into_spec()
            .unwrap();
    let base = jpeg(200, 100, [0, 0, 0]);
    let mark = png(RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 255])));
    let bytes = WatermarkTask::new(Source::from_bytes(base), Source::from_bytes(mark), spec)
        .with_format(format)
        .run()
        .unwrap();
    assert_eq!(&bytes[..4], b"RIFF");
    assert_eq!(&bytes[8..12], b"WEBP");
    let info = inspect_header_from_bytes(&bytes).unwrap();
    assert_eq!((info.width, info.height), (200, 100));
}

#[test]
fn file_sources_and_atomic_output() {
    let dir = tempfile::tempdir().unwrap();
    let subject_path = dir.path().join("subject.png");
    let backdrop_path = dir.path().join("backdrop.jpg");
    std::fs::write(&subject_path, png(cutout())).unwrap();
    std::fs::write(&backdrop_path, jpeg(96, 54, [120, 120, 120])).unwrap();

    let out_path = dir.path().join("out").with_extension(OutputFormat::Png.extension());
    let task = CompositeTask::new(
        Source::from_path(&subject_path).unwrap(),
        BackdropSource::Image(Source::from_path(&backdrop_path).unwrap()),
        CompositeOptions {
            canvas: CanvasSpec::new(192, 108, 0.9),
            format: OutputFormat::Png,
            ..CompositeOptions::default()
        },
    );
    let written = task.run_to_file(&out_path).unwrap();
    let on_disk = std::fs::read(&out_path).unwrap();
    assert_eq!(on_disk.len(), written);
    assert_eq!(inspect_header_from_bytes(&on_disk).unwrap().width, 192);
}

#[test]
fn missing_file_source_is_io_error() {
    let err = Source::from_path("/definitely/not/here/subject.png").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(err.is_recoverable());
}

#[test]
fn batch_runs_independent_requests() {
    let options = CompositeOptions {
        canvas: CanvasSpec::new(120, 90, 0.8),
        format: OutputFormat::WebP,
        ..CompositeOptions::default()
    };
    let tasks: Vec<CompositeTask> = (0..6)
        .map(|i| {
            let subject = if i == 3 {
                Source::from_bytes(b"broken".to_vec())
            } else {
                Source::from_bytes(png(cutout()))
            };
            CompositeTask::new(subject, BackdropSource::SolidColor(Rgb::new(i * 40, 0, 0)), options)
        })
        .collect();

    let results = composite_batch(&tasks);
    assert_eq!(results.len(), 6);
    for (i, result) in results.iter().enumerate() {
        if i == 3 {
            assert_eq!(result.as_ref().unwrap_err().kind(), ErrorKind::DecodeFailed);
        } else {
            let bytes = result.as_ref().unwrap();
            assert_eq!(&bytes[8..12], b"WEBP");
        }
    }
}

#[test]
fn input_pixel_cap_rejects_before_compositing() {
    let limits = Limits {
        max_input_pixels: Some(100 * 100),
        ..Limits::custom()
    };
    let task = CompositeTask::new(
        Source::from_bytes(png(cutout())),
        BackdropSource::SolidColor(Rgb::WHITE),
        CompositeOptions::thumbnail(),
    )
    .with_limits(limits);
    let err = task.run().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LimitExceeded);
    assert!(err.is_recoverable());
}

#[test]
fn presets_run_end_to_end() {
    for name in ["studio", "solid", "listing", "thumbnail"] {
        let options = CompositeOptions::preset(name).unwrap();
        let bytes = CompositeTask::new(
            Source::from_bytes(png(cutout())),
            BackdropSource::SolidColor(Rgb::WHITE),
            options,
        )
        .run()
        .unwrap();
        let info = inspect_header_from_bytes(&bytes).unwrap();
        assert_eq!(
            (info.width, info.height),
            (options.canvas.output_width, options.canvas.output_height),
            "{name}"
        );
    }
}

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use std::hint::black_box;
use studio_compositor::engine::{
    apply_watermark, composite, composite_raster, detect, BackdropSource, CompositeTask, Limits,
    RasterImage, Source,
};
use studio_compositor::ops::{
    BackdropSpec, CanvasSpec, CompositeOptions, OutputFormat, Rgb, WatermarkSpec,
};

/// Transparent frame with an opaque ellipse covering the middle, like a car cut-out.
fn cutout(width: u32, height: u32) -> RasterImage {
    let (cx, cy) = (width as f32 / 2.0, height as f32 * 0.6);
    let (rx, ry) = (width as f32 * 0.35, height as f32 * 0.2);
    let mut buf = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let dx = (x as f32 - cx) / rx;
            let dy = (y as f32 - cy) / ry;
            if dx * dx + dy * dy <= 1.0 {
                buf.extend_from_slice(&[150, 20, 30, 255]);
            } else {
                buf.extend_from_slice(&[0, 0, 0, 0]);
            }
        }
    }
    RasterImage::new(width, height, buf).expect("valid cutout")
}

fn bench_detect(c: &mut Criterion) {
    let mut group = c.benchmark_group("detect");
    for (w, h) in [(1024, 768), (3000, 2000)] {
        let img = cutout(w, h);
        group.bench_with_input(BenchmarkId::from_parameter(format!("{w}x{h}")), &img, |b, img| {
            b.iter(|| detect(black_box(img), 10))
        });
    }
    group.finish();
}

fn bench_composite(c: &mut Criterion) {
    let subject = cutout(2000, 1400);
    let backdrop = RasterImage::filled(1280, 720, [90, 90, 95, 255]).expect("valid backdrop");
    let options = CompositeOptions::studio();

    let mut group = c.benchmark_group("composite");
    group.sample_size(20);
    group.bench_function("raster_solid_1080p", |b| {
        let solid = BackdropSpec::SolidColor(Rgb::WHITE);
        b.iter(|| composite_raster(&subject, &solid, &options, &Limits::default()))
    });
    group.bench_function("raster_photo_1080p", |b| {
        let photo = BackdropSpec::BackgroundImage(backdrop.clone());
        b.iter(|| composite_raster(&subject, &photo, &options, &Limits::default()))
    });
    for format in [OutputFormat::Jpeg, OutputFormat::Png, OutputFormat::WebP] {
        let opts = CompositeOptions { format, ..options };
        group.bench_function(BenchmarkId::new("encoded_solid", format), |b| {
            let solid = BackdropSpec::SolidColor(Rgb::WHITE);
            b.iter(|| composite(&subject, &solid, &opts, &Limits::default()))
        });
    }
    group.finish();
}

fn bench_task(c: &mut Criterion) {
    let png = {
        let mut buf = Vec::new();
        cutout(1200, 800)
            .into_dynamic()
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .expect("encode png");
        buf
    };
    let options = CompositeOptions {
        canvas: CanvasSpec::new(1200, 1200, 0.92),
        ..CompositeOptions::solid()
    };

    c.bench_function("task/decode_composite_encode", |b| {
        b.iter_batched(
            || {
                CompositeTask::new(
                    Source::from_bytes(png.clone()),
                    BackdropSource::SolidColor(Rgb::WHITE),
                    options,
                )
            },
            |task| task.run(),
            BatchSize::SmallInput,
        )
    });
}

fn bench_watermark(c: &mut Criterion) {
    let base = RasterImage::filled(1920, 1080, [20, 20, 20, 255]).expect("valid base");
    let mark = cutout(400, 200);
    let spec = WatermarkSpec {
        opacity: 0.6,
        ..Default::default()
    };
    c.bench_function("watermark/1080p", |b| {
        b.iter(|| apply_watermark(black_box(&base), &mark, &spec))
    });
}

criterion_group!(benches, bench_detect, bench_composite, bench_task, bench_watermark);
criterion_main!(benches);

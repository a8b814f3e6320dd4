// src/engine/tasks.rs
//
// Request tasks. Each task owns its inputs, decodes the two images
// concurrently, runs the synchronous pixel work, and encodes.

use crate::engine::common::{run_with_panic_policy, EngineResult};
use crate::engine::decoder::decode_raster;
use crate::engine::io::{write_file, Source};
use crate::engine::limits::Limits;
use crate::engine::pipeline::composite_raster;
use crate::engine::pool;
use crate::engine::encoder;
use crate::engine::raster::RasterImage;
use crate::engine::watermark::apply_watermark;
use crate::ops::{BackdropSpec, CompositeOptions, OutputFormat, Rgb, WatermarkSpec};
use crate::ProcessingMetrics;
use image::ImageFormat;
use rayon::prelude::*;
use std::path::Path;
use std::time::Instant;
use tracing::debug;

/// Backdrop as supplied by the caller, before decoding.
#[derive(Clone, Debug)]
pub enum BackdropSource {
    SolidColor(Rgb),
    Image(Source),
}

struct MetricsRecorder<'m> {
    metrics: Option<&'m mut ProcessingMetrics>,
    start_total: Instant,
    stage_start: Instant,
}

impl<'m> MetricsRecorder<'m> {
    fn new(metrics: Option<&'m mut ProcessingMetrics>, bytes_in: u64) -> Self {
        let mut metrics = metrics;
        if let Some(m) = metrics.as_deref_mut() {
            m.bytes_in = saturating_u32(bytes_in);
        }
        let now = Instant::now();
        Self {
            metrics,
            start_total: now,
            stage_start: now,
        }
    }

    fn mark_decode_done(&mut self, format_in: Option<ImageFormat>) {
        if let Some(m) = self.metrics.as_deref_mut() {
            m.decode_ms = self.stage_start.elapsed().as_secs_f64() * 1000.0;
            m.format_in = format_in.map(format_name);
            self.stage_start = Instant::now();
        }
    }

    fn mark_compose_done(&mut self, fully_transparent: bool) {
        if let Some(m) = self.metrics.as_deref_mut() {
            m.compose_ms = self.stage_start.elapsed().as_secs_f64() * 1000.0;
            m.fully_transparent_subject = fully_transparent;
            self.stage_start = Instant::now();
        }
    }

    fn finalize(&mut self, dims: (u32, u32), format: OutputFormat, bytes_out: usize) {
        if let Some(m) = self.metrics.as_deref_mut() {
            m.encode_ms = self.stage_start.elapsed().as_secs_f64() * 1000.0;
            m.total_ms = self.start_total.elapsed().as_secs_f64() * 1000.0;
            m.output_width = dims.0;
            m.output_height = dims.1;
            m.format_out = format.as_str().to_string();
            m.bytes_out = saturating_u32(bytes_out as u64);
            m.compression_ratio = if m.bytes_in > 0 {
                f64::from(m.bytes_out) / f64::from(m.bytes_in)
            } else {
                0.0
            };
        }
    }
}

fn saturating_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

fn format_name(format: ImageFormat) -> String {
    format
        .extensions_str()
        .first()
        .map_or_else(|| format!("{format:?}").to_lowercase(), |ext| (*ext).to_string())
}

/// Decode one source after checking it against the input caps.
fn load_raster(source: &Source, limits: &Limits) -> EngineResult<(RasterImage, Option<ImageFormat>)> {
    let bytes = source.bytes()?;
    limits.enforce_source_len(bytes.len())?;
    // Header dimensions are checked first so an over-cap input is never decoded.
    if let Ok(header) = crate::inspect_header_from_bytes(&bytes) {
        limits.enforce_pixels(header.width, header.height)?;
    }
    let (raster, format) = decode_raster(&bytes)?;
    limits.enforce_pixels(raster.width(), raster.height())?;
    Ok((raster, format))
}

fn input_len(sources: &[&Source]) -> u64 {
    sources.iter().map(|s| s.len() as u64).sum()
}

/// One subject-on-backdrop request.
#[derive(Clone, Debug)]
pub struct CompositeTask {
    pub subject: Source,
    pub backdrop: BackdropSource,
    pub options: CompositeOptions,
    pub limits: Limits,
}

impl CompositeTask {
    pub fn new(subject: Source, backdrop: BackdropSource, options: CompositeOptions) -> Self {
        Self {
            subject,
            backdrop,
            options,
            limits: Limits::default(),
        }
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Decode subject and backdrop in parallel. A solid backdrop needs no decode.
    fn decode_inputs(&self) -> EngineResult<((RasterImage, Option<ImageFormat>), BackdropSpec)> {
        let (subject, backdrop) = match &self.backdrop {
            BackdropSource::SolidColor(rgb) => (
                load_raster(&self.subject, &self.limits),
                Ok(BackdropSpec::SolidColor(*rgb)),
            ),
            BackdropSource::Image(source) => rayon::join(
                || load_raster(&self.subject, &self.limits),
                || {
                    load_raster(source, &self.limits)
                        .map(|(img, _)| BackdropSpec::BackgroundImage(img))
                },
            ),
        };
        Ok((subject?, backdrop?))
    }

    pub fn run(&self) -> EngineResult<Vec<u8>> {
        self.run_with_metrics(None)
    }

    pub fn run_with_metrics(&self, metrics: Option<&mut ProcessingMetrics>) -> EngineResult<Vec<u8>> {
        let mut inputs = vec![&self.subject];
        if let BackdropSource::Image(source) = &self.backdrop {
            inputs.push(source);
        }
        let mut recorder = MetricsRecorder::new(metrics, input_len(&inputs));

        let ((subject, format_in), backdrop) = self.decode_inputs()?;
        self.limits.enforce_timeout(recorder.start_total, "decode")?;
        recorder.mark_decode_done(format_in);

        let composited = composite_raster(&subject, &backdrop, &self.options, &self.limits)?;
        self.limits.enforce_timeout(recorder.start_total, "compose")?;
        recorder.mark_compose_done(composited.fully_transparent_subject());

        let bytes = encoder::encode(
            &composited.image,
            self.options.format,
            self.options.canvas.encoder_quality(),
        )?;
        recorder.finalize(composited.image.dimensions(), self.options.format, bytes.len());
        debug!(
            target: "studio_compositor::tasks",
            bytes = bytes.len(),
            total_ms = recorder.start_total.elapsed().as_secs_f64() * 1000.0,
            "composite task finished"
        );
        Ok(bytes)
    }

    /// Run and write the result atomically to `path`. Returns bytes written.
    pub fn run_to_file(&self, path: impl AsRef<Path>) -> EngineResult<usize> {
        let bytes = self.run()?;
        write_file(path, &bytes)
    }
}

/// One watermark request.
#[derive(Clone, Debug)]
pub struct WatermarkTask {
    pub base: Source,
    pub mark: Source,
    pub spec: WatermarkSpec,
    pub format: OutputFormat,
    pub limits: Limits,
}

impl WatermarkTask {
    /// Watermarked output defaults to PNG.
    pub fn new(base: Source, mark: Source, spec: WatermarkSpec) -> Self {
        Self {
            base,
            mark,
            spec,
            format: OutputFormat::Png,
            limits: Limits::default(),
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn run(&self) -> EngineResult<Vec<u8>> {
        self.run_with_metrics(None)
    }

    pub fn run_with_metrics(&self, metrics: Option<&mut ProcessingMetrics>) -> EngineResult<Vec<u8>> {
        self.spec.validate()?;
        let mut recorder = MetricsRecorder::new(metrics, input_len(&[&self.base, &self.mark]));

        let (base, mark) = rayon::join(
            || load_raster(&self.base, &self.limits),
            || load_raster(&self.mark, &self.limits),
        );
        let ((base, format_in), (mark, _)) = (base?, mark?);
        // The output is base-sized, so the base is held to the canvas cap.
        self.limits.enforce_canvas(base.width(), base.height())?;
        self.limits.enforce_timeout(recorder.start_total, "decode")?;
        recorder.mark_decode_done(format_in);

        let marked = apply_watermark(&base, &mark, &self.spec)?;
        self.limits.enforce_timeout(recorder.start_total, "compose")?;
        recorder.mark_compose_done(false);

        let bytes = encoder::encode(&marked, self.format, self.spec.encoder_quality())?;
        recorder.finalize(marked.dimensions(), self.format, bytes.len());
        Ok(bytes)
    }

    pub fn run_to_file(&self, path: impl AsRef<Path>) -> EngineResult<usize> {
        let bytes = self.run()?;
        write_file(path, &bytes)
    }
}

/// Run independent composite requests in parallel; results keep input order.
pub fn composite_batch(tasks: &[CompositeTask]) -> Vec<EngineResult<Vec<u8>>> {
    // A panicking codec fails its own item, not the whole batch.
    let run_all = || {
        tasks
            .par_iter()
            .map(|task| run_with_panic_policy("composite_batch", || task.run()))
            .collect()
    };
    match pool::get_pool() {
        Some(pool) => pool.install(run_all),
        None => run_all(),
    }
}

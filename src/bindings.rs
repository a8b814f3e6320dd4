// src/bindings.rs
//
// Node.js surface. Each call packs its inputs into an engine task and runs it
// on the libuv pool through AsyncTask, so the JS thread never blocks on pixels.

use crate::config::{CompositeConfig, WatermarkConfig};
use crate::engine::{run_with_panic_policy, BackdropSource, CompositeTask, Source, WatermarkTask};
use crate::error::CompositorError;
use napi::bindgen_prelude::*;
use napi::Task;

macro_rules! parse_config {
    ($ty:ty, $json:expr) => {
        match $json {
            Some(json) => <$ty>::from_json(&json),
            None => Ok(<$ty>::default()),
        }
    };
}

pub struct CompositeJob {
    task: CompositeTask,
}

impl Task for CompositeJob {
    type Output = Vec<u8>;
    type JsValue = Buffer;

    fn compute(&mut self) -> Result<Self::Output> {
        run_with_panic_policy("composite", || self.task.run()).map_err(napi::Error::from)
    }

    fn resolve(&mut self, _env: Env, output: Self::Output) -> Result<Self::JsValue> {
        Ok(output.into())
    }
}

pub struct WatermarkJob {
    task: WatermarkTask,
}

impl Task for WatermarkJob {
    type Output = Vec<u8>;
    type JsValue = Buffer;

    fn compute(&mut self) -> Result<Self::Output> {
        run_with_panic_policy("watermark", || self.task.run()).map_err(napi::Error::from)
    }

    fn resolve(&mut self, _env: Env, output: Self::Output) -> Result<Self::JsValue> {
        Ok(output.into())
    }
}

fn composite_job(
    subject: Buffer,
    backdrop: BackdropSource,
    config: CompositeConfig,
) -> std::result::Result<AsyncTask<CompositeJob>, CompositorError> {
    let options = config.into_options()?;
    Ok(AsyncTask::new(CompositeJob {
        task: CompositeTask::new(Source::from_bytes(subject.to_vec()), backdrop, options),
    }))
}

/// Composite a cut-out subject onto a backdrop photo.
///
/// `config` is a JSON string of CompositeConfig fields; every field is optional.
#[napi(ts_return_type = "Promise<Buffer>")]
pub fn composite(
    subject: Buffer,
    backdrop: Buffer,
    config: Option<String>,
) -> Result<AsyncTask<CompositeJob>> {
    let config = parse_config!(CompositeConfig, config)?;
    let backdrop = BackdropSource::Image(Source::from_bytes(backdrop.to_vec()));
    Ok(composite_job(subject, backdrop, config)?)
}

/// Composite a cut-out subject onto a solid color (`backgroundColor`, white by default).
#[napi(js_name = "compositeSolid", ts_return_type = "Promise<Buffer>")]
pub fn composite_solid(subject: Buffer, config: Option<String>) -> Result<AsyncTask<CompositeJob>> {
    let config = parse_config!(CompositeConfig, config)?;
    let backdrop = BackdropSource::SolidColor(config.backdrop_color()?);
    Ok(composite_job(subject, backdrop, config)?)
}

/// Overlay a logo or plate on a base image. Output is PNG unless `format` says otherwise.
#[napi(js_name = "applyWatermark", ts_return_type = "Promise<Buffer>")]
pub fn apply_watermark(
    base: Buffer,
    mark: Buffer,
    config: Option<String>,
) -> Result<AsyncTask<WatermarkJob>> {
    let (spec, format) = parse_config!(WatermarkConfig, config)?.into_spec()?;
    let task = WatermarkTask::new(
        Source::from_bytes(base.to_vec()),
        Source::from_bytes(mark.to_vec()),
        spec,
    )
    .with_format(format);
    Ok(AsyncTask::new(WatermarkJob { task }))
}

/// Image metadata returned by inspect()
#[napi(object)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    /// Detected format (jpeg, png, webp)
    pub format: Option<String>,
}

/// Read dimensions and format from the header without decoding pixels.
#[napi]
pub fn inspect(buffer: Buffer) -> Result<ImageMetadata> {
    let info = crate::inspect_header_from_bytes(buffer.as_ref())?;
    Ok(ImageMetadata {
        width: info.width,
        height: info.height,
        format: info.format,
    })
}

/// Get library version
#[napi]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

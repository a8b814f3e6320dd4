// src/config.rs
//
// JSON request configuration. Every field is optional; missing fields take
// the preset (or default) value. Conversion into the typed specs validates.

use crate::error::CompositorError;
use crate::ops::{CompositeOptions, OutputFormat, PaddingSpec, Rgb, WatermarkSpec};
use serde::{Deserialize, Serialize};

/// Composite request knobs as they arrive from a caller.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CompositeConfig {
    /// Starting point for every unset field (`studio` when absent).
    pub preset: Option<String>,
    pub output_width: Option<u32>,
    pub output_height: Option<u32>,
    pub padding_left: Option<f64>,
    pub padding_right: Option<f64>,
    pub padding_top: Option<f64>,
    pub padding_bottom: Option<f64>,
    pub quality: Option<f64>,
    pub format: Option<String>,
    pub background_color: Option<String>,
    pub alpha_threshold: Option<u8>,
}

impl CompositeConfig {
    pub fn from_json(json: &str) -> Result<Self, CompositorError> {
        serde_json::from_str(json).map_err(|e| config_error("CompositeConfig", e))
    }

    pub fn into_options(self) -> Result<CompositeOptions, CompositorError> {
        let mut options = match self.preset.as_deref() {
            Some(name) => CompositeOptions::preset(name)?,
            None => CompositeOptions::default(),
        };

        let canvas = &mut options.canvas;
        canvas.output_width = self.output_width.unwrap_or(canvas.output_width);
        canvas.output_height = self.output_height.unwrap_or(canvas.output_height);
        canvas.quality = self.quality.unwrap_or(canvas.quality);

        let base = options.padding;
        options.padding = PaddingSpec::new(
            self.padding_left.unwrap_or(base.left),
            self.padding_right.unwrap_or(base.right),
            self.padding_top.unwrap_or(base.top),
            self.padding_bottom.unwrap_or(base.bottom),
        );

        if let Some(format) = self.format.as_deref() {
            options.format = format.parse()?;
        }
        if let Some(threshold) = self.alpha_threshold {
            options.alpha_threshold = threshold;
        }

        options.validate()?;
        Ok(options)
    }

    /// Solid backdrop color, white when unset.
    pub fn backdrop_color(&self) -> Result<Rgb, CompositorError> {
        self.background_color
            .as_deref()
            .map_or(Ok(Rgb::WHITE), str::parse)
    }
}

/// Watermark request knobs as they arrive from a caller.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WatermarkConfig {
    pub x_percent: Option<f64>,
    pub y_percent: Option<f64>,
    pub size_percent: Option<f64>,
    pub opacity: Option<f64>,
    pub quality: Option<f64>,
    pub format: Option<String>,
}

impl WatermarkConfig {
    pub fn from_json(json: &str) -> Result<Self, CompositorError> {
        serde_json::from_str(json).map_err(|e| config_error("WatermarkConfig", e))
    }

    pub fn into_spec(self) -> Result<(WatermarkSpec, OutputFormat), CompositorError> {
        let defaults = WatermarkSpec::default();
        let spec = WatermarkSpec {
            x_percent: self.x_percent.unwrap_or(defaults.x_percent),
            y_percent: self.y_percent.unwrap_or(defaults.y_percent),
            size_percent: self.size_percent.unwrap_or(defaults.size_percent),
            opacity: self.opacity.unwrap_or(defaults.opacity),
            quality: self.quality.unwrap_or(defaults.quality),
        };
        spec.validate()?;
        let format = match self.format.as_deref() {
            Some(format) => format.parse()?,
            None => OutputFormat::Png,
        };
        Ok((spec, format))
    }
}

fn config_error(name: &'static str, err: serde_json::Error) -> CompositorError {
    CompositorError::invalid_argument(
        name,
        format!("line {} column {}", err.line(), err.column()),
        err.to_string(),
    )
}

// src/ops.rs
//
// Per-request value types: padding, canvas, backdrop, output format, watermark.
// These are cheap to create and copy - the expensive work happens in the engine.

use crate::engine::RasterImage;
use crate::error::CompositorError;
use std::fmt;
use std::str::FromStr;

/// Fraction of the canvas reserved as empty margin on each side.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PaddingSpec {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl Default for PaddingSpec {
    fn default() -> Self {
        Self::uniform(0.1)
    }
}

impl PaddingSpec {
    pub fn new(left: f64, right: f64, top: f64, bottom: f64) -> Self {
        Self {
            left,
            right,
            top,
            bottom,
        }
    }

    pub fn uniform(fraction: f64) -> Self {
        Self::new(fraction, fraction, fraction, fraction)
    }

    /// Every side in `[0, 1)` and each axis summing to less than 1. NaN is rejected.
    pub fn validate(&self) -> Result<(), CompositorError> {
        let sides = [self.left, self.right, self.top, self.bottom];
        if !sides.iter().all(|s| (0.0..1.0).contains(s)) {
            return Err(self.invalid("each side must be within [0, 1)"));
        }
        if self.left + self.right >= 1.0 {
            return Err(self.invalid("left + right must be < 1"));
        }
        if self.top + self.bottom >= 1.0 {
            return Err(self.invalid("top + bottom must be < 1"));
        }
        Ok(())
    }

    fn invalid(&self, reason: &'static str) -> CompositorError {
        CompositorError::invalid_padding(self.left, self.right, self.top, self.bottom, reason)
    }
}

/// Output canvas dimensions and lossy-encoder fidelity in `(0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CanvasSpec {
    pub output_width: u32,
    pub output_height: u32,
    pub quality: f64,
}

impl Default for CanvasSpec {
    fn default() -> Self {
        Self::new(1920, 1080, 0.9)
    }
}

impl CanvasSpec {
    pub fn new(output_width: u32, output_height: u32, quality: f64) -> Self {
        Self {
            output_width,
            output_height,
            quality,
        }
    }

    pub fn validate(&self) -> Result<(), CompositorError> {
        if self.output_width == 0 || self.output_height == 0 {
            return Err(CompositorError::invalid_dimensions(
                self.output_width,
                self.output_height,
                "canvas dimensions must be at least 1x1",
            ));
        }
        validate_quality(self.quality)
    }

    /// Quality mapped onto the 1..=100 scale the encoders take.
    pub fn encoder_quality(&self) -> u8 {
        encoder_quality(self.quality)
    }
}

pub(crate) fn validate_quality(quality: f64) -> Result<(), CompositorError> {
    if quality > 0.0 && quality <= 1.0 {
        Ok(())
    } else {
        Err(CompositorError::invalid_argument(
            "quality",
            quality.to_string(),
            "must be within (0, 1]",
        ))
    }
}

pub(crate) fn encoder_quality(quality: f64) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

/// How the fitted subject is positioned vertically.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlacementPolicy {
    /// Bottom edge rests on the bottom-padding line.
    FloorAligned,
    /// Vertically centered in the full canvas height.
    Centered,
}

/// Opaque sRGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, u8::MAX]
    }
}

impl FromStr for Rgb {
    type Err = CompositorError;

    /// Accepts `#rrggbb`, `rrggbb` and `#rgb`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            CompositorError::invalid_argument(
                "backgroundColor",
                s.to_string(),
                "expected #rrggbb or #rgb",
            )
        };
        let hex = s.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| invalid());
        match hex.len() {
            6 => Ok(Self::new(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            3 => {
                // #abc expands to #aabbcc
                let r = channel(&hex[0..1])?;
                let g = channel(&hex[1..2])?;
                let b = channel(&hex[2..3])?;
                Ok(Self::new(r * 17, g * 17, b * 17))
            }
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// What goes behind the subject.
#[derive(Clone, Debug)]
pub enum BackdropSpec {
    SolidColor(Rgb),
    /// Stretched to exactly the canvas size, ignoring its own aspect ratio.
    BackgroundImage(RasterImage),
}

impl BackdropSpec {
    /// Solid backdrops center the subject; photo backdrops stand it on the floor.
    pub fn placement_policy(&self) -> PlacementPolicy {
        match self {
            Self::SolidColor(_) => PlacementPolicy::Centered,
            Self::BackgroundImage(_) => PlacementPolicy::FloorAligned,
        }
    }
}

/// Output format for encoding
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::WebP => "webp",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = CompositorError;

    fn from_str(format: &str) -> Result<Self, Self::Err> {
        match format.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::WebP),
            other => Err(CompositorError::unsupported_format(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Watermark placement relative to the base image, in percent of its size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WatermarkSpec {
    pub x_percent: f64,
    pub y_percent: f64,
    /// Mark width as a percentage of the base width, in `(0, 100]`.
    pub size_percent: f64,
    /// Multiplier on the mark's alpha, in `[0, 1]`.
    pub opacity: f64,
    /// Lossy-encoder fidelity when the result is encoded as JPEG or WebP.
    pub quality: f64,
}

impl Default for WatermarkSpec {
    fn default() -> Self {
        Self {
            x_percent: 2.0,
            y_percent: 2.0,
            size_percent: 15.0,
            opacity: 1.0,
            quality: 0.9,
        }
    }
}

impl WatermarkSpec {
    pub fn validate(&self) -> Result<(), CompositorError> {
        for (name, value) in [("xPercent", self.x_percent), ("yPercent", self.y_percent)] {
            if !value.is_finite() {
                return Err(CompositorError::invalid_argument(
                    name,
                    value.to_string(),
                    "must be a finite number",
                ));
            }
        }
        if !(self.size_percent > 0.0 && self.size_percent <= 100.0) {
            return Err(CompositorError::invalid_argument(
                "sizePercent",
                self.size_percent.to_string(),
                "must be within (0, 100]",
            ));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(CompositorError::invalid_argument(
                "opacity",
                self.opacity.to_string(),
                "must be within [0, 1]",
            ));
        }
        validate_quality(self.quality)
    }

    pub fn encoder_quality(&self) -> u8 {
        encoder_quality(self.quality)
    }
}

/// Per-request compositing knobs other than the two images.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompositeOptions {
    pub canvas: CanvasSpec,
    pub padding: PaddingSpec,
    pub format: OutputFormat,
    pub alpha_threshold: u8,
}

impl Default for CompositeOptions {
    fn default() -> Self {
        Self::studio()
    }
}

// =============================================================================
// PRESETS - Common output configurations
// =============================================================================

impl CompositeOptions {
    pub fn validate(&self) -> Result<(), CompositorError> {
        self.canvas.validate()?;
        self.padding.validate()
    }

    /// Get the built-in preset by name
    pub fn preset(name: &str) -> Result<Self, CompositorError> {
        match name.to_ascii_lowercase().as_str() {
            "studio" => Ok(Self::studio()),
            "solid" => Ok(Self::solid()),
            "listing" => Ok(Self::listing()),
            "thumbnail" => Ok(Self::thumbnail()),
            _ => Err(CompositorError::invalid_preset(name.to_string())),
        }
    }

    /// Studio preset: 1920x1080, 10% padding, JPEG quality 0.9
    /// Use case: hero shots on a photographed showroom backdrop
    pub fn studio() -> Self {
        Self {
            canvas: CanvasSpec::default(),
            padding: PaddingSpec::default(),
            format: OutputFormat::Jpeg,
            alpha_threshold: crate::engine::DEFAULT_ALPHA_THRESHOLD,
        }
    }

    /// Solid preset: 1200x1200 square, 6% padding, JPEG quality 0.92
    /// Use case: marketplace tiles on a plain color
    pub fn solid() -> Self {
        Self {
            canvas: CanvasSpec::new(1200, 1200, 0.92),
            padding: PaddingSpec::uniform(0.06),
            ..Self::studio()
        }
    }

    /// Listing preset: 1600x1200 (4:3), extra headroom, JPEG quality 0.85
    /// Use case: classified-listing galleries
    pub fn listing() -> Self {
        Self {
            canvas: CanvasSpec::new(1600, 1200, 0.85),
            padding: PaddingSpec::new(0.08, 0.08, 0.15, 0.1),
            ..Self::studio()
        }
    }

    /// Thumbnail preset: 480x320, 5% padding, WebP quality 0.75
    /// Use case: search results, previews
    pub fn thumbnail() -> Self {
        Self {
            canvas: CanvasSpec::new(480, 320, 0.75),
            padding: PaddingSpec::uniform(0.05),
            format: OutputFormat::WebP,
            ..Self::studio()
        }
    }
}

// lib.rs
//
// studio-compositor: subject-on-backdrop compositing for vehicle photography.
//
// A cut-out subject is trimmed to its visible pixels, fitted into a padded
// canvas over a solid color or a backdrop photo, and encoded. A second entry
// point overlays a logo/plate watermark on any base image.

#[cfg(feature = "napi")]
#[macro_use]
extern crate napi_derive;

// Memory allocator optimization - jemalloc for better performance
// Note: jemalloc is not supported on Windows/MSVC, so we exclude it on that platform
#[cfg(all(feature = "jemalloc", not(target_env = "msvc")))]
#[global_allocator]
static ALLOC: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[cfg(feature = "napi")]
pub mod bindings;
pub mod config;
pub mod engine;
pub mod error;
pub mod ops;

use error::CompositorError;
use image::ImageReader;
use std::io::{BufRead, BufReader, Cursor, Seek};

pub use config::{CompositeConfig, WatermarkConfig};
pub use engine::{
    apply_watermark, composite, composite_batch, crop, detect, place, trim, BackdropSource,
    BoundingBox, CompositeTask, Limits, RasterImage, Source, WatermarkTask,
};
pub use error::{ErrorCategory, ErrorKind, Result};
pub use ops::{
    BackdropSpec, CanvasSpec, CompositeOptions, OutputFormat, PaddingSpec, PlacementPolicy, Rgb,
    WatermarkSpec,
};

/// Dimensions and format read from an image header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderInfo {
    pub width: u32,
    pub height: u32,
    pub format: Option<String>,
}

fn read_header_info<R: BufRead + Seek>(reader: R) -> Result<HeaderInfo> {
    let reader = ImageReader::new(reader)
        .with_guessed_format()
        .map_err(|e| CompositorError::decode_failed(format!("failed to read image header: {e}")))?;

    let format = reader.format().map(|f| format!("{:?}", f).to_lowercase());
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| CompositorError::decode_failed(format!("failed to read dimensions: {e}")))?;

    Ok(HeaderInfo {
        width,
        height,
        format,
    })
}

/// Read dimensions and format without decoding pixels.
pub fn inspect_header_from_bytes(data: &[u8]) -> Result<HeaderInfo> {
    read_header_info(Cursor::new(data))
}

pub fn inspect_header_from_path(path: &str) -> Result<HeaderInfo> {
    use std::fs::File;

    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            CompositorError::file_not_found(path.to_string())
        } else {
            CompositorError::file_read_failed(path.to_string(), e)
        }
    })?;
    read_header_info(BufReader::new(file))
}

/// Metrics payload version.
pub const PROCESSING_METRICS_VERSION: &str = "1.0.0";

/// Per-request stage timings and sizes, filled by `run_with_metrics`.
#[cfg_attr(feature = "napi", napi(object))]
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingMetrics {
    /// Schema version for compatibility negotiation
    pub version: String,
    /// Decode stage duration in milliseconds (both inputs)
    pub decode_ms: f64,
    /// Trim, placement and drawing duration in milliseconds
    pub compose_ms: f64,
    pub encode_ms: f64,
    /// Total wall-clock duration in milliseconds
    pub total_ms: f64,
    /// Input size in bytes (as u32 for NAPI compatibility, saturating)
    pub bytes_in: u32,
    /// Output size in bytes (as u32 for NAPI compatibility, saturating)
    pub bytes_out: u32,
    /// bytes_out / bytes_in
    pub compression_ratio: f64,
    pub output_width: u32,
    pub output_height: u32,
    /// Detected subject (or base) format, lowercase
    pub format_in: Option<String>,
    pub format_out: String,
    /// True when the subject had no pixel above the alpha threshold
    pub fully_transparent_subject: bool,
}

impl Default for ProcessingMetrics {
    fn default() -> Self {
        Self {
            version: PROCESSING_METRICS_VERSION.to_string(),
            decode_ms: 0.0,
            compose_ms: 0.0,
            encode_ms: 0.0,
            total_ms: 0.0,
            bytes_in: 0,
            bytes_out: 0,
            compression_ratio: 0.0,
            output_width: 0,
            output_height: 0,
            format_in: None,
            format_out: String::new(),
            fully_transparent_subject: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbaImage};

    #[test]
    fn inspect_reads_header_only() {
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(RgbaImage::new(37, 21))
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        let info = inspect_header_from_bytes(&buf).unwrap();
        assert_eq!(
            info,
            HeaderInfo {
                width: 37,
                height: 21,
                format: Some("png".to_string())
            }
        );
    }

    #[test]
    fn inspect_rejects_garbage() {
        let err = inspect_header_from_bytes(b"not an image").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeFailed);

        let err = inspect_header_from_path("/definitely/not/here.png").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn metrics_default_carries_version() {
        let metrics = ProcessingMetrics::default();
        assert_eq!(metrics.version, PROCESSING_METRICS_VERSION);
        assert!(!metrics.fully_transparent_subject);
    }
}

// src/engine.rs
//
// The compositing engine. Pixel stages (trim, placement, blend, resample) are
// pure functions over `RasterImage`; pipeline and watermark chain them; tasks
// add decoding, limits, metrics and output.
//
// This file is a facade over the modules in engine/.

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed image dimension (width or height) for any decoded input.
/// Larger images are rejected before decoding to stop decompression bombs.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels (width * height) for any decoded input.
/// 100 megapixels = 400MB uncompressed RGBA.
pub const MAX_PIXELS: u64 = 100_000_000;

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

mod blend;
mod common;
mod decoder;
mod encoder;
mod io;
mod limits;
mod pipeline;
mod placement;
mod pool;
mod raster;
mod resample;
mod tasks;
mod trim;
mod watermark;

pub use blend::over;
pub use common::{run_with_panic_policy, EngineResult};
pub use decoder::{
    apply_exif_orientation, check_dimensions, decode_image, decode_raster, detect_exif_orientation,
    detect_format, ensure_dimensions_safe,
};
pub use encoder::{encode, encode_jpeg, encode_png, encode_webp, QualitySettings};
pub use io::{write_file, Source};
pub use limits::{LimitPolicy, Limits, DEFAULT_MAX_CANVAS_DIMENSION, DEFAULT_MAX_CANVAS_PIXELS};
pub use pipeline::{composite, composite_raster, Composited};
pub use placement::{place, Geometry, PixelRect};
pub use pool::{get_pool, worker_threads};
pub use raster::{BoundingBox, RasterImage, CHANNELS};
pub use resample::{resize_exact, resize_to_width};
pub use tasks::{composite_batch, BackdropSource, CompositeTask, WatermarkTask};
pub use trim::{crop, detect, detect_default, trim, Trimmed, DEFAULT_ALPHA_THRESHOLD};
pub use watermark::{apply_watermark, watermark_layout, WatermarkLayout};

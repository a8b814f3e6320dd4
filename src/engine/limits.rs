// src/engine/limits.rs
//
// Per-request resource limits: canvas cap, input byte/pixel caps, wall-clock timeout.
//
// The canvas cap is always enforced. It replaces relying on the allocator to
// fail: a 1920x1080 canvas is ~8MB, the default cap (16M pixels) is 64MB.

use crate::engine::common::EngineResult;
use crate::error::CompositorError;
use std::time::Instant;

pub const DEFAULT_MAX_CANVAS_DIMENSION: u32 = 4096;
pub const DEFAULT_MAX_CANVAS_PIXELS: u64 = 16_777_216; // 4096 x 4096

const STRICT_MAX_PIXELS: u64 = 40_000_000; // ~8K x 5K
const LENIENT_MAX_PIXELS: u64 = 75_000_000; // generous but below global MAX_PIXELS
const STRICT_MAX_BYTES: u64 = 32 * 1024 * 1024; // 32MB input cap
const LENIENT_MAX_BYTES: u64 = 48 * 1024 * 1024; // 48MB input cap
const STRICT_TIMEOUT_MS: u64 = 5_000;
const LENIENT_TIMEOUT_MS: u64 = 30_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LimitPolicy {
    /// Only the canvas cap applies.
    Disabled,
    Strict,
    Lenient,
    /// Caller sets individual input caps.
    Custom,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Limits {
    pub policy: LimitPolicy,
    pub max_canvas_dimension: u32,
    pub max_canvas_pixels: u64,
    pub max_input_pixels: Option<u64>,
    pub max_input_bytes: Option<u64>,
    pub timeout_ms: Option<u64>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            policy: LimitPolicy::Disabled,
            max_canvas_dimension: DEFAULT_MAX_CANVAS_DIMENSION,
            max_canvas_pixels: DEFAULT_MAX_CANVAS_PIXELS,
            max_input_pixels: None,
            max_input_bytes: None,
            timeout_ms: None,
        }
    }
}

impl Limits {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn strict() -> Self {
        Self {
            policy: LimitPolicy::Strict,
            max_input_pixels: Some(STRICT_MAX_PIXELS),
            max_input_bytes: Some(STRICT_MAX_BYTES),
            timeout_ms: Some(STRICT_TIMEOUT_MS),
            ..Self::default()
        }
    }

    pub fn lenient() -> Self {
        Self {
            policy: LimitPolicy::Lenient,
            max_input_pixels: Some(LENIENT_MAX_PIXELS),
            max_input_bytes: Some(LENIENT_MAX_BYTES),
            timeout_ms: Some(LENIENT_TIMEOUT_MS),
            ..Self::default()
        }
    }

    pub fn custom() -> Self {
        Self {
            policy: LimitPolicy::Custom,
            ..Self::default()
        }
    }

    pub fn apply_policy(policy: LimitPolicy) -> Self {
        match policy {
            LimitPolicy::Disabled => Self::disabled(),
            LimitPolicy::Strict => Self::strict(),
            LimitPolicy::Lenient => Self::lenient(),
            LimitPolicy::Custom => Self::custom(),
        }
    }

    pub fn with_canvas_cap(mut self, max_dimension: u32, max_pixels: u64) -> Self {
        self.max_canvas_dimension = max_dimension;
        self.max_canvas_pixels = max_pixels;
        self
    }

    /// Reject a canvas before its buffer is allocated.
    pub fn enforce_canvas(&self, width: u32, height: u32) -> EngineResult<()> {
        let pixels = u64::from(width) * u64::from(height);
        if width > self.max_canvas_dimension
            || height > self.max_canvas_dimension
            || pixels > self.max_canvas_pixels
        {
            return Err(CompositorError::canvas_too_large(
                width,
                height,
                self.max_canvas_dimension,
                self.max_canvas_pixels,
            ));
        }
        Ok(())
    }

    pub fn enforce_source_len(&self, len: usize) -> EngineResult<()> {
        if let Some(limit) = self.max_input_bytes {
            let len = len as u64;
            if len > limit {
                return Err(CompositorError::limit_exceeded(format!(
                    "input size {len} bytes exceeds limit of {limit} bytes"
                )));
            }
        }
        Ok(())
    }

    pub fn enforce_pixels(&self, width: u32, height: u32) -> EngineResult<()> {
        if let Some(limit) = self.max_input_pixels {
            let pixels = u64::from(width) * u64::from(height);
            if pixels > limit {
                return Err(CompositorError::limit_exceeded(format!(
                    "input {width}x{height} ({pixels} pixels) exceeds limit of {limit} pixels"
                )));
            }
        }
        Ok(())
    }

    pub fn enforce_timeout(&self, started_at: Instant, stage: &'static str) -> EngineResult<()> {
        if let Some(limit_ms) = self.timeout_ms {
            let elapsed_ms = started_at.elapsed().as_millis() as u64;
            if elapsed_ms > limit_ms {
                return Err(CompositorError::limit_exceeded(format!(
                    "processing exceeded {limit_ms}ms timeout at {stage} stage (elapsed: {elapsed_ms}ms)"
                )));
            }
        }
        Ok(())
    }
}

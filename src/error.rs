// src/error.rs
//
// Unified error handling for studio-compositor
// Uses thiserror for simple, type-safe error handling
//
// Error Taxonomy:
// - UserError: Invalid geometry/configuration, recoverable
// - CodecError: Decode/encode/resample issues
// - ResourceLimit: Canvas caps, input caps, timeouts, allocation
// - InternalBug: Library bugs (should not happen)

#[cfg(feature = "napi")]
use napi::bindgen_prelude::*;
use std::borrow::Cow;
use thiserror::Error;

/// Coarse error category, used by callers deciding whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCategory {
    /// Invalid input, recoverable by user
    UserError,
    /// Format/encoding issues
    CodecError,
    /// Memory/time/dimension limits
    ResourceLimit,
    /// Library bugs (should not happen)
    InternalBug,
}

/// Fine-grained error kind. Every [`CompositorError`] maps to exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidDimensions,
    InvalidPadding,
    InvalidArgument,
    DecodeFailed,
    AllocationFailed,
    EncodeFailed,
    /// Reserved. A fully transparent subject is not an error: the pipeline keeps
    /// it uncropped and reports it through `Trimmed::fully_transparent` and
    /// `ProcessingMetrics::fully_transparent_subject`.
    FullyTransparentInput,
    LimitExceeded,
    Io,
    Internal,
}

#[derive(Debug, Error)]
pub enum CompositorError {
    // File I/O Errors
    #[error("File not found: {path}")]
    FileNotFound { path: Cow<'static, str> },

    #[error("Failed to read file '{path}': {source}")]
    FileReadFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWriteFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    // Geometry Errors
    #[error("Invalid dimensions {width}x{height}: {reason}")]
    InvalidDimensions {
        width: u32,
        height: u32,
        reason: Cow<'static, str>,
    },

    #[error(
        "Invalid padding (left={left}, right={right}, top={top}, bottom={bottom}): {reason}"
    )]
    InvalidPadding {
        left: f64,
        right: f64,
        top: f64,
        bottom: f64,
        reason: Cow<'static, str>,
    },

    #[error("Image is fully transparent ({width}x{height}); no content to trim")]
    FullyTransparentInput { width: u32, height: u32 },

    // Decode Errors
    #[error("Unsupported image format: {format}")]
    UnsupportedFormat { format: Cow<'static, str> },

    #[error("Failed to decode image: {message}")]
    DecodeFailed { message: Cow<'static, str> },

    // Size Limit Errors
    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("Image pixel count {pixels} exceeds maximum {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    #[error("Canvas {width}x{height} exceeds limit (max side {max_dimension}, max pixels {max_pixels})")]
    CanvasTooLarge {
        width: u32,
        height: u32,
        max_dimension: u32,
        max_pixels: u64,
    },

    #[error("Failed to allocate {bytes} bytes for {width}x{height} buffer")]
    AllocationFailed { width: u32, height: u32, bytes: u64 },

    #[error("Limit exceeded: {reason}")]
    LimitExceeded { reason: Cow<'static, str> },

    // Processing Errors
    #[error("Resize failed ({source_width}x{source_height} -> {target_width}x{target_height}): {message}")]
    ResizeFailed {
        source_width: u32,
        source_height: u32,
        target_width: u32,
        target_height: u32,
        message: Cow<'static, str>,
    },

    // Encode Errors
    #[error("Failed to encode as {format}: {message}")]
    EncodeFailed {
        format: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    // Configuration Errors
    #[error("Unknown preset: '{name}'. Available: studio, solid, listing, thumbnail")]
    InvalidPreset { name: Cow<'static, str> },

    #[error("Invalid value for {name}: {value}. {reason}")]
    InvalidArgument {
        name: Cow<'static, str>,
        value: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    // Internal Errors
    #[error("Internal error: {message}")]
    InternalPanic { message: Cow<'static, str> },
}

impl Clone for CompositorError {
    fn clone(&self) -> Self {
        match self {
            Self::FileNotFound { path } => Self::FileNotFound { path: path.clone() },
            Self::FileReadFailed { path, source } => Self::FileReadFailed {
                path: path.clone(),
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
            Self::FileWriteFailed { path, source } => Self::FileWriteFailed {
                path: path.clone(),
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
            Self::InvalidDimensions {
                width,
                height,
                reason,
            } => Self::InvalidDimensions {
                width: *width,
                height: *height,
                reason: reason.clone(),
            },
            Self::InvalidPadding {
                left,
                right,
                top,
                bottom,
                reason,
            } => Self::InvalidPadding {
                left: *left,
                right: *right,
                top: *top,
                bottom: *bottom,
                reason: reason.clone(),
            },
            Self::FullyTransparentInput { width, height } => Self::FullyTransparentInput {
                width: *width,
                height: *height,
            },
            Self::UnsupportedFormat { format } => Self::UnsupportedFormat {
                format: format.clone(),
            },
            Self::DecodeFailed { message } => Self::DecodeFailed {
                message: message.clone(),
            },
            Self::DimensionExceedsLimit { dimension, max } => Self::DimensionExceedsLimit {
                dimension: *dimension,
                max: *max,
            },
            Self::PixelCountExceedsLimit { pixels, max } => Self::PixelCountExceedsLimit {
                pixels: *pixels,
                max: *max,
            },
            Self::CanvasTooLarge {
                width,
                height,
                max_dimension,
                max_pixels,
            } => Self::CanvasTooLarge {
                width: *width,
                height: *height,
                max_dimension: *max_dimension,
                max_pixels: *max_pixels,
            },
            Self::AllocationFailed {
                width,
                height,
                bytes,
            } => Self::AllocationFailed {
                width: *width,
                height: *height,
                bytes: *bytes,
            },
            Self::LimitExceeded { reason } => Self::LimitExceeded {
                reason: reason.clone(),
            },
            Self::ResizeFailed {
                source_width,
                source_height,
                target_width,
                target_height,
                message,
            } => Self::ResizeFailed {
                source_width: *source_width,
                source_height: *source_height,
                target_width: *target_width,
                target_height: *target_height,
                message: message.clone(),
            },
            Self::EncodeFailed { format, message } => Self::EncodeFailed {
                format: format.clone(),
                message: message.clone(),
            },
            Self::InvalidPreset { name } => Self::InvalidPreset { name: name.clone() },
            Self::InvalidArgument {
                name,
                value,
                reason,
            } => Self::InvalidArgument {
                name: name.clone(),
                value: value.clone(),
                reason: reason.clone(),
            },
            Self::InternalPanic { message } => Self::InternalPanic {
                message: message.clone(),
            },
        }
    }
}

// Constructor Helpers
impl CompositorError {
    pub fn file_not_found(path: impl Into<Cow<'static, str>>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn file_read_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::FileReadFailed {
            path: path.into(),
            source,
        }
    }

    pub fn file_write_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::FileWriteFailed {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_dimensions(
        width: u32,
        height: u32,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidDimensions {
            width,
            height,
            reason: reason.into(),
        }
    }

    pub fn invalid_padding(
        left: f64,
        right: f64,
        top: f64,
        bottom: f64,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidPadding {
            left,
            right,
            top,
            bottom,
            reason: reason.into(),
        }
    }

    pub fn fully_transparent_input(width: u32, height: u32) -> Self {
        Self::FullyTransparentInput { width, height }
    }

    pub fn unsupported_format(format: impl Into<Cow<'static, str>>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub fn decode_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn canvas_too_large(width: u32, height: u32, max_dimension: u32, max_pixels: u64) -> Self {
        Self::CanvasTooLarge {
            width,
            height,
            max_dimension,
            max_pixels,
        }
    }

    pub fn allocation_failed(width: u32, height: u32, bytes: u64) -> Self {
        Self::AllocationFailed {
            width,
            height,
            bytes,
        }
    }

    pub fn limit_exceeded(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::LimitExceeded {
            reason: reason.into(),
        }
    }

    pub fn resize_failed(
        source_dims: (u32, u32),
        target_dims: (u32, u32),
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::ResizeFailed {
            source_width: source_dims.0,
            source_height: source_dims.1,
            target_width: target_dims.0,
            target_height: target_dims.1,
            message: message.into(),
        }
    }

    pub fn encode_failed(
        format: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn invalid_preset(name: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidPreset { name: name.into() }
    }

    pub fn invalid_argument(
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn internal_panic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InternalPanic {
            message: message.into(),
        }
    }

    /// Fine-grained kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidDimensions { .. } => ErrorKind::InvalidDimensions,
            Self::InvalidPadding { .. } => ErrorKind::InvalidPadding,
            Self::InvalidPreset { .. } | Self::InvalidArgument { .. } => {
                ErrorKind::InvalidArgument
            }
            Self::FullyTransparentInput { .. } => ErrorKind::FullyTransparentInput,
            Self::UnsupportedFormat { .. } | Self::DecodeFailed { .. } => ErrorKind::DecodeFailed,
            // The canvas cap stands in for allocator failure, so both report the same kind.
            Self::CanvasTooLarge { .. } | Self::AllocationFailed { .. } => {
                ErrorKind::AllocationFailed
            }
            Self::DimensionExceedsLimit { .. }
            | Self::PixelCountExceedsLimit { .. }
            | Self::LimitExceeded { .. } => ErrorKind::LimitExceeded,
            Self::EncodeFailed { .. } => ErrorKind::EncodeFailed,
            Self::FileNotFound { .. } | Self::FileReadFailed { .. } | Self::FileWriteFailed { .. } => {
                ErrorKind::Io
            }
            Self::ResizeFailed { .. } | Self::InternalPanic { .. } => ErrorKind::Internal,
        }
    }

    /// Check if this error is recoverable (user can fix it)
    ///
    /// This method is consistent with category():
    /// - UserError errors are always recoverable
    /// - ResourceLimit errors are recoverable (smaller canvas, smaller input, etc.)
    /// - CodecError and InternalBug errors are not recoverable
    pub fn is_recoverable(&self) -> bool {
        match self.category() {
            ErrorCategory::UserError | ErrorCategory::ResourceLimit => true,
            ErrorCategory::CodecError | ErrorCategory::InternalBug => false,
        }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::FileNotFound { .. }
            | Self::InvalidDimensions { .. }
            | Self::InvalidPadding { .. }
            | Self::FullyTransparentInput { .. }
            | Self::InvalidPreset { .. }
            | Self::InvalidArgument { .. } => ErrorCategory::UserError,

            Self::UnsupportedFormat { .. }
            | Self::DecodeFailed { .. }
            | Self::EncodeFailed { .. }
            | Self::ResizeFailed { .. } => ErrorCategory::CodecError,

            // Note: file I/O errors are ResourceLimit because they usually mean disk
            // pressure or permissions, both fixable without changing the request.
            Self::DimensionExceedsLimit { .. }
            | Self::PixelCountExceedsLimit { .. }
            | Self::CanvasTooLarge { .. }
            | Self::AllocationFailed { .. }
            | Self::LimitExceeded { .. }
            | Self::FileReadFailed { .. }
            | Self::FileWriteFailed { .. } => ErrorCategory::ResourceLimit,

            Self::InternalPanic { .. } => ErrorCategory::InternalBug,
        }
    }
}

impl ErrorCategory {
    /// Get string representation of error category
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::UserError => "UserError",
            ErrorCategory::CodecError => "CodecError",
            ErrorCategory::ResourceLimit => "ResourceLimit",
            ErrorCategory::InternalBug => "InternalBug",
        }
    }

    /// Get the STUDIO_COMPOSITOR_* error code string for this category
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCategory::UserError => "STUDIO_COMPOSITOR_USER_ERROR",
            ErrorCategory::CodecError => "STUDIO_COMPOSITOR_CODEC_ERROR",
            ErrorCategory::ResourceLimit => "STUDIO_COMPOSITOR_RESOURCE_LIMIT",
            ErrorCategory::InternalBug => "STUDIO_COMPOSITOR_INTERNAL_BUG",
        }
    }
}

// Conversion to NAPI Error. The category code is carried in the message prefix
// because the error object is created without an Env here.
#[cfg(feature = "napi")]
impl From<CompositorError> for napi::Error {
    fn from(err: CompositorError) -> Self {
        let category = err.category();
        let status = match category {
            ErrorCategory::UserError | ErrorCategory::CodecError => Status::InvalidArg,
            ErrorCategory::ResourceLimit | ErrorCategory::InternalBug => Status::GenericFailure,
        };
        napi::Error::new(status, format!("[{}] {}", category.code(), err))
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, CompositorError>;

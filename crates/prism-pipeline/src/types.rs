//! Shared types for the prism filter pipeline.

use serde::{Deserialize, Serialize};

use crate::stage::FilterKind;

/// Re-export `RgbaImage` so downstream crates can convert pixel buffers
/// to and from the `image` crate without depending on it directly.
pub use image::RgbaImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Number of pixels (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Errors that can occur while building pipeline inputs or running a
/// filter.
///
/// Only [`PipelineError::KernelFailure`] is recovered automatically (by
/// the executor, which substitutes a pass-through for the failing
/// stage). Every other variant propagates to the caller.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum PipelineError {
    /// The channel data length does not match `width * height * 4`.
    #[error("invalid pixel buffer: {width}x{height} needs {expected} bytes, got {actual}")]
    InvalidBuffer {
        /// Declared width in pixels.
        width: u32,
        /// Declared height in pixels.
        height: u32,
        /// Required data length in bytes.
        expected: usize,
        /// Supplied data length in bytes.
        actual: usize,
    },

    /// A stage strength outside the filter's declared range (or not a
    /// finite number) was rejected by the configuration layer.
    #[error("{stage} strength {strength} is outside {min}..={max}")]
    StrengthOutOfRange {
        /// The stage being configured.
        stage: FilterKind,
        /// The rejected strength.
        strength: f64,
        /// Lower bound of the stage's range.
        min: f64,
        /// Upper bound of the stage's range.
        max: f64,
    },

    /// A single filter invocation failed.
    #[error("{stage} filter failed: {reason}")]
    KernelFailure {
        /// The stage whose kernel failed.
        stage: FilterKind,
        /// Human-readable failure description.
        reason: String,
    },

    /// A raw stage configuration named a filter that does not exist.
    #[error("unknown stage id {0:?}")]
    UnknownStageId(String),

    /// A run was requested before any source image was supplied.
    #[error("no source image has been supplied")]
    NoSource,
}

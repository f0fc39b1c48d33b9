//! Filter dispatch.
//!
//! The executor never calls a filter function directly; it goes through
//! a [`Kernels`] implementation so that dispatch can be swapped out
//! (for instrumentation or fault injection) without touching the
//! caching logic.

use crate::buffer::PixelBuffer;
use crate::stage::FilterKind;
use crate::types::PipelineError;
use crate::{blur, emboss, hue, posterize, saturation, sepia};

/// A set of filter kernels, one per [`FilterKind`].
///
/// Implementations must return a buffer with the same dimensions as
/// `input`. Anything else (an `Err`, a resized buffer, or a panic) is
/// recovered by the executor as a
/// [`KernelFailure`](PipelineError::KernelFailure).
pub trait Kernels {
    /// Apply the filter for `kind` to `input`.
    ///
    /// # Errors
    ///
    /// Implementations may return any [`PipelineError`]; the executor
    /// treats it as a failure of this stage only.
    fn apply(
        &self,
        kind: FilterKind,
        input: &PixelBuffer,
        strength: f64,
    ) -> Result<PixelBuffer, PipelineError>;
}

/// The built-in filters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StandardKernels;

impl Kernels for StandardKernels {
    fn apply(
        &self,
        kind: FilterKind,
        input: &PixelBuffer,
        strength: f64,
    ) -> Result<PixelBuffer, PipelineError> {
        Ok(match kind {
            FilterKind::Emboss => emboss::emboss(input, strength),
            FilterKind::HueRotation => hue::rotate_hue(input, strength),
            FilterKind::Saturation => saturation::saturate(input, strength),
            FilterKind::Posterize => posterize::posterize(input, strength),
            FilterKind::Blur => blur::gaussian_blur(input, strength),
            FilterKind::SepiaTone => sepia::sepia_tone(input, strength),
        })
    }
}

impl<K: Kernels + ?Sized> Kernels for &K {
    fn apply(
        &self,
        kind: FilterKind,
        input: &PixelBuffer,
        strength: f64,
    ) -> Result<PixelBuffer, PipelineError> {
        (**self).apply(kind, input, strength)
    }
}

//! prism-pipeline: Incremental raster filter pipeline (sans-IO).
//!
//! Applies a fixed, ordered list of six filters to an RGBA image:
//! emboss -> hue rotation -> saturation -> posterize -> blur -> sepia
//! tone. Each stage can be toggled and tuned independently. When one
//! stage changes, only that stage and those after it are recomputed;
//! everything upstream is served from a per-stage cache.
//!
//! This crate has **no I/O dependencies**: it operates on in-memory
//! pixel buffers. Decoding, validation, and encoding live in
//! `prism-io`.
//!
//! The layers, bottom-up:
//!
//! - [`PixelBuffer`] and the six filter modules: pure functions
//!   `(&PixelBuffer, strength) -> PixelBuffer`.
//! - [`Stages`]: the validated stage configuration.
//! - [`Executor`]: divergence detection, caching, fault recovery.
//! - [`Scheduler`]: coalesces change requests so at most one run is in
//!   flight and superseded results are never published.

pub mod blur;
pub mod buffer;
pub mod cache;
pub mod color;
pub mod diagnostics;
pub mod emboss;
pub mod executor;
pub mod hue;
pub mod kernels;
pub mod posterize;
pub mod saturation;
pub mod scheduler;
pub mod sepia;
pub mod stage;
pub mod types;

pub use buffer::{PixelBuffer, SourceImage, SourceKey};
pub use cache::PipelineCache;
pub use diagnostics::{RunDiagnostics, StageDiagnostics, StageOutcome, StartPoint};
pub use executor::{Executor, RunReport};
pub use kernels::{Kernels, StandardKernels};
pub use scheduler::{Requester, Scheduler, SchedulerState};
pub use stage::{FilterKind, RawStageConfig, STAGE_COUNT, StageConfig, Stages, StrengthRange};
pub use types::{Dimensions, PipelineError, RgbaImage};

/// Run every enabled stage over `buffer` once, without caching.
///
/// Equivalent to a fresh [`Executor`] performing a single
/// [`recompute`](Executor::recompute). Kernel failures pass the stage's
/// input through and are returned alongside the output.
#[must_use = "returns the filtered image"]
pub fn apply_stages(buffer: &PixelBuffer, stages: &Stages) -> (PixelBuffer, RunReport) {
    let source = SourceImage::new(buffer.clone());
    let mut executor = Executor::new();
    let report = executor.recompute(&source, stages);
    let output = executor
        .output()
        .cloned()
        .unwrap_or_else(|| source.buffer().clone());
    (output, report)
}

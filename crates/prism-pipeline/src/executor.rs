//! Incremental pipeline execution.
//!
//! The [`Executor`] owns the per-stage cache and remembers the
//! configuration of its last run. Each [`recompute`](Executor::recompute)
//! finds the first stage whose configuration changed (the divergence
//! index) and resumes from the cached output just before it, so
//! upstream stages are never re-run for a downstream edit.

use std::panic::{self, AssertUnwindSafe};

use web_time::Instant;

use crate::buffer::{PixelBuffer, SourceImage, SourceKey};
use crate::cache::PipelineCache;
use crate::diagnostics::{RunDiagnostics, StageDiagnostics, StageOutcome, StartPoint};
use crate::kernels::{Kernels, StandardKernels};
use crate::stage::{FilterKind, STAGE_COUNT, Stages};
use crate::types::PipelineError;

/// Result of one [`Executor::recompute`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Kernel failures recovered during the run, in stage order. Each is
    /// a [`PipelineError::KernelFailure`].
    pub faults: Vec<PipelineError>,
    /// Timing and per-stage outcomes.
    pub diagnostics: RunDiagnostics,
}

impl RunReport {
    /// First stage index whose configuration changed since the previous
    /// run ([`STAGE_COUNT`] when nothing changed).
    #[must_use]
    pub const fn divergence(&self) -> usize {
        self.diagnostics.divergence
    }

    /// Where the run started.
    #[must_use]
    pub const fn start(&self) -> StartPoint {
        self.diagnostics.start
    }

    /// Whether the previous output was returned without running any
    /// stage.
    #[must_use]
    pub fn reused(&self) -> bool {
        self.diagnostics.start == StartPoint::Previous
    }

    /// Outcomes of the visited stages, in application order.
    pub fn outcomes(&self) -> impl Iterator<Item = (FilterKind, &StageOutcome)> {
        self.diagnostics.stages.iter().map(|s| (s.stage, &s.outcome))
    }
}

/// Configuration of the last completed run.
#[derive(Debug, Clone, Copy)]
struct Snapshot {
    source: SourceKey,
    stages: Stages,
}

/// Runs the fixed stage list over a source image, reusing cached stage
/// outputs where the configuration allows.
#[derive(Debug, Default)]
pub struct Executor<K = StandardKernels> {
    kernels: K,
    cache: PipelineCache,
    snapshot: Option<Snapshot>,
    output: Option<PixelBuffer>,
    /// First stage that failed in the last run; the next run restarts
    /// no later than this.
    faulted: Option<usize>,
}

impl Executor {
    /// An executor using the built-in filters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K: Kernels> Executor<K> {
    /// An executor dispatching through `kernels`.
    #[must_use]
    pub fn with_kernels(kernels: K) -> Self {
        Self {
            kernels,
            cache: PipelineCache::new(),
            snapshot: None,
            output: None,
            faulted: None,
        }
    }

    /// The kernel set.
    pub const fn kernels(&self) -> &K {
        &self.kernels
    }

    /// The per-stage cache.
    pub const fn cache(&self) -> &PipelineCache {
        &self.cache
    }

    /// Output of the most recent run, if any.
    pub const fn output(&self) -> Option<&PixelBuffer> {
        self.output.as_ref()
    }

    /// Forget all cached state; the next run starts from the source.
    pub fn reset(&mut self) {
        self.cache.clear();
        self.snapshot = None;
        self.output = None;
        self.faulted = None;
    }

    /// Bring the output up to date with `source` and `stages`.
    ///
    /// Never fails: a stage whose kernel errors, panics, or returns a
    /// wrongly sized buffer passes its input through unchanged and the
    /// failure is listed in [`RunReport::faults`].
    pub fn recompute(&mut self, source: &SourceImage, stages: &Stages) -> RunReport {
        let run_start = Instant::now();

        let divergence = match &self.snapshot {
            Some(prev) if prev.source == source.key() => stages.divergence_from(&prev.stages),
            Some(_) => {
                tracing::debug!("source changed; clearing cache");
                self.cache.clear();
                0
            }
            None => 0,
        };
        let divergence = match self.faulted.take() {
            Some(index) if index < divergence => {
                tracing::debug!(index, "retrying stage that failed last run");
                index
            }
            _ => divergence,
        };

        if divergence == STAGE_COUNT && self.output.is_some() {
            tracing::debug!("configuration unchanged; reusing previous output");
            return RunReport {
                faults: Vec::new(),
                diagnostics: RunDiagnostics {
                    image: source.buffer().dimensions(),
                    divergence,
                    start: StartPoint::Previous,
                    stages: Vec::new(),
                    total_duration: run_start.elapsed(),
                },
            };
        }

        if let Some(prev) = &self.snapshot
            && let Some(index) = first_disabled_transition(&prev.stages, stages)
        {
            tracing::debug!(index, "stage disabled; invalidating cache from here");
            self.cache.invalidate_from(index);
        }

        let (first, mut current, start) = self.starting_buffer(source, divergence);
        tracing::debug!(divergence, first, ?start, "recomputing");

        let mut faults = Vec::new();
        let mut first_fault = None;
        let mut visited = Vec::with_capacity(STAGE_COUNT - first);
        for (index, stage) in stages.iter().enumerate().skip(first) {
            let t = Instant::now();
            let outcome = if stage.enabled() {
                match self.run_kernel(stage.kind(), &current, stage.strength()) {
                    Ok(out) => {
                        current = out;
                        StageOutcome::Applied {
                            strength: stage.strength(),
                        }
                    }
                    Err(e) => {
                        tracing::warn!(stage = %stage.kind(), error = %e, "filter failed; passing input through");
                        let reason = e.to_string();
                        faults.push(e);
                        first_fault.get_or_insert(index);
                        StageOutcome::Failed { reason }
                    }
                }
            } else {
                StageOutcome::PassThrough
            };
            self.cache.store(index, current.clone());
            visited.push(StageDiagnostics {
                stage: stage.kind(),
                duration: t.elapsed(),
                outcome,
            });
        }

        // A pass-through substitute is only valid for this run.
        if let Some(index) = first_fault {
            self.cache.invalidate_from(index);
        }
        self.faulted = first_fault;
        self.output = Some(current);
        self.snapshot = Some(Snapshot {
            source: source.key(),
            stages: *stages,
        });

        RunReport {
            faults,
            diagnostics: RunDiagnostics {
                image: source.buffer().dimensions(),
                divergence,
                start,
                stages: visited,
                total_duration: run_start.elapsed(),
            },
        }
    }

    /// Pick the first stage to run and a private copy of its input.
    fn starting_buffer(
        &self,
        source: &SourceImage,
        divergence: usize,
    ) -> (usize, PixelBuffer, StartPoint) {
        if divergence > 0 {
            let before = divergence - 1;
            if let Some(cached) = self.cache.get(before) {
                return (divergence, cached.clone(), StartPoint::Cache { stage: before });
            }
            tracing::debug!(stage = before, "cache miss; restarting from source");
        }
        (0, source.buffer().clone(), StartPoint::Source)
    }

    /// Invoke one kernel, converting every failure mode into
    /// [`PipelineError::KernelFailure`].
    fn run_kernel(
        &self,
        kind: FilterKind,
        input: &PixelBuffer,
        strength: f64,
    ) -> Result<PixelBuffer, PipelineError> {
        let failure = |reason: String| PipelineError::KernelFailure {
            stage: kind,
            reason,
        };

        let out = panic::catch_unwind(AssertUnwindSafe(|| {
            self.kernels.apply(kind, input, strength)
        }))
        .map_err(|payload| failure(panic_message(payload.as_ref())))?
        .map_err(|e| match e {
            e @ PipelineError::KernelFailure { .. } => e,
            other => failure(other.to_string()),
        })?;

        if out.dimensions() != input.dimensions() {
            return Err(failure(format!(
                "output is {}x{}, expected {}x{}",
                out.width(),
                out.height(),
                input.width(),
                input.height(),
            )));
        }
        Ok(out)
    }
}

/// Index of the first stage enabled in `before` and disabled in `after`.
fn first_disabled_transition(before: &Stages, after: &Stages) -> Option<usize> {
    before
        .iter()
        .zip(after.iter())
        .position(|(b, a)| b.enabled() && !a.enabled())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .map_or_else(|| "kernel panicked".to_string(), |m| format!("kernel panicked: {m}"))
}

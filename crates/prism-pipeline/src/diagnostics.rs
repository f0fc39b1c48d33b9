//! Run diagnostics: timing and outcome for each stage of a recompute.
//!
//! Every [`Executor::recompute`](crate::Executor::recompute) call
//! collects these alongside its output. Only the stages the run
//! actually visited appear; stages served from the cache are not
//! listed.
//!
//! Timestamps are captured via the `web-time` crate, which uses
//! `performance.now()` on WASM and `std::time::Instant` on native.
//! Durations are serialized as fractional seconds (`f64`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::stage::FilterKind;
use crate::types::Dimensions;

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Where a run took its starting image from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum StartPoint {
    /// A fresh copy of the source image.
    Source,
    /// The cached output of stage `stage`.
    Cache {
        /// Index of the stage whose cached output was used.
        stage: usize,
    },
    /// Nothing changed; the previous output was returned as is.
    Previous,
}

/// What happened to one stage during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum StageOutcome {
    /// The filter ran and its output was used.
    Applied {
        /// Strength the filter ran at.
        strength: f64,
    },
    /// The stage is disabled; its input passed through untouched.
    PassThrough,
    /// The filter failed; its input passed through untouched.
    Failed {
        /// Failure description.
        reason: String,
    },
}

/// Diagnostics for a single visited stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// The stage's filter.
    pub stage: FilterKind,
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// What the stage did.
    pub outcome: StageOutcome,
}

/// Diagnostics collected from a single recompute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDiagnostics {
    /// Source image dimensions.
    pub image: Dimensions,
    /// First stage whose configuration changed.
    pub divergence: usize,
    /// Where the run started.
    pub start: StartPoint,
    /// Visited stages in application order.
    pub stages: Vec<StageDiagnostics>,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
}

impl RunDiagnostics {
    /// Number of stages whose filter actually ran.
    #[must_use]
    pub fn applied_count(&self) -> usize {
        self.stages
            .iter()
            .filter(|s| matches!(s.outcome, StageOutcome::Applied { .. }))
            .count()
    }

    /// Format a human-readable diagnostics report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Filter Run Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.image.width,
            self.image.height,
            self.image.pixel_count(),
        ));
        let start = match self.start {
            StartPoint::Source => "source".to_string(),
            StartPoint::Cache { stage } => format!("cache after stage {stage}"),
            StartPoint::Previous => "previous output (no changes)".to_string(),
        };
        lines.push(format!("Divergence: {}  |  Start: {start}", self.divergence));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<16} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Outcome"
        ));
        lines.push("-".repeat(60));

        let total_ms = duration_ms(self.total_duration);
        for diag in &self.stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let outcome = match &diag.outcome {
                StageOutcome::Applied { strength } => format!("applied strength={strength}"),
                StageOutcome::PassThrough => "pass-through".to_string(),
                StageOutcome::Failed { reason } => format!("FAILED: {reason}"),
            };
            let name = diag.stage.to_string();
            lines.push(format!("{name:<16} {ms:>8.3}ms {pct:>9.1}%  {outcome}"));
        }

        lines.join("\n")
    }
}

fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

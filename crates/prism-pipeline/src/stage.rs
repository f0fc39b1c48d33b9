//! The fixed stage list: which filters run, in what order, at what
//! strength.
//!
//! The pipeline always has exactly [`STAGE_COUNT`] stages in the order of
//! [`FilterKind::ALL`]. Stages are switched on and off and re-tuned, never
//! added, removed, or reordered.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::PipelineError;

/// Total number of stages in the pipeline.
pub const STAGE_COUNT: usize = 6;

/// The six filters, in pipeline application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterKind {
    /// 3×3 emboss convolution blended with the original.
    Emboss,
    /// Rotate every pixel's hue by a number of degrees.
    HueRotation,
    /// Scale every pixel's HSL saturation.
    Saturation,
    /// Snap channels to a reduced set of levels.
    Posterize,
    /// Separable Gaussian blur.
    Blur,
    /// Sepia matrix blended with the original.
    SepiaTone,
}

/// Compile-time guard: if a [`FilterKind`] variant is added, this match
/// becomes non-exhaustive and the build fails. Bump
/// [`STAGE_COUNT`] and extend [`FilterKind::ALL`] alongside it.
#[allow(dead_code)]
const fn _stage_count_guard(k: FilterKind) {
    match k {
        FilterKind::Emboss
        | FilterKind::HueRotation
        | FilterKind::Saturation
        | FilterKind::Posterize
        | FilterKind::Blur
        | FilterKind::SepiaTone => {}
    }
}

impl FilterKind {
    /// Every filter in application order.
    pub const ALL: [Self; STAGE_COUNT] = [
        Self::Emboss,
        Self::HueRotation,
        Self::Saturation,
        Self::Posterize,
        Self::Blur,
        Self::SepiaTone,
    ];

    /// Zero-based position of this filter in the pipeline.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Emboss => 0,
            Self::HueRotation => 1,
            Self::Saturation => 2,
            Self::Posterize => 3,
            Self::Blur => 4,
            Self::SepiaTone => 5,
        }
    }

    /// Stable identifier used in serialized configurations.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Emboss => "emboss",
            Self::HueRotation => "hueRotation",
            Self::Saturation => "saturation",
            Self::Posterize => "posterize",
            Self::Blur => "blur",
            Self::SepiaTone => "sepiaTone",
        }
    }

    /// Look a filter up by its identifier.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.id() == id)
    }

    /// Inclusive strength range accepted by this filter.
    #[must_use]
    pub const fn range(self) -> StrengthRange {
        match self {
            Self::HueRotation => StrengthRange::new(0.0, 360.0),
            Self::Emboss | Self::Saturation | Self::Posterize | Self::Blur | Self::SepiaTone => {
                StrengthRange::new(0.0, 100.0)
            }
        }
    }

    /// Strength a freshly created stage starts with.
    #[must_use]
    pub const fn default_strength(self) -> f64 {
        match self {
            Self::HueRotation => 180.0,
            Self::Emboss | Self::Saturation | Self::Posterize | Self::Blur | Self::SepiaTone => {
                50.0
            }
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Emboss => "emboss",
            Self::HueRotation => "hue rotation",
            Self::Saturation => "saturation",
            Self::Posterize => "posterize",
            Self::Blur => "blur",
            Self::SepiaTone => "sepia tone",
        })
    }
}

/// Inclusive `min..=max` strength bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrengthRange {
    /// Lowest accepted strength.
    pub min: f64,
    /// Highest accepted strength.
    pub max: f64,
}

impl StrengthRange {
    /// Create a range.
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Whether `value` is finite and within the bounds.
    #[must_use]
    pub fn contains(self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }

    /// Force `value` into the bounds. NaN becomes `min`.
    #[must_use]
    pub fn clamp(self, value: f64) -> f64 {
        if value.is_nan() {
            self.min
        } else {
            value.clamp(self.min, self.max)
        }
    }
}

/// Configuration of one pipeline stage.
///
/// The strength is private so it can only be set through validated
/// paths; a `StageConfig` always holds an in-range strength.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageConfig {
    id: FilterKind,
    enabled: bool,
    strength: f64,
}

impl StageConfig {
    /// Create a stage configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::StrengthOutOfRange`] if `strength` is not
    /// finite or lies outside the filter's range.
    pub fn new(kind: FilterKind, enabled: bool, strength: f64) -> Result<Self, PipelineError> {
        check_strength(kind, strength)?;
        Ok(Self {
            id: kind,
            enabled,
            strength,
        })
    }

    /// A disabled stage at its default strength.
    #[must_use]
    pub const fn default_for(kind: FilterKind) -> Self {
        Self {
            id: kind,
            enabled: false,
            strength: kind.default_strength(),
        }
    }

    /// Which filter this stage runs.
    #[must_use]
    pub const fn kind(&self) -> FilterKind {
        self.id
    }

    /// Whether the filter is applied.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// The filter strength.
    #[must_use]
    pub const fn strength(&self) -> f64 {
        self.strength
    }

    /// The filter's accepted strength range.
    #[must_use]
    pub const fn range(&self) -> StrengthRange {
        self.id.range()
    }

    /// Whether running this stage could produce different output than
    /// running `other`.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn differs_from(&self, other: &Self) -> bool {
        self.enabled != other.enabled || self.strength != other.strength
    }
}

fn check_strength(kind: FilterKind, strength: f64) -> Result<(), PipelineError> {
    let range = kind.range();
    if range.contains(strength) {
        Ok(())
    } else {
        Err(PipelineError::StrengthOutOfRange {
            stage: kind,
            strength,
            min: range.min,
            max: range.max,
        })
    }
}

/// A stage configuration as it arrives from outside: an arbitrary id and
/// an unchecked strength.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStageConfig {
    /// Filter identifier, e.g. `"hueRotation"`.
    pub id: String,
    /// Whether the filter is applied.
    #[serde(default)]
    pub enabled: bool,
    /// Requested strength; the filter default when absent.
    #[serde(default)]
    pub strength: Option<f64>,
}

/// The full, fixed-order stage list.
///
/// Deserializes from a list of [`RawStageConfig`]. Unknown ids are
/// skipped and only logged on that path; callers that need them back
/// should deserialize `Vec<RawStageConfig>` and use
/// [`Stages::from_raw`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<RawStageConfig>", into = "Vec<RawStageConfig>")]
pub struct Stages([StageConfig; STAGE_COUNT]);

impl Default for Stages {
    fn default() -> Self {
        Self(FilterKind::ALL.map(StageConfig::default_for))
    }
}

impl Stages {
    /// The stage at pipeline position `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&StageConfig> {
        self.0.get(index)
    }

    /// The stage running `kind`.
    #[must_use]
    pub const fn stage(&self, kind: FilterKind) -> &StageConfig {
        &self.0[kind.index()]
    }

    /// All stages in application order.
    #[must_use]
    pub const fn as_slice(&self) -> &[StageConfig] {
        &self.0
    }

    /// Iterate stages in application order.
    pub fn iter(&self) -> impl Iterator<Item = &StageConfig> {
        self.0.iter()
    }

    /// Turn a stage on or off.
    pub const fn set_enabled(&mut self, kind: FilterKind, enabled: bool) {
        self.0[kind.index()].enabled = enabled;
    }

    /// Change a stage's strength.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::StrengthOutOfRange`] and leaves the stage
    /// untouched if `strength` is outside the filter's range.
    pub fn set_strength(&mut self, kind: FilterKind, strength: f64) -> Result<(), PipelineError> {
        check_strength(kind, strength)?;
        self.0[kind.index()].strength = strength;
        Ok(())
    }

    /// Builder-style: enable `kind` at `strength`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::StrengthOutOfRange`] if `strength` is
    /// outside the filter's range.
    pub fn with(mut self, kind: FilterKind, strength: f64) -> Result<Self, PipelineError> {
        self.set_strength(kind, strength)?;
        self.set_enabled(kind, true);
        Ok(self)
    }

    /// Number of enabled stages.
    #[must_use]
    pub fn enabled_count(&self) -> usize {
        self.0.iter().filter(|s| s.enabled).count()
    }

    /// Whether this chain is expensive enough to warn about: more than
    /// three filters including the blur.
    #[must_use]
    pub fn is_heavy(&self) -> bool {
        self.enabled_count() > 3 && self.stage(FilterKind::Blur).enabled
    }

    /// Index of the first stage whose configuration differs from
    /// `previous`, or [`STAGE_COUNT`] if none does.
    #[must_use]
    pub fn divergence_from(&self, previous: &Self) -> usize {
        self.0
            .iter()
            .zip(previous.0.iter())
            .position(|(now, before)| now.differs_from(before))
            .unwrap_or(STAGE_COUNT)
    }

    /// Build a stage list from raw external configs.
    ///
    /// Stages not mentioned keep their defaults. Entries with an
    /// unrecognized id are skipped and returned as warnings; they never
    /// fail the whole list. When an id appears twice the later entry
    /// wins.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::StrengthOutOfRange`] if a recognized
    /// stage has an out-of-range strength.
    pub fn from_raw(raw: &[RawStageConfig]) -> Result<(Self, Vec<PipelineError>), PipelineError> {
        let mut stages = Self::default();
        let mut warnings = Vec::new();
        for entry in raw {
            let Some(kind) = FilterKind::from_id(&entry.id) else {
                tracing::warn!(id = %entry.id, "skipping unknown stage id");
                warnings.push(PipelineError::UnknownStageId(entry.id.clone()));
                continue;
            };
            let strength = entry.strength.unwrap_or_else(|| kind.default_strength());
            stages.set_strength(kind, strength)?;
            stages.set_enabled(kind, entry.enabled);
        }
        Ok((stages, warnings))
    }
}

/// Drops the unknown-id warnings from [`Stages::from_raw`].
impl TryFrom<Vec<RawStageConfig>> for Stages {
    type Error = PipelineError;

    fn try_from(raw: Vec<RawStageConfig>) -> Result<Self, Self::Error> {
        Self::from_raw(&raw).map(|(stages, _warnings)| stages)
    }
}

impl From<Stages> for Vec<RawStageConfig> {
    fn from(stages: Stages) -> Self {
        stages
            .iter()
            .map(|s| RawStageConfig {
                id: s.kind().id().to_string(),
                enabled: s.enabled(),
                strength: Some(s.strength()),
            })
            .collect()
    }
}

//! Run scheduling and change coalescing.
//!
//! Configuration changes are posted through [`Requester`] handles into a
//! single shared slot; each change bumps a generation counter. The
//! [`Scheduler`] drains the slot: it runs the executor against the latest
//! configuration and, when the run finishes, publishes the output only if
//! no newer change arrived meanwhile. A superseded run is followed by
//! exactly one more run with whatever configuration is current by then,
//! however many changes were posted in between.
//!
//! Everything is single-threaded. Handles share state through
//! `Rc<RefCell<_>>` and may be used from inside a kernel or an output
//! listener while a run is in progress.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::buffer::{PixelBuffer, SourceImage};
use crate::executor::{Executor, RunReport};
use crate::kernels::{Kernels, StandardKernels};
use crate::stage::{FilterKind, RawStageConfig, Stages};
use crate::types::PipelineError;

/// Whether a run is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    /// No run in progress.
    #[default]
    Idle,
    /// A run is in progress.
    Running,
}

/// The pending-request slot shared between the scheduler and its
/// requesters.
#[derive(Debug, Default)]
struct Shared {
    source: Option<Rc<SourceImage>>,
    stages: Stages,
    generation: u64,
    state: SchedulerState,
}

/// Cloneable handle for posting changes to a [`Scheduler`].
///
/// Every successful call supersedes any run currently in flight.
#[derive(Debug, Clone)]
pub struct Requester {
    shared: Rc<RefCell<Shared>>,
}

impl Requester {
    fn update(&self, f: impl FnOnce(&mut Shared)) {
        let mut shared = self.shared.borrow_mut();
        f(&mut shared);
        shared.generation += 1;
    }

    /// Replace the source image.
    pub fn set_source(&self, buffer: PixelBuffer) {
        let source = Rc::new(SourceImage::new(buffer));
        self.update(|s| s.source = Some(source));
    }

    /// Replace the whole stage list.
    pub fn set_stages(&self, stages: Stages) {
        self.update(|s| s.stages = stages);
    }

    /// Replace the stage list from raw external configs.
    ///
    /// Unknown ids are skipped and returned; see [`Stages::from_raw`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::StrengthOutOfRange`] without posting
    /// anything if a recognized stage has an out-of-range strength.
    pub fn set_raw_stages(
        &self,
        raw: &[RawStageConfig],
    ) -> Result<Vec<PipelineError>, PipelineError> {
        let (stages, warnings) = Stages::from_raw(raw)?;
        self.set_stages(stages);
        Ok(warnings)
    }

    /// Turn one stage on or off.
    pub fn set_enabled(&self, kind: FilterKind, enabled: bool) {
        self.update(|s| s.stages.set_enabled(kind, enabled));
    }

    /// Change one stage's strength.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::StrengthOutOfRange`] without posting
    /// anything if `strength` is outside the filter's range.
    pub fn set_strength(&self, kind: FilterKind, strength: f64) -> Result<(), PipelineError> {
        let mut shared = self.shared.borrow_mut();
        shared.stages.set_strength(kind, strength)?;
        shared.generation += 1;
        Ok(())
    }

    /// The most recently posted stage list.
    #[must_use]
    pub fn stages(&self) -> Stages {
        self.shared.borrow().stages
    }

    /// Current scheduler state.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.shared.borrow().state
    }

    /// Number of changes posted so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.shared.borrow().generation
    }
}

/// Listener invoked with an owned copy of each published output.
pub type OutputListener = Box<dyn FnMut(PixelBuffer)>;

/// Drives an [`Executor`] from coalesced change requests.
pub struct Scheduler<K = StandardKernels> {
    executor: Executor<K>,
    shared: Rc<RefCell<Shared>>,
    completed: u64,
    published: Option<PixelBuffer>,
    listeners: Vec<OutputListener>,
    superseded: u64,
}

impl<K: fmt::Debug> fmt::Debug for Scheduler<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("executor", &self.executor)
            .field("shared", &self.shared)
            .field("completed", &self.completed)
            .field("listeners", &self.listeners.len())
            .field("superseded", &self.superseded)
            .finish_non_exhaustive()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// A scheduler using the built-in filters.
    #[must_use]
    pub fn new() -> Self {
        Self::with_executor(Executor::new())
    }
}

impl<K: Kernels> Scheduler<K> {
    /// A scheduler driving `executor`.
    #[must_use]
    pub fn with_executor(executor: Executor<K>) -> Self {
        Self {
            executor,
            shared: Rc::new(RefCell::new(Shared::default())),
            completed: 0,
            published: None,
            listeners: Vec::new(),
            superseded: 0,
        }
    }

    /// A new handle for posting changes.
    #[must_use]
    pub fn requester(&self) -> Requester {
        Requester {
            shared: Rc::clone(&self.shared),
        }
    }

    /// Register a listener for published outputs.
    pub fn on_output(&mut self, listener: impl FnMut(PixelBuffer) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// The underlying executor.
    pub const fn executor(&self) -> &Executor<K> {
        &self.executor
    }

    /// Owned copy of the latest published output.
    #[must_use]
    pub fn current_output(&self) -> Option<PixelBuffer> {
        self.published.clone()
    }

    /// Whether changes have been posted since the last completed run.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.shared.borrow().generation != self.completed
    }

    /// Number of runs whose output was discarded because a newer change
    /// arrived while they were in flight.
    #[must_use]
    pub const fn superseded_runs(&self) -> u64 {
        self.superseded
    }

    /// Run until the output reflects the latest posted configuration.
    ///
    /// Returns the report of the last published run, or `None` if nothing
    /// was pending.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoSource`] if changes are pending but no
    /// source image has been supplied yet.
    pub fn run_pending(&mut self) -> Result<Option<RunReport>, PipelineError> {
        let mut last = None;
        loop {
            let (generation, source, stages) = {
                let shared = self.shared.borrow();
                if shared.generation == self.completed {
                    return Ok(last);
                }
                let source = shared.source.clone().ok_or(PipelineError::NoSource)?;
                (shared.generation, source, shared.stages)
            };

            if stages.is_heavy() {
                tracing::warn!(
                    enabled = stages.enabled_count(),
                    "blur combined with more than three filters; processing may be slow"
                );
            }

            self.set_state(SchedulerState::Running);
            let report = self.executor.recompute(&source, &stages);
            self.set_state(SchedulerState::Idle);
            self.completed = generation;

            if self.shared.borrow().generation != generation {
                tracing::debug!(generation, "run superseded; output not published");
                self.superseded += 1;
                continue;
            }

            if let Some(output) = self.executor.output() {
                self.published = Some(output.clone());
                for listener in &mut self.listeners {
                    listener(output.clone());
                }
            }
            last = Some(report);
        }
    }

    fn set_state(&self, state: SchedulerState) {
        self.shared.borrow_mut().state = state;
    }
}

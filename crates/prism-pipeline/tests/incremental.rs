//! Integration tests: incremental recompute, coalescing, and fault
//! recovery, observed through an instrumented kernel set.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use prism_pipeline::{
    Executor, FilterKind, Kernels, PipelineError, PixelBuffer, Scheduler, SchedulerState,
    SourceImage, StageOutcome, Stages, StandardKernels, StartPoint, apply_stages,
};

/// Runs the standard filters but records every call and can be told to
/// misbehave for one stage.
#[derive(Default)]
struct Instrumented {
    calls: RefCell<Vec<FilterKind>>,
    failing: Cell<Option<FilterKind>>,
    failing_once: Cell<Option<FilterKind>>,
    panicking: Cell<Option<FilterKind>>,
    resizing: Cell<Option<FilterKind>>,
    hook: RefCell<Option<(FilterKind, Box<dyn FnOnce()>)>>,
}

impl Instrumented {
    fn take_calls(&self) -> Vec<FilterKind> {
        self.calls.take()
    }

    /// Run `f` the next time `kind` is applied.
    fn arm(&self, kind: FilterKind, f: impl FnOnce() + 'static) {
        *self.hook.borrow_mut() = Some((kind, Box::new(f)));
    }
}

impl Kernels for Instrumented {
    fn apply(
        &self,
        kind: FilterKind,
        input: &PixelBuffer,
        strength: f64,
    ) -> Result<PixelBuffer, PipelineError> {
        self.calls.borrow_mut().push(kind);

        let hook = {
            let mut slot = self.hook.borrow_mut();
            if slot.as_ref().is_some_and(|(k, _)| *k == kind) {
                slot.take()
            } else {
                None
            }
        };
        if let Some((_, f)) = hook {
            f();
        }

        if self.failing_once.get() == Some(kind) {
            self.failing_once.set(None);
            return Err(PipelineError::KernelFailure {
                stage: kind,
                reason: "transient".to_string(),
            });
        }
        if self.failing.get() == Some(kind) {
            return Err(PipelineError::KernelFailure {
                stage: kind,
                reason: "injected".to_string(),
            });
        }
        if self.panicking.get() == Some(kind) {
            panic!("injected panic in {kind}");
        }
        if self.resizing.get() == Some(kind) {
            return PixelBuffer::filled(1, 1, [0, 0, 0, 255]);
        }
        StandardKernels.apply(kind, input, strength)
    }
}

fn gradient() -> PixelBuffer {
    PixelBuffer::from_fn(12, 10, |x, y| {
        [
            u8::try_from(x * 20).unwrap(),
            u8::try_from(y * 25).unwrap(),
            u8::try_from((x + y) * 10).unwrap(),
            255,
        ]
    })
    .unwrap()
}

/// Emboss, hue rotation, and saturation enabled: stages A, B, C.
fn abc() -> Stages {
    Stages::default()
        .with(FilterKind::Emboss, 40.0)
        .unwrap()
        .with(FilterKind::HueRotation, 90.0)
        .unwrap()
        .with(FilterKind::Saturation, 70.0)
        .unwrap()
}

#[test]
fn changing_only_the_last_enabled_stage_reruns_only_it() {
    let source = SourceImage::new(gradient());
    let mut exec = Executor::with_kernels(Instrumented::default());
    let mut stages = abc();

    exec.recompute(&source, &stages);
    assert_eq!(
        exec.kernels().take_calls(),
        vec![
            FilterKind::Emboss,
            FilterKind::HueRotation,
            FilterKind::Saturation
        ]
    );

    stages.set_strength(FilterKind::Saturation, 20.0).unwrap();
    let report = exec.recompute(&source, &stages);
    assert_eq!(report.divergence(), 2);
    assert_eq!(report.start(), StartPoint::Cache { stage: 1 });
    assert_eq!(exec.kernels().take_calls(), vec![FilterKind::Saturation]);

    let (fresh, _) = apply_stages(source.buffer(), &stages);
    assert_eq!(exec.output(), Some(&fresh));
}

#[test]
fn disable_then_reenable_reinvokes_the_stage() {
    let source = SourceImage::new(gradient());
    let mut exec = Executor::with_kernels(Instrumented::default());
    let mut stages = abc();
    exec.recompute(&source, &stages);
    exec.kernels().take_calls();

    stages.set_enabled(FilterKind::HueRotation, false);
    let report = exec.recompute(&source, &stages);
    assert_eq!(report.divergence(), 1);
    assert_eq!(exec.kernels().take_calls(), vec![FilterKind::Saturation]);
    let (without_hue, _) = apply_stages(source.buffer(), &stages);
    assert_eq!(exec.output(), Some(&without_hue));

    // Same strength as before; the filter must still run again.
    stages.set_enabled(FilterKind::HueRotation, true);
    let report = exec.recompute(&source, &stages);
    assert_eq!(report.divergence(), 1);
    assert_eq!(
        exec.kernels().take_calls(),
        vec![FilterKind::HueRotation, FilterKind::Saturation]
    );
    let (with_hue, _) = apply_stages(source.buffer(), &abc());
    assert_eq!(exec.output(), Some(&with_hue));
}

#[test]
fn disabled_stages_never_call_kernels() {
    let source = SourceImage::new(gradient());
    let mut exec = Executor::with_kernels(Instrumented::default());
    let mut stages = Stages::default();
    stages.set_strength(FilterKind::Blur, 90.0).unwrap();

    let report = exec.recompute(&source, &stages);
    assert!(exec.kernels().take_calls().is_empty());
    assert_eq!(exec.output(), Some(source.buffer()));
    assert_eq!(report.outcomes().count(), 6);
}

#[test]
fn unchanged_configuration_calls_nothing() {
    let source = SourceImage::new(gradient());
    let mut exec = Executor::with_kernels(Instrumented::default());
    exec.recompute(&source, &abc());
    exec.kernels().take_calls();

    let report = exec.recompute(&source, &abc());
    assert!(report.reused());
    assert!(exec.kernels().take_calls().is_empty());
}

#[test]
fn new_source_recomputes_from_the_first_stage() {
    let mut exec = Executor::with_kernels(Instrumented::default());
    exec.recompute(&SourceImage::new(gradient()), &abc());
    exec.kernels().take_calls();

    let other = SourceImage::new(PixelBuffer::filled(12, 10, [9, 99, 199, 255]).unwrap());
    let report = exec.recompute(&other, &abc());
    assert_eq!(report.divergence(), 0);
    assert_eq!(exec.kernels().take_calls().len(), 3);
    let (fresh, _) = apply_stages(other.buffer(), &abc());
    assert_eq!(exec.output(), Some(&fresh));
}

#[test]
fn kernel_error_becomes_pass_through() {
    let source = SourceImage::new(gradient());
    let kernels = Instrumented::default();
    kernels.failing.set(Some(FilterKind::HueRotation));
    let mut exec = Executor::with_kernels(kernels);

    let report = exec.recompute(&source, &abc());
    assert_eq!(report.faults.len(), 1);
    assert!(matches!(
        report.faults[0],
        PipelineError::KernelFailure {
            stage: FilterKind::HueRotation,
            ..
        }
    ));
    assert!(report.outcomes().any(|(kind, outcome)| {
        kind == FilterKind::HueRotation && matches!(outcome, StageOutcome::Failed { .. })
    }));

    let mut without_hue = abc();
    without_hue.set_enabled(FilterKind::HueRotation, false);
    let (expected, _) = apply_stages(source.buffer(), &without_hue);
    assert_eq!(exec.output(), Some(&expected));
}

#[test]
fn failed_stage_is_retried_on_the_next_run() {
    let source = SourceImage::new(PixelBuffer::filled(4, 4, [100, 150, 200, 255]).unwrap());
    let stages = Stages::default()
        .with(FilterKind::HueRotation, 180.0)
        .unwrap()
        .with(FilterKind::SepiaTone, 40.0)
        .unwrap();
    let kernels = Instrumented::default();
    kernels.failing_once.set(Some(FilterKind::HueRotation));
    let mut exec = Executor::with_kernels(kernels);

    let report = exec.recompute(&source, &stages);
    assert_eq!(report.faults.len(), 1);
    assert!(!exec.cache().contains(FilterKind::HueRotation.index()));
    exec.kernels().take_calls();

    // Same configuration: the failed stage runs again instead of the
    // pass-through output being reused.
    let report = exec.recompute(&source, &stages);
    assert!(!report.reused());
    assert!(report.faults.is_empty());
    assert_eq!(report.divergence(), FilterKind::HueRotation.index());
    assert_eq!(
        exec.kernels().take_calls(),
        vec![FilterKind::HueRotation, FilterKind::SepiaTone]
    );
    let (expected, _) = apply_stages(source.buffer(), &stages);
    assert_eq!(exec.output(), Some(&expected));

    // Once healthy, the result is reused as usual.
    assert!(exec.recompute(&source, &stages).reused());
}

#[test]
fn downstream_edit_after_failure_does_not_resume_from_pass_through() {
    let source = SourceImage::new(PixelBuffer::filled(4, 4, [100, 150, 200, 255]).unwrap());
    let mut stages = Stages::default()
        .with(FilterKind::HueRotation, 180.0)
        .unwrap()
        .with(FilterKind::SepiaTone, 40.0)
        .unwrap();
    let kernels = Instrumented::default();
    kernels.failing_once.set(Some(FilterKind::HueRotation));
    let mut exec = Executor::with_kernels(kernels);
    exec.recompute(&source, &stages);
    exec.kernels().take_calls();

    stages.set_strength(FilterKind::SepiaTone, 70.0).unwrap();
    let report = exec.recompute(&source, &stages);
    assert!(report.faults.is_empty());
    assert_eq!(report.divergence(), FilterKind::HueRotation.index());
    assert_eq!(
        exec.kernels().take_calls(),
        vec![FilterKind::HueRotation, FilterKind::SepiaTone]
    );
    let (expected, _) = apply_stages(source.buffer(), &stages);
    assert_eq!(exec.output(), Some(&expected));
}

#[test]
fn kernel_panic_becomes_pass_through() {
    let source = SourceImage::new(gradient());
    let kernels = Instrumented::default();
    kernels.panicking.set(Some(FilterKind::Emboss));
    let mut exec = Executor::with_kernels(kernels);

    let report = exec.recompute(&source, &abc());
    assert_eq!(report.faults.len(), 1);
    let PipelineError::KernelFailure { stage, reason } = &report.faults[0] else {
        panic!("expected a kernel failure, got {:?}", report.faults[0]);
    };
    assert_eq!(*stage, FilterKind::Emboss);
    assert!(reason.contains("injected panic"), "{reason}");

    // Later stages still ran.
    assert_eq!(
        exec.kernels().take_calls(),
        vec![
            FilterKind::Emboss,
            FilterKind::HueRotation,
            FilterKind::Saturation
        ]
    );
}

#[test]
fn resized_kernel_output_is_rejected() {
    let source = SourceImage::new(gradient());
    let kernels = Instrumented::default();
    kernels.resizing.set(Some(FilterKind::Saturation));
    let mut exec = Executor::with_kernels(kernels);

    let report = exec.recompute(&source, &abc());
    assert_eq!(report.faults.len(), 1);
    assert_eq!(
        exec.output().unwrap().dimensions(),
        source.buffer().dimensions()
    );
}

#[test]
fn change_during_run_supersedes_and_runs_once_more() {
    let mut scheduler = Scheduler::with_executor(Executor::with_kernels(Instrumented::default()));
    let requester = scheduler.requester();

    let published = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&published);
    scheduler.on_output(move |out| sink.borrow_mut().push(out));

    requester.set_source(gradient());
    requester.set_stages(abc());

    // Two changes land while hue rotation is running; only the latest
    // should be rendered.
    let observed_state = Rc::new(Cell::new(SchedulerState::Idle));
    let seen = Rc::clone(&observed_state);
    let inner = requester.clone();
    scheduler
        .executor()
        .kernels()
        .arm(FilterKind::HueRotation, move || {
            seen.set(inner.state());
            inner.set_strength(FilterKind::HueRotation, 200.0).unwrap();
            inner.set_strength(FilterKind::HueRotation, 300.0).unwrap();
        });

    let report = scheduler.run_pending().unwrap().unwrap();
    assert_eq!(observed_state.get(), SchedulerState::Running);
    assert_eq!(scheduler.superseded_runs(), 1);
    assert_eq!(report.divergence(), 1);
    assert_eq!(
        scheduler.executor().kernels().take_calls(),
        vec![
            // Superseded run, which still finishes.
            FilterKind::Emboss,
            FilterKind::HueRotation,
            FilterKind::Saturation,
            // The single follow-up, resuming after emboss.
            FilterKind::HueRotation,
            FilterKind::Saturation,
        ]
    );

    let mut latest = abc();
    latest.set_strength(FilterKind::HueRotation, 300.0).unwrap();
    let (expected, _) = apply_stages(&gradient(), &latest);
    assert_eq!(*published.borrow(), vec![expected.clone()]);
    assert_eq!(scheduler.current_output(), Some(expected));
    assert!(!scheduler.has_pending());
    assert_eq!(requester.state(), SchedulerState::Idle);
}

#[test]
fn hue_rotation_golden_value_through_scheduler() {
    let mut scheduler = Scheduler::new();
    let requester = scheduler.requester();
    requester.set_source(PixelBuffer::filled(2, 2, [100, 150, 200, 255]).unwrap());
    requester.set_strength(FilterKind::HueRotation, 180.0).unwrap();
    requester.set_enabled(FilterKind::HueRotation, true);
    scheduler.run_pending().unwrap();

    let out = scheduler.current_output().unwrap();
    assert!(out.pixels().all(|p| p == [200, 150, 100, 255]));
}

#[test]
fn heavy_chain_still_completes() {
    let mut stages = Stages::default();
    for kind in FilterKind::ALL {
        stages.set_enabled(kind, true);
    }
    assert!(stages.is_heavy());

    let mut scheduler = Scheduler::new();
    let requester = scheduler.requester();
    requester.set_source(gradient());
    requester.set_stages(stages);
    let report = scheduler.run_pending().unwrap().unwrap();
    assert!(report.faults.is_empty());
    assert_eq!(report.diagnostics.applied_count(), 6);
}

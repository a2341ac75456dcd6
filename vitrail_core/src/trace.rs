// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for compositing passes.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! compositor calls while it schedules and runs passes. All method bodies
//! default to no-ops, so implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing. When **on**, each
//! method performs a single `Option` branch before dispatching.
//!
//! [`PassSummaryBuilder`] collects phase timestamps during a pass and
//! produces a [`PassSummary`] at the end.

use crate::output::OutputId;
use crate::presentation::PresentationData;
use crate::time::{Duration, HostTime};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which phase of a compositing pass is being measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    /// Fetching window damage and collecting repaint regions.
    Fetch,
    /// Running the effect chain and drawing windows.
    Paint,
    /// Handing the frame to the display.
    Present,
}

/// Why the compositor armed a timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Coalescing delay before the next pass.
    Composite,
    /// Deferred release of the compositing selection.
    SelectionRelease,
    /// Deferred deletion of unused support properties.
    SupportCleanup,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when a pass starts.
#[derive(Clone, Copy, Debug)]
pub struct PassBeginEvent {
    /// Monotonic pass counter.
    pub pass_index: u64,
    /// Output being painted; `None` for the whole-screen variant.
    pub output: Option<OutputId>,
    /// Host time when the pass started.
    pub timestamp: HostTime,
}

/// Marks the beginning of a pass phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseBeginEvent {
    /// Pass counter.
    pub pass_index: u64,
    /// Which phase is starting.
    pub phase: PhaseKind,
    /// Host time at the start of the phase.
    pub timestamp: HostTime,
}

/// Marks the end of a pass phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseEndEvent {
    /// Pass counter.
    pub pass_index: u64,
    /// Which phase is ending.
    pub phase: PhaseKind,
    /// Host time at the end of the phase.
    pub timestamp: HostTime,
}

/// Emitted when a timer deadline is set.
#[derive(Clone, Copy, Debug)]
pub struct TimerArmedEvent {
    /// Timer purpose.
    pub kind: TimerKind,
    /// Output the timer belongs to, if any.
    pub output: Option<OutputId>,
    /// Host time at which the timer was armed.
    pub armed_at: HostTime,
    /// Host time at which the timer fires.
    pub deadline: HostTime,
}

/// Emitted when a buffer swap completes and the next pass may be scheduled.
#[derive(Clone, Copy, Debug)]
pub struct SwapCompleteEvent {
    /// Output whose swap completed; `None` for the whole-screen variant.
    pub output: Option<OutputId>,
    /// Host time of the notification.
    pub timestamp: HostTime,
    /// Delay chosen for the next pass.
    pub next_delay: Duration,
}

/// Emitted when presentation feedback arrives from the display.
#[derive(Clone, Copy, Debug)]
pub struct PresentFeedbackEvent {
    /// Output the frame was shown on.
    pub output: OutputId,
    /// Feedback as reported by the backend.
    pub data: PresentationData,
    /// Number of surfaces the feedback was delivered to.
    pub surfaces: u32,
}

/// Per-pass timing summary produced by [`PassSummaryBuilder`].
#[derive(Clone, Copy, Debug)]
pub struct PassSummary {
    /// Pass counter.
    pub pass_index: u64,
    /// Output painted, if the pass targeted one.
    pub output: Option<OutputId>,
    /// Host time when the pass started.
    pub started: HostTime,
    /// Fetch phase duration in nanoseconds (0 if not measured).
    pub fetch_nanos: u64,
    /// Paint phase duration in nanoseconds (0 if not measured).
    pub paint_nanos: u64,
    /// Present phase duration in nanoseconds (0 if not measured).
    pub present_nanos: u64,
    /// Windows painted.
    pub window_count: u32,
    /// Pixels in the repaint region.
    pub damage_area: i64,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the compositor.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when a pass starts.
    fn on_pass_begin(&mut self, e: &PassBeginEvent) {
        _ = e;
    }

    /// Called at the beginning of a pass phase.
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        _ = e;
    }

    /// Called at the end of a pass phase.
    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        _ = e;
    }

    /// Called when a timer is armed.
    fn on_timer_armed(&mut self, e: &TimerArmedEvent) {
        _ = e;
    }

    /// Called when a buffer swap completes.
    fn on_swap_complete(&mut self, e: &SwapCompleteEvent) {
        _ = e;
    }

    /// Called when presentation feedback arrives.
    fn on_present_feedback(&mut self, e: &PresentFeedbackEvent) {
        _ = e;
    }

    /// Called with a per-pass timing summary.
    fn on_pass_summary(&mut self, s: &PassSummary) {
        _ = s;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

macro_rules! dispatch {
    ($self:ident, $method:ident, $e:ident) => {{
        #[cfg(feature = "trace")]
        if let Some(s) = &mut $self.sink {
            s.$method($e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = $e;
        }
    }};
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that dispatches to `sink` when present.
    #[inline]
    #[must_use]
    pub fn from_option(sink: Option<&'a mut dyn TraceSink>) -> Self {
        match sink {
            Some(sink) => Self::new(sink),
            None => Self::none(),
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`PassBeginEvent`].
    #[inline]
    pub fn pass_begin(&mut self, e: &PassBeginEvent) {
        dispatch!(self, on_pass_begin, e);
    }

    /// Emits a [`PhaseBeginEvent`].
    #[inline]
    pub fn phase_begin(&mut self, e: &PhaseBeginEvent) {
        dispatch!(self, on_phase_begin, e);
    }

    /// Emits a [`PhaseEndEvent`].
    #[inline]
    pub fn phase_end(&mut self, e: &PhaseEndEvent) {
        dispatch!(self, on_phase_end, e);
    }

    /// Emits a [`TimerArmedEvent`].
    #[inline]
    pub fn timer_armed(&mut self, e: &TimerArmedEvent) {
        dispatch!(self, on_timer_armed, e);
    }

    /// Emits a [`SwapCompleteEvent`].
    #[inline]
    pub fn swap_complete(&mut self, e: &SwapCompleteEvent) {
        dispatch!(self, on_swap_complete, e);
    }

    /// Emits a [`PresentFeedbackEvent`].
    #[inline]
    pub fn present_feedback(&mut self, e: &PresentFeedbackEvent) {
        dispatch!(self, on_present_feedback, e);
    }

    /// Emits a [`PassSummary`].
    #[inline]
    pub fn pass_summary(&mut self, s: &PassSummary) {
        dispatch!(self, on_pass_summary, s);
    }
}

// ---------------------------------------------------------------------------
// PassSummaryBuilder
// ---------------------------------------------------------------------------

/// Collects phase timestamps during a pass and produces a [`PassSummary`].
#[derive(Debug)]
pub struct PassSummaryBuilder {
    begin: PassBeginEvent,
    phase_starts: [Option<HostTime>; 3],
    phase_ends: [Option<HostTime>; 3],
    window_count: u32,
    damage_area: i64,
}

impl PassSummaryBuilder {
    /// Starts building a summary for the given pass.
    #[must_use]
    pub fn new(begin: &PassBeginEvent) -> Self {
        Self {
            begin: *begin,
            phase_starts: [None; 3],
            phase_ends: [None; 3],
            window_count: 0,
            damage_area: 0,
        }
    }

    /// Records the start of a phase.
    pub fn phase_begin(&mut self, phase: PhaseKind, t: HostTime) {
        self.phase_starts[phase_index(phase)] = Some(t);
    }

    /// Records the end of a phase.
    pub fn phase_end(&mut self, phase: PhaseKind, t: HostTime) {
        self.phase_ends[phase_index(phase)] = Some(t);
    }

    /// Records how much was painted.
    pub fn set_painted(&mut self, window_count: u32, damage_area: i64) {
        self.window_count = window_count;
        self.damage_area = damage_area;
    }

    /// Consumes the builder and produces the final [`PassSummary`].
    #[must_use]
    pub fn finish(self) -> PassSummary {
        PassSummary {
            pass_index: self.begin.pass_index,
            output: self.begin.output,
            started: self.begin.timestamp,
            fetch_nanos: self.phase_duration(PhaseKind::Fetch),
            paint_nanos: self.phase_duration(PhaseKind::Paint),
            present_nanos: self.phase_duration(PhaseKind::Present),
            window_count: self.window_count,
            damage_area: self.damage_area,
        }
    }

    fn phase_duration(&self, phase: PhaseKind) -> u64 {
        let idx = phase_index(phase);
        match (self.phase_starts[idx], self.phase_ends[idx]) {
            (Some(start), Some(end)) => end.saturating_duration_since(start).nanos(),
            _ => 0,
        }
    }
}

const fn phase_index(phase: PhaseKind) -> usize {
    match phase {
        PhaseKind::Fetch => 0,
        PhaseKind::Paint => 1,
        PhaseKind::Present => 2,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

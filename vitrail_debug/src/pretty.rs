// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Host times
//! are printed in microseconds.

use std::io::Write;

use vitrail_core::output::OutputId;
use vitrail_core::time::{Duration, HostTime};
use vitrail_core::trace::{
    PassBeginEvent, PassSummary, PhaseBeginEvent, PhaseEndEvent, PhaseKind, PresentFeedbackEvent,
    SwapCompleteEvent, TimerArmedEvent, TimerKind, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns its destination.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn us(nanos: u64) -> f64 {
    nanos as f64 / 1000.0
}

fn at(t: HostTime) -> f64 {
    us(t.0)
}

fn dur(d: Duration) -> f64 {
    us(d.0)
}

fn output_name(output: Option<OutputId>) -> String {
    output.map_or_else(|| "all".to_owned(), |o| o.0.to_string())
}

fn phase_name(phase: PhaseKind) -> &'static str {
    match phase {
        PhaseKind::Fetch => "fetch",
        PhaseKind::Paint => "paint",
        PhaseKind::Present => "present",
    }
}

fn timer_name(kind: TimerKind) -> &'static str {
    match kind {
        TimerKind::Composite => "composite",
        TimerKind::SelectionRelease => "selection-release",
        TimerKind::SupportCleanup => "support-cleanup",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_pass_begin(&mut self, e: &PassBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[pass] #{} output={} at {:.1}µs",
            e.pass_index,
            output_name(e.output),
            at(e.timestamp),
        );
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:begin] #{} {} at {:.1}µs",
            e.pass_index,
            phase_name(e.phase),
            at(e.timestamp),
        );
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:end] #{} {} at {:.1}µs",
            e.pass_index,
            phase_name(e.phase),
            at(e.timestamp),
        );
    }

    fn on_timer_armed(&mut self, e: &TimerArmedEvent) {
        let _ = writeln!(
            self.writer,
            "[timer] {} output={} in {:.1}µs",
            timer_name(e.kind),
            output_name(e.output),
            dur(e.deadline.saturating_duration_since(e.armed_at)),
        );
    }

    fn on_swap_complete(&mut self, e: &SwapCompleteEvent) {
        let _ = writeln!(
            self.writer,
            "[swap] output={} at {:.1}µs next in {:.1}µs",
            output_name(e.output),
            at(e.timestamp),
            dur(e.next_delay),
        );
    }

    fn on_present_feedback(&mut self, e: &PresentFeedbackEvent) {
        let _ = writeln!(
            self.writer,
            "[feedback] output={} msc={} at {:.1}µs surfaces={} kinds={:?}",
            e.output.0,
            e.data.sequence,
            at(e.data.timestamp),
            e.surfaces,
            e.data.kinds,
        );
    }

    fn on_pass_summary(&mut self, s: &PassSummary) {
        let _ = writeln!(
            self.writer,
            "[summary] #{} output={} fetch={:.1}µs paint={:.1}µs present={:.1}µs \
             windows={} damage={}px",
            s.pass_index,
            output_name(s.output),
            us(s.fetch_nanos),
            us(s.paint_nanos),
            us(s.present_nanos),
            s.window_count,
            s.damage_area,
        );
    }
}

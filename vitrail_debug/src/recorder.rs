// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and appends every event to a
//! `Vec<u8>` as a tagged little-endian record. [`decode`] reads them back as
//! an iterator of [`RecordedEvent`].

use vitrail_core::output::OutputId;
use vitrail_core::presentation::{PresentationData, PresentationKinds};
use vitrail_core::time::{Duration, HostTime};
use vitrail_core::trace::{
    PassBeginEvent, PassSummary, PhaseBeginEvent, PhaseEndEvent, PhaseKind, PresentFeedbackEvent,
    SwapCompleteEvent, TimerArmedEvent, TimerKind, TraceSink,
};

const TAG_PASS_BEGIN: u8 = 1;
const TAG_PHASE_BEGIN: u8 = 2;
const TAG_PHASE_END: u8 = 3;
const TAG_TIMER_ARMED: u8 = 4;
const TAG_SWAP_COMPLETE: u8 = 5;
const TAG_PRESENT_FEEDBACK: u8 = 6;
const TAG_PASS_SUMMARY: u8 = 7;

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_output(&mut self, output: Option<OutputId>) {
        match output {
            Some(id) => {
                self.write_u8(1);
                self.write_u32(id.0);
            }
            None => {
                self.write_u8(0);
                self.write_u32(0);
            }
        }
    }

    fn write_phase(&mut self, p: PhaseKind) {
        self.write_u8(match p {
            PhaseKind::Fetch => 0,
            PhaseKind::Paint => 1,
            PhaseKind::Present => 2,
        });
    }

    fn write_timer(&mut self, k: TimerKind) {
        self.write_u8(match k {
            TimerKind::Composite => 0,
            TimerKind::SelectionRelease => 1,
            TimerKind::SupportCleanup => 2,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_pass_begin(&mut self, e: &PassBeginEvent) {
        self.write_u8(TAG_PASS_BEGIN);
        self.write_u64(e.pass_index);
        self.write_output(e.output);
        self.write_u64(e.timestamp.0);
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.write_u8(TAG_PHASE_BEGIN);
        self.write_u64(e.pass_index);
        self.write_phase(e.phase);
        self.write_u64(e.timestamp.0);
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.write_u8(TAG_PHASE_END);
        self.write_u64(e.pass_index);
        self.write_phase(e.phase);
        self.write_u64(e.timestamp.0);
    }

    fn on_timer_armed(&mut self, e: &TimerArmedEvent) {
        self.write_u8(TAG_TIMER_ARMED);
        self.write_timer(e.kind);
        self.write_output(e.output);
        self.write_u64(e.armed_at.0);
        self.write_u64(e.deadline.0);
    }

    fn on_swap_complete(&mut self, e: &SwapCompleteEvent) {
        self.write_u8(TAG_SWAP_COMPLETE);
        self.write_output(e.output);
        self.write_u64(e.timestamp.0);
        self.write_u64(e.next_delay.0);
    }

    fn on_present_feedback(&mut self, e: &PresentFeedbackEvent) {
        self.write_u8(TAG_PRESENT_FEEDBACK);
        self.write_u32(e.output.0);
        self.write_u64(e.data.sequence);
        self.write_u64(e.data.timestamp.0);
        self.write_u64(e.data.refresh.0);
        self.write_u32(e.data.kinds.bits());
        self.write_u32(e.surfaces);
    }

    fn on_pass_summary(&mut self, s: &PassSummary) {
        self.write_u8(TAG_PASS_SUMMARY);
        self.write_u64(s.pass_index);
        self.write_output(s.output);
        self.write_u64(s.started.0);
        self.write_u64(s.fetch_nanos);
        self.write_u64(s.paint_nanos);
        self.write_u64(s.present_nanos);
        self.write_u32(s.window_count);
        self.write_i64(s.damage_area);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug)]
pub enum RecordedEvent {
    /// A [`PassBeginEvent`].
    PassBegin(PassBeginEvent),
    /// A [`PhaseBeginEvent`].
    PhaseBegin(PhaseBeginEvent),
    /// A [`PhaseEndEvent`].
    PhaseEnd(PhaseEndEvent),
    /// A [`TimerArmedEvent`].
    TimerArmed(TimerArmedEvent),
    /// A [`SwapCompleteEvent`].
    SwapComplete(SwapCompleteEvent),
    /// A [`PresentFeedbackEvent`].
    PresentFeedback(PresentFeedbackEvent),
    /// A [`PassSummary`].
    PassSummary(PassSummary),
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
///
/// Decoding stops at the first unknown tag or truncated record.
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let end = self.pos.checked_add(N)?;
        let bytes = self.data.get(self.pos..end)?.try_into().ok()?;
        self.pos = end;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[v]| v)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_le_bytes)
    }

    fn read_i64(&mut self) -> Option<i64> {
        self.take().map(i64::from_le_bytes)
    }

    fn read_time(&mut self) -> Option<HostTime> {
        self.read_u64().map(HostTime)
    }

    fn read_output(&mut self) -> Option<Option<OutputId>> {
        let present = self.read_u8()?;
        let id = self.read_u32()?;
        Some((present != 0).then_some(OutputId(id)))
    }

    fn read_phase(&mut self) -> Option<PhaseKind> {
        Some(match self.read_u8()? {
            0 => PhaseKind::Fetch,
            1 => PhaseKind::Paint,
            _ => PhaseKind::Present,
        })
    }

    fn read_timer(&mut self) -> Option<TimerKind> {
        Some(match self.read_u8()? {
            0 => TimerKind::Composite,
            1 => TimerKind::SelectionRelease,
            _ => TimerKind::SupportCleanup,
        })
    }

    fn decode_pass_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PassBegin(PassBeginEvent {
            pass_index: self.read_u64()?,
            output: self.read_output()?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_phase_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseBegin(PhaseBeginEvent {
            pass_index: self.read_u64()?,
            phase: self.read_phase()?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_phase_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseEnd(PhaseEndEvent {
            pass_index: self.read_u64()?,
            phase: self.read_phase()?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_timer_armed(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::TimerArmed(TimerArmedEvent {
            kind: self.read_timer()?,
            output: self.read_output()?,
            armed_at: self.read_time()?,
            deadline: self.read_time()?,
        }))
    }

    fn decode_swap_complete(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::SwapComplete(SwapCompleteEvent {
            output: self.read_output()?,
            timestamp: self.read_time()?,
            next_delay: Duration(self.read_u64()?),
        }))
    }

    fn decode_present_feedback(&mut self) -> Option<RecordedEvent> {
        let output = OutputId(self.read_u32()?);
        let data = PresentationData {
            sequence: self.read_u64()?,
            timestamp: self.read_time()?,
            refresh: Duration(self.read_u64()?),
            kinds: PresentationKinds::from_bits_truncate(self.read_u32()?),
        };
        Some(RecordedEvent::PresentFeedback(PresentFeedbackEvent {
            output,
            data,
            surfaces: self.read_u32()?,
        }))
    }

    fn decode_pass_summary(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PassSummary(PassSummary {
            pass_index: self.read_u64()?,
            output: self.read_output()?,
            started: self.read_time()?,
            fetch_nanos: self.read_u64()?,
            paint_nanos: self.read_u64()?,
            present_nanos: self.read_u64()?,
            window_count: self.read_u32()?,
            damage_area: self.read_i64()?,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_u8()? {
            TAG_PASS_BEGIN => self.decode_pass_begin(),
            TAG_PHASE_BEGIN => self.decode_phase_begin(),
            TAG_PHASE_END => self.decode_phase_end(),
            TAG_TIMER_ARMED => self.decode_timer_armed(),
            TAG_SWAP_COMPLETE => self.decode_swap_complete(),
            TAG_PRESENT_FEEDBACK => self.decode_present_feedback(),
            TAG_PASS_SUMMARY => self.decode_pass_summary(),
            _ => None,
        }
    }
}

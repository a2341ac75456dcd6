// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame callbacks and presentation feedback for clients.
//!
//! Every painted window is acknowledged on exactly one output: the one its
//! visible rect overlaps the most. When a frame is handed to the display,
//! [`Presentation::lock`] sends the frame callbacks of the windows that
//! belong to the output and assigns their outstanding feedback requests to
//! it. When the display reports the frame as shown,
//! [`Presentation::presented`] delivers the feedback and clears the
//! assignment.
//!
//! Events wait in an outbox until [`Presentation::take_events`]. Frame
//! callbacks a window has not collected yet are merged, so a slow consumer
//! never sees more than one callback per window.

use hashbrown::HashMap;
use tracing::trace;
use vitrail_core::output::{ClockId, OutputId, OutputInfo, max_coverage_output};
use vitrail_core::presentation::{PresentationData, PresentationKinds};
use vitrail_core::time::HostTime;
use vitrail_core::window::{Window, WindowId};

/// Identifies one presentation-feedback request of a client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeedbackId(pub u64);

/// Event for the protocol layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PresentEvent {
    /// The window's current content was used for a frame.
    FrameRendered {
        /// The window to acknowledge.
        window: WindowId,
        /// Milliseconds on the presentation clock, wrapping at 32 bits.
        time_ms: u32,
    },
    /// A frame containing the window was shown.
    Presented {
        /// The requesting window.
        window: WindowId,
        /// The request being answered.
        id: FeedbackId,
        /// Output the frame was shown on.
        output: OutputId,
        /// How and when it was shown.
        data: PresentationData,
    },
    /// The request will never be answered, e.g. because its output went
    /// away.
    Discarded {
        /// The requesting window.
        window: WindowId,
        /// The request being dropped.
        id: FeedbackId,
    },
}

impl PresentEvent {
    /// The window the event is addressed to.
    #[must_use]
    pub fn window(&self) -> WindowId {
        match *self {
            Self::FrameRendered { window, .. }
            | Self::Presented { window, .. }
            | Self::Discarded { window, .. } => window,
        }
    }
}

/// Events waiting for the protocol layer.
///
/// A window has at most one frame callback waiting: a later frame updates
/// the timestamp of the earlier callback in place. Feedback answers are
/// never merged, so the outbox is bounded by the number of windows plus the
/// number of open feedback requests.
#[derive(Debug, Default)]
struct Outbox {
    events: Vec<PresentEvent>,
    callbacks: HashMap<WindowId, usize>,
    merged: u64,
}

impl Outbox {
    fn frame_rendered(&mut self, window: WindowId, time_ms: u32) {
        if let Some(&slot) = self.callbacks.get(&window) {
            self.events[slot] = PresentEvent::FrameRendered { window, time_ms };
            self.merged += 1;
            return;
        }
        self.callbacks.insert(window, self.events.len());
        self.events.push(PresentEvent::FrameRendered { window, time_ms });
    }

    fn answer(&mut self, event: PresentEvent) {
        self.events.push(event);
    }

    fn forget(&mut self, window: WindowId) {
        self.events.retain(|event| event.window() != window);
        self.callbacks.clear();
        for (slot, event) in self.events.iter().enumerate() {
            if let PresentEvent::FrameRendered { window, .. } = *event {
                self.callbacks.insert(window, slot);
            }
        }
    }

    fn take(&mut self) -> Vec<PresentEvent> {
        self.callbacks.clear();
        core::mem::take(&mut self.events)
    }
}

/// Frame-callback and presentation-feedback bookkeeping.
#[derive(Debug, Default)]
pub struct Presentation {
    clock: ClockId,
    requested: Vec<(WindowId, FeedbackId)>,
    assigned: HashMap<OutputId, Vec<(FeedbackId, WindowId)>>,
    next_id: u64,
    outbox: Outbox,
}

impl Presentation {
    /// Creates the bookkeeping for timestamps taken on `clock`.
    #[must_use]
    pub fn new(clock: ClockId) -> Self {
        Self {
            clock,
            ..Self::default()
        }
    }

    /// Clock presentation timestamps are taken on.
    #[must_use]
    pub fn clock_id(&self) -> ClockId {
        self.clock
    }

    /// Records that a client asked for feedback on its next frame.
    pub fn request_feedback(&mut self, window: WindowId) -> FeedbackId {
        self.next_id += 1;
        let id = FeedbackId(self.next_id);
        self.requested.push((window, id));
        id
    }

    /// Number of feedback requests assigned to `output` and not yet
    /// answered.
    #[must_use]
    pub fn assigned_count(&self, output: OutputId) -> usize {
        self.assigned.get(&output).map_or(0, Vec::len)
    }

    /// Sends frame callbacks for the windows shown mostly on `output`,
    /// without locking feedback.
    pub fn frame<'a>(
        &mut self,
        output: OutputId,
        windows: impl IntoIterator<Item = &'a Window>,
        outputs: &[OutputInfo],
        now: HostTime,
    ) {
        let time_ms = clock_millis(now);
        for window in windows {
            if max_coverage_output(outputs, window.visible_rect()) == Some(output) {
                self.outbox.frame_rendered(window.id(), time_ms);
            }
        }
    }

    /// Sends frame callbacks for the windows shown mostly on `output` and
    /// assigns their feedback requests to it.
    ///
    /// Windows that overlap `output` less than some other output are left
    /// for that output's frame.
    pub fn lock<'a>(
        &mut self,
        output: OutputId,
        windows: impl IntoIterator<Item = &'a Window>,
        outputs: &[OutputInfo],
        now: HostTime,
    ) {
        let time_ms = clock_millis(now);
        for window in windows {
            if max_coverage_output(outputs, window.visible_rect()) != Some(output) {
                continue;
            }
            let id = window.id();
            self.outbox.frame_rendered(id, time_ms);

            let assigned = self.assigned.entry(output).or_default();
            self.requested.retain(|&(w, feedback)| {
                if w == id {
                    assigned.push((feedback, w));
                    false
                } else {
                    true
                }
            });
        }
    }

    /// Delivers feedback for every request assigned to `output` and clears
    /// the assignment. Returns how many requests were answered.
    ///
    /// Nothing is sent for a disabled output.
    pub fn presented(&mut self, output: &OutputInfo, data: PresentationData) -> u32 {
        if !output.enabled {
            return 0;
        }
        let Some(assigned) = self.assigned.remove(&output.id) else {
            return 0;
        };
        let mut count = 0;
        for (id, window) in assigned {
            self.outbox.answer(PresentEvent::Presented {
                window,
                id,
                output: output.id,
                data,
            });
            count += 1;
        }
        trace!(output = ?output.id, count, "presentation feedback delivered");
        count
    }

    /// Delivers software-timed feedback on every output.
    ///
    /// Used where the display reports no timing of its own.
    pub fn software_presented(
        &mut self,
        outputs: &[OutputInfo],
        kinds: PresentationKinds,
        now: HostTime,
        fallback_refresh_millihertz: u32,
    ) -> u32 {
        outputs
            .iter()
            .map(|output| {
                let data = PresentationData::software(
                    now,
                    output.refresh_interval(fallback_refresh_millihertz),
                    kinds,
                );
                self.presented(output, data)
            })
            .sum()
    }

    /// Forgets every request and undelivered event of a destroyed window.
    pub fn window_destroyed(&mut self, window: WindowId) {
        self.outbox.forget(window);
        self.requested.retain(|(w, _)| *w != window);
        for assigned in self.assigned.values_mut() {
            assigned.retain(|(_, w)| *w != window);
        }
    }

    /// Discards the requests assigned to a removed output.
    pub fn output_removed(&mut self, output: OutputId) {
        for (id, window) in self.assigned.remove(&output).unwrap_or_default() {
            self.outbox.answer(PresentEvent::Discarded { window, id });
        }
    }

    /// Hands every waiting event to the protocol layer, oldest first.
    pub fn take_events(&mut self) -> Vec<PresentEvent> {
        self.outbox.take()
    }

    /// Returns `true` if events are waiting.
    #[must_use]
    pub fn has_events(&self) -> bool {
        !self.outbox.events.is_empty()
    }

    /// Frame callbacks merged into one the window had not collected yet.
    #[must_use]
    pub fn merged_callbacks(&self) -> u64 {
        self.outbox.merged
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "frame callback timestamps wrap at 32 bits"
)]
fn clock_millis(now: HostTime) -> u32 {
    (now.nanos() / 1_000_000) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrail_core::region::Rect;
    use vitrail_core::time::Duration;
    use vitrail_core::window::WindowKind;

    fn outputs() -> [OutputInfo; 2] {
        [
            OutputInfo::new(OutputId(1), Rect::new(0, 0, 1000, 800), 60_000),
            OutputInfo::new(OutputId(2), Rect::new(1000, 0, 1000, 800), 60_000),
        ]
    }

    fn window(id: u32, geometry: Rect) -> Window {
        // Ids are assigned by the space; tests only need distinct values.
        let mut space = vitrail_core::window::Space::new();
        for _ in 1..id {
            space.add_window(Window::new(WindowKind::Toplevel, Rect::new(0, 0, 1, 1)));
        }
        let id = space.add_window(Window::new(WindowKind::Toplevel, geometry));
        space.get(id).cloned().unwrap()
    }

    fn data() -> PresentationData {
        PresentationData {
            sequence: 42,
            timestamp: HostTime(16_000_000),
            refresh: Duration::from_refresh_millihertz(60_000),
            kinds: PresentationKinds::HARDWARE_FLIP,
        }
    }

    #[test]
    fn straddling_window_is_acknowledged_once() {
        let outputs = outputs();
        let w = window(1, Rect::new(900, 0, 400, 300));
        let mut presentation = Presentation::new(ClockId::MONOTONIC);

        presentation.lock(OutputId(1), [&w], &outputs, HostTime(5_000_000));
        presentation.lock(OutputId(2), [&w], &outputs, HostTime(5_000_000));

        assert_eq!(
            presentation.take_events(),
            [PresentEvent::FrameRendered {
                window: w.id(),
                time_ms: 5
            }]
        );
    }

    #[test]
    fn feedback_goes_to_the_locked_output_once() {
        let outputs = outputs();
        let w = window(1, Rect::new(1100, 0, 200, 200));
        let mut presentation = Presentation::new(ClockId::MONOTONIC);
        let id = presentation.request_feedback(w.id());

        presentation.lock(OutputId(2), [&w], &outputs, HostTime(0));
        assert_eq!(presentation.assigned_count(OutputId(2)), 1);
        let _ = presentation.take_events();

        assert_eq!(presentation.presented(&outputs[0], data()), 0);
        assert_eq!(presentation.presented(&outputs[1], data()), 1);
        assert_eq!(
            presentation.take_events(),
            [PresentEvent::Presented {
                window: w.id(),
                id,
                output: OutputId(2),
                data: data(),
            }]
        );
        assert_eq!(presentation.presented(&outputs[1], data()), 0);
    }

    #[test]
    fn disabled_output_sends_nothing() {
        let mut outputs = outputs();
        let w = window(1, Rect::new(0, 0, 100, 100));
        let mut presentation = Presentation::new(ClockId::MONOTONIC);
        presentation.request_feedback(w.id());
        presentation.lock(OutputId(1), [&w], &outputs, HostTime(0));
        let _ = presentation.take_events();

        outputs[0].enabled = false;
        assert_eq!(presentation.presented(&outputs[0], data()), 0);
        assert!(!presentation.has_events());
        assert_eq!(presentation.assigned_count(OutputId(1)), 1);
    }

    #[test]
    fn removed_output_discards_assignments() {
        let outputs = outputs();
        let w = window(1, Rect::new(0, 0, 100, 100));
        let mut presentation = Presentation::new(ClockId::MONOTONIC);
        let id = presentation.request_feedback(w.id());
        presentation.lock(OutputId(1), [&w], &outputs, HostTime(0));
        let _ = presentation.take_events();

        presentation.output_removed(OutputId(1));
        assert_eq!(
            presentation.take_events(),
            [PresentEvent::Discarded { window: w.id(), id }]
        );
    }

    #[test]
    fn destroyed_window_is_forgotten() {
        let outputs = outputs();
        let w = window(1, Rect::new(0, 0, 100, 100));
        let other = window(2, Rect::new(200, 0, 100, 100));
        let mut presentation = Presentation::new(ClockId::MONOTONIC);
        presentation.request_feedback(w.id());
        presentation.lock(OutputId(1), [&w, &other], &outputs, HostTime(0));

        presentation.window_destroyed(w.id());
        assert_eq!(presentation.assigned_count(OutputId(1)), 0);

        // The survivor's callback is still merged after the outbox shrank.
        presentation.frame(OutputId(1), [&other], &outputs, HostTime(4_000_000));
        assert_eq!(
            presentation.take_events(),
            [PresentEvent::FrameRendered {
                window: other.id(),
                time_ms: 4
            }]
        );
    }

    #[test]
    fn uncollected_frame_callbacks_are_merged() {
        let outputs = outputs();
        let a = window(1, Rect::new(0, 0, 100, 100));
        let b = window(2, Rect::new(200, 0, 100, 100));
        let mut presentation = Presentation::new(ClockId::MONOTONIC);
        let id = presentation.request_feedback(b.id());

        presentation.frame(OutputId(1), [&a], &outputs, HostTime(1_000_000));
        presentation.lock(OutputId(1), [&b], &outputs, HostTime(2_000_000));
        presentation.presented(&outputs[0], data());
        presentation.lock(OutputId(1), [&a, &b], &outputs, HostTime(3_000_000));

        assert_eq!(presentation.merged_callbacks(), 2);
        assert_eq!(
            presentation.take_events(),
            [
                PresentEvent::FrameRendered {
                    window: a.id(),
                    time_ms: 3
                },
                PresentEvent::FrameRendered {
                    window: b.id(),
                    time_ms: 3
                },
                PresentEvent::Presented {
                    window: b.id(),
                    id,
                    output: OutputId(1),
                    data: data(),
                },
            ]
        );

        // Collected callbacks start over.
        presentation.frame(OutputId(1), [&a], &outputs, HostTime(5_000_000));
        assert_eq!(presentation.take_events().len(), 1);
        assert_eq!(presentation.merged_callbacks(), 2);
    }

    #[test]
    fn software_feedback_uses_output_refresh() {
        let outputs = outputs();
        let w = window(1, Rect::new(0, 0, 100, 100));
        let mut presentation = Presentation::new(ClockId::MONOTONIC);
        presentation.request_feedback(w.id());
        presentation.lock(OutputId(1), [&w], &outputs, HostTime(0));
        let _ = presentation.take_events();

        let sent = presentation.software_presented(
            &outputs,
            PresentationKinds::VSYNC,
            HostTime(7),
            60_000,
        );
        assert_eq!(sent, 1);
        let events = presentation.take_events();
        let [PresentEvent::Presented { data, .. }] = events[..] else {
            panic!("expected feedback");
        };
        assert_eq!(data.kinds, PresentationKinds::VSYNC);
        assert_eq!(data.refresh, Duration::from_refresh_millihertz(60_000));
    }
}

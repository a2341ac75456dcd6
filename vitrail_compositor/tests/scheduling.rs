// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame pacing, repaint coalescing and presentation feedback.

mod common;

use common::{
    FakeDamage, FakePlatform, SharedRecorder, compositor, compositor_with, map_window, ms, output,
    started, swap_count,
};
use vitrail_compositor::{CompositorConfig, FrameState, PresentEvent};
use vitrail_core::damage::DamageReply;
use vitrail_core::output::OutputId;
use vitrail_core::presentation::PresentationKinds;
use vitrail_core::region::{Rect, Region};
use vitrail_core::trace::TimerKind;
use vitrail_debug::recorder::{RecordedEvent, decode};

const LEFT: OutputId = OutputId(1);
const RIGHT: OutputId = OutputId(2);

fn swapping_platform() -> FakePlatform {
    let mut platform = FakePlatform::new();
    platform.swap_event = true;
    platform
}

#[test]
fn requests_in_one_cycle_coalesce_into_one_pass() {
    let mut c = started(FakePlatform::new());
    let id = map_window(&mut c, Rect::new(10, 10, 200, 200));
    c.process_events(ms(100));
    c.schedule_repaint(id, ms(101));
    c.schedule_repaint(id, ms(102));
    assert_eq!(c.next_deadline(), Some(ms(100)));

    c.tick(ms(102));
    assert_eq!(swap_count(&c), 2);
    assert_eq!(c.next_deadline(), None);

    c.tick(ms(200));
    assert_eq!(swap_count(&c), 2);
}

#[test]
fn pass_without_repaints_paints_nothing() {
    let mut c = started(FakePlatform::new());
    let id = map_window(&mut c, Rect::new(10, 10, 200, 200));
    c.tick(ms(100));
    assert_eq!(swap_count(&c), 2);

    c.schedule_repaint(id, ms(200));
    assert_eq!(c.next_deadline(), Some(ms(200)));
    c.tick(ms(200));
    assert_eq!(swap_count(&c), 2);
    assert_eq!(c.scheduler(Some(LEFT)).unwrap().state(), FrameState::Idle);

    // An idle pass leaves no delay for the next request.
    c.add_repaint_rect(Rect::new(0, 0, 1, 1), ms(201));
    assert_eq!(c.next_deadline(), Some(ms(201)));
}

#[test]
fn one_swap_in_flight_per_output() {
    let mut c = started(swapping_platform());
    assert_eq!(swap_count(&c), 1);
    assert!(c.scheduler(Some(LEFT)).unwrap().is_swap_pending());

    c.add_repaint_rect(Rect::new(0, 0, 10, 10), ms(5));
    c.tick(ms(5));
    c.tick(ms(30));
    assert_eq!(swap_count(&c), 1);
    assert!(c.scheduler(Some(LEFT)).unwrap().has_deferred_request());
    assert_eq!(c.next_deadline(), None);

    // A refresh is 16_666_666ns; the next pass starts a tenth of it early
    // and no paint time was measured.
    c.buffer_swap_complete(Some(LEFT), None, ms(16));
    assert_eq!(c.next_deadline(), Some(ms(31)));

    c.tick(ms(31));
    assert_eq!(swap_count(&c), 2);
}

#[test]
fn swap_completion_without_pending_swap_is_ignored() {
    let mut c = started(FakePlatform::new());
    c.presentation_mut().take_events();
    c.buffer_swap_complete(Some(LEFT), None, ms(16));
    assert_eq!(c.next_deadline(), None);
    assert!(!c.presentation_mut().has_events());
}

#[test]
fn external_swap_holds_the_next_pass() {
    let mut c = started(FakePlatform::new());
    c.about_to_swap_buffers(Some(LEFT));
    c.add_repaint_full(ms(100));
    c.tick(ms(100));
    assert_eq!(swap_count(&c), 1);

    c.buffer_swap_complete(Some(LEFT), None, ms(110));
    c.tick(ms(200));
    assert_eq!(swap_count(&c), 2);
}

#[test]
fn outputs_swap_independently() {
    let mut platform = FakePlatform::with_outputs(vec![output(1, 0), output(2, 1920)]);
    platform.swap_event = true;
    let mut c = started(platform);
    assert_eq!(swap_count(&c), 2);

    c.buffer_swap_complete(Some(RIGHT), None, ms(16));
    c.add_repaint_full(ms(40));
    c.tick(ms(40));

    let log = c.platform().log.borrow();
    assert_eq!(log.swaps_on(LEFT), 1);
    assert_eq!(log.swaps_on(RIGHT), 2);
}

#[test]
fn repaints_reach_only_the_outputs_they_touch() {
    let mut c = started(FakePlatform::with_outputs(vec![output(1, 0), output(2, 1920)]));
    c.add_repaint_rect(Rect::new(2000, 100, 50, 50), ms(100));
    assert!(c.scheduler(Some(LEFT)).unwrap().deadline().is_none());
    c.tick(ms(100));

    let log = c.platform().log.borrow();
    assert_eq!(log.swaps_on(LEFT), 1);
    assert_eq!(log.swaps_on(RIGHT), 2);
}

#[test]
fn global_scheduling_paints_every_damaged_output_in_one_pass() {
    let config = CompositorConfig {
        frames_to_test_for_safety: 0,
        ..CompositorConfig::x11()
    };
    let platform = FakePlatform::with_outputs(vec![output(1, 0), output(2, 1920)]);
    let mut c = compositor_with(platform, config);
    c.start(ms(0)).unwrap();
    c.tick(ms(0));
    assert_eq!(swap_count(&c), 2);

    c.add_repaint_rect(Rect::new(1900, 0, 100, 100), ms(100));
    c.tick(ms(100));
    assert_eq!(swap_count(&c), 4);

    c.add_repaint_rect(Rect::new(2000, 0, 10, 10), ms(200));
    c.tick(ms(200));
    let log = c.platform().log.borrow();
    assert_eq!(log.swaps_on(LEFT), 2);
    assert_eq!(log.swaps_on(RIGHT), 3);
}

#[test]
fn locked_compositor_ignores_repaints_until_unlocked() {
    let mut c = started(FakePlatform::new());
    c.lock();
    c.lock();
    c.add_repaint_full(ms(100));
    assert_eq!(c.next_deadline(), None);

    c.unlock(ms(110));
    assert!(c.is_locked());
    assert_eq!(c.next_deadline(), None);

    c.unlock(ms(120));
    assert!(!c.is_locked());
    assert_eq!(c.next_deadline(), Some(ms(120)));
    c.tick(ms(120));
    assert_eq!(swap_count(&c), 2);
}

#[test]
fn nothing_is_painted_while_every_output_is_off() {
    let mut c = started(FakePlatform::new());
    c.platform_mut().outputs[0].enabled = false;
    c.add_repaint_rect(Rect::new(0, 0, 50, 50), ms(100));
    c.tick(ms(100));
    assert_eq!(swap_count(&c), 1);
    assert_eq!(c.next_deadline(), None);

    c.platform_mut().outputs[0].enabled = true;
    c.outputs_changed(ms(200));
    c.tick(ms(200));
    assert_eq!(swap_count(&c), 2);
}

#[test]
fn hotplugged_outputs_get_their_own_scheduler() {
    let mut c = started(FakePlatform::new());
    c.platform_mut().outputs.push(output(2, 1920));
    c.outputs_changed(ms(100));
    assert!(c.scheduler(Some(RIGHT)).is_some());
    c.tick(ms(100));
    {
        let log = c.platform().log.borrow();
        assert_eq!(log.swaps_on(LEFT), 2);
        assert_eq!(log.swaps_on(RIGHT), 1);
    }

    c.platform_mut().outputs.remove(0);
    c.outputs_changed(ms(200));
    assert!(c.scheduler(Some(LEFT)).is_none());
    c.tick(ms(200));
    let log = c.platform().log.borrow();
    assert_eq!(log.swaps_on(LEFT), 2);
    assert_eq!(log.swaps_on(RIGHT), 2);
}

#[test]
fn fetched_damage_is_painted_in_the_same_pass() {
    let mut platform = FakePlatform::new();
    platform.damage = Some(FakeDamage {
        reply: Some(DamageReply {
            rects: vec![Rect::new(0, 0, 10, 10)],
            extents: Rect::new(0, 0, 10, 10),
        }),
        ..FakeDamage::default()
    });
    let mut c = compositor(platform);
    let id = map_window(&mut c, Rect::new(100, 100, 300, 200));
    c.start(ms(0)).unwrap();
    c.tick(ms(0));
    let uploads = c.platform().log.borrow().uploads.len();

    c.space_mut().mark_damaged(id, &Region::new());
    c.process_events(ms(100));
    c.tick(ms(100));

    let damage = c.platform().damage.as_ref().unwrap();
    assert_eq!(damage.requests, [id]);
    assert_eq!(damage.replies_taken, 1);
    let window = c.space().get(id).unwrap();
    assert!(!window.damage().fetch().is_pending());
    assert!(!window.has_pending_repaints());
    assert_eq!(swap_count(&c), 2);
    assert_eq!(c.platform().log.borrow().uploads.len(), uploads + 1);
}

#[test]
fn feedback_arrives_with_the_swap() {
    let mut c = compositor(swapping_platform());
    let id = map_window(&mut c, Rect::new(0, 0, 100, 100));
    let request = c.presentation_mut().request_feedback(id);
    c.start(ms(0)).unwrap();
    c.tick(ms(0));

    assert_eq!(
        c.presentation_mut().take_events(),
        [PresentEvent::FrameRendered {
            window: id,
            time_ms: 0
        }]
    );

    c.buffer_swap_complete(Some(LEFT), None, ms(16));
    let events = c.presentation_mut().take_events();
    let [PresentEvent::Presented {
        window,
        id: answered,
        output,
        data,
    }] = events[..]
    else {
        panic!("unexpected events {events:?}");
    };
    assert_eq!((window, answered, output), (id, request, LEFT));
    assert_eq!(data.timestamp, ms(16));
    assert_eq!(data.kinds, PresentationKinds::HARDWARE_FLIP);
}

#[test]
fn swap_completion_answers_feedback_before_timing_the_next_pass() {
    let mut c = compositor(swapping_platform());
    let id = map_window(&mut c, Rect::new(0, 0, 100, 100));
    c.presentation_mut().request_feedback(id);
    c.start(ms(0)).unwrap();
    c.tick(ms(0));
    c.add_repaint_full(ms(5));

    let recorder = SharedRecorder::default();
    c.set_trace_sink(Box::new(recorder.clone()));
    c.buffer_swap_complete(Some(LEFT), None, ms(16));

    let recorded = recorder.0.borrow();
    let events: Vec<RecordedEvent> = decode(recorded.as_bytes()).collect();
    assert_eq!(events.len(), 3, "{events:?}");
    assert!(matches!(
        &events[0],
        RecordedEvent::PresentFeedback(e) if e.output == LEFT && e.surfaces == 1
    ));
    assert!(matches!(&events[1], RecordedEvent::SwapComplete(e) if e.output == Some(LEFT)));
    assert!(matches!(
        &events[2],
        RecordedEvent::TimerArmed(e) if e.kind == TimerKind::Composite
    ));
}

#[test]
fn immediate_presentation_answers_in_the_pass() {
    let mut c = compositor(FakePlatform::new());
    let id = map_window(&mut c, Rect::new(0, 0, 100, 100));
    let request = c.presentation_mut().request_feedback(id);
    c.start(ms(0)).unwrap();
    c.tick(ms(0));

    let events = c.presentation_mut().take_events();
    assert_eq!(events.len(), 2);
    assert!(matches!(
        events[1],
        PresentEvent::Presented { id: answered, output: LEFT, .. } if answered == request
    ));
}

#[test]
fn frame_callback_without_damage_does_not_swap() {
    let mut c = started(FakePlatform::new());
    let id = map_window(&mut c, Rect::new(0, 0, 100, 100));
    c.tick(ms(100));
    c.presentation_mut().take_events();

    c.schedule_frame_callback(id, ms(200));
    c.tick(ms(200));
    assert_eq!(swap_count(&c), 2);
    assert_eq!(
        c.presentation_mut().take_events(),
        [PresentEvent::FrameRendered {
            window: id,
            time_ms: 0
        }]
    );
}

#[test]
fn passes_are_traced() {
    let recorder = SharedRecorder::default();
    let mut c = compositor(FakePlatform::new());
    c.set_trace_sink(Box::new(recorder.clone()));
    c.start(ms(0)).unwrap();
    c.tick(ms(0));

    let recorded = recorder.0.borrow();
    let events: Vec<RecordedEvent> = decode(recorded.as_bytes()).collect();
    assert_eq!(events.len(), 4);
    assert!(matches!(
        &events[0],
        RecordedEvent::TimerArmed(e) if e.kind == TimerKind::Composite && e.output == Some(LEFT)
    ));
    assert!(matches!(
        &events[1],
        RecordedEvent::PassBegin(e) if e.pass_index == 1 && e.output == Some(LEFT)
    ));
    assert!(matches!(&events[2], RecordedEvent::PresentFeedback(e) if e.output == LEFT));
    let RecordedEvent::PassSummary(summary) = &events[3] else {
        panic!("unexpected event {:?}", events[3]);
    };
    assert_eq!(summary.damage_area, 1920 * 1080);
}

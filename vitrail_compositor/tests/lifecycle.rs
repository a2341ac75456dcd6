// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Starting, stopping, suspending and reconfiguring a compositor.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{
    FakePlatform, compositor, compositor_with, map_window, ms, output, started, swap_count,
};
use vitrail_compositor::{
    Atom, CompositorConfig, CompositorError, CompositorState, SchedulingMode, SuspendReasons,
};
use vitrail_core::output::OutputId;
use vitrail_core::region::Rect;
use vitrail_core::time::HostTime;
use vitrail_render::{CompositingType, SafePoint};

#[test]
fn start_paints_every_output_once() {
    let c = started(FakePlatform::with_outputs(vec![output(1, 0), output(2, 1920)]));
    assert_eq!(c.state(), CompositorState::On);
    assert_eq!(c.compositing_type(), Some(CompositingType::Gpu));
    let log = c.platform().log.borrow();
    assert_eq!(log.swaps_on(OutputId(1)), 1);
    assert_eq!(log.swaps_on(OutputId(2)), 1);
    assert_eq!(log.claims, 1);
    assert_eq!(log.selected, Some(CompositingType::Gpu));
}

#[test]
fn broken_gpu_falls_back_to_legacy_picture() {
    let mut platform = FakePlatform::new();
    platform.supported = CompositingType::FALLBACK_ORDER.to_vec();
    platform.broken = vec![CompositingType::Gpu];
    let mut c = compositor(platform);

    c.start(ms(0)).unwrap();
    c.tick(ms(0));

    assert_eq!(c.state(), CompositorState::On);
    assert_eq!(c.compositing_type(), Some(CompositingType::LegacyPicture));
    assert_eq!(c.compositing_not_possible_reason(), "");
    let log = c.platform().log.borrow();
    assert_eq!(log.selected, Some(CompositingType::LegacyPicture));
    assert!(!log.flushes.is_empty());
}

#[test]
fn every_backend_failing_leaves_compositing_off() {
    let mut platform = FakePlatform::new();
    platform.supported = vec![CompositingType::Gpu, CompositingType::LegacyPicture];
    platform.broken = platform.supported.clone();
    let mut c = compositor(platform);

    let err = c.start(ms(0)).unwrap_err();
    let CompositorError::AllBackendsFailed { reasons } = &err else {
        panic!("unexpected error {err:?}");
    };
    assert_eq!(reasons.len(), 2);
    assert!(reasons[0].starts_with("GPU"));
    assert!(reasons[1].starts_with("legacy picture"));

    assert_eq!(c.state(), CompositorState::Off);
    assert_eq!(c.compositing_not_possible_reason(), err.to_string());
    assert!(c.scene().is_none());
    assert_eq!(c.next_deadline(), None);
    let log = c.platform().log.borrow();
    assert_eq!((log.claims, log.releases), (1, 1));
}

#[test]
fn impossible_compositing_is_reported() {
    let mut platform = FakePlatform::new();
    platform.not_possible = Some("no composite extension".to_owned());
    let mut c = compositor(platform);

    assert_eq!(
        c.start(ms(0)),
        Err(CompositorError::NotPossible("no composite extension".to_owned()))
    );
    assert_eq!(c.compositing_not_possible_reason(), "no composite extension");
    assert_eq!(c.platform().log.borrow().claims, 0);
}

#[test]
fn starting_twice_is_refused() {
    let mut c = started(FakePlatform::new());
    assert_eq!(c.start(ms(1)), Err(CompositorError::AlreadyRunning));
    assert_eq!(c.state(), CompositorState::On);
}

#[test]
fn disabled_compositing_starts_suspended_by_the_user() {
    let config = CompositorConfig {
        use_compositing: false,
        ..CompositorConfig::wayland()
    };
    let mut c = compositor_with(FakePlatform::new(), config.clone());
    assert_eq!(c.suspended(), SuspendReasons::USER);
    assert_eq!(
        c.start(ms(0)),
        Err(CompositorError::Suspended(SuspendReasons::USER))
    );

    let mut platform = FakePlatform::new();
    platform.requires_compositing = true;
    let mut c = compositor_with(platform, config);
    assert!(c.suspended().is_empty());
    c.start(ms(0)).unwrap();
}

#[test]
fn resume_waits_for_every_reason() {
    let mut c = started(FakePlatform::new());
    let states = Rc::new(RefCell::new(Vec::new()));
    let seen = states.clone();
    c.state_changed().connect(move |s| seen.borrow_mut().push(*s));

    c.suspend(SuspendReasons::USER | SuspendReasons::BLOCK_RULE, ms(10));
    assert_eq!(c.state(), CompositorState::Off);

    assert_eq!(
        c.resume(SuspendReasons::USER, ms(20)),
        Err(CompositorError::Suspended(SuspendReasons::BLOCK_RULE))
    );
    assert_eq!(c.state(), CompositorState::Off);

    c.resume(SuspendReasons::BLOCK_RULE, ms(30)).unwrap();
    assert_eq!(c.state(), CompositorState::On);
    assert_eq!(
        *states.borrow(),
        [
            CompositorState::Stopping,
            CompositorState::Off,
            CompositorState::Starting,
            CompositorState::On,
        ]
    );
}

#[test]
fn toggle_flips_between_user_suspend_and_running() {
    let mut c = started(FakePlatform::new());
    let toggles = Rc::new(RefCell::new(Vec::new()));
    let seen = toggles.clone();
    c.compositing_toggled().connect(move |on| seen.borrow_mut().push(*on));

    c.toggle_compositing(ms(10));
    assert_eq!(c.suspended(), SuspendReasons::USER);
    assert_eq!(c.state(), CompositorState::Off);

    c.toggle_compositing(ms(20));
    assert!(c.suspended().is_empty());
    assert_eq!(c.state(), CompositorState::On);
    assert_eq!(*toggles.borrow(), [false, true]);
}

#[test]
fn platforms_requiring_compositing_ignore_suspend() {
    let mut platform = FakePlatform::new();
    platform.requires_compositing = true;
    let mut c = started(platform);

    c.suspend(SuspendReasons::USER, ms(10));
    c.toggle_compositing(ms(20));
    assert_eq!(c.state(), CompositorState::On);
    assert!(c.suspended().is_empty());
}

#[test]
fn stop_announces_destruction_before_tearing_down() {
    let mut c = started(FakePlatform::new());
    let events = Rc::new(RefCell::new(Vec::new()));
    let seen = events.clone();
    c.about_to_toggle_compositing()
        .connect(move |_| seen.borrow_mut().push("toggle"));
    let seen = events.clone();
    c.about_to_destroy()
        .connect(move |_| seen.borrow_mut().push("destroy"));

    c.stop();
    assert_eq!(*events.borrow(), ["toggle", "destroy"]);
    assert!(c.scene().is_none());
    assert!(!c.space().is_compositing());
    assert!(c.scheduler(Some(OutputId(1))).is_none());

    // Stopping again does nothing.
    c.stop();
    assert_eq!(events.borrow().len(), 2);
}

#[test]
fn blocking_window_suspends_until_it_goes_away() {
    let mut c = started(FakePlatform::new());
    let id = map_window(&mut c, Rect::new(0, 0, 1920, 1080));
    c.tick(ms(100));

    c.space_mut().set_blocks_compositing(id, true);
    c.process_events(ms(110));
    assert_eq!(c.suspended(), SuspendReasons::BLOCK_RULE);
    assert_eq!(c.state(), CompositorState::Off);

    c.space_mut().remove_window(id);
    c.process_events(ms(120));
    assert!(c.suspended().is_empty());
    assert_eq!(c.state(), CompositorState::On);
}

#[test]
fn unblocking_resumes_only_without_other_blockers() {
    let mut c = started(FakePlatform::new());
    let first = map_window(&mut c, Rect::new(0, 0, 100, 100));
    let second = map_window(&mut c, Rect::new(200, 0, 100, 100));
    c.space_mut().set_blocks_compositing(first, true);
    c.process_events(ms(10));
    assert_eq!(c.state(), CompositorState::Off);

    c.space_mut().set_blocks_compositing(second, true);
    c.space_mut().set_blocks_compositing(first, false);
    c.process_events(ms(20));
    assert_eq!(c.state(), CompositorState::Off);

    c.space_mut().set_blocks_compositing(second, false);
    c.process_events(ms(30));
    assert_eq!(c.state(), CompositorState::On);
}

#[test]
fn selection_is_released_after_the_delay() {
    let mut c = started(FakePlatform::new());
    c.suspend(SuspendReasons::USER, ms(0));
    assert_eq!(c.next_deadline(), Some(ms(2000)));

    c.tick(ms(1999));
    assert_eq!(c.platform().log.borrow().releases, 0);
    c.tick(ms(2000));
    assert_eq!(c.platform().log.borrow().releases, 1);
    assert_eq!(c.next_deadline(), None);
}

#[test]
fn resuming_in_time_keeps_the_selection() {
    let mut c = started(FakePlatform::new());
    c.suspend(SuspendReasons::USER, ms(0));
    c.resume(SuspendReasons::USER, ms(500)).unwrap();

    c.tick(ms(2500));
    let log = c.platform().log.borrow();
    assert_eq!(log.releases, 0);
    assert_eq!(log.claims, 2);
}

#[test]
fn unused_support_properties_are_deleted_later() {
    let mut c = started(FakePlatform::new());
    c.remove_support_property(Atom(7), ms(0));
    c.remove_support_property(Atom(8), ms(500));
    c.keep_support_property(Atom(8));

    c.tick(ms(2000));
    assert_eq!(c.platform().log.borrow().deleted, [Atom(7)]);
}

#[test]
fn reconfigure_restarts_with_new_settings() {
    let mut platform = FakePlatform::new();
    platform.supported = CompositingType::FALLBACK_ORDER.to_vec();
    let mut c = started(platform);
    assert_eq!(c.compositing_type(), Some(CompositingType::Gpu));

    let config: CompositorConfig = serde_json::from_str(
        r#"{ "preferred_compositing": "legacy_picture", "scheduling": "global" }"#,
    )
    .unwrap();
    assert!(config.use_compositing);
    assert_eq!(config.selection_release_delay_ms, 2000);

    c.reconfigure(config, ms(100)).unwrap();
    assert_eq!(c.state(), CompositorState::On);
    assert_eq!(c.compositing_type(), Some(CompositingType::LegacyPicture));
    assert_eq!(c.config().scheduling, SchedulingMode::Global);
    assert!(c.scheduler(None).is_some());
    assert!(c.scheduler(Some(OutputId(1))).is_none());
}

#[test]
fn reconfigure_while_suspended_stays_off() {
    let mut c = started(FakePlatform::new());
    c.suspend(SuspendReasons::USER, ms(0));
    c.reconfigure(CompositorConfig::x11(), ms(10)).unwrap();
    assert_eq!(c.state(), CompositorState::Off);
    assert_eq!(c.suspended(), SuspendReasons::USER);
}

#[test]
fn reinitialize_clears_every_reason() {
    let mut c = started(FakePlatform::new());
    c.suspend(SuspendReasons::SCRIPT, ms(0));
    c.reinitialize(ms(10)).unwrap();
    assert_eq!(c.state(), CompositorState::On);
    assert!(c.suspended().is_empty());
}

#[test]
fn first_gpu_frames_are_guarded() {
    let mut c = compositor_with(FakePlatform::new(), CompositorConfig::x11());
    c.start(ms(0)).unwrap();
    for frame in 0..4 {
        let now = ms(100 * frame);
        c.add_repaint_full(now);
        c.tick(now);
    }
    assert_eq!(swap_count(&c), 4);
    assert_eq!(
        c.platform().log.borrow().safe_points,
        [
            SafePoint::PreInit,
            SafePoint::PostInit,
            SafePoint::PreFrame,
            SafePoint::PostFrame,
            SafePoint::PreFrame,
            SafePoint::PostFrame,
            SafePoint::PreFrame,
            SafePoint::PostFrame,
            SafePoint::PostLastGuardedFrame,
        ]
    );
}

#[test]
fn failed_swap_is_retried_with_its_damage() {
    let platform = FakePlatform::new();
    let failures = platform.fail_presents.clone();
    let clock = platform.clock.clone();
    let mut c = started(platform);

    failures.set(1);
    clock.set(ms(100));
    c.add_repaint_rect(Rect::new(0, 0, 50, 50), ms(100));
    c.tick(ms(100));
    assert_eq!(swap_count(&c), 1);
    assert_eq!(c.state(), CompositorState::On);

    // The retry waits one refresh interval from the failed pass.
    let retry = HostTime(116_666_666);
    assert_eq!(c.next_deadline(), Some(retry));
    c.tick(retry);
    assert_eq!(swap_count(&c), 2);
    assert_eq!(
        c.platform().log.borrow().swap_damage.last(),
        Some(&Rect::new(0, 0, 50, 50))
    );
    assert_eq!(c.next_deadline(), None);
}

#[test]
fn failed_composite_is_retried() {
    let mut platform = FakePlatform::new();
    platform.supported = vec![CompositingType::LegacyPicture];
    let failures = platform.fail_presents.clone();
    let mut c = started(platform);
    assert_eq!(c.platform().log.borrow().flushes.len(), 1);

    failures.set(1);
    c.add_repaint_rect(Rect::new(300, 300, 10, 10), ms(100));
    c.tick(ms(100));
    assert_eq!(c.platform().log.borrow().flushes.len(), 1);

    let retry = c.next_deadline().unwrap();
    c.tick(retry);
    assert_eq!(c.platform().log.borrow().flushes.len(), 2);
}

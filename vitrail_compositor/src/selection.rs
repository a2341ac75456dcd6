// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deferred release of compositing ownership.
//!
//! On a shared X screen the compositor announces itself by owning a
//! manager selection and publishes support properties on the root window.
//! Both are given up lazily: a compositor that restarts right away keeps
//! them. While the compositor is still starting or stopping the outcome is
//! not known yet, so the timers re-arm instead.

use vitrail_core::time::{Duration, HostTime};

use crate::compositor::CompositorState;

/// An atom naming a support property on the root window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Atom(pub u32);

/// A one-shot deadline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct DeferredTimer {
    delay: Duration,
    deadline: Option<HostTime>,
}

impl DeferredTimer {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub(crate) fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    /// (Re)starts the timer and returns its deadline.
    pub(crate) fn start(&mut self, now: HostTime) -> HostTime {
        let deadline = now + self.delay;
        self.deadline = Some(deadline);
        deadline
    }

    pub(crate) fn stop(&mut self) {
        self.deadline = None;
    }

    pub(crate) fn is_active(&self) -> bool {
        self.deadline.is_some()
    }

    pub(crate) fn deadline(&self) -> Option<HostTime> {
        self.deadline
    }

    /// Returns `true` once when the deadline has been reached.
    pub(crate) fn take_due(&mut self, now: HostTime) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// What to do when a deferred release fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ReleaseAction {
    /// Compositing runs; keep what we own.
    Keep,
    /// Compositing is off; give it up.
    Release,
    /// Still starting or stopping; try again later.
    Retry,
}

impl ReleaseAction {
    pub(crate) fn for_state(state: CompositorState) -> Self {
        match state {
            CompositorState::On => Self::Keep,
            CompositorState::Off => Self::Release,
            CompositorState::Starting | CompositorState::Stopping => Self::Retry,
        }
    }
}

/// Support properties waiting to be deleted.
#[derive(Clone, Debug)]
pub(crate) struct SupportProperties {
    unused: Vec<Atom>,
    timer: DeferredTimer,
}

impl SupportProperties {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            unused: Vec::new(),
            timer: DeferredTimer::new(delay),
        }
    }

    pub(crate) fn timer(&self) -> &DeferredTimer {
        &self.timer
    }

    pub(crate) fn timer_mut(&mut self) -> &mut DeferredTimer {
        &mut self.timer
    }

    /// The property is in use again.
    pub(crate) fn keep(&mut self, atom: Atom) {
        self.unused.retain(|a| *a != atom);
    }

    /// Schedules deletion of a property. Returns the deadline when the
    /// timer was started.
    pub(crate) fn remove(&mut self, atom: Atom, now: HostTime) -> Option<HostTime> {
        if !self.unused.contains(&atom) {
            self.unused.push(atom);
        }
        (!self.timer.is_active()).then(|| self.timer.start(now))
    }

    pub(crate) fn take_unused(&mut self) -> Vec<Atom> {
        core::mem::take(&mut self.unused)
    }

    pub(crate) fn pending(&self) -> &[Atom] {
        &self.unused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_waits_for_settled_state() {
        assert_eq!(ReleaseAction::for_state(CompositorState::On), ReleaseAction::Keep);
        assert_eq!(ReleaseAction::for_state(CompositorState::Off), ReleaseAction::Release);
        assert_eq!(
            ReleaseAction::for_state(CompositorState::Starting),
            ReleaseAction::Retry
        );
        assert_eq!(
            ReleaseAction::for_state(CompositorState::Stopping),
            ReleaseAction::Retry
        );
    }

    #[test]
    fn timer_fires_once() {
        let mut timer = DeferredTimer::new(Duration::from_millis(2000));
        assert_eq!(timer.start(HostTime(0)), HostTime(2_000_000_000));
        assert!(!timer.take_due(HostTime(1_999_999_999)));
        assert!(timer.take_due(HostTime(2_000_000_000)));
        assert!(!timer.take_due(HostTime(3_000_000_000)));
        assert!(!timer.is_active());
    }

    #[test]
    fn kept_property_is_not_deleted() {
        let mut props = SupportProperties::new(Duration::from_millis(10));
        assert!(props.remove(Atom(7), HostTime(0)).is_some());
        assert!(props.remove(Atom(8), HostTime(1)).is_none());
        props.keep(Atom(7));
        assert_eq!(props.take_unused(), [Atom(8)]);
        assert!(props.pending().is_empty());
    }
}

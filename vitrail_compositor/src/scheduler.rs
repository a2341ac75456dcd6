// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deciding when the next pass runs.
//!
//! A [`FrameScheduler`] paces the passes of one output, or of the whole
//! screen in [`SchedulingMode::Global`](crate::SchedulingMode::Global). It
//! never reads a clock: every call takes the current [`HostTime`] and timers
//! are deadlines the host loop waits for.
//!
//! # States
//!
//! ```text
//!            schedule            deadline reached
//!   Idle ──────────────► Delayed ────────────────► Compositing
//!    ▲                                                 │
//!    │          pass finished without a pending swap   │
//!    ├─────────────────────────────────────────────────┤
//!    │                                                 │ swap pending
//!    │           swap_complete                         ▼
//!    └──────────────────────────────────────────── SwapPending
//! ```
//!
//! Requests that arrive while a pass runs or a swap is in flight are
//! remembered and arm the timer as soon as the scheduler is idle again, so
//! at most one swap is in flight and no request is lost.
//!
//! # Delay
//!
//! The delay counts from the moment it was chosen:
//!
//! - after a pass the display does not acknowledge, one refresh interval;
//! - after a swap completes, the refresh interval minus a vblank margin
//!   (`refresh / vblank_margin_divisor`) minus the longest recent paint,
//!   saturating at zero;
//! - after a pass found nothing to do, zero.
//!
//! The delay is capped at [`SchedulerConfig::max_composite_wait`].

use vitrail_core::time::{Duration, HostTime};

/// Timing parameters shared by every [`FrameScheduler`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Upper bound of any coalescing delay.
    pub max_composite_wait: Duration,
    /// The pass after a swap starts `refresh / vblank_margin_divisor` early.
    pub vblank_margin_divisor: u64,
    /// Passes over which the longest paint duration is kept.
    pub paint_period_frames: u32,
}

impl SchedulerConfig {
    /// Defaults: 250 ms cap, 10% margin, 100-pass window.
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            max_composite_wait: Duration::from_millis(250),
            vblank_margin_divisor: 10,
            paint_period_frames: 100,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::standard()
    }
}

/// Where a [`FrameScheduler`] is in its cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameState {
    /// Nothing scheduled.
    Idle,
    /// A pass runs at `deadline`.
    Delayed {
        /// When the pass runs.
        deadline: HostTime,
    },
    /// A pass is running.
    Compositing,
    /// The last frame was handed to the display and its swap has not
    /// completed.
    SwapPending,
}

/// Paces the passes of one output or of the whole screen.
#[derive(Clone, Debug)]
pub struct FrameScheduler {
    config: SchedulerConfig,
    refresh: Duration,
    state: FrameState,
    delay: Duration,
    delay_from: HostTime,
    requested: bool,
    paint_durations: [Duration; 2],
    paint_periods: u32,
}

impl FrameScheduler {
    /// Creates an idle scheduler for an output refreshing every `refresh`.
    #[must_use]
    pub fn new(config: SchedulerConfig, refresh: Duration) -> Self {
        Self {
            config,
            refresh,
            state: FrameState::Idle,
            delay: Duration::ZERO,
            delay_from: HostTime(0),
            requested: false,
            paint_durations: [Duration::ZERO; 2],
            paint_periods: 0,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Deadline of the armed timer.
    #[must_use]
    pub fn deadline(&self) -> Option<HostTime> {
        match self.state {
            FrameState::Delayed { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// Returns `true` while a swap is in flight.
    #[must_use]
    pub fn is_swap_pending(&self) -> bool {
        self.state == FrameState::SwapPending
    }

    /// Returns `true` if a request is waiting for the current pass or swap
    /// to finish.
    #[must_use]
    pub fn has_deferred_request(&self) -> bool {
        self.requested
    }

    /// Refresh interval in use.
    #[must_use]
    pub fn refresh(&self) -> Duration {
        self.refresh
    }

    /// Updates the refresh interval, e.g. after a mode change.
    pub fn set_refresh(&mut self, refresh: Duration) {
        self.refresh = refresh;
    }

    /// Delay that applies to the next armed timer.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// The two paint-duration samples: the maximum of the previous window of
    /// passes and the maximum of the current one.
    #[must_use]
    pub fn paint_durations(&self) -> [Duration; 2] {
        self.paint_durations
    }

    /// Asks for a pass.
    ///
    /// Arms the timer when idle and returns its deadline. An armed timer is
    /// left alone, so requests coalesce into one pass. While a pass runs or
    /// a swap is in flight, the request is remembered instead.
    pub fn schedule(&mut self, now: HostTime) -> Option<HostTime> {
        match self.state {
            FrameState::Idle => Some(self.arm(now)),
            FrameState::Delayed { .. } => None,
            FrameState::Compositing | FrameState::SwapPending => {
                self.requested = true;
                None
            }
        }
    }

    /// Starts the pass if its deadline has been reached.
    pub fn take_due(&mut self, now: HostTime) -> bool {
        match self.state {
            FrameState::Delayed { deadline } if deadline <= now => {
                self.state = FrameState::Compositing;
                self.requested = false;
                true
            }
            _ => false,
        }
    }

    /// The pass found nothing to paint; the next request runs without delay.
    pub fn pass_idle(&mut self, now: HostTime) -> Option<HostTime> {
        self.delay = Duration::ZERO;
        self.finish(now)
    }

    /// The pass painted a frame and took `paint_duration`.
    ///
    /// With `swap_pending` the scheduler waits for
    /// [`swap_complete`](Self::swap_complete). Otherwise the next pass is
    /// held back by one refresh interval. Returns the deadline when a
    /// deferred request armed the timer.
    pub fn pass_finished(
        &mut self,
        now: HostTime,
        paint_duration: Duration,
        swap_pending: bool,
    ) -> Option<HostTime> {
        self.update_paint_periods(paint_duration);
        if swap_pending || self.state == FrameState::SwapPending {
            self.state = FrameState::SwapPending;
            return None;
        }
        self.delay = self.refresh;
        self.finish(now)
    }

    /// A frame was handed to the display outside of a pass result, e.g. by
    /// a backend that swaps on its own; wait for its completion.
    pub fn begin_swap(&mut self) {
        self.state = FrameState::SwapPending;
    }

    /// The pass failed; its duration is not recorded and a retry is armed
    /// one refresh interval later.
    pub fn pass_failed(&mut self, now: HostTime) -> Option<HostTime> {
        self.delay = self.refresh;
        self.requested = true;
        self.finish(now)
    }

    /// The in-flight swap completed.
    ///
    /// Returns `None` if no swap was pending; otherwise the delay chosen for
    /// the next pass and, when a deferred request armed the timer, its
    /// deadline.
    pub fn swap_complete(&mut self, now: HostTime) -> Option<(Duration, Option<HostTime>)> {
        if self.state != FrameState::SwapPending {
            return None;
        }
        let margin = self.refresh.divided_by(self.config.vblank_margin_divisor);
        let paint = self.paint_durations[0].max(self.paint_durations[1]);
        self.delay = self.refresh.saturating_sub(margin).saturating_sub(paint);
        let delay = self.delay;
        Some((delay, self.finish(now)))
    }

    /// Drops the armed timer, any deferred request and any in-flight swap.
    pub fn cancel(&mut self) {
        self.state = FrameState::Idle;
        self.requested = false;
    }

    fn finish(&mut self, now: HostTime) -> Option<HostTime> {
        self.state = FrameState::Idle;
        self.delay_from = now;
        if core::mem::take(&mut self.requested) {
            Some(self.arm(now))
        } else {
            None
        }
    }

    fn arm(&mut self, now: HostTime) -> HostTime {
        let wait = self.delay.min(self.config.max_composite_wait);
        let deadline = (self.delay_from + wait).max(now);
        self.state = FrameState::Delayed { deadline };
        deadline
    }

    fn update_paint_periods(&mut self, duration: Duration) {
        if duration > self.paint_durations[1] {
            self.paint_durations[1] = duration;
        }
        self.paint_periods += 1;
        if self.paint_periods >= self.config.paint_period_frames {
            self.paint_durations[0] = self.paint_durations[1];
            self.paint_durations[1] = Duration::ZERO;
            self.paint_periods = 0;
        }
    }
}

// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compositor settings.

use serde::{Deserialize, Serialize};
use vitrail_core::time::Duration;
use vitrail_render::CompositingType;

use crate::scheduler::SchedulerConfig;

/// How passes are scheduled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingMode {
    /// Each output has its own timer and swap state.
    PerOutput,
    /// One timer and one repaint region for the whole screen.
    Global,
}

/// Settings the compositor reads at start and on
/// [`reconfigure`](crate::Compositor::reconfigure).
///
/// Missing fields take their default values when deserializing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Backend tried first. A type the platform does not support is ignored
    /// with a warning.
    pub preferred_compositing: Option<CompositingType>,
    /// `false` starts suspended by the user.
    pub use_compositing: bool,
    /// Per-output or whole-screen scheduling.
    pub scheduling: SchedulingMode,
    /// Delay before a released compositing selection is given up.
    pub selection_release_delay_ms: u64,
    /// Upper bound of the coalescing delay; 250 ms keeps at least 4 frames
    /// per second.
    pub max_composite_wait_ms: u64,
    /// A pass after a completed swap starts this fraction of a refresh cycle
    /// (`1 / divisor`) before the next vblank.
    pub vblank_margin_divisor: u64,
    /// Number of passes over which the longest paint duration is kept.
    pub paint_period_frames: u32,
    /// Refresh rate assumed for outputs that do not report one.
    pub fallback_refresh_rate_mhz: u32,
    /// Frames wrapped in GPU safe points after the backend starts.
    pub frames_to_test_for_safety: u32,
}

impl CompositorConfig {
    /// Settings for a compositor that drives its outputs directly.
    #[must_use]
    pub const fn wayland() -> Self {
        Self {
            preferred_compositing: None,
            use_compositing: true,
            scheduling: SchedulingMode::PerOutput,
            selection_release_delay_ms: 2000,
            max_composite_wait_ms: 250,
            vblank_margin_divisor: 10,
            paint_period_frames: 100,
            fallback_refresh_rate_mhz: 60_000,
            frames_to_test_for_safety: 0,
        }
    }

    /// Settings for a compositing manager on a shared X screen.
    #[must_use]
    pub const fn x11() -> Self {
        Self {
            scheduling: SchedulingMode::Global,
            frames_to_test_for_safety: 3,
            ..Self::wayland()
        }
    }

    /// Timing parameters for the frame schedulers.
    #[must_use]
    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            max_composite_wait: Duration::from_millis(self.max_composite_wait_ms),
            vblank_margin_divisor: self.vblank_margin_divisor.max(1),
            paint_period_frames: self.paint_period_frames.max(1),
        }
    }

    /// Delay before the compositing selection is released.
    #[must_use]
    pub fn selection_release_delay(&self) -> Duration {
        Duration::from_millis(self.selection_release_delay_ms)
    }

    /// Backend types to try, in order: `preferred_compositing` first when
    /// `supported` contains it, then the rest of `supported`.
    #[must_use]
    pub fn compositing_order(&self, supported: &[CompositingType]) -> Vec<CompositingType> {
        let mut order = supported.to_vec();
        if let Some(preferred) = self.preferred_compositing {
            match order.iter().position(|t| *t == preferred) {
                Some(idx) => {
                    let preferred = order.remove(idx);
                    order.insert(0, preferred);
                }
                None => tracing::warn!(
                    %preferred,
                    "configured compositor not supported by platform, falling back to defaults"
                ),
            }
        }
        order
    }
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self::wayland()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x11_schedules_globally() {
        let config = CompositorConfig::x11();
        assert_eq!(config.scheduling, SchedulingMode::Global);
        assert_eq!(config.frames_to_test_for_safety, 3);
        assert_eq!(config.max_composite_wait_ms, 250);
    }

    #[test]
    fn preferred_type_moves_to_front() {
        let config = CompositorConfig {
            preferred_compositing: Some(CompositingType::Raster),
            ..CompositorConfig::default()
        };
        assert_eq!(
            config.compositing_order(&CompositingType::FALLBACK_ORDER),
            [
                CompositingType::Raster,
                CompositingType::Gpu,
                CompositingType::LegacyPicture
            ]
        );
    }

    #[test]
    fn unsupported_preference_keeps_platform_order() {
        let config = CompositorConfig {
            preferred_compositing: Some(CompositingType::LegacyPicture),
            ..CompositorConfig::default()
        };
        let supported = [CompositingType::Gpu, CompositingType::Raster];
        assert_eq!(config.compositing_order(&supported), supported);
    }

    #[test]
    fn scheduler_config_never_divides_by_zero() {
        let config = CompositorConfig {
            vblank_margin_divisor: 0,
            paint_period_frames: 0,
            ..CompositorConfig::default()
        };
        let scheduler = config.scheduler();
        assert_eq!(scheduler.vblank_margin_divisor, 1);
        assert_eq!(scheduler.paint_period_frames, 1);
    }
}

// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Display outputs.
//!
//! [`OutputId`] is a lightweight handle identifying a display. The platform
//! assigns IDs and describes each display with an [`OutputInfo`]; core
//! treats the ID as opaque and only reads the geometry and refresh rate.

use core::fmt;

use crate::region::Rect;
use crate::time::Duration;

/// Identifies a specific display output.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct OutputId(pub u32);

impl fmt::Debug for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OutputId({})", self.0)
    }
}

/// Identifies the clock an output's presentation timestamps are taken on.
///
/// Mirrors the clock ids used by presentation-time protocols
/// (`CLOCK_MONOTONIC` is `1` on Linux).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct ClockId(pub u32);

impl ClockId {
    /// `CLOCK_MONOTONIC`.
    pub const MONOTONIC: Self = Self(1);
}

/// Platform description of one display.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutputInfo {
    /// Output handle.
    pub id: OutputId,
    /// Position and size in the global compositor space.
    pub geometry: Rect,
    /// Refresh rate in millihertz; `0` when unknown.
    pub refresh_millihertz: u32,
    /// Device scale factor.
    pub scale: f64,
    /// Clock used for presentation timestamps.
    pub clock: ClockId,
    /// Disabled outputs keep their state but are never painted.
    pub enabled: bool,
}

impl OutputInfo {
    /// Creates an enabled output at scale 1 on the monotonic clock.
    #[must_use]
    pub fn new(id: OutputId, geometry: Rect, refresh_millihertz: u32) -> Self {
        Self {
            id,
            geometry,
            refresh_millihertz,
            scale: 1.0,
            clock: ClockId::MONOTONIC,
            enabled: true,
        }
    }

    /// Length of one refresh cycle, using `fallback_millihertz` when the
    /// output does not report a rate.
    #[must_use]
    pub fn refresh_interval(&self, fallback_millihertz: u32) -> Duration {
        let rate = if self.refresh_millihertz == 0 {
            fallback_millihertz
        } else {
            self.refresh_millihertz
        };
        Duration::from_refresh_millihertz(rate)
    }
}

/// Returns the output whose geometry overlaps `rect` the most.
///
/// Ties resolve to the output listed first. Disabled outputs and outputs
/// that do not overlap at all are skipped.
#[must_use]
pub fn max_coverage_output<'a, I>(outputs: I, rect: Rect) -> Option<OutputId>
where
    I: IntoIterator<Item = &'a OutputInfo>,
{
    let mut best: Option<(OutputId, i64)> = None;
    for output in outputs {
        if !output.enabled {
            continue;
        }
        let area = output.geometry.intersect(rect).area();
        if area == 0 {
            continue;
        }
        if best.is_none_or(|(_, a)| area > a) {
            best = Some((output.id, area));
        }
    }
    best.map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_outputs() -> [OutputInfo; 2] {
        [
            OutputInfo::new(OutputId(1), Rect::new(0, 0, 1920, 1080), 60_000),
            OutputInfo::new(OutputId(2), Rect::new(1920, 0, 1920, 1080), 144_000),
        ]
    }

    #[test]
    fn max_coverage_picks_largest_overlap() {
        let outputs = two_outputs();
        let straddling = Rect::new(1800, 100, 400, 300);
        assert_eq!(max_coverage_output(&outputs, straddling), Some(OutputId(2)));
        let left = Rect::new(1700, 100, 300, 300);
        assert_eq!(max_coverage_output(&outputs, left), Some(OutputId(1)));
    }

    #[test]
    fn max_coverage_skips_disabled_and_disjoint() {
        let mut outputs = two_outputs();
        outputs[1].enabled = false;
        assert_eq!(
            max_coverage_output(&outputs, Rect::new(2000, 0, 10, 10)),
            None
        );
        assert_eq!(
            max_coverage_output(&outputs, Rect::new(-500, -500, 10, 10)),
            None
        );
    }

    #[test]
    fn refresh_interval_falls_back() {
        let mut output = two_outputs()[0];
        output.refresh_millihertz = 0;
        assert_eq!(
            output.refresh_interval(50_000),
            Duration::from_refresh_millihertz(50_000)
        );
    }
}

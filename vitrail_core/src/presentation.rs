// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Presentation feedback.
//!
//! After a frame reaches the screen, the backend reports a
//! [`PresentationData`] describing when and how it was shown. The compositor
//! forwards it to every surface that was waiting on that output.

use bitflags::bitflags;

use crate::time::{Duration, HostTime};

bitflags! {
    /// How a frame was presented.
    ///
    /// Bit values match the `wp_presentation_feedback.kind` protocol enum.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct PresentationKinds: u32 {
        /// Presentation was synchronized to the vertical retrace.
        const VSYNC = 0x1;
        /// The timestamp comes from a hardware clock.
        const HW_CLOCK = 0x2;
        /// Completion was signalled by hardware.
        const HW_COMPLETION = 0x4;
        /// The client buffer was scanned out directly.
        const ZERO_COPY = 0x8;
    }
}

impl PresentationKinds {
    /// Kinds reported for a page flip completed by the display hardware.
    pub const HARDWARE_FLIP: Self = Self::VSYNC
        .union(Self::HW_CLOCK)
        .union(Self::HW_COMPLETION);
}

/// Feedback for one presented frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PresentationData {
    /// Output-local frame counter (MSC), `0` when unknown.
    pub sequence: u64,
    /// When the frame turned into light.
    pub timestamp: HostTime,
    /// Refresh interval of the output; zero when unknown or variable.
    pub refresh: Duration,
    /// How the frame was presented.
    pub kinds: PresentationKinds,
}

impl PresentationData {
    /// Feedback for a frame presented at `timestamp` without hardware
    /// sequence information.
    #[must_use]
    pub const fn software(timestamp: HostTime, refresh: Duration, kinds: PresentationKinds) -> Self {
        Self {
            sequence: 0,
            timestamp,
            refresh,
            kinds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hardware_flip_kinds() {
        let kinds = PresentationKinds::HARDWARE_FLIP;
        assert!(kinds.contains(PresentationKinds::VSYNC));
        assert!(kinds.contains(PresentationKinds::HW_CLOCK));
        assert!(kinds.contains(PresentationKinds::HW_COMPLETION));
        assert!(!kinds.contains(PresentationKinds::ZERO_COPY));
        assert_eq!(kinds.bits(), 0x7);
    }

    #[test]
    fn software_feedback_has_no_sequence() {
        let data = PresentationData::software(
            HostTime(5),
            Duration::from_refresh_millihertz(60_000),
            PresentationKinds::VSYNC,
        );
        assert_eq!(data.sequence, 0);
        assert_eq!(data.kinds, PresentationKinds::VSYNC);
    }
}

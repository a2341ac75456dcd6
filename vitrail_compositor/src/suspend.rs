// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use bitflags::bitflags;

bitflags! {
    /// Why compositing is suspended. Compositing only runs while no bit is
    /// set.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct SuspendReasons: u8 {
        /// The user turned compositing off.
        const USER = 0x1;
        /// A window rule asked for compositing to be blocked.
        const BLOCK_RULE = 0x2;
        /// A script turned compositing off.
        const SCRIPT = 0x4;
    }
}

impl SuspendReasons {
    /// Human-readable names of the set reasons.
    #[must_use]
    pub fn descriptions(self) -> Vec<&'static str> {
        self.iter()
            .map(|reason| match reason {
                Self::USER => "disabled by user",
                Self::BLOCK_RULE => "disabled by window",
                _ => "disabled by script",
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptions_follow_bit_order() {
        let reasons = SuspendReasons::SCRIPT | SuspendReasons::USER;
        assert_eq!(reasons.descriptions(), ["disabled by user", "disabled by script"]);
        assert!(SuspendReasons::empty().descriptions().is_empty());
    }
}

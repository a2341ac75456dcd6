// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Opaque resource keys for backend-managed textures.

use core::fmt;

use vitrail_core::window::WindowId;

/// An opaque handle to a backend-managed texture or picture.
///
/// The scene derives one key per window; backends map it to whatever
/// native object holds the window's pixels.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceKey(pub u64);

impl ResourceKey {
    /// Key of the texture holding `window`'s content.
    #[must_use]
    pub const fn for_window(window: WindowId) -> Self {
        Self(window.0 as u64)
    }
}

impl fmt::Debug for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceKey({})", self.0)
    }
}

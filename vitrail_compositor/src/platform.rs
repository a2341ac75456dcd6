// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! What the compositor needs from the windowing platform.

use vitrail_core::damage::DamageProtocol;
use vitrail_core::output::{ClockId, OutputInfo};
use vitrail_core::time::HostTime;
use vitrail_render::{Backend, BackendResult, CompositingType};

use crate::selection::Atom;

/// The windowing platform a compositor runs on.
///
/// Only the required methods describe every platform; the defaulted ones
/// cover features that exist on some platforms only, such as the manager
/// selection of a shared X screen.
pub trait Platform {
    /// Current outputs.
    fn outputs(&self) -> Vec<OutputInfo>;

    /// Backend types the platform can create, in fallback order.
    fn supported_compositors(&self) -> Vec<CompositingType>;

    /// Creates a backend of `kind`. The first `guarded_frames` frames of a
    /// GPU backend are wrapped in safe points.
    fn create_backend(
        &mut self,
        kind: CompositingType,
        guarded_frames: u32,
    ) -> BackendResult<Box<dyn Backend>>;

    /// Current time on the compositor's monotonic clock, used to measure
    /// paint durations.
    fn now(&self) -> HostTime;

    /// Returns `true` if the platform can composite at all.
    fn compositing_possible(&self) -> bool {
        true
    }

    /// Why [`compositing_possible`](Self::compositing_possible) is `false`.
    fn compositing_not_possible_reason(&self) -> String {
        String::new()
    }

    /// Returns `true` if at least one output is enabled.
    fn outputs_enabled(&self) -> bool {
        self.outputs().iter().any(|o| o.enabled)
    }

    /// Returns `true` if windows cannot be shown without compositing.
    fn requires_compositing(&self) -> bool {
        false
    }

    /// Clock presentation timestamps are taken on.
    fn clock_id(&self) -> ClockId {
        ClockId::MONOTONIC
    }

    /// Tells the platform which backend type is in use.
    fn set_selected_compositor(&mut self, kind: CompositingType) {
        _ = kind;
    }

    /// Asynchronous damage notifications, when the platform has them.
    fn damage_protocol(&mut self) -> Option<&mut dyn DamageProtocol> {
        None
    }

    /// Takes ownership of the compositing manager selection.
    fn claim_selection(&mut self) {}

    /// Gives up the compositing manager selection.
    fn release_selection(&mut self) {}

    /// Deletes a support property nobody uses any more.
    fn delete_support_property(&mut self, atom: Atom) {
        _ = atom;
    }
}

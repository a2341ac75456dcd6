// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-window damage and repaint bookkeeping.
//!
//! Every [`Window`](crate::window::Window) carries a [`WindowDamage`] with
//! three regions, each in its own coordinate space:
//!
//! | Region | Space | Filled by |
//! |---|---|---|
//! | `damage` | content-local | the client (what must be re-uploaded) |
//! | `repaints` | frame-local | damage, plus explicit repaint requests |
//! | `layer_repaints` | global | effects (e.g. a window's old position) |
//!
//! `damage` only grows between fetch rounds and is handed to the backend for
//! texture upload. `repaints` and `layer_repaints` are drained when a pass
//! starts; anything added during the pass is kept for the next one.
//!
//! # Asynchronous fetch
//!
//! On protocols that report damage asynchronously the tracker runs a
//! two-phase round trip. [`DamageFetch`] makes the state explicit: a reply
//! can only be consumed while a fetch is [`Requested`](DamageFetch::Requested)
//! and consuming it moves the state back to [`Idle`](DamageFetch::Idle), so
//! a reply is never read twice and reading without a request is a no-op.

use alloc::collections::BTreeSet;
use alloc::vec::Vec;

use crate::output::{OutputId, OutputInfo};
use crate::region::{Rect, Region};
use crate::window::WindowId;

/// Identifies one outstanding damage fetch on the protocol connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FetchToken(pub u64);

/// State of the asynchronous damage round trip.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum DamageFetch {
    /// No fetch is outstanding.
    #[default]
    Idle,
    /// A fetch was issued and its reply has not been consumed.
    Requested(FetchToken),
}

impl DamageFetch {
    /// Returns `true` if a reply is owed.
    #[inline]
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Requested(_))
    }
}

/// A damage reply as decoded by the protocol layer.
///
/// Coordinates are in protocol space: relative to the window's buffer,
/// which starts `client_frame_extents` above and to the left of the frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DamageReply {
    /// Damaged rectangles, possibly overlapping.
    pub rects: Vec<Rect>,
    /// Bounding box of `rects`.
    pub extents: Rect,
}

impl DamageReply {
    /// Replies with more rectangles than this are collapsed to their extents.
    pub const MAX_RECTS: usize = 16;

    /// Converts the reply to a region.
    ///
    /// Small rectangle lists are used verbatim. A single rectangle, an empty
    /// list, or a list of [`MAX_RECTS`](Self::MAX_RECTS) or more is replaced
    /// by the extents.
    #[must_use]
    pub fn to_region(&self) -> Region {
        let count = self.rects.len();
        if count > 1 && count < Self::MAX_RECTS {
            self.rects.iter().copied().collect()
        } else {
            Region::from_rect(self.extents)
        }
    }
}

/// The asynchronous damage notification protocol.
///
/// Implemented by the protocol layer (e.g. an X11 damage extension client).
/// Windows for which the protocol keeps no damage object never reach it.
pub trait DamageProtocol {
    /// Subtracts the damage accumulated on `window` and requests it.
    fn request_fetch(&mut self, window: WindowId) -> FetchToken;

    /// Takes the reply for `token`. `None` means the request failed.
    fn take_reply(&mut self, token: FetchToken) -> Option<DamageReply>;
}

/// Damage and repaint state of one window.
#[derive(Clone, Debug, Default)]
pub struct WindowDamage {
    pub(crate) damage: Region,
    pub(crate) repaints: Region,
    pub(crate) layer_repaints: Region,
    pub(crate) is_damaged: bool,
    pub(crate) fetch: DamageFetch,
    pub(crate) tracked: bool,
    pub(crate) repaint_outputs: BTreeSet<OutputId>,
}

impl WindowDamage {
    /// Content-space damage not yet consumed by the backend.
    #[inline]
    #[must_use]
    pub fn damage(&self) -> &Region {
        &self.damage
    }

    /// Frame-space repaint region.
    #[inline]
    #[must_use]
    pub fn repaints_region(&self) -> &Region {
        &self.repaints
    }

    /// Global-space repaint region requested by effects.
    #[inline]
    #[must_use]
    pub fn layer_repaints(&self) -> &Region {
        &self.layer_repaints
    }

    /// Returns `true` if damage arrived since the last fetch.
    #[inline]
    #[must_use]
    pub fn is_damaged(&self) -> bool {
        self.is_damaged
    }

    /// State of the asynchronous fetch.
    #[inline]
    #[must_use]
    pub fn fetch(&self) -> DamageFetch {
        self.fetch
    }

    /// Returns `true` if the damage protocol tracks this window.
    #[inline]
    #[must_use]
    pub fn is_tracked(&self) -> bool {
        self.tracked
    }

    /// Outputs that still owe this window a repaint.
    #[inline]
    #[must_use]
    pub fn repaint_outputs(&self) -> &BTreeSet<OutputId> {
        &self.repaint_outputs
    }

    /// Global repaint region: frame repaints moved to `pos` plus layer
    /// repaints.
    #[must_use]
    pub fn repaints(&self, pos: (i32, i32)) -> Region {
        let mut out = self.repaints.translated(pos.0, pos.1);
        out.union(&self.layer_repaints);
        out
    }

    /// Drops the content damage after the backend consumed it.
    pub fn reset_damage(&mut self) {
        self.damage.clear();
    }

    /// Adds every enabled output that intersects `region` to the set of
    /// outputs owing a repaint.
    pub(crate) fn add_repaint_outputs(&mut self, region: &Region, outputs: &[OutputInfo]) {
        for output in outputs {
            if !output.enabled || self.repaint_outputs.contains(&output.id) {
                continue;
            }
            if region.intersects_rect(output.geometry) {
                self.repaint_outputs.insert(output.id);
            }
        }
    }

    /// Marks the repaint for `output` as done.
    ///
    /// `None` clears everything. Otherwise `output` is removed from the
    /// owing set and only the part of its geometry that no remaining owing
    /// output covers is cleared.
    pub fn reset_repaints(&mut self, output: Option<&OutputInfo>, outputs: &[OutputInfo], pos: (i32, i32)) {
        let Some(output) = output else {
            self.repaint_outputs.clear();
            self.clear_repaints();
            return;
        };
        self.repaint_outputs.remove(&output.id);
        if self.repaint_outputs.is_empty() {
            self.clear_repaints();
            return;
        }

        let mut reset = Region::from_rect(output.geometry);
        for other in outputs {
            if self.repaint_outputs.contains(&other.id) {
                reset.subtract_rect(other.geometry);
            }
        }

        self.repaints.translate(pos.0, pos.1);
        self.repaints.subtract(&reset);
        self.repaints.translate(-pos.0, -pos.1);
        self.layer_repaints.subtract(&reset);
    }

    /// Drops every repaint without touching the owing set.
    pub(crate) fn clear_repaints(&mut self) {
        self.repaints.clear();
        self.layer_repaints.clear();
    }

    /// Forgets all state, as when compositing stops.
    pub(crate) fn finish(&mut self) {
        *self = Self::default();
    }
}

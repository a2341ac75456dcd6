// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The [`Effect`] trait.

use core::fmt;

use vitrail_core::region::Region;
use vitrail_core::window::WindowId;

use super::chain::Next;
use super::data::{
    EffectWindow, PaintMask, ScreenPaintData, ScreenPrePaintData, WindowPaintData,
    WindowPrePaintData,
};
use super::state::EffectsHandle;

/// Handle of a registered effect.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EffectId(pub u64);

impl fmt::Debug for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EffectId({})", self.0)
    }
}

/// Capabilities an effect can provide to the rest of the window manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Feature {
    /// Draws interactive resize feedback.
    Resize,
    /// Shows a geometry tip while moving or resizing.
    GeometryTip,
    /// Draws a placement outline.
    Outline,
    /// Inverts screen colors.
    ScreenInversion,
    /// Blurs behind translucent windows.
    Blur,
    /// Adjusts contrast behind translucent windows.
    Contrast,
    /// Highlights windows, e.g. from a task bar hover.
    HighlightWindows,
}

/// One stage of the paint pipeline.
///
/// Every paint hook receives a [`Next`] cursor for the rest of the chain.
/// The default implementations forward unchanged; an effect that does not
/// call `next` stops the stage for every later effect and the scene.
/// Calling `next` more than once paints more than once.
pub trait Effect {
    /// Unique name.
    fn name(&self) -> &str;

    /// Position in the chain; lower runs earlier.
    fn requested_position(&self) -> i32 {
        0
    }

    /// Inactive effects are skipped by every paint stage.
    fn is_active(&self) -> bool {
        true
    }

    /// Returns `true` if the effect implements `feature`.
    fn provides(&self, feature: Feature) -> bool {
        _ = feature;
        false
    }

    /// Before painting an output.
    fn pre_paint_screen(&mut self, data: &mut ScreenPrePaintData, mut next: Next<'_>) {
        next.pre_paint_screen(data);
    }

    /// Paints an output.
    fn paint_screen(
        &mut self,
        mask: PaintMask,
        region: &Region,
        data: &mut ScreenPaintData,
        mut next: Next<'_>,
    ) {
        next.paint_screen(mask, region, data);
    }

    /// After painting an output.
    fn post_paint_screen(&mut self, mut next: Next<'_>) {
        next.post_paint_screen();
    }

    /// Before painting a window.
    fn pre_paint_window(
        &mut self,
        window: &EffectWindow,
        data: &mut WindowPrePaintData,
        mut next: Next<'_>,
    ) {
        next.pre_paint_window(window, data);
    }

    /// Paints a window.
    fn paint_window(
        &mut self,
        window: &EffectWindow,
        mask: PaintMask,
        region: &Region,
        data: &mut WindowPaintData,
        mut next: Next<'_>,
    ) {
        next.paint_window(window, mask, region, data);
    }

    /// Draws a window.
    fn draw_window(
        &mut self,
        window: &EffectWindow,
        mask: PaintMask,
        region: &Region,
        data: &mut WindowPaintData,
        mut next: Next<'_>,
    ) {
        next.draw_window(window, mask, region, data);
    }

    /// After painting a window.
    fn post_paint_window(&mut self, window: &EffectWindow, mut next: Next<'_>) {
        next.post_paint_window(window);
    }

    /// A window was added.
    fn window_added(&mut self, window: &EffectWindow, effects: EffectsHandle<'_>) {
        _ = (window, effects);
    }

    /// A window was closed and is now a remnant.
    fn window_closed(&mut self, window: &EffectWindow, effects: EffectsHandle<'_>) {
        _ = (window, effects);
    }

    /// A window is gone; drop any reference to it.
    fn window_deleted(&mut self, window: WindowId) {
        _ = window;
    }

    /// A window's content changed; drop cached copies of it.
    fn discard_cached_texture(&mut self, window: WindowId) {
        _ = window;
    }
}

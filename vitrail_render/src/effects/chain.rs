// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The ordered effect chain and its cursor.
//!
//! Effects are kept sorted by `(requested_position, registration order)`.
//! A paint stage starts with a root [`Next`] over the whole chain; each call
//! on a cursor runs the first active effect left and hands it a cursor over
//! the effects after it. When no active effect is left the scene's own
//! stage runs. Scene stages do not paint directly, they record what to
//! paint in a recorder that the scene expands after the stage
//! returns.

use core::fmt;

use kurbo::Affine;
use tracing::{debug, warn};
use vitrail_core::region::{Rect, Region};
use vitrail_core::signal::Signal;
use vitrail_core::window::WindowId;

use super::data::{
    EffectWindow, PaintMask, ScreenPaintData, ScreenPrePaintData, WindowPaintData,
    WindowPrePaintData,
};
use super::effect::{Effect, EffectId, Feature};
use super::state::{EffectsHandle, EffectsState};
use crate::backend::{Color, RenderOp, WindowDraw};

/// A screen-level paint step.
#[derive(Clone, Debug)]
pub(crate) enum ScreenOp {
    /// A plain operation recorded by an effect.
    Render(RenderOp),
    /// Paint the windows here.
    Windows {
        mask: PaintMask,
        region: Region,
        data: ScreenPaintData,
    },
}

/// A window draw requested by the window paint stage.
#[derive(Clone, Debug)]
pub(crate) struct PendingDraw {
    pub(crate) window: WindowId,
    pub(crate) mask: PaintMask,
    pub(crate) region: Region,
    pub(crate) data: WindowPaintData,
}

/// Collects what the scene stages were asked to paint.
#[derive(Debug, Default)]
pub(crate) struct PaintRecorder {
    screen: Vec<ScreenOp>,
    draws: Vec<PendingDraw>,
    window_ops: Vec<RenderOp>,
    screen_transform: Affine,
    window_level: bool,
}

impl PaintRecorder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Switches to window-level recording under `screen_transform`.
    pub(crate) fn begin_windows(&mut self, screen_transform: Affine) {
        self.screen_transform = screen_transform;
        self.window_level = true;
    }

    pub(crate) fn end_windows(&mut self) {
        self.window_level = false;
        self.screen_transform = Affine::IDENTITY;
    }

    pub(crate) fn take_screen_ops(&mut self) -> Vec<ScreenOp> {
        core::mem::take(&mut self.screen)
    }

    pub(crate) fn take_draws(&mut self) -> Vec<PendingDraw> {
        core::mem::take(&mut self.draws)
    }

    pub(crate) fn take_window_ops(&mut self) -> Vec<RenderOp> {
        core::mem::take(&mut self.window_ops)
    }
}

pub(crate) struct ChainEntry {
    id: EffectId,
    seq: u64,
    position: i32,
    effect: Box<dyn Effect>,
}

impl fmt::Debug for ChainEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainEntry")
            .field("id", &self.id)
            .field("name", &self.effect.name())
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

/// Cursor over the part of the chain after the running effect.
pub struct Next<'a> {
    rest: &'a mut [ChainEntry],
    state: &'a mut EffectsState,
    recorder: &'a mut PaintRecorder,
    caller: EffectId,
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.rest.len())
            .field("caller", &self.caller)
            .finish_non_exhaustive()
    }
}

impl Next<'_> {
    fn split(&mut self) -> Option<(&mut ChainEntry, Next<'_>)> {
        let idx = self.rest.iter().position(|e| e.effect.is_active())?;
        let (head, tail) = self.rest[idx..].split_first_mut()?;
        let caller = head.id;
        Some((
            head,
            Next {
                rest: tail,
                state: &mut *self.state,
                recorder: &mut *self.recorder,
                caller,
            },
        ))
    }

    /// Shared effect state, acting as the running effect.
    pub fn effects(&mut self) -> EffectsHandle<'_> {
        EffectsHandle::new(self.state, self.caller)
    }

    /// Read access to the shared effect state.
    #[must_use]
    pub fn state(&self) -> &EffectsState {
        &*self.state
    }

    /// Paints a solid rectangle at the current point of the stage.
    pub fn fill(&mut self, rect: Rect, color: Color) {
        let op = RenderOp::Fill { rect, color };
        if self.recorder.window_level {
            self.recorder.window_ops.push(op);
        } else {
            self.recorder.screen.push(ScreenOp::Render(op));
        }
    }

    /// Continues the screen pre-paint stage.
    pub fn pre_paint_screen(&mut self, data: &mut ScreenPrePaintData) {
        if let Some((head, next)) = self.split() {
            head.effect.pre_paint_screen(data, next);
        }
    }

    /// Continues the screen paint stage.
    pub fn paint_screen(&mut self, mask: PaintMask, region: &Region, data: &mut ScreenPaintData) {
        match self.split() {
            Some((head, next)) => head.effect.paint_screen(mask, region, data, next),
            None => self.recorder.screen.push(ScreenOp::Windows {
                mask,
                region: region.clone(),
                data: *data,
            }),
        }
    }

    /// Continues the screen post-paint stage.
    pub fn post_paint_screen(&mut self) {
        if let Some((head, next)) = self.split() {
            head.effect.post_paint_screen(next);
        }
    }

    /// Continues the window pre-paint stage.
    pub fn pre_paint_window(&mut self, window: &EffectWindow, data: &mut WindowPrePaintData) {
        if let Some((head, next)) = self.split() {
            head.effect.pre_paint_window(window, data, next);
        }
    }

    /// Continues the window paint stage.
    pub fn paint_window(
        &mut self,
        window: &EffectWindow,
        mask: PaintMask,
        region: &Region,
        data: &mut WindowPaintData,
    ) {
        match self.split() {
            Some((head, next)) => head.effect.paint_window(window, mask, region, data, next),
            None => self.recorder.draws.push(PendingDraw {
                window: window.id,
                mask,
                region: region.clone(),
                data: data.clone(),
            }),
        }
    }

    /// Continues the window draw stage.
    pub fn draw_window(
        &mut self,
        window: &EffectWindow,
        mask: PaintMask,
        region: &Region,
        data: &mut WindowPaintData,
    ) {
        match self.split() {
            Some((head, next)) => head.effect.draw_window(window, mask, region, data, next),
            None => {
                let render = window.render_geometry;
                let transform = self.recorder.screen_transform * data.transform;
                self.recorder.window_ops.push(RenderOp::Window(WindowDraw {
                    window: window.id,
                    texture: window.texture,
                    origin: (render.x, render.y),
                    quads: data.quads.clone(),
                    transform,
                    opacity: data.opacity,
                    clip: region.clone(),
                }));
            }
        }
    }

    /// Continues the window post-paint stage.
    pub fn post_paint_window(&mut self, window: &EffectWindow) {
        if let Some((head, next)) = self.split() {
            head.effect.post_paint_window(window, next);
        }
    }
}

/// Registered effects in paint order, plus their shared state.
pub struct EffectChain {
    entries: Vec<ChainEntry>,
    state: EffectsState,
    next_id: u64,
    next_seq: u64,
    effect_loaded: Signal<(EffectId, String)>,
}

impl fmt::Debug for EffectChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectChain")
            .field("entries", &self.entries)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Default for EffectChain {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            state: EffectsState::new(),
            next_id: 0,
            next_seq: 0,
            effect_loaded: Signal::new(),
        }
    }

    /// Adds an effect at its requested position, after every effect with the
    /// same position. Returns `None` if an effect with the same name is
    /// already loaded.
    pub fn register(&mut self, effect: Box<dyn Effect>) -> Option<EffectId> {
        if self.find(effect.name()).is_some() {
            warn!(name = effect.name(), "effect is already loaded");
            return None;
        }
        self.next_id += 1;
        self.next_seq += 1;
        let id = EffectId(self.next_id);
        let position = effect.requested_position();
        let name = effect.name().to_owned();
        let entry = ChainEntry {
            id,
            seq: self.next_seq,
            position,
            effect,
        };
        let idx = self
            .entries
            .partition_point(|e| (e.position, e.seq) <= (entry.position, entry.seq));
        self.entries.insert(idx, entry);
        debug!(%name, position, "effect loaded");
        self.effect_loaded.emit(&(id, name));
        Some(id)
    }

    /// Removes an effect and releases everything it held.
    pub fn unload(&mut self, id: EffectId) -> Option<Box<dyn Effect>> {
        let idx = self.entries.iter().position(|e| e.id == id)?;
        let entry = self.entries.remove(idx);
        self.state.effect_unloaded(id);
        debug!(name = entry.effect.name(), "effect unloaded");
        Some(entry.effect)
    }

    /// Removes every effect.
    pub fn unload_all(&mut self) {
        let ids: Vec<EffectId> = self.entries.iter().map(|e| e.id).collect();
        for id in ids {
            self.unload(id);
        }
    }

    /// Re-reads every effect's requested position and restores the order.
    pub fn resort(&mut self) {
        for entry in &mut self.entries {
            entry.position = entry.effect.requested_position();
        }
        self.entries.sort_by_key(|e| (e.position, e.seq));
    }

    /// Number of loaded effects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no effect is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finds an effect by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<EffectId> {
        self.entries
            .iter()
            .find(|e| e.effect.name() == name)
            .map(|e| e.id)
    }

    /// Returns `true` if an effect named `name` is loaded.
    #[must_use]
    pub fn is_loaded(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Looks up an effect.
    #[must_use]
    pub fn get(&self, id: EffectId) -> Option<&dyn Effect> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.effect.as_ref())
    }

    /// Names of loaded effects in chain order.
    #[must_use]
    pub fn loaded_effects(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.effect.name()).collect()
    }

    /// Names of active effects in chain order.
    #[must_use]
    pub fn active_effects(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.effect.is_active())
            .map(|e| e.effect.name())
            .collect()
    }

    /// Returns `true` if any effect is active.
    #[must_use]
    pub fn has_active_effects(&self) -> bool {
        self.entries.iter().any(|e| e.effect.is_active())
    }

    /// First effect in chain order that provides `feature`.
    #[must_use]
    pub fn provides(&self, feature: Feature) -> Option<EffectId> {
        self.entries
            .iter()
            .find(|e| e.effect.provides(feature))
            .map(|e| e.id)
    }

    /// Shared effect state.
    #[must_use]
    pub fn state(&self) -> &EffectsState {
        &self.state
    }

    /// Shared effect state, mutably.
    pub fn state_mut(&mut self) -> &mut EffectsState {
        &mut self.state
    }

    /// Acts on the shared state as `effect`.
    pub fn handle(&mut self, effect: EffectId) -> EffectsHandle<'_> {
        EffectsHandle::new(&mut self.state, effect)
    }

    /// Emitted with the handle and name of every newly loaded effect.
    pub fn effect_loaded(&mut self) -> &mut Signal<(EffectId, String)> {
        &mut self.effect_loaded
    }

    /// Cursor at the start of the chain.
    pub(crate) fn root<'a>(&'a mut self, recorder: &'a mut PaintRecorder) -> Next<'a> {
        Next {
            rest: &mut self.entries,
            state: &mut self.state,
            recorder,
            caller: EffectId(0),
        }
    }

    /// Tells every effect that a window was added.
    pub fn window_added(&mut self, window: &EffectWindow) {
        for entry in &mut self.entries {
            entry
                .effect
                .window_added(window, EffectsHandle::new(&mut self.state, entry.id));
        }
    }

    /// Tells every effect that a window closed.
    pub fn window_closed(&mut self, window: &EffectWindow) {
        for entry in &mut self.entries {
            entry
                .effect
                .window_closed(window, EffectsHandle::new(&mut self.state, entry.id));
        }
    }

    /// Tells every effect that a window is gone and drops state tied to it.
    pub fn window_deleted(&mut self, window: WindowId) {
        for entry in &mut self.entries {
            entry.effect.window_deleted(window);
        }
        self.state.window_deleted(window);
    }

    /// Tells every effect that a window's content changed.
    pub fn discard_cached_texture(&mut self, window: WindowId) {
        for entry in &mut self.entries {
            entry.effect.discard_cached_texture(window);
        }
    }
}

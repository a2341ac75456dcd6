// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared effect state: grabs, elevation, full-screen exclusivity, the
//! keyboard grab, remnant references and repaint requests.

use core::fmt;

use hashbrown::HashMap;
use tracing::debug;
use vitrail_core::region::Region;
use vitrail_core::signal::Signal;
use vitrail_core::window::WindowId;

use super::effect::EffectId;

/// A window lifecycle transition an effect may claim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GrabRole {
    /// The window appears.
    WindowAdded,
    /// The window closes.
    WindowClosed,
    /// The window is minimized.
    WindowMinimized,
    /// The window is unminimized.
    WindowUnminimized,
}

/// Repaints requested by effects, applied by the compositor after a pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RepaintRequest {
    /// Repaint every output.
    pub full: bool,
    /// Global region to repaint.
    pub region: Region,
}

impl RepaintRequest {
    /// Returns `true` if nothing was requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.full && self.region.is_empty()
    }
}

/// State shared by every effect in the chain.
#[derive(Default)]
pub struct EffectsState {
    grabs: HashMap<(WindowId, GrabRole), EffectId>,
    elevated: Vec<WindowId>,
    active_full_screen: Option<EffectId>,
    has_active_full_screen_effect_changed: Signal<bool>,
    keyboard_grab: Option<EffectId>,
    remnant_refs: HashMap<(WindowId, EffectId), u32>,
    released_remnants: Vec<WindowId>,
    repaints: RepaintRequest,
}

impl fmt::Debug for EffectsState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectsState")
            .field("grabs", &self.grabs.len())
            .field("elevated", &self.elevated)
            .field("active_full_screen", &self.active_full_screen)
            .field("keyboard_grab", &self.keyboard_grab)
            .field("remnant_refs", &self.remnant_refs.len())
            .finish_non_exhaustive()
    }
}

impl EffectsState {
    /// Creates empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- grabs ---

    /// Claims `role` on `window` for `effect`.
    ///
    /// Fails if another effect holds the grab, unless `force` is set, in
    /// which case that effect loses it. Re-grabbing an own grab succeeds.
    pub fn grab(&mut self, effect: EffectId, window: WindowId, role: GrabRole, force: bool) -> bool {
        match self.grabs.get(&(window, role)).copied() {
            Some(holder) if holder == effect => true,
            Some(holder) if !force => {
                debug!(?window, ?role, ?holder, "grab refused");
                false
            }
            _ => {
                self.grabs.insert((window, role), effect);
                true
            }
        }
    }

    /// Releases a grab held by `effect`. Returns `false` if `effect` did
    /// not hold it.
    pub fn ungrab(&mut self, effect: EffectId, window: WindowId, role: GrabRole) -> bool {
        if self.grabs.get(&(window, role)) == Some(&effect) {
            self.grabs.remove(&(window, role));
            true
        } else {
            false
        }
    }

    /// Effect holding `role` on `window`.
    #[must_use]
    pub fn grab_holder(&self, window: WindowId, role: GrabRole) -> Option<EffectId> {
        self.grabs.get(&(window, role)).copied()
    }

    // --- elevation ---

    /// Paints `window` above the stacking order, or stops doing so.
    pub fn set_elevated(&mut self, window: WindowId, elevated: bool) {
        if elevated {
            if !self.elevated.contains(&window) {
                self.elevated.push(window);
            }
        } else {
            self.elevated.retain(|w| *w != window);
        }
    }

    /// Elevated windows in the order they were elevated.
    #[must_use]
    pub fn elevated_windows(&self) -> &[WindowId] {
        &self.elevated
    }

    // --- full-screen effect ---

    /// Makes `effect` the active full-screen effect.
    ///
    /// Returns the current holder as the error if another effect is active.
    pub fn set_active_full_screen_effect(&mut self, effect: EffectId) -> Result<(), EffectId> {
        match self.active_full_screen {
            Some(current) if current == effect => Ok(()),
            Some(current) => Err(current),
            None => {
                self.active_full_screen = Some(effect);
                self.has_active_full_screen_effect_changed.emit(&true);
                Ok(())
            }
        }
    }

    /// Makes `effect` the active full-screen effect, displacing any other
    /// and returning it.
    pub fn replace_active_full_screen_effect(&mut self, effect: EffectId) -> Option<EffectId> {
        let previous = self.active_full_screen.replace(effect);
        if previous.is_none() {
            self.has_active_full_screen_effect_changed.emit(&true);
        }
        previous.filter(|p| *p != effect)
    }

    /// Clears the full-screen status held by `effect`.
    pub fn clear_active_full_screen_effect(&mut self, effect: EffectId) -> bool {
        if self.active_full_screen != Some(effect) {
            return false;
        }
        self.active_full_screen = None;
        self.has_active_full_screen_effect_changed.emit(&false);
        true
    }

    /// The active full-screen effect.
    #[must_use]
    pub fn active_full_screen_effect(&self) -> Option<EffectId> {
        self.active_full_screen
    }

    /// Returns `true` if `effect` is the active full-screen effect.
    #[must_use]
    pub fn is_active_full_screen_effect(&self, effect: EffectId) -> bool {
        self.active_full_screen == Some(effect)
    }

    /// Returns `true` if any full-screen effect is active.
    #[must_use]
    pub fn has_active_full_screen_effect(&self) -> bool {
        self.active_full_screen.is_some()
    }

    /// Screen edges are blocked while a full-screen effect is active.
    #[must_use]
    pub fn screen_edges_blocked(&self) -> bool {
        self.has_active_full_screen_effect()
    }

    /// Emitted with the new value whenever a full-screen effect becomes
    /// active or none is active any more.
    pub fn has_active_full_screen_effect_changed(&mut self) -> &mut Signal<bool> {
        &mut self.has_active_full_screen_effect_changed
    }

    // --- keyboard ---

    /// Routes keyboard input to `effect`. Fails if another effect has it.
    pub fn grab_keyboard(&mut self, effect: EffectId) -> bool {
        match self.keyboard_grab {
            Some(holder) => holder == effect,
            None => {
                self.keyboard_grab = Some(effect);
                true
            }
        }
    }

    /// Releases the keyboard grab of `effect`.
    pub fn ungrab_keyboard(&mut self, effect: EffectId) -> bool {
        if self.keyboard_grab == Some(effect) {
            self.keyboard_grab = None;
            true
        } else {
            false
        }
    }

    /// Effect holding the keyboard.
    #[must_use]
    pub fn keyboard_grab(&self) -> Option<EffectId> {
        self.keyboard_grab
    }

    // --- remnants ---

    /// Keeps a closed window around for painting on behalf of `effect`.
    pub fn ref_remnant(&mut self, effect: EffectId, window: WindowId) {
        *self.remnant_refs.entry((window, effect)).or_insert(0) += 1;
    }

    /// Drops a reference `effect` took with
    /// [`ref_remnant`](Self::ref_remnant). The last release of the window
    /// by any effect queues it for removal.
    pub fn unref_remnant(&mut self, effect: EffectId, window: WindowId) {
        let Some(count) = self.remnant_refs.get_mut(&(window, effect)) else {
            return;
        };
        *count -= 1;
        if *count == 0 {
            self.remnant_refs.remove(&(window, effect));
            self.queue_if_released(window);
        }
    }

    /// Returns `true` if an effect still uses the closed window.
    #[must_use]
    pub fn is_remnant_referenced(&self, window: WindowId) -> bool {
        self.remnant_refs.keys().any(|(w, _)| *w == window)
    }

    fn queue_if_released(&mut self, window: WindowId) {
        if !self.is_remnant_referenced(window) && !self.released_remnants.contains(&window) {
            self.released_remnants.push(window);
        }
    }

    /// Drains closed windows no effect uses any more.
    pub fn take_released_remnants(&mut self) -> Vec<WindowId> {
        core::mem::take(&mut self.released_remnants)
    }

    // --- repaints ---

    /// Requests a repaint of every output.
    pub fn add_repaint_full(&mut self) {
        self.repaints.full = true;
    }

    /// Requests a repaint of a global region.
    pub fn add_repaint(&mut self, region: &Region) {
        self.repaints.region.union(region);
    }

    /// Repaint requests not yet drained.
    #[must_use]
    pub fn pending_repaints(&self) -> &RepaintRequest {
        &self.repaints
    }

    /// Drains repaint requests.
    pub fn take_repaints(&mut self) -> RepaintRequest {
        core::mem::take(&mut self.repaints)
    }

    // --- cleanup ---

    /// Drops everything that refers to a destroyed window.
    pub fn window_deleted(&mut self, window: WindowId) {
        self.grabs.retain(|(w, _), _| *w != window);
        self.elevated.retain(|w| *w != window);
        self.remnant_refs.retain(|(w, _), _| *w != window);
        self.released_remnants.retain(|w| *w != window);
    }

    /// Releases everything held by an unloaded effect.
    pub fn effect_unloaded(&mut self, effect: EffectId) {
        self.grabs.retain(|_, holder| *holder != effect);
        self.clear_active_full_screen_effect(effect);
        self.ungrab_keyboard(effect);
        let mut held: Vec<WindowId> = Vec::new();
        self.remnant_refs.retain(|(window, holder), _| {
            if *holder == effect {
                held.push(*window);
            }
            *holder != effect
        });
        for window in held {
            self.queue_if_released(window);
        }
    }
}

/// An effect's access to [`EffectsState`], acting as that effect.
#[derive(Debug)]
pub struct EffectsHandle<'a> {
    state: &'a mut EffectsState,
    caller: EffectId,
}

impl<'a> EffectsHandle<'a> {
    /// Acts on `state` as `caller`.
    pub fn new(state: &'a mut EffectsState, caller: EffectId) -> Self {
        Self { state, caller }
    }

    /// The effect this handle acts for.
    #[must_use]
    pub fn caller(&self) -> EffectId {
        self.caller
    }

    /// Read access to the shared state.
    #[must_use]
    pub fn state(&self) -> &EffectsState {
        &*self.state
    }

    /// See [`EffectsState::grab`].
    pub fn grab(&mut self, window: WindowId, role: GrabRole, force: bool) -> bool {
        self.state.grab(self.caller, window, role, force)
    }

    /// See [`EffectsState::ungrab`].
    pub fn ungrab(&mut self, window: WindowId, role: GrabRole) -> bool {
        self.state.ungrab(self.caller, window, role)
    }

    /// See [`EffectsState::set_elevated`].
    pub fn set_elevated(&mut self, window: WindowId, elevated: bool) {
        self.state.set_elevated(window, elevated);
    }

    /// See [`EffectsState::set_active_full_screen_effect`].
    pub fn set_active_full_screen_effect(&mut self) -> Result<(), EffectId> {
        self.state.set_active_full_screen_effect(self.caller)
    }

    /// See [`EffectsState::replace_active_full_screen_effect`].
    pub fn replace_active_full_screen_effect(&mut self) -> Option<EffectId> {
        self.state.replace_active_full_screen_effect(self.caller)
    }

    /// See [`EffectsState::clear_active_full_screen_effect`].
    pub fn clear_active_full_screen_effect(&mut self) -> bool {
        self.state.clear_active_full_screen_effect(self.caller)
    }

    /// Returns `true` if the caller is the active full-screen effect.
    #[must_use]
    pub fn is_active_full_screen_effect(&self) -> bool {
        self.state.is_active_full_screen_effect(self.caller)
    }

    /// See [`EffectsState::grab_keyboard`].
    pub fn grab_keyboard(&mut self) -> bool {
        self.state.grab_keyboard(self.caller)
    }

    /// See [`EffectsState::ungrab_keyboard`].
    pub fn ungrab_keyboard(&mut self) -> bool {
        self.state.ungrab_keyboard(self.caller)
    }

    /// See [`EffectsState::ref_remnant`].
    pub fn ref_remnant(&mut self, window: WindowId) {
        self.state.ref_remnant(self.caller, window);
    }

    /// See [`EffectsState::unref_remnant`].
    pub fn unref_remnant(&mut self, window: WindowId) {
        self.state.unref_remnant(self.caller, window);
    }

    /// See [`EffectsState::add_repaint_full`].
    pub fn add_repaint_full(&mut self) {
        self.state.add_repaint_full();
    }

    /// See [`EffectsState::add_repaint`].
    pub fn add_repaint(&mut self, region: &Region) {
        self.state.add_repaint(region);
    }
}

// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The scene: one paint pass from window list to presented frame.
//!
//! A pass on an output runs:
//!
//! 1. Upload new window content to the backend.
//! 2. Build the paint order: ready windows in stacking order, then the
//!    windows effects elevated.
//! 3. `pre_paint_screen` on the effect chain; effects may grow the region.
//! 4. Ask the backend which region must actually be redrawn.
//! 5. `paint_screen`; where the chain reaches the scene, every window runs
//!    `pre_paint_window`, is clipped by the opaque windows above it, then
//!    runs `paint_window`, `draw_window` and `post_paint_window`.
//! 6. `post_paint_screen`, then render, commit and present.
//!
//! Per-window caches are invalidated by [`Scene::handle_event`] through
//! dirty channels that are drained before the call returns, so a pass never
//! sees half-updated quads.

use core::fmt;

use hashbrown::HashMap;
use tracing::{debug, trace, warn};
use understory_dirty::{CycleHandling, DirtyTracker, EagerPolicy};
use vitrail_core::dirty;
use vitrail_core::output::{OutputId, OutputInfo};
use vitrail_core::region::Region;
use vitrail_core::time::{Clock, Duration, HostTime};
use vitrail_core::window::{Space, SpaceEvent, Window, WindowFlags, WindowId};

use crate::backend::{Backend, Color, CompositingType, Frame, PresentOutcome, RenderOp, TextureUpload};
use crate::effects::chain::{PaintRecorder, ScreenOp};
use crate::effects::data::{
    DisabledReasons, EffectWindow, PaintMask, ScreenPaintData, ScreenPrePaintData,
    WindowPaintData, WindowPrePaintData,
};
use crate::effects::EffectChain;
use crate::error::BackendResult;
use crate::scene_window::{SceneWindow, texture_size};

/// What a pass did.
#[derive(Clone, Debug)]
pub struct PaintOutcome {
    /// Time spent in the pass, as measured by the clock handed to
    /// [`Scene::paint`].
    pub elapsed: Duration,
    /// Damage of the pass after effects extended it.
    pub damage: Region,
    /// Region the backend redrew.
    pub repainted: Region,
    /// Windows drawn, bottom to top. A window drawn more than once is listed
    /// once.
    pub windows: Vec<WindowId>,
    /// Result of handing the frame to the display.
    pub presented: PresentOutcome,
}

/// One window's state between the pre-paint and paint stages.
#[derive(Debug)]
struct WindowPhase {
    window: EffectWindow,
    data: WindowPrePaintData,
}

/// Paints windows through the effect chain into a backend.
pub struct Scene {
    backend: Box<dyn Backend>,
    effects: EffectChain,
    windows: HashMap<WindowId, SceneWindow>,
    dirty: DirtyTracker<u32>,
    background: Color,
    screen_locked: bool,
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("backend", &self.backend)
            .field("effects", &self.effects)
            .field("windows", &self.windows.len())
            .field("screen_locked", &self.screen_locked)
            .finish_non_exhaustive()
    }
}

impl Scene {
    /// Creates a scene painting into `backend`, with an empty effect chain.
    #[must_use]
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self::with_effects(backend, EffectChain::new())
    }

    /// Creates a scene that takes over an existing effect chain.
    #[must_use]
    pub fn with_effects(backend: Box<dyn Backend>, effects: EffectChain) -> Self {
        Self {
            backend,
            effects,
            windows: HashMap::new(),
            dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
            background: [0.0, 0.0, 0.0, 1.0],
            screen_locked: false,
        }
    }

    /// Kind of the backend in use.
    #[must_use]
    pub fn compositing_type(&self) -> CompositingType {
        self.backend.compositing_type()
    }

    /// The backend.
    #[must_use]
    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// The backend, mutably.
    pub fn backend_mut(&mut self) -> &mut dyn Backend {
        self.backend.as_mut()
    }

    /// The effect chain.
    #[must_use]
    pub fn effects(&self) -> &EffectChain {
        &self.effects
    }

    /// The effect chain, mutably.
    pub fn effects_mut(&mut self) -> &mut EffectChain {
        &mut self.effects
    }

    /// Sets the color of uncovered areas.
    pub fn set_background(&mut self, color: Color) {
        self.background = color;
    }

    /// While locked, only lock-screen and input-method windows are painted.
    pub fn set_screen_locked(&mut self, locked: bool) {
        self.screen_locked = locked;
    }

    /// Returns `true` while the screen is locked.
    #[must_use]
    pub fn is_screen_locked(&self) -> bool {
        self.screen_locked
    }

    /// Creates backend state for an output.
    pub fn add_output(&mut self, output: &OutputInfo) -> BackendResult<()> {
        self.backend.add_output(output)
    }

    /// Drops backend state of an output.
    pub fn remove_output(&mut self, output: OutputId) {
        self.backend.remove_output(output);
    }

    /// Scene state of a window.
    #[must_use]
    pub fn window(&self, id: WindowId) -> Option<&SceneWindow> {
        self.windows.get(&id)
    }

    /// Number of windows the scene tracks.
    #[must_use]
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// Creates scene state for every window already in `space`, bottom to
    /// top, as when compositing starts.
    pub fn add_existing_windows(&mut self, space: &Space) {
        let ids: Vec<WindowId> = space.stacking_order().to_vec();
        for id in ids {
            self.handle_event(&SpaceEvent::Added(id), space);
        }
        for window in space.windows_in_stacking_order() {
            if let Some(lead) = window.lead() {
                self.handle_event(
                    &SpaceEvent::Annexed {
                        child: window.id(),
                        lead,
                    },
                    space,
                );
            }
        }
    }

    /// Applies a batch of window-layer events.
    pub fn handle_events(&mut self, events: &[SpaceEvent], space: &Space) {
        for event in events {
            self.handle_event(event, space);
        }
    }

    /// Reacts to one window-layer event.
    ///
    /// Cache invalidation is complete when this returns.
    pub fn handle_event(&mut self, event: &SpaceEvent, space: &Space) {
        match *event {
            SpaceEvent::Added(id) => {
                if self.windows.contains_key(&id) {
                    return;
                }
                self.windows.insert(id, SceneWindow::new(id));
                if let Some(window) = space.get(id) {
                    self.effects
                        .window_added(&EffectWindow::from_window(window, None, false));
                }
            }
            SpaceEvent::Closed(id) => {
                let Some(window) = space.get(id) else {
                    return;
                };
                let texture = self.windows.get(&id).and_then(SceneWindow::texture);
                self.effects
                    .window_closed(&EffectWindow::from_window(window, texture, false));
            }
            SpaceEvent::Removed(id) => {
                let Some(cached) = self.windows.remove(&id) else {
                    return;
                };
                self.effects.window_deleted(id);
                self.backend.release_texture(cached.key());
                self.dirty.remove_key(id.0);
                debug!(window = ?id, "scene window dropped");
            }
            SpaceEvent::GeometryChanged { window, .. } => {
                if self.windows.contains_key(&window) {
                    self.dirty.mark_with(window.0, dirty::GEOMETRY, &EagerPolicy);
                }
            }
            SpaceEvent::ShapeChanged(id) => {
                if self.windows.contains_key(&id) {
                    self.dirty.mark(id.0, dirty::SHAPE);
                }
            }
            SpaceEvent::BufferChanged(id) => {
                if self.windows.contains_key(&id) {
                    self.dirty.mark(id.0, dirty::BUFFER);
                    self.effects.discard_cached_texture(id);
                }
            }
            SpaceEvent::Damaged(id) => {
                if self.windows.contains_key(&id) {
                    self.effects.discard_cached_texture(id);
                }
            }
            SpaceEvent::Annexed { child, lead } => {
                // Child depends on lead: moving the lead rebuilds the child.
                if let Err(err) = self.dirty.add_dependency(child.0, lead.0, dirty::GEOMETRY) {
                    warn!(child = child.0, lead = lead.0, ?err, "annex link not tracked");
                }
                self.dirty.mark(child.0, dirty::GEOMETRY);
            }
            SpaceEvent::NeedsRepaint(_) | SpaceEvent::Shown(_) | SpaceEvent::BlockingChanged(_) => {}
        }
        self.flush_invalidations();
    }

    fn flush_invalidations(&mut self) {
        // Drain GEOMETRY, following lead-to-child edges.
        let moved: Vec<u32> = self
            .dirty
            .drain(dirty::GEOMETRY)
            .affected()
            .deterministic()
            .run()
            .collect();
        for idx in moved {
            if let Some(cached) = self.windows.get_mut(&WindowId(idx)) {
                cached.invalidate_quads();
            }
        }

        // Drain SHAPE.
        let reshaped: Vec<u32> = self
            .dirty
            .drain(dirty::SHAPE)
            .deterministic()
            .run()
            .collect();
        for idx in reshaped {
            if let Some(cached) = self.windows.get_mut(&WindowId(idx)) {
                cached.invalidate_quads();
            }
        }

        // Drain BUFFER.
        let replaced: Vec<u32> = self
            .dirty
            .drain(dirty::BUFFER)
            .deterministic()
            .run()
            .collect();
        for idx in replaced {
            if let Some(cached) = self.windows.get_mut(&WindowId(idx)) {
                cached.invalidate_texture();
            }
        }
    }

    /// Returns `true` if no window waits for a repaint and no effect asked
    /// for one.
    #[must_use]
    pub fn is_idle(&self, space: &Space) -> bool {
        self.effects.state().pending_repaints().is_empty()
            && !space
                .windows_in_stacking_order()
                .any(Window::has_pending_repaints)
    }

    /// Tells the backend a pass found nothing to paint.
    pub fn idle(&mut self) {
        self.backend.idle();
    }

    /// Windows in paint order, each with whether an effect elevated it.
    #[must_use]
    pub fn paint_order(&self, space: &Space) -> Vec<(WindowId, bool)> {
        let elevated = self.effects.state().elevated_windows();
        let mut order: Vec<(WindowId, bool)> = space
            .windows_in_stacking_order()
            .filter(|w| w.ready_for_painting() && !elevated.contains(&w.id()))
            .filter(|w| self.windows.contains_key(&w.id()))
            .map(|w| (w.id(), false))
            .collect();
        order.extend(
            elevated
                .iter()
                .filter(|id| space.get(**id).is_some() && self.windows.contains_key(*id))
                .map(|id| (*id, true)),
        );
        order
    }

    fn update_textures(&mut self, space: &mut Space) -> BackendResult<()> {
        let ids: Vec<WindowId> = space.stacking_order().to_vec();
        for id in ids {
            let (Some(window), Some(cached)) = (space.get(id), self.windows.get_mut(&id)) else {
                continue;
            };
            let Some(buffer) = window.buffer() else {
                continue;
            };
            if !window.ready_for_painting() || !cached.needs_upload(window) {
                continue;
            }
            let damage = cached.upload_region(window);
            self.backend.update_texture(TextureUpload {
                key: cached.key(),
                buffer,
                size: texture_size(window),
                damage: &damage,
            })?;
            cached.mark_uploaded();
            if let Some(window) = space.get_mut(id) {
                window.reset_damage();
            }
        }
        Ok(())
    }

    /// Paints `damage` (global coordinates) on `output` and presents it.
    ///
    /// The caller drains window repaints before the pass; repaints added
    /// while it runs belong to the next one.
    #[tracing::instrument(skip_all, fields(output = ?output.id))]
    pub fn paint(
        &mut self,
        space: &mut Space,
        output: &OutputInfo,
        damage: &Region,
        present_time: HostTime,
        clock: &dyn Clock,
    ) -> BackendResult<PaintOutcome> {
        let started = clock.now();
        self.update_textures(space)?;

        let order = self.paint_order(space);
        let full = Region::from_rect(output.geometry);
        let mut recorder = PaintRecorder::new();

        let mut screen = ScreenPrePaintData {
            mask: PaintMask::REGION,
            paint: damage.intersected(&full),
            output: output.id,
            present_time,
        };
        self.effects.root(&mut recorder).pre_paint_screen(&mut screen);
        let mask = screen.mask;
        let damage = if mask.contains(PaintMask::REGION) {
            screen.paint.intersected(&full)
        } else {
            full
        };

        let repaint = self.backend.prepare_rendering_frame(output, &damage)?;
        trace!(windows = order.len(), area = repaint.area(), "painting");

        let mut data = ScreenPaintData::new(output.id);
        self.effects
            .root(&mut recorder)
            .paint_screen(mask, &repaint, &mut data);

        let mut frame = Frame::new(output.id, repaint.clone());
        let mut painted = Vec::new();
        for op in recorder.take_screen_ops() {
            match op {
                ScreenOp::Render(op) => frame.ops.push(op),
                ScreenOp::Windows { mask, region, data } => self.paint_windows(
                    space,
                    &order,
                    mask,
                    &region,
                    &data,
                    &mut recorder,
                    &mut frame,
                    &mut painted,
                ),
            }
        }

        self.effects.root(&mut recorder).post_paint_screen();
        for op in recorder.take_screen_ops() {
            if let ScreenOp::Render(op) = op {
                frame.ops.push(op);
            }
        }

        self.backend.render(output, &frame)?;
        self.backend
            .end_rendering_frame(output.id, &repaint, &damage)?;
        let presented = self.backend.present(output.id)?;

        Ok(PaintOutcome {
            elapsed: clock.now().saturating_duration_since(started),
            damage,
            repainted: repaint,
            windows: painted,
            presented,
        })
    }

    fn paint_windows(
        &mut self,
        space: &Space,
        order: &[(WindowId, bool)],
        mask: PaintMask,
        region: &Region,
        screen: &ScreenPaintData,
        recorder: &mut PaintRecorder,
        frame: &mut Frame,
        painted: &mut Vec<WindowId>,
    ) {
        recorder.begin_windows(screen.transform);

        let mut phases = Vec::with_capacity(order.len());
        for &(id, elevated) in order {
            let (Some(window), Some(cached)) = (space.get(id), self.windows.get_mut(&id)) else {
                continue;
            };
            let effect_window = EffectWindow::from_window(window, cached.texture(), elevated);
            let quads = cached.quads(window).to_vec();

            let mut disabled = DisabledReasons::empty();
            if window.is_remnant() {
                disabled |= DisabledReasons::DELETED;
            }
            if self.screen_locked
                && !window
                    .flags()
                    .intersects(WindowFlags::LOCK_SCREEN | WindowFlags::INPUT_METHOD)
            {
                disabled |= DisabledReasons::SCREEN_LOCKED;
            }

            let opaque = effect_window.is_opaque();
            let window_mask = mask
                | if opaque {
                    PaintMask::WINDOW_OPAQUE
                } else {
                    PaintMask::WINDOW_TRANSLUCENT
                };
            let mut data = WindowPrePaintData::new(window_mask, region.clone(), quads, disabled);
            if opaque {
                data.clip = Region::from_rect(effect_window.frame_geometry);
            }
            self.effects
                .root(recorder)
                .pre_paint_window(&effect_window, &mut data);
            phases.push(WindowPhase {
                window: effect_window,
                data,
            });
        }

        // Top to bottom: what opaque windows cover is not painted below them.
        let clipping = !mask.intersects(PaintMask::GENERIC_SCREEN);
        let mut covered = Region::new();
        for phase in phases.iter_mut().rev() {
            if !phase.data.is_painting_enabled() {
                continue;
            }
            let data = &mut phase.data;
            if !data.mask.contains(PaintMask::WINDOW_TRANSFORMED) {
                data.paint.intersect_rect(phase.window.visible_rect);
            }
            if clipping {
                data.paint.subtract(&covered);
                covered.union(&data.clip.intersected(region));
            }
        }

        let background = if clipping {
            region.subtracted(&covered)
        } else {
            region.clone()
        };
        if !background.is_empty() {
            frame.ops.push(RenderOp::Clear {
                region: background,
                color: self.background,
            });
        }

        for phase in phases {
            let WindowPhase { window, data } = phase;
            if data.is_painting_enabled() && !data.paint.is_empty() {
                let mut paint_data = WindowPaintData::new(&window, data.quads);
                self.effects
                    .root(recorder)
                    .paint_window(&window, data.mask, &data.paint, &mut paint_data);
                let draws = recorder.take_draws();
                for mut draw in draws.into_iter().filter(|d| d.window == window.id) {
                    self.effects
                        .root(recorder)
                        .draw_window(&window, draw.mask, &draw.region, &mut draw.data);
                }
                let ops = recorder.take_window_ops();
                if ops.iter().any(|op| matches!(op, RenderOp::Window(_)))
                    && !painted.contains(&window.id)
                {
                    painted.push(window.id);
                }
                frame.ops.extend(ops);
            }
            self.effects.root(recorder).post_paint_window(&window);
            frame.ops.extend(recorder.take_window_ops());
        }

        recorder.end_windows();
    }

    /// Drops every window, unloads effects and tears the backend down.
    ///
    /// Effects are unloaded first so they release window references before
    /// the textures go away.
    pub fn tear_down(&mut self) {
        self.effects.unload_all();
        for (_, cached) in self.windows.drain() {
            self.backend.release_texture(cached.key());
            self.dirty.remove_key(cached.id().0);
        }
        self.backend.tear_down();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{Effect, Next};
    use crate::resource::ResourceKey;
    use std::cell::RefCell;
    use std::rc::Rc;
    use vitrail_core::region::Rect;
    use vitrail_core::window::{BufferId, WindowKind};

    #[derive(Debug, Default)]
    struct Log {
        frames: Vec<Frame>,
        uploads: Vec<(ResourceKey, Region)>,
        released: Vec<ResourceKey>,
        idle: u32,
    }

    struct Recording(Rc<RefCell<Log>>);

    impl Backend for Recording {
        fn compositing_type(&self) -> CompositingType {
            CompositingType::Raster
        }
        fn supports_buffer_age(&self) -> bool {
            false
        }
        fn has_swap_event(&self) -> bool {
            false
        }
        fn add_output(&mut self, _output: &OutputInfo) -> BackendResult<()> {
            Ok(())
        }
        fn remove_output(&mut self, _output: OutputId) {}
        fn prepare_rendering_frame(
            &mut self,
            _output: &OutputInfo,
            damage: &Region,
        ) -> BackendResult<Region> {
            Ok(damage.clone())
        }
        fn update_texture(&mut self, upload: TextureUpload<'_>) -> BackendResult<()> {
            self.0
                .borrow_mut()
                .uploads
                .push((upload.key, upload.damage.clone()));
            Ok(())
        }
        fn release_texture(&mut self, key: ResourceKey) {
            self.0.borrow_mut().released.push(key);
        }
        fn render(&mut self, _output: &OutputInfo, frame: &Frame) -> BackendResult<()> {
            self.0.borrow_mut().frames.push(frame.clone());
            Ok(())
        }
        fn end_rendering_frame(
            &mut self,
            _output: OutputId,
            _rendered: &Region,
            _damaged: &Region,
        ) -> BackendResult<()> {
            Ok(())
        }
        fn present(&mut self, _output: OutputId) -> BackendResult<PresentOutcome> {
            Ok(PresentOutcome::immediate(None))
        }
        fn idle(&mut self) {
            self.0.borrow_mut().idle += 1;
        }
        fn tear_down(&mut self) {}
        fn is_torn_down(&self) -> bool {
            false
        }
    }

    struct KeepRemnants;

    impl Effect for KeepRemnants {
        fn name(&self) -> &str {
            "keep_remnants"
        }
        fn pre_paint_window(
            &mut self,
            window: &EffectWindow,
            data: &mut WindowPrePaintData,
            mut next: Next<'_>,
        ) {
            if window.is_remnant() {
                data.enable_painting(DisabledReasons::DELETED);
            }
            next.pre_paint_window(window, data);
        }
    }

    fn output() -> OutputInfo {
        OutputInfo::new(OutputId(1), Rect::new(0, 0, 200, 100), 60_000)
    }

    fn setup() -> (Scene, Space, Rc<RefCell<Log>>) {
        let log = Rc::new(RefCell::new(Log::default()));
        let scene = Scene::new(Box::new(Recording(Rc::clone(&log))));
        let mut space = Space::new();
        space.set_outputs(vec![output()], true);
        space.setup_compositing(false);
        (scene, space, log)
    }

    fn add_ready(scene: &mut Scene, space: &mut Space, geometry: Rect) -> WindowId {
        let id = space.add_window(Window::new(WindowKind::Toplevel, geometry).with_buffer(BufferId(1)));
        space.set_ready_for_painting(id);
        let events = space.take_events();
        scene.handle_events(&events, space);
        id
    }

    fn paint(scene: &mut Scene, space: &mut Space, damage: Region) -> PaintOutcome {
        let clock = || HostTime(0);
        scene
            .paint(space, &output(), &damage, HostTime(0), &clock)
            .unwrap()
    }

    fn drawn_windows(frame: &Frame) -> Vec<WindowId> {
        frame
            .ops
            .iter()
            .filter_map(|op| match op {
                RenderOp::Window(draw) => Some(draw.window),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn empty_scene_still_clears_damage() {
        let (mut scene, mut space, log) = setup();
        let damage = Region::from_rect(Rect::new(10, 10, 20, 20));
        let outcome = paint(&mut scene, &mut space, damage.clone());
        assert!(outcome.windows.is_empty());
        let log = log.borrow();
        assert_eq!(log.frames.len(), 1);
        assert!(matches!(
            &log.frames[0].ops[..],
            [RenderOp::Clear { region, .. }] if *region == damage
        ));
    }

    #[test]
    fn unready_windows_are_skipped_and_elevated_go_last() {
        let (mut scene, mut space, _log) = setup();
        let bottom = add_ready(&mut scene, &mut space, Rect::new(0, 0, 50, 50));
        let top = add_ready(&mut scene, &mut space, Rect::new(60, 0, 50, 50));
        let hidden = space.add_window(Window::new(WindowKind::Toplevel, Rect::new(0, 0, 5, 5)));
        let events = space.take_events();
        scene.handle_events(&events, &space);

        scene.effects_mut().state_mut().set_elevated(bottom, true);
        assert_eq!(scene.paint_order(&space), [(top, false), (bottom, true)]);
        assert!(!scene.paint_order(&space).iter().any(|(id, _)| *id == hidden));
    }

    #[test]
    fn opaque_windows_clip_what_is_below() {
        let (mut scene, mut space, log) = setup();
        let below = add_ready(&mut scene, &mut space, Rect::new(0, 0, 100, 100));
        let above = add_ready(&mut scene, &mut space, Rect::new(0, 0, 100, 100));
        let outcome = paint(&mut scene, &mut space, Region::from_rect(Rect::new(0, 0, 200, 100)));
        assert_eq!(outcome.windows, [above]);

        let log = log.borrow();
        let frame = &log.frames[0];
        assert_eq!(drawn_windows(frame), [above]);
        assert!(!drawn_windows(frame).contains(&below));
        let RenderOp::Clear { region, .. } = &frame.ops[0] else {
            panic!("background first");
        };
        assert_eq!(*region, Region::from_rect(Rect::new(100, 0, 100, 100)));
    }

    #[test]
    fn translucent_windows_do_not_clip() {
        let (mut scene, mut space, _log) = setup();
        let below = add_ready(&mut scene, &mut space, Rect::new(0, 0, 100, 100));
        let above = add_ready(&mut scene, &mut space, Rect::new(0, 0, 100, 100));
        space.set_opacity(above, 0.5);
        let outcome = paint(&mut scene, &mut space, Region::from_rect(Rect::new(0, 0, 200, 100)));
        assert_eq!(outcome.windows, [below, above]);
    }

    #[test]
    fn moving_a_lead_rebuilds_annexed_quads() {
        let (mut scene, mut space, _log) = setup();
        let lead = add_ready(&mut scene, &mut space, Rect::new(0, 0, 50, 50));
        let child = add_ready(&mut scene, &mut space, Rect::new(10, 10, 20, 20));
        space.annex(child, lead);
        let events = space.take_events();
        scene.handle_events(&events, &space);
        paint(&mut scene, &mut space, Region::from_rect(Rect::new(0, 0, 200, 100)));
        assert!(scene.window(child).unwrap().has_quads());

        space.set_frame_geometry(lead, Rect::new(100, 0, 50, 50));
        let events = space.take_events();
        scene.handle_events(&events, &space);
        assert!(!scene.window(lead).unwrap().has_quads());
        assert!(!scene.window(child).unwrap().has_quads());
    }

    #[test]
    fn cyclic_annex_keeps_the_first_link() {
        let (mut scene, mut space, _log) = setup();
        let lead = add_ready(&mut scene, &mut space, Rect::new(0, 0, 50, 50));
        let child = add_ready(&mut scene, &mut space, Rect::new(10, 10, 20, 20));
        space.annex(child, lead);
        space.annex(lead, child);
        let events = space.take_events();
        scene.handle_events(&events, &space);
        paint(&mut scene, &mut space, Region::from_rect(Rect::new(0, 0, 200, 100)));
        assert!(scene.window(lead).unwrap().has_quads());
        assert!(scene.window(child).unwrap().has_quads());

        // Moving the child does not reach back to the lead.
        space.set_frame_geometry(child, Rect::new(100, 10, 20, 20));
        let events = space.take_events();
        scene.handle_events(&events, &space);
        assert!(!scene.window(child).unwrap().has_quads());
        assert!(scene.window(lead).unwrap().has_quads());

        space.set_frame_geometry(lead, Rect::new(100, 0, 50, 50));
        let events = space.take_events();
        scene.handle_events(&events, &space);
        assert!(!scene.window(lead).unwrap().has_quads());
    }

    #[test]
    fn content_is_uploaded_once_per_damage() {
        let (mut scene, mut space, log) = setup();
        let id = add_ready(&mut scene, &mut space, Rect::new(0, 0, 40, 30));
        let full = Region::from_rect(Rect::new(0, 0, 200, 100));
        paint(&mut scene, &mut space, full.clone());
        paint(&mut scene, &mut space, full.clone());
        assert_eq!(log.borrow().uploads.len(), 1);
        assert_eq!(log.borrow().uploads[0].1.area(), 40 * 30);

        space.add_damage(id, &Region::from_rect(Rect::new(0, 0, 4, 4)));
        paint(&mut scene, &mut space, full);
        let log = log.borrow();
        assert_eq!(log.uploads.len(), 2);
        assert_eq!(log.uploads[1].1, Region::from_rect(Rect::new(0, 0, 4, 4)));
        assert!(space.get(id).unwrap().damage().damage().is_empty());
    }

    #[test]
    fn remnants_need_an_effect_to_be_painted() {
        let (mut scene, mut space, _log) = setup();
        let id = add_ready(&mut scene, &mut space, Rect::new(0, 0, 50, 50));
        space.close_window(id);
        let events = space.take_events();
        scene.handle_events(&events, &space);
        let full = Region::from_rect(Rect::new(0, 0, 200, 100));
        assert!(paint(&mut scene, &mut space, full.clone()).windows.is_empty());

        scene.effects_mut().register(Box::new(KeepRemnants));
        assert_eq!(paint(&mut scene, &mut space, full).windows, [id]);
    }

    #[test]
    fn locked_screen_paints_only_lock_windows() {
        let (mut scene, mut space, _log) = setup();
        let _app = add_ready(&mut scene, &mut space, Rect::new(0, 0, 50, 50));
        let greeter = space.add_window(
            Window::new(WindowKind::Internal, Rect::new(100, 0, 50, 50))
                .with_flags(WindowFlags::LOCK_SCREEN),
        );
        space.set_ready_for_painting(greeter);
        let events = space.take_events();
        scene.handle_events(&events, &space);

        scene.set_screen_locked(true);
        let outcome = paint(&mut scene, &mut space, Region::from_rect(Rect::new(0, 0, 200, 100)));
        assert_eq!(outcome.windows, [greeter]);
    }

    #[test]
    fn removal_releases_the_texture() {
        let (mut scene, mut space, log) = setup();
        let id = add_ready(&mut scene, &mut space, Rect::new(0, 0, 50, 50));
        space.remove_window(id);
        let events = space.take_events();
        scene.handle_events(&events, &space);
        assert!(scene.window(id).is_none());
        assert_eq!(log.borrow().released, [ResourceKey::for_window(id)]);
        assert!(paint(&mut scene, &mut space, Region::from_rect(Rect::new(0, 0, 10, 10))).windows.is_empty());
    }

    #[test]
    fn idle_until_something_needs_a_repaint() {
        let (mut scene, mut space, log) = setup();
        let id = add_ready(&mut scene, &mut space, Rect::new(0, 0, 50, 50));
        assert!(!scene.is_idle(&space));
        space.reset_repaints(id, None);
        assert!(scene.is_idle(&space));
        scene.idle();
        assert_eq!(log.borrow().idle, 1);

        space.add_repaint(id, &Region::from_rect(Rect::new(0, 0, 1, 1)));
        assert!(!scene.is_idle(&space));
    }
}

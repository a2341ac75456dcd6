// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Paintable windows and the space that stacks them.
//!
//! A [`Window`] is anything the compositor paints: a managed toplevel, a
//! popup, an override-redirect window, an internal surface, or the remnant
//! of a closed window that an effect is still animating. The kinds differ
//! only in the [`WindowKind`] tag; scene and compositor code never branch on
//! it.
//!
//! [`Space`] owns the windows in stacking order and is the seam to the
//! window-management layer. Every mutation that matters for compositing goes
//! through it, so it can apply cross-window rules (annexed transients are
//! repainted with their lead) and queue a [`SpaceEvent`] for the compositor
//! to react to.
//!
//! # Coordinate spaces
//!
//! - *Global*: compositor space shared by outputs.
//! - *Frame*: relative to the top-left of the frame geometry.
//! - *Render*: the frame grown by client-side extents (shadows drawn by the
//!   client). Content damage is relative to its top-left.
//! - *Visible*: render geometry grown by the server-side shadow.

use alloc::vec::Vec;
use core::fmt;

use bitflags::bitflags;
use hashbrown::HashMap;

use crate::damage::{DamageFetch, DamageProtocol, WindowDamage};
use crate::output::{OutputId, OutputInfo};
use crate::region::{Rect, Region};

/// Identifies a window for its whole lifetime, including as a remnant.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct WindowId(pub u32);

impl fmt::Debug for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WindowId({})", self.0)
    }
}

/// Identifies the buffer currently attached to a window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(pub u64);

/// What kind of surface a window is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WindowKind {
    /// A managed application window.
    Toplevel,
    /// A popup or menu attached to another window.
    Popup,
    /// An override-redirect window the window manager does not manage.
    Unmanaged,
    /// A surface created by the compositor itself.
    Internal,
    /// A closed window kept around for its closing animation.
    Remnant,
}

/// Edge insets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Margins {
    /// Left inset.
    pub left: i32,
    /// Top inset.
    pub top: i32,
    /// Right inset.
    pub right: i32,
    /// Bottom inset.
    pub bottom: i32,
}

impl Margins {
    /// Creates insets.
    #[must_use]
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Returns `rect` grown by the insets.
    #[must_use]
    pub const fn grow(self, rect: Rect) -> Rect {
        rect.expanded(self.left, self.top, self.right, self.bottom)
    }
}

/// Server-side decoration of a window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Decoration {
    /// Border sizes inside the frame.
    pub borders: Margins,
    /// `true` when the decoration is drawn into the client's buffer, so
    /// content coordinates start after the borders.
    pub in_content: bool,
}

bitflags! {
    /// Window properties the compositor reads.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct WindowFlags: u8 {
        /// Part of the lock screen.
        const LOCK_SCREEN = 0x1;
        /// An input method panel.
        const INPUT_METHOD = 0x2;
        /// The buffer has an alpha channel.
        const HAS_ALPHA = 0x4;
    }
}

/// A paintable surface.
#[derive(Clone, Debug)]
pub struct Window {
    id: WindowId,
    kind: WindowKind,
    frame_geometry: Rect,
    client_frame_extents: Margins,
    shadow: Margins,
    decoration: Option<Decoration>,
    opacity: f64,
    flags: WindowFlags,
    ready_for_painting: bool,
    awaits_sync: bool,
    blocks_compositing: bool,
    lead: Option<WindowId>,
    annexed: Vec<WindowId>,
    buffer: Option<BufferId>,
    damage: WindowDamage,
}

impl Window {
    /// Creates an opaque, undecorated window that is not yet ready for
    /// painting.
    #[must_use]
    pub fn new(kind: WindowKind, frame_geometry: Rect) -> Self {
        Self {
            id: WindowId::default(),
            kind,
            frame_geometry,
            client_frame_extents: Margins::default(),
            shadow: Margins::default(),
            decoration: None,
            opacity: 1.0,
            flags: WindowFlags::empty(),
            ready_for_painting: false,
            awaits_sync: false,
            blocks_compositing: false,
            lead: None,
            annexed: Vec::new(),
            buffer: None,
            damage: WindowDamage::default(),
        }
    }

    /// Sets the client-drawn extents around the frame.
    #[must_use]
    pub fn with_client_frame_extents(mut self, extents: Margins) -> Self {
        self.client_frame_extents = extents;
        self
    }

    /// Sets the server-side shadow around the render geometry.
    #[must_use]
    pub fn with_shadow(mut self, shadow: Margins) -> Self {
        self.shadow = shadow;
        self
    }

    /// Sets the server-side decoration.
    #[must_use]
    pub fn with_decoration(mut self, decoration: Decoration) -> Self {
        self.decoration = Some(decoration);
        self
    }

    /// Sets the window flags.
    #[must_use]
    pub fn with_flags(mut self, flags: WindowFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the attached buffer.
    #[must_use]
    pub fn with_buffer(mut self, buffer: BufferId) -> Self {
        self.buffer = Some(buffer);
        self
    }

    /// Marks the window as waiting for a sync counter before its first
    /// paint; damage alone will not make it ready.
    #[must_use]
    pub fn awaiting_sync(mut self) -> Self {
        self.awaits_sync = true;
        self
    }

    /// Window handle.
    #[inline]
    #[must_use]
    pub fn id(&self) -> WindowId {
        self.id
    }

    /// Surface kind.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> WindowKind {
        self.kind
    }

    /// Returns `true` for the remnant of a closed window.
    #[inline]
    #[must_use]
    pub fn is_remnant(&self) -> bool {
        self.kind == WindowKind::Remnant
    }

    /// Top-left of the frame in global space.
    #[inline]
    #[must_use]
    pub fn pos(&self) -> (i32, i32) {
        (self.frame_geometry.x, self.frame_geometry.y)
    }

    /// Frame geometry in global space.
    #[inline]
    #[must_use]
    pub fn frame_geometry(&self) -> Rect {
        self.frame_geometry
    }

    /// Frame grown by client-drawn extents, in global space.
    #[inline]
    #[must_use]
    pub fn render_geometry(&self) -> Rect {
        self.client_frame_extents.grow(self.frame_geometry)
    }

    /// Everything the window paints, shadow included, in global space.
    #[inline]
    #[must_use]
    pub fn visible_rect(&self) -> Rect {
        self.shadow.grow(self.render_geometry())
    }

    /// Content rectangle in content-local space.
    #[inline]
    #[must_use]
    pub fn content_rect(&self) -> Rect {
        self.render_geometry().at_origin()
    }

    /// Client-drawn extents around the frame.
    #[inline]
    #[must_use]
    pub fn client_frame_extents(&self) -> Margins {
        self.client_frame_extents
    }

    /// Server-side shadow margins.
    #[inline]
    #[must_use]
    pub fn shadow(&self) -> Margins {
        self.shadow
    }

    /// Server-side decoration, if any.
    #[inline]
    #[must_use]
    pub fn decoration(&self) -> Option<Decoration> {
        self.decoration
    }

    /// Opacity in `0.0..=1.0`.
    #[inline]
    #[must_use]
    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    /// Window flags.
    #[inline]
    #[must_use]
    pub fn flags(&self) -> WindowFlags {
        self.flags
    }

    /// Returns `true` once the client has drawn its first complete frame.
    #[inline]
    #[must_use]
    pub fn ready_for_painting(&self) -> bool {
        self.ready_for_painting
    }

    /// Returns `true` if the window asks for compositing to be suspended.
    #[inline]
    #[must_use]
    pub fn blocks_compositing(&self) -> bool {
        self.blocks_compositing
    }

    /// Lead window this one is annexed to.
    #[inline]
    #[must_use]
    pub fn lead(&self) -> Option<WindowId> {
        self.lead
    }

    /// Transient children painted as part of this window.
    #[inline]
    #[must_use]
    pub fn annexed(&self) -> &[WindowId] {
        &self.annexed
    }

    /// Attached buffer.
    #[inline]
    #[must_use]
    pub fn buffer(&self) -> Option<BufferId> {
        self.buffer
    }

    /// Damage and repaint state.
    #[inline]
    #[must_use]
    pub fn damage(&self) -> &WindowDamage {
        &self.damage
    }

    /// Global repaint region.
    #[must_use]
    pub fn repaints(&self) -> Region {
        self.damage.repaints(self.pos())
    }

    /// Returns `true` if any repaint is pending.
    #[must_use]
    pub fn has_pending_repaints(&self) -> bool {
        !self.repaints().is_empty()
    }

    /// Records a damage notification in content space.
    ///
    /// An empty `region` means the extent is unknown and the whole content
    /// is assumed damaged.
    pub fn mark_damaged(&mut self, region: &Region) {
        if region.is_empty() {
            self.damage.damage.union_rect(self.content_rect());
        } else {
            self.damage.damage.union(region);
        }
        self.damage.is_damaged = true;
    }

    /// Starts a damage round trip.
    ///
    /// Returns `false` if nothing was damaged. Windows the protocol does not
    /// track have their flag cleared without a request.
    pub fn reset_and_fetch_damage(&mut self, protocol: Option<&mut dyn DamageProtocol>) -> bool {
        if !self.damage.is_damaged {
            return false;
        }
        self.damage.is_damaged = false;
        if !self.damage.tracked {
            return true;
        }
        let Some(protocol) = protocol else {
            return true;
        };
        let token = protocol.request_fetch(self.id);
        self.damage.fetch = DamageFetch::Requested(token);
        true
    }

    /// Consumes the reply of an outstanding round trip.
    ///
    /// Without an outstanding fetch this does nothing. A failed reply falls
    /// back to full damage.
    pub fn get_damage_region_reply(
        &mut self,
        protocol: Option<&mut dyn DamageProtocol>,
        outputs: &[OutputInfo],
    ) {
        let DamageFetch::Requested(token) = self.damage.fetch else {
            return;
        };
        self.damage.fetch = DamageFetch::Idle;

        let Some(reply) = protocol.and_then(|p| p.take_reply(token)) else {
            self.add_damage_full(outputs);
            return;
        };

        let mut region = reply.to_region();
        let cfe = self.client_frame_extents;
        region.translate(-cfe.left, -cfe.top);
        self.damage.repaints.union(&region);
        let (x, y) = self.pos();
        self.damage
            .add_repaint_outputs(&region.translated(x, y), outputs);

        if let Some(deco) = self.decoration.filter(|d| d.in_content) {
            region.translate(-deco.borders.left, -deco.borders.top);
        }
        self.damage.damage.union(&region);
    }

    /// Applies client-pushed damage relative to the render geometry.
    pub fn add_damage(&mut self, damage: &Region, outputs: &[OutputInfo]) {
        let render = self.render_geometry();
        let (x, y) = self.pos();
        self.damage
            .repaints
            .union(&damage.translated(render.x - x, render.y - y));
        self.damage
            .add_repaint_outputs(&Region::from_rect(render), outputs);
        self.damage.is_damaged = true;
        self.damage.damage.union(damage);
    }

    /// Damages the whole content.
    pub fn add_damage_full(&mut self, outputs: &[OutputInfo]) {
        let render = self.render_geometry();
        let damage = render.at_origin();
        self.damage.damage = Region::from_rect(damage);

        let mut repaint = damage;
        if let Some(deco) = self.decoration.filter(|d| d.in_content) {
            repaint = repaint.translated(-deco.borders.left, -deco.borders.top);
        }
        self.damage.repaints.union_rect(repaint);
        self.damage
            .add_repaint_outputs(&Region::from_rect(render), outputs);
    }

    /// Requests a repaint of `region` in frame space.
    pub fn add_repaint(&mut self, region: &Region, outputs: &[OutputInfo]) {
        self.damage.repaints.union(region);
        let (x, y) = self.pos();
        self.damage
            .add_repaint_outputs(&region.translated(x, y), outputs);
    }

    /// Requests a repaint of `region` in global space.
    pub fn add_layer_repaint(&mut self, region: &Region, outputs: &[OutputInfo]) {
        self.damage.layer_repaints.union(region);
        self.damage.add_repaint_outputs(region, outputs);
    }

    /// Replaces the frame repaints with the whole visible rect.
    fn add_repaint_full_local(&mut self, outputs: &[OutputInfo]) {
        let visible = self.visible_rect();
        let (x, y) = self.pos();
        self.damage.repaints = Region::from_rect(visible.translated(-x, -y));
        self.damage
            .add_repaint_outputs(&Region::from_rect(visible), outputs);
    }

    /// Marks the repaint owed by `output` as done; see
    /// [`WindowDamage::reset_repaints`].
    pub fn reset_repaints(&mut self, output: Option<&OutputInfo>, outputs: &[OutputInfo]) {
        let pos = self.pos();
        self.damage.reset_repaints(output, outputs, pos);
    }

    /// Drops content damage once the backend has uploaded it.
    pub fn reset_damage(&mut self) {
        self.damage.reset_damage();
    }

    fn setup_compositing(&mut self, tracked: bool, add_full_damage: bool, outputs: &[OutputInfo]) {
        self.damage.tracked = tracked;
        self.damage.damage = Region::from_rect(self.content_rect());
        if add_full_damage {
            self.add_damage_full(outputs);
        }
    }

    fn finish_compositing(&mut self) {
        self.damage.finish();
    }
}

/// Something the compositor must react to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpaceEvent {
    /// A window was added.
    Added(WindowId),
    /// Damage arrived for a window.
    Damaged(WindowId),
    /// A window has new repaints.
    NeedsRepaint(WindowId),
    /// A window became ready for painting.
    Shown(WindowId),
    /// A window closed and is now a remnant.
    Closed(WindowId),
    /// A window's frame geometry changed from `old`.
    GeometryChanged {
        /// The window.
        window: WindowId,
        /// Frame geometry before the change.
        old: Rect,
    },
    /// A window's shape changed.
    ShapeChanged(WindowId),
    /// A window's buffer was replaced.
    BufferChanged(WindowId),
    /// A window's compositing-blocking request changed.
    BlockingChanged(WindowId),
    /// `child` was annexed to `lead` and is now painted with it.
    Annexed {
        /// The transient child.
        child: WindowId,
        /// The window it belongs to.
        lead: WindowId,
    },
    /// A window was destroyed and removed from the space.
    Removed(WindowId),
}

/// Windows in stacking order, plus the outputs they are shown on.
#[derive(Debug, Default)]
pub struct Space {
    windows: HashMap<WindowId, Window>,
    stacking: Vec<WindowId>,
    outputs: Vec<OutputInfo>,
    per_output_repaints: bool,
    compositing: bool,
    next_id: u32,
    events: Vec<SpaceEvent>,
    workspace_repaints: Vec<Rect>,
}

impl Space {
    /// Creates an empty space.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the output list.
    ///
    /// With `per_output_repaints` off (a single shared screen), windows do
    /// not track which outputs owe them a repaint.
    pub fn set_outputs(&mut self, outputs: Vec<OutputInfo>, per_output_repaints: bool) {
        self.outputs = outputs;
        self.per_output_repaints = per_output_repaints;
    }

    /// Current outputs.
    #[must_use]
    pub fn outputs(&self) -> &[OutputInfo] {
        &self.outputs
    }

    /// Looks up an output.
    #[must_use]
    pub fn output(&self, id: OutputId) -> Option<&OutputInfo> {
        self.outputs.iter().find(|o| o.id == id)
    }

    /// Adds an output.
    pub fn add_output(&mut self, output: OutputInfo) {
        self.outputs.retain(|o| o.id != output.id);
        self.outputs.push(output);
    }

    /// Removes an output and forgets every repaint owed by it.
    pub fn remove_output(&mut self, id: OutputId) -> Option<OutputInfo> {
        let idx = self.outputs.iter().position(|o| o.id == id)?;
        let removed = self.outputs.remove(idx);
        for window in self.windows.values_mut() {
            window.damage.repaint_outputs.remove(&id);
        }
        Some(removed)
    }

    /// Returns `true` while compositing is active; repaint requests are
    /// ignored otherwise.
    #[must_use]
    pub fn is_compositing(&self) -> bool {
        self.compositing
    }

    /// Starts tracking damage for every window.
    ///
    /// `damage_tracked` says whether the asynchronous damage protocol keeps a
    /// damage object per window.
    pub fn setup_compositing(&mut self, damage_tracked: bool) {
        self.compositing = true;
        let outputs = self.repaint_outputs_slice();
        for window in self.windows.values_mut() {
            if window.is_remnant() {
                continue;
            }
            let full = window.kind == WindowKind::Unmanaged;
            window.setup_compositing(damage_tracked, full, &outputs);
        }
    }

    /// Stops tracking damage and forgets all repaints.
    pub fn finish_compositing(&mut self) {
        self.compositing = false;
        for window in self.windows.values_mut() {
            window.finish_compositing();
        }
    }

    /// Inserts `window` on top of the stack and returns its handle.
    pub fn add_window(&mut self, mut window: Window) -> WindowId {
        self.next_id += 1;
        let id = WindowId(self.next_id);
        window.id = id;
        if self.compositing {
            let outputs = self.repaint_outputs_slice();
            let full = window.kind == WindowKind::Unmanaged;
            window.setup_compositing(false, full, &outputs);
        }
        self.windows.insert(id, window);
        self.stacking.push(id);
        self.events.push(SpaceEvent::Added(id));
        id
    }

    /// Removes a window and detaches it from its lead and children.
    pub fn remove_window(&mut self, id: WindowId) -> Option<Window> {
        let window = self.windows.remove(&id)?;
        self.stacking.retain(|w| *w != id);
        if let Some(lead) = window.lead.and_then(|l| self.windows.get_mut(&l)) {
            lead.annexed.retain(|c| *c != id);
        }
        for child in &window.annexed {
            if let Some(child) = self.windows.get_mut(child) {
                child.lead = None;
            }
        }
        if self.compositing {
            self.add_workspace_repaint(window.visible_rect());
        }
        self.events.push(SpaceEvent::Removed(id));
        Some(window)
    }

    /// Turns a window into a remnant kept for its closing animation.
    pub fn close_window(&mut self, id: WindowId) {
        if let Some(window) = self.windows.get_mut(&id) {
            window.kind = WindowKind::Remnant;
            window.blocks_compositing = false;
            self.events.push(SpaceEvent::Closed(id));
        }
    }

    /// Looks up a window.
    #[must_use]
    pub fn get(&self, id: WindowId) -> Option<&Window> {
        self.windows.get(&id)
    }

    /// Looks up a window mutably.
    pub fn get_mut(&mut self, id: WindowId) -> Option<&mut Window> {
        self.windows.get_mut(&id)
    }

    /// Number of windows, remnants included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Returns `true` if there are no windows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Window handles from bottom to top.
    #[must_use]
    pub fn stacking_order(&self) -> &[WindowId] {
        &self.stacking
    }

    /// Windows from bottom to top.
    pub fn windows_in_stacking_order(&self) -> impl Iterator<Item = &Window> + '_ {
        self.stacking.iter().filter_map(|id| self.windows.get(id))
    }

    /// Moves a window to the top of the stack.
    pub fn raise(&mut self, id: WindowId) {
        if let Some(idx) = self.stacking.iter().position(|w| *w == id) {
            let id = self.stacking.remove(idx);
            self.stacking.push(id);
            self.add_repaint_full(id);
        }
    }

    /// Attaches `child` to `lead` so they are repainted together.
    pub fn annex(&mut self, child: WindowId, lead: WindowId) {
        if child == lead || !self.windows.contains_key(&lead) {
            return;
        }
        let Some(window) = self.windows.get_mut(&child) else {
            return;
        };
        window.lead = Some(lead);
        if let Some(lead) = self.windows.get_mut(&lead) {
            if !lead.annexed.contains(&child) {
                lead.annexed.push(child);
            }
        }
        self.events.push(SpaceEvent::Annexed { child, lead });
    }

    /// Moves or resizes a window.
    ///
    /// The old visible area is repainted as a layer repaint and the window is
    /// fully repainted at its new place.
    pub fn set_frame_geometry(&mut self, id: WindowId, geometry: Rect) {
        let outputs = self.repaint_outputs_slice();
        let compositing = self.compositing;
        let Some(window) = self.windows.get_mut(&id) else {
            return;
        };
        let old = window.frame_geometry;
        if old == geometry {
            return;
        }
        let old_visible = window.visible_rect();
        window.frame_geometry = geometry;
        if compositing {
            window.add_layer_repaint(&Region::from_rect(old_visible), &outputs);
        }
        self.events
            .push(SpaceEvent::GeometryChanged { window: id, old });
        self.add_repaint_full(id);
    }

    /// Changes the window opacity.
    pub fn set_opacity(&mut self, id: WindowId, opacity: f64) {
        let Some(window) = self.windows.get_mut(&id) else {
            return;
        };
        let opacity = opacity.clamp(0.0, 1.0);
        if window.opacity == opacity {
            return;
        }
        window.opacity = opacity;
        self.add_repaint_full(id);
    }

    /// Records a shape change.
    pub fn set_shape_changed(&mut self, id: WindowId) {
        if self.windows.contains_key(&id) {
            self.events.push(SpaceEvent::ShapeChanged(id));
            self.add_repaint_full(id);
        }
    }

    /// Attaches a new buffer; the whole content counts as damaged.
    pub fn attach_buffer(&mut self, id: WindowId, buffer: BufferId) {
        let outputs = self.repaint_outputs_slice();
        let compositing = self.compositing;
        let Some(window) = self.windows.get_mut(&id) else {
            return;
        };
        window.buffer = Some(buffer);
        self.events.push(SpaceEvent::BufferChanged(id));
        if compositing {
            window.add_damage_full(&outputs);
            self.events.push(SpaceEvent::Damaged(id));
            self.events.push(SpaceEvent::NeedsRepaint(id));
        }
    }

    /// Sets whether the window asks for compositing to be suspended.
    pub fn set_blocks_compositing(&mut self, id: WindowId, blocks: bool) {
        let Some(window) = self.windows.get_mut(&id) else {
            return;
        };
        if window.blocks_compositing != blocks {
            window.blocks_compositing = blocks;
            self.events.push(SpaceEvent::BlockingChanged(id));
        }
    }

    /// Returns `true` if any live window asks for compositing to be
    /// suspended.
    #[must_use]
    pub fn blocking_window_present(&self) -> bool {
        self.windows
            .values()
            .any(|w| w.blocks_compositing && !w.is_remnant())
    }

    /// Marks a window ready for painting; the first time, it is fully
    /// repainted and reported as shown.
    pub fn set_ready_for_painting(&mut self, id: WindowId) {
        let Some(window) = self.windows.get_mut(&id) else {
            return;
        };
        if window.ready_for_painting {
            return;
        }
        window.ready_for_painting = true;
        if self.compositing {
            self.add_repaint_full(id);
            self.events.push(SpaceEvent::Shown(id));
        }
    }

    /// Records an asynchronous damage notification.
    ///
    /// A window that was not ready and is not waiting for a sync counter
    /// becomes ready, since there is no way to detect a complete redraw.
    pub fn mark_damaged(&mut self, id: WindowId, region: &Region) {
        let Some(window) = self.windows.get_mut(&id) else {
            return;
        };
        let make_ready = !window.ready_for_painting && !window.awaits_sync;
        window.mark_damaged(region);
        if make_ready {
            self.set_ready_for_painting(id);
        }
        self.events.push(SpaceEvent::Damaged(id));
        self.events.push(SpaceEvent::NeedsRepaint(id));
    }

    /// Applies client-pushed damage relative to the render geometry.
    pub fn add_damage(&mut self, id: WindowId, damage: &Region) {
        if !self.compositing {
            return;
        }
        let outputs = self.repaint_outputs_slice();
        if let Some(window) = self.windows.get_mut(&id) {
            window.add_damage(damage, &outputs);
            self.events.push(SpaceEvent::Damaged(id));
            self.events.push(SpaceEvent::NeedsRepaint(id));
        }
    }

    /// Damages the whole content of a window.
    pub fn add_damage_full(&mut self, id: WindowId) {
        if !self.compositing {
            return;
        }
        let outputs = self.repaint_outputs_slice();
        if let Some(window) = self.windows.get_mut(&id) {
            window.add_damage_full(&outputs);
            self.events.push(SpaceEvent::Damaged(id));
            self.events.push(SpaceEvent::NeedsRepaint(id));
        }
    }

    /// Requests a repaint of `region` in the window's frame space.
    pub fn add_repaint(&mut self, id: WindowId, region: &Region) {
        if !self.compositing {
            return;
        }
        let outputs = self.repaint_outputs_slice();
        if let Some(window) = self.windows.get_mut(&id) {
            window.add_repaint(region, &outputs);
            self.events.push(SpaceEvent::NeedsRepaint(id));
        }
    }

    /// Requests a repaint of `region` in global space on behalf of a window.
    pub fn add_layer_repaint(&mut self, id: WindowId, region: &Region) {
        if !self.compositing {
            return;
        }
        let outputs = self.repaint_outputs_slice();
        if let Some(window) = self.windows.get_mut(&id) {
            window.add_layer_repaint(region, &outputs);
            self.events.push(SpaceEvent::NeedsRepaint(id));
        }
    }

    /// Repaints the whole visible rect of a window and of every window
    /// annexed to it, recursively.
    pub fn add_repaint_full(&mut self, id: WindowId) {
        if !self.compositing {
            return;
        }
        let outputs = self.repaint_outputs_slice();
        let mut pending = alloc::vec![id];
        let mut seen = Vec::new();
        while let Some(id) = pending.pop() {
            if seen.contains(&id) {
                continue;
            }
            seen.push(id);
            let Some(window) = self.windows.get_mut(&id) else {
                continue;
            };
            window.add_repaint_full_local(&outputs);
            pending.extend(window.annexed.iter().copied());
            self.events.push(SpaceEvent::NeedsRepaint(id));
        }
    }

    /// Asks for a repaint of a global area no window owns, such as the
    /// place a destroyed window used to cover.
    ///
    /// Collected by [`take_workspace_repaints`](Self::take_workspace_repaints).
    pub fn add_workspace_repaint(&mut self, rect: Rect) {
        if self.compositing && !rect.is_empty() {
            self.workspace_repaints.push(rect);
        }
    }

    /// Marks the repaint owed by `output` as done for one window.
    pub fn reset_repaints(&mut self, id: WindowId, output: Option<OutputId>) {
        let output = output.and_then(|o| self.output(o).copied());
        let outputs = self.outputs.clone();
        if let Some(window) = self.windows.get_mut(&id) {
            window.reset_repaints(output.as_ref(), &outputs);
        }
    }

    /// Starts a damage round trip for a window.
    pub fn reset_and_fetch_damage(
        &mut self,
        id: WindowId,
        protocol: Option<&mut dyn DamageProtocol>,
    ) -> bool {
        self.windows
            .get_mut(&id)
            .is_some_and(|w| w.reset_and_fetch_damage(protocol))
    }

    /// Consumes the outstanding damage reply of a window, if any.
    pub fn get_damage_region_reply(
        &mut self,
        id: WindowId,
        protocol: Option<&mut dyn DamageProtocol>,
    ) {
        let outputs = self.repaint_outputs_slice();
        if let Some(window) = self.windows.get_mut(&id) {
            window.get_damage_region_reply(protocol, &outputs);
        }
    }

    /// Drains the queued events.
    pub fn take_events(&mut self) -> Vec<SpaceEvent> {
        core::mem::take(&mut self.events)
    }

    /// Drains global repaint areas not owned by any window.
    pub fn take_workspace_repaints(&mut self) -> Vec<Rect> {
        core::mem::take(&mut self.workspace_repaints)
    }

    fn repaint_outputs_slice(&self) -> Vec<OutputInfo> {
        if self.per_output_repaints {
            self.outputs.clone()
        } else {
            Vec::new()
        }
    }
}

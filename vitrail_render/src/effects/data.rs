// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Data passed along the effect chain.

use bitflags::bitflags;
use kurbo::Affine;
use vitrail_core::output::OutputId;
use vitrail_core::region::{Rect, Region};
use vitrail_core::time::HostTime;
use vitrail_core::window::{Window, WindowFlags, WindowId, WindowKind};

use crate::quads::WindowQuad;
use crate::resource::ResourceKey;

bitflags! {
    /// How a screen or window is painted in the current pass.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct PaintMask: u32 {
        /// The window is fully opaque.
        const WINDOW_OPAQUE = 1 << 0;
        /// The window has translucent parts.
        const WINDOW_TRANSLUCENT = 1 << 1;
        /// The window is drawn with a transform.
        const WINDOW_TRANSFORMED = 1 << 2;
        /// Only the given region is painted; otherwise the whole screen.
        const REGION = 1 << 3;
        /// The whole screen is drawn with a transform.
        const SCREEN_TRANSFORMED = 1 << 4;
        /// Some window is transformed this pass.
        const SCREEN_WITH_TRANSFORMED_WINDOWS = 1 << 5;
        /// Clear the background before painting windows.
        const SCREEN_BACKGROUND_FIRST = 1 << 6;
    }
}

impl PaintMask {
    /// Masks that turn off opaque-window clipping.
    pub const GENERIC_SCREEN: Self = Self::SCREEN_TRANSFORMED.union(Self::SCREEN_WITH_TRANSFORMED_WINDOWS);
}

bitflags! {
    /// Why a window is skipped this pass.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct DisabledReasons: u8 {
        /// The window was closed; painted only if an effect keeps it.
        const DELETED = 1 << 0;
        /// The window is minimized.
        const MINIMIZED = 1 << 1;
        /// The window is on another desktop.
        const DESKTOP = 1 << 2;
        /// An effect hid the window.
        const BY_EFFECT = 1 << 3;
        /// The screen is locked and the window is not part of the lock UI.
        const SCREEN_LOCKED = 1 << 4;
    }
}

/// Read-only view of a window handed to effects.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectWindow {
    /// Window handle.
    pub id: WindowId,
    /// Window kind.
    pub kind: WindowKind,
    /// Frame geometry in global coordinates.
    pub frame_geometry: Rect,
    /// Render geometry in global coordinates.
    pub render_geometry: Rect,
    /// Visible rect including shadow.
    pub visible_rect: Rect,
    /// Window opacity.
    pub opacity: f64,
    /// Window flags.
    pub flags: WindowFlags,
    /// Texture with the window content, if uploaded.
    pub texture: Option<ResourceKey>,
    /// Painted above the stacking order this pass.
    pub elevated: bool,
}

impl EffectWindow {
    /// Snapshot of `window`.
    #[must_use]
    pub fn from_window(window: &Window, texture: Option<ResourceKey>, elevated: bool) -> Self {
        Self {
            id: window.id(),
            kind: window.kind(),
            frame_geometry: window.frame_geometry(),
            render_geometry: window.render_geometry(),
            visible_rect: window.visible_rect(),
            opacity: window.opacity(),
            flags: window.flags(),
            texture,
            elevated,
        }
    }

    /// Returns `true` for closed windows kept for an animation.
    #[inline]
    #[must_use]
    pub fn is_remnant(&self) -> bool {
        self.kind == WindowKind::Remnant
    }

    /// Returns `true` if nothing behind the window shows through it.
    #[must_use]
    pub fn is_opaque(&self) -> bool {
        self.opacity >= 1.0 && !self.flags.contains(WindowFlags::HAS_ALPHA)
    }
}

/// Input to the screen pre-paint stage.
#[derive(Clone, Debug)]
pub struct ScreenPrePaintData {
    /// Paint mode.
    pub mask: PaintMask,
    /// Global region to paint; effects may extend it.
    pub paint: Region,
    /// Output being painted.
    pub output: OutputId,
    /// Expected presentation time of the frame.
    pub present_time: HostTime,
}

/// Input to the screen paint stage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenPaintData {
    /// Transform applied to everything painted.
    pub transform: Affine,
    /// Output being painted.
    pub output: OutputId,
}

impl ScreenPaintData {
    /// Untransformed painting of `output`.
    #[must_use]
    pub fn new(output: OutputId) -> Self {
        Self {
            transform: Affine::IDENTITY,
            output,
        }
    }
}

/// Input to the window pre-paint stage.
#[derive(Clone, Debug)]
pub struct WindowPrePaintData {
    /// Paint mode of the window.
    pub mask: PaintMask,
    /// Global region of the window to paint.
    pub paint: Region,
    /// Global region the window hides; lower windows skip it.
    pub clip: Region,
    /// Quads to draw.
    pub quads: Vec<WindowQuad>,
    disabled: DisabledReasons,
}

impl WindowPrePaintData {
    /// Data for a window that starts disabled for `disabled`.
    #[must_use]
    pub fn new(mask: PaintMask, paint: Region, quads: Vec<WindowQuad>, disabled: DisabledReasons) -> Self {
        Self {
            mask,
            paint,
            clip: Region::new(),
            quads,
            disabled,
        }
    }

    /// Marks the window as translucent; it no longer clips lower windows.
    pub fn set_translucent(&mut self) {
        self.mask.remove(PaintMask::WINDOW_OPAQUE);
        self.mask.insert(PaintMask::WINDOW_TRANSLUCENT);
        self.clip.clear();
    }

    /// Marks the window as transformed; it no longer clips lower windows.
    pub fn set_transformed(&mut self) {
        self.mask.insert(PaintMask::WINDOW_TRANSFORMED);
        self.clip.clear();
    }

    /// Lifts a reason that keeps the window from being painted.
    pub fn enable_painting(&mut self, reason: DisabledReasons) {
        self.disabled.remove(reason);
    }

    /// Adds a reason that keeps the window from being painted.
    pub fn disable_painting(&mut self, reason: DisabledReasons) {
        self.disabled.insert(reason);
    }

    /// Reasons the window is skipped.
    #[must_use]
    pub fn disabled(&self) -> DisabledReasons {
        self.disabled
    }

    /// Returns `true` if nothing keeps the window from being painted.
    #[must_use]
    pub fn is_painting_enabled(&self) -> bool {
        self.disabled.is_empty()
    }
}

/// Input to the window paint and draw stages.
#[derive(Clone, Debug)]
pub struct WindowPaintData {
    /// Opacity in `0.0..=1.0`.
    pub opacity: f64,
    /// Transform in global space.
    pub transform: Affine,
    /// Saturation, `1.0` is unchanged.
    pub saturation: f64,
    /// Brightness, `1.0` is unchanged.
    pub brightness: f64,
    /// Quads to draw.
    pub quads: Vec<WindowQuad>,
}

impl WindowPaintData {
    /// Default paint data for `window`.
    #[must_use]
    pub fn new(window: &EffectWindow, quads: Vec<WindowQuad>) -> Self {
        Self {
            opacity: window.opacity,
            transform: Affine::IDENTITY,
            saturation: 1.0,
            brightness: 1.0,
            quads,
        }
    }

    /// Multiplies the opacity, clamping the result.
    pub fn multiply_opacity(&mut self, factor: f64) {
        self.opacity = (self.opacity * factor).clamp(0.0, 1.0);
    }
}

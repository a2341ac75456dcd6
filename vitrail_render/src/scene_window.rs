// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-window render cache.
//!
//! A [`SceneWindow`] holds what the scene derives from a window between
//! passes: its quads and the state of its backend texture. Invalidation is
//! driven by the scene's dirty channels and always happens between passes.

use vitrail_core::region::{Rect, Region};
use vitrail_core::window::{Window, WindowId};

use crate::quads::{WindowQuad, build_quads};
use crate::resource::ResourceKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TextureState {
    /// Nothing uploaded yet.
    Missing,
    /// Uploaded, but the buffer was replaced since.
    Stale,
    /// Matches the buffer up to the window's pending damage.
    Current,
}

/// Scene-side state of one window.
#[derive(Clone, Debug)]
pub struct SceneWindow {
    id: WindowId,
    key: ResourceKey,
    quads: Option<Vec<WindowQuad>>,
    texture: TextureState,
}

impl SceneWindow {
    pub(crate) fn new(id: WindowId) -> Self {
        Self {
            id,
            key: ResourceKey::for_window(id),
            quads: None,
            texture: TextureState::Missing,
        }
    }

    /// The window this cache belongs to.
    #[must_use]
    pub fn id(&self) -> WindowId {
        self.id
    }

    /// Backend key of the window texture.
    #[must_use]
    pub fn key(&self) -> ResourceKey {
        self.key
    }

    /// The texture to draw with, once something was uploaded.
    #[must_use]
    pub fn texture(&self) -> Option<ResourceKey> {
        (self.texture != TextureState::Missing).then_some(self.key)
    }

    /// Returns `true` if quads are cached.
    #[must_use]
    pub fn has_quads(&self) -> bool {
        self.quads.is_some()
    }

    /// Cached quads, rebuilt from `window` if they were invalidated.
    pub fn quads(&mut self, window: &Window) -> &[WindowQuad] {
        self.quads.get_or_insert_with(|| build_quads(window))
    }

    pub(crate) fn invalidate_quads(&mut self) {
        self.quads = None;
    }

    pub(crate) fn invalidate_texture(&mut self) {
        if self.texture == TextureState::Current {
            self.texture = TextureState::Stale;
        }
    }

    /// Returns `true` if the texture lags behind the window's buffer.
    #[must_use]
    pub fn needs_upload(&self, window: &Window) -> bool {
        window.buffer().is_some()
            && (self.texture != TextureState::Current || !window.damage().damage().is_empty())
    }

    /// Content-space region to upload: everything for a missing or stale
    /// texture, otherwise the window's pending damage.
    pub(crate) fn upload_region(&self, window: &Window) -> Region {
        if self.texture == TextureState::Current {
            window.damage().damage().clone()
        } else {
            let (w, h) = texture_size(window);
            Region::from_rect(Rect::new(0, 0, w, h))
        }
    }

    pub(crate) fn mark_uploaded(&mut self) {
        self.texture = TextureState::Current;
    }
}

/// Size of the client content of `window`.
///
/// With a server-side decoration drawn outside the client buffer, the
/// content is the frame without the borders; otherwise it is the whole
/// render geometry.
#[must_use]
pub fn texture_size(window: &Window) -> (i32, i32) {
    match window.decoration().filter(|d| !d.in_content) {
        Some(deco) => {
            let frame = window.frame_geometry();
            let b = deco.borders;
            (
                (frame.width - b.left - b.right).max(0),
                (frame.height - b.top - b.bottom).max(0),
            )
        }
        None => {
            let render = window.render_geometry();
            (render.width, render.height)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrail_core::window::{BufferId, Decoration, Margins, WindowKind};

    #[test]
    fn texture_is_missing_until_uploaded() {
        let window = Window::new(WindowKind::Toplevel, Rect::new(0, 0, 30, 20))
            .with_buffer(BufferId(1));
        let mut cached = SceneWindow::new(WindowId(4));
        assert_eq!(cached.texture(), None);
        assert!(cached.needs_upload(&window));
        assert_eq!(cached.upload_region(&window).area(), 600);

        cached.mark_uploaded();
        assert_eq!(cached.texture(), Some(ResourceKey::for_window(WindowId(4))));
        assert!(!cached.needs_upload(&window));

        cached.invalidate_texture();
        assert!(cached.texture().is_some());
        assert!(cached.needs_upload(&window));
    }

    #[test]
    fn windows_without_buffer_never_upload() {
        let window = Window::new(WindowKind::Internal, Rect::new(0, 0, 30, 20));
        assert!(!SceneWindow::new(WindowId(1)).needs_upload(&window));
    }

    #[test]
    fn quads_are_cached_until_invalidated() {
        let mut window = Window::new(WindowKind::Toplevel, Rect::new(0, 0, 30, 20));
        let mut cached = SceneWindow::new(WindowId(1));
        assert!(!cached.has_quads());
        assert_eq!(cached.quads(&window).len(), 1);
        assert!(cached.has_quads());

        window = window.with_shadow(Margins::new(2, 2, 2, 2));
        assert_eq!(cached.quads(&window).len(), 1);
        cached.invalidate_quads();
        assert_eq!(cached.quads(&window).len(), 5);
    }

    #[test]
    fn server_side_borders_are_not_content() {
        let window = Window::new(WindowKind::Toplevel, Rect::new(0, 0, 100, 80))
            .with_decoration(Decoration {
                borders: Margins::new(2, 20, 2, 2),
                in_content: false,
            });
        assert_eq!(texture_size(&window), (96, 58));
    }
}

// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend contract for presentation.
//!
//! A backend turns the scene's paint operations for one output into a
//! displayed frame. Three kinds exist, tried in this order until one can be
//! created:
//!
//! - **GPU** ([`GpuBackend`](crate::gpu::GpuBackend)): double or triple
//!   buffered, reuses buffer contents via buffer age, usually reports swap
//!   completion asynchronously.
//! - **Legacy picture** ([`PictureBackend`](crate::picture::PictureBackend)):
//!   server-side picture compositing; every frame repaints the whole output.
//! - **Raster** ([`RasterBackend`](crate::raster::RasterBackend)): software
//!   framebuffer per output.
//!
//! # Frame protocol
//!
//! For each pass on an output the scene calls, in order:
//!
//! ```text
//! prepare_rendering_frame(output, damage) -> region to redraw
//! update_texture(..)*                      (windows with new content)
//! render(output, frame)
//! end_rendering_frame(output, rendered, damaged)
//! present(output) -> PresentOutcome
//! ```
//!
//! `present` is called at most once per prepared frame.

use core::fmt;

use kurbo::Affine;
use serde::{Deserialize, Serialize};
use vitrail_core::output::{OutputId, OutputInfo};
use vitrail_core::presentation::PresentationData;
use vitrail_core::region::{Rect, Region};
use vitrail_core::window::{BufferId, WindowId};

use crate::error::BackendResult;
use crate::quads::WindowQuad;
use crate::resource::ResourceKey;

/// Which kind of backend composites the scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositingType {
    /// GPU-accelerated rendering.
    Gpu,
    /// Server-side picture compositing.
    LegacyPicture,
    /// Software rasterization.
    Raster,
}

impl CompositingType {
    /// Every type in fallback order.
    pub const FALLBACK_ORDER: [Self; 3] = [Self::Gpu, Self::LegacyPicture, Self::Raster];
}

impl fmt::Display for CompositingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Gpu => "GPU",
            Self::LegacyPicture => "legacy picture",
            Self::Raster => "raster",
        })
    }
}

/// Premultiplied RGBA color with components in `0.0..=1.0`.
pub type Color = [f32; 4];

/// One window to draw.
#[derive(Clone, Debug)]
pub struct WindowDraw {
    /// The window being drawn.
    pub window: WindowId,
    /// Texture holding the window content, if uploaded.
    pub texture: Option<ResourceKey>,
    /// Global position of the render geometry's top-left corner.
    pub origin: (i32, i32),
    /// Quads in render-local coordinates.
    pub quads: Vec<WindowQuad>,
    /// Extra transform applied in global space after positioning.
    pub transform: Affine,
    /// Opacity in `0.0..=1.0`.
    pub opacity: f64,
    /// Global region the draw may touch.
    pub clip: Region,
}

/// A paint operation, in painting order.
#[derive(Clone, Debug)]
pub enum RenderOp {
    /// Fill a region with the background color.
    Clear {
        /// Global region to clear.
        region: Region,
        /// Fill color.
        color: Color,
    },
    /// Fill a rectangle, e.g. an effect overlay.
    Fill {
        /// Global rectangle to fill.
        rect: Rect,
        /// Fill color.
        color: Color,
    },
    /// Draw a window.
    Window(WindowDraw),
}

/// Everything painted in one pass on one output.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Target output.
    pub output: OutputId,
    /// Global region being redrawn.
    pub region: Region,
    /// Operations from bottom to top.
    pub ops: Vec<RenderOp>,
}

impl Frame {
    /// Creates an empty frame.
    #[must_use]
    pub fn new(output: OutputId, region: Region) -> Self {
        Self {
            output,
            region,
            ops: Vec::new(),
        }
    }
}

/// Result of handing a frame to the display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PresentOutcome {
    /// A swap is in flight; completion is reported later by the platform.
    pub swap_pending: bool,
    /// Feedback available right away, for backends without swap events.
    pub feedback: Option<PresentationData>,
}

impl PresentOutcome {
    /// A swap whose completion will be reported asynchronously.
    pub const PENDING: Self = Self {
        swap_pending: true,
        feedback: None,
    };

    /// A frame that is already on screen.
    #[must_use]
    pub const fn immediate(feedback: Option<PresentationData>) -> Self {
        Self {
            swap_pending: false,
            feedback,
        }
    }
}

/// Content to upload into a window texture.
#[derive(Clone, Copy, Debug)]
pub struct TextureUpload<'a> {
    /// Texture to fill.
    pub key: ResourceKey,
    /// Buffer the content comes from.
    pub buffer: BufferId,
    /// Texture size in pixels.
    pub size: (i32, i32),
    /// Content-space region that changed since the last upload.
    pub damage: &'a Region,
}

/// A presentation backend.
pub trait Backend {
    /// Which kind of backend this is.
    fn compositing_type(&self) -> CompositingType;

    /// Returns `true` if buffers keep their content between frames.
    fn supports_buffer_age(&self) -> bool;

    /// Returns `true` if swap completion is reported asynchronously.
    fn has_swap_event(&self) -> bool;

    /// Creates render state for an output.
    fn add_output(&mut self, output: &OutputInfo) -> BackendResult<()>;

    /// Drops the render state of an output.
    fn remove_output(&mut self, output: OutputId);

    /// Starts a frame and returns the global region that must be redrawn so
    /// the back buffer ends up fully up to date.
    fn prepare_rendering_frame(&mut self, output: &OutputInfo, damage: &Region)
    -> BackendResult<Region>;

    /// Uploads changed window content.
    fn update_texture(&mut self, upload: TextureUpload<'_>) -> BackendResult<()>;

    /// Releases a window texture.
    fn release_texture(&mut self, key: ResourceKey);

    /// Paints the frame into the back buffer.
    fn render(&mut self, output: &OutputInfo, frame: &Frame) -> BackendResult<()>;

    /// Commits the frame; `damaged` is what changed on screen.
    fn end_rendering_frame(
        &mut self,
        output: OutputId,
        rendered: &Region,
        damaged: &Region,
    ) -> BackendResult<()>;

    /// Hands the committed frame to the display.
    fn present(&mut self, output: OutputId) -> BackendResult<PresentOutcome>;

    /// Called when a pass found nothing to paint.
    fn idle(&mut self) {}

    /// Releases every output-bound resource. Calling it again does nothing.
    fn tear_down(&mut self);

    /// Returns `true` once [`tear_down`](Self::tear_down) ran.
    fn is_torn_down(&self) -> bool;
}

impl fmt::Debug for dyn Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("type", &self.compositing_type())
            .field("torn_down", &self.is_torn_down())
            .finish_non_exhaustive()
    }
}

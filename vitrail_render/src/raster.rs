// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Software raster backend.
//!
//! Each output owns a premultiplied `0xAARRGGBB` framebuffer. Window
//! textures are copied from client pixel buffers on upload and drawn with
//! nearest-neighbour sampling. Every frame redraws the whole output.

use hashbrown::HashMap;
use kurbo::{Affine, Point};
use tracing::debug;
use vitrail_core::output::{OutputId, OutputInfo};
use vitrail_core::region::{Rect, Region};
use vitrail_core::window::BufferId;

use crate::backend::{
    Backend, Color, CompositingType, Frame, PresentOutcome, RenderOp, TextureUpload, WindowDraw,
};
use crate::error::{BackendError, BackendResult};
use crate::quads::QuadKind;
use crate::resource::ResourceKey;

/// Color used for decoration quads, which have no client pixels.
pub const DECORATION_COLOR: Color = [0.18, 0.2, 0.24, 1.0];

/// Color used for shadow quads.
pub const SHADOW_COLOR: Color = [0.0, 0.0, 0.0, 0.3];

/// A block of pixels in row-major order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pixels {
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
    /// Premultiplied `0xAARRGGBB` values.
    pub data: Vec<u32>,
}

impl Pixels {
    /// A block filled with `value`.
    #[must_use]
    pub fn filled(width: i32, height: i32, value: u32) -> Self {
        let len = usize::try_from(width.max(0)).unwrap_or(0)
            * usize::try_from(height.max(0)).unwrap_or(0);
        Self {
            width,
            height,
            data: vec![value; len],
        }
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        usize::try_from(y * self.width + x).ok()
    }

    /// Pixel at `(x, y)`, or `None` outside the block.
    #[must_use]
    pub fn get(&self, x: i32, y: i32) -> Option<u32> {
        self.index(x, y).and_then(|i| self.data.get(i).copied())
    }

    fn put(&mut self, x: i32, y: i32, value: u32) {
        if let Some(slot) = self.index(x, y).and_then(|i| self.data.get_mut(i)) {
            *slot = value;
        }
    }
}

#[derive(Debug)]
struct RasterOutput {
    geometry: Rect,
    back: Pixels,
    front: Pixels,
    pending: bool,
}

/// A backend rendering into in-memory framebuffers.
#[derive(Debug, Default)]
pub struct RasterBackend {
    outputs: HashMap<OutputId, RasterOutput>,
    buffers: HashMap<BufferId, Pixels>,
    textures: HashMap<ResourceKey, Pixels>,
    torn_down: bool,
}

impl RasterBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches client pixels for `buffer`. Uploads read from here.
    pub fn attach_pixels(&mut self, buffer: BufferId, pixels: Pixels) {
        self.buffers.insert(buffer, pixels);
    }

    /// Forgets the pixels of `buffer`.
    pub fn detach_pixels(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
    }

    /// The last presented framebuffer of an output.
    #[must_use]
    pub fn framebuffer(&self, output: OutputId) -> Option<&Pixels> {
        self.outputs.get(&output).map(|o| &o.front)
    }

    /// Returns `true` if a texture exists for `key`.
    #[must_use]
    pub fn has_texture(&self, key: ResourceKey) -> bool {
        self.textures.contains_key(&key)
    }

    fn check_alive(&self) -> BackendResult<()> {
        if self.torn_down {
            Err(BackendError::lost("raster backend was torn down"))
        } else {
            Ok(())
        }
    }

    fn output_mut(&mut self, id: OutputId) -> BackendResult<&mut RasterOutput> {
        self.outputs
            .get_mut(&id)
            .ok_or_else(|| BackendError::lost(format!("no framebuffer for output {id:?}")))
    }
}

/// Packs a color into premultiplied `0xAARRGGBB`.
#[must_use]
pub fn pack_color(color: Color) -> u32 {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "value is clamped to 0..=255 before the cast"
    )]
    let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0 + 0.5) as u32;
    (channel(color[3]) << 24) | (channel(color[0]) << 16) | (channel(color[1]) << 8) | channel(color[2])
}

fn scale_pixel(pixel: u32, factor: u32) -> u32 {
    let mut out = 0;
    for shift in [0, 8, 16, 24] {
        let c = (pixel >> shift) & 0xff;
        out |= ((c * factor + 127) / 255) << shift;
    }
    out
}

/// Source-over blend of premultiplied pixels with an extra opacity.
fn blend(dst: u32, src: u32, opacity: f64) -> u32 {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "value is clamped to 0..=255 before the cast"
    )]
    let alpha_factor = (opacity.clamp(0.0, 1.0) * 255.0 + 0.5) as u32;
    let src = scale_pixel(src, alpha_factor);
    let src_alpha = src >> 24;
    let dst = scale_pixel(dst, 255 - src_alpha);
    let mut out = 0;
    for shift in [0, 8, 16, 24] {
        let c = ((src >> shift) & 0xff) + ((dst >> shift) & 0xff);
        out |= c.min(0xff) << shift;
    }
    out
}

fn fill_rect(target: &mut Pixels, origin: Rect, rect: Rect, value: u32, opacity: f64) {
    let local = rect.translated(-origin.x, -origin.y).intersect(origin.at_origin());
    for y in local.y..local.bottom() {
        for x in local.x..local.right() {
            if let Some(dst) = target.get(x, y) {
                let out = if opacity >= 1.0 && value >> 24 == 0xff {
                    value
                } else {
                    blend(dst, value, opacity)
                };
                target.put(x, y, out);
            }
        }
    }
}

fn draw_window(
    target: &mut Pixels,
    origin: Rect,
    frame_region: &Region,
    draw: &WindowDraw,
    texture: Option<&Pixels>,
) {
    let clip = draw.clip.intersected(frame_region);
    if clip.is_empty() {
        return;
    }
    let placement = draw.transform
        * Affine::translate((f64::from(draw.origin.0), f64::from(draw.origin.1)));
    if placement.determinant().abs() < f64::EPSILON {
        return;
    }
    let inverse = placement.inverse();
    let decoration = pack_color(DECORATION_COLOR);
    let shadow = pack_color(SHADOW_COLOR);

    for quad in &draw.quads {
        let bounds = placement.transform_rect_bbox(quad.target).expand();
        #[expect(
            clippy::cast_possible_truncation,
            reason = "bounds come from i32 window geometry"
        )]
        let bounds = Rect::from_points(
            bounds.x0 as i32,
            bounds.y0 as i32,
            bounds.x1 as i32,
            bounds.y1 as i32,
        );
        let sx = quad.source.width() / quad.target.width().max(f64::EPSILON);
        let sy = quad.source.height() / quad.target.height().max(f64::EPSILON);

        for clip_rect in clip.rects() {
            let area = clip_rect.intersect(bounds).intersect(origin);
            for y in area.y..area.bottom() {
                for x in area.x..area.right() {
                    let local = inverse * Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
                    if !quad.target.contains(local) {
                        continue;
                    }
                    let src = match quad.kind {
                        QuadKind::Content => {
                            let Some(texture) = texture else { continue };
                            let u = quad.source.x0 + (local.x - quad.target.x0) * sx;
                            let v = quad.source.y0 + (local.y - quad.target.y0) * sy;
                            #[expect(
                                clippy::cast_possible_truncation,
                                reason = "texture coordinates are bounds-checked by get"
                            )]
                            let sample = texture.get(u.floor() as i32, v.floor() as i32);
                            match sample {
                                Some(p) => p,
                                None => continue,
                            }
                        }
                        QuadKind::Decoration => decoration,
                        QuadKind::Shadow => shadow,
                    };
                    let (fx, fy) = (x - origin.x, y - origin.y);
                    if let Some(dst) = target.get(fx, fy) {
                        target.put(fx, fy, blend(dst, src, draw.opacity));
                    }
                }
            }
        }
    }
}

impl Backend for RasterBackend {
    fn compositing_type(&self) -> CompositingType {
        CompositingType::Raster
    }

    fn supports_buffer_age(&self) -> bool {
        false
    }

    fn has_swap_event(&self) -> bool {
        false
    }

    fn add_output(&mut self, output: &OutputInfo) -> BackendResult<()> {
        self.check_alive()?;
        let g = output.geometry;
        debug!(output = ?output.id, width = g.width, height = g.height, "allocating framebuffer");
        self.outputs.insert(
            output.id,
            RasterOutput {
                geometry: g,
                back: Pixels::filled(g.width, g.height, 0),
                front: Pixels::filled(g.width, g.height, 0),
                pending: false,
            },
        );
        Ok(())
    }

    fn remove_output(&mut self, output: OutputId) {
        self.outputs.remove(&output);
    }

    fn prepare_rendering_frame(
        &mut self,
        output: &OutputInfo,
        _damage: &Region,
    ) -> BackendResult<Region> {
        self.check_alive()?;
        let slot = self.output_mut(output.id)?;
        if slot.geometry != output.geometry {
            let g = output.geometry;
            slot.geometry = g;
            slot.back = Pixels::filled(g.width, g.height, 0);
            slot.front = Pixels::filled(g.width, g.height, 0);
        }
        slot.pending = false;
        Ok(Region::from_rect(output.geometry))
    }

    fn update_texture(&mut self, upload: TextureUpload<'_>) -> BackendResult<()> {
        self.check_alive()?;
        let source = self.buffers.get(&upload.buffer).ok_or_else(|| {
            BackendError::lost(format!("no pixels attached for {:?}", upload.buffer))
        })?;
        let (w, h) = upload.size;
        let texture = self
            .textures
            .entry(upload.key)
            .or_insert_with(|| Pixels::filled(w, h, 0));
        if texture.width != w || texture.height != h {
            *texture = Pixels::filled(w, h, 0);
        }
        let full = Region::from_rect(Rect::new(0, 0, w, h));
        let damage = if upload.damage.is_empty() {
            full
        } else {
            upload.damage.intersected(&full)
        };
        for rect in damage.rects() {
            for y in rect.y..rect.bottom() {
                for x in rect.x..rect.right() {
                    if let Some(p) = source.get(x, y) {
                        texture.put(x, y, p);
                    }
                }
            }
        }
        Ok(())
    }

    fn release_texture(&mut self, key: ResourceKey) {
        self.textures.remove(&key);
    }

    fn render(&mut self, output: &OutputInfo, frame: &Frame) -> BackendResult<()> {
        self.check_alive()?;
        let Self {
            outputs, textures, ..
        } = self;
        let slot = outputs
            .get_mut(&output.id)
            .ok_or_else(|| BackendError::lost(format!("no framebuffer for output {:?}", output.id)))?;
        let origin = slot.geometry;
        for op in &frame.ops {
            match op {
                RenderOp::Clear { region, color } => {
                    let value = pack_color(*color);
                    for rect in region.intersected(&frame.region).rects() {
                        fill_rect(&mut slot.back, origin, *rect, value, 1.0);
                    }
                }
                RenderOp::Fill { rect, color } => {
                    let value = pack_color(*color);
                    for rect in frame.region.intersected_rect(*rect).rects() {
                        fill_rect(&mut slot.back, origin, *rect, value, 1.0);
                    }
                }
                RenderOp::Window(draw) => {
                    let texture = draw.texture.and_then(|key| textures.get(&key));
                    draw_window(&mut slot.back, origin, &frame.region, draw, texture);
                }
            }
        }
        Ok(())
    }

    fn end_rendering_frame(
        &mut self,
        output: OutputId,
        _rendered: &Region,
        _damaged: &Region,
    ) -> BackendResult<()> {
        self.check_alive()?;
        self.output_mut(output)?.pending = true;
        Ok(())
    }

    fn present(&mut self, output: OutputId) -> BackendResult<PresentOutcome> {
        self.check_alive()?;
        let slot = self.output_mut(output)?;
        if slot.pending {
            slot.pending = false;
            slot.front.data.clone_from(&slot.back.data);
        }
        Ok(PresentOutcome::immediate(None))
    }

    fn tear_down(&mut self) {
        if self.torn_down {
            return;
        }
        debug!("tearing down raster backend");
        self.outputs.clear();
        self.textures.clear();
        self.torn_down = true;
    }

    fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}

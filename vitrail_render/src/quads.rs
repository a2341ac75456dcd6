// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Window quads.
//!
//! A window is drawn as a list of textured rectangles: the content, up to
//! four decoration borders, and up to four shadow strips. Target rectangles
//! are relative to the window's render geometry; effects may move, scale or
//! split them before drawing.


use kurbo::{Affine, Rect as KRect};
use vitrail_core::region::Rect;
use vitrail_core::window::Window;

/// What a quad shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QuadKind {
    /// Client content.
    Content,
    /// Server-side decoration border.
    Decoration,
    /// Server-side shadow.
    Shadow,
}

/// A textured rectangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowQuad {
    /// What the quad shows.
    pub kind: QuadKind,
    /// Destination in render-local coordinates.
    pub target: KRect,
    /// Source in texture pixels.
    pub source: KRect,
}

impl WindowQuad {
    fn new(kind: QuadKind, target: Rect, source: Rect) -> Self {
        Self {
            kind,
            target: target.to_kurbo(),
            source: source.to_kurbo(),
        }
    }

    /// Returns the quad with its target mapped through `affine`.
    #[must_use]
    pub fn transformed(self, affine: Affine) -> Self {
        Self {
            target: affine.transform_rect_bbox(self.target),
            ..self
        }
    }

    /// Splits the quad into a `columns` x `rows` grid with matching
    /// source sub-rectangles.
    #[must_use]
    pub fn subdivide(self, columns: u32, rows: u32) -> Vec<Self> {
        let columns = columns.max(1);
        let rows = rows.max(1);
        let mut out = Vec::with_capacity((columns * rows) as usize);
        for row in 0..rows {
            for col in 0..columns {
                let fx0 = f64::from(col) / f64::from(columns);
                let fx1 = f64::from(col + 1) / f64::from(columns);
                let fy0 = f64::from(row) / f64::from(rows);
                let fy1 = f64::from(row + 1) / f64::from(rows);
                out.push(Self {
                    kind: self.kind,
                    target: lerp_rect(self.target, fx0, fy0, fx1, fy1),
                    source: lerp_rect(self.source, fx0, fy0, fx1, fy1),
                });
            }
        }
        out
    }
}

fn lerp_rect(r: KRect, fx0: f64, fy0: f64, fx1: f64, fy1: f64) -> KRect {
    let w = r.width();
    let h = r.height();
    KRect::new(
        r.x0 + w * fx0,
        r.y0 + h * fy0,
        r.x0 + w * fx1,
        r.y0 + h * fy1,
    )
}

/// Builds the quads for `window` in render-local coordinates.
#[must_use]
pub fn build_quads(window: &Window) -> Vec<WindowQuad> {
    let render = window.render_geometry();
    let frame = window.frame_geometry();
    let mut quads = Vec::with_capacity(9);

    // Frame relative to the render geometry.
    let frame_local = frame.translated(-render.x, -render.y);

    match window.decoration().filter(|d| !d.in_content) {
        Some(deco) => {
            let b = deco.borders;
            let content = Rect::from_points(
                frame_local.x + b.left,
                frame_local.y + b.top,
                frame_local.right() - b.right,
                frame_local.bottom() - b.bottom,
            );
            if !content.is_empty() {
                let source = content.translated(-frame_local.x - b.left, -frame_local.y - b.top);
                quads.push(WindowQuad::new(QuadKind::Content, content, source));
            }
            let borders = [
                Rect::from_points(frame_local.x, frame_local.y, frame_local.right(), content.y),
                Rect::from_points(
                    frame_local.x,
                    content.bottom(),
                    frame_local.right(),
                    frame_local.bottom(),
                ),
                Rect::from_points(frame_local.x, content.y, content.x, content.bottom()),
                Rect::from_points(content.right(), content.y, frame_local.right(), content.bottom()),
            ];
            for border in borders.into_iter().filter(|r| !r.is_empty()) {
                let source = border.translated(-frame_local.x, -frame_local.y);
                quads.push(WindowQuad::new(QuadKind::Decoration, border, source));
            }
        }
        None => {
            let content = render.at_origin();
            if !content.is_empty() {
                quads.push(WindowQuad::new(QuadKind::Content, content, content));
            }
        }
    }

    let s = window.shadow();
    let inner = render.at_origin();
    let outer = s.grow(inner);
    let strips = [
        Rect::from_points(outer.x, outer.y, outer.right(), inner.y),
        Rect::from_points(outer.x, inner.bottom(), outer.right(), outer.bottom()),
        Rect::from_points(outer.x, inner.y, inner.x, inner.bottom()),
        Rect::from_points(inner.right(), inner.y, outer.right(), inner.bottom()),
    ];
    for strip in strips.into_iter().filter(|r| !r.is_empty()) {
        let source = strip.translated(s.left, s.top);
        quads.push(WindowQuad::new(QuadKind::Shadow, strip, source));
    }

    quads
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrail_core::window::{Decoration, Margins, WindowKind};

    #[test]
    fn plain_window_is_one_content_quad() {
        let window = Window::new(WindowKind::Toplevel, Rect::new(10, 20, 300, 200));
        let quads = build_quads(&window);
        assert_eq!(quads.len(), 1);
        assert_eq!(quads[0].kind, QuadKind::Content);
        assert_eq!(quads[0].target, KRect::new(0.0, 0.0, 300.0, 200.0));
    }

    #[test]
    fn server_decoration_adds_borders_around_content() {
        let window = Window::new(WindowKind::Toplevel, Rect::new(0, 0, 100, 100))
            .with_decoration(Decoration {
                borders: Margins::new(2, 20, 2, 2),
                in_content: false,
            })
            .with_shadow(Margins::new(5, 5, 5, 5));
        let quads = build_quads(&window);
        let count = |kind| quads.iter().filter(|q| q.kind == kind).count();
        assert_eq!(count(QuadKind::Content), 1);
        assert_eq!(count(QuadKind::Decoration), 4);
        assert_eq!(count(QuadKind::Shadow), 4);

        let content = quads.iter().find(|q| q.kind == QuadKind::Content).unwrap();
        assert_eq!(content.target, KRect::new(2.0, 20.0, 98.0, 98.0));
        assert_eq!(content.source, KRect::new(0.0, 0.0, 96.0, 78.0));
    }

    #[test]
    fn subdivide_keeps_coverage() {
        let quad = WindowQuad::new(
            QuadKind::Content,
            Rect::new(0, 0, 100, 50),
            Rect::new(0, 0, 100, 50),
        );
        let parts = quad.subdivide(4, 2);
        assert_eq!(parts.len(), 8);
        let area: f64 = parts.iter().map(|q| q.target.area()).sum();
        assert!((area - 5000.0).abs() < 1e-6, "grid covers the quad");
    }
}

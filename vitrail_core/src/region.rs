// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Integer rectangle and region algebra.
//!
//! Damage and repaint bookkeeping works on pixel-aligned areas, so the types
//! here use `i32` coordinates. A [`Region`] is a set of pairwise-disjoint
//! [`Rect`]s. Every operation preserves disjointness, which keeps
//! [`Region::area`] exact and makes set equality cheap to decide.
//!
//! Regions carry no coordinate space of their own. Callers decide whether a
//! region is content-local, frame-local, or global (see
//! [`WindowDamage`](crate::damage::WindowDamage) for the spaces in use).

use alloc::vec::Vec;
use core::fmt;

/// An axis-aligned rectangle with integer coordinates.
///
/// `width` and `height` are exclusive extents; a rectangle with a
/// non-positive extent is empty.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Horizontal extent.
    pub width: i32,
    /// Vertical extent.
    pub height: i32,
}

impl Rect {
    /// The empty rectangle at the origin.
    pub const ZERO: Self = Self::new(0, 0, 0, 0);

    /// Creates a rectangle from its origin and size.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Creates a rectangle from its top-left and (exclusive) bottom-right
    /// corners.
    #[inline]
    #[must_use]
    pub const fn from_points(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// Exclusive right edge.
    #[inline]
    #[must_use]
    pub const fn right(self) -> i32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    #[inline]
    #[must_use]
    pub const fn bottom(self) -> i32 {
        self.y + self.height
    }

    /// Returns `true` if the rectangle covers no pixels.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Number of covered pixels.
    #[inline]
    #[must_use]
    pub const fn area(self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    /// Returns the overlap of two rectangles, or [`Rect::ZERO`] if they do not
    /// overlap.
    #[must_use]
    pub fn intersect(self, other: Self) -> Self {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 || y1 <= y0 {
            Self::ZERO
        } else {
            Self::from_points(x0, y0, x1, y1)
        }
    }

    /// Returns `true` if the rectangles share at least one pixel.
    #[inline]
    #[must_use]
    pub fn intersects(self, other: Self) -> bool {
        !self.intersect(other).is_empty()
    }

    /// Returns the bounding rectangle of both inputs. Empty inputs are
    /// ignored.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        Self::from_points(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    /// Returns the rectangle moved by `(dx, dy)`.
    #[inline]
    #[must_use]
    pub const fn translated(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Returns the rectangle grown outwards by the given amounts on each side.
    #[inline]
    #[must_use]
    pub const fn expanded(self, left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self::new(
            self.x - left,
            self.y - top,
            self.width + left + right,
            self.height + top + bottom,
        )
    }

    /// Returns the same size with the origin at `(0, 0)`.
    #[inline]
    #[must_use]
    pub const fn at_origin(self) -> Self {
        Self::new(0, 0, self.width, self.height)
    }

    /// Returns `true` if the pixel at `(x, y)` is covered.
    #[inline]
    #[must_use]
    pub const fn contains_point(self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Returns `true` if `other` lies entirely inside `self`.
    #[inline]
    #[must_use]
    pub const fn contains_rect(self, other: Self) -> bool {
        other.is_empty()
            || (other.x >= self.x
                && other.y >= self.y
                && other.right() <= self.right()
                && other.bottom() <= self.bottom())
    }

    /// Converts to a floating-point [`kurbo::Rect`].
    #[inline]
    #[must_use]
    pub fn to_kurbo(self) -> kurbo::Rect {
        kurbo::Rect::new(
            f64::from(self.x),
            f64::from(self.y),
            f64::from(self.right()),
            f64::from(self.bottom()),
        )
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect({}, {} {}x{})",
            self.x, self.y, self.width, self.height
        )
    }
}

/// A set of pixels described by pairwise-disjoint rectangles.
#[derive(Clone, Default)]
pub struct Region {
    rects: Vec<Rect>,
}

impl Region {
    /// Creates an empty region.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { rects: Vec::new() }
    }

    /// Creates a region covering a single rectangle.
    #[must_use]
    pub fn from_rect(rect: Rect) -> Self {
        let mut region = Self::new();
        region.union_rect(rect);
        region
    }

    /// Returns `true` if the region covers no pixels.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// The disjoint rectangles making up the region, in no particular order.
    #[inline]
    #[must_use]
    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    /// Number of covered pixels.
    #[must_use]
    pub fn area(&self) -> i64 {
        self.rects.iter().map(|r| r.area()).sum()
    }

    /// Bounding rectangle of the region, or [`Rect::ZERO`] when empty.
    #[must_use]
    pub fn bounding_rect(&self) -> Rect {
        self.rects
            .iter()
            .copied()
            .fold(Rect::ZERO, |acc, r| acc.union(r))
    }

    /// Removes every rectangle.
    #[inline]
    pub fn clear(&mut self) {
        self.rects.clear();
    }

    /// Adds `rect` to the region.
    pub fn union_rect(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        let mut pieces = alloc::vec![rect];
        for existing in &self.rects {
            if pieces.is_empty() {
                return;
            }
            let mut remaining = Vec::with_capacity(pieces.len());
            for piece in pieces {
                push_difference(piece, *existing, &mut remaining);
            }
            pieces = remaining;
        }
        if pieces.is_empty() {
            return;
        }
        self.rects.extend(pieces);
        self.coalesce();
    }

    /// Adds every pixel of `other` to the region.
    pub fn union(&mut self, other: &Self) {
        for rect in &other.rects {
            self.union_rect(*rect);
        }
    }

    /// Returns the union of `self` and `other`.
    #[must_use]
    pub fn united(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.union(other);
        out
    }

    /// Removes `rect` from the region.
    pub fn subtract_rect(&mut self, rect: Rect) {
        if rect.is_empty() || self.rects.is_empty() {
            return;
        }
        let mut out = Vec::with_capacity(self.rects.len());
        for existing in &self.rects {
            push_difference(*existing, rect, &mut out);
        }
        self.rects = out;
        self.coalesce();
    }

    /// Removes every pixel of `other` from the region.
    pub fn subtract(&mut self, other: &Self) {
        for rect in &other.rects {
            if self.rects.is_empty() {
                return;
            }
            self.subtract_rect(*rect);
        }
    }

    /// Returns `self` minus `other`.
    #[must_use]
    pub fn subtracted(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.subtract(other);
        out
    }

    /// Clips the region to `rect`.
    pub fn intersect_rect(&mut self, rect: Rect) {
        self.rects = self
            .rects
            .iter()
            .map(|r| r.intersect(rect))
            .filter(|r| !r.is_empty())
            .collect();
    }

    /// Keeps only pixels also covered by `other`.
    pub fn intersect(&mut self, other: &Self) {
        let mut out = Vec::new();
        for a in &self.rects {
            for b in &other.rects {
                let overlap = a.intersect(*b);
                if !overlap.is_empty() {
                    out.push(overlap);
                }
            }
        }
        self.rects = out;
        self.coalesce();
    }

    /// Returns the intersection of `self` and `other`.
    #[must_use]
    pub fn intersected(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.intersect(other);
        out
    }

    /// Returns the part of the region inside `rect`.
    #[must_use]
    pub fn intersected_rect(&self, rect: Rect) -> Self {
        let mut out = self.clone();
        out.intersect_rect(rect);
        out
    }

    /// Moves the region by `(dx, dy)`.
    pub fn translate(&mut self, dx: i32, dy: i32) {
        if dx == 0 && dy == 0 {
            return;
        }
        for rect in &mut self.rects {
            *rect = rect.translated(dx, dy);
        }
    }

    /// Returns the region moved by `(dx, dy)`.
    #[must_use]
    pub fn translated(&self, dx: i32, dy: i32) -> Self {
        let mut out = self.clone();
        out.translate(dx, dy);
        out
    }

    /// Returns `true` if the pixel at `(x, y)` is covered.
    #[must_use]
    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        self.rects.iter().any(|r| r.contains_point(x, y))
    }

    /// Returns `true` if any pixel of `rect` is covered.
    #[must_use]
    pub fn intersects_rect(&self, rect: Rect) -> bool {
        self.rects.iter().any(|r| r.intersects(rect))
    }

    /// Returns `true` if the regions share at least one pixel.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        other.rects.iter().any(|r| self.intersects_rect(*r))
    }

    /// Returns `true` if every pixel of `other` is covered by `self`.
    #[must_use]
    pub fn contains_region(&self, other: &Self) -> bool {
        other.subtracted(self).is_empty()
    }

    /// Merges rectangles that share a full edge.
    ///
    /// Merging two disjoint edge-adjacent rectangles yields a rectangle that
    /// is still disjoint from the rest of the set.
    fn coalesce(&mut self) {
        let mut i = 0;
        while i < self.rects.len() {
            let mut merged = false;
            let mut j = i + 1;
            while j < self.rects.len() {
                if let Some(m) = merge_adjacent(self.rects[i], self.rects[j]) {
                    self.rects[i] = m;
                    self.rects.swap_remove(j);
                    merged = true;
                } else {
                    j += 1;
                }
            }
            if merged {
                i = 0;
            } else {
                i += 1;
            }
        }
    }
}

impl PartialEq for Region {
    fn eq(&self, other: &Self) -> bool {
        self.area() == other.area() && self.subtracted(other).is_empty()
    }
}

impl Eq for Region {}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.rects.iter()).finish()
    }
}

impl From<Rect> for Region {
    fn from(rect: Rect) -> Self {
        Self::from_rect(rect)
    }
}

impl FromIterator<Rect> for Region {
    fn from_iter<I: IntoIterator<Item = Rect>>(iter: I) -> Self {
        let mut region = Self::new();
        for rect in iter {
            region.union_rect(rect);
        }
        region
    }
}

/// Pushes the up-to-four pieces of `a` not covered by `b`.
fn push_difference(a: Rect, b: Rect, out: &mut Vec<Rect>) {
    let overlap = a.intersect(b);
    if overlap.is_empty() {
        out.push(a);
        return;
    }
    if overlap.y > a.y {
        out.push(Rect::from_points(a.x, a.y, a.right(), overlap.y));
    }
    if overlap.bottom() < a.bottom() {
        out.push(Rect::from_points(a.x, overlap.bottom(), a.right(), a.bottom()));
    }
    if overlap.x > a.x {
        out.push(Rect::from_points(a.x, overlap.y, overlap.x, overlap.bottom()));
    }
    if overlap.right() < a.right() {
        out.push(Rect::from_points(
            overlap.right(),
            overlap.y,
            a.right(),
            overlap.bottom(),
        ));
    }
}

fn merge_adjacent(a: Rect, b: Rect) -> Option<Rect> {
    if a.y == b.y && a.height == b.height && (a.right() == b.x || b.right() == a.x) {
        return Some(Rect::from_points(
            a.x.min(b.x),
            a.y,
            a.right().max(b.right()),
            a.bottom(),
        ));
    }
    if a.x == b.x && a.width == b.width && (a.bottom() == b.y || b.bottom() == a.y) {
        return Some(Rect::from_points(
            a.x,
            a.y.min(b.y),
            a.right(),
            a.bottom().max(b.bottom()),
        ));
    }
    None
}

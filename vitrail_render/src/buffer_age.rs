// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-output buffer age bookkeeping.
//!
//! A swapchain hands out back buffers in rotation. A buffer of age `n` still
//! holds the frame presented `n` frames ago, so bringing it up to date only
//! needs the union of the damage of the last `n` frames. Age `0` means the
//! content is undefined and the whole output must be redrawn.

use std::collections::VecDeque;

use vitrail_core::region::{Rect, Region};

/// Frames of damage remembered per output.
pub const DAMAGE_HISTORY_LEN: usize = 10;

/// Swapchain and damage history of one output.
#[derive(Clone, Debug)]
pub struct OutputRenderState {
    geometry: Rect,
    buffer_count: u8,
    frames_since_reset: u64,
    history: VecDeque<Region>,
    in_frame: bool,
}

impl OutputRenderState {
    /// Creates state for an output covering `geometry` with `buffer_count`
    /// rotating back buffers.
    #[must_use]
    pub fn new(geometry: Rect, buffer_count: u8) -> Self {
        Self {
            geometry,
            buffer_count: buffer_count.max(1),
            frames_since_reset: 0,
            history: VecDeque::with_capacity(DAMAGE_HISTORY_LEN),
            in_frame: false,
        }
    }

    /// Output geometry in global coordinates.
    #[inline]
    #[must_use]
    pub fn geometry(&self) -> Rect {
        self.geometry
    }

    /// Age of the buffer the next frame renders into; `0` if undefined.
    #[must_use]
    pub fn buffer_age(&self) -> u8 {
        if self.frames_since_reset < u64::from(self.buffer_count) {
            0
        } else {
            self.buffer_count
        }
    }

    /// Whether a frame was prepared but not yet ended.
    #[inline]
    #[must_use]
    pub fn in_frame(&self) -> bool {
        self.in_frame
    }

    /// Number of remembered damage frames.
    #[inline]
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Starts a frame and returns the region that must be repainted so the
    /// back buffer is fully up to date after drawing `damage`.
    pub fn begin_frame(&mut self, damage: &Region) -> Region {
        self.in_frame = true;
        let age = usize::from(self.buffer_age());
        if age == 0 || age > self.history.len() + 1 {
            return Region::from_rect(self.geometry);
        }
        let mut repair = damage.clone();
        for past in self.history.iter().take(age - 1) {
            repair.union(past);
        }
        repair.intersect_rect(self.geometry);
        repair
    }

    /// Records the damage of the frame that was just rendered.
    pub fn end_frame(&mut self, damaged: &Region) {
        if !self.in_frame {
            return;
        }
        self.in_frame = false;
        if self.history.len() == DAMAGE_HISTORY_LEN {
            self.history.pop_back();
        }
        self.history.push_front(damaged.intersected_rect(self.geometry));
        self.frames_since_reset = self.frames_since_reset.saturating_add(1);
    }

    /// Invalidates all buffers, e.g. after a mode change.
    pub fn reset(&mut self, geometry: Rect) {
        self.geometry = geometry;
        self.frames_since_reset = 0;
        self.history.clear();
        self.in_frame = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCREEN: Rect = Rect::new(0, 0, 1920, 1080);

    fn region(x: i32, y: i32, w: i32, h: i32) -> Region {
        Region::from_rect(Rect::new(x, y, w, h))
    }

    #[test]
    fn fresh_buffers_repaint_everything() {
        let mut state = OutputRenderState::new(SCREEN, 2);
        assert_eq!(state.buffer_age(), 0);
        let repair = state.begin_frame(&region(0, 0, 10, 10));
        assert_eq!(repair, Region::from_rect(SCREEN));
    }

    #[test]
    fn double_buffering_adds_previous_frame_damage() {
        let mut state = OutputRenderState::new(SCREEN, 2);
        for _ in 0..2 {
            state.begin_frame(&Region::new());
            state.end_frame(&Region::from_rect(SCREEN));
        }
        state.begin_frame(&Region::new());
        state.end_frame(&region(100, 100, 50, 50));
        assert_eq!(state.buffer_age(), 2);

        let repair = state.begin_frame(&region(0, 0, 10, 10));
        let expected = region(0, 0, 10, 10).united(&region(100, 100, 50, 50));
        assert_eq!(repair, expected);
    }

    #[test]
    fn history_is_capped() {
        let mut state = OutputRenderState::new(SCREEN, 3);
        for i in 0..20 {
            state.begin_frame(&Region::new());
            state.end_frame(&region(i, 0, 1, 1));
        }
        assert_eq!(state.history_len(), DAMAGE_HISTORY_LEN);
    }

    #[test]
    fn reset_invalidates_age() {
        let mut state = OutputRenderState::new(SCREEN, 1);
        state.begin_frame(&Region::new());
        state.end_frame(&Region::new());
        assert_eq!(state.buffer_age(), 1);
        state.reset(Rect::new(0, 0, 800, 600));
        assert_eq!(state.buffer_age(), 0);
        assert_eq!(state.history_len(), 0);
    }

    #[test]
    fn end_without_begin_is_ignored() {
        let mut state = OutputRenderState::new(SCREEN, 2);
        state.end_frame(&region(0, 0, 5, 5));
        assert_eq!(state.history_len(), 0);
    }
}

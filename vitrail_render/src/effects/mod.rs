// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Effect plugins and the chain that runs them.
//!
//! **[`effect`]**: the [`Effect`] trait every plugin implements.
//!
//! **[`chain`]**: [`EffectChain`], the ordered list of loaded effects, and
//! the [`Next`] cursor passed to every paint hook.
//!
//! **[`data`]**: per-stage paint data and masks.
//!
//! **[`state`]**: shared state effects coordinate through: grabs,
//! elevation, the full-screen effect, the keyboard grab and remnant
//! references.

pub mod chain;
pub mod data;
pub mod effect;
pub mod state;

pub use chain::{EffectChain, Next};
pub use data::{
    DisabledReasons, EffectWindow, PaintMask, ScreenPaintData, ScreenPrePaintData,
    WindowPaintData, WindowPrePaintData,
};
pub use effect::{Effect, EffectId, Feature};
pub use state::{EffectsHandle, EffectsState, GrabRole, RepaintRequest};

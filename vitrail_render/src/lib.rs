// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Presentation backends, scene and effect chain for vitrail.
//!
//! This crate turns the window model of [`vitrail_core`] into frames:
//!
//! - [`Scene`]: builds the paint order, runs the effect chain, keeps a
//!   per-window render cache and drives a backend through one pass.
//! - [`Backend`]: the contract every presentation backend implements, with
//!   three variants ([`GpuBackend`], [`PictureBackend`], [`RasterBackend`])
//!   tried in [`CompositingType::FALLBACK_ORDER`].
//! - [`effects`]: the [`Effect`](effects::Effect) trait and the ordered
//!   [`EffectChain`](effects::EffectChain).
//! - [`OutputRenderState`]: buffer age and damage history for backends that
//!   reuse buffer contents.
//!
//! # Crate features
//!
//! - `trace` (disabled by default): forwards to `vitrail_core/trace`.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod backend;
mod buffer_age;
mod error;
mod gpu;
mod picture;
mod quads;
mod raster;
mod resource;
mod scene;
mod scene_window;

pub mod effects;

pub use backend::{
    Backend, Color, CompositingType, Frame, PresentOutcome, RenderOp, TextureUpload, WindowDraw,
};
pub use buffer_age::{DAMAGE_HISTORY_LEN, OutputRenderState};
pub use error::{BackendError, BackendResult};
pub use gpu::{GpuBackend, GpuDevice, SafePoint};
pub use picture::{PictureBackend, PictureConnection};
pub use quads::{QuadKind, WindowQuad, build_quads};
pub use raster::{DECORATION_COLOR, Pixels, RasterBackend, SHADOW_COLOR, pack_color};
pub use resource::ResourceKey;
pub use scene::{PaintOutcome, Scene};
pub use scene_window::{SceneWindow, texture_size};

// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Invalidation channels for per-window render caches.
//!
//! The scene keeps backend resources (textures, quads, shadows) for each
//! window and tracks their validity with [`understory_dirty`]. Each channel
//! names one independent reason a cache goes stale.
//!
//! # Propagation semantics
//!
//! - **Propagating**: [`GEOMETRY`] is marked with
//!   [`EagerPolicy`](understory_dirty::EagerPolicy) and has dependency edges
//!   from every annexed transient to its lead window. Moving or resizing the
//!   lead invalidates the quads of everything attached to it.
//!
//! - **Local-only**: [`SHAPE`] and [`BUFFER`] are marked with the default
//!   policy. Only the window whose input shape or backing buffer changed is
//!   drained.
//!
//! Channels are drained synchronously when the window layer reports a
//! change, so a pass never reads a half-updated cache.

use understory_dirty::Channel;

/// Frame or render geometry changed. Quads must be rebuilt.
pub const GEOMETRY: Channel = Channel::new(0);

/// Window shape changed. Quads and the shadow must be rebuilt.
pub const SHAPE: Channel = Channel::new(1);

/// Backing buffer was replaced. The texture must be re-uploaded.
pub const BUFFER: Channel = Channel::new(2);

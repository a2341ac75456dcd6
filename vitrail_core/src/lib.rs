// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core types for damage-driven compositing.
//!
//! `vitrail_core` holds the data model shared by the renderer and the
//! compositor: integer regions, outputs, windows with their damage state,
//! presentation feedback, and the instrumentation hooks. It is `no_std`
//! compatible (with `alloc`) and never reads a clock or blocks.
//!
//! # Architecture
//!
//! Damage flows upwards from the window layer and presentation feedback
//! flows back down:
//!
//! ```text
//!   window layer ──► Space (mark_damaged / add_damage / add_repaint*)
//!                       │ SpaceEvent
//!                       ▼
//!   compositor ──► scheduler arms a deadline per output
//!                       │ deadline reached
//!                       ▼
//!   compositor ──► fetch damage ──► Scene::paint ──► Backend::present
//!                                                        │
//!                 ┌──────────────────────────────────────┘
//!                 ▼
//!   PresentationData ──► frame callbacks + next deadline
//! ```
//!
//! **[`region`]**: `Rect` and disjoint-rectangle `Region` algebra.
//!
//! **[`window`]**: the paintable [`Window`](window::Window) and the
//! [`Space`](window::Space) that stacks windows and queues change events.
//!
//! **[`damage`]**: per-window damage and repaint regions and the two-phase
//! asynchronous damage fetch.
//!
//! **[`output`]**: output descriptors and max-coverage lookup.
//!
//! **[`presentation`]**: presentation feedback reported by backends.
//!
//! **[`dirty`]**: invalidation channels for per-window render caches, via
//! `understory_dirty`.
//!
//! **[`signal`]**: typed observer lists with ordered delivery.
//!
//! **[`time`]**: monotonic host time in nanoseconds.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! pass instrumentation, with a zero-overhead [`Tracer`](trace::Tracer)
//! wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod damage;
pub mod dirty;
pub mod output;
pub mod presentation;
pub mod region;
pub mod signal;
pub mod time;
pub mod trace;
pub mod window;

// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame scheduling and the compositing state machine for vitrail.
//!
//! [`Compositor`] owns the window [`Space`](vitrail_core::window::Space) and,
//! while compositing runs, a [`Scene`](vitrail_render::Scene) with its
//! backend. It decides when passes run, collects what each pass repaints,
//! hands frame callbacks and presentation feedback to the protocol layer,
//! and falls back to the next backend type when one cannot be created.
//!
//! - [`FrameScheduler`]: pacing of one output (or of the whole screen),
//!   with at most one swap in flight.
//! - [`Presentation`]: frame callbacks and presentation feedback.
//! - [`Platform`]: what the compositor needs from the windowing system.
//! - [`CompositorConfig`]: settings, loadable with serde.
//!
//! The compositor never reads a clock on its own: every entry point takes
//! the current [`HostTime`](vitrail_core::time::HostTime), and the host loop
//! sleeps until [`Compositor::next_deadline`].
//!
//! # Crate features
//!
//! - `trace` (disabled by default): forwards pass instrumentation to the
//!   [`TraceSink`](vitrail_core::trace::TraceSink) installed with
//!   [`Compositor::set_trace_sink`].

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod compositor;
mod config;
mod error;
mod platform;
mod presentation;
mod scheduler;
mod selection;
mod suspend;

pub use compositor::{Compositor, CompositorState, EffectLoader};
pub use config::{CompositorConfig, SchedulingMode};
pub use error::CompositorError;
pub use platform::Platform;
pub use presentation::{FeedbackId, PresentEvent, Presentation};
pub use scheduler::{FrameScheduler, FrameState, SchedulerConfig};
pub use selection::Atom;
pub use suspend::SuspendReasons;

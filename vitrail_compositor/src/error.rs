// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use vitrail_render::BackendError;

use crate::suspend::SuspendReasons;

/// Why compositing could not be started.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CompositorError {
    /// The platform cannot composite at all.
    #[error("compositing is not possible: {0}")]
    NotPossible(String),

    /// Compositing is suspended.
    #[error("compositing is suspended ({0:?})")]
    Suspended(SuspendReasons),

    /// The compositor is not off, so it cannot be started.
    #[error("compositor is already running")]
    AlreadyRunning,

    /// No backend type could be created.
    #[error("failed to initialize compositing: {}", reasons.join("; "))]
    AllBackendsFailed {
        /// One entry per backend type tried, in order.
        reasons: Vec<String>,
    },

    /// A backend failed after it was created.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

/// Convenience result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Why a presentation backend could not be created or could not render.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// A required GPU or protocol extension is not available.
    #[error("missing extension: {0}")]
    MissingExtension(String),

    /// The driver refused an operation.
    #[error("driver rejected request: {0}")]
    DriverRejected(String),

    /// The platform reported no outputs to render to.
    #[error("no outputs available")]
    NoOutputs,

    /// Handing a frame to the display failed.
    #[error("buffer swap failed: {0}")]
    Swap(String),

    /// A leased or shared resource was taken away.
    #[error("resource lost: {0}")]
    Lost(String),
}

impl BackendError {
    /// Build a [`BackendError::MissingExtension`] value.
    pub fn missing_extension(name: impl Into<String>) -> Self {
        Self::MissingExtension(name.into())
    }

    /// Build a [`BackendError::DriverRejected`] value.
    pub fn driver_rejected(msg: impl Into<String>) -> Self {
        Self::DriverRejected(msg.into())
    }

    /// Build a [`BackendError::Swap`] value.
    pub fn swap(msg: impl Into<String>) -> Self {
        Self::Swap(msg.into())
    }

    /// Build a [`BackendError::Lost`] value.
    pub fn lost(msg: impl Into<String>) -> Self {
        Self::Lost(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_cause() {
        assert_eq!(
            BackendError::missing_extension("EGL_EXT_buffer_age").to_string(),
            "missing extension: EGL_EXT_buffer_age"
        );
        assert_eq!(BackendError::NoOutputs.to_string(), "no outputs available");
    }
}

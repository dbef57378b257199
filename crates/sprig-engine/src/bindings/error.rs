use thiserror::Error;

use crate::render::{CaptureError, ShaderError};

/// Errors surfaced to the host at the binding boundary.
#[derive(Debug, Error)]
pub enum BindingError {
    /// The handle was never issued, was destroyed, or was consumed.
    #[error("stale {kind} handle")]
    StaleHandle { kind: &'static str },

    #[error("{operation}: {reason}")]
    InvalidArgument {
        operation: &'static str,
        reason: String,
    },

    #[error("particle source passed more than once to {operation}")]
    DuplicateSource { operation: &'static str },

    #[error(transparent)]
    Shader(#[from] ShaderError),

    #[error(transparent)]
    Capture(#[from] CaptureError),
}

impl BindingError {
    pub(crate) fn invalid(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            operation,
            reason: reason.into(),
        }
    }
}

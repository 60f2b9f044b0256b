//! Error types for the ServiceInfo device module.

use thiserror::Error;

/// Main error type for all module operations.
#[derive(Debug, Error)]
pub enum ServiceInfoError {
    /// Malformed or out-of-range owner input: empty required field,
    /// wrong array arity, oversized argument, unknown message label.
    #[error("content error: {0}")]
    Content(String),

    /// Decode failure while reading an owner-supplied value.
    #[error("decode error: {0}")]
    Decode(String),

    /// Encode failure while producing a device message.
    #[error("encode error: {0}")]
    Encode(String),

    /// I/O error from the file collaborator.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation invoked in a state that does not admit it
    /// (module not started, producer idle, etc.).
    #[error("invalid module state: {0}")]
    State(String),
}

impl ServiceInfoError {
    /// Shorthand for a [`ServiceInfoError::Content`] error.
    pub fn content(msg: impl Into<String>) -> Self {
        Self::Content(msg.into())
    }

    /// Shorthand for a [`ServiceInfoError::State`] error.
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    /// Map this error onto the dispatcher result code.
    pub fn status(&self) -> SiStatus {
        match self {
            Self::Content(_) | Self::Decode(_) => SiStatus::ContentError,
            Self::Encode(_) | Self::Io(_) | Self::State(_) => SiStatus::InternalError,
        }
    }
}

/// Result type alias using ServiceInfoError.
pub type Result<T> = std::result::Result<T, ServiceInfoError>;

/// Per-round result code reported to the external dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiStatus {
    /// Round completed.
    Success,
    /// Malformed input (owner can correct and re-drive).
    ContentError,
    /// Allocation/codec/collaborator failure before protocol semantics.
    InternalError,
    /// Unrecognized operation. Emitted by the host dispatcher itself;
    /// [`Command`](crate::module::Command) is closed, so no module error
    /// maps here.
    Failure,
}

/// Project an operation result onto the dispatcher result code.
pub fn status_of<T>(result: &Result<T>) -> SiStatus {
    match result {
        Ok(_) => SiStatus::Success,
        Err(e) => e.status(),
    }
}

/*!
Common error types for the galvo projector control components.
*/

use thiserror::Error;

/// Common result type used throughout the shared library
pub type Result<T> = std::result::Result<T, ProjectorError>;

/// Comprehensive error type for all shared operations
#[derive(Error, Debug)]
pub enum ProjectorError {
    /// Wire-format parsing errors
    #[error("record error: {0}")]
    Record(#[from] crate::wire::RecordError),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stream that produced no frames at all
    #[error("no frames decoded: {0}")]
    EmptyResult(String),

    /// Frame arena exhausted
    #[error("arena capacity exceeded: {0}")]
    Capacity(String),

    /// Invalid frame data
    #[error("invalid frame data: {0}")]
    InvalidFrame(String),

    /// Control request that arrived while the previous one was still pending
    #[error("control request rejected: {0}")]
    ControlRejected(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Generic errors with context
    #[error("error: {0}")]
    Generic(String),
}

impl ProjectorError {
    /// Create a new generic error with a message
    pub fn new(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }

    /// Create a new empty-result error
    pub fn empty_result(msg: impl Into<String>) -> Self {
        Self::EmptyResult(msg.into())
    }

    /// Create a new arena-capacity error
    pub fn capacity(msg: impl Into<String>) -> Self {
        Self::Capacity(msg.into())
    }

    /// Create a new invalid frame error
    pub fn invalid_frame(msg: impl Into<String>) -> Self {
        Self::InvalidFrame(msg.into())
    }

    /// Create a new rejected-control error
    pub fn control_rejected(msg: impl Into<String>) -> Self {
        Self::ControlRejected(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

//! Error types shared by the tracker, the reframing engine and the pipeline.

use thiserror::Error;

/// Result type for tracking and reframing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while tracking subjects or computing camera paths.
///
/// Empty association inputs (zero tracks or zero detections) are not errors;
/// they produce a well-defined all-unmatched result.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0} used before initialization")]
    NotInitialized(&'static str),

    #[error("Frame index {index} is outside the known range 0..{len}")]
    OutOfBounds { index: u64, len: u64 },

    #[error("Frame {got} received after frame {last}; frames must arrive in increasing order")]
    FrameOrder { last: u64, got: u64 },

    #[error("Motion model error: {0}")]
    MotionModel(String),

    #[error("Assignment solver error: {0}")]
    Assignment(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

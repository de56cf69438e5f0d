//! Animation error types

use thiserror::Error;

/// Errors raised by the animation engine
///
/// Every variant is reported synchronously by the call that caused it; the
/// state the call would have changed is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnimationError {
    /// Animation durations must be strictly positive
    #[error("Animation duration must be positive, got {0}ms")]
    InvalidDuration(i64),

    /// The scheduler must tick at least once per second
    #[error("Frames per second must be positive, got {0}")]
    InvalidFrameRate(u32),

    /// `then` was called while the owner had no running animation to chain onto
    #[error("No running animation to chain a continuation onto")]
    NothingToChain,

    /// No accessor pair registered under this key
    #[error("No binding registered for '{0}'")]
    UnknownBinding(String),

    /// A configuration document could not be parsed
    #[error("Invalid animation config: {0}")]
    Config(String),
}

/// Result type for animation operations
pub type Result<T> = std::result::Result<T, AnimationError>;

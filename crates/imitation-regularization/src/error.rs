//! Error types for regularization and training-step operations.

use thiserror::Error;

/// Errors that can occur while regularizing a training step.
#[derive(Error, Debug)]
pub enum TrainError {
    /// A loss that must be scalar had one or more dimensions.
    #[error("Expected a scalar loss, got a tensor with {ndim} dimension(s)")]
    NonScalarLoss {
        /// Dimensionality of the offending value.
        ndim: usize,
    },

    /// Error with invalid parameter.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A loss value outside the domain an operation accepts.
    #[error("Invalid loss: {0}")]
    InvalidLoss(String),

    /// A gradient or weight delta does not fit the parameter it targets.
    #[error("Shape mismatch for parameter '{name}': expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Parameter name.
        name: String,
        /// Shape of the parameter.
        expected: Vec<usize>,
        /// Shape that was supplied.
        actual: Vec<usize>,
    },

    /// Error in optimizer operation.
    #[error("Optimizer error: {0}")]
    OptimizerError(String),

    /// Error in a logging backend.
    #[error("Logging error: {0}")]
    LoggingError(String),

    /// Error in configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A shared optimizer or logger was borrowed while already in use.
    #[error("Reentrant access: {0}")]
    Reentrant(String),
}

/// Result type for training operations.
pub type TrainResult<T> = Result<T, TrainError>;

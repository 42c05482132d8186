//! Structured error types for the trellis workspace.

use thiserror::Error;

/// Unified error type for all trellis operations.
///
/// Every failure is unrecoverable for the current call: retrying with the
/// same inputs reproduces the same failure, so callers should surface these
/// rather than retry.
#[derive(Debug, Error)]
pub enum TrellisError {
    /// A supplied distribution is not row-stochastic, or model dimensions
    /// do not match the declared state/symbol counts.
    #[error("invalid model: {0}")]
    InvalidModel(String),

    /// An observation sequence is empty, contains an out-of-range symbol
    /// index, or contains a token unknown to the vocabulary.
    #[error("invalid observation: {0}")]
    InvalidObservation(String),

    /// A required normalization denominator collapsed to zero: the model
    /// assigns zero probability to the observed sequence, or a state/symbol
    /// received zero total posterior responsibility during re-estimation.
    #[error("degenerate model: {0}")]
    DegenerateModel(String),

    /// Malformed arguments (zero iteration count, negative smoothing, ...)
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Convenience alias used throughout the trellis workspace.
pub type Result<T> = std::result::Result<T, TrellisError>;

//! Error types for synchrony analysis
//!
//! Error types for the analysis engines using `thiserror`. Validation errors
//! surface synchronously and are caller-correctable; insufficient-data errors
//! carry the offending parameters. Soft numeric degeneracies (zero-variance
//! denominators) are resolved by convention inside the engines and never
//! reach this enum.

use serde::Serialize;
use thiserror::Error;

/// Errors produced by the synchrony analysis engines
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AnalysisError {
    /// Pairwise measures require equal-length signals
    #[error("signal length mismatch: {left} vs {right} samples")]
    LengthMismatch {
        /// Length of the first signal
        left: usize,
        /// Length of the second signal
        right: usize,
    },

    /// Hyperscanning participants must share a time axis
    #[error("participant time-point mismatch: {left} vs {right}")]
    TimePointMismatch {
        /// Time points for participant 1
        left: usize,
        /// Time points for participant 2
        right: usize,
    },

    /// An input signal or channel set was empty
    #[error("empty input: {name}")]
    EmptyInput {
        /// Name of the offending input
        name: &'static str,
    },

    /// A configuration value was out of range
    #[error("invalid parameter {parameter}: {reason}")]
    InvalidParameter {
        /// Parameter name
        parameter: &'static str,
        /// Reason it was rejected
        reason: String,
    },

    /// Not enough samples for the requested operation
    #[error("insufficient data: got {got} samples, need {need}")]
    InsufficientData {
        /// Number of samples available
        got: usize,
        /// Number of samples required
        need: usize,
    },

    /// Signal too short for the requested delay embedding
    #[error(
        "signal too short for embedding: {samples} samples with m={dimension}, tau={delay} \
         leaves no embedded vectors"
    )]
    EmbeddingTooShort {
        /// Number of samples available
        samples: usize,
        /// Embedding dimension m
        dimension: usize,
        /// Time delay tau
        delay: usize,
    },
}

/// Result type for analysis operations
pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_parameters() {
        let err = AnalysisError::EmbeddingTooShort {
            samples: 4,
            dimension: 3,
            delay: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains('4'));
        assert!(msg.contains("m=3"));
        assert!(msg.contains("tau=2"));
    }

    #[test]
    fn test_serializes_with_structured_fields() {
        let err = AnalysisError::LengthMismatch { left: 10, right: 12 };
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("LengthMismatch"));
        assert!(json.contains("10"));
        assert!(json.contains("12"));
    }
}

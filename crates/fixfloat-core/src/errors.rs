//! # Core Error Types
//!
//! Every fallible operation of the risk engine returns one of these. Nothing is
//! silently clamped: a caller that receives an error must not proceed with the
//! state transition it was validating.

use thiserror::Error;

/// Core risk engine errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
pub enum FixfloatCoreError {
    // ========================================================================
    // Math Errors
    // ========================================================================

    #[error("Math overflow")]
    MathOverflow,

    #[error("Math underflow")]
    MathUnderflow,

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Mul div overflow")]
    MulDivOverflow,

    #[error("Invalid logarithm input")]
    InvalidLogarithmInput,

    #[error("Exponential overflow")]
    ExponentialOverflow,

    #[error("Square root of negative value")]
    NegativeSquareRoot,

    #[error("Conversion error")]
    ConversionError,

    // ========================================================================
    // Validation Errors
    // ========================================================================

    #[error("Invalid parameter: {0}")]
    InvalidParameter(&'static str),

    #[error("Tick {0} out of range")]
    TickOutOfRange(i32),

    #[error("Invalid tick range: lower {0} must be below upper {1}")]
    InvalidTickRange(i32, i32),

    #[error("Invalid time range: from {from} is after to {to}")]
    InvalidTimeRange { from: i128, to: i128 },

    // ========================================================================
    // Oracle Errors
    // ========================================================================

    #[error("Oracle not initialized")]
    NotInitialized,

    #[error("Oracle already initialized")]
    AlreadyInitialized,

    #[error("Observation timestamp {timestamp} is not after the last observation at {last}")]
    NonIncreasingTimestamp { timestamp: i128, last: i128 },

    #[error("Target timestamp {target} is older than the oldest observation at {oldest}")]
    TargetTooOld { target: i128, oldest: i128 },

    #[error("Insufficient observation history")]
    InsufficientHistory,

    #[error("Cardinality {0} exceeds the maximum of {1}")]
    CardinalityTooLarge(u32, u32),

    // ========================================================================
    // Margin Errors
    // ========================================================================

    #[error("termEndTimestamp must be > 0")]
    InvalidTermEnd,

    #[error("endTime must be > currentTime")]
    TermEnded,

    #[error("Invalid term: start {start} is not before end {end}")]
    InvalidTerm { start: i128, end: i128 },

    #[error("Margin calculator parameters not set")]
    ParametersNotSet,
}

/// Result type using core errors
pub type CoreResult<T> = Result<T, FixfloatCoreError>;

// Helper functions for creating specific errors
impl FixfloatCoreError {
    /// Create an invalid parameter error naming the offending field
    pub fn invalid_parameter(name: &'static str) -> Self {
        Self::InvalidParameter(name)
    }

    /// Create a stale write error
    pub fn non_increasing(timestamp: i128, last: i128) -> Self {
        Self::NonIncreasingTimestamp { timestamp, last }
    }

    /// Whether the error is a caller precondition violation rather than an
    /// arithmetic failure
    pub fn is_precondition(&self) -> bool {
        !matches!(
            self,
            Self::MathOverflow
                | Self::MathUnderflow
                | Self::DivisionByZero
                | Self::MulDivOverflow
                | Self::InvalidLogarithmInput
                | Self::ExponentialOverflow
                | Self::NegativeSquareRoot
                | Self::ConversionError
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = FixfloatCoreError::non_increasing(5, 7);
        assert_eq!(
            format!("{}", err),
            "Observation timestamp 5 is not after the last observation at 7"
        );

        let err = FixfloatCoreError::invalid_parameter("sigma_squared_wad");
        assert_eq!(format!("{}", err), "Invalid parameter: sigma_squared_wad");

        assert_eq!(format!("{}", FixfloatCoreError::TermEnded), "endTime must be > currentTime");
    }

    #[test]
    fn test_precondition_classification() {
        assert!(FixfloatCoreError::NotInitialized.is_precondition());
        assert!(FixfloatCoreError::TargetTooOld { target: 1, oldest: 2 }.is_precondition());
        assert!(!FixfloatCoreError::MathOverflow.is_precondition());
    }
}

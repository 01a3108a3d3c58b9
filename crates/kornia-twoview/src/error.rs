//! Error types shared by the normalizer, the estimators and the RANSAC driver.

use thiserror::Error;

/// Errors returned by two-view estimation.
///
/// The variants fall in three groups:
///
/// * invalid arguments, surfaced to the caller immediately;
/// * degenerate or numerically unusable samples ([`TwoViewError::DegenerateInput`],
///   [`TwoViewError::IllConditionedModel`], [`TwoViewError::NumericalFailure`]), which the
///   RANSAC driver absorbs by discarding the offending iteration;
/// * fatal consensus failures ([`TwoViewError::InsufficientData`],
///   [`TwoViewError::NoModelFound`]).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TwoViewError {
    /// The two point sequences do not have the same length.
    #[error("Mismatched array lengths: {left_name} ({left_len}) != {right_name} ({right_len})")]
    MismatchedLengths {
        /// Label for the left-hand sequence
        left_name: &'static str,
        /// Length of the left-hand sequence
        left_len: usize,
        /// Label for the right-hand sequence
        right_name: &'static str,
        /// Length of the right-hand sequence
        right_len: usize,
    },

    /// A solver received a number of correspondences it cannot work with.
    #[error("Solver requires {expected} correspondences, got {actual}")]
    InvalidSampleSize {
        /// Number of correspondences the solver expects
        expected: usize,
        /// Number of correspondences provided
        actual: usize,
    },

    /// A point row has an unsupported number of coordinates.
    #[error("Expected points with 2 or 3 coordinates, row {index} has {dim}")]
    InvalidPointDimension {
        /// Index of the offending row
        index: usize,
        /// Number of coordinates found in the row
        dim: usize,
    },

    /// A configuration value is out of range.
    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Name of the parameter
        name: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// The input points cannot be normalized or fitted (coincident points, point at infinity).
    #[error("Degenerate input: {0}")]
    DegenerateInput(&'static str),

    /// The fitted model is numerically unusable.
    #[error("Ill-conditioned model: pivot {pivot:e} is too small")]
    IllConditionedModel {
        /// Magnitude of the entry used to fix the model scale
        pivot: f64,
    },

    /// A decomposition produced non-finite values.
    #[error("Numerical failure: {0}")]
    NumericalFailure(&'static str),

    /// Fewer correspondences than the minimal sample size.
    #[error("Need at least {required} correspondences, got {actual}")]
    InsufficientData {
        /// Minimal sample size of the estimator
        required: usize,
        /// Number of correspondences provided
        actual: usize,
    },

    /// No candidate ever reached the minimum inlier support.
    #[error("RANSAC failed to find a valid model after {iterations} iterations (best support {best_inliers}, required {min_inliers})")]
    NoModelFound {
        /// Iterations performed
        iterations: usize,
        /// Largest inlier count observed among fitted candidates
        best_inliers: usize,
        /// Minimum inlier count required for acceptance
        min_inliers: usize,
    },
}

impl TwoViewError {
    /// Whether the error invalidates only the current sample.
    ///
    /// The RANSAC driver discards iterations failing with a recoverable error and keeps
    /// sampling; every other error is surfaced to the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TwoViewError::DegenerateInput(_)
                | TwoViewError::IllConditionedModel { .. }
                | TwoViewError::NumericalFailure(_)
        )
    }

    /// Whether the error reports a malformed call rather than a property of the data.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            TwoViewError::MismatchedLengths { .. }
                | TwoViewError::InvalidSampleSize { .. }
                | TwoViewError::InvalidPointDimension { .. }
                | TwoViewError::InvalidParameter { .. }
        )
    }
}

pub(crate) fn check_same_length(x1_len: usize, x2_len: usize) -> Result<(), TwoViewError> {
    if x1_len != x2_len {
        return Err(TwoViewError::MismatchedLengths {
            left_name: "points1",
            left_len: x1_len,
            right_name: "points2",
            right_len: x2_len,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert!(TwoViewError::DegenerateInput("coincident points").is_recoverable());
        assert!(TwoViewError::IllConditionedModel { pivot: 0.0 }.is_recoverable());
        assert!(TwoViewError::NumericalFailure("svd").is_recoverable());

        let fatal = TwoViewError::InsufficientData {
            required: 8,
            actual: 5,
        };
        assert!(!fatal.is_recoverable());
        assert!(!fatal.is_invalid_argument());

        let err = check_same_length(3, 4).unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(!err.is_recoverable());
        assert_eq!(
            err.to_string(),
            "Mismatched array lengths: points1 (3) != points2 (4)"
        );
    }
}

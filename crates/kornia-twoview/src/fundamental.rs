use serde::{Deserialize, Serialize};

use crate::error::{check_same_length, TwoViewError};
use crate::linalg::{
    enforce_rank2, mat33_from_row_major, mat33_mul, mat33_transpose, normalize_mat33_scale,
    solve_nullspace_9, Mat33,
};
use crate::normalize::{normalize_points_with, NormalizationMethod};
use crate::ransac::Estimator;

/// Number of correspondences of the minimal fundamental matrix sample.
pub const FUNDAMENTAL_MIN_SAMPLES: usize = 8;

/// Estimate the fundamental matrix from exactly 8 correspondences with the normalized
/// 8-point algorithm.
///
/// The returned matrix satisfies the epipolar constraint `x1^T * F * x2 = 0`, has rank 2 and
/// is scaled so that `F[2][2] = 1`.
///
/// # Arguments
///
/// * `x1` - 8 homogeneous points in image 1.
/// * `x2` - The 8 corresponding homogeneous points in image 2.
///
/// # Errors
///
/// * [`TwoViewError::InvalidSampleSize`] or [`TwoViewError::MismatchedLengths`] for a wrong
///   number of points.
/// * [`TwoViewError::DegenerateInput`] when a point set cannot be normalized.
/// * [`TwoViewError::IllConditionedModel`] when `F[2][2]` vanishes.
/// * [`TwoViewError::NumericalFailure`] when a decomposition produces non-finite values.
pub fn fundamental_8point(x1: &[[f64; 3]], x2: &[[f64; 3]]) -> Result<Mat33, TwoViewError> {
    check_same_length(x1.len(), x2.len())?;
    if x1.len() != FUNDAMENTAL_MIN_SAMPLES {
        return Err(TwoViewError::InvalidSampleSize {
            expected: FUNDAMENTAL_MIN_SAMPLES,
            actual: x1.len(),
        });
    }
    fundamental_normalized_dlt(x1, x2, NormalizationMethod::default())
}

/// Least-squares fundamental matrix from 8 or more correspondences.
///
/// Same algorithm as [`fundamental_8point`], generalized to an overdetermined design matrix.
pub fn fundamental_from_correspondences(
    x1: &[[f64; 3]],
    x2: &[[f64; 3]],
) -> Result<Mat33, TwoViewError> {
    check_same_length(x1.len(), x2.len())?;
    if x1.len() < FUNDAMENTAL_MIN_SAMPLES {
        return Err(TwoViewError::InvalidSampleSize {
            expected: FUNDAMENTAL_MIN_SAMPLES,
            actual: x1.len(),
        });
    }
    fundamental_normalized_dlt(x1, x2, NormalizationMethod::default())
}

fn fundamental_normalized_dlt(
    x1: &[[f64; 3]],
    x2: &[[f64; 3]],
    method: NormalizationMethod,
) -> Result<Mat33, TwoViewError> {
    let (x1n, t1) = normalize_points_with(x1, method)?;
    let (x2n, t2) = normalize_points_with(x2, method)?;

    // Build design matrix A (N x 9) for x1^T * F * x2 = 0
    let n = x1n.len();
    let mut a = faer::Mat::<f64>::zeros(n, 9);
    for (i, (p1, p2)) in x1n.iter().zip(x2n.iter()).enumerate() {
        for r in 0..3 {
            for c in 0..3 {
                a.write(i, 3 * r + c, p1[r] * p2[c]);
            }
        }
    }

    let f_raw = mat33_from_row_major(&solve_nullspace_9(&a)?);
    let f_rank2 = enforce_rank2(&f_raw)?;

    // Denormalize: F = T1^T * F * T2
    let f = mat33_mul(
        &mat33_mul(&mat33_transpose(&t1.matrix()), &f_rank2),
        &t2.matrix(),
    );

    normalize_mat33_scale(&f)
}

/// Fundamental matrix estimator for the RANSAC driver.
///
/// Minimal samples are fitted with the normalized 8-point algorithm and the final refinement
/// uses the least-squares path on all inliers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundamentalEstimator {
    /// Point normalization applied before the linear solve.
    pub normalization: NormalizationMethod,
}

impl Estimator for FundamentalEstimator {
    type Model = Mat33;

    fn min_sample_size(&self) -> usize {
        FUNDAMENTAL_MIN_SAMPLES
    }

    fn fit(&self, x1: &[[f64; 3]], x2: &[[f64; 3]]) -> Result<Mat33, TwoViewError> {
        check_same_length(x1.len(), x2.len())?;
        if x1.len() != FUNDAMENTAL_MIN_SAMPLES {
            return Err(TwoViewError::InvalidSampleSize {
                expected: FUNDAMENTAL_MIN_SAMPLES,
                actual: x1.len(),
            });
        }
        fundamental_normalized_dlt(x1, x2, self.normalization)
    }

    fn supports_overdetermined(&self) -> bool {
        true
    }

    fn fit_overdetermined(&self, x1: &[[f64; 3]], x2: &[[f64; 3]]) -> Result<Mat33, TwoViewError> {
        check_same_length(x1.len(), x2.len())?;
        if x1.len() < FUNDAMENTAL_MIN_SAMPLES {
            return Err(TwoViewError::InvalidSampleSize {
                expected: FUNDAMENTAL_MIN_SAMPLES,
                actual: x1.len(),
            });
        }
        fundamental_normalized_dlt(x1, x2, self.normalization)
    }
}

use crate::error::{check_same_length, TwoViewError};
use crate::linalg::{
    det_mat33, frobenius_norm_mat33, mat33_from_row_major, mat33_mul, normalize_mat33_scale,
    solve_nullspace_9, Mat33,
};
use crate::normalize::normalize_points;
use crate::ransac::Estimator;

/// Number of correspondences of the minimal homography sample.
pub const HOMOGRAPHY_MIN_SAMPLES: usize = 4;

// determinant of the unit-norm homography in normalized coordinates
const MIN_NORMALIZED_DET: f64 = 1e-8;

/// Compute the homography `x2 ~ H * x1` from four point correspondences.
///
/// * `x1` - The 4 source homogeneous points.
/// * `x2` - The 4 destination homogeneous points.
///
/// Returns the homography scaled so that `H[2][2] = 1`.
pub fn homography_4pt(x1: &[[f64; 3]], x2: &[[f64; 3]]) -> Result<Mat33, TwoViewError> {
    check_same_length(x1.len(), x2.len())?;
    if x1.len() != HOMOGRAPHY_MIN_SAMPLES {
        return Err(TwoViewError::InvalidSampleSize {
            expected: HOMOGRAPHY_MIN_SAMPLES,
            actual: x1.len(),
        });
    }
    homography_normalized_dlt(x1, x2)
}

/// Least-squares homography `x2 ~ H * x1` from 4 or more correspondences.
pub fn homography_from_correspondences(
    x1: &[[f64; 3]],
    x2: &[[f64; 3]],
) -> Result<Mat33, TwoViewError> {
    check_same_length(x1.len(), x2.len())?;
    if x1.len() < HOMOGRAPHY_MIN_SAMPLES {
        return Err(TwoViewError::InvalidSampleSize {
            expected: HOMOGRAPHY_MIN_SAMPLES,
            actual: x1.len(),
        });
    }
    homography_normalized_dlt(x1, x2)
}

fn homography_normalized_dlt(x1: &[[f64; 3]], x2: &[[f64; 3]]) -> Result<Mat33, TwoViewError> {
    let (x1n, t1) = normalize_points(x1)?;
    let (x2n, t2) = normalize_points(x2)?;

    // construct matrix A, two rows per correspondence
    let n = x1n.len();
    let mut mat_a = faer::Mat::<f64>::zeros(2 * n, 9);
    for (i, (p, q)) in x1n.iter().zip(x2n.iter()).enumerate() {
        for k in 0..3 {
            mat_a.write(2 * i, k, q[2] * p[k]);
            mat_a.write(2 * i, 6 + k, -q[0] * p[k]);
            mat_a.write(2 * i + 1, 3 + k, q[2] * p[k]);
            mat_a.write(2 * i + 1, 6 + k, -q[1] * p[k]);
        }
    }

    let h_norm = mat33_from_row_major(&solve_nullspace_9(&mat_a)?);

    // three nearly collinear points leave a near-singular solution
    let det = det_mat33(&h_norm) / frobenius_norm_mat33(&h_norm).powi(3);
    if !det.is_finite() || det.abs() < MIN_NORMALIZED_DET {
        return Err(TwoViewError::DegenerateInput("det is too small"));
    }

    // H = T2^-1 * H_norm * T1
    let h = mat33_mul(&mat33_mul(&t2.inverse_matrix(), &h_norm), &t1.matrix());
    normalize_mat33_scale(&h)
}

/// Homography estimator for the RANSAC driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct HomographyEstimator;

impl Estimator for HomographyEstimator {
    type Model = Mat33;

    fn min_sample_size(&self) -> usize {
        HOMOGRAPHY_MIN_SAMPLES
    }

    fn fit(&self, x1: &[[f64; 3]], x2: &[[f64; 3]]) -> Result<Mat33, TwoViewError> {
        homography_4pt(x1, x2)
    }

    fn supports_overdetermined(&self) -> bool {
        true
    }

    fn fit_overdetermined(&self, x1: &[[f64; 3]], x2: &[[f64; 3]]) -> Result<Mat33, TwoViewError> {
        homography_from_correspondences(x1, x2)
    }
}

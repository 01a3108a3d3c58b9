use crate::error::{check_same_length, TwoViewError};
use crate::linalg::{mat33_mul, normalize_mat33_scale, Mat33};
use crate::normalize::normalize_points;
use crate::ransac::Estimator;

/// Number of correspondences of the minimal affine sample.
pub const AFFINE_MIN_SAMPLES: usize = 3;

const MIN_SINGULAR_RATIO: f64 = 1e-10;
const MIN_BLOCK_DET: f64 = 1e-8;

/// Compute the affine transform `x2 ~ A * x1` from three point correspondences.
///
/// The result is a 3x3 matrix whose last row is `[0, 0, 1]`.
pub fn affine_3pt(x1: &[[f64; 3]], x2: &[[f64; 3]]) -> Result<Mat33, TwoViewError> {
    check_same_length(x1.len(), x2.len())?;
    if x1.len() != AFFINE_MIN_SAMPLES {
        return Err(TwoViewError::InvalidSampleSize {
            expected: AFFINE_MIN_SAMPLES,
            actual: x1.len(),
        });
    }
    affine_gold_standard(x1, x2)
}

/// Least-squares affine transform from 3 or more correspondences.
///
/// Minimizes the geometric error in both images (Hartley and Zisserman, algorithm 4.7).
pub fn affine_from_correspondences(
    x1: &[[f64; 3]],
    x2: &[[f64; 3]],
) -> Result<Mat33, TwoViewError> {
    check_same_length(x1.len(), x2.len())?;
    if x1.len() < AFFINE_MIN_SAMPLES {
        return Err(TwoViewError::InvalidSampleSize {
            expected: AFFINE_MIN_SAMPLES,
            actual: x1.len(),
        });
    }
    affine_gold_standard(x1, x2)
}

fn affine_gold_standard(x1: &[[f64; 3]], x2: &[[f64; 3]]) -> Result<Mat33, TwoViewError> {
    let (x1n, t1) = normalize_points(x1)?;
    let (x2n, t2) = normalize_points(x2)?;

    // stacked centered coordinates [x1, y1, x2, y2], one row per correspondence
    let n = x1n.len();
    let mut mat_a = faer::Mat::<f64>::zeros(n, 4);
    for (i, (p, q)) in x1n.iter().zip(x2n.iter()).enumerate() {
        mat_a.write(i, 0, p[0]);
        mat_a.write(i, 1, p[1]);
        mat_a.write(i, 2, q[0]);
        mat_a.write(i, 3, q[1]);
    }

    let ((s0, s1), b, c) = if n < 4 {
        let svd = mat_a.svd();
        dominant_blocks(svd.s_diagonal(), svd.v())
    } else {
        let svd = mat_a.thin_svd();
        dominant_blocks(svd.s_diagonal(), svd.v())
    };
    if !s0.is_finite() || !s1.is_finite() {
        return Err(TwoViewError::NumericalFailure("SVD of the affine design matrix"));
    }
    // collinear points span a single direction
    if s1 <= MIN_SINGULAR_RATIO * s0 {
        return Err(TwoViewError::DegenerateInput("collinear points"));
    }

    let det_b = b[0][0] * b[1][1] - b[0][1] * b[1][0];
    if !det_b.is_finite() || det_b.abs() <= MIN_BLOCK_DET {
        return Err(TwoViewError::DegenerateInput("det is too small"));
    }
    let b_inv = [
        [b[1][1] / det_b, -b[0][1] / det_b],
        [-b[1][0] / det_b, b[0][0] / det_b],
    ];

    // linear part A = C * B^-1, no translation between the centered sets
    let mut h_norm = [[0.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
    for i in 0..2 {
        for j in 0..2 {
            h_norm[i][j] = c[i][0] * b_inv[0][j] + c[i][1] * b_inv[1][j];
        }
    }

    let h = mat33_mul(&mat33_mul(&t2.inverse_matrix(), &h_norm), &t1.matrix());
    normalize_mat33_scale(&h)
}

// the two largest singular values and the matching right singular vectors stacked as [B; C]
fn dominant_blocks(
    s: faer::ColRef<'_, f64>,
    v: faer::MatRef<'_, f64>,
) -> ((f64, f64), [[f64; 2]; 2], [[f64; 2]; 2]) {
    let b = [[v.read(0, 0), v.read(0, 1)], [v.read(1, 0), v.read(1, 1)]];
    let c = [[v.read(2, 0), v.read(2, 1)], [v.read(3, 0), v.read(3, 1)]];
    ((s.read(0), s.read(1)), b, c)
}

/// Affine transform estimator for the RANSAC driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct AffineEstimator;

impl Estimator for AffineEstimator {
    type Model = Mat33;

    fn min_sample_size(&self) -> usize {
        AFFINE_MIN_SAMPLES
    }

    fn fit(&self, x1: &[[f64; 3]], x2: &[[f64; 3]]) -> Result<Mat33, TwoViewError> {
        affine_3pt(x1, x2)
    }

    fn supports_overdetermined(&self) -> bool {
        true
    }

    fn fit_overdetermined(&self, x1: &[[f64; 3]], x2: &[[f64; 3]]) -> Result<Mat33, TwoViewError> {
        affine_from_correspondences(x1, x2)
    }
}

use crate::error::{check_same_length, TwoViewError};
use crate::linalg::{dot_product3, mat33_mul_vec3, mat33t_mul_vec3, max_abs_mat33, Mat33};
use crate::normalize::homogenize;
use crate::ransac::ResidualMetric;

/// Sampson distance of a single correspondence under `x1^T * F * x2 = 0`.
///
/// The squared algebraic error is divided by the squared gradient norm of the constraint,
/// i.e. by the first two components of the epipolar lines `F * x2` (image 1) and
/// `F^T * x1` (image 2). These are the partial derivatives of `x1^T * F * x2` with respect
/// to `x1` and `x2`. The `F * x1`, `F^T * x2` pairing belongs to the transposed convention
/// `x2^T * F * x1 = 0` and is not used here.
///
/// Returns `f64::INFINITY` when the gradient vanishes or a point lies at infinity.
pub fn sampson_error(f: &Mat33, x1: &[f64; 3], x2: &[f64; 3]) -> f64 {
    let (p1, p2) = match (homogenize(x1), homogenize(x2)) {
        (Ok(p1), Ok(p2)) => (p1, p2),
        _ => return f64::INFINITY,
    };

    let l1 = mat33_mul_vec3(f, &p2);
    let l2 = mat33t_mul_vec3(f, &p1);

    let numerator = dot_product3(&p1, &l1).powi(2);
    let denominator = (l1[0] * l1[0] + l1[1] * l1[1]) + (l2[0] * l2[0] + l2[1] * l2[1]);

    let scale = max_abs_mat33(f);
    if !denominator.is_finite() || denominator <= f64::EPSILON * scale * scale {
        return f64::INFINITY;
    }
    numerator / denominator
}

/// Compute the Sampson distance of every correspondence against a fundamental matrix.
///
/// # Arguments
///
/// * `x1` - Homogeneous points in image 1.
/// * `x2` - Corresponding homogeneous points in image 2.
/// * `f` - The fundamental matrix with `x1^T * F * x2 = 0`.
///
/// # Returns
///
/// One non-negative residual per correspondence, `f64::INFINITY` for correspondences whose
/// distance is undefined.
///
/// Example:
/// ```
/// use kornia_twoview::sampson::sampson_distance;
///
/// // pure horizontal translation: corresponding points share the same row
/// let f = [[0.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]];
/// let x1 = [[10.0, 20.0, 1.0], [5.0, 7.0, 1.0]];
/// let x2 = [[30.0, 20.0, 1.0], [5.0, 9.0, 1.0]];
/// let r = sampson_distance(&x1, &x2, &f).unwrap();
/// assert_eq!(r[0], 0.0);
/// assert!((r[1] - 2.0).abs() < 1e-12);
/// ```
pub fn sampson_distance(
    x1: &[[f64; 3]],
    x2: &[[f64; 3]],
    f: &Mat33,
) -> Result<Vec<f64>, TwoViewError> {
    check_same_length(x1.len(), x2.len())?;
    Ok(x1
        .iter()
        .zip(x2.iter())
        .map(|(p1, p2)| sampson_error(f, p1, p2))
        .collect())
}

/// Sampson distance as a RANSAC residual metric for fundamental matrices.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampsonDistance;

impl ResidualMetric for SampsonDistance {
    type Model = Mat33;

    fn residuals(
        &self,
        x1: &[[f64; 3]],
        x2: &[[f64; 3]],
        model: &Mat33,
    ) -> Result<Vec<f64>, TwoViewError> {
        sampson_distance(x1, x2, model)
    }
}

use crate::error::{check_same_length, TwoViewError};
use crate::linalg::{inverse_mat33, mat33_mul_vec3, Mat33};
use crate::normalize::homogenize;
use crate::ransac::ResidualMetric;

fn squared_transfer(h: &Mat33, src: &[f64; 3], dst: &[f64; 3]) -> f64 {
    let mapped = match homogenize(&mat33_mul_vec3(h, src)) {
        Ok(p) => p,
        Err(_) => return f64::INFINITY,
    };
    let dx = mapped[0] - dst[0];
    let dy = mapped[1] - dst[1];
    dx * dx + dy * dy
}

/// Symmetric squared transfer error of every correspondence under `x2 ~ H * x1`.
///
/// For each pair the residual is `d(x2, H x1)^2 + d(x1, H^-1 x2)^2` in pixels squared.
/// Correspondences mapped to infinity, and every correspondence of a non-invertible `H`,
/// get `f64::INFINITY`.
pub fn symmetric_transfer_error(
    x1: &[[f64; 3]],
    x2: &[[f64; 3]],
    h: &Mat33,
) -> Result<Vec<f64>, TwoViewError> {
    check_same_length(x1.len(), x2.len())?;

    let Some(h_inv) = inverse_mat33(h) else {
        return Ok(vec![f64::INFINITY; x1.len()]);
    };

    Ok(x1
        .iter()
        .zip(x2.iter())
        .map(|(p1, p2)| match (homogenize(p1), homogenize(p2)) {
            (Ok(p1), Ok(p2)) => squared_transfer(h, &p1, &p2) + squared_transfer(&h_inv, &p2, &p1),
            _ => f64::INFINITY,
        })
        .collect())
}

/// Symmetric transfer error as a RANSAC residual metric for homographies and affinities.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymmetricTransferError;

impl ResidualMetric for SymmetricTransferError {
    type Model = Mat33;

    fn residuals(
        &self,
        x1: &[[f64; 3]],
        x2: &[[f64; 3]],
        model: &Mat33,
    ) -> Result<Vec<f64>, TwoViewError> {
        symmetric_transfer_error(x1, x2, model)
    }
}

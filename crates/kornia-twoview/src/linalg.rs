use crate::error::TwoViewError;

/// A row-major 3x3 matrix.
pub type Mat33 = [[f64; 3]; 3];

/// The 3x3 identity matrix.
pub const IDENTITY: Mat33 = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Multiply two 3x3 matrices, `a * b`.
///
/// Example:
/// ```
/// use kornia_twoview::linalg::{mat33_mul, IDENTITY};
///
/// let a = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
/// assert_eq!(mat33_mul(&a, &IDENTITY), a);
/// ```
pub fn mat33_mul(a: &Mat33, b: &Mat33) -> Mat33 {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, val) in row.iter_mut().enumerate() {
            *val = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
        }
    }
    out
}

/// Transpose a 3x3 matrix.
pub fn mat33_transpose(m: &Mat33) -> Mat33 {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, val) in row.iter_mut().enumerate() {
            *val = m[j][i];
        }
    }
    out
}

/// Multiply a 3x3 matrix by a 3-vector, `m * v`.
pub fn mat33_mul_vec3(m: &Mat33, v: &[f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

/// Multiply the transpose of a 3x3 matrix by a 3-vector, `m^T * v`.
pub fn mat33t_mul_vec3(m: &Mat33, v: &[f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[1][0] * v[1] + m[2][0] * v[2],
        m[0][1] * v[0] + m[1][1] * v[1] + m[2][1] * v[2],
        m[0][2] * v[0] + m[1][2] * v[1] + m[2][2] * v[2],
    ]
}

/// Dot product of two 3-vectors.
pub fn dot_product3(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Determinant of a 3x3 matrix.
pub fn det_mat33(m: &Mat33) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Inverse of a 3x3 matrix via the adjugate.
///
/// Returns `None` when the determinant is zero relative to the magnitude of the entries.
pub fn inverse_mat33(m: &Mat33) -> Option<Mat33> {
    let det = det_mat33(m);
    let scale = max_abs_mat33(m);
    if !det.is_finite() || det.abs() <= f64::EPSILON * scale * scale * scale {
        return None;
    }
    let inv_det = 1.0 / det;
    Some([
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
        ],
    ])
}

/// Largest absolute entry of a 3x3 matrix.
pub fn max_abs_mat33(m: &Mat33) -> f64 {
    m.iter()
        .flat_map(|row| row.iter())
        .fold(0.0f64, |acc, v| acc.max(v.abs()))
}

/// Frobenius norm of a 3x3 matrix.
pub fn frobenius_norm_mat33(m: &Mat33) -> f64 {
    m.iter()
        .flat_map(|row| row.iter())
        .map(|v| v * v)
        .sum::<f64>()
        .sqrt()
}

/// Divide a 3x3 matrix by its bottom-right entry.
///
/// Fails with [`TwoViewError::IllConditionedModel`] when that entry is within machine
/// epsilon of zero relative to the largest entry, since the scale cannot be fixed there.
pub fn normalize_mat33_scale(m: &Mat33) -> Result<Mat33, TwoViewError> {
    let pivot = m[2][2];
    if !pivot.is_finite() || pivot.abs() <= f64::EPSILON * max_abs_mat33(m) {
        return Err(TwoViewError::IllConditionedModel { pivot: pivot.abs() });
    }
    let mut out = *m;
    out.iter_mut()
        .flat_map(|row| row.iter_mut())
        .for_each(|v| *v /= pivot);
    Ok(out)
}

pub(crate) fn ensure_finite_mat33(m: &Mat33, what: &'static str) -> Result<(), TwoViewError> {
    if m.iter().flat_map(|row| row.iter()).all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(TwoViewError::NumericalFailure(what))
    }
}

// ratio below which the second smallest singular value counts as zero
const RANK_DEFICIENCY_RATIO: f64 = 1e-10;

/// Solve `min |A x|` subject to `|x| = 1` for a design matrix with 9 columns.
///
/// Returns the right singular vector associated with the smallest singular value. The full
/// decomposition is used for underdetermined systems so that the null vector is present in `V`.
///
/// Fails with [`TwoViewError::DegenerateInput`] when the solution is not unique, i.e. the
/// second smallest singular value vanishes as well.
pub(crate) fn solve_nullspace_9(a: &faer::Mat<f64>) -> Result<[f64; 9], TwoViewError> {
    debug_assert_eq!(a.ncols(), 9);
    if a.nrows() < 8 {
        return Err(TwoViewError::InvalidSampleSize {
            expected: 8,
            actual: a.nrows(),
        });
    }
    let (s_max, s_second, x) = if a.nrows() < a.ncols() {
        let svd = a.svd();
        smallest_right_singular_vector(svd.s_diagonal(), svd.v())
    } else {
        let svd = a.thin_svd();
        smallest_right_singular_vector(svd.s_diagonal(), svd.v())
    };
    if !s_max.is_finite() || !s_second.is_finite() || x.iter().any(|val| !val.is_finite()) {
        return Err(TwoViewError::NumericalFailure("SVD of the design matrix"));
    }
    if s_second <= RANK_DEFICIENCY_RATIO * s_max {
        return Err(TwoViewError::DegenerateInput("rank-deficient design matrix"));
    }
    Ok(x)
}

// largest and second smallest singular values, and the last column of V
fn smallest_right_singular_vector(
    s: faer::ColRef<'_, f64>,
    v: faer::MatRef<'_, f64>,
) -> (f64, f64, [f64; 9]) {
    let last = v.ncols() - 1;
    let mut x = [0.0f64; 9];
    for (i, val) in x.iter_mut().enumerate() {
        *val = v.read(i, last);
    }
    (s.read(0), s.read(7), x)
}

/// Project a 3x3 matrix onto the rank-2 manifold by zeroing its smallest singular value.
///
/// Returns a new matrix `U * diag(s1, s2, 0) * V^T`.
pub fn enforce_rank2(m: &Mat33) -> Result<Mat33, TwoViewError> {
    ensure_finite_mat33(m, "rank-2 projection input")?;

    let mat = faer::Mat::<f64>::from_fn(3, 3, |i, j| m[i][j]);
    let svd = mat.svd();
    let u = svd.u();
    let v = svd.v();
    let s = svd.s_diagonal();
    let sigma = [s.read(0), s.read(1), 0.0];

    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, val) in row.iter_mut().enumerate() {
            *val = (0..3).map(|k| u.read(i, k) * sigma[k] * v.read(j, k)).sum();
        }
    }

    ensure_finite_mat33(&out, "SVD of the rank-2 projection")?;
    Ok(out)
}

/// Reshape a 9-vector into a row-major 3x3 matrix.
pub(crate) fn mat33_from_row_major(x: &[f64; 9]) -> Mat33 {
    [[x[0], x[1], x[2]], [x[3], x[4], x[5]], [x[6], x[7], x[8]]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mat33_mul_transpose() {
        let a = [[1.0, 2.0, 3.0], [0.0, 1.0, 4.0], [5.0, 6.0, 0.0]];
        let at = mat33_transpose(&a);
        assert_eq!(at[0], [1.0, 0.0, 5.0]);
        let aat = mat33_mul(&a, &at);
        // a * a^T is symmetric
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(aat[i][j], aat[j][i]);
            }
        }
        let v = [1.0, -1.0, 2.0];
        assert_eq!(mat33t_mul_vec3(&a, &v), mat33_mul_vec3(&at, &v));
    }

    #[test]
    fn test_inverse_mat33() {
        let a = [[1.0, 2.0, 3.0], [0.0, 1.0, 4.0], [5.0, 6.0, 0.0]];
        assert_relative_eq!(det_mat33(&a), 1.0);
        let inv = inverse_mat33(&a).unwrap();
        let id = mat33_mul(&a, &inv);
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(id[i][j], IDENTITY[i][j], epsilon = 1e-12);
            }
        }

        let singular = [[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [0.0, 1.0, 1.0]];
        assert!(inverse_mat33(&singular).is_none());
    }

    #[test]
    fn test_normalize_mat33_scale() -> Result<(), TwoViewError> {
        let m = [[2.0, 4.0, 6.0], [8.0, 10.0, 12.0], [14.0, 16.0, 2.0]];
        let n = normalize_mat33_scale(&m)?;
        assert_eq!(n[2][2], 1.0);
        assert_eq!(n[0][1], 2.0);

        let bad = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]];
        assert!(matches!(
            normalize_mat33_scale(&bad),
            Err(TwoViewError::IllConditionedModel { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_enforce_rank2() -> Result<(), TwoViewError> {
        let m = [[0.1, 0.2, -0.3], [0.4, -0.1, 0.2], [-0.2, 0.5, 0.3]];
        assert!(det_mat33(&m).abs() > 1e-3);
        let r2 = enforce_rank2(&m)?;
        assert_relative_eq!(det_mat33(&r2), 0.0, epsilon = 1e-12);

        // an already rank-2 matrix is left untouched
        let again = enforce_rank2(&r2)?;
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(again[i][j], r2[i][j], epsilon = 1e-12);
            }
        }
        Ok(())
    }

    #[test]
    fn test_solve_nullspace_9() -> Result<(), TwoViewError> {
        // rows orthogonal to e_9 leave it as the only null direction
        let mut a = faer::Mat::<f64>::zeros(8, 9);
        for i in 0..8 {
            a.write(i, i, (i + 1) as f64);
        }
        let x = solve_nullspace_9(&a)?;
        for val in x.iter().take(8) {
            assert_relative_eq!(*val, 0.0, epsilon = 1e-12);
        }
        assert_relative_eq!(x[8].abs(), 1.0, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_solve_nullspace_9_overdetermined() -> Result<(), TwoViewError> {
        // 12 rows spanning the first 8 coordinates, e_9 is still the only null direction
        let a = faer::Mat::<f64>::from_fn(12, 9, |i, j| match (i, j) {
            (_, 8) => 0.0,
            (i, j) if i == j => (i + 1) as f64,
            (i, _) if i < 8 => 0.0,
            (i, j) => (i + j) as f64,
        });
        let x = solve_nullspace_9(&a)?;
        for val in x.iter().take(8) {
            assert_relative_eq!(*val, 0.0, epsilon = 1e-12);
        }
        assert_relative_eq!(x[8].abs(), 1.0, epsilon = 1e-12);

        // two null directions in a tall matrix
        let rank7 =
            faer::Mat::<f64>::from_fn(12, 9, |i, j| if i == j && j < 7 { 1.0 } else { 0.0 });
        assert_eq!(
            solve_nullspace_9(&rank7),
            Err(TwoViewError::DegenerateInput("rank-deficient design matrix"))
        );
        Ok(())
    }
}

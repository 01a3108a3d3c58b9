use crate::linalg::{frobenius_norm_mat33, Mat33};

/// Assert that `a = c * b` for some non-zero scalar `c`, comparing unit-norm matrices.
pub(crate) fn assert_mat33_proportional(a: &Mat33, b: &Mat33, epsilon: f64) {
    let na = frobenius_norm_mat33(a);
    let nb = frobenius_norm_mat33(b);
    assert!(na > 0.0 && nb > 0.0);

    let dot = (0..3)
        .flat_map(|i| (0..3).map(move |j| (i, j)))
        .map(|(i, j)| a[i][j] * b[i][j])
        .sum::<f64>();
    let sign = dot.signum();

    for i in 0..3 {
        for j in 0..3 {
            approx::assert_abs_diff_eq!(a[i][j] / na, sign * b[i][j] / nb, epsilon = epsilon);
        }
    }
}

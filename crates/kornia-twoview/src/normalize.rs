use serde::{Deserialize, Serialize};

use crate::error::TwoViewError;
use crate::linalg::{mat33_mul_vec3, Mat33};

/// How the spread of a point set is measured before rescaling it to `sqrt(2)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationMethod {
    /// A single standard deviation pooled over the x and y coordinates, measured about the
    /// per-axis centroid `(mx, my)`: `sqrt(sum((x - mx)^2 + (y - my)^2) / 2N)`.
    ///
    /// This is not the standard deviation of all coordinates about one shared mean, which
    /// grows with the distance between `mx` and `my` rather than with the point spread.
    #[default]
    PooledStd,
    /// The mean Euclidean distance of the points from the centroid (Hartley).
    MeanDistance,
}

/// Similarity transform `T = [[s, 0, -s*mx], [0, s, -s*my], [0, 0, 1]]` produced by
/// [`normalize_points`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizationTransform {
    /// Isotropic scale factor.
    pub scale: f64,
    /// Centroid of the re-homogenized input points.
    pub centroid: [f64; 2],
}

impl NormalizationTransform {
    /// The transform as a 3x3 matrix.
    pub fn matrix(&self) -> Mat33 {
        let s = self.scale;
        let [mx, my] = self.centroid;
        [[s, 0.0, -s * mx], [0.0, s, -s * my], [0.0, 0.0, 1.0]]
    }

    /// The inverse transform as a 3x3 matrix.
    pub fn inverse_matrix(&self) -> Mat33 {
        let s_inv = 1.0 / self.scale;
        let [mx, my] = self.centroid;
        [[s_inv, 0.0, mx], [0.0, s_inv, my], [0.0, 0.0, 1.0]]
    }

    /// Apply the transform to a homogeneous point.
    pub fn apply(&self, p: &[f64; 3]) -> [f64; 3] {
        mat33_mul_vec3(&self.matrix(), p)
    }
}

/// Divide a homogeneous point by its last coordinate.
///
/// Fails with [`TwoViewError::DegenerateInput`] for points at infinity.
pub fn homogenize(p: &[f64; 3]) -> Result<[f64; 3], TwoViewError> {
    let w = p[2];
    if !w.is_finite() || w.abs() <= f64::EPSILON {
        return Err(TwoViewError::DegenerateInput("point at infinity"));
    }
    Ok([p[0] / w, p[1] / w, 1.0])
}

/// Normalize a homogeneous 2d point set with the default [`NormalizationMethod`].
///
/// See [`normalize_points_with`].
pub fn normalize_points(
    points: &[[f64; 3]],
) -> Result<(Vec<[f64; 3]>, NormalizationTransform), TwoViewError> {
    normalize_points_with(points, NormalizationMethod::default())
}

/// Isotropically normalize a homogeneous 2d point set.
///
/// The points are first re-homogenized, then translated so that their centroid is at the
/// origin and scaled so that their spread becomes `sqrt(2)`. The input is left untouched and
/// a new buffer is returned together with the applied transform.
///
/// # Arguments
///
/// * `points` - The homogeneous points `(x, y, w)`.
/// * `method` - How the spread of the points is measured.
///
/// # Errors
///
/// [`TwoViewError::DegenerateInput`] if the set is empty, contains a point at infinity or
/// all its points are coincident.
///
/// Example:
/// ```
/// use kornia_twoview::normalize::{normalize_points_with, NormalizationMethod};
///
/// let points = vec![[0.0, 0.0, 1.0], [2.0, 0.0, 1.0], [2.0, 2.0, 1.0], [0.0, 2.0, 1.0]];
/// let (normalized, transform) =
///     normalize_points_with(&points, NormalizationMethod::MeanDistance).unwrap();
/// assert_eq!(transform.centroid, [1.0, 1.0]);
/// assert!((normalized[2][0] - 1.0).abs() < 1e-12);
/// ```
pub fn normalize_points_with(
    points: &[[f64; 3]],
    method: NormalizationMethod,
) -> Result<(Vec<[f64; 3]>, NormalizationTransform), TwoViewError> {
    if points.is_empty() {
        return Err(TwoViewError::DegenerateInput("empty point set"));
    }

    let homogeneous = points
        .iter()
        .map(homogenize)
        .collect::<Result<Vec<_>, _>>()?;

    let n = homogeneous.len() as f64;
    let (mut mx, mut my) = (0.0, 0.0);
    for p in &homogeneous {
        mx += p[0];
        my += p[1];
    }
    mx /= n;
    my /= n;

    let spread = match method {
        NormalizationMethod::PooledStd => {
            let sum_sq = homogeneous
                .iter()
                .map(|p| (p[0] - mx).powi(2) + (p[1] - my).powi(2))
                .sum::<f64>();
            (sum_sq / (2.0 * n)).sqrt()
        }
        NormalizationMethod::MeanDistance => {
            homogeneous
                .iter()
                .map(|p| ((p[0] - mx).powi(2) + (p[1] - my).powi(2)).sqrt())
                .sum::<f64>()
                / n
        }
    };

    // coincident points, relative to the magnitude of the centroid
    let magnitude = mx.abs().max(my.abs()).max(1.0);
    if !spread.is_finite() || spread <= f64::EPSILON * magnitude {
        return Err(TwoViewError::DegenerateInput("coincident points"));
    }

    let transform = NormalizationTransform {
        scale: std::f64::consts::SQRT_2 / spread,
        centroid: [mx, my],
    };
    let normalized = homogeneous.iter().map(|p| transform.apply(p)).collect();

    Ok((normalized, transform))
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::affine::{affine_3pt, affine_from_correspondences, AFFINE_MIN_SAMPLES};
use crate::error::TwoViewError;
use crate::fundamental::{
    fundamental_8point, fundamental_from_correspondences, FUNDAMENTAL_MIN_SAMPLES,
};
use crate::homography::{
    homography_4pt, homography_from_correspondences, HOMOGRAPHY_MIN_SAMPLES,
};
use crate::linalg::Mat33;
use crate::ransac::{Estimator, ResidualMetric};
use crate::sampson::sampson_distance;
use crate::transfer::symmetric_transfer_error;

/// The family of two-view models a robust estimation fits.
///
/// Each variant is both the [`Estimator`] and the [`ResidualMetric`] of its family:
///
/// * [`ModelKind::Fundamental`] - normalized 8-point algorithm scored with the Sampson
///   distance, `x1^T * F * x2 = 0`.
/// * [`ModelKind::Homography`] - normalized 4-point DLT scored with the symmetric transfer
///   error, `x2 ~ H * x1`.
/// * [`ModelKind::Affine`] - gold-standard 3-point affine scored with the symmetric transfer
///   error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Fundamental matrix.
    #[default]
    Fundamental,
    /// Projective homography.
    Homography,
    /// Affine transform.
    Affine,
}

impl ModelKind {
    /// The name used on the command line and in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Fundamental => "fundamental",
            ModelKind::Homography => "homography",
            ModelKind::Affine => "affine",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = TwoViewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fundamental" | "f" => Ok(ModelKind::Fundamental),
            "homography" | "h" => Ok(ModelKind::Homography),
            "affine" | "a" => Ok(ModelKind::Affine),
            _ => Err(TwoViewError::InvalidParameter {
                name: "model",
                reason: format!("unknown model `{s}`, expected fundamental, homography or affine"),
            }),
        }
    }
}

impl Estimator for ModelKind {
    type Model = Mat33;

    fn min_sample_size(&self) -> usize {
        match self {
            ModelKind::Fundamental => FUNDAMENTAL_MIN_SAMPLES,
            ModelKind::Homography => HOMOGRAPHY_MIN_SAMPLES,
            ModelKind::Affine => AFFINE_MIN_SAMPLES,
        }
    }

    fn fit(&self, x1: &[[f64; 3]], x2: &[[f64; 3]]) -> Result<Mat33, TwoViewError> {
        match self {
            ModelKind::Fundamental => fundamental_8point(x1, x2),
            ModelKind::Homography => homography_4pt(x1, x2),
            ModelKind::Affine => affine_3pt(x1, x2),
        }
    }

    fn supports_overdetermined(&self) -> bool {
        true
    }

    fn fit_overdetermined(&self, x1: &[[f64; 3]], x2: &[[f64; 3]]) -> Result<Mat33, TwoViewError> {
        match self {
            ModelKind::Fundamental => fundamental_from_correspondences(x1, x2),
            ModelKind::Homography => homography_from_correspondences(x1, x2),
            ModelKind::Affine => affine_from_correspondences(x1, x2),
        }
    }
}

impl ResidualMetric for ModelKind {
    type Model = Mat33;

    fn residuals(
        &self,
        x1: &[[f64; 3]],
        x2: &[[f64; 3]],
        model: &Mat33,
    ) -> Result<Vec<f64>, TwoViewError> {
        match self {
            ModelKind::Fundamental => sampson_distance(x1, x2, model),
            ModelKind::Homography | ModelKind::Affine => symmetric_transfer_error(x1, x2, model),
        }
    }
}

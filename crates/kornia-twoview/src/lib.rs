#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! # Kornia Two-View
//!
//! Robust estimation of the geometric relation between two images from noisy point
//! correspondences contaminated by outliers.
//!
//! ## Key Features
//!
//! - **Normalized 8-point algorithm**: fundamental matrix with `x1^T * F * x2 = 0`
//! - **Homography and affine estimators**: `x2 ~ H * x1` from 4 or 3 correspondences
//! - **Residual metrics**: Sampson distance and symmetric transfer error
//! - **RANSAC**: generic over estimators and metrics, sequential or on the rayon pool
//!
//! ## Example: robust fundamental matrix
//!
//! ```rust
//! use kornia_twoview::{estimate_robust_model, RobustConfig};
//! use kornia_twoview::sampson::SampsonDistance;
//! use kornia_twoview::synthetic::SyntheticScene;
//!
//! // 70 correspondences seen by two cameras and 30 random matches
//! let scene = SyntheticScene::epipolar(70, 0).with_outliers(30, 100.0, &SampsonDistance, 1);
//!
//! let config = RobustConfig {
//!     max_iterations: 300,
//!     random_seed: Some(42),
//!     ..Default::default()
//! };
//! let result = estimate_robust_model(&scene.x1, &scene.x2, &config)?;
//!
//! assert_eq!(result.inliers, scene.inlier_mask());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Affine transform estimation.
pub mod affine;

/// Aligned point correspondences between two images.
pub mod correspondences;

/// Error types.
pub mod error;

/// Fundamental matrix estimation with the normalized 8-point algorithm.
pub mod fundamental;

/// Homography estimation with the normalized DLT.
pub mod homography;

/// Small dense 3x3 linear algebra helpers.
pub mod linalg;

/// Model families selectable at runtime.
pub mod model;

/// Isotropic normalization of point sets.
pub mod normalize;

/// Random sample consensus.
pub mod ransac;

/// Sampson distance for fundamental matrices.
pub mod sampson;

/// Synthetic scenes with known ground truth.
pub mod synthetic;

/// Symmetric transfer error for homographies.
pub mod transfer;

#[cfg(test)]
mod test_utils;

pub use correspondences::{points_from_rows, Correspondences};
pub use error::TwoViewError;
pub use linalg::Mat33;
pub use model::ModelKind;
pub use ransac::{Estimator, Ransac, RansacParams, RansacResult, ResidualMetric};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Configuration of [`estimate_robust_model`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobustConfig {
    /// The model family to fit.
    pub model: ModelKind,
    /// Correspondences drawn per iteration, the model's minimal sample when `None`.
    pub min_sample_size: Option<usize>,
    /// Largest inlier residual: Sampson distance for fundamental matrices, symmetric
    /// transfer error for homographies and affinities (squared pixels).
    pub inlier_threshold: f64,
    /// Fewest inliers a model needs to be accepted.
    pub min_inliers: usize,
    /// Hard cap on the number of iterations.
    pub max_iterations: usize,
    /// Desired probability of drawing an outlier-free sample, enables adaptive stopping.
    pub confidence: Option<f64>,
    /// Seed for reproducible sampling, drawn from the thread generator when `None`.
    pub random_seed: Option<u64>,
    /// Whether to refit the best model on all of its inliers.
    pub refine: bool,
    /// Whether to evaluate the iterations on the rayon thread pool.
    pub parallel: bool,
}

impl Default for RobustConfig {
    fn default() -> Self {
        let params = RansacParams::default();
        Self {
            model: ModelKind::default(),
            min_sample_size: params.min_sample_size,
            inlier_threshold: params.inlier_threshold,
            min_inliers: params.min_inliers,
            max_iterations: params.max_iterations,
            confidence: params.confidence,
            random_seed: Some(0),
            refine: params.refine,
            parallel: false,
        }
    }
}

impl RobustConfig {
    /// The driver parameters of this configuration.
    pub fn ransac_params(&self) -> RansacParams {
        RansacParams {
            min_sample_size: self.min_sample_size,
            inlier_threshold: self.inlier_threshold,
            min_inliers: self.min_inliers,
            max_iterations: self.max_iterations,
            confidence: self.confidence,
            refine: self.refine,
        }
    }
}

/// Robustly estimate the model relating two aligned sets of homogeneous points.
///
/// # Arguments
///
/// * `points1` - Homogeneous points `(x, y, w)` in image 1.
/// * `points2` - The corresponding homogeneous points in image 2.
/// * `config` - Model family and RANSAC configuration.
///
/// # Returns
///
/// The best model with its inlier mask, one entry per correspondence.
///
/// # Errors
///
/// * An invalid-argument error for mismatched inputs or out-of-range parameters.
/// * [`TwoViewError::InsufficientData`] for fewer correspondences than the sample size.
/// * [`TwoViewError::NoModelFound`] when no model reached `min_inliers`.
pub fn estimate_robust_model(
    points1: &[[f64; 3]],
    points2: &[[f64; 3]],
    config: &RobustConfig,
) -> Result<RansacResult<Mat33>, TwoViewError> {
    let data = Correspondences::new(points1.to_vec(), points2.to_vec())?;
    let ransac = Ransac::new(config.ransac_params());

    let mut rng = match config.random_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };

    log::debug!(
        "estimating a {} model from {} correspondences",
        config.model,
        data.len()
    );

    if config.parallel {
        ransac.execute_parallel(&data, &config.model, &config.model, &mut rng)
    } else {
        ransac.execute(&data, &config.model, &config.model, &mut rng)
    }
}

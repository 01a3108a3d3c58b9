//! Generic RANSAC consensus driver.
//!
//! The driver is parameterized by an [`Estimator`], which fits a model to a sample of
//! correspondences, and a [`ResidualMetric`], which scores a model against the whole set.

use rand::seq::index;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::correspondences::Correspondences;
use crate::error::TwoViewError;

// iterations whose samples are drawn ahead and evaluated together by `execute_parallel`
const PARALLEL_BATCH_SIZE: usize = 64;

/// Fits a model to a sample of correspondences.
pub trait Estimator {
    /// The fitted model.
    type Model;

    /// Number of correspondences of a minimal sample.
    fn min_sample_size(&self) -> usize;

    /// Fit a model to exactly [`Estimator::min_sample_size`] correspondences.
    fn fit(&self, x1: &[[f64; 3]], x2: &[[f64; 3]]) -> Result<Self::Model, TwoViewError>;

    /// Whether [`Estimator::fit_overdetermined`] is available.
    fn supports_overdetermined(&self) -> bool {
        false
    }

    /// Least-squares fit to more correspondences than the minimal sample.
    fn fit_overdetermined(
        &self,
        _x1: &[[f64; 3]],
        _x2: &[[f64; 3]],
    ) -> Result<Self::Model, TwoViewError> {
        Err(TwoViewError::InvalidParameter {
            name: "min_sample_size",
            reason: "the estimator has no overdetermined fit".to_string(),
        })
    }
}

/// Scores a model against a set of correspondences.
pub trait ResidualMetric {
    /// The scored model.
    type Model;

    /// One non-negative residual per correspondence. Undefined residuals are `f64::INFINITY`.
    fn residuals(
        &self,
        x1: &[[f64; 3]],
        x2: &[[f64; 3]],
        model: &Self::Model,
    ) -> Result<Vec<f64>, TwoViewError>;
}

/// Parameters of the RANSAC driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacParams {
    /// Correspondences drawn per iteration. Defaults to the estimator's minimal sample.
    pub min_sample_size: Option<usize>,
    /// Largest residual of an inlier, in the units of the residual metric.
    pub inlier_threshold: f64,
    /// Fewest inliers a model needs to be accepted.
    pub min_inliers: usize,
    /// Hard cap on the number of iterations.
    pub max_iterations: usize,
    /// Desired probability that an outlier-free sample was drawn, enables adaptive stopping.
    pub confidence: Option<f64>,
    /// Whether to refit the best model on all of its inliers.
    pub refine: bool,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            min_sample_size: None,
            inlier_threshold: 1.0,
            min_inliers: 15,
            max_iterations: 2000,
            confidence: None,
            refine: true,
        }
    }
}

impl RansacParams {
    /// Check the parameters against an estimator and resolve the sample size.
    pub fn validate<E: Estimator>(&self, estimator: &E) -> Result<usize, TwoViewError> {
        if !self.inlier_threshold.is_finite() || self.inlier_threshold < 0.0 {
            return Err(TwoViewError::InvalidParameter {
                name: "inlier_threshold",
                reason: format!("must be finite and non-negative, got {}", self.inlier_threshold),
            });
        }
        if self.max_iterations == 0 {
            return Err(TwoViewError::InvalidParameter {
                name: "max_iterations",
                reason: "must be positive".to_string(),
            });
        }
        if let Some(p) = self.confidence {
            if !(p > 0.0 && p < 1.0) {
                return Err(TwoViewError::InvalidParameter {
                    name: "confidence",
                    reason: format!("must lie in (0, 1), got {p}"),
                });
            }
        }

        let minimum = estimator.min_sample_size();
        let sample_size = self.min_sample_size.unwrap_or(minimum);
        if sample_size < minimum {
            return Err(TwoViewError::InvalidParameter {
                name: "min_sample_size",
                reason: format!("the estimator needs at least {minimum}, got {sample_size}"),
            });
        }
        if sample_size > minimum && !estimator.supports_overdetermined() {
            return Err(TwoViewError::InvalidParameter {
                name: "min_sample_size",
                reason: format!(
                    "the estimator only fits minimal samples of {minimum}, got {sample_size}"
                ),
            });
        }
        Ok(sample_size)
    }
}

/// Outcome of a successful RANSAC run.
#[derive(Debug, Clone, Serialize)]
pub struct RansacResult<T> {
    /// The best model, refined on its inliers when requested.
    pub model: T,
    /// Inlier mask of the best candidate, one entry per correspondence.
    pub inliers: Vec<bool>,
    /// Number of `true` entries in `inliers`.
    pub inlier_count: usize,
    /// Sum of the inlier residuals of the best candidate.
    pub score: f64,
    /// Iterations performed, including the ones whose sample was degenerate.
    pub num_iterations: usize,
    /// Zero-based iteration at which the best candidate was found.
    pub best_iteration: usize,
}

struct Candidate<T> {
    model: T,
    inliers: Vec<bool>,
    inlier_count: usize,
    score: f64,
    iteration: usize,
}

// best candidate so far and the termination bookkeeping
struct Consensus<T> {
    best: Option<Candidate<T>>,
    iterations: usize,
    most_inliers_seen: usize,
}

impl<T> Consensus<T> {
    fn new() -> Self {
        Self {
            best: None,
            iterations: 0,
            most_inliers_seen: 0,
        }
    }

    /// Record one finished iteration, returns `true` when the driver may stop.
    fn update(
        &mut self,
        candidate: Option<Candidate<T>>,
        params: &RansacParams,
        num_points: usize,
        sample_size: usize,
    ) -> bool {
        self.iterations += 1;

        if let Some(candidate) = candidate {
            self.most_inliers_seen = self.most_inliers_seen.max(candidate.inlier_count);
            let best_count = self.best.as_ref().map_or(0, |b| b.inlier_count);
            if candidate.inlier_count > best_count && candidate.inlier_count >= params.min_inliers
            {
                log::debug!(
                    "iteration {}: accepted model with {}/{} inliers",
                    candidate.iteration,
                    candidate.inlier_count,
                    num_points
                );
                self.best = Some(candidate);
            } else {
                log::trace!(
                    "iteration {}: rejected model with {} inliers (best {})",
                    candidate.iteration,
                    candidate.inlier_count,
                    best_count
                );
            }
        }

        if self.iterations >= params.max_iterations {
            return true;
        }

        match (params.confidence, &self.best) {
            (Some(confidence), Some(best)) => {
                let ratio = best.inlier_count as f64 / num_points as f64;
                let bound = adaptive_iteration_bound(confidence, ratio, sample_size);
                if bound <= self.iterations as f64 {
                    log::debug!(
                        "early termination after {} iterations, inlier ratio {:.3}",
                        self.iterations,
                        ratio
                    );
                    return true;
                }
                false
            }
            _ => false,
        }
    }
}

/// Number of iterations needed to draw an outlier-free sample with the given confidence.
///
/// Computes `ceil(ln(1 - p) / ln(1 - w^s))` for inlier ratio `w` and sample size `s`.
/// Returns `f64::INFINITY` when `w^s` vanishes numerically and `0` when all points are
/// inliers.
pub fn adaptive_iteration_bound(confidence: f64, inlier_ratio: f64, sample_size: usize) -> f64 {
    let all_inliers = inlier_ratio.clamp(0.0, 1.0).powi(sample_size as i32);
    if all_inliers >= 1.0 {
        return 0.0;
    }
    let denominator = (-all_inliers).ln_1p();
    if denominator >= 0.0 {
        return f64::INFINITY;
    }
    ((1.0 - confidence).ln() / denominator).ceil()
}

/// RANSAC consensus driver.
///
/// Example:
/// ```
/// use kornia_twoview::fundamental::FundamentalEstimator;
/// use kornia_twoview::ransac::{Ransac, RansacParams};
/// use kornia_twoview::sampson::SampsonDistance;
/// use kornia_twoview::synthetic::SyntheticScene;
/// use rand::{rngs::StdRng, SeedableRng};
///
/// let scene = SyntheticScene::epipolar(50, 0);
/// let ransac = Ransac::new(RansacParams::default());
/// let mut rng = StdRng::seed_from_u64(0);
/// let result = ransac
///     .execute(
///         &scene.correspondences(),
///         &FundamentalEstimator::default(),
///         &SampsonDistance,
///         &mut rng,
///     )
///     .unwrap();
/// assert_eq!(result.inlier_count, 50);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Ransac {
    /// Parameters of the driver.
    pub params: RansacParams,
}

impl Ransac {
    /// Create a driver from its parameters.
    pub fn new(params: RansacParams) -> Self {
        Self { params }
    }

    /// Run RANSAC sequentially.
    ///
    /// # Arguments
    ///
    /// * `data` - The correspondence set.
    /// * `estimator` - Fits candidate models to random samples.
    /// * `metric` - Scores candidates against the whole set.
    /// * `rng` - Source of the random samples, owned by the caller.
    ///
    /// # Errors
    ///
    /// * [`TwoViewError::InvalidParameter`] for out-of-range parameters.
    /// * [`TwoViewError::InsufficientData`] when the set is smaller than the sample size.
    /// * [`TwoViewError::NoModelFound`] when no candidate reached `min_inliers`.
    pub fn execute<E, M, R>(
        &self,
        data: &Correspondences,
        estimator: &E,
        metric: &M,
        rng: &mut R,
    ) -> Result<RansacResult<E::Model>, TwoViewError>
    where
        E: Estimator,
        M: ResidualMetric<Model = E::Model>,
        R: Rng + ?Sized,
    {
        let sample_size = self.prepare(data, estimator)?;
        let num_points = data.len();

        let mut consensus = Consensus::new();
        loop {
            let sample = index::sample(&mut *rng, num_points, sample_size).into_vec();
            let candidate = self.evaluate(data, estimator, metric, &sample, consensus.iterations)?;
            if consensus.update(candidate, &self.params, num_points, sample_size) {
                break;
            }
        }

        self.finish(data, estimator, consensus)
    }

    /// Run RANSAC with the iterations evaluated on the rayon thread pool.
    ///
    /// Samples are drawn from `rng` in iteration order, in batches, and the candidates are
    /// reduced in iteration order, so the result is the one [`Ransac::execute`] returns for
    /// the same generator state. The generator may advance further than in the sequential run.
    pub fn execute_parallel<E, M, R>(
        &self,
        data: &Correspondences,
        estimator: &E,
        metric: &M,
        rng: &mut R,
    ) -> Result<RansacResult<E::Model>, TwoViewError>
    where
        E: Estimator + Sync,
        E::Model: Send,
        M: ResidualMetric<Model = E::Model> + Sync,
        R: Rng + ?Sized,
    {
        let sample_size = self.prepare(data, estimator)?;
        let num_points = data.len();

        let mut consensus = Consensus::new();
        'batches: while consensus.iterations < self.params.max_iterations {
            let first = consensus.iterations;
            let batch_len = PARALLEL_BATCH_SIZE.min(self.params.max_iterations - first);
            let samples = (0..batch_len)
                .map(|_| index::sample(&mut *rng, num_points, sample_size).into_vec())
                .collect::<Vec<_>>();

            let candidates = samples
                .par_iter()
                .enumerate()
                .map(|(k, sample)| self.evaluate(data, estimator, metric, sample, first + k))
                .collect::<Vec<_>>();

            for candidate in candidates {
                if consensus.update(candidate?, &self.params, num_points, sample_size) {
                    break 'batches;
                }
            }
        }

        self.finish(data, estimator, consensus)
    }

    fn prepare<E: Estimator>(
        &self,
        data: &Correspondences,
        estimator: &E,
    ) -> Result<usize, TwoViewError> {
        let sample_size = self.params.validate(estimator)?;
        if data.len() < sample_size {
            return Err(TwoViewError::InsufficientData {
                required: sample_size,
                actual: data.len(),
            });
        }
        log::debug!(
            "RANSAC on {} correspondences: sample size {}, threshold {}, max iterations {}",
            data.len(),
            sample_size,
            self.params.inlier_threshold,
            self.params.max_iterations
        );
        Ok(sample_size)
    }

    // fit one sample and score it, `Ok(None)` for a recoverable failure
    fn evaluate<E, M>(
        &self,
        data: &Correspondences,
        estimator: &E,
        metric: &M,
        sample: &[usize],
        iteration: usize,
    ) -> Result<Option<Candidate<E::Model>>, TwoViewError>
    where
        E: Estimator,
        M: ResidualMetric<Model = E::Model>,
    {
        let (x1, x2) = data.select(sample.iter().copied());
        let fitted = if sample.len() == estimator.min_sample_size() {
            estimator.fit(&x1, &x2)
        } else {
            estimator.fit_overdetermined(&x1, &x2)
        };
        let model = match fitted {
            Ok(model) => model,
            Err(e) if e.is_recoverable() => {
                log::trace!("iteration {iteration}: discarded sample, {e}");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let residuals = match metric.residuals(data.points1(), data.points2(), &model) {
            Ok(residuals) => residuals,
            Err(e) if e.is_recoverable() => {
                log::trace!("iteration {iteration}: scoring failed, {e}");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let threshold = self.params.inlier_threshold;
        let mut score = 0.0;
        let inliers = residuals
            .iter()
            .map(|&r| {
                // NaN and infinity compare false
                let inlier = r <= threshold;
                if inlier {
                    score += r;
                }
                inlier
            })
            .collect::<Vec<_>>();
        let inlier_count = inliers.iter().filter(|&&b| b).count();

        Ok(Some(Candidate {
            model,
            inliers,
            inlier_count,
            score,
            iteration,
        }))
    }

    fn finish<E: Estimator>(
        &self,
        data: &Correspondences,
        estimator: &E,
        consensus: Consensus<E::Model>,
    ) -> Result<RansacResult<E::Model>, TwoViewError> {
        let Consensus {
            best,
            iterations,
            most_inliers_seen,
        } = consensus;

        let Some(best) = best else {
            log::debug!("no model reached {} inliers", self.params.min_inliers);
            return Err(TwoViewError::NoModelFound {
                iterations,
                best_inliers: most_inliers_seen,
                min_inliers: self.params.min_inliers,
            });
        };

        let model = if self.params.refine && estimator.supports_overdetermined() {
            let (x1, x2) = data.select_mask(&best.inliers);
            match estimator.fit_overdetermined(&x1, &x2) {
                Ok(refined) => refined,
                Err(TwoViewError::NumericalFailure(what)) => {
                    log::debug!("refinement failed: {what}");
                    return Err(TwoViewError::NoModelFound {
                        iterations,
                        best_inliers: best.inlier_count,
                        min_inliers: self.params.min_inliers,
                    });
                }
                Err(e) => {
                    log::warn!(
                        "refinement on {} inliers failed ({e}), keeping the sample model",
                        x1.len()
                    );
                    best.model
                }
            }
        } else {
            best.model
        };

        log::debug!(
            "RANSAC finished after {} iterations: {} inliers found at iteration {}",
            iterations,
            best.inlier_count,
            best.iteration
        );

        Ok(RansacResult {
            model,
            inliers: best.inliers,
            inlier_count: best.inlier_count,
            score: best.score,
            num_iterations: iterations,
            best_iteration: best.iteration,
        })
    }
}

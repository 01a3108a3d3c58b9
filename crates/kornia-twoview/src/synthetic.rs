//! Deterministic synthetic correspondences for tests, benchmarks and demos.
//!
//! The generators are seeded explicitly so that every scene is reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::correspondences::Correspondences;
use crate::linalg::{
    mat33_mul, mat33_mul_vec3, mat33_transpose, normalize_mat33_scale, Mat33,
};
use crate::ransac::ResidualMetric;

/// Image width used to draw random pixels.
pub const IMAGE_WIDTH: f64 = 640.0;
/// Image height used to draw random pixels.
pub const IMAGE_HEIGHT: f64 = 480.0;

/// Random pairs drawn per requested outlier before [`SyntheticScene::with_outliers`] gives up.
pub const MAX_DRAWS_PER_OUTLIER: usize = 1000;

/// A set of correspondences related by a known model, optionally contaminated.
///
/// The first `num_inliers` correspondences follow `model`; the remaining ones are outliers.
#[derive(Debug, Clone)]
pub struct SyntheticScene {
    /// Points in image 1.
    pub x1: Vec<[f64; 3]>,
    /// Points in image 2.
    pub x2: Vec<[f64; 3]>,
    /// Ground-truth model relating the inliers, scaled so that `model[2][2] = 1`.
    pub model: Mat33,
    /// Number of leading correspondences that follow the model.
    pub num_inliers: usize,
}

impl SyntheticScene {
    /// Two pinhole views of random 3d points.
    ///
    /// Camera 1 is `K [I | 0]`, camera 2 is `K [R | t]`. The model is the fundamental matrix
    /// with `x1^T * F * x2 = 0`.
    pub fn epipolar(n: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let k = intrinsics();
        let r = rotation_yx(0.2, -0.1);
        let t = [-1.0, 0.15, 0.3];

        let mut x1 = Vec::with_capacity(n);
        let mut x2 = Vec::with_capacity(n);
        for _ in 0..n {
            let p = [
                rng.random_range(-2.0..2.0),
                rng.random_range(-1.5..1.5),
                rng.random_range(4.0..8.0),
            ];
            let pc = mat33_mul_vec3(&r, &p);
            let pc = [pc[0] + t[0], pc[1] + t[1], pc[2] + t[2]];
            x1.push(project(&k, &p));
            x2.push(project(&k, &pc));
        }

        // x2^T * K^-T [t]x R K^-1 * x1 = 0, transposed to the x1^T * F * x2 convention
        let k_inv = intrinsics_inverse();
        let f21 = mat33_mul(
            &mat33_mul(&mat33_transpose(&k_inv), &mat33_mul(&skew(&t), &r)),
            &k_inv,
        );
        let model = scaled(&mat33_transpose(&f21));

        Self {
            x1,
            x2,
            model,
            num_inliers: n,
        }
    }

    /// Random pixels in image 1 mapped into image 2 by the projective transform `h`.
    pub fn planar(h: &Mat33, n: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut x1 = Vec::with_capacity(n);
        let mut x2 = Vec::with_capacity(n);
        for _ in 0..n {
            let p = random_pixel(&mut rng);
            let q = mat33_mul_vec3(h, &p);
            x1.push(p);
            x2.push([q[0] / q[2], q[1] / q[2], 1.0]);
        }
        Self {
            x1,
            x2,
            model: scaled(h),
            num_inliers: n,
        }
    }

    /// Add uniform noise in `[-sigma, sigma]` pixels to the points of image 2.
    pub fn with_noise(mut self, sigma: f64, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        for p in self.x2.iter_mut() {
            p[0] += rng.random_range(-sigma..=sigma);
            p[1] += rng.random_range(-sigma..=sigma);
        }
        self
    }

    /// Append `count` random correspondences whose residual under the ground-truth model,
    /// measured with `metric`, exceeds `min_residual`.
    ///
    /// At most `(count + 1) * MAX_DRAWS_PER_OUTLIER` pairs are drawn. When `min_residual` is
    /// rarely or never exceeded inside the image, fewer than `count` outliers are appended;
    /// [`SyntheticScene::len`] reports what was actually added.
    pub fn with_outliers<M>(mut self, count: usize, min_residual: f64, metric: &M, seed: u64) -> Self
    where
        M: ResidualMetric<Model = Mat33>,
    {
        let mut rng = StdRng::seed_from_u64(seed);
        let max_draws = count.saturating_add(1).saturating_mul(MAX_DRAWS_PER_OUTLIER);
        let mut added = 0;
        for _ in 0..max_draws {
            if added == count {
                break;
            }
            let p1 = random_pixel(&mut rng);
            let p2 = random_pixel(&mut rng);
            let far = metric
                .residuals(&[p1], &[p2], &self.model)
                .map(|r| r[0] > min_residual)
                .unwrap_or(false);
            if far {
                self.x1.push(p1);
                self.x2.push(p2);
                added += 1;
            }
        }
        if added < count {
            log::warn!(
                "only {added} of {count} outliers exceed a residual of {min_residual} after {max_draws} draws"
            );
        }
        self
    }

    /// Number of correspondences.
    pub fn len(&self) -> usize {
        self.x1.len()
    }

    /// Whether the scene has no correspondences.
    pub fn is_empty(&self) -> bool {
        self.x1.is_empty()
    }

    /// The ground-truth inlier mask.
    pub fn inlier_mask(&self) -> Vec<bool> {
        (0..self.len()).map(|i| i < self.num_inliers).collect()
    }

    /// The scene as a correspondence set.
    pub fn correspondences(&self) -> Correspondences {
        let mut c = Correspondences::default();
        for (p1, p2) in self.x1.iter().zip(self.x2.iter()) {
            c.push(*p1, *p2);
        }
        c
    }
}

fn intrinsics() -> Mat33 {
    [[500.0, 0.0, 320.0], [0.0, 500.0, 240.0], [0.0, 0.0, 1.0]]
}

fn intrinsics_inverse() -> Mat33 {
    [
        [1.0 / 500.0, 0.0, -320.0 / 500.0],
        [0.0, 1.0 / 500.0, -240.0 / 500.0],
        [0.0, 0.0, 1.0],
    ]
}

// R = Ry(yaw) * Rx(pitch)
fn rotation_yx(yaw: f64, pitch: f64) -> Mat33 {
    let (cy, sy) = (yaw.cos(), yaw.sin());
    let (cp, sp) = (pitch.cos(), pitch.sin());
    let ry = [[cy, 0.0, sy], [0.0, 1.0, 0.0], [-sy, 0.0, cy]];
    let rx = [[1.0, 0.0, 0.0], [0.0, cp, -sp], [0.0, sp, cp]];
    mat33_mul(&ry, &rx)
}

fn skew(t: &[f64; 3]) -> Mat33 {
    [[0.0, -t[2], t[1]], [t[2], 0.0, -t[0]], [-t[1], t[0], 0.0]]
}

fn project(k: &Mat33, p: &[f64; 3]) -> [f64; 3] {
    let q = mat33_mul_vec3(k, p);
    [q[0] / q[2], q[1] / q[2], 1.0]
}

fn random_pixel(rng: &mut StdRng) -> [f64; 3] {
    [
        rng.random_range(0.0..IMAGE_WIDTH),
        rng.random_range(0.0..IMAGE_HEIGHT),
        1.0,
    ]
}

fn scaled(m: &Mat33) -> Mat33 {
    // ground-truth models are built with a non-zero bottom-right entry
    normalize_mat33_scale(m).unwrap_or(*m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampson::SampsonDistance;

    #[test]
    fn test_epipolar_scene_satisfies_constraint() {
        let scene = SyntheticScene::epipolar(30, 0);
        for (p1, p2) in scene.x1.iter().zip(scene.x2.iter()) {
            let fx2 = mat33_mul_vec3(&scene.model, p2);
            let e = p1[0] * fx2[0] + p1[1] * fx2[1] + p1[2] * fx2[2];
            assert!(e.abs() < 1e-9);
        }
        assert_eq!(scene.model[2][2], 1.0);
    }

    #[test]
    fn test_scene_is_reproducible() {
        let a = SyntheticScene::epipolar(10, 42);
        let b = SyntheticScene::epipolar(10, 42);
        assert_eq!(a.x1, b.x1);
        assert_eq!(a.x2, b.x2);
    }

    #[test]
    fn test_outliers_are_far() -> Result<(), crate::TwoViewError> {
        let scene = SyntheticScene::epipolar(10, 1).with_outliers(5, 50.0, &SampsonDistance, 2);
        assert_eq!(scene.len(), 15);
        assert_eq!(scene.num_inliers, 10);
        let r = SampsonDistance.residuals(&scene.x1[10..], &scene.x2[10..], &scene.model)?;
        assert!(r.iter().all(|&v| v > 50.0));
        Ok(())
    }

    #[test]
    fn test_outliers_unreachable_residual() {
        let scene =
            SyntheticScene::epipolar(10, 1).with_outliers(3, f64::INFINITY, &SampsonDistance, 2);
        assert_eq!(scene.len(), 10);
        assert_eq!(scene.num_inliers, 10);
        assert_eq!(scene.inlier_mask(), vec![true; 10]);
    }
}

//! End-to-end tests of `estimate_robust_model` on synthetic scenes with known ground truth.

use approx::assert_abs_diff_eq;
use kornia_twoview::linalg::{det_mat33, frobenius_norm_mat33};
use kornia_twoview::sampson::SampsonDistance;
use kornia_twoview::synthetic::SyntheticScene;
use kornia_twoview::transfer::SymmetricTransferError;
use kornia_twoview::{
    estimate_robust_model, points_from_rows, Mat33, ModelKind, RobustConfig, TwoViewError,
};

fn assert_proportional(a: &Mat33, b: &Mat33, epsilon: f64) {
    let (na, nb) = (frobenius_norm_mat33(a), frobenius_norm_mat33(b));
    let dot: f64 = (0..9).map(|k| a[k / 3][k % 3] * b[k / 3][k % 3]).sum();
    for i in 0..3 {
        for j in 0..3 {
            assert_abs_diff_eq!(
                a[i][j] / na,
                dot.signum() * b[i][j] / nb,
                epsilon = epsilon
            );
        }
    }
}

#[test]
fn exact_correspondences_are_all_inliers() -> Result<(), TwoViewError> {
    let scene = SyntheticScene::epipolar(60, 10);
    let config = RobustConfig {
        max_iterations: 100,
        ..Default::default()
    };
    let result = estimate_robust_model(&scene.x1, &scene.x2, &config)?;

    assert_eq!(result.inliers, vec![true; 60]);
    assert_eq!(result.inlier_count, 60);
    assert_proportional(&result.model, &scene.model, 1e-6);
    assert_eq!(result.model[2][2], 1.0);

    let unit = result.model.map(|row| row.map(|v| v / frobenius_norm_mat33(&result.model)));
    assert!(det_mat33(&unit).abs() < 1e-9);
    Ok(())
}

#[test]
fn outliers_are_rejected() -> Result<(), TwoViewError> {
    let scene = SyntheticScene::epipolar(70, 21).with_outliers(30, 100.0, &SampsonDistance, 22);
    let config = RobustConfig {
        inlier_threshold: 1.0,
        max_iterations: 300,
        random_seed: Some(42),
        ..Default::default()
    };
    let result = estimate_robust_model(&scene.x1, &scene.x2, &config)?;

    assert_eq!(result.inliers, scene.inlier_mask());
    assert_eq!(result.inlier_count, 70);
    assert!(result.best_iteration < result.num_iterations);
    assert_proportional(&result.model, &scene.model, 1e-6);
    Ok(())
}

#[test]
fn noisy_inliers_are_kept() -> Result<(), TwoViewError> {
    let scene = SyntheticScene::epipolar(70, 3)
        .with_noise(0.1, 4)
        .with_outliers(30, 400.0, &SampsonDistance, 5);
    let config = RobustConfig {
        max_iterations: 500,
        random_seed: Some(7),
        ..Default::default()
    };
    let result = estimate_robust_model(&scene.x1, &scene.x2, &config)?;

    assert!(result.inlier_count >= 50);
    assert!(result.inliers[70..].iter().all(|&inlier| !inlier));
    assert!(result.score >= 0.0);
    Ok(())
}

#[test]
fn adaptive_stopping_ends_early() -> Result<(), TwoViewError> {
    let scene = SyntheticScene::epipolar(70, 21).with_outliers(30, 100.0, &SampsonDistance, 22);
    let config = RobustConfig {
        max_iterations: 2000,
        confidence: Some(0.99),
        random_seed: Some(42),
        ..Default::default()
    };
    let result = estimate_robust_model(&scene.x1, &scene.x2, &config)?;

    assert!(result.num_iterations < 2000);
    assert_eq!(result.inliers, scene.inlier_mask());
    Ok(())
}

#[test]
fn too_few_correspondences() {
    let scene = SyntheticScene::epipolar(5, 0);
    let err = estimate_robust_model(&scene.x1, &scene.x2, &RobustConfig::default()).unwrap_err();
    assert_eq!(
        err,
        TwoViewError::InsufficientData {
            required: 8,
            actual: 5
        }
    );
}

#[test]
fn coincident_correspondences_do_not_crash() {
    let x = vec![[120.0, 80.0, 1.0]; 8];
    let config = RobustConfig {
        min_inliers: 8,
        max_iterations: 50,
        ..Default::default()
    };
    let err = estimate_robust_model(&x, &x, &config).unwrap_err();
    assert!(matches!(
        err,
        TwoViewError::NoModelFound { iterations: 50, .. }
    ));
}

#[test]
fn invalid_configuration() {
    let scene = SyntheticScene::epipolar(20, 0);
    let config = RobustConfig {
        confidence: Some(1.5),
        ..Default::default()
    };
    let err = estimate_robust_model(&scene.x1, &scene.x2, &config).unwrap_err();
    assert!(err.is_invalid_argument());
}

#[test]
fn robust_homography() -> Result<(), TwoViewError> {
    let h_true = [[0.95, -0.08, 14.0], [0.06, 1.02, -9.0], [2e-4, -1e-4, 1.0]];
    let scene =
        SyntheticScene::planar(&h_true, 80, 31).with_outliers(20, 100.0, &SymmetricTransferError, 32);
    let config = RobustConfig {
        model: ModelKind::Homography,
        max_iterations: 200,
        ..Default::default()
    };
    let result = estimate_robust_model(&scene.x1, &scene.x2, &config)?;

    assert_eq!(result.inliers, scene.inlier_mask());
    assert_proportional(&result.model, &scene.model, 1e-8);
    Ok(())
}

#[test]
fn robust_affine() -> Result<(), TwoViewError> {
    let a_true = [[1.1, 0.2, -30.0], [-0.1, 0.9, 12.0], [0.0, 0.0, 1.0]];
    let scene =
        SyntheticScene::planar(&a_true, 50, 41).with_outliers(25, 100.0, &SymmetricTransferError, 42);
    let config = RobustConfig {
        model: ModelKind::Affine,
        max_iterations: 200,
        ..Default::default()
    };
    let result = estimate_robust_model(&scene.x1, &scene.x2, &config)?;

    assert_eq!(result.inliers, scene.inlier_mask());
    for i in 0..3 {
        for j in 0..3 {
            assert_abs_diff_eq!(result.model[i][j], a_true[i][j], epsilon = 1e-8);
        }
    }
    Ok(())
}

#[test]
fn parallel_matches_sequential() -> Result<(), TwoViewError> {
    let scene = SyntheticScene::epipolar(70, 50)
        .with_noise(0.2, 51)
        .with_outliers(30, 100.0, &SampsonDistance, 52);
    let sequential = RobustConfig {
        max_iterations: 400,
        confidence: Some(0.999),
        random_seed: Some(3),
        ..Default::default()
    };
    let parallel = RobustConfig {
        parallel: true,
        ..sequential.clone()
    };

    let a = estimate_robust_model(&scene.x1, &scene.x2, &sequential)?;
    let b = estimate_robust_model(&scene.x1, &scene.x2, &parallel)?;
    assert_eq!(a.inliers, b.inliers);
    assert_eq!(a.num_iterations, b.num_iterations);
    assert_eq!(a.best_iteration, b.best_iteration);
    assert_eq!(a.model, b.model);
    Ok(())
}

#[test]
fn rows_are_ingested() -> Result<(), TwoViewError> {
    let scene = SyntheticScene::epipolar(30, 60);
    let rows1 = scene
        .x1
        .iter()
        .map(|p| vec![p[0], p[1]])
        .collect::<Vec<_>>();
    // image 2 given with an arbitrary homogeneous scale
    let rows2 = scene
        .x2
        .iter()
        .map(|p| vec![3.0 * p[0], 3.0 * p[1], 3.0])
        .collect::<Vec<_>>();
    let x1 = points_from_rows(&rows1)?;
    let x2 = points_from_rows(&rows2)?;

    let result = estimate_robust_model(&x1, &x2, &RobustConfig::default())?;
    assert_eq!(result.inlier_count, 30);

    let bad = points_from_rows(&[vec![1.0]]).unwrap_err();
    assert_eq!(bad, TwoViewError::InvalidPointDimension { index: 0, dim: 1 });
    Ok(())
}

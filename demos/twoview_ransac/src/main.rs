use argh::FromArgs;
use serde::Deserialize;
use std::path::PathBuf;

use kornia_twoview::synthetic::SyntheticScene;
use kornia_twoview::{estimate_robust_model, points_from_rows, ModelKind, RobustConfig};

#[derive(FromArgs)]
/// Robustly estimate the geometry between two views from point correspondences
struct Args {
    /// path to a JSON file with `points1` and `points2` rows, a synthetic scene when missing
    #[argh(option)]
    input: Option<PathBuf>,

    /// path to a JSON configuration file
    #[argh(option)]
    config: Option<PathBuf>,

    /// model to fit: fundamental, homography or affine
    #[argh(option)]
    model: Option<ModelKind>,

    /// inlier threshold
    #[argh(option)]
    threshold: Option<f64>,

    /// maximum number of RANSAC iterations
    #[argh(option)]
    max_iterations: Option<usize>,

    /// random seed
    #[argh(option)]
    seed: Option<u64>,

    /// evaluate the iterations in parallel
    #[argh(switch)]
    parallel: bool,

    /// number of synthetic correspondences
    #[argh(option, default = "100")]
    num_points: usize,

    /// fraction of synthetic outliers
    #[argh(option, default = "0.3")]
    outlier_ratio: f64,
}

#[derive(Deserialize)]
struct CorrespondenceFile {
    points1: Vec<Vec<f64>>,
    points2: Vec<Vec<f64>>,
}

fn synthetic_scene(model: ModelKind, num_points: usize, outlier_ratio: f64) -> SyntheticScene {
    let num_outliers = (num_points as f64 * outlier_ratio.clamp(0.0, 1.0)).round() as usize;
    let num_inliers = num_points - num_outliers;
    let scene = match model {
        ModelKind::Fundamental => SyntheticScene::epipolar(num_inliers, 0),
        ModelKind::Homography => SyntheticScene::planar(
            &[[0.95, -0.08, 14.0], [0.06, 1.02, -9.0], [2e-4, -1e-4, 1.0]],
            num_inliers,
            0,
        ),
        ModelKind::Affine => SyntheticScene::planar(
            &[[1.1, 0.2, -30.0], [-0.1, 0.9, 12.0], [0.0, 0.0, 1.0]],
            num_inliers,
            0,
        ),
    };
    scene.with_noise(0.2, 1).with_outliers(num_outliers, 100.0, &model, 2)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let mut config: RobustConfig = match &args.config {
        Some(path) => serde_json::from_reader(std::fs::File::open(path)?)?,
        None => RobustConfig::default(),
    };
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(threshold) = args.threshold {
        config.inlier_threshold = threshold;
    }
    if let Some(max_iterations) = args.max_iterations {
        config.max_iterations = max_iterations;
    }
    if args.seed.is_some() {
        config.random_seed = args.seed;
    }
    config.parallel |= args.parallel;

    let (points1, points2) = match &args.input {
        Some(path) => {
            let file: CorrespondenceFile = serde_json::from_reader(std::fs::File::open(path)?)?;
            (
                points_from_rows(&file.points1)?,
                points_from_rows(&file.points2)?,
            )
        }
        None => {
            let scene = synthetic_scene(config.model, args.num_points, args.outlier_ratio);
            log::info!(
                "synthetic {} scene: {} inliers, {} outliers",
                config.model,
                scene.num_inliers,
                scene.len() - scene.num_inliers
            );
            (scene.x1, scene.x2)
        }
    };

    let result = estimate_robust_model(&points1, &points2, &config)?;
    log::info!(
        "found {}/{} inliers after {} iterations",
        result.inlier_count,
        points1.len(),
        result.num_iterations
    );

    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}

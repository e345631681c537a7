mod common;

use common::synthetic_image::rectangle_u8;
use contour_tracker::camera::CameraIntrinsics;
use contour_tracker::features::{
    KeypointFeature, KeypointMatch, KeypointSettings, SilhouetteEdgeFeature, SilhouettePoint,
    SilhouetteSettings,
};
use contour_tracker::optimizer::{
    FeatureContext, FeatureResidualBlock, FeatureTracker, OptimizationStatus, OptimizerParams,
    PoseOptimizer,
};
use contour_tracker::se3;
use contour_tracker::Result;
use nalgebra::{DMatrix, DVector, Isometry3, Point3, Vector6};
use std::f64::consts::FRAC_PI_2;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// `r = A · log(pose) − b`: affine in the left increment around the identity.
struct AffineTwist {
    a: DMatrix<f64>,
    b: DVector<f64>,
    converged: bool,
}

impl FeatureTracker for AffineTwist {
    fn name(&self) -> &str {
        "affine"
    }
    fn weight(&self) -> f64 {
        1.0
    }
    fn is_valid(&self) -> bool {
        true
    }
    fn compute_block(&mut self, ctx: &FeatureContext<'_>) -> Result<FeatureResidualBlock> {
        let twist = se3::log(ctx.pose);
        let r = &self.a * DVector::from_column_slice(twist.as_slice()) - &self.b;
        self.converged = r.norm() < 1e-9;
        FeatureResidualBlock::new(r, DVector::from_element(self.a.nrows(), 1.0), self.a.clone())
    }
    fn has_converged(&self) -> bool {
        self.converged
    }
}

#[test]
fn affine_residual_is_solved_in_one_iteration() {
    init_logger();
    #[rustfmt::skip]
    let a = DMatrix::from_row_slice(8, 6, &[
        2.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.5, 0.0, 0.0, 0.0,
        0.0, 0.0, 3.0, 0.0, 0.0, 0.0,
        0.0, 0.0, 0.0, 1.0, 0.0, 0.2,
        0.0, 0.0, 0.0, 0.0, 1.5, 0.0,
        0.0, 0.0, 0.0, 0.0, 0.0, 1.0,
        1.0, 1.0, 0.0, 0.0, 0.0, 0.0,
        0.0, 0.0, 0.0, 1.0, 1.0, 1.0,
    ]);
    let target = Vector6::new(0.05, -0.02, 0.1, 0.03, -0.01, 0.02);
    let b = &a * DVector::from_column_slice(target.as_slice());
    let mut features: Vec<Box<dyn FeatureTracker>> = vec![Box::new(AffineTwist { a, b, converged: false })];

    let opt = PoseOptimizer::new(OptimizerParams {
        initial_mu: 0.0,
        ..Default::default()
    })
    .unwrap();
    let cam = CameraIntrinsics::new(500.0, 500.0, 320.0, 240.0);
    let report = opt.optimize(&Isometry3::identity(), &mut features, &cam).unwrap();

    assert_eq!(report.status, OptimizationStatus::Converged);
    assert_eq!(report.iterations, 1);
    assert!(report.cost_history[1] < 1e-20, "cost {:?}", report.cost_history);
    let err = se3::log(&report.pose) - target;
    assert!(err.norm() < 1e-10);
}

fn object_points() -> Vec<Point3<f64>> {
    vec![
        Point3::new(-0.1, -0.08, 0.0),
        Point3::new(0.1, -0.08, 0.03),
        Point3::new(0.1, 0.08, 0.0),
        Point3::new(-0.1, 0.08, -0.04),
        Point3::new(0.0, 0.0, 0.05),
        Point3::new(0.05, -0.03, -0.02),
        Point3::new(-0.06, 0.02, 0.01),
        Point3::new(0.02, 0.06, -0.03),
    ]
}

fn keypoint_feature(points: &[Point3<f64>], truth: &Isometry3<f64>, cam: &CameraIntrinsics) -> Box<dyn FeatureTracker> {
    let settings = KeypointSettings {
        min_num_points: 3,
        min_robust_threshold: 1e6,
        convergence_pixel_threshold: 1e-9,
        ..Default::default()
    };
    let mut f = KeypointFeature::new(settings).unwrap();
    f.set_matches(
        points
            .iter()
            .map(|&object_point| KeypointMatch {
                object_point,
                observed: cam.project(&(truth * object_point)).unwrap(),
            })
            .collect(),
    );
    Box::new(f)
}

#[test]
fn damped_iterations_decrease_cost_monotonically() {
    init_logger();
    let cam = CameraIntrinsics::new(400.0, 400.0, 160.0, 120.0);
    let truth = se3::exp(&Vector6::new(0.03, -0.02, 1.1, 0.05, -0.04, 0.03));
    let start = Isometry3::translation(0.0, 0.0, 1.0);
    let mut features = vec![keypoint_feature(&object_points(), &truth, &cam)];
    let params = OptimizerParams {
        initial_mu: 1.0,
        mu_iter_factor: 0.5,
        max_iterations: 15,
        cost_tolerance: 0.0,
        ..Default::default()
    };
    let report = PoseOptimizer::new(params)
        .unwrap()
        .optimize(&start, &mut features, &cam)
        .unwrap();

    let costs = &report.cost_history;
    assert!(costs.len() >= 3);
    for pair in costs.windows(2) {
        assert!(pair[1] <= pair[0] * (1.0 + 1e-9), "cost went up: {costs:?}");
    }
    assert!(costs[costs.len() - 1] < 1e-6 * costs[0]);
}

#[test]
fn parallel_and_sequential_evaluation_agree() {
    init_logger();
    let cam = CameraIntrinsics::new(400.0, 400.0, 160.0, 120.0);
    let truth = se3::exp(&Vector6::new(-0.02, 0.01, 0.95, -0.03, 0.02, 0.01));
    let start = Isometry3::translation(0.0, 0.0, 1.0);
    let pts = object_points();
    let run = |parallel_min_features: usize| {
        let mut features = vec![
            keypoint_feature(&pts[..4], &truth, &cam),
            keypoint_feature(&pts[4..], &truth, &cam),
        ];
        let params = OptimizerParams {
            parallel_min_features,
            ..Default::default()
        };
        PoseOptimizer::new(params)
            .unwrap()
            .optimize(&start, &mut features, &cam)
            .unwrap()
    };
    let seq = run(0);
    let par = run(1);
    assert_eq!(seq.pose, par.pose);
    assert_eq!(seq.cost_history, par.cost_history);
    assert_eq!(seq.features.len(), 2);
}

/// Fronto-parallel square plate, 0.2 × 0.15 in the object frame.
fn plate_silhouette() -> Vec<SilhouettePoint> {
    let mut pts = Vec::new();
    for k in -4..=4 {
        let y = k as f64 * 0.0125;
        for x in [-0.1, 0.1] {
            pts.push(SilhouettePoint {
                object_point: Point3::new(x, y, 0.0),
                normal_angle: 0.0,
            });
        }
        let x = k as f64 * 0.02;
        for y in [-0.075, 0.075] {
            pts.push(SilhouettePoint {
                object_point: Point3::new(x, y, 0.0),
                normal_angle: FRAC_PI_2,
            });
        }
    }
    pts
}

#[test]
fn silhouette_edges_recover_plate_translation() {
    init_logger();
    // Plate edges project onto integer pixel coordinates.
    let cam = CameraIntrinsics::new(200.0, 200.0, 80.0, 60.0);
    let (w, h) = (160usize, 120usize);
    let previous_pose = Isometry3::translation(0.0, 0.0, 1.0);
    let current_pose = Isometry3::translation(0.01, 0.005, 1.0);
    let previous = rectangle_u8(w, h, 60.0, 45.0, 100.0, 75.0);
    let current = rectangle_u8(w, h, 62.0, 46.0, 102.0, 76.0);

    let settings = SilhouetteSettings {
        convergence_pixel_threshold: 0.01,
        ..Default::default()
    };
    let mut silhouette = SilhouetteEdgeFeature::new(settings).unwrap();
    silhouette.extract(&previous, &plate_silhouette(), &previous_pose, &cam, None);
    assert_eq!(silhouette.sites().len(), 36);
    let stats = silhouette.track(&current, &cam);
    assert_eq!(stats.counts.outlier, 0);
    assert_eq!(silhouette.num_observations(), 36);

    let mut features: Vec<Box<dyn FeatureTracker>> = vec![Box::new(silhouette)];
    let report = PoseOptimizer::default()
        .optimize(&previous_pose, &mut features, &cam)
        .unwrap();
    let final_cost = report.final_cost().unwrap();
    assert!(final_cost < 1e-6 * report.cost_history[0], "costs {:?}", report.cost_history);
    let t = report.pose.translation.vector - current_pose.translation.vector;
    assert!(t.norm() < 2e-3, "translation error {t:?}");
}

use contour_tracker::camera::CameraIntrinsics;
use contour_tracker::contour::{ContourSettings, NurbsContour};
use contour_tracker::features::{KeypointFeature, KeypointMatch, KeypointSettings};
use contour_tracker::geometry::Point2;
use contour_tracker::image::GrayImage;
use contour_tracker::me::MovingEdgeSettings;
use contour_tracker::optimizer::{FeatureTracker, OptimizerParams};
use contour_tracker::se3;
use contour_tracker::session::TrackingSession;
use nalgebra::{Isometry3, Point3, Vector6};
use std::f64::consts::PI;

const WIDTH: usize = 320;
const HEIGHT: usize = 240;
const RADIUS: f64 = 50.0;

/// Bright disc on a dark background, edge pixels shaded by coverage.
fn disc(cx: f64, cy: f64) -> GrayImage {
    let mut img = GrayImage::filled(WIDTH, HEIGHT, 40);
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            let d = ((x as f64 - cx).powi(2) + (y as f64 - cy).powi(2)).sqrt();
            let coverage = (RADIUS - d + 0.5).clamp(0.0, 1.0);
            img.set(x, y, (40.0 + 160.0 * coverage).round() as u8);
        }
    }
    img
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> contour_tracker::Result<()> {
    // Contour: a 300° arc of a disc drifting right and down.
    let (cx, cy) = (140.0, 110.0);
    let points: Vec<Point2> = (0..10)
        .map(|k| {
            let t = k as f64 / 9.0 * (5.0 * PI / 3.0);
            Point2::new(cx + RADIUS * t.cos(), cy + RADIUS * t.sin())
        })
        .collect();
    let mut contour = NurbsContour::new(MovingEdgeSettings::default(), ContourSettings::default())?;
    let init = contour.initialize(&disc(cx, cy), &points)?;
    println!("init: {} sites, {} good", init.sites, init.stats.counts.good);
    for frame in 1..=5 {
        let shift = 1.5 * frame as f64;
        let report = contour.track(&disc(cx + shift, cy + 0.5 * shift))?;
        println!(
            "frame {frame}: good={} outlier={} refitted={} resampled={} mean_move={:.2}px",
            report.stats.counts.good,
            report.stats.counts.outlier,
            report.refitted,
            report.resampled,
            report.stats.mean_displacement
        );
    }

    // Pose: keypoints seen from a slightly different viewpoint.
    let camera = CameraIntrinsics::new(300.0, 300.0, WIDTH as f64 / 2.0, HEIGHT as f64 / 2.0);
    let truth = se3::exp(&Vector6::new(0.02, -0.01, 1.05, 0.03, -0.02, 0.01));
    let matches = [
        (-0.1, -0.1, 0.0),
        (0.1, -0.1, 0.02),
        (0.1, 0.1, 0.0),
        (-0.1, 0.1, -0.03),
        (0.0, 0.0, 0.05),
        (0.04, -0.06, 0.01),
    ]
    .iter()
    .filter_map(|&(x, y, z)| {
        let object_point = Point3::new(x, y, z);
        camera
            .project(&(truth * object_point))
            .map(|observed| KeypointMatch { object_point, observed })
    })
    .collect();
    let mut keypoints = KeypointFeature::new(KeypointSettings::default())?;
    keypoints.set_matches(matches);

    let mut session = TrackingSession::new(camera, HEIGHT, WIDTH, OptimizerParams::default())?
        .with_pose(Isometry3::translation(0.0, 0.0, 1.0));
    let mut features: Vec<Box<dyn FeatureTracker>> = vec![Box::new(keypoints)];
    let report = session.track_frame(&mut features)?;
    println!("{}", report.summary());
    Ok(())
}

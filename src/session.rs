//! Per-object tracking state carried from frame to frame.
//!
//! A [`TrackingSession`] owns the current pose `cMo`, the camera and the
//! optimiser. Feature trackers are owned by the caller, which prepares them
//! for the new frame (site extraction, depth association, keypoint matching)
//! and then hands them to [`TrackingSession::track_frame`].

use crate::camera::CameraIntrinsics;
use crate::diagnostics::{FrameReport, InputDescriptor, TimingBreakdown};
use crate::error::{ensure_config, Result};
use crate::optimizer::{FeatureTracker, OptimizationStatus, OptimizerParams, PoseOptimizer};
use nalgebra::Isometry3;
use std::time::Instant;

#[derive(Clone, Debug)]
pub struct TrackingSession {
    pose: Isometry3<f64>,
    camera: CameraIntrinsics,
    width: usize,
    height: usize,
    optimizer: PoseOptimizer,
    frame_index: usize,
}

fn check_camera(camera: &CameraIntrinsics, height: usize, width: usize) -> Result<()> {
    camera.ensure_distortion_free()?;
    camera.validate()?;
    ensure_config(height > 0 && width > 0, || {
        format!("image size must be non-zero, got {width}x{height}")
    })
}

impl TrackingSession {
    pub fn new(camera: CameraIntrinsics, height: usize, width: usize, params: OptimizerParams) -> Result<Self> {
        check_camera(&camera, height, width)?;
        Ok(Self {
            pose: Isometry3::identity(),
            camera,
            width,
            height,
            optimizer: PoseOptimizer::new(params)?,
            frame_index: 0,
        })
    }

    pub fn with_pose(mut self, pose: Isometry3<f64>) -> Self {
        self.pose = pose;
        self
    }

    pub fn pose(&self) -> &Isometry3<f64> {
        &self.pose
    }

    /// Reset the pose, e.g. after a re-initialisation.
    pub fn set_pose(&mut self, pose: Isometry3<f64>) {
        self.pose = pose;
    }

    pub fn camera(&self) -> &CameraIntrinsics {
        &self.camera
    }

    /// `(width, height)` of the frames this session expects.
    pub fn image_size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn optimizer(&self) -> &PoseOptimizer {
        &self.optimizer
    }

    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    /// Replace the camera. Distorted models and empty images are rejected and
    /// leave the session untouched.
    pub fn set_camera(&mut self, camera: CameraIntrinsics, height: usize, width: usize) -> Result<()> {
        check_camera(&camera, height, width)?;
        self.camera = camera;
        self.height = height;
        self.width = width;
        Ok(())
    }

    pub fn set_optimizer_params(&mut self, params: OptimizerParams) -> Result<()> {
        self.optimizer = PoseOptimizer::new(params)?;
        Ok(())
    }

    /// Estimate the pose of the current frame from the prepared features.
    pub fn track_frame(&mut self, features: &mut [Box<dyn FeatureTracker>]) -> Result<FrameReport> {
        let start = Instant::now();
        let optimization = self.optimizer.optimize(&self.pose, features, &self.camera)?;
        let optimize_ms = start.elapsed().as_secs_f64() * 1000.0;

        let pose_updated = optimization.status != OptimizationStatus::NoValidFeatures;
        if pose_updated {
            self.pose = optimization.pose;
        }
        let frame_index = self.frame_index;
        self.frame_index += 1;

        let mut timings = TimingBreakdown::with_total(start.elapsed().as_secs_f64() * 1000.0);
        timings.push("optimize", optimize_ms);
        log::debug!(
            "TrackingSession::track_frame {} -> {:?} after {} iterations",
            frame_index,
            optimization.status,
            optimization.iterations
        );
        Ok(FrameReport {
            frame_index,
            input: InputDescriptor {
                width: self.width,
                height: self.height,
            },
            pose_updated,
            optimization,
            timings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{KeypointFeature, KeypointMatch, KeypointSettings};
    use nalgebra::Point3;

    fn camera() -> CameraIntrinsics {
        CameraIntrinsics::new(400.0, 400.0, 160.0, 120.0)
    }

    fn keypoints(truth: &Isometry3<f64>) -> Box<dyn FeatureTracker> {
        let cam = camera();
        let matches = [
            (-0.1, -0.1, 0.0),
            (0.1, -0.1, 0.05),
            (0.1, 0.1, 0.0),
            (-0.1, 0.1, -0.05),
            (0.0, 0.05, 0.02),
            (0.05, 0.0, -0.02),
        ]
        .iter()
        .map(|&(x, y, z)| {
            let object_point = Point3::new(x, y, z);
            KeypointMatch {
                object_point,
                observed: cam.project(&(truth * object_point)).unwrap(),
            }
        })
        .collect();
        let mut f = KeypointFeature::new(KeypointSettings {
            convergence_pixel_threshold: 1e-6,
            ..Default::default()
        })
        .unwrap();
        f.set_matches(matches);
        Box::new(f)
    }

    #[test]
    fn rejects_distortion_and_empty_images() {
        let mut s = TrackingSession::new(camera(), 240, 320, OptimizerParams::default()).unwrap();
        let distorted = CameraIntrinsics::with_distortion(400.0, 400.0, 160.0, 120.0, 0.1, -0.1);
        assert!(s.set_camera(distorted, 240, 320).unwrap_err().is_config());
        assert!(s.set_camera(camera(), 0, 320).unwrap_err().is_config());
        assert!(s.set_camera(camera(), 240, 0).unwrap_err().is_config());
        assert_eq!(s.image_size(), (320, 240));
        s.set_camera(CameraIntrinsics::new(500.0, 500.0, 320.0, 240.0), 480, 640).unwrap();
        assert_eq!(s.image_size(), (640, 480));
    }

    #[test]
    fn track_frame_moves_pose_towards_truth() {
        let truth = Isometry3::translation(0.02, -0.01, 1.05);
        let mut s = TrackingSession::new(camera(), 240, 320, OptimizerParams::default())
            .unwrap()
            .with_pose(Isometry3::translation(0.0, 0.0, 1.0));
        let mut features = vec![keypoints(&truth)];
        let report = s.track_frame(&mut features).unwrap();
        assert!(report.pose_updated);
        assert_eq!(report.frame_index, 0);
        assert_eq!(s.frame_index(), 1);
        let err = (s.pose().translation.vector - truth.translation.vector).norm();
        assert!(err < 1e-6, "translation error {err}");
    }

    #[test]
    fn invalid_features_keep_pose() {
        let start = Isometry3::translation(0.0, 0.0, 1.0);
        let mut s = TrackingSession::new(camera(), 240, 320, OptimizerParams::default())
            .unwrap()
            .with_pose(start);
        let mut features: Vec<Box<dyn FeatureTracker>> =
            vec![Box::new(KeypointFeature::new(KeypointSettings::default()).unwrap())];
        let report = s.track_frame(&mut features).unwrap();
        assert!(!report.pose_updated);
        assert_eq!(report.optimization.status, OptimizationStatus::NoValidFeatures);
        assert_eq!(*s.pose(), start);

        let reset = Isometry3::translation(0.0, 0.1, 2.0);
        s.set_pose(reset);
        assert_eq!(*s.pose(), reset);
        assert!(s
            .set_optimizer_params(OptimizerParams { gain: 0.0, ..Default::default() })
            .unwrap_err()
            .is_config());
        s.set_optimizer_params(OptimizerParams { max_iterations: 3, ..Default::default() })
            .unwrap();
        assert_eq!(s.optimizer().params().max_iterations, 3);
    }
}

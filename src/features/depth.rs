//! Dense depth feature: point-to-plane distances between model surface
//! points and the scene points back-projected from a depth map.

use crate::camera::{directional_jacobian, CameraIntrinsics};
use crate::error::{ensure_config, Result};
use crate::image::ImageF32;
use crate::optimizer::robust::tukey_weights;
use crate::optimizer::{FeatureContext, FeatureResidualBlock, FeatureTracker};
use nalgebra::{DMatrix, DVector, Isometry3, Point3, RowVector6, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DepthSettings {
    pub weight: f64,
    /// Spacing (pixels) of the sampling grid; one point per cell.
    pub step: usize,
    pub use_mask: bool,
    /// Pixels whose mask confidence is below this value are skipped.
    pub min_mask_confidence: f64,
    /// Relative change of the RMS residual under which the feature has
    /// converged.
    pub convergence_threshold: f64,
    /// Floor of the robust scale, in metres.
    pub min_robust_threshold: f64,
    pub min_num_points: usize,
}

impl Default for DepthSettings {
    fn default() -> Self {
        Self {
            weight: 1.0,
            step: 8,
            use_mask: false,
            min_mask_confidence: 0.0,
            convergence_threshold: 1e-3,
            min_robust_threshold: 0.005,
            min_num_points: 6,
        }
    }
}

impl DepthSettings {
    pub fn validate(&self) -> Result<()> {
        ensure_config(self.weight >= 0.0, || format!("depth weight must be non-negative, got {}", self.weight))?;
        ensure_config(self.step >= 1, || "depth step must be at least 1".into())?;
        ensure_config((0.0..=1.0).contains(&self.min_mask_confidence), || {
            format!("depth minMaskConfidence must lie in [0, 1], got {}", self.min_mask_confidence)
        })?;
        ensure_config(self.convergence_threshold >= 0.0, || {
            format!("depth convergenceThreshold must be non-negative, got {}", self.convergence_threshold)
        })?;
        ensure_config(self.min_robust_threshold >= 0.0, || {
            format!("depth minRobustThreshold must be non-negative, got {}", self.min_robust_threshold)
        })?;
        ensure_config(self.min_num_points >= 1, || "depth minNumPoints must be at least 1".into())
    }
}

/// A model surface sample in the object frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfacePoint {
    pub object_point: Point3<f64>,
    /// Outward unit normal.
    pub object_normal: Vector3<f64>,
}

#[derive(Clone, Copy, Debug)]
struct DepthObservation {
    surface: SurfacePoint,
    /// Scene point in the camera frame.
    observed: Point3<f64>,
}

#[derive(Clone, Debug)]
pub struct DepthFeature {
    settings: DepthSettings,
    observations: Vec<DepthObservation>,
    previous_rms: Option<f64>,
    converged: bool,
}

impl DepthFeature {
    pub fn new(settings: DepthSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            observations: Vec::new(),
            previous_rms: None,
            converged: false,
        })
    }

    pub fn settings(&self) -> &DepthSettings {
        &self.settings
    }

    pub fn num_observations(&self) -> usize {
        self.observations.len()
    }

    /// Associate model samples with the depth map for this frame.
    ///
    /// Each surface point is projected with `pose`; at most one point is
    /// kept per `step × step` cell, and only where the depth map holds a
    /// valid sample (and, with `use_mask`, the mask is confident enough).
    pub fn set_frame(
        &mut self,
        depth: &ImageF32,
        model: &[SurfacePoint],
        mask: Option<&ImageF32>,
        pose: &Isometry3<f64>,
        camera: &CameraIntrinsics,
    ) {
        let step = self.settings.step;
        let mut taken = HashSet::new();
        self.observations.clear();
        for surface in model {
            let Some(px) = camera.project(&(pose * surface.object_point)) else {
                continue;
            };
            let (u, v) = (px.x.round(), px.y.round());
            if u < 0.0 || v < 0.0 {
                continue;
            }
            let (u, v) = (u as usize, v as usize);
            if self.settings.use_mask {
                let confident = mask.is_some_and(|m| {
                    u < m.w && v < m.h && m.get(u, v) as f64 >= self.settings.min_mask_confidence
                });
                if !confident {
                    continue;
                }
            }
            let Some(z) = depth.depth_at(u, v) else {
                continue;
            };
            if !taken.insert((u / step, v / step)) {
                continue;
            }
            self.observations.push(DepthObservation {
                surface: *surface,
                observed: camera.back_project(u as f64, v as f64, z),
            });
        }
        self.previous_rms = None;
        self.converged = false;
        log::debug!(
            "DepthFeature::set_frame kept {} of {} surface points",
            self.observations.len(),
            model.len()
        );
    }
}

impl FeatureTracker for DepthFeature {
    fn name(&self) -> &str {
        "depth"
    }

    fn weight(&self) -> f64 {
        self.settings.weight
    }

    fn is_valid(&self) -> bool {
        self.observations.len() >= self.settings.min_num_points
    }

    fn start_optimization(&mut self) {
        self.previous_rms = None;
        self.converged = false;
    }

    fn compute_block(&mut self, ctx: &FeatureContext<'_>) -> Result<FeatureResidualBlock> {
        let n = self.observations.len();
        let mut residuals = DVector::zeros(n);
        let mut jacobian = DMatrix::zeros(n, 6);
        for (k, obs) in self.observations.iter().enumerate() {
            let x = ctx.pose * obs.surface.object_point;
            let normal = ctx.pose.rotation * obs.surface.object_normal;
            let offset = x - obs.observed;
            residuals[k] = normal.dot(&offset);
            // the normal turns with the pose: add (n × (X − Xs))·ω
            let turn = normal.cross(&offset);
            let row = directional_jacobian(&x, &normal)
                + RowVector6::new(0.0, 0.0, 0.0, turn.x, turn.y, turn.z);
            jacobian.row_mut(k).copy_from(&row);
        }
        let weights = DVector::from_vec(tukey_weights(residuals.as_slice(), self.settings.min_robust_threshold));
        let block = FeatureResidualBlock::new(residuals, weights, jacobian)?;

        let rms = block.rms();
        self.converged = match self.previous_rms {
            Some(prev) if prev > 0.0 => (prev - rms).abs() / prev < self.settings.convergence_threshold,
            Some(_) => true,
            None => false,
        };
        self.previous_rms = Some(rms);
        Ok(block)
    }

    fn has_converged(&self) -> bool {
        self.converged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::se3;
    use approx::assert_relative_eq;
    use nalgebra::Vector6;

    /// Fronto-parallel plane `z = 0` in the object frame, sampled on a grid.
    fn plane_model() -> Vec<SurfacePoint> {
        let mut pts = Vec::new();
        for iy in -10..=10 {
            for ix in -10..=10 {
                pts.push(SurfacePoint {
                    object_point: Point3::new(ix as f64 * 0.01, iy as f64 * 0.01, 0.0),
                    object_normal: Vector3::new(0.0, 0.0, -1.0),
                });
            }
        }
        pts
    }

    fn flat_depth(w: usize, h: usize, z: f32) -> ImageF32 {
        ImageF32::from_vec(w, h, vec![z; w * h]).unwrap()
    }

    #[test]
    fn residual_is_plane_offset() {
        let cam = CameraIntrinsics::new(300.0, 300.0, 80.0, 60.0);
        let depth = flat_depth(160, 120, 1.0);
        let pose = Isometry3::translation(0.0, 0.0, 0.9);
        let mut f = DepthFeature::new(DepthSettings { step: 4, ..Default::default() }).unwrap();
        f.set_frame(&depth, &plane_model(), None, &pose, &cam);
        assert!(f.is_valid());
        let block = f
            .compute_block(&FeatureContext { pose: &pose, camera: &cam, iteration: 0 })
            .unwrap();
        // n = (0, 0, -1): n·(X − Xs) = −(0.9 − 1.0)
        assert!(block.residuals.iter().all(|r| (r - 0.1).abs() < 1e-9));
        assert!(!f.has_converged());
    }

    #[test]
    fn step_keeps_one_point_per_cell() {
        let cam = CameraIntrinsics::new(300.0, 300.0, 80.0, 60.0);
        let depth = flat_depth(160, 120, 1.0);
        let pose = Isometry3::translation(0.0, 0.0, 1.0);
        let mut dense = DepthFeature::new(DepthSettings { step: 1, ..Default::default() }).unwrap();
        dense.set_frame(&depth, &plane_model(), None, &pose, &cam);
        let mut sparse = DepthFeature::new(DepthSettings { step: 16, ..Default::default() }).unwrap();
        sparse.set_frame(&depth, &plane_model(), None, &pose, &cam);
        assert_eq!(dense.num_observations(), 441);
        assert!(sparse.num_observations() < 100);
        assert!(DepthFeature::new(DepthSettings { step: 0, ..Default::default() }).is_err());
    }

    #[test]
    fn mask_filters_points() {
        let cam = CameraIntrinsics::new(300.0, 300.0, 80.0, 60.0);
        let depth = flat_depth(160, 120, 1.0);
        let mask = flat_depth(160, 120, 0.2);
        let pose = Isometry3::translation(0.0, 0.0, 1.0);
        let settings = DepthSettings {
            use_mask: true,
            min_mask_confidence: 0.5,
            ..Default::default()
        };
        let mut f = DepthFeature::new(settings).unwrap();
        f.set_frame(&depth, &plane_model(), Some(&mask), &pose, &cam);
        assert_eq!(f.num_observations(), 0);
        assert!(!f.is_valid());
    }

    #[test]
    fn jacobian_matches_finite_differences() {
        let cam = CameraIntrinsics::new(300.0, 300.0, 80.0, 60.0);
        let depth = flat_depth(160, 120, 1.0);
        let pose = se3::exp(&Vector6::new(0.01, -0.02, 0.95, 0.05, -0.03, 0.02));
        let mut f = DepthFeature::new(DepthSettings { step: 8, ..Default::default() }).unwrap();
        f.set_frame(&depth, &plane_model(), None, &pose, &cam);
        let ctx = FeatureContext { pose: &pose, camera: &cam, iteration: 0 };
        let block = f.compute_block(&ctx).unwrap();
        let h = 1e-7;
        for k in 0..6 {
            let mut d = Vector6::zeros();
            d[k] = h;
            let moved = se3::left_update(&pose, &d);
            let other = f
                .compute_block(&FeatureContext { pose: &moved, camera: &cam, iteration: 1 })
                .unwrap();
            for r in 0..block.len() {
                let numeric = (other.residuals[r] - block.residuals[r]) / h;
                assert_relative_eq!(block.jacobian[(r, k)], numeric, epsilon = 1e-5);
            }
        }
    }
}

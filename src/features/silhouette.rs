//! Silhouette edges tracked with moving-edge sites.
//!
//! Model silhouette points are projected with the pose of the previous
//! frame, where their reference contrast is measured. Tracking moves each
//! site along its normal into the current frame; every inlier site then
//! constrains the projection of its model point to the tangent line through
//! the found edge (a point-to-line distance in normalised coordinates).

use crate::camera::{projection_jacobian, CameraIntrinsics};
use crate::error::{ensure_config, Result};
use crate::image::{ImageF32, ImageView};
use crate::me::{EdgeTracker, MovingEdgeSettings, SearchMode, Site, TrackStats};
use crate::optimizer::robust::tukey_weights;
use crate::optimizer::{FeatureContext, FeatureResidualBlock, FeatureTracker};
use nalgebra::{DMatrix, DVector, Isometry3, Point3, Vector2};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SilhouetteSettings {
    pub weight: f64,
    /// Copied into the moving-edge settings.
    pub num_candidates: usize,
    /// Distance to the edge line (pixels) under which a point has converged.
    pub convergence_pixel_threshold: f64,
    /// Fraction of converged points needed for the feature to converge.
    pub convergence_ratio: f64,
    pub use_mask: bool,
    pub min_mask_confidence: f64,
    /// Floor of the robust scale, in pixels.
    pub min_robust_threshold: f64,
    /// Below this many tracked edges the feature sits the frame out.
    pub min_num_points: usize,
    pub moving_edge: MovingEdgeSettings,
}

impl Default for SilhouetteSettings {
    fn default() -> Self {
        Self {
            weight: 0.5,
            num_candidates: 1,
            convergence_pixel_threshold: 3.0,
            convergence_ratio: 0.99,
            use_mask: false,
            min_mask_confidence: 0.0,
            min_robust_threshold: 0.5,
            min_num_points: 6,
            moving_edge: MovingEdgeSettings::default(),
        }
    }
}

impl SilhouetteSettings {
    pub fn validate(&self) -> Result<()> {
        ensure_config(self.weight >= 0.0, || {
            format!("silhouette weight must be non-negative, got {}", self.weight)
        })?;
        ensure_config(self.num_candidates >= 1, || "numCandidates must be at least 1".into())?;
        ensure_config(self.convergence_pixel_threshold >= 0.0, || {
            format!(
                "convergencePixelThreshold must be non-negative, got {}",
                self.convergence_pixel_threshold
            )
        })?;
        ensure_config((0.0..=1.0).contains(&self.convergence_ratio), || {
            format!("convergenceRatio must lie in [0, 1], got {}", self.convergence_ratio)
        })?;
        ensure_config((0.0..=1.0).contains(&self.min_mask_confidence), || {
            format!("minMaskConfidence must lie in [0, 1], got {}", self.min_mask_confidence)
        })?;
        ensure_config(self.min_robust_threshold >= 0.0, || {
            format!("minRobustThreshold must be non-negative, got {}", self.min_robust_threshold)
        })?;
        ensure_config(self.min_num_points >= 1, || "silhouette minNumPoints must be at least 1".into())?;
        self.moving_edge.validate()
    }

    fn edge_settings(&self) -> MovingEdgeSettings {
        MovingEdgeSettings {
            num_candidates: self.num_candidates,
            ..self.moving_edge.clone()
        }
    }
}

/// A point on the model silhouette with the image normal angle it had when
/// it was extracted (same convention as [`Site::alpha`]).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SilhouettePoint {
    pub object_point: Point3<f64>,
    pub normal_angle: f64,
}

#[derive(Clone, Copy, Debug)]
struct EdgeObservation {
    object_point: Point3<f64>,
    /// Unit line normal in normalised image coordinates.
    normal: Vector2<f64>,
    /// Signed distance of the line to the origin.
    rho: f64,
}

#[derive(Debug)]
pub struct SilhouetteEdgeFeature {
    settings: SilhouetteSettings,
    tracker: EdgeTracker,
    points: Vec<Point3<f64>>,
    sites: Vec<Site>,
    observations: Vec<EdgeObservation>,
    converged: bool,
}

impl SilhouetteEdgeFeature {
    pub fn new(settings: SilhouetteSettings) -> Result<Self> {
        settings.validate()?;
        let tracker = EdgeTracker::new(settings.edge_settings())?;
        Ok(Self {
            settings,
            tracker,
            points: Vec::new(),
            sites: Vec::new(),
            observations: Vec::new(),
            converged: false,
        })
    }

    pub fn settings(&self) -> &SilhouetteSettings {
        &self.settings
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn num_observations(&self) -> usize {
        self.observations.len()
    }

    /// Place one site per silhouette point projected with `pose` and record
    /// its reference contrast in `previous`.
    pub fn extract<I>(
        &mut self,
        previous: &I,
        points: &[SilhouettePoint],
        pose: &Isometry3<f64>,
        camera: &CameraIntrinsics,
        mask: Option<&ImageF32>,
    ) where
        I: ImageView<Pixel = u8> + Sync,
    {
        let mask_sign = self.tracker.settings().mask_sign;
        let margin = self.tracker.settings().strip as f64;
        let (w, h) = (previous.width(), previous.height());
        self.points.clear();
        self.sites.clear();
        self.observations.clear();
        for sp in points {
            let Some(px) = camera.project(&(pose * sp.object_point)) else {
                continue;
            };
            let mut site = Site::new(px.y, px.x, sp.normal_angle);
            site.mask_sign = mask_sign;
            if !site.is_inside(w, h, margin) || !self.mask_accepts(mask, &site) {
                continue;
            }
            self.points.push(sp.object_point);
            self.sites.push(site);
        }
        self.tracker.init_reference(previous, &mut self.sites);
        log::debug!(
            "SilhouetteEdgeFeature::extract kept {} of {} silhouette points",
            self.sites.len(),
            points.len()
        );
    }

    /// Track the extracted sites into `image` and rebuild the edge lines.
    pub fn track<I>(&mut self, image: &I, camera: &CameraIntrinsics) -> TrackStats
    where
        I: ImageView<Pixel = u8> + Sync,
    {
        let stats = self.tracker.track(image, &mut self.sites, SearchMode::Tracking);
        self.observations = self
            .sites
            .iter()
            .zip(&self.points)
            .filter(|(site, _)| site.is_inlier())
            .map(|(site, &object_point)| {
                let (sin_a, cos_a) = site.normal();
                let normal = Vector2::new(cos_a * camera.px, sin_a * camera.py).normalize();
                let edge = camera.to_normalized(site.j, site.i);
                EdgeObservation {
                    object_point,
                    normal,
                    rho: normal.x * edge.x + normal.y * edge.y,
                }
            })
            .collect();
        self.converged = false;
        stats
    }

    fn mask_accepts(&self, mask: Option<&ImageF32>, site: &Site) -> bool {
        if !self.settings.use_mask {
            return true;
        }
        let Some(mask) = mask else {
            return false;
        };
        let (x, y) = (site.j.round() as usize, site.i.round() as usize);
        x < mask.w && y < mask.h && mask.get(x, y) as f64 >= self.settings.min_mask_confidence
    }
}

impl FeatureTracker for SilhouetteEdgeFeature {
    fn name(&self) -> &str {
        "silhouette"
    }

    fn weight(&self) -> f64 {
        self.settings.weight
    }

    fn is_valid(&self) -> bool {
        self.observations.len() >= self.settings.min_num_points
    }

    fn compute_block(&mut self, ctx: &FeatureContext<'_>) -> Result<FeatureResidualBlock> {
        let n = self.observations.len();
        let mut residuals = DVector::zeros(n);
        let mut visible = vec![false; n];
        let mut jacobian = DMatrix::zeros(n, 6);
        for (k, obs) in self.observations.iter().enumerate() {
            let p = ctx.pose * obs.object_point;
            let Some(j) = projection_jacobian(&p) else {
                continue;
            };
            residuals[k] = obs.normal.x * p.x / p.z + obs.normal.y * p.y / p.z - obs.rho;
            jacobian
                .row_mut(k)
                .copy_from(&(j.row(0) * obs.normal.x + j.row(1) * obs.normal.y));
            visible[k] = true;
        }

        let focal = ctx.camera.mean_focal();
        let robust = tukey_weights(residuals.as_slice(), self.settings.min_robust_threshold / focal);
        let weights = DVector::from_iterator(
            n,
            robust.iter().zip(&visible).map(|(&w, &v)| if v { w } else { 0.0 }),
        );
        let block = FeatureResidualBlock::new(residuals, weights, jacobian)?;

        let close = block
            .residuals
            .iter()
            .zip(&visible)
            .filter(|(r, &v)| v && r.abs() * focal < self.settings.convergence_pixel_threshold)
            .count();
        self.converged = n > 0 && close as f64 >= self.settings.convergence_ratio * n as f64;
        Ok(block)
    }

    fn has_converged(&self) -> bool {
        self.converged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::GrayImage;
    use crate::me::SiteState;

    fn vertical_edge(col: usize) -> GrayImage {
        let mut img = GrayImage::filled(160, 120, 40);
        for y in 0..120 {
            img.set(col, y, 120);
            for x in col + 1..160 {
                img.set(x, y, 200);
            }
        }
        img
    }

    fn vertical_bar() -> Vec<SilhouettePoint> {
        (-4..=4)
            .map(|k| SilhouettePoint {
                object_point: Point3::new(0.0, k as f64 * 0.05, 0.0),
                normal_angle: 0.0,
            })
            .collect()
    }

    #[test]
    fn shifted_edge_gives_line_residuals() {
        let cam = CameraIntrinsics::new(200.0, 200.0, 80.0, 60.0);
        let pose = Isometry3::translation(0.0, 0.0, 1.0);
        let mut f = SilhouetteEdgeFeature::new(SilhouetteSettings::default()).unwrap();
        f.extract(&vertical_edge(80), &vertical_bar(), &pose, &cam, None);
        assert_eq!(f.sites().len(), 9);
        assert!(!f.is_valid());

        let stats = f.track(&vertical_edge(84), &cam);
        assert_eq!(stats.counts.outlier, 0);
        assert!(f.sites().iter().all(|s| (s.j - 84.0).abs() < 1e-6 && s.state != SiteState::Outlier));
        assert!(f.is_valid());

        let block = f
            .compute_block(&FeatureContext { pose: &pose, camera: &cam, iteration: 0 })
            .unwrap();
        assert!(block.residuals.iter().all(|r| (r + 0.02).abs() < 1e-9));
        assert!(!f.has_converged());

        let moved = Isometry3::translation(0.02, 0.0, 1.0);
        let block = f
            .compute_block(&FeatureContext { pose: &moved, camera: &cam, iteration: 1 })
            .unwrap();
        assert!(block.rms() < 1e-9);
        assert!(f.has_converged());
    }

    #[test]
    fn mask_and_border_drop_points() {
        let cam = CameraIntrinsics::new(200.0, 200.0, 80.0, 60.0);
        let pose = Isometry3::translation(0.0, 0.0, 1.0);
        let settings = SilhouetteSettings {
            use_mask: true,
            min_mask_confidence: 0.5,
            ..Default::default()
        };
        let mut f = SilhouetteEdgeFeature::new(settings).unwrap();
        f.extract(&vertical_edge(80), &vertical_bar(), &pose, &cam, None);
        assert!(f.sites().is_empty());

        let mut mask = ImageF32::new(160, 120);
        for y in 0..60 {
            for x in 0..160 {
                mask.set(x, y, 1.0);
            }
        }
        f.extract(&vertical_edge(80), &vertical_bar(), &pose, &cam, Some(&mask));
        // rows 20, 30, 40, 50 are masked in; row 60 and below are not
        assert_eq!(f.sites().len(), 4);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        for bad in [
            SilhouetteSettings { num_candidates: 0, ..Default::default() },
            SilhouetteSettings { convergence_ratio: 1.5, ..Default::default() },
            SilhouetteSettings { min_mask_confidence: -0.1, ..Default::default() },
            SilhouetteSettings { convergence_pixel_threshold: -1.0, ..Default::default() },
            SilhouetteSettings { min_num_points: 0, ..Default::default() },
        ] {
            assert!(SilhouetteEdgeFeature::new(bad).unwrap_err().is_config());
        }
    }

    #[test]
    fn too_few_edges_sit_the_frame_out() {
        use crate::optimizer::{OptimizationStatus, PoseOptimizer};

        let cam = CameraIntrinsics::new(200.0, 200.0, 80.0, 60.0);
        let pose = Isometry3::translation(0.0, 0.0, 1.0);
        let mut f = SilhouetteEdgeFeature::new(SilhouetteSettings::default()).unwrap();
        f.extract(&vertical_edge(80), &vertical_bar()[..3], &pose, &cam, None);
        f.track(&vertical_edge(82), &cam);
        assert_eq!(f.num_observations(), 3);
        assert!(!f.is_valid());

        let mut features: Vec<Box<dyn FeatureTracker>> = vec![Box::new(f)];
        let report = PoseOptimizer::default()
            .optimize(&pose, &mut features, &cam)
            .unwrap();
        assert_eq!(report.status, OptimizationStatus::NoValidFeatures);
        assert_eq!(report.pose, pose);
    }
}

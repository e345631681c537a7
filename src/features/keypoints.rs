use crate::camera::projection_jacobian;
use crate::error::{ensure_config, Result};
use crate::geometry::Point2;
use crate::optimizer::robust::tukey_weights;
use crate::optimizer::{FeatureContext, FeatureResidualBlock, FeatureTracker};
use nalgebra::{DMatrix, DVector, Point3};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KeypointSettings {
    pub weight: f64,
    /// Below this many matches the feature sits the frame out.
    #[serde(rename = "minimumNumPoints")]
    pub min_num_points: usize,
    /// Floor of the robust scale, in pixels.
    pub min_robust_threshold: f64,
    /// RMS reprojection error (pixels) under which the feature has converged.
    pub convergence_pixel_threshold: f64,
}

impl Default for KeypointSettings {
    fn default() -> Self {
        Self {
            weight: 1.0,
            min_num_points: 4,
            min_robust_threshold: 1.0,
            convergence_pixel_threshold: 0.5,
        }
    }
}

impl KeypointSettings {
    pub fn validate(&self) -> Result<()> {
        ensure_config(self.weight >= 0.0, || format!("keypoint weight must be non-negative, got {}", self.weight))?;
        ensure_config(self.min_num_points >= 1, || "minimumNumPoints must be at least 1".into())?;
        ensure_config(self.min_robust_threshold >= 0.0, || {
            format!("keypoint minRobustThreshold must be non-negative, got {}", self.min_robust_threshold)
        })?;
        ensure_config(self.convergence_pixel_threshold >= 0.0, || {
            format!(
                "keypoint convergencePixelThreshold must be non-negative, got {}",
                self.convergence_pixel_threshold
            )
        })
    }
}

/// A model point and the pixel where it was observed in the current frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeypointMatch {
    pub object_point: Point3<f64>,
    pub observed: Point2,
}

/// Reprojection residuals of matched keypoints, two rows per match in
/// normalised image coordinates.
#[derive(Clone, Debug)]
pub struct KeypointFeature {
    settings: KeypointSettings,
    matches: Vec<KeypointMatch>,
    converged: bool,
}

impl KeypointFeature {
    pub fn new(settings: KeypointSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            matches: Vec::new(),
            converged: false,
        })
    }

    pub fn settings(&self) -> &KeypointSettings {
        &self.settings
    }

    pub fn set_matches(&mut self, matches: Vec<KeypointMatch>) {
        self.matches = matches;
        self.converged = false;
    }

    pub fn matches(&self) -> &[KeypointMatch] {
        &self.matches
    }
}

impl FeatureTracker for KeypointFeature {
    fn name(&self) -> &str {
        "keypoints"
    }

    fn weight(&self) -> f64 {
        self.settings.weight
    }

    fn is_valid(&self) -> bool {
        self.matches.len() >= self.settings.min_num_points
    }

    fn compute_block(&mut self, ctx: &FeatureContext<'_>) -> Result<FeatureResidualBlock> {
        // matches behind the camera contribute no rows
        let mut rows = Vec::with_capacity(self.matches.len());
        for m in &self.matches {
            let p = ctx.pose * m.object_point;
            let Some(j) = projection_jacobian(&p) else {
                continue;
            };
            let obs = ctx.camera.to_normalized(m.observed.x, m.observed.y);
            rows.push((p.x / p.z - obs.x, p.y / p.z - obs.y, j));
        }
        let n = rows.len() * 2;
        let mut residuals = DVector::zeros(n);
        let mut jacobian = DMatrix::zeros(n, 6);
        for (k, (rx, ry, j)) in rows.iter().enumerate() {
            residuals[2 * k] = *rx;
            residuals[2 * k + 1] = *ry;
            jacobian.fixed_view_mut::<2, 6>(2 * k, 0).copy_from(j);
        }

        let focal = ctx.camera.mean_focal();
        let weights = DVector::from_vec(tukey_weights(residuals.as_slice(), self.settings.min_robust_threshold / focal));
        let block = FeatureResidualBlock::new(residuals, weights, jacobian)?;
        self.converged = !block.is_empty() && block.rms() * focal < self.settings.convergence_pixel_threshold;
        Ok(block)
    }

    fn has_converged(&self) -> bool {
        self.converged
    }
}

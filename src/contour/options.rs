use crate::error::{ensure_config, Result};
use crate::nurbs::DEFAULT_DEGREE;
use serde::{Deserialize, Serialize};

/// How the contour curve is rebuilt from the tracked sites.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FitMode {
    /// Curve through every retained site.
    Interpolate,
    /// Least-squares curve with `control_points` control points. Falls back
    /// to interpolation when too few sites remain.
    #[default]
    Approximate,
}

/// Contour model parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContourSettings {
    pub degree: usize,
    pub fit_mode: FitMode,
    /// Control point count used by [`FitMode::Approximate`].
    pub control_points: usize,
    /// Minimum spacing (pixels) between sites fed to the refit.
    pub min_point_distance: f64,
    /// Sites are resampled from the curve when the fraction of good sites
    /// drops below this ratio.
    pub resample_ratio: f64,
    /// Chords used to measure arc length when sampling.
    pub arc_samples: usize,
}

impl Default for ContourSettings {
    fn default() -> Self {
        Self {
            degree: DEFAULT_DEGREE,
            fit_mode: FitMode::Approximate,
            control_points: 20,
            min_point_distance: 10.0,
            resample_ratio: 0.5,
            arc_samples: 512,
        }
    }
}

impl ContourSettings {
    pub fn validate(&self) -> Result<()> {
        ensure_config(self.degree >= 1, || "contour degree must be at least 1".into())?;
        if self.fit_mode == FitMode::Approximate {
            ensure_config(self.control_points > self.degree, || {
                format!(
                    "contour control points ({}) must exceed the degree ({})",
                    self.control_points, self.degree
                )
            })?;
        }
        ensure_config(self.min_point_distance >= 0.0, || {
            format!("minPointDistance must be non-negative, got {}", self.min_point_distance)
        })?;
        ensure_config((0.0..=1.0).contains(&self.resample_ratio), || {
            format!("resampleRatio must lie in [0, 1], got {}", self.resample_ratio)
        })?;
        ensure_config(self.arc_samples >= 1, || "arcSamples must be at least 1".into())?;
        Ok(())
    }
}

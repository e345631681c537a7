//! Parameters of the damped Gauss-Newton pose loop.
//!
//! With `mu = 0` every iteration is a plain Gauss-Newton step; a positive
//! `mu` adds Levenberg-Marquardt damping that is multiplied by
//! `mu_iter_factor` after each accepted update and by `mu_growth_factor`
//! after a step that raised the cost.

use crate::error::{ensure_config, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OptimizerParams {
    /// Scale applied to every computed increment.
    pub gain: f64,
    /// Maximum number of pose updates per frame.
    pub max_iterations: usize,
    /// Initial damping.
    #[serde(rename = "mu")]
    pub initial_mu: f64,
    pub mu_iter_factor: f64,
    pub mu_growth_factor: f64,
    /// Fraction of valid features that must report convergence.
    pub min_convergence_ratio: f64,
    /// Relative change of the total cost below which iterations stop.
    pub cost_tolerance: f64,
    /// Evaluate the feature blocks with Rayon when at least this many
    /// features are valid. `0` disables parallel evaluation.
    pub parallel_min_features: usize,
}

impl Default for OptimizerParams {
    fn default() -> Self {
        Self {
            gain: 1.0,
            max_iterations: 10,
            initial_mu: 0.0,
            mu_iter_factor: 0.1,
            mu_growth_factor: 10.0,
            min_convergence_ratio: 1.0,
            cost_tolerance: 1e-6,
            parallel_min_features: 2,
        }
    }
}

impl OptimizerParams {
    pub fn validate(&self) -> Result<()> {
        ensure_config(self.max_iterations >= 1, || "maxIterations must be at least 1".into())?;
        ensure_config(self.gain.is_finite() && self.gain > 0.0, || {
            format!("gain must be positive, got {}", self.gain)
        })?;
        ensure_config(self.initial_mu >= 0.0, || {
            format!("initial mu must be non-negative, got {}", self.initial_mu)
        })?;
        ensure_config(self.mu_iter_factor >= 0.0, || {
            format!("muIterFactor must be non-negative, got {}", self.mu_iter_factor)
        })?;
        ensure_config(self.mu_growth_factor >= 1.0, || {
            format!("muGrowthFactor must be at least 1, got {}", self.mu_growth_factor)
        })?;
        ensure_config((0.0..=1.0).contains(&self.min_convergence_ratio), || {
            format!("minConvergenceRatio must lie in [0, 1], got {}", self.min_convergence_ratio)
        })?;
        ensure_config(self.cost_tolerance >= 0.0, || {
            format!("costTolerance must be non-negative, got {}", self.cost_tolerance)
        })
    }

    pub(crate) fn should_parallelize(&self, valid_features: usize) -> bool {
        cfg!(feature = "parallel") && self.parallel_min_features > 0 && valid_features >= self.parallel_min_features
    }
}

//! Multi-feature pose optimisation.
//!
//! [`PoseOptimizer::optimize`] runs a damped Gauss-Newton loop over any set
//! of [`FeatureTracker`]s. Each iteration stacks the weighted normal
//! equations of every valid feature,
//!
//! ```text
//! H = Σ_f  w_f · J_fᵀ W_f J_f        g = Σ_f  w_f · J_fᵀ W_f r_f
//! (H + μ I) Δ = −g                    pose ← exp(gain · Δ) · pose
//! ```
//!
//! and stops when enough features report convergence, when the relative
//! decrease of the total cost falls under `cost_tolerance`, or after
//! `max_iterations` updates. A step that raises the cost is undone and
//! retried with the damping grown by `mu_growth_factor`.

mod feature;
mod params;
pub mod robust;

pub use feature::{FeatureContext, FeatureResidualBlock, FeatureTracker};
pub use params::OptimizerParams;

use crate::camera::CameraIntrinsics;
use crate::error::{Result, TrackerError};
use crate::se3;
use nalgebra::{Isometry3, Matrix6, Vector6};
use serde::Serialize;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

const PINV_EPS: f64 = 1e-12;
const REJECT_MU_SCALE: f64 = 1e-3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OptimizationStatus {
    Converged,
    MaxItersReached,
    /// Every feature was discarded as invalid; the pose is unchanged.
    NoValidFeatures,
}

/// Per-feature state at the last evaluation.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureSummary {
    pub name: String,
    pub weight: f64,
    pub rows: usize,
    pub rms: f64,
    pub weighted_cost: f64,
    pub converged: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationReport {
    pub status: OptimizationStatus,
    pub pose: Isometry3<f64>,
    /// Number of increments computed, rejected ones included.
    pub iterations: usize,
    /// Increments undone because they raised the cost.
    pub rejected_steps: usize,
    /// Total weighted cost at every accepted pose, first one at the input
    /// pose. Never increases.
    pub cost_history: Vec<f64>,
    pub features: Vec<FeatureSummary>,
}

impl OptimizationReport {
    pub fn final_cost(&self) -> Option<f64> {
        self.cost_history.last().copied()
    }
}

#[derive(Clone, Debug, Default)]
pub struct PoseOptimizer {
    params: OptimizerParams,
}

impl PoseOptimizer {
    pub fn new(params: OptimizerParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &OptimizerParams {
        &self.params
    }

    pub fn optimize(
        &self,
        pose: &Isometry3<f64>,
        features: &mut [Box<dyn FeatureTracker>],
        camera: &CameraIntrinsics,
    ) -> Result<OptimizationReport> {
        let params = &self.params;
        let active: Vec<bool> = features.iter().map(|f| f.is_valid()).collect();
        let n_active = active.iter().filter(|&&a| a).count();
        for (f, _) in features.iter().zip(&active).filter(|(_, &a)| !a) {
            log::debug!("PoseOptimizer: discarding invalid feature '{}'", f.name());
        }
        if n_active == 0 {
            log::warn!("PoseOptimizer: no valid feature, pose left unchanged");
            return Ok(OptimizationReport {
                status: OptimizationStatus::NoValidFeatures,
                pose: *pose,
                iterations: 0,
                rejected_steps: 0,
                cost_history: Vec::new(),
                features: Vec::new(),
            });
        }
        for (f, _) in features.iter_mut().zip(&active).filter(|(_, &a)| a) {
            f.start_optimization();
        }

        let mut pose = *pose;
        let mut mu = params.initial_mu;
        let mut cost_history: Vec<f64> = Vec::with_capacity(params.max_iterations + 1);
        let mut summaries = Vec::new();
        let mut iterations = 0usize;
        let mut rejected_steps = 0usize;
        let mut status = OptimizationStatus::MaxItersReached;
        // pose and normal equations of the last evaluation that lowered the cost
        let mut accepted: Option<(Isometry3<f64>, Matrix6<f64>, Vector6<f64>)> = None;

        for evaluation in 0..=params.max_iterations {
            let ctx = FeatureContext {
                pose: &pose,
                camera,
                iteration: evaluation,
            };
            let blocks = self.evaluate(features, &active, &ctx, n_active)?;

            let mut cost = 0.0;
            let mut converged = 0usize;
            let mut current = Vec::with_capacity(n_active);
            for (f, block) in features.iter().zip(&active).filter(|(_, &a)| a).map(|(f, _)| f).zip(&blocks) {
                let weighted = f.weight() * block.weighted_cost();
                cost += weighted;
                let done = f.has_converged();
                converged += done as usize;
                current.push(FeatureSummary {
                    name: f.name().to_string(),
                    weight: f.weight(),
                    rows: block.len(),
                    rms: block.rms(),
                    weighted_cost: weighted,
                    converged: done,
                });
            }
            let previous = cost_history.last().copied();

            if let (Some(prev), Some((back, h, g))) = (previous, accepted.as_ref()) {
                if cost > prev {
                    // overshoot: step back and damp harder
                    rejected_steps += 1;
                    mu = grown_damping(mu, h, params.mu_growth_factor);
                    log::debug!(
                        "PoseOptimizer: cost rose {prev:.6e} -> {cost:.6e}, step rejected, mu={mu:.3e}"
                    );
                    pose = *back;
                    if evaluation == params.max_iterations {
                        break;
                    }
                    let delta = solve_damped(h, g, mu)? * params.gain;
                    pose = se3::left_update(back, &delta);
                    iterations += 1;
                    continue;
                }
            }
            cost_history.push(cost);
            summaries = current;

            let ratio = converged as f64 / n_active as f64;
            let stalled = previous.is_some_and(|prev: f64| {
                let scale = prev.abs().max(f64::MIN_POSITIVE);
                (prev - cost) / scale < params.cost_tolerance
            });
            if ratio >= params.min_convergence_ratio || stalled {
                log::debug!(
                    "PoseOptimizer: converged after {iterations} updates (ratio {ratio:.2}, cost {cost:.3e})"
                );
                status = OptimizationStatus::Converged;
                break;
            }
            if evaluation == params.max_iterations {
                break;
            }

            let (h, g) = normal_equations(features, &active, &blocks);
            let delta = solve_damped(&h, &g, mu)? * params.gain;
            accepted = Some((pose, h, g));
            pose = se3::left_update(&pose, &delta);
            mu *= params.mu_iter_factor;
            iterations += 1;
            log::trace!(
                "PoseOptimizer: iteration {iterations} cost={cost:.6e} |delta|={:.3e}",
                delta.norm()
            );
        }

        if status == OptimizationStatus::MaxItersReached {
            log::debug!("PoseOptimizer: stopped after {iterations} updates without convergence");
        }
        Ok(OptimizationReport {
            status,
            pose,
            iterations,
            rejected_steps,
            cost_history,
            features: summaries,
        })
    }

    fn evaluate(
        &self,
        features: &mut [Box<dyn FeatureTracker>],
        active: &[bool],
        ctx: &FeatureContext<'_>,
        n_active: usize,
    ) -> Result<Vec<FeatureResidualBlock>> {
        if self.params.should_parallelize(n_active) {
            #[cfg(feature = "parallel")]
            {
                return features
                    .par_iter_mut()
                    .zip(active.par_iter())
                    .filter(|(_, &a)| a)
                    .map(|(f, _)| f.compute_block(ctx))
                    .collect();
            }
        }
        features
            .iter_mut()
            .zip(active)
            .filter(|(_, &a)| a)
            .map(|(f, _)| f.compute_block(ctx))
            .collect()
    }
}

/// Weighted normal equations accumulated over the active features.
fn normal_equations(
    features: &[Box<dyn FeatureTracker>],
    active: &[bool],
    blocks: &[FeatureResidualBlock],
) -> (Matrix6<f64>, Vector6<f64>) {
    let mut h = Matrix6::zeros();
    let mut g = Vector6::zeros();
    let weights = features.iter().zip(active).filter(|(_, &a)| a).map(|(f, _)| f.weight());
    for (fw, block) in weights.zip(blocks) {
        for r in 0..block.len() {
            let w = fw * block.weights[r];
            if w == 0.0 {
                continue;
            }
            let row = block.jacobian.row(r);
            let j = Vector6::from_iterator(row.iter().copied());
            h += (w * j) * j.transpose();
            g += (w * block.residuals[r]) * j;
        }
    }
    (h, g)
}

/// Damping after a rejected step. From zero, start at `1e-3 · max diag(H)`.
fn grown_damping(mu: f64, h: &Matrix6<f64>, growth: f64) -> f64 {
    let start = REJECT_MU_SCALE * h.diagonal().max();
    (mu * growth).max(start)
}

/// Solve `(H + μI) Δ = −g`, falling back to the pseudo-inverse when the
/// damped system is singular.
fn solve_damped(h: &Matrix6<f64>, g: &Vector6<f64>, mu: f64) -> Result<Vector6<f64>> {
    let a = h + Matrix6::identity() * mu;
    let rhs = -g;
    if let Some(delta) = a.lu().solve(&rhs) {
        if delta.iter().all(|v| v.is_finite()) {
            return Ok(delta);
        }
    }
    log::debug!("PoseOptimizer: singular normal equations, using pseudo-inverse");
    let pinv = a
        .pseudo_inverse(PINV_EPS)
        .map_err(|e| TrackerError::Numeric(format!("pose normal equations: {e}")))?;
    Ok(pinv * rhs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{DMatrix, DVector};

    /// Residual `r = A·log(pose) − b`, linear in the twist around identity
    /// along the translation axes.
    struct Translation {
        target: Vector6<f64>,
        valid: bool,
        converged: bool,
    }

    impl FeatureTracker for Translation {
        fn name(&self) -> &str {
            "translation"
        }
        fn weight(&self) -> f64 {
            1.0
        }
        fn is_valid(&self) -> bool {
            self.valid
        }
        fn compute_block(&mut self, ctx: &FeatureContext<'_>) -> Result<FeatureResidualBlock> {
            let t = ctx.pose.translation.vector;
            let r = DVector::from_vec(vec![t.x - self.target[0], t.y - self.target[1], t.z - self.target[2]]);
            self.converged = r.norm() < 1e-9;
            let mut j = DMatrix::zeros(3, 6);
            for k in 0..3 {
                j[(k, k)] = 1.0;
            }
            FeatureResidualBlock::new(r, DVector::from_element(3, 1.0), j)
        }
        fn has_converged(&self) -> bool {
            self.converged
        }
    }

    fn translation(valid: bool) -> Box<dyn FeatureTracker> {
        Box::new(Translation {
            target: Vector6::new(0.5, -0.25, 2.0, 0.0, 0.0, 0.0),
            valid,
            converged: false,
        })
    }

    #[test]
    fn gauss_newton_solves_translation_in_one_step() {
        let opt = PoseOptimizer::new(OptimizerParams::default()).unwrap();
        let mut features = vec![translation(true)];
        let cam = CameraIntrinsics::new(500.0, 500.0, 320.0, 240.0);
        let report = opt.optimize(&Isometry3::identity(), &mut features, &cam).unwrap();
        assert_eq!(report.status, OptimizationStatus::Converged);
        assert_eq!(report.iterations, 1);
        assert!((report.pose.translation.vector.z - 2.0).abs() < 1e-12);
        assert_eq!(report.cost_history.len(), 2);
        assert!(report.features[0].converged);
    }

    #[test]
    fn no_valid_features_leaves_pose() {
        let opt = PoseOptimizer::default();
        let mut features = vec![translation(false)];
        let cam = CameraIntrinsics::new(500.0, 500.0, 320.0, 240.0);
        let pose = Isometry3::translation(1.0, 2.0, 3.0);
        let report = opt.optimize(&pose, &mut features, &cam).unwrap();
        assert_eq!(report.status, OptimizationStatus::NoValidFeatures);
        assert_eq!(report.pose, pose);
        assert_eq!(report.iterations, 0);
    }

    #[test]
    fn small_gain_hits_iteration_limit() {
        let params = OptimizerParams {
            gain: 0.1,
            max_iterations: 3,
            cost_tolerance: 0.0,
            ..Default::default()
        };
        let opt = PoseOptimizer::new(params).unwrap();
        let mut features = vec![translation(true)];
        let cam = CameraIntrinsics::new(500.0, 500.0, 320.0, 240.0);
        let report = opt.optimize(&Isometry3::identity(), &mut features, &cam).unwrap();
        assert_eq!(report.status, OptimizationStatus::MaxItersReached);
        assert_eq!(report.iterations, 3);
        assert_eq!(report.cost_history.len(), 4);
        // each step removes 10% of the translation error
        let expected = 0.9f64.powi(3) * 2.0;
        assert!((report.pose.translation.vector.z - (2.0 - expected)).abs() < 1e-12);
    }

    fn overshooting(gain: f64, max_iterations: usize) -> OptimizationReport {
        let params = OptimizerParams {
            gain,
            max_iterations,
            ..Default::default()
        };
        let opt = PoseOptimizer::new(params).unwrap();
        let mut features = vec![translation(true)];
        let cam = CameraIntrinsics::new(500.0, 500.0, 320.0, 240.0);
        opt.optimize(&Isometry3::identity(), &mut features, &cam).unwrap()
    }

    #[test]
    fn slight_cost_increase_is_not_convergence() {
        // the step lands just past the mirror image of the start
        let report = overshooting(2.0 + 1e-7, 1);
        assert_eq!(report.status, OptimizationStatus::MaxItersReached);
        assert_eq!(report.rejected_steps, 1);
        assert_eq!(report.pose, Isometry3::identity());
        assert_eq!(report.cost_history.len(), 1);
    }

    #[test]
    fn rejected_steps_grow_damping() {
        let report = overshooting(2.5, 10);
        assert_ne!(report.status, OptimizationStatus::Converged);
        assert!(report.rejected_steps >= 3);
        let costs = &report.cost_history;
        assert!(costs.len() >= 2);
        for pair in costs.windows(2) {
            assert!(pair[1] <= pair[0], "cost went up: {costs:?}");
        }
        assert!(costs[costs.len() - 1] < 0.01 * costs[0]);
    }

    #[test]
    fn singular_system_uses_pseudo_inverse() {
        let h = Matrix6::from_diagonal(&Vector6::new(2.0, 0.0, 0.0, 0.0, 0.0, 0.0));
        let g = Vector6::new(4.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        let delta = solve_damped(&h, &g, 0.0).unwrap();
        assert!((delta[0] + 2.0).abs() < 1e-12);
        assert!(delta.rows(1, 5).iter().all(|v| v.abs() < 1e-12));
    }
}

use crate::camera::CameraIntrinsics;
use crate::error::{Result, TrackerError};
use nalgebra::{DMatrix, DVector, Isometry3};

/// Residuals, diagonal weights and `n × 6` Jacobian of one feature at the
/// current pose. Rows with zero weight are ignored by the solver.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureResidualBlock {
    pub residuals: DVector<f64>,
    pub weights: DVector<f64>,
    pub jacobian: DMatrix<f64>,
}

impl FeatureResidualBlock {
    pub fn new(residuals: DVector<f64>, weights: DVector<f64>, jacobian: DMatrix<f64>) -> Result<Self> {
        let n = residuals.len();
        if weights.len() != n || jacobian.nrows() != n || jacobian.ncols() != 6 {
            return Err(TrackerError::internal(format!(
                "residual block shapes disagree: {} residuals, {} weights, {}x{} jacobian",
                n,
                weights.len(),
                jacobian.nrows(),
                jacobian.ncols()
            )));
        }
        Ok(Self {
            residuals,
            weights,
            jacobian,
        })
    }

    pub fn empty() -> Self {
        Self {
            residuals: DVector::zeros(0),
            weights: DVector::zeros(0),
            jacobian: DMatrix::zeros(0, 6),
        }
    }

    pub fn len(&self) -> usize {
        self.residuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residuals.is_empty()
    }

    /// `Σ w·r²`.
    pub fn weighted_cost(&self) -> f64 {
        self.residuals
            .iter()
            .zip(self.weights.iter())
            .map(|(r, w)| w * r * r)
            .sum()
    }

    /// Root mean square of the unweighted residuals.
    pub fn rms(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            (self.residuals.norm_squared() / self.len() as f64).sqrt()
        }
    }
}

/// What a feature sees while the pose is being optimised.
#[derive(Clone, Copy, Debug)]
pub struct FeatureContext<'a> {
    /// Current object-to-camera transform.
    pub pose: &'a Isometry3<f64>,
    pub camera: &'a CameraIntrinsics,
    /// Index of the current evaluation, starting at 0.
    pub iteration: usize,
}

/// A source of pose residuals: silhouette edges, depth, keypoints, or any
/// external tracker.
pub trait FeatureTracker: Send {
    fn name(&self) -> &str;

    /// Scalar weight applied to the whole block.
    fn weight(&self) -> f64;

    /// Whether the feature has enough data to take part this frame.
    fn is_valid(&self) -> bool;

    /// Called once before the first evaluation of a frame.
    fn start_optimization(&mut self) {}

    fn compute_block(&mut self, ctx: &FeatureContext<'_>) -> Result<FeatureResidualBlock>;

    /// Convergence verdict on the last computed block.
    fn has_converged(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_mismatch_is_internal() {
        let err = FeatureResidualBlock::new(DVector::zeros(3), DVector::zeros(2), DMatrix::zeros(3, 6)).unwrap_err();
        assert!(err.is_internal());
        assert!(FeatureResidualBlock::new(DVector::zeros(3), DVector::zeros(3), DMatrix::zeros(3, 5)).is_err());
    }

    #[test]
    fn cost_and_rms() {
        let block = FeatureResidualBlock::new(
            DVector::from_vec(vec![3.0, 4.0]),
            DVector::from_vec(vec![1.0, 0.5]),
            DMatrix::zeros(2, 6),
        )
        .unwrap();
        assert_eq!(block.weighted_cost(), 9.0 + 8.0);
        assert!((block.rms() - (12.5f64).sqrt()).abs() < 1e-12);
        assert_eq!(FeatureResidualBlock::empty().rms(), 0.0);
    }
}

//! Pinhole camera intrinsics and the projection Jacobians used by the
//! pose features.

use crate::error::{ensure_config, Result};
use crate::geometry::Point2;
use nalgebra::{Matrix2x6, Point3, RowVector6, Vector3};
use serde::{Deserialize, Serialize};

/// Points closer than this to the image plane are not projected.
pub const MIN_DEPTH: f64 = 1e-6;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProjectionModel {
    #[default]
    PerspectiveWithoutDistortion,
    PerspectiveWithDistortion,
}

/// Intrinsics `px, py` (focal lengths in pixels) and `u0, v0` (principal
/// point). Radial distortion coefficients are carried for completeness but
/// only the distortion-free model is accepted by the tracker.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraIntrinsics {
    #[serde(default)]
    pub model: ProjectionModel,
    pub px: f64,
    pub py: f64,
    pub u0: f64,
    pub v0: f64,
    #[serde(default)]
    pub kud: f64,
    #[serde(default)]
    pub kdu: f64,
}

impl CameraIntrinsics {
    pub fn new(px: f64, py: f64, u0: f64, v0: f64) -> Self {
        Self {
            model: ProjectionModel::PerspectiveWithoutDistortion,
            px,
            py,
            u0,
            v0,
            kud: 0.0,
            kdu: 0.0,
        }
    }

    pub fn with_distortion(px: f64, py: f64, u0: f64, v0: f64, kud: f64, kdu: f64) -> Self {
        Self {
            model: ProjectionModel::PerspectiveWithDistortion,
            kud,
            kdu,
            ..Self::new(px, py, u0, v0)
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure_config(self.px.is_finite() && self.px > 0.0 && self.py.is_finite() && self.py > 0.0, || {
            format!("focal lengths must be positive, got px={} py={}", self.px, self.py)
        })?;
        ensure_config(self.u0.is_finite() && self.v0.is_finite(), || {
            "principal point must be finite".into()
        })
    }

    /// Fails unless the model is the distortion-free perspective one.
    pub fn ensure_distortion_free(&self) -> Result<()> {
        ensure_config(self.model == ProjectionModel::PerspectiveWithoutDistortion, || {
            format!(
                "camera model {:?} is not supported, use perspectiveWithoutDistortion",
                self.model
            )
        })
    }

    /// Pixel `(u, v)` of the normalised coordinates `(x, y)`.
    #[inline]
    pub fn to_pixel(&self, x: f64, y: f64) -> Point2 {
        Point2::new(self.u0 + self.px * x, self.v0 + self.py * y)
    }

    /// Normalised coordinates of the pixel `(u, v)`.
    #[inline]
    pub fn to_normalized(&self, u: f64, v: f64) -> Point2 {
        Point2::new((u - self.u0) / self.px, (v - self.v0) / self.py)
    }

    /// Pixel position of a camera-frame point, `None` behind the camera.
    pub fn project(&self, p: &Point3<f64>) -> Option<Point2> {
        (p.z > MIN_DEPTH).then(|| self.to_pixel(p.x / p.z, p.y / p.z))
    }

    /// Camera-frame point seen at pixel `(u, v)` with depth `z`.
    pub fn back_project(&self, u: f64, v: f64, z: f64) -> Point3<f64> {
        let n = self.to_normalized(u, v);
        Point3::new(n.x * z, n.y * z, z)
    }

    /// Mean focal length, used to turn normalised residuals into pixels.
    #[inline]
    pub fn mean_focal(&self) -> f64 {
        0.5 * (self.px + self.py)
    }
}

/// Jacobian of a camera-frame point under the left increment `exp(Δ)`:
/// `∂X/∂Δ = [I | −[X]×]`, returned row by row.
pub fn point_jacobian(p: &Point3<f64>) -> [RowVector6<f64>; 3] {
    let (x, y, z) = (p.x, p.y, p.z);
    [
        RowVector6::new(1.0, 0.0, 0.0, 0.0, z, -y),
        RowVector6::new(0.0, 1.0, 0.0, -z, 0.0, x),
        RowVector6::new(0.0, 0.0, 1.0, y, -x, 0.0),
    ]
}

/// Jacobian of the normalised projection `(X/Z, Y/Z)` of a camera-frame
/// point with respect to the left pose increment. `None` behind the camera.
pub fn projection_jacobian(p: &Point3<f64>) -> Option<Matrix2x6<f64>> {
    if p.z <= MIN_DEPTH {
        return None;
    }
    let inv_z = 1.0 / p.z;
    let (x, y) = (p.x * inv_z, p.y * inv_z);
    #[rustfmt::skip]
    let j = Matrix2x6::new(
        inv_z, 0.0, -x * inv_z, -x * y, 1.0 + x * x, -y,
        0.0, inv_z, -y * inv_z, -(1.0 + y * y), x * y, x,
    );
    Some(j)
}

/// Row Jacobian of `n · X` for a fixed direction `n` in the camera frame.
#[inline]
pub fn directional_jacobian(p: &Point3<f64>, n: &Vector3<f64>) -> RowVector6<f64> {
    let rows = point_jacobian(p);
    rows[0] * n.x + rows[1] * n.y + rows[2] * n.z
}

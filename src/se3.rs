//! SE(3) exponential and logarithm maps on `nalgebra::Isometry3`.
//!
//! Twists are 6-vectors `(v, ω)`: translational part first, rotation
//! vector second. Pose updates are left increments, `pose ← exp(Δ) · pose`.

use nalgebra::{Isometry3, Matrix3, Translation3, UnitQuaternion, Vector3, Vector6};

/// Below this rotation angle the series expansions are used.
const SMALL_ANGLE_THRESHOLD: f64 = 1e-6;

/// Skew-symmetric matrix `[v]×` such that `[v]× u = v × u`.
#[inline]
#[rustfmt::skip]
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        0.0, -v.z, v.y,
        v.z, 0.0, -v.x,
        -v.y, v.x, 0.0,
    )
}

/// Left Jacobian of SO(3), `V(ω)`, mapping the translational part of a twist
/// to the translation of its exponential.
fn left_jacobian(omega: &Vector3<f64>) -> Matrix3<f64> {
    let theta = omega.norm();
    let k = skew(omega);
    if theta < SMALL_ANGLE_THRESHOLD {
        return Matrix3::identity() + 0.5 * k + (1.0 / 6.0) * k * k;
    }
    let theta_sq = theta * theta;
    Matrix3::identity()
        + ((1.0 - theta.cos()) / theta_sq) * k
        + ((theta - theta.sin()) / (theta_sq * theta)) * k * k
}

fn left_jacobian_inv(omega: &Vector3<f64>) -> Matrix3<f64> {
    let theta = omega.norm();
    let k = skew(omega);
    if theta < SMALL_ANGLE_THRESHOLD {
        return Matrix3::identity() - 0.5 * k + (1.0 / 12.0) * k * k;
    }
    let coeff = 1.0 / (theta * theta) - (1.0 + theta.cos()) / (2.0 * theta * theta.sin());
    Matrix3::identity() - 0.5 * k + coeff * k * k
}

/// Exponential map of the twist `(v, ω)`.
pub fn exp(twist: &Vector6<f64>) -> Isometry3<f64> {
    let v = Vector3::new(twist[0], twist[1], twist[2]);
    let omega = Vector3::new(twist[3], twist[4], twist[5]);
    let rotation = UnitQuaternion::from_scaled_axis(omega);
    let translation = left_jacobian(&omega) * v;
    Isometry3::from_parts(Translation3::from(translation), rotation)
}

/// Logarithm map, inverse of [`exp`] for rotation angles below π.
pub fn log(pose: &Isometry3<f64>) -> Vector6<f64> {
    let omega = pose.rotation.scaled_axis();
    let v = left_jacobian_inv(&omega) * pose.translation.vector;
    Vector6::new(v.x, v.y, v.z, omega.x, omega.y, omega.z)
}

/// Apply the left increment `exp(delta) · pose`.
#[inline]
pub fn left_update(pose: &Isometry3<f64>, delta: &Vector6<f64>) -> Isometry3<f64> {
    exp(delta) * *pose
}

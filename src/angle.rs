//! Angle utilities shared by the mask bank and the moving-edge sites.
//!
//! Site orientations are stored as the angle `alpha` of the contour normal in
//! radians, measured in the image plane with `x = column` and `y = row`. The
//! masks are indexed by the tangent angle in whole degrees over `[0, 180)`.

use std::f64::consts::PI;

/// Folds an angle in degrees into `[0, 180)`.
#[inline]
pub fn fold_degrees_180(deg: f64) -> f64 {
    let folded = deg.rem_euclid(180.0);
    if folded >= 180.0 - 1e-9 {
        0.0
    } else {
        folded
    }
}

/// Tangent direction (degrees, `[0, 180)`) of a contour whose normal has
/// angle `alpha` (radians).
#[inline]
pub fn tangent_deg_from_normal(alpha: f64) -> f64 {
    fold_degrees_180(alpha.to_degrees() + 90.0)
}

/// Index of the mask whose orientation `k · step` is closest to `theta_deg`,
/// treating orientations modulo 180°.
///
/// `step` is the integer angle step of the bank, so the last mask may stop
/// short of 180° (e.g. 7 masks of 25° cover `[0, 150]`); angles past the last
/// mask fall back to whichever of the last mask and mask 0 is nearer.
pub fn nearest_mask_index(theta_deg: f64, step: u32, count: usize) -> usize {
    if count <= 1 || step == 0 {
        return 0;
    }
    let theta = fold_degrees_180(theta_deg);
    let step = step as f64;
    let lower = ((theta / step).floor() as usize).min(count - 1);
    let lower_angle = lower as f64 * step;
    let (upper, upper_angle) = if lower + 1 < count {
        (lower + 1, (lower + 1) as f64 * step)
    } else {
        (0, 180.0)
    };
    if (upper_angle - theta).abs() < (theta - lower_angle).abs() {
        upper
    } else {
        lower
    }
}

/// Smallest unsigned difference between two angles in radians, in `[0, π]`.
#[inline]
pub fn angular_difference(a: f64, b: f64) -> f64 {
    let diff = (a - b).rem_euclid(2.0 * PI);
    if diff > PI {
        2.0 * PI - diff
    } else {
        diff
    }
}

/// Normal angle `alpha` of a curve whose tangent (in `(x, y)` image
/// coordinates) is `(dx, dy)`.
#[inline]
pub fn normal_angle_from_tangent(dx: f64, dy: f64) -> f64 {
    dy.atan2(dx) - std::f64::consts::FRAC_PI_2
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn fold_degrees_basic() {
        assert!(approx_eq(fold_degrees_180(30.0), 30.0));
        assert!(approx_eq(fold_degrees_180(-30.0), 150.0));
        assert!(approx_eq(fold_degrees_180(180.0), 0.0));
        assert!(approx_eq(fold_degrees_180(540.0), 0.0));
    }

    #[test]
    fn tangent_from_normal() {
        assert!(approx_eq(tangent_deg_from_normal(0.0), 90.0));
        assert!(approx_eq(tangent_deg_from_normal(PI / 2.0), 0.0));
        assert!(approx_eq(tangent_deg_from_normal(-PI / 4.0), 45.0));
    }

    #[test]
    fn nearest_mask_wraps_at_180() {
        assert_eq!(nearest_mask_index(0.4, 1, 180), 0);
        assert_eq!(nearest_mask_index(89.6, 1, 180), 90);
        assert_eq!(nearest_mask_index(179.7, 1, 180), 0);
        // 7 masks of 25 degrees: 170 is nearer to 180 (mask 0) than to 150.
        assert_eq!(nearest_mask_index(170.0, 25, 7), 0);
        assert_eq!(nearest_mask_index(155.0, 25, 7), 6);
    }

    #[test]
    fn angular_difference_handles_wrap() {
        assert!(approx_eq(angular_difference(0.1, 2.0 * PI - 0.1), 0.2));
        assert!(approx_eq(angular_difference(PI, 0.0), PI));
        assert!(approx_eq(angular_difference(-PI / 2.0, PI / 2.0), PI));
    }

    #[test]
    fn normal_of_horizontal_tangent_points_up_the_rows() {
        // Tangent along +x: normal angle -pi/2, i.e. direction (0, -1).
        let alpha = normal_angle_from_tangent(1.0, 0.0);
        assert!(approx_eq(alpha.cos(), 0.0));
        assert!(approx_eq(alpha.sin(), -1.0));
    }
}

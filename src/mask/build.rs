//! Weight computation for a single oriented mask.

use crate::error::Result;
use crate::geometry::{clip, relative_area, rel_eq, sign, BBox, Point2};

/// Fill `out` (row-major, `size × size`) with the weights of the mask whose
/// edge direction has angle `angle_deg`.
pub(super) fn fill_mask(angle_deg: f64, size: usize, out: &mut [f64]) -> Result<()> {
    debug_assert_eq!(out.len(), size * size);
    let n = size as f64;
    let half = n / 2.0;
    let norm = 1.0 / (n * (size / 2) as f64);

    let theta = angle_deg.to_radians();
    let (sin_t, cos_t) = theta.sin_cos();

    // Two points of the edge line well outside the mask.
    let (p1, q1) = if rel_eq(angle_deg, 90.0) {
        (Point2::new(0.0, -n), Point2::new(0.0, n))
    } else {
        let tan_t = sin_t / cos_t;
        (Point2::new(-n, -n * tan_t), Point2::new(n, n * tan_t))
    };

    for row in 0..size {
        let y = row as f64 - half + 0.5;
        for col in 0..size {
            let x = col as f64 - half + 0.5;
            let side = sign(cos_t * y - sin_t * x);
            let cell = BBox::unit_cell(x, y);
            let weight = match clip(p1, q1, &cell)? {
                Some((p, q)) => relative_area(p, q, &cell)?,
                None => 1.0,
            };
            out[row * size + col] = side * weight * norm;
        }
    }
    Ok(())
}

//! Planar geometry kernel used to precompute the oriented edge masks.
//!
//! - [`clip`]: Sutherland–Sproull clipping of a segment against a closed
//!   axis-aligned box, with boundary snapping so outcodes cannot oscillate.
//! - [`relative_area`]: signed-area balance of the two parts a clipped
//!   segment splits a unit pixel into.
//!
//! Both routines run on `f64` and never allocate.

mod area;
mod clip;

pub use area::relative_area;
pub use clip::clip;

use serde::{Deserialize, Serialize};

/// Absolute tolerance used when snapping a computed coordinate onto a box
/// boundary.
pub const SNAP_TOLERANCE: f64 = 1e-3;

/// Real-valued 2D point. In image contexts `x` is the column, `y` the row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn distance(&self, other: &Point2) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Implicit line `a·x + b·y + c = 0`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Line2 {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Line2 {
    /// Line through `p` and `q` (not normalised).
    pub fn through(p: Point2, q: Point2) -> Self {
        Self {
            a: p.y - q.y,
            b: q.x - p.x,
            c: q.y * p.x - q.x * p.y,
        }
    }

    pub const fn vertical(x: f64) -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: -x,
        }
    }

    pub const fn horizontal(y: f64) -> Self {
        Self {
            a: 0.0,
            b: 1.0,
            c: -y,
        }
    }

    /// Intersection point, `None` for parallel lines.
    pub fn intersect(&self, other: &Line2) -> Option<Point2> {
        let det = self.a * other.b - other.a * self.b;
        if det == 0.0 {
            return None;
        }
        let x = (other.c * self.b - self.c * other.b) / det;
        let y = (self.c * other.a - other.c * self.a) / det;
        (x.is_finite() && y.is_finite()).then_some(Point2 { x, y })
    }
}

/// Closed axis-aligned box `[xmin, xmax] × [ymin, ymax]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BBox {
    pub const fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Unit pixel cell centred on `(cx, cy)`.
    pub fn unit_cell(cx: f64, cy: f64) -> Self {
        Self::new(cx - 0.5, cy - 0.5, cx + 0.5, cy + 0.5)
    }

    /// Move coordinates lying within [`SNAP_TOLERANCE`] of a boundary exactly
    /// onto it.
    pub(crate) fn snap(&self, p: &mut Point2) {
        if near(p.x, self.xmin) {
            p.x = self.xmin;
        }
        if near(p.x, self.xmax) {
            p.x = self.xmax;
        }
        if near(p.y, self.ymin) {
            p.y = self.ymin;
        }
        if near(p.y, self.ymax) {
            p.y = self.ymax;
        }
    }
}

#[inline]
pub(crate) fn near(a: f64, b: f64) -> bool {
    (a - b).abs() < SNAP_TOLERANCE
}

/// Equality up to an epsilon proportional to the operands' magnitude.
#[inline]
pub(crate) fn rel_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= a.abs().max(b.abs()) * f64::EPSILON
}

/// Sign with an exact-zero band of one machine epsilon.
#[inline]
pub(crate) fn sign(v: f64) -> f64 {
    if v.abs() < f64::EPSILON {
        0.0
    } else if v < 0.0 {
        -1.0
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_intersection_basic() {
        let diag = Line2::through(Point2::new(0.0, 0.0), Point2::new(2.0, 2.0));
        let p = diag.intersect(&Line2::vertical(1.5)).unwrap();
        assert!((p.x - 1.5).abs() < 1e-12 && (p.y - 1.5).abs() < 1e-12);
        assert!(Line2::vertical(0.0).intersect(&Line2::vertical(1.0)).is_none());
    }

    #[test]
    fn snap_moves_close_coordinates_only() {
        let bbox = BBox::unit_cell(0.0, 0.0);
        let mut p = Point2::new(-0.5004, 0.3);
        bbox.snap(&mut p);
        assert_eq!(p.x, -0.5);
        assert_eq!(p.y, 0.3);
    }

    #[test]
    fn sign_has_zero_band() {
        assert_eq!(sign(0.0), 0.0);
        assert_eq!(sign(1e-20), 0.0);
        assert_eq!(sign(-0.25), -1.0);
        assert_eq!(sign(3.0), 1.0);
    }
}

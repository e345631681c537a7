//! Relative area of the two parts a clipped segment cuts a pixel into.

use super::{rel_eq, BBox, Point2};
use crate::error::{Result, TrackerError};

/// Area balance `|A₁ − A₂|` of the two regions the segment `pq` splits the
/// unit box `bbox` into, in `[0, 1]`.
///
/// `p` and `q` must come out of [`clip`](super::clip) for the same box, so
/// that both endpoints lie on the box border. The points are sorted by `x`
/// and snapped again before the six border configurations are tested with a
/// magnitude-relative epsilon. Any other configuration is an internal error.
pub fn relative_area(p: Point2, q: Point2, bbox: &BBox) -> Result<f64> {
    let (mut p, mut q) = if q.x < p.x { (q, p) } else { (p, q) };
    bbox.snap(&mut p);
    bbox.snap(&mut q);
    let BBox {
        xmin,
        ymin,
        xmax,
        ymax,
    } = *bbox;

    // left border to right border
    if rel_eq(p.x, xmin) && rel_eq(q.x, xmax) {
        return Ok(((ymax + ymin) - (p.y + q.y)).abs());
    }
    // bottom border to top border, either way round
    if (rel_eq(p.y, ymin) && rel_eq(q.y, ymax)) || (rel_eq(q.y, ymin) && rel_eq(p.y, ymax)) {
        return Ok(((xmax + xmin) - (p.x + q.x)).abs());
    }
    // corner triangles
    if rel_eq(p.x, xmin) && rel_eq(q.y, ymax) {
        return Ok(1.0 - (ymax - p.y) * (q.x - xmin));
    }
    if rel_eq(p.x, xmin) && rel_eq(q.y, ymin) {
        return Ok(1.0 - (p.y - ymin) * (q.x - xmin));
    }
    if rel_eq(p.y, ymin) && rel_eq(q.x, xmax) {
        return Ok(1.0 - (xmax - p.x) * (q.y - ymin));
    }
    if rel_eq(p.y, ymax) && rel_eq(q.x, xmax) {
        return Ok(1.0 - (xmax - p.x) * (ymax - q.y));
    }

    Err(TrackerError::internal(format!(
        "relative_area: no matching case ({}, {}) ({}, {}) {} {} {} {}",
        p.x, p.y, q.x, q.y, xmin, ymin, xmax, ymax
    )))
}

//! Segment clipping against a closed axis-aligned box (Sutherland–Sproull).

use super::{near, BBox, Line2, Point2};
use crate::error::{Result, TrackerError};

const LEFT: u8 = 1;
const RIGHT: u8 = 2;
const BOTTOM: u8 = 4;
const TOP: u8 = 8;

/// Each clip clears one outcode bit for good, so four clips always settle
/// the segment.
const MAX_CLIPS: usize = 4;

#[inline]
fn outcode(p: &Point2, bbox: &BBox) -> u8 {
    let mut code = 0;
    if p.x < bbox.xmin {
        code |= LEFT;
    }
    if p.x > bbox.xmax {
        code |= RIGHT;
    }
    if p.y < bbox.ymin {
        code |= BOTTOM;
    }
    if p.y > bbox.ymax {
        code |= TOP;
    }
    code
}

fn boundary(bit: u8, bbox: &BBox) -> Line2 {
    match bit {
        LEFT => Line2::vertical(bbox.xmin),
        RIGHT => Line2::vertical(bbox.xmax),
        BOTTOM => Line2::horizontal(bbox.ymin),
        _ => Line2::horizontal(bbox.ymax),
    }
}

/// Clip segment `ab` to `bbox`.
///
/// Returns `Ok(None)` when nothing of the segment is visible, including the
/// degenerate case where the clipped part collapses to a single point.
/// Every intersection is computed with the original carrier line of `ab` and
/// snapped onto the box so that outcodes of clipped points are exact.
pub fn clip(a: Point2, b: Point2, bbox: &BBox) -> Result<Option<(Point2, Point2)>> {
    let carrier = Line2::through(a, b);
    let mut pts = [a, b];

    for clips in 0..=MAX_CLIPS {
        let codes = [outcode(&pts[0], bbox), outcode(&pts[1], bbox)];

        if codes[0] | codes[1] == 0 {
            let (p, q) = (pts[0], pts[1]);
            if near(p.x, q.x) && near(p.y, q.y) {
                return Ok(None);
            }
            return Ok(Some((p, q)));
        }
        if codes[0] & codes[1] != 0 {
            return Ok(None);
        }
        if clips == MAX_CLIPS {
            break;
        }

        let n = if codes[0] != 0 { 0 } else { 1 };
        let bit = 1u8 << codes[n].trailing_zeros();
        let mut clipped = carrier.intersect(&boundary(bit, bbox)).ok_or_else(|| {
            TrackerError::internal(format!(
                "clip: carrier of ({}, {})-({}, {}) parallel to boundary {bit} of box ({}, {}, {}, {})",
                a.x, a.y, b.x, b.y, bbox.xmin, bbox.ymin, bbox.xmax, bbox.ymax
            ))
        })?;
        bbox.snap(&mut clipped);
        pts[n] = clipped;
    }

    Err(TrackerError::internal(format!(
        "clip: more than {MAX_CLIPS} clips for ({}, {})-({}, {}) in box ({}, {}, {}, {})",
        a.x, a.y, b.x, b.y, bbox.xmin, bbox.ymin, bbox.xmax, bbox.ymax
    )))
}

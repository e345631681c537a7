use contour_tracker::geometry::Point2;
use contour_tracker::image::GrayImage;

pub const DARK: u8 = 40;
pub const BRIGHT: u8 = 200;

fn shade(coverage: f64) -> u8 {
    (DARK as f64 + (BRIGHT - DARK) as f64 * coverage.clamp(0.0, 1.0)).round() as u8
}

/// Length of `[a - 0.5, a + 0.5] ∩ [lo, hi]`.
fn overlap(a: f64, lo: f64, hi: f64) -> f64 {
    ((a + 0.5).min(hi) - (a - 0.5).max(lo)).max(0.0)
}

/// Bright axis-aligned rectangle `[x0, x1] × [y0, y1]` on a dark
/// background, each pixel shaded by its exact area coverage. Edges at
/// integer coordinates give a mid-grey boundary pixel, so the strongest
/// edge response is unique.
pub fn rectangle_u8(width: usize, height: usize, x0: f64, y0: f64, x1: f64, y1: f64) -> GrayImage {
    assert!(x0 < x1 && y0 < y1, "rectangle must be non-empty");
    let mut img = GrayImage::filled(width, height, DARK);
    for y in 0..height {
        let cy = overlap(y as f64, y0, y1);
        for x in 0..width {
            let c = overlap(x as f64, x0, x1) * cy;
            img.set(x, y, shade(c));
        }
    }
    img
}

/// Bright disc, shaded by 8×8 supersampled coverage.
pub fn disc_u8(width: usize, height: usize, cx: f64, cy: f64, radius: f64) -> GrayImage {
    const SUB: usize = 8;
    let mut img = GrayImage::filled(width, height, DARK);
    let r2 = radius * radius;
    for y in 0..height {
        for x in 0..width {
            let mut inside = 0usize;
            for sy in 0..SUB {
                for sx in 0..SUB {
                    let px = x as f64 - 0.5 + (sx as f64 + 0.5) / SUB as f64;
                    let py = y as f64 - 0.5 + (sy as f64 + 0.5) / SUB as f64;
                    if (px - cx).powi(2) + (py - cy).powi(2) <= r2 {
                        inside += 1;
                    }
                }
            }
            img.set(x, y, shade(inside as f64 / (SUB * SUB) as f64));
        }
    }
    img
}

/// `count` points on the circle arc from `start` to `end` (radians), as
/// `(x, y)` = (column, row).
pub fn arc_points(cx: f64, cy: f64, radius: f64, start: f64, end: f64, count: usize) -> Vec<Point2> {
    assert!(count >= 2, "an arc needs at least two points");
    (0..count)
        .map(|k| {
            let t = start + (end - start) * k as f64 / (count - 1) as f64;
            Point2::new(cx + radius * t.cos(), cy + radius * t.sin())
        })
        .collect()
}

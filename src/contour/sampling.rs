//! Placement of sites along the curve and selection of refit points.

use super::ContourSettings;
use crate::geometry::Point2;
use crate::me::{MovingEdgeSettings, Site};
use crate::nurbs::Nurbs;

/// Cumulative chord length of a curve at evenly spaced parameters.
pub(crate) struct ArcTable {
    params: Vec<f64>,
    lengths: Vec<f64>,
}

impl ArcTable {
    pub(crate) fn new(curve: &Nurbs, samples: usize) -> Self {
        let samples = samples.max(1);
        let (u0, u1) = curve.domain();
        let mut params = Vec::with_capacity(samples + 1);
        let mut lengths = Vec::with_capacity(samples + 1);
        let mut prev = curve.point(u0);
        let mut acc = 0.0;
        params.push(u0);
        lengths.push(0.0);
        for k in 1..=samples {
            let u = u0 + (u1 - u0) * k as f64 / samples as f64;
            let p = curve.point(u);
            acc += prev.distance(&p);
            prev = p;
            params.push(u);
            lengths.push(acc);
        }
        Self { params, lengths }
    }

    pub(crate) fn total(&self) -> f64 {
        self.lengths.last().copied().unwrap_or(0.0)
    }

    /// Parameter at arc length `s`, linear between table entries.
    pub(crate) fn param_at(&self, s: f64) -> f64 {
        let s = s.clamp(0.0, self.total());
        let idx = self.lengths.partition_point(|&l| l < s);
        if idx == 0 {
            return self.params[0];
        }
        let (l0, l1) = (self.lengths[idx - 1], self.lengths[idx]);
        let t = if l1 > l0 { (s - l0) / (l1 - l0) } else { 0.0 };
        self.params[idx - 1] + t * (self.params[idx] - self.params[idx - 1])
    }
}

/// Distance between consecutive sites for a contour of length `length`.
pub fn sampling_step(me: &MovingEdgeSettings, length: f64) -> f64 {
    if me.ntotal_sample > 0 {
        (length / me.ntotal_sample as f64).max(me.min_sample_step)
    } else {
        me.sample_step
    }
}

/// Sites evenly spaced in arc length along `curve`, with normals from the
/// curve and parameters set. Sites within `strip` pixels of the border are
/// dropped; the count is capped by `points_to_track`.
pub fn sample_sites(
    curve: &Nurbs,
    me: &MovingEdgeSettings,
    settings: &ContourSettings,
    width: usize,
    height: usize,
) -> Vec<Site> {
    let table = ArcTable::new(curve, settings.arc_samples);
    let length = table.total();
    let mut step = sampling_step(me, length);
    // round-off in the measured length must not drop the last site
    let mut count = if step > 0.0 && length > 0.0 {
        (length / step + 1e-9).floor() as usize + 1
    } else {
        1
    };
    if me.points_to_track > 0 && count > me.points_to_track {
        count = me.points_to_track;
        step = if count > 1 { length / (count - 1) as f64 } else { 0.0 };
    }
    let margin = me.strip as f64;
    let sites: Vec<Site> = (0..count)
        .filter_map(|k| {
            let u = table.param_at(k as f64 * step);
            let p = curve.point(u);
            let mut site = Site::new(p.y, p.x, curve.normal_angle(u)).with_param(u);
            site.mask_sign = me.mask_sign;
            site.is_inside(width, height, margin).then_some(site)
        })
        .collect();
    log::debug!(
        "sample_sites: length={:.1}px step={:.2}px kept {}/{} sites",
        length,
        step,
        sites.len(),
        count
    );
    sites
}

/// Positions of the good sites ordered by curve parameter, thinned so that
/// consecutive points are at least `min_distance` apart. The last good site
/// is always kept so the refit spans the whole tracked contour.
pub fn fit_points(sites: &[Site], min_distance: f64) -> Vec<Point2> {
    let mut good: Vec<&Site> = sites.iter().filter(|s| s.is_good()).collect();
    good.sort_by(|a, b| a.u.total_cmp(&b.u));
    let min_distance = min_distance.max(f64::EPSILON);

    let mut kept: Vec<Point2> = Vec::with_capacity(good.len());
    let mut skipped_tail = None;
    for s in good {
        let p = Point2::new(s.j, s.i);
        match kept.last() {
            Some(last) if last.distance(&p) < min_distance => skipped_tail = Some(p),
            _ => {
                kept.push(p);
                skipped_tail = None;
            }
        }
    }
    if let Some(tail) = skipped_tail {
        if kept.len() >= 2 {
            let last = kept.len() - 1;
            kept[last] = tail;
        } else if kept.first().is_some_and(|first| first.distance(&tail) > 0.0) {
            kept.push(tail);
        }
    }
    kept
}

//! One-dimensional edge search along a site normal.
//!
//! A search is split in two passes so that the automatic threshold can see
//! every response of the frame before any site is accepted or rejected:
//! [`scan_site`] convolves the orientation-matched mask at every candidate
//! offset, [`resolve_site`] applies threshold, polarity and contrast tests
//! and moves the site.

use super::{MovingEdgeSettings, Site, SiteState};
use crate::image::ImageView;
use crate::mask::MaskBank;

const EPS: f64 = 1e-9;

/// Whether the site already carries a reference contrast.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchMode {
    /// First search after (re)sampling: no contrast test, sets `convlt`.
    Initial,
    /// Frame-to-frame tracking: response must stay within the contrast band.
    Tracking,
}

/// Mask response at one offset along the normal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    /// Offset index `k` in `[-range, range]`.
    pub step: i32,
    /// Signed offset in pixels.
    pub offset: f64,
    pub i: f64,
    pub j: f64,
    pub conv: f64,
    pub likelihood: f64,
}

/// All candidates of one site in scan order `0, -1, +1, -2, +2, …`.
#[derive(Clone, Debug, Default)]
pub struct SiteScan {
    pub mask_index: usize,
    pub candidates: Vec<Candidate>,
}

impl SiteScan {
    /// Strongest likelihood regardless of any acceptance test.
    pub fn best_likelihood(&self) -> f64 {
        self.candidates
            .iter()
            .map(|c| c.likelihood)
            .fold(0.0, f64::max)
    }

    fn at_step(&self, step: i32) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.step == step)
    }
}

/// Offsets in the order they are examined; earlier offsets win ties.
pub fn scan_order(range: u32) -> impl Iterator<Item = i32> {
    let range = range as i32;
    std::iter::once(0).chain((1..=range).flat_map(|k| [-k, k]))
}

/// Correlate mask `k` with the window centred on pixel `(row, col)`.
///
/// Returns `0` when the window is not entirely inside the image.
pub fn convolve<I>(image: &I, bank: &MaskBank, k: usize, row: i64, col: i64) -> f64
where
    I: ImageView<Pixel = u8> + ?Sized,
{
    let n = bank.size();
    let half = (n / 2) as i64;
    let (r0, c0) = (row - half, col - half);
    if !image.contains_window(c0 as isize, r0 as isize, n) {
        return 0.0;
    }
    let mask = bank.mask(k);
    let (r0, c0) = (r0 as usize, c0 as usize);
    let mut acc = 0.0;
    for r in 0..n {
        let pixels = &image.row(r0 + r)[c0..c0 + n];
        acc += pixels
            .iter()
            .zip(mask.row(r))
            .map(|(&p, &w)| p as f64 * w)
            .sum::<f64>();
    }
    acc
}

/// Evaluate every candidate offset of `site`.
pub fn scan_site<I>(image: &I, bank: &MaskBank, settings: &MovingEdgeSettings, site: &Site) -> SiteScan
where
    I: ImageView<Pixel = u8> + ?Sized,
{
    let (di, dj) = site.normal();
    let mask_index = bank.index_for_normal(site.alpha);
    let mut candidates = Vec::with_capacity(2 * settings.range as usize + 1);
    for step in scan_order(settings.range) {
        let offset = step as f64 * settings.search_step;
        let i = site.i + offset * di;
        let j = site.j + offset * dj;
        let conv = convolve(image, bank, mask_index, i.round() as i64, j.round() as i64);
        candidates.push(Candidate {
            step,
            offset,
            i,
            j,
            conv,
            likelihood: settings.likelihood(conv),
        });
    }
    SiteScan {
        mask_index,
        candidates,
    }
}

/// Accept the best candidate of `scan` and move `site` onto it, or mark the
/// site as an outlier and leave its position untouched.
pub fn resolve_site(
    site: &mut Site,
    scan: &SiteScan,
    settings: &MovingEdgeSettings,
    threshold: f64,
    mode: SearchMode,
) -> SiteState {
    let (lo, hi) = settings.contrast_band();
    let check_contrast = mode == SearchMode::Tracking && site.convlt.abs() > EPS;
    // the automatic threshold can equal the frame's best response
    let inclusive = settings.use_automatic_threshold;
    let accepted: Vec<&Candidate> = scan
        .candidates
        .iter()
        .filter(|c| c.likelihood > threshold || (inclusive && c.likelihood > 0.0 && c.likelihood >= threshold))
        .filter(|c| site.mask_sign == 0 || c.conv * site.mask_sign as f64 > 0.0)
        .filter(|c| {
            if !check_contrast {
                return true;
            }
            let ratio = c.conv / site.convlt;
            ratio > lo && ratio < hi
        })
        .collect();

    let mut best: Option<&Candidate> = None;
    for c in &accepted {
        if best.map_or(true, |b| c.likelihood > b.likelihood) {
            best = Some(c);
        }
    }
    let Some(best) = best else {
        site.state = SiteState::Outlier;
        site.likelihood = 0.0;
        site.displacement = 0.0;
        return site.state;
    };

    let mut state = SiteState::Good;
    if settings.num_candidates > 1 {
        let mut ranked = accepted.clone();
        ranked.sort_by(|a, b| b.likelihood.total_cmp(&a.likelihood));
        let ambiguous = ranked
            .iter()
            .take(settings.num_candidates)
            .filter(|c| (c.step - best.step).abs() > 1)
            .any(|c| c.likelihood >= settings.ambiguity_ratio * best.likelihood);
        if ambiguous {
            state = SiteState::Suspicious;
        }
    }

    let mut offset = best.offset;
    if settings.subpixel {
        offset += settings.search_step * parabolic_shift(scan, best);
    }
    let (di, dj) = site.normal();
    site.i += offset * di;
    site.j += offset * dj;
    site.displacement = offset.abs();
    site.convlt = best.conv;
    site.likelihood = best.likelihood;
    site.state = state;
    state
}

/// Vertex of the parabola through the likelihoods at `best.step - 1`,
/// `best.step`, `best.step + 1`, in steps, within `[-0.5, 0.5]`.
fn parabolic_shift(scan: &SiteScan, best: &Candidate) -> f64 {
    let (Some(prev), Some(next)) = (scan.at_step(best.step - 1), scan.at_step(best.step + 1)) else {
        return 0.0;
    };
    let (f0, f1, f2) = (prev.likelihood, best.likelihood, next.likelihood);
    let curvature = f0 - 2.0 * f1 + f2;
    if curvature > -EPS {
        return 0.0;
    }
    (0.5 * (f0 - f2) / curvature).clamp(-0.5, 0.5)
}

/// Scan and resolve a single site.
pub fn search_site<I>(
    image: &I,
    bank: &MaskBank,
    settings: &MovingEdgeSettings,
    site: &mut Site,
    threshold: f64,
    mode: SearchMode,
) -> SiteState
where
    I: ImageView<Pixel = u8> + ?Sized,
{
    let scan = scan_site(image, bank, settings, site);
    resolve_site(site, &scan, settings, threshold, mode)
}

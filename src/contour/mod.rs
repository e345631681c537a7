//! Moving-edge contour tracked through a NURBS curve.
//!
//! [`NurbsContour`] owns the curve and the sites sampled along it. Every
//! frame the sites are searched along their normals, the curve is refitted
//! from the good sites and each site is re-projected onto the new curve to
//! refresh its parameter and normal. When too many sites are lost the
//! contour is resampled from the refitted curve.

mod options;
pub mod sampling;

pub use options::{ContourSettings, FitMode};
pub use sampling::{fit_points, sample_sites, sampling_step};

use crate::error::{ensure_config, Result, TrackerError};
use crate::geometry::Point2;
use crate::image::ImageView;
use crate::me::{EdgeTracker, MovingEdgeSettings, SearchMode, Site, SiteState, TrackStats};
use crate::nurbs::Nurbs;
use serde::Serialize;

/// Outcome of one contour update.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContourReport {
    pub stats: TrackStats,
    /// Points handed to the curve fit.
    pub fit_points: usize,
    /// False when the previous curve was kept.
    pub refitted: bool,
    pub resampled: bool,
    pub control_points: usize,
    pub sites: usize,
}

#[derive(Clone, Debug)]
pub struct NurbsContour {
    settings: ContourSettings,
    tracker: EdgeTracker,
    curve: Option<Nurbs>,
    sites: Vec<Site>,
}

impl NurbsContour {
    pub fn new(me: MovingEdgeSettings, settings: ContourSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            tracker: EdgeTracker::new(me)?,
            curve: None,
            sites: Vec::new(),
        })
    }

    pub fn settings(&self) -> &ContourSettings {
        &self.settings
    }

    pub fn edge_tracker(&self) -> &EdgeTracker {
        &self.tracker
    }

    pub fn edge_tracker_mut(&mut self) -> &mut EdgeTracker {
        &mut self.tracker
    }

    pub fn curve(&self) -> Option<&Nurbs> {
        self.curve.as_ref()
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    /// Fit the initial curve through `points` (image `(x, y)` = column,
    /// row), sample sites along it and run the initial search that records
    /// each site's reference contrast.
    pub fn initialize<I>(&mut self, image: &I, points: &[Point2]) -> Result<ContourReport>
    where
        I: ImageView<Pixel = u8> + Sync,
    {
        let degree = self.settings.degree;
        ensure_config(points.len() > degree, || {
            format!(
                "contour initialisation needs at least {} points, got {}",
                degree + 1,
                points.len()
            )
        })?;
        let curve = self.fit(points)?;
        self.sites = sample_sites(
            &curve,
            self.tracker.settings(),
            &self.settings,
            image.width(),
            image.height(),
        );
        let stats = self.tracker.track(image, &mut self.sites, SearchMode::Initial);
        let report = ContourReport {
            stats,
            fit_points: points.len(),
            refitted: true,
            resampled: true,
            control_points: curve.control_points().len(),
            sites: self.sites.len(),
        };
        self.curve = Some(curve);
        log::debug!(
            "NurbsContour::initialize {} points -> {} sites ({} good)",
            points.len(),
            report.sites,
            stats.counts.good
        );
        Ok(report)
    }

    /// Track the contour into `image`.
    ///
    /// Fitting failures are not errors: with too few good sites, or a
    /// singular fit, the previous curve is kept and `refitted` is false.
    pub fn track<I>(&mut self, image: &I) -> Result<ContourReport>
    where
        I: ImageView<Pixel = u8> + Sync,
    {
        if self.curve.is_none() {
            return Err(TrackerError::config("contour tracked before initialisation"));
        }
        let stats = self.tracker.track(image, &mut self.sites, SearchMode::Tracking);

        let points = fit_points(&self.sites, self.settings.min_point_distance);
        let mut refitted = false;
        if points.len() > self.settings.degree {
            match self.fit(&points) {
                Ok(curve) => {
                    self.curve = Some(curve);
                    refitted = true;
                }
                Err(e) => log::warn!("NurbsContour::track refit failed, keeping previous curve: {e}"),
            }
        } else {
            log::debug!(
                "NurbsContour::track only {} fit points, keeping previous curve",
                points.len()
            );
        }

        let Some(curve) = self.curve.as_ref() else {
            return Err(TrackerError::internal("contour curve vanished during tracking"));
        };
        if refitted {
            reproject(curve, &mut self.sites);
        }

        let mut resampled = false;
        if stats.counts.good_ratio() < self.settings.resample_ratio {
            self.sites = sample_sites(
                curve,
                self.tracker.settings(),
                &self.settings,
                image.width(),
                image.height(),
            );
            self.tracker.track(image, &mut self.sites, SearchMode::Initial);
            resampled = true;
        }

        let report = ContourReport {
            stats,
            fit_points: points.len(),
            refitted,
            resampled,
            control_points: curve.control_points().len(),
            sites: self.sites.len(),
        };
        log::debug!(
            "NurbsContour::track good={} fit_points={} refitted={} resampled={}",
            stats.counts.good,
            report.fit_points,
            refitted,
            resampled
        );
        Ok(report)
    }

    fn fit(&self, points: &[Point2]) -> Result<Nurbs> {
        let degree = self.settings.degree;
        match self.settings.fit_mode {
            FitMode::Approximate if points.len() > self.settings.control_points => {
                Nurbs::global_approximate(degree, points, self.settings.control_points)
            }
            _ => Nurbs::global_interpolate(degree, points),
        }
    }
}

/// Refresh parameter and normal of every site against `curve`. Outliers are
/// moved onto the curve so they can be found again next frame.
fn reproject(curve: &Nurbs, sites: &mut [Site]) {
    for site in sites.iter_mut() {
        let u = curve.closest_param(Point2::new(site.j, site.i), site.u);
        site.u = u;
        site.alpha = curve.normal_angle(u);
        if site.state == SiteState::Outlier {
            let p = curve.point(u);
            site.i = p.y;
            site.j = p.x;
        }
    }
    sites.sort_by(|a, b| a.u.total_cmp(&b.u));
}

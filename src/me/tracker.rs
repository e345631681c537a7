use super::search::{convolve, resolve_site, scan_site, SearchMode, SiteScan};
use super::{AdaptiveThreshold, MovingEdgeSettings, Site, SiteCounts, SiteState};
use crate::error::Result;
use crate::image::ImageView;
use crate::mask::MaskBank;
use serde::Serialize;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Controls whether the per-site scan runs sequentially or with Rayon.
#[derive(Clone, Copy, Debug)]
pub struct ParallelOptions {
    enabled: bool,
    min_sites_for_parallel: usize,
}

impl ParallelOptions {
    pub fn new(enabled: bool, min_sites_for_parallel: usize) -> Self {
        Self {
            enabled,
            min_sites_for_parallel: min_sites_for_parallel.max(1),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            min_sites_for_parallel: usize::MAX,
        }
    }

    /// Returns true when parallel scanning should be used for `site_count`.
    pub fn should_parallelize(&self, site_count: usize) -> bool {
        self.enabled && site_count >= self.min_sites_for_parallel
    }
}

impl Default for ParallelOptions {
    fn default() -> Self {
        Self {
            enabled: cfg!(feature = "parallel"),
            min_sites_for_parallel: 128,
        }
    }
}

/// Summary of one tracking pass over a set of sites.
#[derive(Clone, Copy, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackStats {
    pub counts: SiteCounts,
    /// Likelihood threshold used for this pass.
    pub threshold: f64,
    /// Largest likelihood over all candidates of all sites.
    pub best_response: f64,
    /// Mean displacement of the accepted sites (pixels).
    pub mean_displacement: f64,
}

/// Owner of the mask bank and settings; tracks site sets frame after frame.
#[derive(Clone, Debug)]
pub struct EdgeTracker {
    settings: MovingEdgeSettings,
    bank: MaskBank,
    adaptive: Option<AdaptiveThreshold>,
    parallel: ParallelOptions,
}

impl EdgeTracker {
    pub fn new(settings: MovingEdgeSettings) -> Result<Self> {
        settings.validate()?;
        let bank = MaskBank::new(settings.mask_size, settings.mask_number)?;
        let adaptive = settings
            .use_automatic_threshold
            .then(|| AdaptiveThreshold::new(&settings));
        Ok(Self {
            settings,
            bank,
            adaptive,
            parallel: ParallelOptions::default(),
        })
    }

    pub fn with_parallel(mut self, parallel: ParallelOptions) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn settings(&self) -> &MovingEdgeSettings {
        &self.settings
    }

    pub fn bank(&self) -> &MaskBank {
        &self.bank
    }

    pub fn adaptive_threshold(&self) -> Option<&AdaptiveThreshold> {
        self.adaptive.as_ref()
    }

    /// Replace the settings. The mask bank is rebuilt only when the mask
    /// size or count changed.
    pub fn set_settings(&mut self, settings: MovingEdgeSettings) -> Result<()> {
        settings.validate()?;
        if !self.bank.matches(settings.mask_size, settings.mask_number) {
            self.bank = MaskBank::new(settings.mask_size, settings.mask_number)?;
        }
        self.adaptive = settings
            .use_automatic_threshold
            .then(|| AdaptiveThreshold::new(&settings));
        self.settings = settings;
        Ok(())
    }

    /// Search every site once and update it in place.
    pub fn track<I>(&mut self, image: &I, sites: &mut [Site], mode: SearchMode) -> TrackStats
    where
        I: ImageView<Pixel = u8> + Sync,
    {
        if sites.is_empty() {
            return TrackStats::default();
        }
        let scans = self.scan_all(image, sites);
        let best_response = scans
            .iter()
            .map(SiteScan::best_likelihood)
            .fold(0.0, f64::max);
        let threshold = match self.adaptive.as_mut() {
            Some(adaptive) => adaptive.update(scans.iter().map(SiteScan::best_likelihood)),
            None => self.settings.likelihood_threshold(),
        };

        let mut moved = 0.0;
        let mut accepted = 0usize;
        for (site, scan) in sites.iter_mut().zip(&scans) {
            if resolve_site(site, scan, &self.settings, threshold, mode).is_accepted() {
                moved += site.displacement;
                accepted += 1;
            }
        }
        let counts = SiteCounts::from_sites(sites);
        log::debug!(
            "EdgeTracker::track {:?}: {} sites, good={} suspicious={} outlier={} threshold={:.4}",
            mode,
            sites.len(),
            counts.good,
            counts.suspicious,
            counts.outlier,
            threshold
        );
        TrackStats {
            counts,
            threshold,
            best_response,
            mean_displacement: if accepted > 0 {
                moved / accepted as f64
            } else {
                0.0
            },
        }
    }

    /// Record in every site the mask response at its current position in
    /// `image`, without moving it. Sites placed from a model projection use
    /// this on the previous frame before being tracked into the next one.
    pub fn init_reference<I>(&self, image: &I, sites: &mut [Site])
    where
        I: ImageView<Pixel = u8> + Sync,
    {
        for site in sites.iter_mut() {
            let k = self.bank.index_for_normal(site.alpha);
            site.convlt = convolve(image, &self.bank, k, site.i.round() as i64, site.j.round() as i64);
            site.state = SiteState::Good;
        }
    }

    fn scan_all<I>(&self, image: &I, sites: &[Site]) -> Vec<SiteScan>
    where
        I: ImageView<Pixel = u8> + Sync,
    {
        if self.parallel.should_parallelize(sites.len()) {
            #[cfg(feature = "parallel")]
            {
                return sites
                    .par_iter()
                    .map(|site| scan_site(image, &self.bank, &self.settings, site))
                    .collect();
            }
        }
        sites
            .iter()
            .map(|site| scan_site(image, &self.bank, &self.settings, site))
            .collect()
    }
}

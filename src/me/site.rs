use serde::{Deserialize, Serialize};

/// Outcome of the last search for a site.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SiteState {
    /// An edge was found and accepted.
    #[default]
    Good,
    /// An edge was accepted but a distant runner-up scored almost as well.
    Suspicious,
    /// No candidate passed the threshold and contrast tests.
    Outlier,
}

impl SiteState {
    #[inline]
    pub fn is_accepted(self) -> bool {
        self != SiteState::Outlier
    }
}

/// A tracked contour sample.
///
/// `i` is the row and `j` the column, both sub-pixel. `alpha` is the angle of
/// the contour normal, so the search direction is `(sin α, cos α)` in
/// `(i, j)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub i: f64,
    pub j: f64,
    pub alpha: f64,
    /// Polarity constraint: `0` any, `±1` fixed sign of the response.
    pub mask_sign: i8,
    /// Reference mask response, set by the initial search.
    pub convlt: f64,
    pub likelihood: f64,
    pub state: SiteState,
    /// Parameter of the site on the contour curve.
    pub u: f64,
    /// Distance moved by the last search (pixels).
    pub displacement: f64,
}

impl Site {
    pub fn new(i: f64, j: f64, alpha: f64) -> Self {
        Self {
            i,
            j,
            alpha,
            mask_sign: 0,
            convlt: 0.0,
            likelihood: 0.0,
            state: SiteState::Good,
            u: 0.0,
            displacement: 0.0,
        }
    }

    pub fn with_param(mut self, u: f64) -> Self {
        self.u = u;
        self
    }

    #[inline]
    pub fn is_good(&self) -> bool {
        self.state == SiteState::Good
    }

    /// Usable for refitting and pose estimation this frame.
    #[inline]
    pub fn is_inlier(&self) -> bool {
        self.state != SiteState::Outlier
    }

    /// Unit search direction `(di, dj)`.
    #[inline]
    pub fn normal(&self) -> (f64, f64) {
        self.alpha.sin_cos()
    }

    /// True when the site lies at least `margin` pixels inside a
    /// `width × height` image.
    pub fn is_inside(&self, width: usize, height: usize, margin: f64) -> bool {
        self.i >= margin
            && self.j >= margin
            && self.i <= height as f64 - 1.0 - margin
            && self.j <= width as f64 - 1.0 - margin
    }
}

/// Per-state site counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteCounts {
    pub good: usize,
    pub suspicious: usize,
    pub outlier: usize,
}

impl SiteCounts {
    pub fn from_sites(sites: &[Site]) -> Self {
        let mut counts = Self::default();
        for s in sites {
            match s.state {
                SiteState::Good => counts.good += 1,
                SiteState::Suspicious => counts.suspicious += 1,
                SiteState::Outlier => counts.outlier += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.good + self.suspicious + self.outlier
    }

    /// Fraction of good sites, `0` without sites.
    pub fn good_ratio(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.good as f64 / total as f64
        }
    }
}

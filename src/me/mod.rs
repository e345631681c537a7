//! Moving-edge site tracking.
//!
//! Every [`Site`] is a contour sample with a normal direction. Each frame the
//! orientation-matched mask of the [`MaskBank`](crate::mask::MaskBank) is
//! correlated with the image at a handful of offsets along that normal; the
//! best offset that clears the likelihood threshold (and, while tracking,
//! keeps a contrast close to the reference) becomes the new site position.
//! Sites without an acceptable candidate become outliers; they keep their
//! position and are retried next frame.
//!
//! - [`settings`]: parameters, threshold modes and validation.
//! - [`search`]: per-site scan and acceptance.
//! - [`threshold`]: automatic per-frame threshold.
//! - [`tracker`]: [`EdgeTracker`], which owns the masks and drives the
//!   search over a site set, optionally in parallel.

pub mod search;
pub mod settings;
mod site;
pub mod threshold;
pub mod tracker;

pub use search::{search_site, SearchMode};
pub use settings::{MovingEdgeSettings, ThresholdType};
pub use site::{Site, SiteCounts, SiteState};
pub use threshold::AdaptiveThreshold;
pub use tracker::{EdgeTracker, ParallelOptions, TrackStats};

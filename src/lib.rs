#![doc = include_str!("../README.md")]

// Moving-edge contour tracking
pub mod angle;
pub mod contour;
pub mod geometry;
pub mod mask;
pub mod me;
pub mod nurbs;

// Pose estimation
pub mod camera;
pub mod features;
pub mod optimizer;
pub mod se3;
pub mod session;

// Shared infrastructure
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod image;

// --- High-level re-exports -------------------------------------------------

pub use crate::camera::CameraIntrinsics;
pub use crate::contour::{ContourReport, ContourSettings, NurbsContour};
pub use crate::diagnostics::FrameReport;
pub use crate::error::{Result, TrackerError};
pub use crate::me::{EdgeTracker, MovingEdgeSettings, SearchMode, Site, SiteState};
pub use crate::nurbs::Nurbs;
pub use crate::optimizer::{
    FeatureContext, FeatureResidualBlock, FeatureTracker, OptimizationReport, OptimizationStatus,
    OptimizerParams, PoseOptimizer,
};
pub use crate::session::TrackingSession;

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use contour_tracker::prelude::*;
///
/// # fn main() -> contour_tracker::Result<()> {
/// let (w, h) = (320usize, 240usize);
/// let frame = GrayImage::filled(w, h, 0);
/// let points = [
///     Point2::new(40.0, 60.0),
///     Point2::new(120.0, 70.0),
///     Point2::new(200.0, 65.0),
///     Point2::new(280.0, 60.0),
/// ];
///
/// let mut contour = NurbsContour::new(MovingEdgeSettings::default(), ContourSettings::default())?;
/// let report = contour.initialize(&frame, &points)?;
/// println!("sites={} good={}", report.sites, report.stats.counts.good);
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::geometry::Point2;
    pub use crate::image::{GrayImage, ImageU8};
    pub use crate::{
        CameraIntrinsics, ContourSettings, FeatureTracker, MovingEdgeSettings, NurbsContour,
        OptimizerParams, PoseOptimizer, TrackingSession,
    };
}

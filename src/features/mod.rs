//! Concrete pose features fed to the [`PoseOptimizer`](crate::optimizer::PoseOptimizer).
//!
//! - [`silhouette`]: moving-edge sites on the model silhouette, point-to-line
//!   residuals.
//! - [`depth`]: point-to-plane residuals against a depth map.
//! - [`keypoints`]: reprojection residuals of matched points.

pub mod depth;
pub mod keypoints;
pub mod silhouette;

pub use depth::{DepthFeature, DepthSettings, SurfacePoint};
pub use keypoints::{KeypointFeature, KeypointMatch, KeypointSettings};
pub use silhouette::{SilhouetteEdgeFeature, SilhouettePoint, SilhouetteSettings};

//! JSON configuration.
//!
//! [`TrackerConfig`] mirrors the keys of the tracker configuration files
//! (`camera`, `vvs`, `features.{silhouetteGeometry,depth,keypoints}`);
//! keys the core does not consume (model path, silhouette extraction, colour
//! tracker) are ignored. [`demo`] holds the configuration of the
//! `contour_track_demo` binary.

pub mod demo;

use crate::camera::CameraIntrinsics;
use crate::contour::ContourSettings;
use crate::error::{Result, TrackerError};
use crate::features::{DepthSettings, KeypointSettings, SilhouetteSettings};
use crate::optimizer::OptimizerParams;
use crate::session::TrackingSession;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraConfig {
    pub intrinsics: CameraIntrinsics,
    pub height: usize,
    pub width: usize,
}

/// Enabled features; a missing entry disables the feature.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeaturesConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub silhouette_geometry: Option<SilhouetteSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<DepthSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keypoints: Option<KeypointSettings>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerConfig {
    pub camera: CameraConfig,
    #[serde(default)]
    pub vvs: OptimizerParams,
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub contour: ContourSettings,
}

impl TrackerConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| TrackerError::config(format!("invalid tracker JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let cam = &self.camera;
        cam.intrinsics.ensure_distortion_free()?;
        cam.intrinsics.validate()?;
        if cam.height == 0 || cam.width == 0 {
            return Err(TrackerError::config(format!(
                "camera image size must be non-zero, got {}x{}",
                cam.width, cam.height
            )));
        }
        self.vvs.validate()?;
        if let Some(s) = &self.features.silhouette_geometry {
            s.validate()?;
        }
        if let Some(d) = &self.features.depth {
            d.validate()?;
        }
        if let Some(k) = &self.features.keypoints {
            k.validate()?;
        }
        self.contour.validate()
    }

    /// Tracking session for this camera and optimiser, at the identity pose.
    pub fn session(&self) -> Result<TrackingSession> {
        TrackingSession::new(
            self.camera.intrinsics,
            self.camera.height,
            self.camera.width,
            self.vvs.clone(),
        )
    }
}

/// Read, parse and validate a tracker configuration file.
pub fn load_config(path: &Path) -> std::result::Result<TrackerConfig, String> {
    let data = fs::read_to_string(path).map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
    TrackerConfig::from_json_str(&data).map_err(|e| format!("Failed to load config {}: {e}", path.display()))
}

use crate::contour::ContourSettings;
use crate::me::MovingEdgeSettings;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DemoOutputConfig {
    /// Per-frame contour reports as one JSON array.
    pub json_out: Option<PathBuf>,
    /// Directory receiving one site overlay PNG per frame.
    pub overlay_dir: Option<PathBuf>,
}

/// Configuration of the `contour_track_demo` binary.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContourDemoConfig {
    /// Grayscale frames, tracked in order.
    pub frames: Vec<PathBuf>,
    /// Initial contour points `[x, y]` (column, row) on the first frame.
    pub initial_points: Vec<[f64; 2]>,
    #[serde(default)]
    pub moving_edge: MovingEdgeSettings,
    #[serde(default)]
    pub contour: ContourSettings,
    #[serde(default)]
    pub output: DemoOutputConfig,
}

pub fn load_demo_config(path: &Path) -> Result<ContourDemoConfig, String> {
    let data = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
    let config: ContourDemoConfig = serde_json::from_str(&data)
        .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))?;
    if config.frames.is_empty() {
        return Err(format!("{}: no frames listed", path.display()));
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_demo_config() {
        let json = r#"{
            "frames": ["a.png", "b.png"],
            "initialPoints": [[10, 20], [30, 20], [50, 22], [70, 25]],
            "movingEdge": { "range": 6 },
            "output": { "jsonOut": "out/report.json" }
        }"#;
        let cfg: ContourDemoConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.frames.len(), 2);
        assert_eq!(cfg.initial_points[2], [50.0, 22.0]);
        assert_eq!(cfg.moving_edge.range, 6);
        assert_eq!(cfg.output.json_out, Some(PathBuf::from("out/report.json")));
        assert!(cfg.output.overlay_dir.is_none());
    }
}

//! I/O helpers used by the demo binary.
//!
//! - `load_grayscale_image`: read a PNG/JPEG into an owned 8-bit gray buffer.
//! - `save_site_overlay`: draw tracked sites over a frame as an RGB PNG.
//! - `write_json_file`: pretty-print a serializable value to disk.
use super::GrayImage;
use crate::me::{Site, SiteState};
use image::{Rgb, RgbImage};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Load an image from disk and convert to 8-bit grayscale.
pub fn load_grayscale_image(path: &Path) -> Result<GrayImage, String> {
    let img = image::open(path)
        .map_err(|e| format!("Failed to open {}: {e}", path.display()))?
        .into_luma8();
    let width = img.width() as usize;
    let height = img.height() as usize;
    GrayImage::new(width, height, img.into_raw()).map_err(|e| e.to_string())
}

/// Save `frame` with every site drawn as a 3×3 dot: green for good,
/// orange for suspicious, red for outliers.
pub fn save_site_overlay(frame: &GrayImage, sites: &[Site], path: &Path) -> Result<(), String> {
    ensure_parent_dir(path)?;
    let (w, h) = (frame.width() as u32, frame.height() as u32);
    let mut out = RgbImage::from_fn(w, h, |x, y| {
        let v = frame.data()[(y * w + x) as usize];
        Rgb([v, v, v])
    });
    for site in sites {
        let color = match site.state {
            SiteState::Good => Rgb([0, 220, 0]),
            SiteState::Suspicious => Rgb([255, 160, 0]),
            SiteState::Outlier => Rgb([230, 0, 0]),
        };
        let (cx, cy) = (site.j.round() as i64, site.i.round() as i64);
        for dy in -1..=1 {
            for dx in -1..=1 {
                let (x, y) = (cx + dx, cy + dy);
                if x >= 0 && y >= 0 && (x as u32) < w && (y as u32) < h {
                    out.put_pixel(x as u32, y as u32, color);
                }
            }
        }
    }
    out.save(path)
        .map_err(|e| format!("Failed to save {}: {e}", path.display()))
}

/// Serialize a value as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), String> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to serialize JSON for {}: {e}", path.display()))?;
    fs::write(path, json).map_err(|e| format!("Failed to write JSON {}: {e}", path.display()))
}

fn ensure_parent_dir(path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {e}", parent.display()))?;
        }
    }
    Ok(())
}

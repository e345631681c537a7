use contour_tracker::config::demo::load_demo_config;
use contour_tracker::contour::{ContourReport, NurbsContour};
use contour_tracker::geometry::Point2;
use contour_tracker::image::io::{load_grayscale_image, save_site_overlay, write_json_file};
use serde::Serialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FrameOutput {
    frame: PathBuf,
    elapsed_ms: f64,
    report: ContourReport,
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let config_path = env::args().nth(1).ok_or_else(usage)?;
    let config = load_demo_config(Path::new(&config_path))?;

    let points: Vec<Point2> = config
        .initial_points
        .iter()
        .map(|&[x, y]| Point2::new(x, y))
        .collect();
    let mut contour =
        NurbsContour::new(config.moving_edge.clone(), config.contour.clone()).map_err(|e| e.to_string())?;

    let mut outputs = Vec::with_capacity(config.frames.len());
    for (index, path) in config.frames.iter().enumerate() {
        let frame = load_grayscale_image(path)?;
        let start = Instant::now();
        let report = if index == 0 {
            contour.initialize(&frame, &points)
        } else {
            contour.track(&frame)
        }
        .map_err(|e| format!("{}: {e}", path.display()))?;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        println!(
            "[{index:>3}] {}: sites={} good={} suspicious={} outlier={} refitted={} resampled={} ({elapsed_ms:.2} ms)",
            path.display(),
            report.sites,
            report.stats.counts.good,
            report.stats.counts.suspicious,
            report.stats.counts.outlier,
            report.refitted,
            report.resampled
        );
        if let Some(dir) = &config.output.overlay_dir {
            save_site_overlay(&frame, contour.sites(), &dir.join(format!("frame_{index:04}.png")))?;
        }
        outputs.push(FrameOutput {
            frame: path.clone(),
            elapsed_ms,
            report,
        });
    }

    if let Some(path) = &config.output.json_out {
        write_json_file(path, &outputs)?;
        println!("Contour reports written to {}", path.display());
    }
    Ok(())
}

fn usage() -> String {
    "Usage: contour_track_demo <config.json>".to_string()
}

//! Serialisable per-frame reports produced by the tracking session and the
//! demo binaries.

use crate::optimizer::OptimizationReport;
use serde::{Deserialize, Serialize};

/// Wall-clock duration of one stage of a frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTiming {
    pub label: String,
    pub elapsed_ms: f64,
}

impl StageTiming {
    pub fn new(label: impl Into<String>, elapsed_ms: f64) -> Self {
        Self {
            label: label.into(),
            elapsed_ms,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingBreakdown {
    pub total_ms: f64,
    pub stages: Vec<StageTiming>,
}

impl TimingBreakdown {
    pub fn with_total(total_ms: f64) -> Self {
        Self {
            total_ms,
            stages: Vec::new(),
        }
    }

    pub fn push(&mut self, label: impl Into<String>, elapsed_ms: f64) {
        self.stages.push(StageTiming::new(label, elapsed_ms));
    }

    /// Sum of the recorded stages.
    pub fn stages_ms(&self) -> f64 {
        self.stages.iter().map(|s| s.elapsed_ms).sum()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDescriptor {
    pub width: usize,
    pub height: usize,
}

/// Result of [`TrackingSession::track_frame`](crate::session::TrackingSession::track_frame).
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameReport {
    /// Zero-based index of the frame within the session.
    pub frame_index: usize,
    pub input: InputDescriptor,
    /// False when the optimiser had nothing to work with and the session
    /// kept its previous pose.
    pub pose_updated: bool,
    pub optimization: OptimizationReport,
    pub timings: TimingBreakdown,
}

impl FrameReport {
    /// One-line summary for logs and demo output.
    pub fn summary(&self) -> String {
        let t = self.optimization.pose.translation.vector;
        format!(
            "frame {} {:?}: {} iterations, cost {}, t=[{:.4}, {:.4}, {:.4}], {:.2} ms",
            self.frame_index,
            self.optimization.status,
            self.optimization.iterations,
            self.optimization
                .final_cost()
                .map(|c| format!("{c:.3e}"))
                .unwrap_or_else(|| "-".to_string()),
            t.x,
            t.y,
            t.z,
            self.timings.total_ms
        )
    }
}

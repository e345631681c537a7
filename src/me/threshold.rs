use super::MovingEdgeSettings;
use serde::Serialize;

/// Per-frame likelihood threshold derived from the strongest response.
///
/// Each frame the threshold becomes
/// `max(min_threshold, best_response · (1 − margin_ratio))`, where
/// `best_response` is the largest likelihood over every candidate of every
/// site of the frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveThreshold {
    margin_ratio: f64,
    floor: f64,
    best_response: f64,
    current: f64,
    frames: u64,
}

impl AdaptiveThreshold {
    /// Build from validated settings; the floor is mapped onto the
    /// likelihood scale of the configured threshold type.
    pub fn new(settings: &MovingEdgeSettings) -> Self {
        let floor = settings.to_likelihood_scale(settings.min_threshold.max(0.0));
        Self {
            margin_ratio: settings.threshold_margin_ratio.clamp(0.0, 1.0),
            floor,
            best_response: 0.0,
            current: floor,
            frames: 0,
        }
    }

    /// Fold this frame's best responses in and return the new threshold.
    pub fn update(&mut self, responses: impl IntoIterator<Item = f64>) -> f64 {
        let best = responses.into_iter().fold(0.0, f64::max);
        self.best_response = best;
        self.current = self.floor.max(best * (1.0 - self.margin_ratio));
        self.frames += 1;
        log::trace!(
            "AdaptiveThreshold::update best={:.4} threshold={:.4}",
            best,
            self.current
        );
        self.current
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn best_response(&self) -> f64 {
        self.best_response
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

use crate::error::{ensure_config, Result};
use crate::mask;
use serde::{Deserialize, Serialize};

/// How the raw mask response is turned into a likelihood and which scale the
/// user threshold lives on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdType {
    /// Absolute threshold on `|2·conv|`, scaled by `100 · n · floor(n/2)`.
    ///
    /// Deprecated: the threshold depends on image contrast and mask size.
    /// It stays the default so that existing configurations keep producing
    /// the same tracks; prefer [`ThresholdType::Normalized`].
    #[default]
    Old,
    /// Likelihood `|conv| / 255` compared against `threshold / 255`.
    Normalized,
}

/// Moving-edge search parameters.
///
/// Defaults reproduce the historical moving-edge defaults (5×5 masks, 180
/// orientations, ±4 px search, old threshold of 10000).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MovingEdgeSettings {
    /// Side of the square convolution masks.
    pub mask_size: usize,
    /// Number of mask orientations over `[0, 180)`.
    #[serde(rename = "nMask")]
    pub mask_number: usize,
    /// Half-length (in steps) of the search along the normal.
    pub range: u32,
    /// Distance in pixels between two consecutive candidates.
    pub search_step: f64,
    pub threshold_type: ThresholdType,
    /// Likelihood threshold, on the scale selected by `threshold_type`.
    pub threshold: f64,
    /// Derive the threshold from the strongest response of the frame.
    pub use_automatic_threshold: bool,
    /// Fraction below the best response still accepted in automatic mode.
    /// Negative means unset.
    pub threshold_margin_ratio: f64,
    /// Floor of the automatic threshold, same scale as `threshold`.
    /// Negative means unset.
    pub min_threshold: f64,
    /// Contrast tolerance `[mu1, mu2]` around the reference response.
    pub mu: [f64; 2],
    /// Sampling step along the contour (pixels).
    pub sample_step: f64,
    /// Lower bound on the sampling step when it is derived from
    /// `ntotal_sample`.
    pub min_sample_step: f64,
    /// Border (pixels) kept free of sites.
    pub strip: u32,
    /// Polarity of the tracked edge: `0` any, `±1` fixed.
    pub mask_sign: i8,
    /// Maximum number of sites; `0` disables the cap.
    pub points_to_track: usize,
    /// Total number of samples along the contour; `0` uses `sample_step`.
    pub ntotal_sample: usize,
    /// Number of candidates compared when flagging ambiguous matches.
    pub num_candidates: usize,
    /// A runner-up at least this fraction of the best marks the site
    /// suspicious.
    pub ambiguity_ratio: f64,
    /// Parabolic refinement of the accepted offset.
    pub subpixel: bool,
}

impl Default for MovingEdgeSettings {
    fn default() -> Self {
        Self {
            mask_size: 5,
            mask_number: 180,
            range: 4,
            search_step: 1.0,
            threshold_type: ThresholdType::Old,
            threshold: 10000.0,
            use_automatic_threshold: false,
            threshold_margin_ratio: -1.0,
            min_threshold: -1.0,
            mu: [0.5, 0.5],
            sample_step: 10.0,
            min_sample_step: 4.0,
            strip: 2,
            mask_sign: 0,
            points_to_track: 500,
            ntotal_sample: 0,
            num_candidates: 1,
            ambiguity_ratio: 0.9,
            subpixel: false,
        }
    }
}

impl MovingEdgeSettings {
    pub fn validate(&self) -> Result<()> {
        mask::validate(self.mask_size, self.mask_number)?;
        ensure_config(self.range >= 1, || "moving-edge range must be at least 1".into())?;
        ensure_config(self.search_step > 0.0, || {
            format!("search step must be positive (got {})", self.search_step)
        })?;
        ensure_config(self.sample_step > 0.0, || {
            format!("sample step must be positive (got {})", self.sample_step)
        })?;
        ensure_config(self.min_sample_step > 0.0, || {
            format!("min sample step must be positive (got {})", self.min_sample_step)
        })?;
        for (k, mu) in self.mu.iter().enumerate() {
            ensure_config((0.0..=1.0).contains(mu), || {
                format!("mu{} must lie in [0, 1] (got {mu})", k + 1)
            })?;
        }
        ensure_config(matches!(self.mask_sign, -1..=1), || {
            format!("mask sign must be -1, 0 or 1 (got {})", self.mask_sign)
        })?;
        ensure_config(self.num_candidates >= 1, || {
            "number of candidates must be at least 1".into()
        })?;
        ensure_config((0.0..=1.0).contains(&self.ambiguity_ratio), || {
            format!("ambiguity ratio must lie in [0, 1] (got {})", self.ambiguity_ratio)
        })?;
        if self.use_automatic_threshold {
            ensure_config((0.0..=1.0).contains(&self.threshold_margin_ratio), || {
                format!(
                    "automatic threshold needs a margin ratio in [0, 1] (got {})",
                    self.threshold_margin_ratio
                )
            })?;
            ensure_config(self.min_threshold >= 0.0, || {
                format!(
                    "automatic threshold needs a non-negative minimum (got {})",
                    self.min_threshold
                )
            })?;
        } else {
            ensure_config(self.threshold >= 0.0, || {
                format!("threshold must be non-negative (got {})", self.threshold)
            })?;
        }
        if self.threshold_type == ThresholdType::Old {
            log::debug!("moving-edge settings use the deprecated old threshold type");
        }
        Ok(())
    }

    /// Integer angle step between masks.
    #[inline]
    pub fn angle_step(&self) -> u32 {
        mask::angle_step(self.mask_number)
    }

    /// Likelihood of a raw mask response.
    #[inline]
    pub fn likelihood(&self, conv: f64) -> f64 {
        match self.threshold_type {
            ThresholdType::Normalized => conv.abs() / 255.0,
            ThresholdType::Old => (2.0 * conv).abs(),
        }
    }

    /// Map a user threshold onto the likelihood scale.
    pub fn to_likelihood_scale(&self, threshold: f64) -> f64 {
        match self.threshold_type {
            ThresholdType::Normalized => threshold / 255.0,
            ThresholdType::Old => {
                let n = self.mask_size as f64;
                threshold / (100.0 * n * (self.mask_size / 2) as f64)
            }
        }
    }

    /// Fixed likelihood threshold.
    #[inline]
    pub fn likelihood_threshold(&self) -> f64 {
        self.to_likelihood_scale(self.threshold)
    }

    /// Strict contrast band `(1 − mu1, 1 + mu2)` on `conv / convlt`.
    #[inline]
    pub fn contrast_band(&self) -> (f64, f64) {
        (1.0 - self.mu[0], 1.0 + self.mu[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn defaults_are_valid_and_use_old_threshold() {
        let s = MovingEdgeSettings::default();
        s.validate().unwrap();
        assert_eq!(s.threshold_type, ThresholdType::Old);
        assert_eq!(s.angle_step(), 1);
        // 10000 / (100 · 5 · 2)
        assert_relative_eq!(s.likelihood_threshold(), 10.0);
    }

    #[test]
    fn normalized_scale() {
        let s = MovingEdgeSettings {
            threshold_type: ThresholdType::Normalized,
            threshold: 20.0,
            ..Default::default()
        };
        assert_relative_eq!(s.likelihood_threshold(), 20.0 / 255.0);
        assert_relative_eq!(s.likelihood(-51.0), 0.2);
    }

    #[test]
    fn rejects_bad_values() {
        let bad = [
            MovingEdgeSettings { range: 0, ..Default::default() },
            MovingEdgeSettings { mask_size: 1, ..Default::default() },
            MovingEdgeSettings { mask_number: 200, ..Default::default() },
            MovingEdgeSettings { mu: [1.5, 0.5], ..Default::default() },
            MovingEdgeSettings { threshold: -1.0, ..Default::default() },
            MovingEdgeSettings { mask_sign: 2, ..Default::default() },
            MovingEdgeSettings { num_candidates: 0, ..Default::default() },
            MovingEdgeSettings { use_automatic_threshold: true, ..Default::default() },
        ];
        for s in bad {
            assert!(s.validate().unwrap_err().is_config(), "{s:?}");
        }
    }

    #[test]
    fn automatic_mode_ignores_fixed_threshold() {
        let s = MovingEdgeSettings {
            use_automatic_threshold: true,
            threshold_margin_ratio: 0.5,
            min_threshold: 5.0,
            threshold: -1.0,
            ..Default::default()
        };
        s.validate().unwrap();
    }

    #[test]
    fn deserializes_camel_case_keys() {
        let s: MovingEdgeSettings = serde_json::from_str(
            r#"{"maskSize": 7, "nMask": 90, "thresholdType": "normalized", "mu": [0.4, 0.6]}"#,
        )
        .unwrap();
        assert_eq!(s.mask_size, 7);
        assert_eq!(s.mask_number, 90);
        assert_eq!(s.angle_step(), 2);
        assert_eq!(s.threshold_type, ThresholdType::Normalized);
        assert_eq!(s.range, 4);
    }
}

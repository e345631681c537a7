//! Owned single-channel f32 image in row-major layout (stride == width).
//!
//! Used for depth maps (metres, `0` or non-finite for missing samples) and
//! for mask confidences in `[0, 1]`.

use crate::error::{ensure_config, Result};

#[derive(Clone, Debug)]
pub struct ImageF32 {
    /// Image width in pixels
    pub w: usize,
    /// Image height in pixels
    pub h: usize,
    /// Number of f32 elements between consecutive rows (equals `w`)
    pub stride: usize,
    /// Backing storage in row-major order
    pub data: Vec<f32>,
}

impl ImageF32 {
    /// Construct a zero-initialized buffer of size `w × h`.
    pub fn new(w: usize, h: usize) -> Self {
        Self {
            w,
            h,
            stride: w,
            data: vec![0.0; w * h],
        }
    }

    pub fn from_vec(w: usize, h: usize, data: Vec<f32>) -> Result<Self> {
        ensure_config(data.len() == w * h, || {
            format!("expected {} samples for {w}x{h}, got {}", w * h, data.len())
        })?;
        Ok(Self {
            w,
            h,
            stride: w,
            data,
        })
    }

    #[inline]
    pub fn idx(&self, x: usize, y: usize) -> usize {
        y * self.stride + x
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[self.idx(x, y)]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: f32) {
        let i = self.idx(x, y);
        self.data[i] = v;
    }

    /// Depth at `(x, y)` when present: finite and strictly positive.
    #[inline]
    pub fn depth_at(&self, x: usize, y: usize) -> Option<f64> {
        if x >= self.w || y >= self.h {
            return None;
        }
        let z = self.get(x, y);
        (z.is_finite() && z > 0.0).then_some(z as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_lookup_skips_missing_samples() {
        let mut depth = ImageF32::new(3, 2);
        depth.set(1, 1, 0.75);
        depth.set(2, 1, f32::NAN);
        assert_eq!(depth.depth_at(1, 1), Some(0.75));
        assert_eq!(depth.depth_at(0, 0), None);
        assert_eq!(depth.depth_at(2, 1), None);
        assert_eq!(depth.depth_at(3, 0), None);
    }

    #[test]
    fn from_vec_checks_length() {
        let img = ImageF32::from_vec(2, 2, vec![0.5, 1.0, 1.5, 2.0]).unwrap();
        assert_eq!(img.get(1, 1), 2.0);
        assert_eq!(img.idx(0, 1), 2);
        assert!(ImageF32::from_vec(2, 2, vec![0.0; 3]).unwrap_err().is_config());
    }
}

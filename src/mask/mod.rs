//! Bank of oriented edge-detection masks.
//!
//! Every mask approximates a directional step detector: a line through the
//! mask centre with orientation `θ_k` splits the `n×n` window; each cell is
//! weighted by the signed fraction of its area lying on the positive side of
//! the line, computed exactly by clipping the line against the cell (see
//! [`crate::geometry`]). Masks are normalised by `1 / (n · floor(n/2))` so
//! that a full-contrast, axis-aligned step produces a response equal to the
//! contrast for any mask size.
//!
//! The bank is built once for a `(size, count)` pair and is read-only
//! afterwards; changing either parameter means building a new bank.

mod build;

use crate::angle::{nearest_mask_index, tangent_deg_from_normal};
use crate::error::{ensure_config, Result};

/// Full angular range covered by the masks, in degrees.
pub const FLAT_ANGLE_DEG: u32 = 180;

/// Contiguous storage of `count` masks of `size × size` weights.
#[derive(Clone, Debug)]
pub struct MaskBank {
    size: usize,
    count: usize,
    step_deg: u32,
    data: Vec<f64>,
}

/// Borrowed view on a single mask, row-major.
#[derive(Clone, Copy, Debug)]
pub struct Mask<'a> {
    pub size: usize,
    pub angle_deg: u32,
    pub weights: &'a [f64],
}

impl<'a> Mask<'a> {
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.weights[row * self.size + col]
    }

    #[inline]
    pub fn row(&self, row: usize) -> &'a [f64] {
        &self.weights[row * self.size..(row + 1) * self.size]
    }
}

/// Integer angle step between consecutive masks. The truncation is part of
/// the contract: 7 masks are 25° apart, not 25.71°.
#[inline]
pub fn angle_step(count: usize) -> u32 {
    FLAT_ANGLE_DEG / count as u32
}

/// Validate a `(size, count)` pair.
pub fn validate(size: usize, count: usize) -> Result<()> {
    ensure_config(size >= 2, || {
        format!("mask size must be at least 2 (got {size})")
    })?;
    ensure_config(count >= 1, || "mask number must be at least 1".to_string())?;
    ensure_config(count <= FLAT_ANGLE_DEG as usize, || {
        format!("mask number must not exceed {FLAT_ANGLE_DEG} (got {count})")
    })
}

impl MaskBank {
    /// Build `count` masks of `size × size` cells.
    pub fn new(size: usize, count: usize) -> Result<Self> {
        validate(size, count)?;
        let step_deg = angle_step(count);
        let mut data = vec![0.0; count * size * size];
        for (k, chunk) in data.chunks_exact_mut(size * size).enumerate() {
            let angle = k as u32 * step_deg;
            build::fill_mask(angle as f64, size, chunk)?;
        }
        log::debug!("MaskBank::new built {count} masks of {size}x{size} (step {step_deg} deg)");
        Ok(Self {
            size,
            count,
            step_deg,
            data,
        })
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn angle_step(&self) -> u32 {
        self.step_deg
    }

    /// Orientation of every mask, in degrees.
    pub fn angles(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.count).map(move |k| k as u32 * self.step_deg)
    }

    #[inline]
    pub fn mask(&self, k: usize) -> Mask<'_> {
        let len = self.size * self.size;
        Mask {
            size: self.size,
            angle_deg: k as u32 * self.step_deg,
            weights: &self.data[k * len..(k + 1) * len],
        }
    }

    #[inline]
    pub fn get(&self, k: usize, row: usize, col: usize) -> f64 {
        self.data[(k * self.size + row) * self.size + col]
    }

    /// Mask matching a tangent orientation in degrees.
    #[inline]
    pub fn index_for_tangent_deg(&self, theta_deg: f64) -> usize {
        nearest_mask_index(theta_deg, self.step_deg, self.count)
    }

    /// Mask matching a site whose normal has angle `alpha` (radians).
    #[inline]
    pub fn index_for_normal(&self, alpha: f64) -> usize {
        self.index_for_tangent_deg(tangent_deg_from_normal(alpha))
    }

    /// True when the bank was built for exactly these parameters.
    pub fn matches(&self, size: usize, count: usize) -> bool {
        self.size == size && self.count == count
    }
}

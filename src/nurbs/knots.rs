//! Knot insertion, refinement and removal.
//!
//! All three work on homogeneous control points `(w·x, w·y, w)` so that
//! weights are transformed together with the positions, and all three leave
//! the curve geometrically unchanged (removal only when the tolerance test
//! passes).

use super::Nurbs;
use crate::error::{ensure_config, Result};
use nalgebra::Vector3;

/// Allowance added to the removal tolerance to absorb round-off, so that a
/// zero tolerance still undoes an exact insertion.
pub const REMOVAL_ROUND_OFF: f64 = 1e-9;

impl Nurbs {
    fn ensure_interior(&self, u: f64) -> Result<()> {
        let (u0, u1) = self.domain();
        ensure_config(u > u0 && u < u1, || {
            format!("knot {u} is outside the open curve domain ({u0}, {u1})")
        })
    }

    /// Insert `u` up to `times` times (Boehm). The knot multiplicity never
    /// exceeds the degree, so fewer insertions may happen; the number
    /// actually inserted is returned.
    pub fn insert_knot(&mut self, u: f64, times: usize) -> Result<usize> {
        self.ensure_interior(u)?;
        let p = self.degree;
        let s = self.multiplicity(u);
        let r = times.min(p.saturating_sub(s));
        if r == 0 {
            log::debug!("Nurbs::insert_knot {u}: multiplicity {s} already at degree {p}");
            return Ok(0);
        }
        let k = self.find_span(u);
        let n = self.last();
        let mp = n + p + 1;
        let up = &self.knots;
        let pw = self.homogeneous();

        let mut uq = Vec::with_capacity(up.len() + r);
        uq.extend_from_slice(&up[..=k]);
        uq.extend(std::iter::repeat(u).take(r));
        uq.extend_from_slice(&up[k + 1..=mp]);

        let mut qw = vec![Vector3::zeros(); n + 1 + r];
        qw[..=k - p].copy_from_slice(&pw[..=k - p]);
        for i in k - s..=n {
            qw[i + r] = pw[i];
        }
        let mut rw: Vec<Vector3<f64>> = (0..=p - s).map(|i| pw[k - p + i]).collect();

        let mut l = 0;
        for j in 1..=r {
            l = k - p + j;
            for i in 0..=p - j - s {
                let alpha = (u - up[l + i]) / (up[i + k + 1] - up[l + i]);
                rw[i] = alpha * rw[i + 1] + (1.0 - alpha) * rw[i];
            }
            qw[l] = rw[0];
            qw[k + r - j - s] = rw[p - j - s];
        }
        for i in l + 1..k - s {
            qw[i] = rw[i - l];
        }
        self.set_homogeneous(uq, &qw)?;
        Ok(r)
    }

    /// Insert every knot of the sorted list `xs` at once.
    pub fn refine_knots(&mut self, xs: &[f64]) -> Result<()> {
        if xs.is_empty() {
            return Ok(());
        }
        ensure_config(xs.windows(2).all(|w| w[0] <= w[1]), || {
            "knots to insert must be sorted".into()
        })?;
        for &x in xs {
            self.ensure_interior(x)?;
            let total = self.multiplicity(x) + xs.iter().filter(|&&y| y == x).count();
            ensure_config(total <= self.degree, || {
                format!("refining with {x} would raise its multiplicity to {total} > degree {}", self.degree)
            })?;
        }

        let p = self.degree;
        let n = self.last();
        let m = n + p + 1;
        let r = xs.len() - 1;
        let u = &self.knots;
        let pw = self.homogeneous();
        let a = self.find_span(xs[0]);
        let b = self.find_span(xs[r]) + 1;

        let mut qw = vec![Vector3::zeros(); n + r + 2];
        let mut ubar = vec![0.0; m + r + 2];
        qw[..=a - p].copy_from_slice(&pw[..=a - p]);
        for j in b - 1..=n {
            qw[j + r + 1] = pw[j];
        }
        ubar[..=a].copy_from_slice(&u[..=a]);
        for j in b + p..=m {
            ubar[j + r + 1] = u[j];
        }

        let mut i = b + p - 1;
        let mut k = b + p + r;
        for j in (0..=r).rev() {
            while xs[j] <= u[i] && i > a {
                qw[k - p - 1] = pw[i - p - 1];
                ubar[k] = u[i];
                k -= 1;
                i -= 1;
            }
            qw[k - p - 1] = qw[k - p];
            for l in 1..=p {
                let ind = k - p + l;
                let mut alpha = ubar[k + l] - xs[j];
                if alpha.abs() == 0.0 {
                    qw[ind - 1] = qw[ind];
                } else {
                    alpha /= ubar[k + l] - u[i - p + l];
                    qw[ind - 1] = alpha * qw[ind - 1] + (1.0 - alpha) * qw[ind];
                }
            }
            ubar[k] = xs[j];
            k -= 1;
        }
        self.set_homogeneous(ubar, &qw)
    }

    /// Try to remove `u` up to `num` times. Each removal must keep every
    /// affected homogeneous control point within `tol` (plus
    /// [`REMOVAL_ROUND_OFF`]); the first failing removal stops the process.
    /// Returns how many knots were removed; `0` leaves the curve untouched.
    pub fn remove_knot(&mut self, u: f64, num: usize, tol: f64) -> Result<usize> {
        ensure_config(tol >= 0.0, || format!("removal tolerance must be non-negative (got {tol})"))?;
        self.ensure_interior(u)?;
        let s = self.multiplicity(u);
        if s == 0 || num == 0 {
            return Ok(0);
        }
        let tol = tol + REMOVAL_ROUND_OFF;
        let p = self.degree;
        let n = self.last();
        let m = n + p + 1;
        let ord = p + 1;
        // last occurrence of u
        let r = self
            .knots
            .iter()
            .rposition(|&k| k == u)
            .unwrap_or_default();
        let mut knots = self.knots.clone();
        let mut pw = self.homogeneous();
        let fout = (2 * r - s - p) / 2;
        let mut last = r - s;
        let mut first = r - p;
        let mut temp = vec![Vector3::<f64>::zeros(); 2 * p + 1];

        let mut t = 0usize;
        while t < num.min(s) {
            let off = first - 1;
            temp[0] = pw[off];
            temp[last + 1 - off] = pw[last + 1];
            let (mut i, mut j) = (first, last);
            let (mut ii, mut jj) = (1usize, last - off);
            while j as isize - i as isize > t as isize {
                let alfi = (u - knots[i]) / (knots[i + ord + t] - knots[i]);
                let alfj = (u - knots[j - t]) / (knots[j + ord] - knots[j - t]);
                temp[ii] = (pw[i] - (1.0 - alfi) * temp[ii - 1]) / alfi;
                temp[jj] = (pw[j] - alfj * temp[jj + 1]) / (1.0 - alfj);
                i += 1;
                ii += 1;
                j -= 1;
                jj -= 1;
            }
            let removable = if (j as isize - i as isize) < t as isize {
                (temp[ii - 1] - temp[jj + 1]).norm() <= tol
            } else {
                let alfi = (u - knots[i]) / (knots[i + ord + t] - knots[i]);
                let blended = alfi * temp[ii + t + 1] + (1.0 - alfi) * temp[ii - 1];
                (pw[i] - blended).norm() <= tol
            };
            if !removable {
                break;
            }
            let (mut i, mut j) = (first, last);
            while j as isize - i as isize > t as isize {
                pw[i] = temp[i - off];
                pw[j] = temp[j - off];
                i += 1;
                j -= 1;
            }
            first -= 1;
            last += 1;
            t += 1;
        }
        if t == 0 {
            log::debug!("Nurbs::remove_knot {u}: tolerance {tol} exceeded, nothing removed");
            return Ok(0);
        }

        for k in r + 1..=m {
            knots[k - t] = knots[k];
        }
        knots.truncate(m + 1 - t);
        let (mut i, mut j) = (fout, fout);
        for k in 1..t {
            if k % 2 == 1 {
                i += 1;
            } else {
                j -= 1;
            }
        }
        for k in i + 1..=n {
            pw[j] = pw[k];
            j += 1;
        }
        pw.truncate(n + 1 - t);
        self.set_homogeneous(knots, &pw)?;
        Ok(t)
    }
}

//! Non-uniform rational B-spline curves in the image plane.
//!
//! [`Nurbs`] owns the knot vector, the control points and the weights, and
//! keeps them consistent: every constructor and every mutating operation
//! checks `knots.len() == control_points.len() + degree + 1`, equal lengths
//! of control points and weights, non-decreasing knots clamped with
//! multiplicity `degree + 1` at both ends, and positive weights.
//!
//! Algorithms follow Piegl & Tiller, *The NURBS Book*:
//! - [`basis`]: span lookup and (derivative) basis functions.
//! - [`knots`]: knot insertion, refinement and removal.
//! - [`fit`]: global interpolation and least-squares approximation.

pub mod basis;
mod fit;
mod knots;

pub use fit::chord_parameters;

use crate::angle::normal_angle_from_tangent;
use crate::error::{ensure_config, Result, TrackerError};
use crate::geometry::Point2;
use basis::{basis_functions, binomial, derivative_basis_functions, find_span};
use nalgebra::Vector3;
use serde::Serialize;

/// Default curve degree.
pub const DEFAULT_DEGREE: usize = 3;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Nurbs {
    degree: usize,
    knots: Vec<f64>,
    control_points: Vec<Point2>,
    weights: Vec<f64>,
}

impl Nurbs {
    /// Build a curve from its raw parts, checking every invariant.
    pub fn new(
        degree: usize,
        knots: Vec<f64>,
        control_points: Vec<Point2>,
        weights: Vec<f64>,
    ) -> Result<Self> {
        ensure_config(degree >= 1, || "NURBS degree must be at least 1".into())?;
        let curve = Self {
            degree,
            knots,
            control_points,
            weights,
        };
        curve.check_invariants().map_err(|e| match e {
            TrackerError::Internal { context } => TrackerError::Config(context),
            other => other,
        })?;
        Ok(curve)
    }

    /// Non-rational curve (unit weights).
    pub fn bspline(degree: usize, knots: Vec<f64>, control_points: Vec<Point2>) -> Result<Self> {
        let weights = vec![1.0; control_points.len()];
        Self::new(degree, knots, control_points, weights)
    }

    #[inline]
    pub fn degree(&self) -> usize {
        self.degree
    }

    #[inline]
    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    #[inline]
    pub fn control_points(&self) -> &[Point2] {
        &self.control_points
    }

    #[inline]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Index of the last control point.
    #[inline]
    fn last(&self) -> usize {
        self.control_points.len() - 1
    }

    /// Parameter domain `[U[p], U[n+1]]`.
    pub fn domain(&self) -> (f64, f64) {
        (self.knots[self.degree], self.knots[self.last() + 1])
    }

    /// Knot span containing `u`.
    #[inline]
    pub fn find_span(&self, u: f64) -> usize {
        find_span(self.last(), self.degree, u, &self.knots)
    }

    /// Number of times `u` occurs in the knot vector (exact comparison).
    pub fn multiplicity(&self, u: f64) -> usize {
        self.knots.iter().filter(|&&k| k == u).count()
    }

    /// Control points in homogeneous form `(w·x, w·y, w)`.
    pub(crate) fn homogeneous(&self) -> Vec<Vector3<f64>> {
        self.control_points
            .iter()
            .zip(&self.weights)
            .map(|(p, &w)| Vector3::new(p.x * w, p.y * w, w))
            .collect()
    }

    /// Replace the control net from homogeneous points; invariants are
    /// checked on the result.
    pub(crate) fn set_homogeneous(&mut self, knots: Vec<f64>, pw: &[Vector3<f64>]) -> Result<()> {
        self.knots = knots;
        self.control_points = pw.iter().map(|v| Point2::new(v.x / v.z, v.y / v.z)).collect();
        self.weights = pw.iter().map(|v| v.z).collect();
        self.check_invariants()
    }

    /// Verify the structural invariants; violations are internal errors.
    pub fn check_invariants(&self) -> Result<()> {
        let (n_knots, n_ctrl, n_w, p) = (
            self.knots.len(),
            self.control_points.len(),
            self.weights.len(),
            self.degree,
        );
        let fail = |msg: String| Err(TrackerError::internal(msg));
        if n_ctrl < p + 1 {
            return fail(format!("NURBS of degree {p} needs at least {} control points, has {n_ctrl}", p + 1));
        }
        if n_ctrl != n_w {
            return fail(format!("NURBS has {n_ctrl} control points but {n_w} weights"));
        }
        if n_knots != n_ctrl + p + 1 {
            return fail(format!(
                "NURBS knot count {n_knots} != control points {n_ctrl} + degree {p} + 1"
            ));
        }
        if self.knots.windows(2).any(|w| w[1] < w[0]) {
            return fail(format!("NURBS knot vector is decreasing: {:?}", self.knots));
        }
        let (first, last) = (self.knots[0], self.knots[n_knots - 1]);
        let clamped = self.knots[..=p].iter().all(|&k| k == first)
            && self.knots[n_knots - p - 1..].iter().all(|&k| k == last);
        if !clamped || last <= first {
            return fail(format!("NURBS knot vector is not clamped: {:?}", self.knots));
        }
        if let Some(w) = self.weights.iter().find(|w| !(**w > 0.0) || !w.is_finite()) {
            return fail(format!("NURBS weight {w} is not positive"));
        }
        Ok(())
    }

    /// Curve point at `u`.
    pub fn point(&self, u: f64) -> Point2 {
        let p = self.degree;
        let span = self.find_span(u);
        let n = basis_functions(span, u, p, &self.knots);
        let mut acc = Vector3::zeros();
        for (j, nj) in n.iter().enumerate() {
            let idx = span - p + j;
            let w = self.weights[idx];
            let c = self.control_points[idx];
            acc += *nj * Vector3::new(c.x * w, c.y * w, w);
        }
        Point2::new(acc.x / acc.z, acc.y / acc.z)
    }

    /// Curve point and derivatives up to order `d` at `u`; element `k` is
    /// the `k`-th derivative.
    pub fn derivatives(&self, u: f64, d: usize) -> Vec<Point2> {
        let p = self.degree;
        let span = self.find_span(u);
        let nders = derivative_basis_functions(span, u, p, d, &self.knots);

        // derivatives of the homogeneous curve A(u) and w(u)
        let mut aders = vec![Vector3::<f64>::zeros(); d + 1];
        for (k, row) in nders.iter().enumerate() {
            for (j, nkj) in row.iter().enumerate() {
                let idx = span - p + j;
                let w = self.weights[idx];
                let c = self.control_points[idx];
                aders[k] += *nkj * Vector3::new(c.x * w, c.y * w, w);
            }
        }

        let w0 = aders[0].z;
        let mut ck: Vec<Point2> = Vec::with_capacity(d + 1);
        for k in 0..=d {
            let mut vx = aders[k].x;
            let mut vy = aders[k].y;
            for i in 1..=k {
                let c = binomial(k, i) * aders[i].z;
                vx -= c * ck[k - i].x;
                vy -= c * ck[k - i].y;
            }
            ck.push(Point2::new(vx / w0, vy / w0));
        }
        ck
    }

    /// First derivative at `u`.
    pub fn tangent(&self, u: f64) -> Point2 {
        self.derivatives(u, 1)[1]
    }

    /// Angle of the curve normal at `u`, in the site convention
    /// (search direction `(sin α, cos α)` in row/column coordinates).
    pub fn normal_angle(&self, u: f64) -> f64 {
        let t = self.tangent(u);
        normal_angle_from_tangent(t.x, t.y)
    }

    /// Approximate arc length by summing `samples` chords.
    pub fn arc_length(&self, samples: usize) -> f64 {
        let (u0, u1) = self.domain();
        let samples = samples.max(1);
        let mut prev = self.point(u0);
        let mut len = 0.0;
        for k in 1..=samples {
            let u = u0 + (u1 - u0) * k as f64 / samples as f64;
            let cur = self.point(u);
            len += prev.distance(&cur);
            prev = cur;
        }
        len
    }

    /// Parameter of the curve point closest to `target`, by Newton
    /// iterations on `(C(u) − P)·C'(u) = 0` started from `u_guess`.
    pub fn closest_param(&self, target: Point2, u_guess: f64) -> f64 {
        const MAX_ITERS: usize = 20;
        const TOL: f64 = 1e-10;
        let (u0, u1) = self.domain();
        let mut u = u_guess.clamp(u0, u1);
        for _ in 0..MAX_ITERS {
            let ders = self.derivatives(u, 2);
            let (c, d1, d2) = (ders[0], ders[1], ders[2]);
            let (dx, dy) = (c.x - target.x, c.y - target.y);
            let f = dx * d1.x + dy * d1.y;
            let df = d1.x * d1.x + d1.y * d1.y + dx * d2.x + dy * d2.y;
            if df.abs() < f64::EPSILON {
                break;
            }
            let next = (u - f / df).clamp(u0, u1);
            if (next - u).abs() * (d1.x.hypot(d1.y)) < TOL {
                u = next;
                break;
            }
            u = next;
        }
        u
    }
}

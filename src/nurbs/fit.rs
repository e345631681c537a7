//! Global curve fitting through (or near) a cloud of ordered points.

use super::basis::{basis_functions, find_span};
use super::Nurbs;
use crate::error::{ensure_config, Result, TrackerError};
use crate::geometry::Point2;
use nalgebra::DMatrix;

const PINV_EPS: f64 = 1e-12;

/// Chord-length parameters of `points`, normalised to `[0, 1]`.
pub fn chord_parameters(points: &[Point2]) -> Result<Vec<f64>> {
    ensure_config(points.len() >= 2, || "need at least two points to parametrise".into())?;
    let chords: Vec<f64> = points.windows(2).map(|w| w[0].distance(&w[1])).collect();
    let total: f64 = chords.iter().sum();
    ensure_config(total > 0.0, || "points have zero total chord length".into())?;
    let mut ubar = Vec::with_capacity(points.len());
    ubar.push(0.0);
    let mut acc = 0.0;
    for c in &chords[..chords.len() - 1] {
        acc += c / total;
        ubar.push(acc);
    }
    ubar.push(1.0);
    Ok(ubar)
}

/// Coefficient of control point `c` in the basis row `(span, n)`.
#[inline]
fn coefficient(span: usize, p: usize, n: &[f64], c: usize) -> f64 {
    if c + p >= span && c <= span {
        n[c + p - span]
    } else {
        0.0
    }
}

impl Nurbs {
    /// Curve of degree `degree` passing through every point, with unit
    /// weights. Knots are averages of `degree` consecutive chord-length
    /// parameters; the square system is solved by LU decomposition.
    pub fn global_interpolate(degree: usize, points: &[Point2]) -> Result<Nurbs> {
        ensure_config(degree >= 1, || "NURBS degree must be at least 1".into())?;
        ensure_config(points.len() > degree, || {
            format!(
                "interpolation of degree {degree} needs at least {} points, got {}",
                degree + 1,
                points.len()
            )
        })?;
        let p = degree;
        let n = points.len() - 1;
        let ubar = chord_parameters(points)?;

        let mut knots = vec![0.0; p + 1];
        for j in 1..=n - p {
            knots.push(ubar[j..j + p].iter().sum::<f64>() / p as f64);
        }
        knots.extend(std::iter::repeat(1.0).take(p + 1));

        let mut a = DMatrix::<f64>::zeros(n + 1, n + 1);
        for (row, &u) in ubar.iter().enumerate() {
            let span = find_span(n, p, u, &knots);
            for (k, v) in basis_functions(span, u, p, &knots).into_iter().enumerate() {
                a[(row, span - p + k)] = v;
            }
        }
        let rhs = DMatrix::from_fn(n + 1, 2, |r, c| if c == 0 { points[r].x } else { points[r].y });
        let sol = a.lu().solve(&rhs).ok_or_else(|| {
            TrackerError::Numeric(format!("interpolation system through {} points is singular", n + 1))
        })?;
        let control_points = (0..=n).map(|r| Point2::new(sol[(r, 0)], sol[(r, 1)])).collect();
        log::trace!("Nurbs::global_interpolate {} points, degree {p}", n + 1);
        Nurbs::bspline(p, knots, control_points)
    }

    /// Least-squares curve with `num_control_points` control points whose
    /// first and last control points are the first and last data points.
    pub fn global_approximate(degree: usize, points: &[Point2], num_control_points: usize) -> Result<Nurbs> {
        ensure_config(degree >= 1, || "NURBS degree must be at least 1".into())?;
        ensure_config(num_control_points > degree, || {
            format!(
                "approximation of degree {degree} needs more than {degree} control points, got {num_control_points}"
            )
        })?;
        ensure_config(num_control_points < points.len(), || {
            format!(
                "approximation needs fewer control points ({num_control_points}) than data points ({})",
                points.len()
            )
        })?;
        let p = degree;
        let n = num_control_points - 1;
        let m = points.len() - 1;
        let ubar = chord_parameters(points)?;

        let mut knots = vec![0.0; p + 1];
        let d = (m + 1) as f64 / (n - p + 1) as f64;
        for j in 1..=n - p {
            let jd = j as f64 * d;
            let i = jd.floor() as usize;
            let alpha = jd - i as f64;
            knots.push((1.0 - alpha) * ubar[i - 1] + alpha * ubar[i]);
        }
        knots.extend(std::iter::repeat(1.0).take(p + 1));

        let (q0, qm) = (points[0], points[m]);
        let mut control_points = Vec::with_capacity(n + 1);
        control_points.push(q0);
        if n >= 2 {
            let mut a = DMatrix::<f64>::zeros(m - 1, n - 1);
            let mut r = DMatrix::<f64>::zeros(m - 1, 2);
            for k in 1..m {
                let u = ubar[k];
                let span = find_span(n, p, u, &knots);
                let basis = basis_functions(span, u, p, &knots);
                for c in 1..n {
                    a[(k - 1, c - 1)] = coefficient(span, p, &basis, c);
                }
                let (c0, cn) = (coefficient(span, p, &basis, 0), coefficient(span, p, &basis, n));
                r[(k - 1, 0)] = points[k].x - c0 * q0.x - cn * qm.x;
                r[(k - 1, 1)] = points[k].y - c0 * q0.y - cn * qm.y;
            }
            let at = a.transpose();
            let ata_inv = (&at * &a)
                .pseudo_inverse(PINV_EPS)
                .map_err(|e| TrackerError::Numeric(format!("approximation normal equations: {e}")))?;
            let sol = ata_inv * (at * r);
            control_points.extend((0..n - 1).map(|k| Point2::new(sol[(k, 0)], sol[(k, 1)])));
        }
        control_points.push(qm);
        log::trace!(
            "Nurbs::global_approximate {} points -> {} control points, degree {p}",
            m + 1,
            n + 1
        );
        Nurbs::bspline(p, knots, control_points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn arc_points(count: usize) -> Vec<Point2> {
        (0..count)
            .map(|k| {
                let t = 0.2 + 1.1 * k as f64 / (count - 1) as f64;
                Point2::new(120.0 + 60.0 * t.cos(), 90.0 + 45.0 * t.sin())
            })
            .collect()
    }

    #[test]
    fn chord_parameters_are_normalised() {
        let pts = [Point2::new(0.0, 0.0), Point2::new(3.0, 4.0), Point2::new(3.0, 9.0)];
        assert_eq!(chord_parameters(&pts).unwrap(), vec![0.0, 0.5, 1.0]);
        assert!(chord_parameters(&[Point2::new(1.0, 1.0); 3]).unwrap_err().is_config());
    }

    #[test]
    fn interpolation_passes_through_the_data() {
        let pts = arc_points(9);
        let curve = Nurbs::global_interpolate(3, &pts).unwrap();
        assert_eq!(curve.control_points().len(), pts.len());
        assert!(curve.weights().iter().all(|&w| w == 1.0));
        let ubar = chord_parameters(&pts).unwrap();
        for (u, q) in ubar.iter().zip(&pts) {
            let c = curve.point(*u);
            assert_relative_eq!(c.x, q.x, epsilon = 1e-9);
            assert_relative_eq!(c.y, q.y, epsilon = 1e-9);
        }
    }

    #[test]
    fn interpolation_of_exactly_degree_plus_one_points() {
        let pts = arc_points(4);
        let curve = Nurbs::global_interpolate(3, &pts).unwrap();
        assert_eq!(curve.knots(), &[0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]);
        let end = curve.point(1.0);
        assert_relative_eq!(end.x, pts[3].x, epsilon = 1e-9);
    }

    #[test]
    fn interpolation_rejects_bad_input() {
        let pts = arc_points(6);
        assert!(Nurbs::global_interpolate(0, &pts).unwrap_err().is_config());
        assert!(Nurbs::global_interpolate(3, &pts[..3]).unwrap_err().is_config());
    }

    #[test]
    fn approximation_fixes_endpoints_and_stays_close() {
        let pts = arc_points(40);
        let curve = Nurbs::global_approximate(3, &pts, 7).unwrap();
        assert_eq!(curve.control_points().len(), 7);
        assert_eq!(curve.control_points()[0], pts[0]);
        assert_eq!(curve.control_points()[6], pts[39]);
        let ubar = chord_parameters(&pts).unwrap();
        for (u, q) in ubar.iter().zip(&pts) {
            assert!(curve.point(*u).distance(q) < 0.05);
        }
    }

    #[test]
    fn approximation_of_collinear_points_is_exact() {
        let pts: Vec<Point2> = (0..12).map(|k| Point2::new(5.0 + 3.0 * k as f64, 2.0 + k as f64)).collect();
        let curve = Nurbs::global_approximate(2, &pts, 5).unwrap();
        let ubar = chord_parameters(&pts).unwrap();
        for (u, q) in ubar.iter().zip(&pts) {
            let c = curve.point(*u);
            assert_relative_eq!(c.x, q.x, epsilon = 1e-9);
            assert_relative_eq!(c.y, q.y, epsilon = 1e-9);
        }
    }

    #[test]
    fn approximation_rejects_bad_counts() {
        let pts = arc_points(10);
        assert!(Nurbs::global_approximate(0, &pts, 5).is_err());
        assert!(Nurbs::global_approximate(3, &pts, 3).is_err());
        assert!(Nurbs::global_approximate(3, &pts, 10).is_err());
    }
}

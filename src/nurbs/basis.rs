//! B-spline basis functions on a clamped knot vector.
//!
//! Indices follow the usual convention: with `n + 1` control points and
//! degree `p`, the knot vector has `n + p + 2` entries and the curve domain
//! is `[U[p], U[n+1]]`.

/// Knot span index `i` such that `U[i] <= u < U[i+1]`, clamped to
/// `[p, n]`; `u` at the end of the domain maps to the last non-empty span.
pub fn find_span(n: usize, p: usize, u: f64, knots: &[f64]) -> usize {
    if u >= knots[n + 1] {
        return n;
    }
    if u <= knots[p] {
        return p;
    }
    let (mut low, mut high) = (p, n + 1);
    let mut mid = (low + high) / 2;
    while u < knots[mid] || u >= knots[mid + 1] {
        if u < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

/// The `p + 1` non-vanishing basis functions `N[span-p..=span]` at `u`.
pub fn basis_functions(span: usize, u: f64, p: usize, knots: &[f64]) -> Vec<f64> {
    let mut n = vec![0.0; p + 1];
    let mut left = vec![0.0; p + 1];
    let mut right = vec![0.0; p + 1];
    n[0] = 1.0;
    for j in 1..=p {
        left[j] = u - knots[span + 1 - j];
        right[j] = knots[span + j] - u;
        let mut saved = 0.0;
        for r in 0..j {
            let temp = n[r] / (right[r + 1] + left[j - r]);
            n[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        n[j] = saved;
    }
    n
}

/// Basis functions and their derivatives up to order `d` at `u`;
/// `ders[k][j]` is the `k`-th derivative of `N[span-p+j]`.
pub fn derivative_basis_functions(span: usize, u: f64, p: usize, d: usize, knots: &[f64]) -> Vec<Vec<f64>> {
    let mut ndu = vec![vec![0.0; p + 1]; p + 1];
    let mut left = vec![0.0; p + 1];
    let mut right = vec![0.0; p + 1];
    ndu[0][0] = 1.0;
    for j in 1..=p {
        left[j] = u - knots[span + 1 - j];
        right[j] = knots[span + j] - u;
        let mut saved = 0.0;
        for r in 0..j {
            // lower triangle holds knot differences
            ndu[j][r] = right[r + 1] + left[j - r];
            let temp = ndu[r][j - 1] / ndu[j][r];
            ndu[r][j] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        ndu[j][j] = saved;
    }

    let mut ders = vec![vec![0.0; p + 1]; d + 1];
    for j in 0..=p {
        ders[0][j] = ndu[j][p];
    }
    let mut a = vec![vec![0.0; p + 1]; 2];
    for r in 0..=p {
        let (mut s1, mut s2) = (0usize, 1usize);
        a[0][0] = 1.0;
        for k in 1..=d.min(p) {
            let mut dk = 0.0;
            let rk = r as isize - k as isize;
            let pk = p - k;
            if r >= k {
                a[s2][0] = a[s1][0] / ndu[pk + 1][r - k];
                dk = a[s2][0] * ndu[r - k][pk];
            }
            let j1 = if rk >= -1 { 1 } else { (-rk) as usize };
            let j2 = if (r as isize - 1) <= pk as isize { k - 1 } else { p - r };
            for j in j1..=j2 {
                let idx = (rk + j as isize) as usize;
                a[s2][j] = (a[s1][j] - a[s1][j - 1]) / ndu[pk + 1][idx];
                dk += a[s2][j] * ndu[idx][pk];
            }
            if r <= pk {
                a[s2][k] = -a[s1][k - 1] / ndu[pk + 1][r];
                dk += a[s2][k] * ndu[r][pk];
            }
            ders[k][r] = dk;
            std::mem::swap(&mut s1, &mut s2);
        }
    }
    let mut factor = p as f64;
    for k in 1..=d.min(p) {
        for v in ders[k].iter_mut() {
            *v *= factor;
        }
        factor *= (p - k) as f64;
    }
    ders
}

/// Binomial coefficient `C(n, k)`.
pub(crate) fn binomial(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // Piegl & Tiller, example 2.3: p = 2, U = {0,0,0,1,2,3,4,4,5,5,5}.
    const KNOTS: [f64; 11] = [0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 4.0, 5.0, 5.0, 5.0];

    #[test]
    fn span_lookup() {
        let n = KNOTS.len() - 2 - 2;
        assert_eq!(find_span(n, 2, 2.5, &KNOTS), 4);
        assert_eq!(find_span(n, 2, 0.0, &KNOTS), 2);
        assert_eq!(find_span(n, 2, 5.0, &KNOTS), n);
        assert_eq!(find_span(n, 2, 4.0, &KNOTS), 7);
    }

    #[test]
    fn basis_matches_textbook_values() {
        let n = basis_functions(4, 2.5, 2, &KNOTS);
        assert_relative_eq!(n[0], 1.0 / 8.0, epsilon = 1e-12);
        assert_relative_eq!(n[1], 6.0 / 8.0, epsilon = 1e-12);
        assert_relative_eq!(n[2], 1.0 / 8.0, epsilon = 1e-12);
    }

    #[test]
    fn derivatives_match_textbook_values() {
        let ders = derivative_basis_functions(4, 2.5, 2, 2, &KNOTS);
        assert_relative_eq!(ders[0][1], 0.75, epsilon = 1e-12);
        assert_relative_eq!(ders[1][0], -0.5, epsilon = 1e-12);
        assert_relative_eq!(ders[1][1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(ders[1][2], 0.5, epsilon = 1e-12);
        assert_relative_eq!(ders[2][0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(ders[2][1], -2.0, epsilon = 1e-12);
        assert_relative_eq!(ders[2][2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn derivatives_of_a_partition_of_unity_vanish() {
        for &u in &[0.3, 1.7, 3.9, 4.5] {
            let span = find_span(7, 2, u, &KNOTS);
            let ders = derivative_basis_functions(span, u, 2, 3, &KNOTS);
            assert_relative_eq!(ders[0].iter().sum::<f64>(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(ders[1].iter().sum::<f64>(), 0.0, epsilon = 1e-12);
            assert!(ders[3].iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn binomials() {
        assert_eq!(binomial(4, 2), 6.0);
        assert_eq!(binomial(5, 0), 1.0);
        assert_eq!(binomial(3, 4), 0.0);
    }
}

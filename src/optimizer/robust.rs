//! Tukey biweight M-estimator with a MAD scale.

const TUKEY_C: f64 = 4.6851;
const MAD_TO_SIGMA: f64 = 1.4826;

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let m = values.len() / 2;
    if values.len() % 2 == 1 {
        values[m]
    } else {
        0.5 * (values[m - 1] + values[m])
    }
}

/// Tukey weights of `residuals`. The scale is the median absolute deviation
/// around the median, floored at `min_scale` so that a nearly perfect fit
/// does not reject everything.
pub fn tukey_weights(residuals: &[f64], min_scale: f64) -> Vec<f64> {
    let mut buf: Vec<f64> = residuals.to_vec();
    let med = median(&mut buf);
    for (b, r) in buf.iter_mut().zip(residuals) {
        *b = (r - med).abs();
    }
    let sigma = (MAD_TO_SIGMA * median(&mut buf)).max(min_scale);
    if !(sigma > 0.0) {
        return vec![1.0; residuals.len()];
    }
    let c = TUKEY_C * sigma;
    residuals
        .iter()
        .map(|r| {
            let u = (r - med) / c;
            if u.abs() < 1.0 {
                let t = 1.0 - u * u;
                t * t
            } else {
                0.0
            }
        })
        .collect()
}

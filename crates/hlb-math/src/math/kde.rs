//! Gaussian kernel density estimation for density-overlay plots.

use super::normal;
use super::quantile::quantile;
use super::stable::std_dev;

/// Silverman's rule-of-thumb bandwidth: 0.9 · min(sd, IQR/1.34) · n^(-1/5).
///
/// Falls back to the sd (or 1.0 for constant data) when the IQR is zero.
pub fn silverman_bandwidth(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 1.0;
    }
    let sd = std_dev(values);
    let iqr = quantile(values, 0.75) - quantile(values, 0.25);
    let spread = if iqr > 0.0 { sd.min(iqr / 1.34) } else { sd };
    if spread <= 0.0 || spread.is_nan() {
        return 1.0;
    }
    0.9 * spread * (n as f64).powf(-0.2)
}

/// `points` evenly spaced values covering [lo, hi].
pub fn linspace(lo: f64, hi: f64, points: usize) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![(lo + hi) / 2.0],
        _ => {
            let step = (hi - lo) / (points - 1) as f64;
            (0..points).map(|i| lo + step * i as f64).collect()
        }
    }
}

/// Density estimate of `values` evaluated at each grid point.
pub fn gaussian_kde(values: &[f64], grid: &[f64], bandwidth: f64) -> Vec<f64> {
    if values.is_empty() || bandwidth <= 0.0 || bandwidth.is_nan() {
        return vec![0.0; grid.len()];
    }
    let n = values.len() as f64;
    grid.iter()
        .map(|&g| values.iter().map(|&v| normal::pdf(g, v, bandwidth)).sum::<f64>() / n)
        .collect()
}

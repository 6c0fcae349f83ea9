//! Empirical quantiles and credible intervals over posterior draws.

use serde::{Deserialize, Serialize};

/// Consistency constant that turns a median absolute deviation into a
/// standard-deviation estimate for normal data.
pub const MAD_SCALE: f64 = 1.482_602_218_505_602;

/// Quantile of already-sorted values with linear interpolation between order
/// statistics (Hyndman–Fan type 7).
///
/// Returns NaN for empty input or `p` outside [0, 1].
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() || p.is_nan() || !(0.0..=1.0).contains(&p) {
        return f64::NAN;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Quantile of unsorted values. NaN entries are ignored.
pub fn quantile(values: &[f64], p: f64) -> f64 {
    let sorted = sorted_finite(values);
    quantile_sorted(&sorted, p)
}

/// Median of the values.
pub fn median(values: &[f64]) -> f64 {
    quantile(values, 0.5)
}

/// Scaled median absolute deviation (robust sd estimate).
pub fn mad_sd(values: &[f64]) -> f64 {
    let m = median(values);
    if m.is_nan() {
        return f64::NAN;
    }
    let deviations: Vec<f64> = values
        .iter()
        .filter(|v| !v.is_nan())
        .map(|v| (v - m).abs())
        .collect();
    MAD_SCALE * median(&deviations)
}

fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().cloned().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Equal-tailed interval: (1 - level) / 2 of the mass lies in each tail.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub level: f64,
    pub lower: f64,
    pub upper: f64,
}

impl Interval {
    /// Whether `x` lies inside the closed interval.
    pub fn contains(&self, x: f64) -> bool {
        self.lower <= x && x <= self.upper
    }

    /// Apply a monotone increasing transform to both endpoints
    /// (e.g. `exp` for the odds-ratio scale).
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Interval {
        Interval {
            level: self.level,
            lower: f(self.lower),
            upper: f(self.upper),
        }
    }
}

/// Equal-tailed interval of the draws at the given level.
///
/// Returns None when there are no finite draws or the level is not in (0, 1).
pub fn equal_tailed_interval(values: &[f64], level: f64) -> Option<Interval> {
    if level.is_nan() || level <= 0.0 || level >= 1.0 {
        return None;
    }
    let sorted = sorted_finite(values);
    if sorted.is_empty() {
        return None;
    }
    let tail = (1.0 - level) / 2.0;
    Some(Interval {
        level,
        lower: quantile_sorted(&sorted, tail),
        upper: quantile_sorted(&sorted, 1.0 - tail),
    })
}

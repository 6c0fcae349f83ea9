//! Normal densities for the coefficient priors and kernel density estimates.

const LOG_SQRT_2PI: f64 = 0.918_938_533_204_672_8; // 0.5 * ln(2*pi)
const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

/// Log density of N(mean, sd²) at x. NaN for non-positive sd.
pub fn log_pdf(x: f64, mean: f64, sd: f64) -> f64 {
    if sd.is_nan() || sd <= 0.0 {
        return f64::NAN;
    }
    let z = (x - mean) / sd;
    -LOG_SQRT_2PI - sd.ln() - 0.5 * z * z
}

/// Density of N(mean, sd²) at x.
pub fn pdf(x: f64, mean: f64, sd: f64) -> f64 {
    if sd.is_nan() || sd <= 0.0 {
        return f64::NAN;
    }
    let z = (x - mean) / sd;
    INV_SQRT_2PI / sd * (-0.5 * z * z).exp()
}

//! Numerically stable primitives for the logistic link, plus basic moments.

/// Stable softplus: log(1 + exp(x)).
pub fn log1p_exp(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    if x > 0.0 {
        x + (-x).exp().ln_1p()
    } else {
        x.exp().ln_1p()
    }
}

/// Logistic function σ(x) = 1 / (1 + e^(-x)), evaluated without overflow.
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// log σ(x) = -log(1 + e^(-x)).
pub fn log_sigmoid(x: f64) -> f64 {
    -log1p_exp(-x)
}

/// Log-odds of a probability: ln(p / (1 - p)).
///
/// Returns -inf at 0, +inf at 1 and NaN outside [0, 1].
pub fn logit(p: f64) -> f64 {
    if p.is_nan() || !(0.0..=1.0).contains(&p) {
        return f64::NAN;
    }
    if p == 0.0 {
        return f64::NEG_INFINITY;
    }
    if p == 1.0 {
        return f64::INFINITY;
    }
    (p / (1.0 - p)).ln()
}

/// Bernoulli log-likelihood of outcome `y` under log-odds `eta`.
pub fn bernoulli_logit_lpmf(y: bool, eta: f64) -> f64 {
    if y {
        log_sigmoid(eta)
    } else {
        log_sigmoid(-eta)
    }
}

/// Arithmetic mean; NaN for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance with (n - 1) denominator; 0 for fewer than two values.
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

/// Sample standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        if a.is_nan() || b.is_nan() {
            return false;
        }
        (a - b).abs() <= tol
    }

    #[test]
    fn sigmoid_known_values() {
        assert!(approx_eq(sigmoid(0.0), 0.5, 1e-15));
        assert!(approx_eq(sigmoid(2.0), 1.0 / (1.0 + (-2.0f64).exp()), 1e-15));
        assert!(approx_eq(sigmoid(-800.0), 0.0, 1e-300));
        assert!(approx_eq(sigmoid(800.0), 1.0, 1e-15));
    }

    #[test]
    fn logit_inverts_sigmoid() {
        for x in [-5.0, -1.3, 0.0, 0.4, 3.0] {
            assert!(approx_eq(logit(sigmoid(x)), x, 1e-9));
        }
    }

    #[test]
    fn logit_of_report_base_rates() {
        assert!(approx_eq(logit(0.5), 0.0, 1e-15));
        assert!(approx_eq(logit(0.16), -1.658_228_076_603_532, 1e-12));
    }

    #[test]
    fn logit_edges() {
        assert!(logit(0.0).is_infinite() && logit(0.0).is_sign_negative());
        assert!(logit(1.0).is_infinite() && logit(1.0).is_sign_positive());
        assert!(logit(1.5).is_nan());
        assert!(logit(-0.1).is_nan());
    }

    #[test]
    fn log1p_exp_large_inputs_do_not_overflow() {
        assert!(approx_eq(log1p_exp(1000.0), 1000.0, 1e-9));
        assert!(approx_eq(log1p_exp(-1000.0), 0.0, 1e-12));
        assert!(approx_eq(log1p_exp(0.0), 2.0f64.ln(), 1e-15));
    }

    #[test]
    fn bernoulli_lpmf_sums_to_one() {
        for eta in [-3.0, -0.2, 0.0, 1.7] {
            let total = bernoulli_logit_lpmf(true, eta).exp() + bernoulli_logit_lpmf(false, eta).exp();
            assert!(approx_eq(total, 1.0, 1e-12));
        }
    }

    #[test]
    fn mean_and_variance() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert!(approx_eq(mean(&v), 2.5, 1e-15));
        assert!(approx_eq(variance(&v), 5.0 / 3.0, 1e-12));
        assert_eq!(variance(&[7.0]), 0.0);
        assert!(mean(&[]).is_nan());
    }
}

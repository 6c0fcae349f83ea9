//! Property-based tests for hlb-math numerical functions.
//!
//! Uses proptest to verify mathematical properties hold across many random inputs.

use hlb_math::mcmc::split_rhat;
use hlb_math::normal;
use hlb_math::{bernoulli_logit_lpmf, equal_tailed_interval, log1p_exp, logit, quantile, sigmoid};
use proptest::prelude::*;

/// Tolerance for floating point comparisons.
const TOL: f64 = 1e-10;

/// Helper to check approximate equality.
fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    if a.is_nan() || b.is_nan() {
        return false;
    }
    (a - b).abs() <= tol.max(tol * a.abs().max(b.abs()))
}

// ============================================================================
// log-domain properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// The two Bernoulli outcomes have probabilities summing to one.
    #[test]
    fn bernoulli_lpmf_normalized(eta in -30.0..30.0f64) {
        let total = bernoulli_logit_lpmf(true, eta).exp() + bernoulli_logit_lpmf(false, eta).exp();
        prop_assert!(approx_eq(total, 1.0, 1e-12));
    }

    /// The normal log density peaks at the mean.
    #[test]
    fn normal_log_pdf_peaks_at_mean(m in -5.0..5.0f64, s in 0.1..5.0f64, d in 0.01..10.0f64) {
        prop_assert!(normal::log_pdf(m, m, s) > normal::log_pdf(m + d, m, s));
        prop_assert!(approx_eq(normal::log_pdf(m + d, m, s), normal::log_pdf(m - d, m, s), 1e-9));
    }

    /// softplus(x) - softplus(-x) = x.
    #[test]
    fn log1p_exp_antisymmetry(x in -700.0..700.0f64) {
        let diff = log1p_exp(x) - log1p_exp(-x);
        prop_assert!(approx_eq(diff, x, 1e-9), "softplus identity failed at {}: {}", x, diff);
    }
}

// ============================================================================
// logistic link properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// sigmoid maps the real line into [0, 1] and is symmetric around 0.
    #[test]
    fn sigmoid_bounded_and_symmetric(x in -1000.0..1000.0f64) {
        let s = sigmoid(x);
        prop_assert!((0.0..=1.0).contains(&s));
        prop_assert!(approx_eq(s + sigmoid(-x), 1.0, 1e-12));
    }

    /// logit is the inverse of sigmoid on the open unit interval.
    #[test]
    fn logit_inverts_sigmoid(p in 1e-6..(1.0 - 1e-6f64)) {
        prop_assert!(approx_eq(sigmoid(logit(p)), p, 1e-9));
    }
}

// ============================================================================
// quantile and interval properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Quantiles are monotone in p.
    #[test]
    fn quantile_monotone(
        values in prop::collection::vec(-1e3..1e3f64, 1..200),
        p in 0.0..1.0f64,
        q in 0.0..1.0f64,
    ) {
        let (lo, hi) = if p <= q { (p, q) } else { (q, p) };
        prop_assert!(quantile(&values, lo) <= quantile(&values, hi) + TOL);
    }

    /// At most (1 - level)/2 of the draws (plus one draw of slack for
    /// interpolation) lie strictly beyond either endpoint.
    #[test]
    fn interval_tails_hold_expected_mass(
        values in prop::collection::vec(-1e3..1e3f64, 20..400),
        level in 0.5..0.99f64,
    ) {
        let iv = equal_tailed_interval(&values, level).unwrap();
        let n = values.len() as f64;
        let tail = (1.0 - level) / 2.0;
        let below = values.iter().filter(|v| **v < iv.lower).count() as f64;
        let above = values.iter().filter(|v| **v > iv.upper).count() as f64;
        prop_assert!(below <= tail * n + 1.0, "below={} tail*n={}", below, tail * n);
        prop_assert!(above <= tail * n + 1.0, "above={} tail*n={}", above, tail * n);
        prop_assert!(iv.lower <= iv.upper);
    }

    /// Split R-hat does not depend on chain order.
    #[test]
    fn rhat_chain_order_invariant(
        a in prop::collection::vec(-10.0..10.0f64, 8..60),
        b in prop::collection::vec(-10.0..10.0f64, 8..60),
    ) {
        let ab = split_rhat(&[a.clone(), b.clone()]);
        let ba = split_rhat(&[b, a]);
        prop_assert!((ab.is_nan() && ba.is_nan()) || (ab.is_infinite() && ba.is_infinite()) || approx_eq(ab, ba, 1e-9));
    }
}

//! Convergence diagnostics for multi-chain MCMC output.
//!
//! - Autocorrelation function of a single chain
//! - Split R-hat (potential scale reduction over half-chains)
//! - Effective sample size with Geyer's initial monotone sequence
//!
//! All functions take one `Vec<f64>` per chain for a single scalar parameter.

use super::stable::{mean, variance};

/// Autocovariance of `series` at `lag`, biased (divided by n).
fn autocovariance_at(series: &[f64], series_mean: f64, lag: usize) -> f64 {
    let n = series.len();
    if lag >= n {
        return 0.0;
    }
    let mut acc = 0.0;
    for i in 0..(n - lag) {
        acc += (series[i] - series_mean) * (series[i + lag] - series_mean);
    }
    acc / n as f64
}

/// Autocorrelation for lags `0..=max_lag` (capped at n - 1).
///
/// Returns an empty vector for fewer than two values. A constant series has
/// correlation 1 at lag 0 and 0 at every other lag.
pub fn autocorrelation(series: &[f64], max_lag: usize) -> Vec<f64> {
    let n = series.len();
    if n < 2 {
        return Vec::new();
    }
    let max_lag = max_lag.min(n - 1);
    let m = mean(series);
    let c0 = autocovariance_at(series, m, 0);
    if c0 <= 0.0 {
        let mut out = vec![0.0; max_lag + 1];
        out[0] = 1.0;
        return out;
    }
    (0..=max_lag)
        .map(|lag| autocovariance_at(series, m, lag) / c0)
        .collect()
}

/// Split every chain into its first and second half, dropping the middle
/// draw of odd-length chains.
pub fn split_chains(chains: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let mut out = Vec::with_capacity(chains.len() * 2);
    for chain in chains {
        let half = chain.len() / 2;
        if half == 0 {
            continue;
        }
        out.push(chain[..half].to_vec());
        out.push(chain[chain.len() - half..].to_vec());
    }
    out
}

/// Common length of the chains (the shortest one) and the chains truncated
/// to it.
fn equalize(chains: Vec<Vec<f64>>) -> (usize, Vec<Vec<f64>>) {
    let n = chains.iter().map(Vec::len).min().unwrap_or(0);
    let chains = chains
        .into_iter()
        .map(|mut c| {
            c.truncate(n);
            c
        })
        .collect();
    (n, chains)
}

/// Split R-hat.
///
/// Values near 1.0 indicate the half-chains agree. Returns NaN when there
/// are fewer than two draws per half-chain, 1.0 when every draw is
/// identical, and +inf when chains are individually constant but disagree.
pub fn split_rhat(chains: &[Vec<f64>]) -> f64 {
    let (n, halves) = equalize(split_chains(chains));
    if n < 2 || halves.len() < 2 {
        return f64::NAN;
    }
    let means: Vec<f64> = halves.iter().map(|c| mean(c)).collect();
    let w = mean(&halves.iter().map(|c| variance(c)).collect::<Vec<_>>());
    let between = variance(&means); // B / n
    if w <= 0.0 {
        return if between <= 0.0 { 1.0 } else { f64::INFINITY };
    }
    let nf = n as f64;
    let var_plus = (nf - 1.0) / nf * w + between;
    (var_plus / w).sqrt()
}

/// Effective sample size over split chains.
///
/// Combines within-chain autocovariances with the between-chain variance and
/// truncates the autocorrelation sum with Geyer's initial monotone sequence.
/// Returns NaN for chains with no variance or fewer than four draws per
/// half-chain.
pub fn effective_sample_size(chains: &[Vec<f64>]) -> f64 {
    let (n, halves) = equalize(split_chains(chains));
    let m = halves.len();
    if m == 0 || n < 4 {
        return f64::NAN;
    }
    let nf = n as f64;
    let means: Vec<f64> = halves.iter().map(|c| mean(c)).collect();
    let w = mean(&halves.iter().map(|c| variance(c)).collect::<Vec<_>>());
    let mut var_plus = w * (nf - 1.0) / nf;
    if m > 1 {
        var_plus += variance(&means);
    }
    if var_plus <= 0.0 || var_plus.is_nan() {
        return f64::NAN;
    }

    let rho = |lag: usize| -> f64 {
        let mean_acov = halves
            .iter()
            .zip(&means)
            .map(|(c, &mu)| autocovariance_at(c, mu, lag))
            .sum::<f64>()
            / m as f64;
        1.0 - (w - mean_acov) / var_plus
    };

    let mut sum_pairs = 0.0;
    let mut prev_pair = f64::INFINITY;
    let mut lag = 0;
    while lag + 1 < n {
        let pair = rho(lag) + rho(lag + 1);
        if pair < 0.0 {
            break;
        }
        let pair = pair.min(prev_pair);
        sum_pairs += pair;
        prev_pair = pair;
        lag += 2;
    }

    let total = (m * n) as f64;
    let tau = (-1.0 + 2.0 * sum_pairs).max(1.0 / total.log10());
    total / tau
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic pseudo-random sequence in [0, 1) (LCG) for tests.
    fn lcg(seed: u64, n: usize) -> Vec<f64> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state
                    .wrapping_mul(6_364_136_223_846_793_005)
                    .wrapping_add(1_442_695_040_888_963_407);
                (state >> 11) as f64 / (1u64 << 53) as f64
            })
            .collect()
    }

    fn ar1(seed: u64, n: usize, phi: f64) -> Vec<f64> {
        let noise = lcg(seed, n);
        let mut x = 0.0;
        noise
            .iter()
            .map(|u| {
                x = phi * x + (u - 0.5);
                x
            })
            .collect()
    }

    #[test]
    fn autocorrelation_lag_zero_is_one() {
        let acf = autocorrelation(&lcg(1, 200), 10);
        assert_eq!(acf.len(), 11);
        assert!((acf[0] - 1.0).abs() < 1e-12);
        for r in &acf[1..] {
            assert!(r.abs() < 0.3, "white noise lag correlation too large: {r}");
        }
    }

    #[test]
    fn autocorrelation_of_persistent_series_is_high() {
        let acf = autocorrelation(&ar1(7, 2000, 0.95), 5);
        assert!(acf[1] > 0.8, "lag-1 autocorrelation {}", acf[1]);
    }

    #[test]
    fn autocorrelation_constant_and_short() {
        assert!(autocorrelation(&[1.0], 5).is_empty());
        let acf = autocorrelation(&[2.0; 10], 3);
        assert_eq!(acf, vec![1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn split_rhat_near_one_for_matching_chains() {
        let chains: Vec<Vec<f64>> = (0..4).map(|s| lcg(s + 10, 1000)).collect();
        let rhat = split_rhat(&chains);
        assert!(rhat < 1.02, "rhat = {rhat}");
    }

    #[test]
    fn split_rhat_flags_disagreeing_chains() {
        let a = lcg(1, 500);
        let b: Vec<f64> = lcg(2, 500).iter().map(|v| v + 5.0).collect();
        let rhat = split_rhat(&[a, b]);
        assert!(rhat > 1.5, "rhat = {rhat}");
    }

    #[test]
    fn split_rhat_degenerate_inputs() {
        assert!(split_rhat(&[vec![1.0]]).is_nan());
        assert_eq!(split_rhat(&[vec![3.0; 10], vec![3.0; 10]]), 1.0);
        assert!(split_rhat(&[vec![0.0; 10], vec![1.0; 10]]).is_infinite());
    }

    #[test]
    fn ess_of_independent_draws_is_close_to_total() {
        let chains: Vec<Vec<f64>> = (0..4).map(|s| lcg(s + 100, 500)).collect();
        let ess = effective_sample_size(&chains);
        assert!(ess > 1200.0 && ess < 2800.0, "ess = {ess}");
    }

    #[test]
    fn ess_of_autocorrelated_draws_is_small() {
        let chains: Vec<Vec<f64>> = (0..4).map(|s| ar1(s + 200, 500, 0.95)).collect();
        let ess = effective_sample_size(&chains);
        assert!(ess < 300.0, "ess = {ess}");
    }

    #[test]
    fn ess_of_constant_chain_is_nan() {
        assert!(effective_sample_size(&[vec![1.0; 50]]).is_nan());
    }
}

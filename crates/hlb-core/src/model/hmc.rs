//! Hamiltonian Monte Carlo with warmup adaptation.
//!
//! Each chain runs on its own scoped thread with an RNG seeded from
//! `seed + chain`. Warmup adapts the step size by dual averaging toward the
//! target acceptance rate and a diagonal inverse metric from the draws of
//! doubling windows (initial buffer 75, first window 25, terminal buffer
//! 50; proportionally 15% / 75% / 10% for short warmups). The trajectory
//! length is jittered and capped at `max_leapfrog_steps`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use hlb_common::{Error, Result};
use hlb_math::variance;

use super::sampler::{ChainDraws, LogitProblem, PosteriorDraws, PosteriorSampler, SamplerConfig};

/// Energy error above which a transition counts as divergent.
const MAX_ENERGY_ERROR: f64 = 1000.0;
const INIT_RADIUS: f64 = 0.5;
const INIT_ATTEMPTS: usize = 100;
const STEP_SEARCH_LIMIT: usize = 60;

/// HMC sampler with a jittered static trajectory length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HmcSampler {
    /// Trajectory length in units of the adapted metric.
    pub path_length: f64,
}

impl Default for HmcSampler {
    fn default() -> Self {
        HmcSampler { path_length: 2.0 }
    }
}

impl PosteriorSampler for HmcSampler {
    fn name(&self) -> &'static str {
        "hmc-diag"
    }

    fn sample(&self, problem: &LogitProblem, config: &SamplerConfig) -> Result<PosteriorDraws> {
        config.validate()?;
        let sampler = *self;
        let results: Vec<Result<ChainDraws>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..config.chains)
                .map(|chain| {
                    scope.spawn(move || ChainRunner::new(sampler, problem, config, chain).run())
                })
                .collect();
            handles
                .into_iter()
                .enumerate()
                .map(|(chain, h)| {
                    h.join().unwrap_or_else(|_| {
                        Err(Error::Sampler(format!("chain {} panicked", chain + 1)))
                    })
                })
                .collect()
        });
        let chains = results.into_iter().collect::<Result<Vec<_>>>()?;
        Ok(PosteriorDraws {
            param_names: problem.param_names().to_vec(),
            chains,
        })
    }
}

/// Position with its log density and gradient.
#[derive(Debug, Clone)]
struct State {
    q: Vec<f64>,
    logp: f64,
    grad: Vec<f64>,
}

struct Transition {
    accept_prob: f64,
    divergent: bool,
    steps: usize,
}

struct ChainRunner<'a> {
    sampler: HmcSampler,
    problem: &'a LogitProblem,
    config: &'a SamplerConfig,
    chain: usize,
    rng: StdRng,
    inv_metric: Vec<f64>,
}

impl<'a> ChainRunner<'a> {
    fn new(
        sampler: HmcSampler,
        problem: &'a LogitProblem,
        config: &'a SamplerConfig,
        chain: usize,
    ) -> Self {
        ChainRunner {
            sampler,
            problem,
            config,
            chain,
            rng: StdRng::seed_from_u64(config.seed.wrapping_add(chain as u64)),
            inv_metric: vec![1.0; problem.dim()],
        }
    }

    fn run(mut self) -> Result<ChainDraws> {
        let mut state = self.initial_state()?;
        let mut step = self.find_step_size(&state, 1.0);
        let mut adapt = DualAveraging::new(step, self.config.target_accept);
        let windows = metric_windows(self.config.warmup);
        let mut window_draws: Vec<Vec<f64>> = Vec::new();

        for it in 0..self.config.warmup {
            let t = self.transition(&mut state, adapt.step_size());
            adapt.update(t.accept_prob);
            if let Some(&(_, end)) = windows.iter().find(|(s, e)| it >= *s && it < *e) {
                window_draws.push(state.q.clone());
                if it + 1 == end {
                    self.update_metric(&window_draws);
                    window_draws.clear();
                    step = self.find_step_size(&state, adapt.step_size());
                    adapt = DualAveraging::new(step, self.config.target_accept);
                }
            }
        }
        if self.config.warmup > 0 {
            step = adapt.final_step_size();
        }

        let mut draws = Vec::with_capacity(self.config.draws);
        let mut divergences = 0;
        let mut accept_sum = 0.0;
        let mut steps_sum = 0usize;
        for _ in 0..self.config.draws {
            let t = self.transition(&mut state, step);
            accept_sum += t.accept_prob;
            steps_sum += t.steps;
            if t.divergent {
                divergences += 1;
            }
            draws.push(state.q.clone());
        }

        let n = self.config.draws as f64;
        tracing::debug!(
            chain = self.chain + 1,
            step_size = step,
            divergences,
            accept_rate = accept_sum / n,
            "chain finished"
        );
        Ok(ChainDraws {
            draws,
            divergences,
            step_size: step,
            accept_rate: accept_sum / n,
            mean_leapfrog_steps: steps_sum as f64 / n,
        })
    }

    fn initial_state(&mut self) -> Result<State> {
        let dim = self.problem.dim();
        let mut grad = vec![0.0; dim];
        for _ in 0..INIT_ATTEMPTS {
            let q: Vec<f64> = (0..dim)
                .map(|_| self.rng.random_range(-INIT_RADIUS..INIT_RADIUS))
                .collect();
            let logp = self.problem.log_density_and_grad(&q, &mut grad);
            if logp.is_finite() && grad.iter().all(|g| g.is_finite()) {
                return Ok(State { q, logp, grad });
            }
        }
        Err(Error::NumericalInstability(format!(
            "chain {}: no finite starting point after {} attempts",
            self.chain + 1,
            INIT_ATTEMPTS
        )))
    }

    fn momentum(&mut self) -> Vec<f64> {
        self.inv_metric
            .iter()
            .map(|inv| {
                let z: f64 = self.rng.sample(StandardNormal);
                z / inv.sqrt()
            })
            .collect()
    }

    fn kinetic(&self, p: &[f64]) -> f64 {
        0.5 * p
            .iter()
            .zip(&self.inv_metric)
            .map(|(p, inv)| inv * p * p)
            .sum::<f64>()
    }

    fn leapfrog(&self, state: &mut State, p: &mut [f64], eps: f64) {
        for (p, g) in p.iter_mut().zip(&state.grad) {
            *p += 0.5 * eps * g;
        }
        for ((q, p), inv) in state.q.iter_mut().zip(p.iter()).zip(&self.inv_metric) {
            *q += eps * inv * p;
        }
        state.logp = self.problem.log_density_and_grad(&state.q, &mut state.grad);
        for (p, g) in p.iter_mut().zip(&state.grad) {
            *p += 0.5 * eps * g;
        }
    }

    fn transition(&mut self, state: &mut State, step: f64) -> Transition {
        let eps = step * self.rng.random_range(0.9..1.1);
        let length = self.sampler.path_length * self.rng.random_range(0.5..1.5);
        let max_steps = self.config.max_leapfrog_steps.max(1);
        let n_steps = ((length / eps).ceil() as usize).clamp(1, max_steps);

        let mut p = self.momentum();
        let h0 = -state.logp + self.kinetic(&p);
        let mut proposal = state.clone();
        let mut steps = 0;
        for _ in 0..n_steps {
            self.leapfrog(&mut proposal, &mut p, eps);
            steps += 1;
            if !proposal.logp.is_finite() {
                break;
            }
        }
        let h1 = -proposal.logp + self.kinetic(&p);
        let delta = h1 - h0;
        let divergent = !delta.is_finite() || delta > MAX_ENERGY_ERROR;
        let accept_prob = if delta.is_finite() {
            (-delta).exp().min(1.0)
        } else {
            0.0
        };
        if self.rng.random::<f64>() < accept_prob {
            *state = proposal;
        }
        Transition {
            accept_prob,
            divergent,
            steps,
        }
    }

    /// Log acceptance ratio of one leapfrog step from `state`.
    fn probe(&mut self, state: &State, eps: f64) -> f64 {
        let mut p = self.momentum();
        let h0 = -state.logp + self.kinetic(&p);
        let mut moved = state.clone();
        self.leapfrog(&mut moved, &mut p, eps);
        let ratio = h0 - (-moved.logp + self.kinetic(&p));
        if ratio.is_nan() {
            f64::NEG_INFINITY
        } else {
            ratio
        }
    }

    /// Double or halve `eps` until one step's acceptance crosses 1/2.
    fn find_step_size(&mut self, state: &State, start: f64) -> f64 {
        let ln_half = 0.5f64.ln();
        let mut eps = start;
        let direction = if self.probe(state, eps) > ln_half { 1.0 } else { -1.0 };
        for _ in 0..STEP_SEARCH_LIMIT {
            let next = eps * 2f64.powf(direction);
            if !(1e-10..=1e3).contains(&next) {
                break;
            }
            let ratio = self.probe(state, next);
            let crossed = if direction > 0.0 {
                ratio <= ln_half
            } else {
                ratio > ln_half
            };
            eps = next;
            if crossed {
                break;
            }
        }
        eps
    }

    fn update_metric(&mut self, window: &[Vec<f64>]) {
        let n = window.len();
        if n < 3 {
            return;
        }
        let nf = n as f64;
        for (j, inv) in self.inv_metric.iter_mut().enumerate() {
            let column: Vec<f64> = window.iter().map(|q| q[j]).collect();
            let var = variance(&column);
            *inv = (nf / (nf + 5.0)) * var + 1e-3 * (5.0 / (nf + 5.0));
        }
    }
}

/// Nesterov dual averaging of log step size.
#[derive(Debug, Clone)]
struct DualAveraging {
    mu: f64,
    target: f64,
    log_eps: f64,
    log_eps_bar: f64,
    h_bar: f64,
    t: f64,
}

impl DualAveraging {
    const GAMMA: f64 = 0.05;
    const T0: f64 = 10.0;
    const KAPPA: f64 = 0.75;

    fn new(eps: f64, target: f64) -> Self {
        DualAveraging {
            mu: (10.0 * eps).ln(),
            target,
            log_eps: eps.ln(),
            log_eps_bar: 0.0,
            h_bar: 0.0,
            t: 0.0,
        }
    }

    fn update(&mut self, accept_prob: f64) {
        self.t += 1.0;
        let eta = 1.0 / (self.t + Self::T0);
        self.h_bar = (1.0 - eta) * self.h_bar + eta * (self.target - accept_prob);
        self.log_eps = self.mu - self.t.sqrt() / Self::GAMMA * self.h_bar;
        let w = self.t.powf(-Self::KAPPA);
        self.log_eps_bar = w * self.log_eps + (1.0 - w) * self.log_eps_bar;
    }

    fn step_size(&self) -> f64 {
        self.log_eps.exp()
    }

    fn final_step_size(&self) -> f64 {
        if self.t == 0.0 {
            self.step_size()
        } else {
            self.log_eps_bar.exp()
        }
    }
}

/// Metric adaptation windows `[start, end)` within warmup.
fn metric_windows(warmup: usize) -> Vec<(usize, usize)> {
    if warmup < 20 {
        return Vec::new();
    }
    let (init, term, base) = if warmup >= 150 {
        (75, 50, 25)
    } else {
        let init = (0.15 * warmup as f64) as usize;
        let term = (0.1 * warmup as f64) as usize;
        (init, term, warmup - init - term)
    };
    let end_slow = warmup - term;
    let mut windows = Vec::new();
    let mut start = init;
    let mut size = base;
    while start < end_slow {
        let mut end = (start + size).min(end_slow);
        if end + 2 * size > end_slow {
            end = end_slow;
        }
        windows.push((start, end));
        start = end;
        size *= 2;
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{clean, read_csv, CleaningOptions};
    use crate::model::design::DesignMatrix;
    use crate::model::formula::Formula;
    use crate::model::prior::resolve_priors;
    use hlb_config::{ModelSpec, PriorConfig};
    use hlb_math::mean;

    fn problem() -> LogitProblem {
        let mut csv = String::from("Id,Genetics,Hair Loss\n");
        for i in 0..200 {
            let genetics = i % 2 == 0;
            let yes = if genetics { i % 5 != 0 } else { i % 5 == 0 };
            csv.push_str(&format!(
                "{},{},{}\n",
                i,
                if genetics { "Yes" } else { "No" },
                u8::from(yes)
            ));
        }
        let raw = read_csv(csv.as_bytes(), "t").unwrap();
        let table = clean(&raw, &CleaningOptions::default()).unwrap().table;
        let f = Formula::from_spec(&ModelSpec::new("m", &["Genetics"])).unwrap();
        let design = DesignMatrix::build(&table, &f).unwrap();
        let priors = resolve_priors(&PriorConfig::default(), &design).unwrap();
        LogitProblem::new(&design, &priors).unwrap()
    }

    fn config(seed: u64) -> SamplerConfig {
        SamplerConfig {
            chains: 2,
            warmup: 200,
            draws: 300,
            seed,
            target_accept: 0.8,
            max_leapfrog_steps: 64,
        }
    }

    #[test]
    fn recovers_strong_effect() {
        let draws = HmcSampler::default().sample(&problem(), &config(7)).unwrap();
        assert_eq!(draws.n_chains(), 2);
        assert_eq!(draws.n_draws(), 600);
        assert_eq!(draws.param_names, ["(Intercept)", "GeneticsYes"]);
        // True log odds ratio is 2 ln 4, about 2.77.
        let effect = mean(&draws.param_all(1));
        assert!(effect > 1.8 && effect < 3.8, "effect {effect}");
        for chain in &draws.chains {
            assert!(chain.accept_rate > 0.4, "accept {}", chain.accept_rate);
            assert!(chain.step_size > 0.0);
        }
    }

    #[test]
    fn same_seed_same_draws() {
        let p = problem();
        let a = HmcSampler::default().sample(&p, &config(11)).unwrap();
        let b = HmcSampler::default().sample(&p, &config(11)).unwrap();
        assert_eq!(a, b);
        let c = HmcSampler::default().sample(&p, &config(12)).unwrap();
        assert_ne!(a.chains[0].draws, c.chains[0].draws);
    }

    #[test]
    fn windows_cover_slow_phase() {
        let w = metric_windows(1000);
        assert_eq!(w.first(), Some(&(75, 100)));
        assert_eq!(w.last().map(|x| x.1), Some(950));
        for pair in w.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
        assert!(metric_windows(10).is_empty());
        let short = metric_windows(100);
        assert_eq!(short.first().map(|x| x.0), Some(15));
        assert_eq!(short.last().map(|x| x.1), Some(90));
    }

    #[test]
    fn dual_averaging_shrinks_step_on_rejection() {
        let mut da = DualAveraging::new(1.0, 0.8);
        for _ in 0..50 {
            da.update(0.0);
        }
        assert!(da.step_size() < 1.0);
        assert!(da.final_step_size() < 1.0);
    }
}

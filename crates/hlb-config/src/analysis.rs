//! Analysis configuration types.
//!
//! These types match the analysis.json layout. Every section has a default,
//! so a file only needs to carry the values it changes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::preset::preset_models;

/// Complete analysis configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AnalysisConfig {
    pub schema_version: String,

    /// Posterior-mean probability at or above which a row is classified Yes.
    pub outcome_threshold: f64,

    /// Credible level for coefficient summaries.
    pub credible_level: f64,

    pub cleaning: CleaningConfig,
    pub priors: PriorConfig,
    pub sampler: SamplerSettings,
    pub diagnostics: DiagnosticsConfig,
    pub ppc: PpcSettings,
    pub cross_validation: CrossValidationConfig,

    /// Models fitted by `analyze`, in report order.
    pub models: Vec<ModelSpec>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            outcome_threshold: 0.5,
            credible_level: 0.8,
            cleaning: CleaningConfig::default(),
            priors: PriorConfig::default(),
            sampler: SamplerSettings::default(),
            diagnostics: DiagnosticsConfig::default(),
            ppc: PpcSettings::default(),
            cross_validation: CrossValidationConfig::default(),
            models: preset_models(),
        }
    }
}

impl AnalysisConfig {
    /// Look up a configured model by name (case-insensitive).
    pub fn model(&self, name: &str) -> Option<&ModelSpec> {
        self.models
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }

    /// Sampler settings used for cross-validation refits.
    pub fn cv_sampler(&self) -> &SamplerSettings {
        self.cross_validation.sampler.as_ref().unwrap_or(&self.sampler)
    }
}

/// Row-cleaning options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CleaningConfig {
    /// Cell value marking an unusable row. Compared trimmed, case-insensitively.
    pub sentinel: String,

    pub duplicates: DuplicatePolicy,

    /// Explicit level order per column (keyed by column name), overriding
    /// the built-in order.
    pub level_orders: BTreeMap<String, Vec<String>>,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            sentinel: "No Data".to_string(),
            duplicates: DuplicatePolicy::default(),
            level_orders: BTreeMap::new(),
        }
    }
}

/// How rows sharing an identifier are resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep the first row of each identifier group.
    #[default]
    KeepFirst,
    /// Remove every row of a duplicated identifier.
    DropAll,
    /// Remove all rows of the listed identifiers, then keep the first row of
    /// any duplicate group that remains.
    DropListed { ids: Vec<String> },
}

impl std::fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DuplicatePolicy::KeepFirst => write!(f, "keep_first"),
            DuplicatePolicy::DropAll => write!(f, "drop_all"),
            DuplicatePolicy::DropListed { ids } => write!(f, "drop_listed({})", ids.join(",")),
        }
    }
}

/// Prior configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PriorConfig {
    /// Plausible range of the population base rate, used to derive the
    /// intercept prior.
    pub base_rate: BaseRateRange,

    /// Replaces the derived intercept prior when set.
    pub intercept_override: Option<NormalPrior>,

    /// Nominal scale of the normal(0, scale) coefficient prior.
    pub coefficient_scale: f64,

    /// Rescale each coefficient prior by its predictor's spread.
    pub autoscale: bool,
}

impl Default for PriorConfig {
    fn default() -> Self {
        Self {
            base_rate: BaseRateRange::default(),
            intercept_override: None,
            coefficient_scale: 2.5,
            autoscale: true,
        }
    }
}

/// Plausible base-rate range as probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BaseRateRange {
    pub low: f64,
    pub high: f64,
}

impl Default for BaseRateRange {
    fn default() -> Self {
        Self {
            low: 0.16,
            high: 0.5,
        }
    }
}

/// Normal(mean, scale) prior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NormalPrior {
    pub mean: f64,
    pub scale: f64,
}

/// MCMC sampler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SamplerSettings {
    pub chains: usize,

    /// Iterations per chain, warmup included.
    pub iterations: usize,

    /// Warmup iterations per chain. Defaults to half the iterations.
    pub warmup: Option<usize>,

    pub seed: u64,

    /// Target acceptance rate for step-size adaptation.
    pub target_accept: f64,

    /// Upper bound on leapfrog steps per iteration.
    pub max_leapfrog_steps: usize,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            chains: 4,
            iterations: 2000,
            warmup: None,
            seed: 123,
            target_accept: 0.8,
            max_leapfrog_steps: 256,
        }
    }
}

impl SamplerSettings {
    /// Effective warmup length.
    pub fn warmup_iterations(&self) -> usize {
        self.warmup.unwrap_or(self.iterations / 2)
    }

    /// Retained draws per chain.
    pub fn draws_per_chain(&self) -> usize {
        self.iterations.saturating_sub(self.warmup_iterations())
    }
}

/// Convergence diagnostics and plot settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Largest autocorrelation lag reported.
    pub max_lag: usize,

    /// Split R-hat above this value raises a convergence warning.
    pub rhat_threshold: f64,

    /// Bulk ESS below this value times the chain count raises a warning.
    pub min_ess_per_chain: f64,

    /// Points kept per chain in trace plots.
    pub trace_points: usize,

    /// Grid size for density overlays.
    pub density_points: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            max_lag: 20,
            rhat_threshold: 1.05,
            min_ess_per_chain: 100.0,
            trace_points: 60,
            density_points: 48,
        }
    }
}

/// Posterior predictive check settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PpcSettings {
    /// Number of simulated datasets.
    pub n_reps: usize,
    pub seed: u64,
    /// Level of the reported central interval of the simulated statistic.
    pub level: f64,
}

impl Default for PpcSettings {
    fn default() -> Self {
        Self {
            n_reps: 200,
            seed: 321,
            level: 0.9,
        }
    }
}

/// K-fold cross-validation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CrossValidationConfig {
    pub enabled: bool,
    pub folds: usize,
    pub seed: u64,

    /// Sampler settings for the fold refits. Falls back to the main sampler.
    pub sampler: Option<SamplerSettings>,
}

impl Default for CrossValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            folds: 10,
            seed: 42,
            sampler: None,
        }
    }
}

/// A named model: outcome ~ predictors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ModelSpec {
    pub name: String,

    /// Predictor column names in formula order.
    pub predictors: Vec<String>,
}

impl ModelSpec {
    pub fn new(name: impl Into<String>, predictors: &[&str]) -> Self {
        Self {
            name: name.into(),
            predictors: predictors.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// R-style formula text, e.g. `Hair.Loss ~ Age + Genetics`.
    pub fn formula_text(&self) -> String {
        format!("Hair.Loss ~ {}", self.predictors.join(" + "))
    }
}

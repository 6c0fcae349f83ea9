//! Evaluation of fitted models.
//!
//! - [`diagnostics`]: trace, density overlay, autocorrelation, R-hat, ESS
//! - [`summary`]: coefficient summaries and credible intervals
//! - [`ppc`]: posterior predictive check
//! - [`accuracy`]: in-sample confusion matrix
//! - [`cv`]: k-fold cross-validated accuracy
//! - [`compare`]: model comparison table

pub mod accuracy;
pub mod compare;
pub mod cv;
pub mod diagnostics;
pub mod ppc;
pub mod summary;

use serde::Serialize;

use hlb_common::Result;
use hlb_config::AnalysisConfig;

pub use accuracy::{classification_accuracy, AccuracyReport, ConfusionMatrix};
pub use compare::{compare_models, ComparisonRow, ModelComparison, RankKey};
pub use cv::{cross_validate, kfold_partition, CvOptions, CvResult, FoldResult};
pub use diagnostics::{diagnose, Diagnostics, TermDiagnostics};
pub use ppc::{posterior_predictive_check, PpcResult};
pub use summary::{summarize, CoefficientSummary, ModelSummary};

use crate::model::{ConvergenceWarning, FittedModel};

/// Everything computed for one fitted model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelEvaluation {
    pub model: String,
    pub formula: String,
    pub coefficients: usize,
    pub summary: ModelSummary,
    pub diagnostics: Diagnostics,
    pub ppc: PpcResult,
    pub accuracy: AccuracyReport,
    pub cv: Option<CvResult>,
    pub warnings: Vec<ConvergenceWarning>,
}

/// Summary, diagnostics, PPC and in-sample accuracy of `fit`.
pub fn evaluate_model(fit: &FittedModel, config: &AnalysisConfig) -> Result<ModelEvaluation> {
    Ok(ModelEvaluation {
        model: fit.name.clone(),
        formula: fit.formula.to_string(),
        coefficients: fit.n_coefficients(),
        summary: summarize(fit, config.credible_level)?,
        diagnostics: diagnose(fit, &config.diagnostics),
        ppc: posterior_predictive_check(fit, &config.ppc)?,
        accuracy: classification_accuracy(fit, config.outcome_threshold)?,
        cv: None,
        warnings: fit.warnings.clone(),
    })
}

impl ModelEvaluation {
    pub fn with_cv(mut self, cv: CvResult) -> Self {
        self.cv = Some(cv);
        self
    }
}

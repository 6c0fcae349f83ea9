//! Analysis pipeline.
//!
//! Stages run to completion in order: load, clean, prior, fit, evaluate.
//! Each stage logs through `tracing` and records a [`LogEvent`] so the
//! report carries its own audit trail.

use std::path::Path;

use serde::Serialize;

use hlb_common::Result;
use hlb_config::{AnalysisConfig, ModelSpec, NormalPrior};

use crate::data::{
    clean, load_csv, CleanOutcome, CleaningOptions, CleaningReport, ColumnMissing,
    DataQualityIssue, RawTable, SurveyTable,
};
use crate::evaluate::{
    compare_models, cross_validate, evaluate_model, CvOptions, ModelComparison, ModelEvaluation,
};
use crate::log_event;
use crate::logging::{event_names, LogContext, LogEvent, Stage};
use crate::model::{
    fit_model_with, intercept_prior, ConvergenceThresholds, FittedModel, InterceptSource,
    PosteriorSampler, SamplerConfig,
};

/// Shape of the input file before cleaning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputSummary {
    pub path: String,
    pub rows: usize,
    pub columns: usize,
    pub headers: Vec<String>,
    /// Empty or NA cells per column.
    pub missing: Vec<ColumnMissing>,
    /// Sentinel cells per column.
    pub sentinel: Vec<ColumnMissing>,
}

impl InputSummary {
    pub fn describe(path: &str, raw: &RawTable, sentinel: &str) -> Self {
        InputSummary {
            path: path.to_string(),
            rows: raw.n_rows(),
            columns: raw.n_cols(),
            headers: raw.headers.iter().map(|h| h.trim().to_string()).collect(),
            missing: raw.missing_counts(),
            sentinel: raw.sentinel_counts(sentinel),
        }
    }
}

/// Intercept prior in effect for a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorSummary {
    pub intercept: NormalPrior,
    pub source: InterceptSource,
    pub coefficient_scale: f64,
    pub autoscale: bool,
}

/// Output of a full `analyze` run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub input: InputSummary,
    pub cleaning: CleaningReport,
    pub issues: Vec<DataQualityIssue>,
    pub prior: PriorSummary,
    pub models: Vec<ModelEvaluation>,
    pub comparison: ModelComparison,
    pub events: Vec<LogEvent>,
}

impl AnalysisReport {
    /// True when no model raised a convergence warning.
    pub fn all_converged(&self) -> bool {
        self.models.iter().all(|m| m.warnings.is_empty())
    }
}

/// Runs pipeline stages against one configuration and sampler.
pub struct Pipeline<'a> {
    config: &'a AnalysisConfig,
    sampler: &'a dyn PosteriorSampler,
    ctx: LogContext,
    events: Vec<LogEvent>,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a AnalysisConfig, sampler: &'a dyn PosteriorSampler, ctx: LogContext) -> Self {
        Pipeline {
            config,
            sampler,
            ctx,
            events: Vec::new(),
        }
    }

    /// Events recorded so far.
    pub fn events(&self) -> &[LogEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<LogEvent> {
        self.events
    }

    pub fn load(&mut self, path: &Path) -> Result<(RawTable, InputSummary)> {
        let raw = load_csv(path)?;
        let summary = InputSummary::describe(
            &path.display().to_string(),
            &raw,
            &self.config.cleaning.sentinel,
        );
        log_event!(
            self.ctx,
            INFO,
            event_names::LOAD_FINISHED,
            Stage::Load,
            "input loaded",
            rows = raw.n_rows() as u64,
            columns = raw.n_cols() as u64
        );
        self.events.push(
            self.ctx
                .info(event_names::LOAD_FINISHED, Stage::Load, "input loaded")
                .with_field("path", &summary.path)
                .with_field("rows", summary.rows)
                .with_field("columns", summary.columns),
        );
        Ok((raw, summary))
    }

    pub fn clean(&mut self, raw: &RawTable) -> Result<CleanOutcome> {
        let options = CleaningOptions::from_config(&self.config.cleaning)?;
        let outcome = clean(raw, &options)?;
        let report = &outcome.report;

        let dropped = report.dropped_sentinel + report.dropped_missing;
        if dropped > 0 {
            log_event!(
                self.ctx,
                WARN,
                event_names::CLEAN_ROWS_DROPPED,
                Stage::Clean,
                "rows with sentinel or missing values dropped",
                sentinel = report.dropped_sentinel as u64,
                missing = report.dropped_missing as u64
            );
            self.events.push(
                self.ctx
                    .warn(
                        event_names::CLEAN_ROWS_DROPPED,
                        Stage::Clean,
                        format!("{} rows dropped", dropped),
                    )
                    .with_field("sentinel", report.dropped_sentinel)
                    .with_field("missing", report.dropped_missing),
            );
        }
        if !report.duplicate_ids.is_empty() {
            log_event!(
                self.ctx,
                WARN,
                event_names::CLEAN_DUPLICATES_RESOLVED,
                Stage::Clean,
                "duplicate identifiers resolved",
                ids = report.duplicate_ids.len() as u64,
                dropped = report.dropped_duplicates as u64
            );
            self.events.push(
                self.ctx
                    .warn(
                        event_names::CLEAN_DUPLICATES_RESOLVED,
                        Stage::Clean,
                        format!(
                            "{} duplicated identifiers, {} rows dropped",
                            report.duplicate_ids.len(),
                            report.dropped_duplicates
                        ),
                    )
                    .with_field("ids", &report.duplicate_ids)
                    .with_field("policy", options.duplicates.to_string()),
            );
        }
        log_event!(
            self.ctx,
            INFO,
            event_names::CLEAN_FINISHED,
            Stage::Clean,
            "cleaning finished",
            rows_in = report.rows_in as u64,
            rows_out = report.rows_out as u64
        );
        self.events.push(
            self.ctx
                .info(event_names::CLEAN_FINISHED, Stage::Clean, "cleaning finished")
                .with_field("rows_in", report.rows_in)
                .with_field("rows_out", report.rows_out),
        );
        Ok(outcome)
    }

    pub fn prior(&mut self) -> Result<PriorSummary> {
        let (intercept, source) = intercept_prior(&self.config.priors)?;
        log_event!(
            self.ctx,
            INFO,
            event_names::PRIOR_RESOLVED,
            Stage::Prior,
            "intercept prior resolved",
            mean = intercept.mean,
            scale = intercept.scale
        );
        self.events.push(
            self.ctx
                .info(event_names::PRIOR_RESOLVED, Stage::Prior, "intercept prior resolved")
                .with_field("mean", intercept.mean)
                .with_field("scale", intercept.scale),
        );
        Ok(PriorSummary {
            intercept,
            source,
            coefficient_scale: self.config.priors.coefficient_scale,
            autoscale: self.config.priors.autoscale,
        })
    }

    pub fn fit(&mut self, table: &SurveyTable, spec: &ModelSpec) -> Result<FittedModel> {
        let ctx = self.ctx.for_model(&spec.name);
        let config = SamplerConfig::from_settings(&self.config.sampler)?;
        log_event!(
            ctx,
            INFO,
            event_names::FIT_STARTED,
            Stage::Fit,
            "fitting",
            chains = config.chains as u64,
            draws = config.draws as u64
        );
        let thresholds = ConvergenceThresholds::from(&self.config.diagnostics);
        let fit = fit_model_with(
            table,
            spec,
            &self.config.priors,
            self.sampler,
            &config,
            &thresholds,
        )?;

        for w in &fit.warnings {
            self.events.push(
                ctx.warn(event_names::FIT_CONVERGENCE_WARNING, Stage::Fit, w.to_string())
                    .with_field("warning", w),
            );
        }
        log_event!(
            ctx,
            INFO,
            event_names::FIT_FINISHED,
            Stage::Fit,
            "fit finished",
            coefficients = fit.n_coefficients() as u64,
            divergences = fit.draws.divergences() as u64,
            warnings = fit.warnings.len() as u64
        );
        self.events.push(
            ctx.info(event_names::FIT_FINISHED, Stage::Fit, "fit finished")
                .with_field("coefficients", fit.n_coefficients())
                .with_field("warnings", fit.warnings.len()),
        );
        Ok(fit)
    }

    /// Evaluate `fit`, cross-validating when enabled.
    pub fn evaluate(&mut self, fit: &FittedModel) -> Result<ModelEvaluation> {
        let ctx = self.ctx.for_model(&fit.name);
        let mut evaluation = evaluate_model(fit, self.config)?;

        log_event!(
            ctx,
            INFO,
            event_names::EVAL_PPC,
            Stage::Evaluate,
            "posterior predictive check",
            observed = evaluation.ppc.observed,
            p_value = evaluation.ppc.p_value
        );
        self.events.push(
            ctx.info(event_names::EVAL_PPC, Stage::Evaluate, "posterior predictive check")
                .with_field("p_value", evaluation.ppc.p_value),
        );
        log_event!(
            ctx,
            INFO,
            event_names::EVAL_ACCURACY,
            Stage::Evaluate,
            "in-sample accuracy",
            accuracy = evaluation.accuracy.accuracy
        );
        self.events.push(
            ctx.info(event_names::EVAL_ACCURACY, Stage::Evaluate, "in-sample accuracy")
                .with_field("accuracy", evaluation.accuracy.accuracy),
        );

        let cv = &self.config.cross_validation;
        if cv.enabled {
            let options = CvOptions {
                folds: cv.folds,
                seed: cv.seed,
                threshold: self.config.outcome_threshold,
                sampler: SamplerConfig::from_settings(self.config.cv_sampler())?,
                thresholds: ConvergenceThresholds::from(&self.config.diagnostics),
            };
            let result = cross_validate(fit, &self.config.priors, self.sampler, &options)?;
            log_event!(
                ctx,
                INFO,
                event_names::EVAL_CV_FINISHED,
                Stage::Evaluate,
                "cross-validation finished",
                folds = result.folds as u64,
                accuracy = result.accuracy
            );
            self.events.push(
                ctx.info(event_names::EVAL_CV_FINISHED, Stage::Evaluate, "cross-validation finished")
                    .with_field("folds", result.folds)
                    .with_field("accuracy", result.accuracy),
            );
            evaluation = evaluation.with_cv(result);
        }
        Ok(evaluation)
    }

    /// Full run from a CSV file.
    pub fn analyze(mut self, path: &Path) -> Result<AnalysisReport> {
        let (raw, input) = self.load(path)?;
        self.analyze_loaded(raw, input)
    }

    /// Full run from an already loaded table.
    pub fn analyze_loaded(mut self, raw: RawTable, input: InputSummary) -> Result<AnalysisReport> {
        log_event!(
            self.ctx,
            INFO,
            event_names::RUN_STARTED,
            Stage::Init,
            "analysis started",
            models = self.config.models.len() as u64
        );
        let cleaned = self.clean(&raw)?;
        let prior = self.prior()?;

        let config = self.config;
        let mut models = Vec::with_capacity(config.models.len());
        for spec in &config.models {
            let fit = self.fit(&cleaned.table, spec)?;
            models.push(self.evaluate(&fit)?);
        }
        let comparison = compare_models(&models);

        log_event!(
            self.ctx,
            INFO,
            event_names::RUN_FINISHED,
            Stage::Report,
            "analysis finished",
            best = comparison.best().map(|r| r.model.as_str()).unwrap_or_default()
        );
        self.events.push(
            self.ctx
                .info(event_names::RUN_FINISHED, Stage::Report, "analysis finished")
                .with_field("best", comparison.best().map(|r| r.model.clone())),
        );

        Ok(AnalysisReport {
            input,
            cleaning: cleaned.report,
            issues: cleaned.issues,
            prior,
            models,
            comparison,
            events: self.events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::read_csv;
    use crate::logging::Level;
    use crate::model::HmcSampler;
    use crate::test_utils::synthetic_csv;
    use hlb_config::SamplerSettings;

    fn small_config() -> AnalysisConfig {
        let mut cfg = AnalysisConfig {
            sampler: SamplerSettings {
                chains: 2,
                iterations: 300,
                ..SamplerSettings::default()
            },
            ..AnalysisConfig::default()
        };
        cfg.cross_validation.enabled = false;
        cfg.ppc.n_reps = 50;
        cfg.models.truncate(1);
        cfg
    }

    fn run(cfg: &AnalysisConfig) -> AnalysisReport {
        let csv = synthetic_csv();
        let raw = read_csv(csv.as_bytes(), "synthetic").unwrap();
        let input = InputSummary::describe("synthetic", &raw, &cfg.cleaning.sentinel);
        let sampler = HmcSampler::default();
        Pipeline::new(cfg, &sampler, LogContext::new("run-test", "host-test"))
            .analyze_loaded(raw, input)
            .unwrap()
    }

    #[test]
    fn analyze_produces_one_evaluation_per_model() {
        let cfg = small_config();
        let report = run(&cfg);
        assert_eq!(report.models.len(), 1);
        assert_eq!(report.models[0].model, "model1");
        assert_eq!(report.comparison.rows.len(), 1);
        assert!(report.cleaning.dropped_sentinel > 0);
        let c = &report.cleaning;
        assert_eq!(c.rows_in, report.input.rows);
        assert_eq!(
            c.rows_out + c.dropped_sentinel + c.dropped_missing + c.dropped_duplicates,
            c.rows_in
        );
        assert!((report.prior.intercept.mean - -0.829).abs() < 0.01);
    }

    #[test]
    fn events_record_each_stage() {
        let report = run(&small_config());
        let names: Vec<&str> = report.events.iter().map(|e| e.event.as_str()).collect();
        for expected in [
            event_names::CLEAN_ROWS_DROPPED,
            event_names::CLEAN_DUPLICATES_RESOLVED,
            event_names::CLEAN_FINISHED,
            event_names::PRIOR_RESOLVED,
            event_names::FIT_FINISHED,
            event_names::EVAL_ACCURACY,
            event_names::RUN_FINISHED,
        ] {
            assert!(names.contains(&expected), "missing {expected}");
        }
        let dropped = report
            .events
            .iter()
            .find(|e| e.event == event_names::CLEAN_ROWS_DROPPED)
            .unwrap();
        assert_eq!(dropped.level, Level::Warn);
        assert!(report
            .events
            .iter()
            .filter(|e| e.event == event_names::FIT_FINISHED)
            .all(|e| e.model.as_deref() == Some("model1")));
    }

    #[test]
    fn cross_validation_attaches_results() {
        let mut cfg = small_config();
        cfg.cross_validation.enabled = true;
        cfg.cross_validation.folds = 3;
        let report = run(&cfg);
        let cv = report.models[0].cv.as_ref().unwrap();
        assert_eq!(cv.fold_results.len(), 3);
        assert_eq!(report.comparison.ranked_by, crate::evaluate::RankKey::CvAccuracy);
    }

    #[test]
    fn missing_predictor_column_fails_the_run() {
        let mut cfg = small_config();
        cfg.models = vec![ModelSpec::new("bad", &["Genetics"])];
        let csv = "Id,Age,Hair Loss\n1,20,1\n2,30,0\n";
        let raw = read_csv(csv.as_bytes(), "x").unwrap();
        let input = InputSummary::describe("x", &raw, "No Data");
        let sampler = HmcSampler::default();
        let err = Pipeline::new(&cfg, &sampler, LogContext::new("r", "h"))
            .analyze_loaded(raw, input)
            .unwrap_err();
        assert_eq!(err.code(), 23);
    }
}

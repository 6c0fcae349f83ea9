//! Command payloads and their renderings.
//!
//! Every command produces one payload. JSON output wraps it in an
//! [`Envelope`]; Markdown and one-line summaries come from [`Render`].

pub mod plots;

use chrono::Utc;
use serde::Serialize;

use hlb_common::{OutputFormat, Result, SCHEMA_VERSION};

use crate::config::ConfigSnapshot;
use crate::data::{CleaningReport, DataQualityIssue};
use crate::evaluate::{Diagnostics, ModelComparison, ModelEvaluation, ModelSummary};
use crate::model::{ConvergenceWarning, FittedModel, InterceptSource, ResolvedPriors, SamplerConfig};
use crate::pipeline::{AnalysisReport, InputSummary, PriorSummary};

const PLOT_WIDTH: usize = 40;

/// JSON wrapper shared by all commands.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<'a, T: Serialize> {
    pub schema_version: &'static str,
    pub run_id: &'a str,
    pub generated_at: String,
    pub command: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<&'a ConfigSnapshot>,
    pub result: &'a T,
}

impl<'a, T: Serialize> Envelope<'a, T> {
    pub fn new(command: &'a str, run_id: &'a str, result: &'a T) -> Self {
        Envelope {
            schema_version: SCHEMA_VERSION,
            run_id,
            generated_at: Utc::now().to_rfc3339(),
            command,
            config: None,
            result,
        }
    }

    pub fn with_config(mut self, config: &'a ConfigSnapshot) -> Self {
        self.config = Some(config);
        self
    }
}

/// Human renderings of a payload.
pub trait Render {
    /// Markdown document with text plots.
    fn markdown(&self) -> String;
    /// One line for quick status checks.
    fn summary_line(&self) -> String;
}

/// Render `payload` in `format`.
pub fn render<T: Serialize + Render>(
    format: OutputFormat,
    envelope: &Envelope<'_, T>,
) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(envelope)?,
        OutputFormat::Md => envelope.result.markdown(),
        OutputFormat::Summary => envelope.result.summary_line(),
    })
}

/// Output of `fit`.
#[derive(Debug, Clone, Serialize)]
pub struct FitReport {
    pub model: String,
    pub formula: String,
    pub sampler: String,
    pub settings: SamplerConfig,
    pub priors: ResolvedPriors,
    pub summary: ModelSummary,
    pub diagnostics: Diagnostics,
    pub warnings: Vec<ConvergenceWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draws_path: Option<String>,
}

impl FitReport {
    pub fn new(fit: &FittedModel, summary: ModelSummary, diagnostics: Diagnostics) -> Self {
        FitReport {
            model: fit.name.clone(),
            formula: fit.formula.to_string(),
            sampler: fit.sampler.clone(),
            settings: fit.config.clone(),
            priors: fit.priors.clone(),
            summary,
            diagnostics,
            warnings: fit.warnings.clone(),
            draws_path: None,
        }
    }
}

/// Output of `clean`.
#[derive(Debug, Clone, Serialize)]
pub struct CleanReport {
    pub input: InputSummary,
    pub report: CleaningReport,
    pub issues: Vec<DataQualityIssue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
}

// ============================================================================
// Markdown building blocks
// ============================================================================

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{:.3}", x)).unwrap_or_else(|| "-".to_string())
}

fn summary_table(summary: &ModelSummary) -> String {
    let mut out = String::new();
    let pct = summary.level * 100.0;
    out.push_str(&format!(
        "| term | mean | median | sd | mad_sd | {pct:.0}% lower | {pct:.0}% upper | odds ratio | sig |\n"
    ));
    out.push_str("|---|---:|---:|---:|---:|---:|---:|---:|:---:|\n");
    for c in &summary.coefficients {
        out.push_str(&format!(
            "| {} | {:.3} | {:.3} | {:.3} | {:.3} | {:.3} | {:.3} | {:.3} | {} |\n",
            c.term,
            c.mean,
            c.median,
            c.sd,
            c.mad_sd,
            c.interval.lower,
            c.interval.upper,
            c.odds_ratio,
            if c.significant { "*" } else { "" }
        ));
    }
    out
}

fn diagnostics_section(diag: &Diagnostics) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} chains x {} draws, {} divergent transitions\n\n",
        diag.chains, diag.draws_per_chain, diag.divergences
    ));
    out.push_str("| term | R-hat | ESS |\n|---|---:|---:|\n");
    for t in &diag.terms {
        out.push_str(&format!("| {} | {:.3} | {:.0} |\n", t.term, t.rhat, t.ess));
    }
    for t in &diag.terms {
        out.push_str(&format!("\n### {}\n\n```text\n", t.term));
        out.push_str(&format!("trace (every {} draws)\n", t.trace_stride));
        for line in plots::trace_plot(t) {
            out.push_str(&line);
            out.push('\n');
        }
        out.push_str("density\n");
        for line in plots::density_plot(t) {
            out.push_str(&line);
            out.push('\n');
        }
        out.push_str("autocorrelation\n");
        for line in plots::acf_plot(t, PLOT_WIDTH / 2) {
            out.push_str(&line);
            out.push('\n');
        }
        out.push_str("```\n");
    }
    out
}

fn warnings_section(warnings: &[ConvergenceWarning]) -> String {
    if warnings.is_empty() {
        return "No convergence warnings.\n".to_string();
    }
    let mut out = String::new();
    for w in warnings {
        out.push_str(&format!("- WARNING: {}\n", w));
    }
    out
}

fn forest_section(summary: &ModelSummary) -> String {
    let mut out = String::from("```text\n");
    for line in plots::forest_plot(&summary.coefficients, PLOT_WIDTH) {
        out.push_str(&line);
        out.push('\n');
    }
    out.push_str("```\n");
    out
}

fn evaluation_section(e: &ModelEvaluation) -> String {
    let mut out = String::new();
    out.push_str(&format!("## {}: `{}`\n\n", e.model, e.formula));
    out.push_str(&summary_table(&e.summary));
    out.push('\n');
    out.push_str(&forest_section(&e.summary));

    let significant = e.summary.significant_predictors();
    if significant.is_empty() {
        out.push_str("\nNo predictor has an interval excluding zero.\n");
    } else {
        let names: Vec<&str> = significant.iter().map(|c| c.name()).collect();
        out.push_str(&format!("\nSignificant predictors: {}\n", names.join(", ")));
    }

    let p = &e.ppc;
    out.push_str(&format!(
        "\nPosterior predictive check ({}, {} replicates): observed {:.3}, simulated {:.3} ± {:.3}, p = {:.3}\n",
        p.statistic, p.n_reps, p.observed, p.simulated_mean, p.simulated_sd, p.p_value
    ));
    out.push_str(&format!(
        "```text\n{}\n```\n",
        plots::interval_line(&p.interval, p.observed, None, 0.0, 1.0, PLOT_WIDTH)
    ));

    let a = &e.accuracy;
    let cm = &a.confusion;
    out.push_str(&format!(
        "\nIn-sample accuracy {:.3} at threshold {} (precision {}, recall {}, F1 {})\n\n",
        a.accuracy,
        a.threshold,
        fmt_opt(a.precision),
        fmt_opt(a.recall),
        fmt_opt(a.f1)
    ));
    out.push_str("| | predicted Yes | predicted No | total |\n|---|---:|---:|---:|\n");
    out.push_str(&format!(
        "| actual Yes | {} | {} | {} |\n",
        cm.tp,
        cm.fn_,
        cm.tp + cm.fn_
    ));
    out.push_str(&format!(
        "| actual No | {} | {} | {} |\n",
        cm.fp,
        cm.tn,
        cm.fp + cm.tn
    ));
    out.push_str(&format!(
        "| total | {} | {} | {} |\n",
        cm.tp + cm.fp,
        cm.fn_ + cm.tn,
        cm.total()
    ));

    if let Some(cv) = &e.cv {
        out.push_str(&format!(
            "\n{}-fold cross-validated accuracy {:.3} (se {:.3})\n\n",
            cv.folds, cv.accuracy, cv.std_error
        ));
        out.push_str("```text\n");
        for f in &cv.fold_results {
            out.push_str(&format!(
                "fold {:>2} {} {:.3}{}\n",
                f.fold,
                plots::bar(f.accuracy, 1.0, PLOT_WIDTH / 2),
                f.accuracy,
                if f.convergence_warnings > 0 { " !" } else { "" }
            ));
        }
        out.push_str("```\n");
    }

    out.push_str("\n### Diagnostics\n\n");
    out.push_str(&warnings_section(&e.warnings));
    out.push('\n');
    out.push_str(&diagnostics_section(&e.diagnostics));
    out
}

fn comparison_table(cmp: &ModelComparison) -> String {
    let mut out = String::new();
    out.push_str("| rank | model | coefficients | in-sample | cv | cv se | ppc p | converged | significant |\n");
    out.push_str("|---:|---|---:|---:|---:|---:|---:|:---:|---|\n");
    for r in &cmp.rows {
        out.push_str(&format!(
            "| {} | {} | {} | {:.3} | {} | {} | {:.3} | {} | {} |\n",
            r.rank,
            r.model,
            r.coefficients,
            r.in_sample_accuracy,
            fmt_opt(r.cv_accuracy),
            fmt_opt(r.cv_std_error),
            r.ppc_p_value,
            if r.converged { "yes" } else { "no" },
            r.significant_predictors.join(", ")
        ));
    }
    out
}

fn input_section(input: &InputSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}: {} rows, {} columns\n\n",
        input.path, input.rows, input.columns
    ));
    out.push_str("| column | missing | sentinel |\n|---|---:|---:|\n");
    for (m, s) in input.missing.iter().zip(&input.sentinel) {
        out.push_str(&format!("| {} | {} | {} |\n", m.column, m.missing, s.missing));
    }
    out
}

fn cleaning_section(report: &CleaningReport, issues: &[DataQualityIssue]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} rows in, {} out: {} sentinel, {} missing, {} duplicate rows dropped\n",
        report.rows_in,
        report.rows_out,
        report.dropped_sentinel,
        report.dropped_missing,
        report.dropped_duplicates
    ));
    if !report.duplicate_ids.is_empty() {
        out.push_str(&format!(
            "\nDuplicated identifiers: {}\n",
            report.duplicate_ids.join(", ")
        ));
    }
    if !report.ignored_columns.is_empty() {
        out.push_str(&format!(
            "\nIgnored columns: {}\n",
            report.ignored_columns.join(", ")
        ));
    }
    if !issues.is_empty() {
        out.push_str("\n### Issues\n\n");
        for issue in issues {
            out.push_str(&format!("- {}\n", issue));
        }
    }
    out
}

fn prior_line(intercept_mean: f64, intercept_scale: f64, source: &InterceptSource) -> String {
    match source {
        InterceptSource::BaseRate { low, high } => format!(
            "Intercept ~ normal({:.3}, {:.3}) from base rate [{}, {}]",
            intercept_mean, intercept_scale, low, high
        ),
        InterceptSource::Override => format!(
            "Intercept ~ normal({:.3}, {:.3}) (override)",
            intercept_mean, intercept_scale
        ),
    }
}

// ============================================================================
// Render impls
// ============================================================================

impl Render for InputSummary {
    fn markdown(&self) -> String {
        format!("# Input\n\n{}", input_section(self))
    }

    fn summary_line(&self) -> String {
        let missing: usize = self.missing.iter().map(|m| m.missing).sum();
        let sentinel: usize = self.sentinel.iter().map(|m| m.missing).sum();
        format!(
            "{}: {} rows, {} columns, {} missing cells, {} sentinel cells",
            self.path, self.rows, self.columns, missing, sentinel
        )
    }
}

impl Render for CleanReport {
    fn markdown(&self) -> String {
        let mut out = String::from("# Cleaning\n\n");
        out.push_str(&cleaning_section(&self.report, &self.issues));
        if let Some(path) = &self.output_path {
            out.push_str(&format!("\nCleaned table written to {}\n", path));
        }
        out
    }

    fn summary_line(&self) -> String {
        format!(
            "{} -> {} rows ({} issues)",
            self.report.rows_in,
            self.report.rows_out,
            self.issues.len()
        )
    }
}

impl Render for PriorSummary {
    fn markdown(&self) -> String {
        let mut out = String::from("# Priors\n\n");
        out.push_str(&prior_line(
            self.intercept.mean,
            self.intercept.scale,
            &self.source,
        ));
        out.push_str(&format!(
            "\n\nCoefficients ~ normal(0, {}){}\n",
            self.coefficient_scale,
            if self.autoscale {
                ", autoscaled per predictor"
            } else {
                ""
            }
        ));
        out
    }

    fn summary_line(&self) -> String {
        format!(
            "intercept ~ normal({:.3}, {:.3})",
            self.intercept.mean, self.intercept.scale
        )
    }
}

impl Render for FitReport {
    fn markdown(&self) -> String {
        let mut out = format!("# {}: `{}`\n\n", self.model, self.formula);
        out.push_str(&format!(
            "Sampler {}: {} chains, {} warmup, {} draws, seed {}\n\n",
            self.sampler,
            self.settings.chains,
            self.settings.warmup,
            self.settings.draws,
            self.settings.seed
        ));
        out.push_str(&prior_line(
            self.priors.intercept.mean,
            self.priors.intercept.scale,
            &self.priors.intercept_source,
        ));
        out.push_str("\n\n## Coefficients\n\n");
        out.push_str(&summary_table(&self.summary));
        out.push('\n');
        out.push_str(&forest_section(&self.summary));
        out.push_str("\n## Diagnostics\n\n");
        out.push_str(&warnings_section(&self.warnings));
        out.push('\n');
        out.push_str(&diagnostics_section(&self.diagnostics));
        if let Some(path) = &self.draws_path {
            out.push_str(&format!("\nDraws written to {}\n", path));
        }
        out
    }

    fn summary_line(&self) -> String {
        let significant: Vec<&str> = self
            .summary
            .significant_predictors()
            .iter()
            .map(|c| c.name())
            .collect();
        format!(
            "{}: {} coefficients, max R-hat {:.3}, {} warnings, significant: {}",
            self.model,
            self.summary.coefficients.len(),
            self.diagnostics.max_rhat(),
            self.warnings.len(),
            if significant.is_empty() {
                "none".to_string()
            } else {
                significant.join(", ")
            }
        )
    }
}

impl Render for AnalysisReport {
    fn markdown(&self) -> String {
        let mut out = String::from("# Hair loss analysis\n\n");
        out.push_str(&input_section(&self.input));
        out.push_str("\n# Cleaning\n\n");
        out.push_str(&cleaning_section(&self.cleaning, &self.issues));
        out.push_str("\n# Priors\n\n");
        out.push_str(&prior_line(
            self.prior.intercept.mean,
            self.prior.intercept.scale,
            &self.prior.source,
        ));
        out.push_str("\n\n# Comparison\n\n");
        out.push_str(&comparison_table(&self.comparison));
        for e in &self.models {
            out.push('\n');
            out.push_str(&evaluation_section(e));
        }
        out
    }

    fn summary_line(&self) -> String {
        let warnings: usize = self.models.iter().map(|m| m.warnings.len()).sum();
        match self.comparison.best() {
            Some(best) => format!(
                "{} rows, {} models, best {} ({:.3} {}), {} warnings",
                self.cleaning.rows_out,
                self.models.len(),
                best.model,
                best.cv_accuracy.unwrap_or(best.in_sample_accuracy),
                if best.cv_accuracy.is_some() {
                    "cv accuracy"
                } else {
                    "accuracy"
                },
                warnings
            ),
            None => format!("{} rows, no models", self.cleaning.rows_out),
        }
    }
}

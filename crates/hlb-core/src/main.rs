//! Hair Loss Bayes - survey analysis CLI
//!
//! The main entry point for hlb-core, handling:
//! - Loading and cleaning the survey export
//! - Deriving priors
//! - Fitting Bayesian logistic regressions by MCMC
//! - Diagnostics, accuracy, cross-validation and model comparison

use clap::{Args, Parser, Subcommand};
use hlb_common::{Error, OutputFormat, Result, RunId, StructuredError, SCHEMA_VERSION};
use hlb_config::{get_preset, AnalysisConfig, BaseRateRange, ModelSpec, PresetName};
use hlb_core::config::{
    config_schema, load_config, load_config_file, validate_config, ConfigError, ConfigOptions,
    ConfigSource, ResolvedConfig,
};
use hlb_core::evaluate::{diagnose, summarize};
use hlb_core::exit_codes::ExitCode;
use hlb_core::logging::{
    event_names, get_host_id, init_logging, LogConfig, LogContext, LogFormat, LogLevel, Stage,
};
use hlb_core::model::HmcSampler;
use hlb_core::pipeline::Pipeline;
use hlb_core::report::{render, CleanReport, Envelope, FitReport, Render};
use hlb_core::log_event;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

/// Hair Loss Bayes - Bayesian analysis of hair loss survey data
#[derive(Parser)]
#[command(name = "hlb-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Analysis config file (overrides HLB_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override config directory
    #[arg(long, global = true, env = "HLB_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q warnings only, -qq errors only)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    quiet: u8,

    /// Seed for the sampler, posterior predictive check and fold split
    #[arg(long, global = true)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a survey export and report its shape and missing cells
    Inspect(InspectArgs),
    /// Clean a survey export and report dropped rows
    Clean(CleanArgs),
    /// Show the intercept prior derived from a base-rate range
    Prior(PriorArgs),
    /// Fit one model and show its summary and diagnostics
    Fit(FitArgs),
    /// Fit, evaluate and compare every configured model
    Analyze(AnalyzeArgs),
    /// Configuration management
    Config(ConfigArgs),
    /// Print version information
    Version,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Survey CSV export
    csv: PathBuf,
}

#[derive(Args, Debug)]
struct CleanArgs {
    /// Survey CSV export
    csv: PathBuf,

    /// Write the cleaned table as CSV
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PriorArgs {
    /// Lower plausible base rate
    #[arg(long, requires = "high")]
    low: Option<f64>,

    /// Upper plausible base rate
    #[arg(long, requires = "low")]
    high: Option<f64>,
}

#[derive(Args, Debug)]
struct FitArgs {
    /// Survey CSV export
    csv: PathBuf,

    /// Configured model name or preset (model1..model4)
    #[arg(long, short = 'm')]
    model: String,

    /// Write posterior draws as CSV
    #[arg(long)]
    draws_out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Survey CSV export
    csv: PathBuf,

    /// Skip cross-validation
    #[arg(long, conflicts_with = "folds")]
    no_cv: bool,

    /// Number of cross-validation folds
    #[arg(long)]
    folds: Option<usize>,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show the resolved configuration
    Show,
    /// Print the JSON schema of the configuration file
    Schema,
    /// Validate a configuration file
    Validate {
        /// File to validate (defaults to the resolved config)
        path: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let log_format = if cli.global.format.is_machine() {
        LogFormat::Jsonl
    } else {
        LogFormat::Human
    };
    let log_config = LogConfig::from_env(
        LogLevel::from_verbosity(cli.global.verbose, cli.global.quiet),
        Some(log_format),
    );
    init_logging(&log_config);

    let run_id = RunId::new();
    let ctx = LogContext::new(run_id.0.clone(), get_host_id());

    let exit_code = match &cli.command {
        Commands::Inspect(args) => run_inspect(&cli.global, &ctx, args),
        Commands::Clean(args) => run_clean(&cli.global, &ctx, args),
        Commands::Prior(args) => run_prior(&cli.global, &ctx, args),
        Commands::Fit(args) => run_fit(&cli.global, &ctx, args),
        Commands::Analyze(args) => run_analyze(&cli.global, &ctx, args),
        Commands::Config(args) => Ok(run_config(&cli.global, args)),
        Commands::Version => {
            print_version(&cli.global);
            Ok(ExitCode::Clean)
        }
    };

    let exit_code = exit_code.unwrap_or_else(|e| output_error(&cli.global, &ctx, &e));
    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Resolve the config and apply command-line overrides.
fn resolve_config(global: &GlobalOpts, ctx: &LogContext) -> Result<ResolvedConfig> {
    let options = ConfigOptions {
        config_path: global.config.clone(),
        config_dir: global.config_dir.clone(),
    };
    let mut resolved = load_config(&options)?;
    if resolved.source == ConfigSource::BuiltinDefault {
        log_event!(
            ctx,
            DEBUG,
            event_names::CONFIG_DEFAULT_USED,
            Stage::Init,
            "no config file found, using defaults"
        );
    } else {
        let source = resolved.source.to_string();
        log_event!(
            ctx,
            INFO,
            event_names::CONFIG_LOADED,
            Stage::Init,
            "config loaded",
            source = source.as_str()
        );
    }
    if let Some(seed) = global.seed {
        apply_seed(&mut resolved.analysis, seed);
    }
    Ok(resolved)
}

fn apply_seed(analysis: &mut AnalysisConfig, seed: u64) {
    analysis.sampler.seed = seed;
    analysis.ppc.seed = seed;
    analysis.cross_validation.seed = seed;
    if let Some(cv) = analysis.cross_validation.sampler.as_mut() {
        cv.seed = seed;
    }
}

fn emit<T: Serialize + Render>(global: &GlobalOpts, envelope: &Envelope<'_, T>) -> Result<()> {
    println!("{}", render(global.format, envelope)?);
    Ok(())
}

fn completion_code(converged: bool) -> ExitCode {
    if converged {
        ExitCode::Clean
    } else {
        ExitCode::ConvergenceWarnings
    }
}

/// Output a library error in the appropriate format.
fn output_error(global: &GlobalOpts, ctx: &LogContext, error: &Error) -> ExitCode {
    log_event!(
        ctx,
        ERROR,
        event_names::INTERNAL_ERROR,
        Stage::Report,
        error.to_string(),
        code = error.code() as u64
    );
    match global.format {
        OutputFormat::Json => {
            let response = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "run_id": ctx.run_id,
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "status": "error",
                "error": StructuredError::from(error),
            });
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&response).unwrap_or_else(|_| response.to_string())
            );
        }
        OutputFormat::Summary => {
            eprintln!("[{}] error {}: {}", ctx.run_id, error.code(), error);
        }
        OutputFormat::Md => {
            eprintln!("{}", error.to_human());
        }
    }
    ExitCode::from_error(error)
}

// ============================================================================
// Commands
// ============================================================================

fn run_inspect(global: &GlobalOpts, ctx: &LogContext, args: &InspectArgs) -> Result<ExitCode> {
    let config = resolve_config(global, ctx)?;
    let sampler = HmcSampler::default();
    let mut pipeline = Pipeline::new(&config.analysis, &sampler, ctx.clone());
    let (_, input) = pipeline.load(&args.csv)?;
    emit(global, &Envelope::new("inspect", &ctx.run_id, &input))?;
    Ok(ExitCode::Clean)
}

fn run_clean(global: &GlobalOpts, ctx: &LogContext, args: &CleanArgs) -> Result<ExitCode> {
    let config = resolve_config(global, ctx)?;
    let sampler = HmcSampler::default();
    let mut pipeline = Pipeline::new(&config.analysis, &sampler, ctx.clone());
    let (raw, input) = pipeline.load(&args.csv)?;
    let outcome = pipeline.clean(&raw)?;

    if let Some(path) = &args.out {
        let file = File::create(path).map_err(|e| Error::file(path, e))?;
        outcome.table.write_csv(BufWriter::new(file))?;
    }

    let payload = CleanReport {
        input,
        report: outcome.report,
        issues: outcome.issues,
        output_path: args.out.as_ref().map(|p| p.display().to_string()),
    };
    emit(global, &Envelope::new("clean", &ctx.run_id, &payload))?;
    Ok(ExitCode::Clean)
}

fn run_prior(global: &GlobalOpts, ctx: &LogContext, args: &PriorArgs) -> Result<ExitCode> {
    let mut config = resolve_config(global, ctx)?;
    if let (Some(low), Some(high)) = (args.low, args.high) {
        config.analysis.priors.base_rate = BaseRateRange { low, high };
        config.analysis.priors.intercept_override = None;
    }
    let sampler = HmcSampler::default();
    let mut pipeline = Pipeline::new(&config.analysis, &sampler, ctx.clone());
    let prior = pipeline.prior()?;
    emit(global, &Envelope::new("prior", &ctx.run_id, &prior))?;
    Ok(ExitCode::Clean)
}

fn find_model(analysis: &AnalysisConfig, name: &str) -> Result<ModelSpec> {
    analysis
        .model(name)
        .cloned()
        .or_else(|| PresetName::parse(name).map(get_preset))
        .ok_or_else(|| Error::InvalidConfig {
            field: "model".to_string(),
            message: format!(
                "no configured model or preset named {:?} (configured: {})",
                name,
                analysis
                    .models
                    .iter()
                    .map(|m| m.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        })
}

fn run_fit(global: &GlobalOpts, ctx: &LogContext, args: &FitArgs) -> Result<ExitCode> {
    let config = resolve_config(global, ctx)?;
    let spec = find_model(&config.analysis, &args.model)?;
    let sampler = HmcSampler::default();
    let mut pipeline = Pipeline::new(&config.analysis, &sampler, ctx.clone());
    let (raw, _) = pipeline.load(&args.csv)?;
    let cleaned = pipeline.clean(&raw)?;
    let fit = pipeline.fit(&cleaned.table, &spec)?;

    let summary = summarize(&fit, config.analysis.credible_level)?;
    let diagnostics = diagnose(&fit, &config.analysis.diagnostics);
    let mut payload = FitReport::new(&fit, summary, diagnostics);

    if let Some(path) = &args.draws_out {
        let file = File::create(path).map_err(|e| Error::file(path, e))?;
        fit.draws.write_csv(BufWriter::new(file))?;
        payload.draws_path = Some(path.display().to_string());
    }

    let snapshot = config.snapshot();
    emit(
        global,
        &Envelope::new("fit", &ctx.run_id, &payload).with_config(&snapshot),
    )?;
    Ok(completion_code(fit.is_converged()))
}

fn run_analyze(global: &GlobalOpts, ctx: &LogContext, args: &AnalyzeArgs) -> Result<ExitCode> {
    let mut config = resolve_config(global, ctx)?;
    if args.no_cv {
        config.analysis.cross_validation.enabled = false;
    }
    if let Some(folds) = args.folds {
        config.analysis.cross_validation.enabled = true;
        config.analysis.cross_validation.folds = folds;
    }
    validate_config(&config.analysis)?;

    let sampler = HmcSampler::default();
    let analysis = Pipeline::new(&config.analysis, &sampler, ctx.clone()).analyze(&args.csv)?;

    let snapshot = config.snapshot();
    emit(
        global,
        &Envelope::new("analyze", &ctx.run_id, &analysis).with_config(&snapshot),
    )?;
    Ok(completion_code(analysis.all_converged()))
}

// ============================================================================
// Config commands
// ============================================================================

fn run_config(global: &GlobalOpts, args: &ConfigArgs) -> ExitCode {
    match &args.command {
        ConfigCommands::Show => run_config_show(global),
        ConfigCommands::Schema => {
            let schema = config_schema();
            println!(
                "{}",
                serde_json::to_string_pretty(&schema).unwrap_or_else(|_| schema.to_string())
            );
            ExitCode::Clean
        }
        ConfigCommands::Validate { path } => run_config_validate(global, path.as_ref()),
    }
}

/// Display the current configuration (defaults if no file is present).
fn run_config_show(global: &GlobalOpts) -> ExitCode {
    let run_id = RunId::new();
    let options = ConfigOptions {
        config_path: global.config.clone(),
        config_dir: global.config_dir.clone(),
    };
    let config = match load_config(&options) {
        Ok(c) => c,
        Err(e) => return output_config_error(global, &run_id, &e),
    };
    let snapshot = config.snapshot();

    match global.format {
        OutputFormat::Json => {
            let response = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "run_id": run_id.0,
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "source": &snapshot,
                "config": &config.analysis,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&response).unwrap_or_else(|_| response.to_string())
            );
        }
        OutputFormat::Summary => {
            println!(
                "[{}] config: {} ({} models)",
                run_id,
                describe_source(&snapshot.path, snapshot.source),
                config.analysis.models.len()
            );
        }
        OutputFormat::Md => {
            println!("# hlb-core config show");
            println!();
            println!("Source: {}", describe_source(&snapshot.path, snapshot.source));
            println!("Hash: {}", snapshot.hash);
            println!("Schema version: {}", snapshot.schema_version);
            println!();
            println!("## Models");
            for m in &config.analysis.models {
                println!("- {}: `{}`", m.name, m.formula_text());
            }
            println!();
            let s = &config.analysis.sampler;
            println!("## Sampler");
            println!(
                "{} chains, {} iterations ({} warmup), seed {}",
                s.chains,
                s.iterations,
                s.warmup_iterations(),
                s.seed
            );
        }
    }
    ExitCode::Clean
}

fn describe_source(path: &Option<PathBuf>, source: ConfigSource) -> String {
    match path {
        Some(p) => format!("{} ({})", p.display(), source),
        None => "built-in defaults".to_string(),
    }
}

/// Validate a configuration file.
fn run_config_validate(global: &GlobalOpts, path: Option<&PathBuf>) -> ExitCode {
    let run_id = RunId::new();
    let result = match path {
        Some(p) => load_config_file(p, ConfigSource::CliArgument),
        None => load_config(&ConfigOptions {
            config_path: global.config.clone(),
            config_dir: global.config_dir.clone(),
        }),
    };

    match result {
        Ok(config) => {
            let snapshot = config.snapshot();
            match global.format {
                OutputFormat::Json => {
                    let response = serde_json::json!({
                        "schema_version": SCHEMA_VERSION,
                        "run_id": run_id.0,
                        "generated_at": chrono::Utc::now().to_rfc3339(),
                        "status": "valid",
                        "source": &snapshot,
                    });
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&response)
                            .unwrap_or_else(|_| response.to_string())
                    );
                }
                OutputFormat::Summary => {
                    println!("[{}] config validate: OK", run_id);
                }
                OutputFormat::Md => {
                    println!("# Configuration Validation");
                    println!();
                    println!("Status: ✓ Valid");
                    println!("Source: {}", describe_source(&snapshot.path, snapshot.source));
                }
            }
            ExitCode::Clean
        }
        Err(e) => output_config_error(global, &run_id, &e),
    }
}

/// Output a config error in the appropriate format.
fn output_config_error(global: &GlobalOpts, run_id: &RunId, error: &ConfigError) -> ExitCode {
    let exit_code = match error {
        ConfigError::NotFound { .. } => ExitCode::ArgsError,
        ConfigError::ParseError { .. } | ConfigError::ValidationError(_) => ExitCode::ConfigError,
        ConfigError::IoError { .. } => ExitCode::IoError,
    };

    match global.format {
        OutputFormat::Json => {
            let response = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "run_id": run_id.0,
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "status": "error",
                "error": {
                    "code": exit_code.as_i32(),
                    "name": exit_code.code_name(),
                    "message": error.to_string(),
                }
            });
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&response).unwrap_or_else(|_| response.to_string())
            );
        }
        OutputFormat::Summary => {
            eprintln!("[{}] config error: {}", run_id, error);
        }
        OutputFormat::Md => {
            eprintln!("# Configuration Error");
            eprintln!();
            eprintln!("Error: {}", error);
        }
    }

    exit_code
}

fn print_version(global: &GlobalOpts) {
    let version_info = serde_json::json!({
        "schema_version": SCHEMA_VERSION,
        "hlb_core_version": env!("CARGO_PKG_VERSION"),
        "rust_version": env!("CARGO_PKG_RUST_VERSION"),
    });

    match global.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&version_info)
                    .unwrap_or_else(|_| version_info.to_string())
            );
        }
        _ => {
            println!("hlb-core {}", env!("CARGO_PKG_VERSION"));
            println!("schema version: {}", SCHEMA_VERSION);
        }
    }
}

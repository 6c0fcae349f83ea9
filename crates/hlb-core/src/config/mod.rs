//! Configuration loading and validation for hlb-core.
//!
//! This module handles:
//! - Loading analysis.json
//! - Config resolution order (CLI > env > XDG > defaults)
//! - Shape checking via serde, semantic validation via hlb-config
//! - Predictor name checking against the survey schema
//! - Config snapshot generation for reports

pub use hlb_config::preset::{get_preset, list_presets, PresetName};
pub use hlb_config::validate::ValidationError;
pub use hlb_config::{AnalysisConfig, ModelSpec, SamplerSettings, CONFIG_SCHEMA_VERSION};

use hlb_config::validate::validate_analysis;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::model::formula::PredictorSet;

/// Default XDG config directory name.
const CONFIG_DIR_NAME: &str = "hair_loss_bayes";

/// Standard config file name.
const CONFIG_FILENAME: &str = "analysis.json";

/// Environment variable naming an explicit config file.
pub const ENV_CONFIG_PATH: &str = "HLB_CONFIG";

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Invalid JSON in config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Semantic validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<ConfigError> for hlb_common::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::ValidationError(ValidationError::InvalidValue { field, message }) => {
                hlb_common::Error::InvalidConfig { field, message }
            }
            other => hlb_common::Error::Config(other.to_string()),
        }
    }
}

/// Where the configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    CliArgument,
    Environment,
    XdgConfig,
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Resolved configuration with provenance information.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub analysis: AnalysisConfig,
    /// Path of the loaded file (None if using defaults).
    pub path: Option<PathBuf>,
    /// SHA-256 of the file content (None if using defaults).
    pub hash: Option<String>,
    pub source: ConfigSource,
}

impl ResolvedConfig {
    /// Built-in defaults, already validated.
    pub fn defaults() -> Self {
        ResolvedConfig {
            analysis: AnalysisConfig::default(),
            path: None,
            hash: None,
            source: ConfigSource::BuiltinDefault,
        }
    }

    /// Create a config snapshot for reports.
    pub fn snapshot(&self) -> ConfigSnapshot {
        let hash = self.hash.clone().unwrap_or_else(|| {
            // Defaults are hashed by their canonical JSON form.
            let json = serde_json::to_string(&self.analysis).unwrap_or_default();
            compute_hash(&json)
        });
        ConfigSnapshot {
            path: self.path.clone(),
            source: self.source,
            hash,
            schema_version: self.analysis.schema_version.clone(),
        }
    }
}

/// Config snapshot embedded in reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConfigSnapshot {
    pub path: Option<PathBuf>,
    pub source: ConfigSource,
    pub hash: String,
    pub schema_version: String,
}

/// Configuration resolution options.
#[derive(Debug, Default)]
pub struct ConfigOptions {
    /// Explicit config file path (highest priority).
    pub config_path: Option<PathBuf>,
    /// Config directory override; replaces the XDG lookup.
    pub config_dir: Option<PathBuf>,
}

/// Load configuration with the standard resolution order.
///
/// Resolution order (highest to lowest priority):
/// 1. Explicit CLI flag (via ConfigOptions)
/// 2. Environment variable (HLB_CONFIG)
/// 3. XDG config home (~/.config/hair_loss_bayes/analysis.json)
/// 4. Built-in defaults
pub fn load_config(options: &ConfigOptions) -> Result<ResolvedConfig, ConfigError> {
    let env_path = std::env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from);
    load_config_with_env(options, env_path)
}

fn load_config_with_env(
    options: &ConfigOptions,
    env_path: Option<PathBuf>,
) -> Result<ResolvedConfig, ConfigError> {
    let explicit = options
        .config_path
        .clone()
        .map(|p| (p, ConfigSource::CliArgument))
        .or_else(|| env_path.map(|p| (p, ConfigSource::Environment)));

    if let Some((path, source)) = explicit {
        if !path.exists() {
            return Err(ConfigError::NotFound { path });
        }
        return load_config_file(&path, source);
    }

    let default_path = resolve_config_dir(options).join(CONFIG_FILENAME);
    if default_path.exists() {
        return load_config_file(&default_path, ConfigSource::XdgConfig);
    }

    Ok(ResolvedConfig::defaults())
}

/// Resolve the config directory: explicit override, then XDG config home.
fn resolve_config_dir(options: &ConfigOptions) -> PathBuf {
    if let Some(dir) = &options.config_dir {
        return dir.clone();
    }

    let xdg_config = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config")
        });

    xdg_config.join(CONFIG_DIR_NAME)
}

/// Load and validate a specific config file.
pub fn load_config_file(path: &Path, source: ConfigSource) -> Result<ResolvedConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let hash = compute_hash(&content);

    let analysis: AnalysisConfig =
        serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

    validate_config(&analysis)?;

    Ok(ResolvedConfig {
        analysis,
        path: Some(path.to_path_buf()),
        hash: Some(hash),
        source,
    })
}

/// Semantic validation plus a check that every predictor names a survey
/// risk factor.
pub fn validate_config(analysis: &AnalysisConfig) -> Result<(), ConfigError> {
    validate_analysis(analysis)?;
    for (i, model) in analysis.models.iter().enumerate() {
        PredictorSet::parse(&model.predictors).map_err(|message| {
            ValidationError::InvalidValue {
                field: format!("models[{}].predictors", i),
                message,
            }
        })?;
    }
    Ok(())
}

/// JSON schema of analysis.json.
pub fn config_schema() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(AnalysisConfig)).unwrap_or_default()
}

/// SHA-256 of content, hex encoded.
fn compute_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn no_config_options(dir: &Path) -> ConfigOptions {
        ConfigOptions {
            config_path: None,
            config_dir: Some(dir.join("nonexistent")),
        }
    }

    #[test]
    fn test_defaults_when_nothing_found() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_with_env(&no_config_options(dir.path()), None).unwrap();
        assert_eq!(cfg.source, ConfigSource::BuiltinDefault);
        assert!(cfg.path.is_none());
        assert_eq!(cfg.analysis, AnalysisConfig::default());
    }

    #[test]
    fn test_snapshot_hash_is_stable_for_defaults() {
        let a = ResolvedConfig::defaults().snapshot();
        let b = ResolvedConfig::defaults().snapshot();
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.hash.len(), 64);
    }

    #[test]
    fn test_cli_path_beats_env_path() {
        let dir = tempfile::tempdir().unwrap();
        let cli = dir.path().join("cli.json");
        let env = dir.path().join("env.json");
        std::fs::write(&cli, r#"{"credible_level": 0.9}"#).unwrap();
        std::fs::write(&env, r#"{"credible_level": 0.7}"#).unwrap();

        let options = ConfigOptions {
            config_path: Some(cli.clone()),
            config_dir: None,
        };
        let cfg = load_config_with_env(&options, Some(env.clone())).unwrap();
        assert_eq!(cfg.source, ConfigSource::CliArgument);
        assert_eq!(cfg.analysis.credible_level, 0.9);

        let cfg = load_config_with_env(&no_config_options(dir.path()), Some(env)).unwrap();
        assert_eq!(cfg.source, ConfigSource::Environment);
        assert_eq!(cfg.analysis.credible_level, 0.7);
    }

    #[test]
    fn test_config_dir_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join(CONFIG_FILENAME)).unwrap();
        f.write_all(br#"{"ppc": {"n_reps": 50}}"#).unwrap();
        let options = ConfigOptions {
            config_path: None,
            config_dir: Some(dir.path().to_path_buf()),
        };
        let cfg = load_config_with_env(&options, None).unwrap();
        assert_eq!(cfg.source, ConfigSource::XdgConfig);
        assert_eq!(cfg.analysis.ppc.n_reps, 50);
        assert_eq!(cfg.snapshot().hash, cfg.hash.clone().unwrap());
    }

    #[test]
    fn test_missing_explicit_file_is_not_found() {
        let options = ConfigOptions {
            config_path: Some(PathBuf::from("/definitely/not/here.json")),
            config_dir: None,
        };
        assert!(matches!(
            load_config_with_env(&options, None),
            Err(ConfigError::NotFound { .. })
        ));
    }

    #[test]
    fn test_bad_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load_config_file(&path, ConfigSource::CliArgument),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn test_unknown_predictor_is_rejected() {
        let mut analysis = AnalysisConfig::default();
        analysis.models[0].predictors.push("Shoe.Size".into());
        let err = validate_config(&analysis).unwrap_err();
        let common: hlb_common::Error = err.into();
        assert_eq!(common.code(), 11);
        assert!(common.to_string().contains("Shoe.Size"));
    }
}

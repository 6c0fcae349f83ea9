//! Log level and format resolution.
//!
//! Sources, lowest to highest priority: built-in default (info, human),
//! `RUST_LOG`, `HLB_LOG`, `HLB_LOG_FORMAT`, then the `-v`/`-q` flags and the
//! output format chosen on the command line.

use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::LevelFilter;

/// Where log lines go and how they look.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Console lines on stderr.
    #[default]
    Human,
    /// One JSON object per line on stderr.
    Jsonl,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            LogFormat::Human => "human",
            LogFormat::Jsonl => "jsonl",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "human" | "text" => Ok(LogFormat::Human),
            "jsonl" | "json" => Ok(LogFormat::Jsonl),
            other => Err(format!("unknown log format {other:?} (expected human or jsonl)")),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimum severity that reaches the log sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    const ALL: [LogLevel; 6] = [
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Off,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }

    /// Level for a `-v` count (raises verbosity) and `-q` count (lowers it).
    /// `None` when neither flag was given.
    pub fn from_verbosity(verbose: u8, quiet: u8) -> Option<LogLevel> {
        match (verbose, quiet) {
            (0, 0) => None,
            (v, 0) if v >= 2 => Some(LogLevel::Trace),
            (_, 0) => Some(LogLevel::Debug),
            (_, 1) => Some(LogLevel::Warn),
            (_, 2) => Some(LogLevel::Error),
            _ => Some(LogLevel::Off),
        }
    }

    /// Most verbose level named anywhere in a `RUST_LOG` directive list,
    /// e.g. `hlb_core=debug,warn` gives debug.
    fn from_directives(directives: &str) -> Option<LogLevel> {
        let lower = directives.to_ascii_lowercase();
        Self::ALL[..5]
            .iter()
            .copied()
            .find(|level| lower.contains(level.as_str()))
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "warning" => return Ok(LogLevel::Warn),
            "none" | "quiet" => return Ok(LogLevel::Off),
            _ => {}
        }
        Self::ALL
            .iter()
            .copied()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| format!("unknown log level {s:?}"))
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Off => LevelFilter::OFF,
        }
    }
}

/// Resolved logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Prefix human lines with a timestamp.
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::Human,
            level: LogLevel::Info,
            timestamps: true,
        }
    }
}

impl LogConfig {
    /// Read `HLB_LOG`, `RUST_LOG` and `HLB_LOG_FORMAT`, then apply CLI
    /// overrides.
    pub fn from_env(cli_level: Option<LogLevel>, cli_format: Option<LogFormat>) -> Self {
        let var = |name: &str| std::env::var(name).ok();
        Self::from_sources(
            var("HLB_LOG").as_deref(),
            var("RUST_LOG").as_deref(),
            var("HLB_LOG_FORMAT").as_deref(),
            cli_level,
            cli_format,
        )
    }

    /// Resolve from explicit values. Unparsable environment values are
    /// ignored.
    pub fn from_sources(
        hlb_log: Option<&str>,
        rust_log: Option<&str>,
        log_format: Option<&str>,
        cli_level: Option<LogLevel>,
        cli_format: Option<LogFormat>,
    ) -> Self {
        let env_level = match hlb_log {
            Some(val) => val.parse().ok(),
            None => rust_log.and_then(LogLevel::from_directives),
        };
        let env_format = log_format.and_then(|v| v.parse().ok());

        let defaults = LogConfig::default();
        LogConfig {
            level: cli_level.or(env_level).unwrap_or(defaults.level),
            format: cli_format.or(env_format).unwrap_or(defaults.format),
            ..defaults
        }
    }
}

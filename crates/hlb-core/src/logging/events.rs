//! Pipeline events.
//!
//! A [`LogEvent`] is the record a stage leaves in the analysis report; the
//! same names are used as `tracing` targets so JSONL logs and the report's
//! event list line up.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Severity recorded on an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Stages of the analysis pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// Reading the survey file.
    Load,
    /// Sentinel removal, coercion and duplicate resolution.
    Clean,
    /// Prior derivation.
    Prior,
    /// Posterior sampling.
    Fit,
    /// Diagnostics, accuracy and cross-validation.
    Evaluate,
    /// Rendering output.
    Report,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Load => "load",
            Stage::Clean => "clean",
            Stage::Prior => "prior",
            Stage::Fit => "fit",
            Stage::Evaluate => "evaluate",
            Stage::Report => "report",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Run lifecycle
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";

    // Load stage
    pub const LOAD_FINISHED: &str = "load.finished";

    // Clean stage
    pub const CLEAN_ROWS_DROPPED: &str = "clean.rows_dropped";
    pub const CLEAN_DUPLICATES_RESOLVED: &str = "clean.duplicates_resolved";
    pub const CLEAN_FINISHED: &str = "clean.finished";

    // Prior stage
    pub const PRIOR_RESOLVED: &str = "prior.resolved";

    // Fit stage
    pub const FIT_STARTED: &str = "fit.started";
    pub const FIT_CHAIN_DONE: &str = "fit.chain_done";
    pub const FIT_CONVERGENCE_WARNING: &str = "fit.convergence_warning";
    pub const FIT_FINISHED: &str = "fit.finished";

    // Evaluate stage
    pub const EVAL_PPC: &str = "evaluate.ppc";
    pub const EVAL_ACCURACY: &str = "evaluate.accuracy";
    pub const EVAL_CV_FOLD: &str = "evaluate.cv_fold";
    pub const EVAL_CV_FINISHED: &str = "evaluate.cv_finished";

    // Config/init events
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";
    pub const CONFIG_ERROR: &str = "config.error";

    // Error events
    pub const INTERNAL_ERROR: &str = "internal_error";
}

/// A structured log event for JSONL output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub ts: DateTime<Utc>,
    pub level: Level,

    /// Event name (e.g., "run.started", "fit.finished").
    pub event: String,

    /// Unique ID for this invocation.
    pub run_id: String,

    /// Model the event concerns, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    pub stage: Stage,
    pub host_id: String,
    pub message: String,

    /// Additional structured fields (stable keys).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl LogEvent {
    pub fn new(
        level: Level,
        event: impl Into<String>,
        run_id: impl Into<String>,
        host_id: impl Into<String>,
        stage: Stage,
        message: impl Into<String>,
    ) -> Self {
        LogEvent {
            ts: Utc::now(),
            level,
            event: event.into(),
            run_id: run_id.into(),
            model: None,
            stage,
            host_id: host_id.into(),
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Attach a structured field. Values that fail to serialize are skipped.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.fields.insert(key.into(), v);
        }
        self
    }

    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| serde_json::json!({ "event": self.event, "error": e.to_string() }).to_string())
    }
}

/// Correlation IDs shared by every event of one run.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub run_id: String,
    pub host_id: String,
    /// Model currently being fitted or evaluated.
    pub model: Option<String>,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>, host_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            host_id: host_id.into(),
            model: None,
        }
    }

    /// Copy of this context scoped to one model.
    pub fn for_model(&self, model: impl Into<String>) -> Self {
        LogContext {
            model: Some(model.into()),
            ..self.clone()
        }
    }

    pub fn event(
        &self,
        level: Level,
        event: impl Into<String>,
        stage: Stage,
        message: impl Into<String>,
    ) -> LogEvent {
        LogEvent {
            model: self.model.clone(),
            ..LogEvent::new(level, event, &self.run_id, &self.host_id, stage, message)
        }
    }

    pub fn info(&self, event: impl Into<String>, stage: Stage, message: impl Into<String>) -> LogEvent {
        self.event(Level::Info, event, stage, message)
    }

    pub fn warn(&self, event: impl Into<String>, stage: Stage, message: impl Into<String>) -> LogEvent {
        self.event(Level::Warn, event, stage, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event_serialization() {
        let event = LogEvent::new(
            Level::Info,
            "fit.finished",
            "run-12345",
            "host-abc",
            Stage::Fit,
            "Sampling complete",
        )
        .with_model("model1")
        .with_field("draws", 4000);

        let json = event.to_jsonl();
        assert!(json.contains(r#""event":"fit.finished""#));
        assert!(json.contains(r#""level":"info""#));
        assert!(json.contains(r#""stage":"fit""#));
        assert!(json.contains(r#""model":"model1""#));
        assert!(json.contains(r#""draws":4000"#));
    }

    #[test]
    fn test_model_omitted_when_unset() {
        let ctx = LogContext::new("run-abc", "host-xyz");
        let json = ctx.info(event_names::LOAD_FINISHED, Stage::Load, "read").to_jsonl();
        assert!(!json.contains("\"model\""));
    }

    #[test]
    fn test_context_for_model() {
        let ctx = LogContext::new("run-abc", "host-xyz").for_model("model4");
        let event = ctx.warn(
            event_names::FIT_CONVERGENCE_WARNING,
            Stage::Fit,
            "R-hat above threshold",
        );
        assert_eq!(event.run_id, "run-abc");
        assert_eq!(event.model.as_deref(), Some("model4"));
        assert_eq!(event.level, Level::Warn);
    }

    #[test]
    fn test_fields_serialize_in_key_order() {
        let json = LogContext::new("r", "h")
            .info(event_names::CLEAN_FINISHED, Stage::Clean, "done")
            .with_field("rows_out", 86)
            .with_field("rows_in", 91)
            .to_jsonl();
        let a = json.find("rows_in").unwrap();
        let b = json.find("rows_out").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_stage_display_matches_serde() {
        for stage in [Stage::Init, Stage::Load, Stage::Clean, Stage::Evaluate] {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage));
        }
    }
}

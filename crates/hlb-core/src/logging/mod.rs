//! Logging for hlb-core.
//!
//! Two sinks, both on stderr so stdout stays reserved for command payloads:
//! human console lines for interactive use and JSONL (via [`JsonlLayer`])
//! when the command output is machine-readable.
//!
//! ```ignore
//! use hlb_core::logging::{event_names, init_logging, LogConfig, LogContext, Stage};
//!
//! init_logging(&LogConfig::from_env(None, None));
//! let ctx = LogContext::new(RunId::new().0, get_host_id());
//! log_event!(ctx, INFO, event_names::RUN_STARTED, Stage::Init, "analysis started");
//! ```

pub mod config;
pub mod events;
pub mod layer;

pub use config::{LogConfig, LogFormat, LogLevel};
pub use events::{event_names, Level, LogContext, LogEvent, Stage};
pub use layer::JsonlLayer;

use std::io::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Install the global subscriber. Later calls are no-ops.
pub fn init_logging(config: &LogConfig) {
    let sink = match config.format {
        LogFormat::Jsonl => JsonlLayer::stderr().boxed(),
        LogFormat::Human => {
            let console = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(std::io::stderr().is_terminal());
            if config.timestamps {
                console.boxed()
            } else {
                console.without_time().boxed()
            }
        }
    };

    // HLB_LOG and RUST_LOG are already folded into the resolved level.
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new(config.level.as_str()))
        .with(sink)
        .try_init();
}

/// Get the host ID for logging.
///
/// Uses machine-id on Linux, else a hash of the hostname, else a random ID.
pub fn get_host_id() -> String {
    if let Ok(id) = std::fs::read_to_string("/etc/machine-id") {
        let id = id.trim();
        if id.len() >= 8 && id.is_ascii() {
            return format!("host-{}", &id[..8]);
        }
    }

    if let Ok(hostname) = std::env::var("HOSTNAME") {
        let hash = hash_string(&hostname);
        return format!("host-{}", &hash[..8]);
    }

    format!("host-{}", &uuid::Uuid::new_v4().simple().to_string()[..8])
}

fn hash_string(s: &str) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(s.as_bytes()))
}

/// Structured event logging with context.
///
/// Usage:
/// ```ignore
/// log_event!(ctx, INFO, event_names::LOAD_FINISHED, Stage::Load, "Read survey file");
/// log_event!(ctx, WARN, event_names::FIT_CONVERGENCE_WARNING, Stage::Fit, "R-hat high",
///     rhat = 1.12);
/// ```
#[macro_export]
macro_rules! log_event {
    ($ctx:expr, INFO, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::info!(
            target: $event,
            run_id = %$ctx.run_id,
            host_id = %$ctx.host_id,
            model = $ctx.model.as_deref().unwrap_or_default(),
            stage = %$stage,
            message = %$msg,
            $($key = $val,)*
        )
    };
    ($ctx:expr, DEBUG, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::debug!(
            target: $event,
            run_id = %$ctx.run_id,
            host_id = %$ctx.host_id,
            model = $ctx.model.as_deref().unwrap_or_default(),
            stage = %$stage,
            message = %$msg,
            $($key = $val,)*
        )
    };
    ($ctx:expr, WARN, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::warn!(
            target: $event,
            run_id = %$ctx.run_id,
            host_id = %$ctx.host_id,
            model = $ctx.model.as_deref().unwrap_or_default(),
            stage = %$stage,
            message = %$msg,
            $($key = $val,)*
        )
    };
    ($ctx:expr, ERROR, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::error!(
            target: $event,
            run_id = %$ctx.run_id,
            host_id = %$ctx.host_id,
            model = $ctx.model.as_deref().unwrap_or_default(),
            stage = %$stage,
            message = %$msg,
            $($key = $val,)*
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_host_id() {
        let host_id = get_host_id();
        assert!(host_id.starts_with("host-"));
        assert!(host_id.len() >= 13);
    }

    #[test]
    fn test_log_event_macro_compiles_for_all_levels() {
        let ctx = LogContext::new("run-1", "host-1").for_model("model1");
        log_event!(ctx, INFO, event_names::FIT_STARTED, Stage::Fit, "start", chains = 4u64);
        log_event!(ctx, DEBUG, event_names::FIT_CHAIN_DONE, Stage::Fit, "chain");
        log_event!(ctx, WARN, event_names::FIT_CONVERGENCE_WARNING, Stage::Fit, "warn");
        log_event!(ctx, ERROR, event_names::INTERNAL_ERROR, Stage::Fit, "err");
    }
}

//! Custom tracing layer for JSONL output.
//!
//! This layer produces machine-parseable JSONL logs on stderr while
//! keeping stdout clean for command payloads.

use std::io::{self, Write};
use std::sync::Mutex;

use chrono::Utc;
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use super::events::Level;

/// Correlation fields promoted to the top level of each JSON line.
#[derive(Debug, Clone, Default)]
struct CorrelationIds {
    run_id: Option<String>,
    host_id: Option<String>,
    stage: Option<String>,
    model: Option<String>,
}

impl CorrelationIds {
    /// Store `value` if `name` is a correlation field.
    fn record(&mut self, name: &str, value: String) -> bool {
        let slot = match name {
            "run_id" => &mut self.run_id,
            "host_id" => &mut self.host_id,
            "stage" => &mut self.stage,
            "model" => &mut self.model,
            _ => return false,
        };
        if !value.is_empty() {
            *slot = Some(value);
        }
        true
    }

    /// Fill unset fields from an enclosing span.
    fn inherit(&mut self, outer: &CorrelationIds) {
        if self.run_id.is_none() {
            self.run_id.clone_from(&outer.run_id);
        }
        if self.host_id.is_none() {
            self.host_id.clone_from(&outer.host_id);
        }
        if self.stage.is_none() {
            self.stage.clone_from(&outer.stage);
        }
        if self.model.is_none() {
            self.model.clone_from(&outer.model);
        }
    }
}

/// A visitor that extracts field values from tracing events and spans.
struct JsonFieldVisitor {
    ids: CorrelationIds,
    fields: serde_json::Map<String, serde_json::Value>,
    message: Option<String>,
}

impl JsonFieldVisitor {
    fn new() -> Self {
        JsonFieldVisitor {
            ids: CorrelationIds::default(),
            fields: serde_json::Map::new(),
            message: None,
        }
    }

    fn record_text(&mut self, name: &str, value: String) {
        if name == "message" {
            self.message = Some(value);
        } else if !self.ids.record(name, value.clone()) {
            self.fields
                .insert(name.to_string(), serde_json::Value::String(value));
        }
    }
}

impl tracing::field::Visit for JsonFieldVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.record_text(field.name(), value.to_string());
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.record_text(field.name(), format!("{:?}", value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.fields.insert(
            field.name().to_string(),
            serde_json::Value::Number(value.into()),
        );
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.fields.insert(
            field.name().to_string(),
            serde_json::Value::Number(serde_json::Number::from(value)),
        );
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        let v = serde_json::Number::from_f64(value)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| serde_json::Value::String(value.to_string()));
        self.fields.insert(field.name().to_string(), v);
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::Bool(value));
    }
}

/// JSONL tracing layer that outputs to stderr.
pub struct JsonlLayer<W = io::Stderr> {
    writer: Mutex<W>,
}

impl JsonlLayer<io::Stderr> {
    /// Create a new JSONL layer writing to stderr.
    pub fn stderr() -> Self {
        JsonlLayer {
            writer: Mutex::new(io::stderr()),
        }
    }
}

impl<W: Write> JsonlLayer<W> {
    /// Create a new JSONL layer with a custom writer.
    pub fn new(writer: W) -> Self {
        JsonlLayer {
            writer: Mutex::new(writer),
        }
    }
}

impl<S, W> Layer<S> for JsonlLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: Write + Send + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = JsonFieldVisitor::new();
        attrs.record(&mut visitor);

        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(visitor.ids);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let ts = Utc::now();

        let mut visitor = JsonFieldVisitor::new();
        event.record(&mut visitor);

        // Event fields win over span fields; inner spans win over outer ones.
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                if let Some(span_ids) = span.extensions().get::<CorrelationIds>() {
                    visitor.ids.inherit(span_ids);
                }
            }
        }

        let level: Level = (*event.metadata().level()).into();
        let mut obj = serde_json::Map::new();

        obj.insert("ts".to_string(), serde_json::json!(ts.to_rfc3339()));
        obj.insert("level".to_string(), serde_json::json!(level));
        obj.insert(
            "event".to_string(),
            serde_json::json!(event.metadata().target()),
        );

        let ids = visitor.ids;
        for (key, value) in [
            ("run_id", ids.run_id),
            ("host_id", ids.host_id),
            ("stage", ids.stage),
            ("model", ids.model),
        ] {
            if let Some(v) = value {
                obj.insert(key.to_string(), serde_json::json!(v));
            }
        }
        if let Some(msg) = visitor.message {
            obj.insert("message".to_string(), serde_json::json!(msg));
        }
        if !visitor.fields.is_empty() {
            obj.insert(
                "fields".to_string(),
                serde_json::Value::Object(visitor.fields),
            );
        }

        let json = serde_json::to_string(&serde_json::Value::Object(obj)).unwrap_or_default();
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", json);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tracing_subscriber::layer::SubscriberExt;

    struct BufWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for BufWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(f: impl FnOnce()) -> serde_json::Value {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let layer = JsonlLayer::new(BufWriter(buffer.clone()));
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, f);
        let output = buffer.lock().unwrap();
        let text = String::from_utf8_lossy(&output);
        serde_json::from_str(text.trim()).expect("single valid JSON line")
    }

    #[test]
    fn layer_writes_level_target_and_message() {
        let line = capture(|| {
            tracing::warn!(target: "fit.convergence_warning", message = "rhat high");
        });
        assert_eq!(line["level"], "warn");
        assert_eq!(line["event"], "fit.convergence_warning");
        assert_eq!(line["message"], "rhat high");
        assert!(line["ts"].is_string());
    }

    #[test]
    fn correlation_ids_are_promoted() {
        let line = capture(|| {
            tracing::info!(
                target: "fit.finished",
                run_id = "run-abc",
                stage = "fit",
                model = "model2",
                draws = 4000u64,
                message = "done"
            );
        });
        assert_eq!(line["run_id"], "run-abc");
        assert_eq!(line["stage"], "fit");
        assert_eq!(line["model"], "model2");
        assert_eq!(line["fields"]["draws"], 4000);
        assert!(line["fields"].get("run_id").is_none());
    }

    #[test]
    fn span_context_is_inherited() {
        let line = capture(|| {
            let span = tracing::info_span!("analysis", run_id = "run-span", model = "model1");
            let _guard = span.enter();
            tracing::info!(target: "evaluate.accuracy", accuracy = 0.75, message = "scored");
        });
        assert_eq!(line["run_id"], "run-span");
        assert_eq!(line["model"], "model1");
        assert_eq!(line["fields"]["accuracy"], 0.75);
    }

    #[test]
    fn non_finite_floats_become_strings() {
        let line = capture(|| {
            tracing::info!(target: "fit.finished", rhat = f64::NAN, message = "x");
        });
        assert_eq!(line["fields"]["rhat"], "NaN");
    }
}

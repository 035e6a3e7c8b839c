use crate::record::{CallSite, ContextMap, LogLevel};
use crate::registry::Registry;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that forwards `tracing` events from other
/// crates into the pipeline.
///
/// The event target becomes the logger name under the `MAIN` module tag,
/// event fields become the record context, and the metadata call site is
/// carried through. Emission is synchronous; the sinks already bound the
/// cost of a write.
pub struct TracingBridge {
    registry: Registry,
}

impl TracingBridge {
    pub fn new(registry: &Registry) -> Self {
        Self {
            registry: registry.clone(),
        }
    }
}

impl<S> Layer<S> for TracingBridge
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let level = map_level(meta.level());
        let logger = self.registry.logger(meta.target(), "MAIN");
        if !logger.enabled(level) {
            return;
        }

        let mut fields = ContextMap::new();
        let mut message: Option<String> = None;
        let mut visitor = FieldVisitor {
            fields: &mut fields,
            message: &mut message,
        };
        event.record(&mut visitor);

        let site = CallSite {
            file: meta.file().unwrap_or("unknown"),
            line: meta.line().unwrap_or(0),
            func: meta.module_path().unwrap_or(""),
        };
        let mut record = logger.make_record(level, message.unwrap_or_default(), site);
        if !fields.is_empty() {
            record = record.with_context(fields);
        }
        logger.dispatch(record);
    }
}

/// Install a bridge over `registry` as the process-wide `tracing`
/// subscriber. A subscriber set earlier keeps precedence; the call is then
/// a no-op.
pub fn install(registry: &Registry) {
    use tracing_subscriber::layer::SubscriberExt;
    let subscriber = tracing_subscriber::registry().with(TracingBridge::new(registry));
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn map_level(level: &Level) -> LogLevel {
    if *level == Level::ERROR {
        LogLevel::Error
    } else if *level == Level::WARN {
        LogLevel::Warning
    } else if *level == Level::INFO {
        LogLevel::Info
    } else {
        LogLevel::Debug
    }
}

struct FieldVisitor<'a> {
    fields: &'a mut ContextMap,
    message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(
                field.name().to_string(),
                serde_json::Value::String(value.to_string()),
            );
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::from(value));
    }

    // The standard macros record the message as a Debug value.
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(
                field.name().to_string(),
                serde_json::Value::String(format!("{:?}", value)),
            );
        }
    }
}

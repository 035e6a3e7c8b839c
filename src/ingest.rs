use crate::callsite;
use crate::context;
use crate::record::{ContextMap, LogLevel};
use crate::redact::strip_sensitive_keys;
use crate::registry::{Logger, Registry};
use serde::Deserialize;

/// Log event submitted by an external client, typically a browser.
///
/// The shape matches what a frontend error handler posts: a console-style
/// level string, free-form message, and optional page metadata. Unknown
/// fields are ignored so client payloads can evolve independently.
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalRecord {
    pub level: String,
    pub message: String,
    #[serde(default)]
    pub context: Option<ContextMap>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Record an external client event through a `FRONTEND`-tagged handle.
///
/// **Behavior**
/// - binds the client's correlation id for the emission (sentinel when the
///   payload carries none);
/// - drops client context keys matching the sensitive patterns before
///   anything is persisted;
/// - folds session id, URL, and the surviving context into the message:
///   `"{message} | session={id} | URL: {url} | Context: {json}"`, each part
///   present only when supplied;
/// - maps console level strings onto record levels (`error`/`critical` →
///   ERROR, `warn`/`warning` → WARNING, `info`/`log` → INFO, anything else
///   DEBUG);
/// - keeps the client's user agent and original timestamp in the structured
///   context, never in the message.
pub fn ingest_external(registry: &Registry, external: ExternalRecord) {
    let logger = registry.frontend_logger("browser");
    let level = map_level(&external.level);

    let client_context = external
        .context
        .map(strip_sensitive_keys)
        .unwrap_or_default();

    let mut msg = external.message;
    if let Some(session) = &external.session_id {
        msg.push_str(&format!(" | session={session}"));
    }
    if let Some(url) = &external.url {
        msg.push_str(&format!(" | URL: {url}"));
    }
    if !client_context.is_empty() {
        if let Ok(json) = serde_json::to_string(&client_context) {
            msg.push_str(&format!(" | Context: {json}"));
        }
    }

    let mut record_context = client_context;
    if let Some(agent) = external.user_agent {
        record_context.insert("user_agent".to_string(), agent.into());
    }
    if let Some(client_ts) = external.timestamp {
        record_context.insert("client_ts".to_string(), client_ts.into());
    }

    match external.correlation_id {
        Some(id) if !id.is_empty() => context::with_request_id_sync(id, || {
            emit(&logger, level, msg, record_context)
        }),
        _ => emit(&logger, level, msg, record_context),
    }
}

fn emit(logger: &Logger, level: LogLevel, msg: String, record_context: ContextMap) {
    let record = logger
        .make_record(level, msg, callsite!())
        .with_context(record_context);
    logger.dispatch(record);
}

fn map_level(raw: &str) -> LogLevel {
    match raw.to_ascii_lowercase().as_str() {
        "error" | "critical" => LogLevel::Error,
        "warn" | "warning" => LogLevel::Warning,
        "info" | "log" => LogLevel::Info,
        _ => LogLevel::Debug,
    }
}

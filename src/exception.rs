use crate::callsite;
use crate::record::{ContextMap, ExceptionInfo, LogLevel};
use crate::redact::{is_sensitive_variable, truncate_repr, REDACTED, REPR_FAILED};
use crate::registry::Logger;
use std::backtrace::Backtrace;
use std::error::Error;

/// Knobs for [`capture_error`].
#[derive(Clone, Debug)]
pub struct CaptureOptions {
    /// Include the caller-supplied variable snapshot in the record context.
    pub include_locals: bool,
    /// Cap on each rendered variable, in characters.
    pub max_local_len: usize,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            include_locals: true,
            max_local_len: 200,
        }
    }
}

/// Emit one enriched ERROR record for `error`.
///
/// The record carries the error type, display message, and a traceback
/// (the `source()` chain plus a captured backtrace) both in its context
/// and as the structured exception attachment. `locals` is the caller's
/// explicit snapshot of relevant variables; names starting with `_` are
/// skipped, sensitive names are kept with a `[REDACTED]` value, rendered
/// values are capped at `options.max_local_len`, and a variable that fails
/// to render is recorded as `[repr failed]` without aborting the capture.
pub fn capture_error<E: Error>(
    logger: &Logger,
    error: &E,
    message: &str,
    locals: ContextMap,
    options: &CaptureOptions,
) {
    let kind = std::any::type_name::<E>();
    let traceback = format_traceback(error, kind);

    let mut context = ContextMap::new();
    context.insert("exception_type".to_string(), serde_json::json!(kind));
    context.insert(
        "exception_message".to_string(),
        serde_json::json!(error.to_string()),
    );
    if options.include_locals {
        let snapshot = render_locals(locals, options.max_local_len);
        if !snapshot.is_empty() {
            context.insert(
                "locals".to_string(),
                serde_json::Value::Object(snapshot.into_iter().collect()),
            );
        }
    }
    context.insert("traceback".to_string(), serde_json::json!(traceback));

    let record = logger
        .make_record(
            LogLevel::Error,
            format!("{message} | {kind}: {error}"),
            callsite!(),
        )
        .with_context(context)
        .with_exception(ExceptionInfo {
            kind: kind.to_string(),
            message: error.to_string(),
            traceback,
        });
    logger.dispatch(record);
}

fn render_locals(locals: ContextMap, max_len: usize) -> ContextMap {
    let mut rendered = ContextMap::new();
    for (name, value) in locals {
        if name.starts_with('_') {
            continue;
        }
        if is_sensitive_variable(&name) {
            rendered.insert(name, serde_json::json!(REDACTED));
            continue;
        }
        let repr = match serde_json::to_string(&value) {
            Ok(s) => truncate_repr(s, max_len),
            Err(_) => REPR_FAILED.to_string(),
        };
        rendered.insert(name, serde_json::json!(repr));
    }
    rendered
}

fn format_traceback<E: Error>(error: &E, kind: &str) -> String {
    let mut out = format!("{kind}: {error}");
    let mut source = error.source();
    while let Some(cause) = source {
        out.push_str("\ncaused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out.push('\n');
    out.push_str(&Backtrace::force_capture().to_string());
    out
}

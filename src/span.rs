use crate::callsite;
use crate::record::{ContextMap, LogLevel};
use crate::registry::Logger;
use std::fmt::Display;
use std::future::Future;
use std::time::Instant;
use uuid::Uuid;

/// Run `f` inside a timed span.
///
/// Emits one INFO `SPAN_START:<op>` record on entry and exactly one
/// terminal record on exit: INFO `SPAN_END:<op>` with the elapsed
/// milliseconds on success, or ERROR `SPAN_ERROR:<op>` with the elapsed
/// milliseconds and the error merged into the span context on failure.
/// The error is returned unchanged; the tracer observes failures, never
/// swallows them. A panic inside `f` still produces the terminal ERROR
/// record before unwinding continues.
///
/// Spans nest freely; each gets its own id and timing.
pub fn with_span<T, E, F>(logger: &Logger, op: &str, context: ContextMap, f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    E: Display,
{
    let scope = SpanScope::enter(logger, op, context);
    let result = f();
    scope.exit(result)
}

/// Async variant of [`with_span`]. Dropping the wrapped future before it
/// completes (task cancellation) also counts as an exceptional exit and
/// emits the terminal ERROR record.
pub async fn with_span_async<T, E, F>(
    logger: &Logger,
    op: &str,
    context: ContextMap,
    fut: F,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    let scope = SpanScope::enter(logger, op, context);
    let result = fut.await;
    scope.exit(result)
}

/// Short random span token.
fn new_span_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

struct SpanScope<'a> {
    logger: &'a Logger,
    op: String,
    span_id: String,
    start: Instant,
    context: ContextMap,
    done: bool,
}

impl<'a> SpanScope<'a> {
    fn enter(logger: &'a Logger, op: &str, context: ContextMap) -> Self {
        let scope = Self {
            logger,
            op: op.to_string(),
            span_id: new_span_id(),
            start: Instant::now(),
            context,
            done: false,
        };

        let msg = if scope.context.is_empty() {
            format!("SPAN_START:{}", scope.op)
        } else {
            format!(
                "SPAN_START:{} | context={}",
                scope.op,
                context_json(&scope.context)
            )
        };
        let record = logger
            .make_record(LogLevel::Info, msg, callsite!())
            .with_span(&scope.span_id, &scope.op)
            .with_context(scope.context.clone());
        logger.dispatch(record);

        scope
    }

    fn exit<T, E: Display>(mut self, result: Result<T, E>) -> Result<T, E> {
        self.done = true;
        let duration_ms = self.elapsed_ms();
        match &result {
            Ok(_) => {
                let msg = format!("SPAN_END:{} | duration={:.2}ms", self.op, duration_ms);
                let record = self
                    .logger
                    .make_record(LogLevel::Info, msg, callsite!())
                    .with_span(&self.span_id, &self.op)
                    .with_duration_ms(duration_ms);
                self.logger.dispatch(record);
            }
            Err(e) => {
                self.emit_error(duration_ms, &e.to_string(), std::any::type_name::<E>());
            }
        }
        result
    }

    fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    fn emit_error(&mut self, duration_ms: f64, error: &str, error_type: &str) {
        let msg = format!(
            "SPAN_ERROR:{} | duration={:.2}ms | error={}",
            self.op, duration_ms, error
        );
        let mut context = std::mem::take(&mut self.context);
        context.insert("error".to_string(), serde_json::json!(error));
        context.insert("error_type".to_string(), serde_json::json!(error_type));
        let record = self
            .logger
            .make_record(LogLevel::Error, msg, callsite!())
            .with_span(&self.span_id, &self.op)
            .with_duration_ms(duration_ms)
            .with_context(context);
        self.logger.dispatch(record);
    }
}

impl Drop for SpanScope<'_> {
    // Exceptional exits that bypass `exit` (panic unwind, dropped future)
    // still owe the terminal event.
    fn drop(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        let duration_ms = self.elapsed_ms();
        let (error, error_type) = if std::thread::panicking() {
            ("panicked inside span", "panic")
        } else {
            ("span dropped before completion", "cancelled")
        };
        self.emit_error(duration_ms, error, error_type);
    }
}

fn context_json(context: &ContextMap) -> String {
    serde_json::to_string(context).unwrap_or_else(|_| "{}".to_string())
}

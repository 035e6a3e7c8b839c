//! Emit through a real registry, then read back through the query engine.
//! These cover the pipeline end to end: correlation scopes, span events,
//! exception capture, the three sinks, and follow mode.

use spanlog::context;
use spanlog::exception::{capture_error, CaptureOptions};
use spanlog::follow::TailFollower;
use spanlog::init::LogConfig;
use spanlog::query::{fetch_recent_logs, fetch_trace, query_logs, QueryFilter};
use spanlog::record::{ContextMap, LogLevel};
use spanlog::registry::Registry;
use spanlog::span::{with_span, with_span_async};
use spanlog::{log_error, log_info};
use tempfile::TempDir;

fn registry_at(dir: &TempDir) -> Registry {
    Registry::new(LogConfig {
        dir: dir.path().to_path_buf(),
        level: LogLevel::Info,
        console: false,
    })
    .unwrap()
}

#[tokio::test]
async fn request_trace_spans_modules_and_flags_errors() {
    let dir = TempDir::new().unwrap();
    let registry = registry_at(&dir);

    context::with_request_id("r1", async {
        let backend = registry.logger("orders", "BACKEND");
        log_info!(backend, "request received");

        let loaded: Result<u32, std::io::Error> = with_span_async(
            &registry.span_logger("orders"),
            "load_cart",
            ContextMap::new(),
            async { Ok(3) },
        )
        .await;
        assert_eq!(loaded.unwrap(), 3);

        let db_error = std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        );
        capture_error(
            &registry.logger("orders", "DATABASE"),
            &db_error,
            "order insert failed",
            ContextMap::new(),
            &CaptureOptions::default(),
        );
    })
    .await;
    registry.flush();

    let trace = fetch_trace(&registry.json_path(), "r1").unwrap();
    // request received, SPAN_START, SPAN_END, capture.
    assert_eq!(trace.count, 4);
    assert!(trace.has_errors);
    assert_eq!(trace.modules_involved, vec!["BACKEND", "DATABASE", "SPAN"]);
    assert!(trace.total_duration_ms >= 0.0);
    for record in &trace.records {
        assert_eq!(record.request_id, "r1");
    }
}

#[test]
fn redaction_survives_persistence() {
    let dir = TempDir::new().unwrap();
    let registry = registry_at(&dir);

    let mut locals = ContextMap::new();
    locals.insert("password".to_string(), "hunter2".into());
    locals.insert("order_id".to_string(), "991".into());
    let error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "login rejected");
    capture_error(
        &registry.logger("auth", "BACKEND"),
        &error,
        "login failed",
        locals,
        &CaptureOptions::default(),
    );
    registry.flush();

    let raw = std::fs::read_to_string(registry.json_path()).unwrap();
    assert!(!raw.contains("hunter2"));
    assert!(raw.contains("[REDACTED]"));
    assert!(raw.contains("991"));
}

#[test]
fn failed_span_leaves_a_queryable_error_trail() {
    let dir = TempDir::new().unwrap();
    let registry = registry_at(&dir);

    let result: Result<(), String> = with_span(
        &registry.span_logger("jobs"),
        "sync_inventory",
        ContextMap::new(),
        || Err("upstream returned 503".to_string()),
    );
    assert!(result.is_err());
    registry.flush();

    let errors = query_logs(
        &registry.json_path(),
        &QueryFilter::new().with_level(LogLevel::Error),
        10,
    )
    .unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].msg.contains("SPAN_ERROR:sync_inventory"));
    assert!(errors[0].msg.contains("upstream returned 503"));
    assert!(errors[0].duration_ms.is_some());
    assert_eq!(errors[0].span_op.as_deref(), Some("sync_inventory"));
}

#[test]
fn recent_logs_summary_counts_distinct_requests() {
    let dir = TempDir::new().unwrap();
    let registry = registry_at(&dir);
    let backend = registry.logger("orders", "BACKEND");

    for i in 0..3 {
        context::with_request_id_sync(format!("req-{i}"), || {
            log_info!(backend, "step {}", i);
        });
    }
    log_error!(backend, "boom");
    registry.flush();

    let response =
        fetch_recent_logs(&registry.json_path(), &QueryFilter::new(), 50, true).unwrap();
    assert_eq!(response.count, 4);
    let summary = response.summary.unwrap();
    assert_eq!(summary.total_entries, 4);
    assert_eq!(summary.unique_requests, 3);
    assert_eq!(summary.error_count, 1);
    assert_eq!(summary.recent_errors[0].msg, "boom");
}

#[test]
fn all_three_files_agree_on_what_happened() {
    let dir = TempDir::new().unwrap();
    let registry = registry_at(&dir);
    let backend = registry.logger("orders", "BACKEND");

    log_info!(backend, "alpha event");
    log_error!(backend, "omega failure");
    registry.flush();

    let general = std::fs::read_to_string(registry.text_path()).unwrap();
    assert!(general.contains("alpha event"));
    assert!(general.contains("omega failure"));

    let errors_only = std::fs::read_to_string(registry.error_path()).unwrap();
    assert!(!errors_only.contains("alpha event"));
    assert!(errors_only.contains("omega failure"));

    let records = query_logs(&registry.json_path(), &QueryFilter::new(), 10).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].msg, "alpha event");
    assert_eq!(records[1].msg, "omega failure");
}

#[test]
fn follow_mode_picks_up_later_emissions() {
    let dir = TempDir::new().unwrap();
    let registry = registry_at(&dir);
    let backend = registry.logger("orders", "BACKEND");

    log_info!(backend, "before open");
    registry.flush();

    let mut tail = TailFollower::open(&registry.json_path()).unwrap();
    assert!(tail.poll_record().unwrap().is_none());

    log_info!(backend, "after open");
    registry.flush();

    let record = tail.poll_record().unwrap().unwrap();
    assert_eq!(record.msg, "after open");
    assert!(tail.poll_record().unwrap().is_none());
}

use crate::query::{round2, truncate_chars, QueryError, SlowOp};
use crate::record::{iso_ts, LogRecord, REQUEST_ID_UNSET};
use crate::tail::RevLineReader;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

const RECENT_ERROR_LIMIT: usize = 10;
const ERROR_MSG_CAP: usize = 150;
const SLOW_SPAN_THRESHOLD_MS: f64 = 2000.0;
const SLOW_SPAN_LIMIT: usize = 10;
const HIGH_PRIORITY_ERROR_COUNT: usize = 10;
const FRONTEND_ERROR_ALERT: usize = 3;

/// Overall health verdict derived from the window's error rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Warning,
    Critical,
    NoLogs,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "HEALTHY",
            HealthStatus::Degraded => "DEGRADED",
            HealthStatus::Warning => "WARNING",
            HealthStatus::Critical => "CRITICAL",
            HealthStatus::NoLogs => "NO_LOGS",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Full diagnostic report over a trailing time window.
#[derive(Debug, Serialize)]
pub struct DebugReport {
    #[serde(with = "iso_ts")]
    pub report_generated: DateTime<Utc>,
    pub time_period: String,
    pub log_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file_exists: Option<bool>,
    pub health_status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub total_entries: usize,
    pub level_distribution: BTreeMap<String, usize>,
    pub module_distribution: BTreeMap<String, usize>,
    pub unique_requests: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_analysis: Option<ErrorAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceReport>,
    pub suggestions: Vec<String>,
    pub quick_commands: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorAnalysis {
    pub total_errors: usize,
    /// Percentage of window entries that are error-class, e.g. `"12.0%"`.
    pub error_rate: String,
    pub by_exception_type: BTreeMap<String, usize>,
    pub by_module: BTreeMap<String, usize>,
    pub recent_errors: Vec<ErrorDetail>,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    #[serde(with = "iso_ts")]
    pub ts: DateTime<Utc>,
    pub module: String,
    pub request_id: String,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PerformanceReport {
    pub operations: BTreeMap<String, OpStats>,
    pub slow_operations: Vec<SlowOp>,
}

#[derive(Debug, Serialize)]
pub struct OpStats {
    pub count: usize,
    pub avg_ms: f64,
    pub max_ms: f64,
    pub min_ms: f64,
}

/// Build a [`DebugReport`] from the JSON stream at `path`, covering the last
/// `hours` hours.
///
/// The stream is appended in time order, so the backward scan ends at the
/// first record past the cutoff. An absent file or an empty window yields a
/// `NO_LOGS` report rather than an error.
pub fn generate_summary(path: &Path, hours: i64) -> Result<DebugReport, QueryError> {
    let records = load_window(path, Utc::now() - Duration::hours(hours))?;
    if records.is_empty() {
        return Ok(no_logs_report(path, hours));
    }

    let mut level_distribution = BTreeMap::new();
    let mut module_distribution = BTreeMap::new();
    let mut requests = BTreeSet::new();
    for record in &records {
        *level_distribution
            .entry(record.level.to_string())
            .or_insert(0) += 1;
        *module_distribution
            .entry(record.module.clone())
            .or_insert(0) += 1;
        if record.request_id != REQUEST_ID_UNSET {
            requests.insert(record.request_id.clone());
        }
    }

    let errors: Vec<&LogRecord> = records.iter().filter(|r| r.level.is_error()).collect();
    let error_rate = errors.len() as f64 / records.len() as f64 * 100.0;
    let health_status = if errors.is_empty() {
        HealthStatus::Healthy
    } else if error_rate > 10.0 {
        HealthStatus::Critical
    } else if error_rate > 5.0 {
        HealthStatus::Warning
    } else {
        HealthStatus::Degraded
    };

    let suggestions = build_suggestions(&errors);
    let error_analysis = (!errors.is_empty()).then(|| analyze_errors(&errors, error_rate));
    let performance = analyze_performance(&records);

    Ok(DebugReport {
        report_generated: Utc::now(),
        time_period: format!("last {hours}h"),
        log_file: path.display().to_string(),
        log_file_exists: None,
        health_status,
        message: None,
        total_entries: records.len(),
        level_distribution,
        module_distribution,
        unique_requests: requests.len(),
        error_analysis,
        performance,
        suggestions,
        quick_commands: quick_commands(),
    })
}

fn load_window(path: &Path, cutoff: DateTime<Utc>) -> Result<Vec<LogRecord>, QueryError> {
    let mut reader = match RevLineReader::open(path) {
        Ok(reader) => reader,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(QueryError::Io {
                path: path.display().to_string(),
                source,
            })
        }
    };

    let mut records = Vec::new();
    loop {
        let line = match reader.next_line() {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(source) => {
                return Err(QueryError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        let Ok(record) = serde_json::from_str::<LogRecord>(&line) else {
            continue;
        };
        if record.ts < cutoff {
            break;
        }
        records.push(record);
    }
    records.reverse();
    Ok(records)
}

fn no_logs_report(path: &Path, hours: i64) -> DebugReport {
    DebugReport {
        report_generated: Utc::now(),
        time_period: format!("last {hours}h"),
        log_file: path.display().to_string(),
        log_file_exists: Some(path.exists()),
        health_status: HealthStatus::NoLogs,
        message: Some(format!("no log entries found in the last {hours} hours")),
        total_entries: 0,
        level_distribution: BTreeMap::new(),
        module_distribution: BTreeMap::new(),
        unique_requests: 0,
        error_analysis: None,
        performance: None,
        suggestions: Vec::new(),
        quick_commands: quick_commands(),
    }
}

fn analyze_errors(errors: &[&LogRecord], error_rate: f64) -> ErrorAnalysis {
    let mut by_exception_type = BTreeMap::new();
    let mut by_module = BTreeMap::new();
    for error in errors {
        let kind = error
            .exception
            .as_ref()
            .map(|e| e.kind.clone())
            .unwrap_or_else(|| "unknown".to_string());
        *by_exception_type.entry(kind).or_insert(0) += 1;
        *by_module.entry(error.module.clone()).or_insert(0) += 1;
    }

    let recent_errors = errors
        .iter()
        .rev()
        .take(RECENT_ERROR_LIMIT)
        .map(|r| ErrorDetail {
            ts: r.ts,
            module: r.module.clone(),
            request_id: r.request_id.clone(),
            msg: truncate_chars(&r.msg, ERROR_MSG_CAP),
            exception_type: r.exception.as_ref().map(|e| e.kind.clone()),
        })
        .collect();

    ErrorAnalysis {
        total_errors: errors.len(),
        error_rate: format!("{error_rate:.1}%"),
        by_exception_type,
        by_module,
        recent_errors,
    }
}

fn analyze_performance(records: &[LogRecord]) -> Option<PerformanceReport> {
    let mut durations: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for record in records {
        if let (Some(op), Some(duration)) = (&record.span_op, record.duration_ms) {
            durations.entry(op.clone()).or_default().push(duration);
        }
    }
    if durations.is_empty() {
        return None;
    }

    let operations = durations
        .into_iter()
        .map(|(op, samples)| {
            let sum: f64 = samples.iter().sum();
            let max = samples.iter().cloned().fold(f64::MIN, f64::max);
            let min = samples.iter().cloned().fold(f64::MAX, f64::min);
            let stats = OpStats {
                count: samples.len(),
                avg_ms: round2(sum / samples.len() as f64),
                max_ms: round2(max),
                min_ms: round2(min),
            };
            (op, stats)
        })
        .collect();

    let mut slow: Vec<&LogRecord> = records
        .iter()
        .filter(|r| r.duration_ms.is_some_and(|d| d > SLOW_SPAN_THRESHOLD_MS))
        .collect();
    slow.sort_by(|a, b| {
        b.duration_ms
            .partial_cmp(&a.duration_ms)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let slow_operations = slow
        .into_iter()
        .take(SLOW_SPAN_LIMIT)
        .map(|r| SlowOp {
            ts: r.ts,
            operation: r.span_op.clone().unwrap_or_else(|| "unknown".to_string()),
            duration_ms: r.duration_ms.unwrap_or(0.0),
            request_id: r.request_id.clone(),
        })
        .collect();

    Some(PerformanceReport {
        operations,
        slow_operations,
    })
}

fn build_suggestions(errors: &[&LogRecord]) -> Vec<String> {
    let mut network = false;
    let mut datastore = false;
    let mut validation = false;
    let mut data_shape = false;
    let mut frontend_errors = 0;

    for error in errors {
        let text = error.msg.to_lowercase();
        if text.contains("connection") || text.contains("timeout") {
            network = true;
        }
        if text.contains("sql") || text.contains("database") {
            datastore = true;
        }
        if text.contains("parse") || text.contains("validation") || text.contains("invalid") {
            validation = true;
        }
        if text.contains("serde") || text.contains("json") {
            data_shape = true;
        }
        if error.module == "FRONTEND" {
            frontend_errors += 1;
        }
        if error.module == "DATABASE" {
            datastore = true;
        }
    }

    let mut suggestions = Vec::new();
    if network {
        suggestions.push("Network errors detected: check connectivity and upstream timeouts".to_string());
    }
    if datastore {
        suggestions.push(
            "Database errors detected: verify connectivity, credentials, and recent migrations"
                .to_string(),
        );
    }
    if validation {
        suggestions
            .push("Validation failures detected: inspect recent input handling changes".to_string());
    }
    if data_shape {
        suggestions.push(
            "Serialization errors detected: check payload shapes against expected schemas"
                .to_string(),
        );
    }
    if frontend_errors > FRONTEND_ERROR_ALERT {
        suggestions.push(format!(
            "{frontend_errors} FRONTEND errors: check the browser console and recent client releases"
        ));
    }
    if errors.len() > HIGH_PRIORITY_ERROR_COUNT {
        suggestions.insert(
            0,
            format!(
                "HIGH PRIORITY: {} errors in the window, triage the most recent failures first",
                errors.len()
            ),
        );
    }
    suggestions
}

fn quick_commands() -> BTreeMap<String, String> {
    let mut commands = BTreeMap::new();
    commands.insert(
        "recent_errors".to_string(),
        "spanlog-view --level ERROR --lines 100".to_string(),
    );
    commands.insert(
        "follow_live".to_string(),
        "spanlog-view --follow".to_string(),
    );
    commands.insert(
        "trace_request".to_string(),
        "spanlog-view --request-id <id>".to_string(),
    );
    commands.insert(
        "json_report".to_string(),
        "spanlog-summary --json".to_string(),
    );
    commands
}

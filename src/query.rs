use crate::record::{iso_ts, LogLevel, LogRecord, REQUEST_ID_UNSET};
use crate::tail::RevLineReader;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

/// Hard cap on records returned by a single query.
pub const MAX_QUERY_LIMIT: usize = 1000;

/// Failure reading a log source. A missing file is not an error — queries
/// report it as an empty result set instead.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// Conjunction of optional record predicates.
///
/// All supplied filters must match. String filters are case-insensitive:
/// `level`/`module` compare exactly, `request_id`/`text` are substring
/// matches, `since_minutes` keeps records no older than the window.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryFilter {
    pub level: Option<LogLevel>,
    pub request_id: Option<String>,
    pub module: Option<String>,
    pub text: Option<String>,
    pub since_minutes: Option<i64>,
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_since_minutes(mut self, minutes: i64) -> Self {
        self.since_minutes = Some(minutes);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.level.is_none()
            && self.request_id.is_none()
            && self.module.is_none()
            && self.text.is_none()
            && self.since_minutes.is_none()
    }

    /// UTC cutoff implied by `since_minutes`, evaluated now.
    pub fn cutoff(&self) -> Option<DateTime<Utc>> {
        self.since_minutes
            .map(|minutes| Utc::now() - Duration::minutes(minutes))
    }

    pub fn matches(&self, record: &LogRecord) -> bool {
        self.matches_at(record, self.cutoff())
    }

    fn matches_at(&self, record: &LogRecord, cutoff: Option<DateTime<Utc>>) -> bool {
        if let Some(cutoff) = cutoff {
            if record.ts < cutoff {
                return false;
            }
        }
        if let Some(level) = self.level {
            if record.level != level {
                return false;
            }
        }
        if let Some(module) = &self.module {
            if !record.module.eq_ignore_ascii_case(module) {
                return false;
            }
        }
        if let Some(request_id) = &self.request_id {
            if !record
                .request_id
                .to_lowercase()
                .contains(&request_id.to_lowercase())
            {
                return false;
            }
        }
        if let Some(text) = &self.text {
            if !record.msg.to_lowercase().contains(&text.to_lowercase()) {
                return false;
            }
        }
        true
    }

    /// Human-readable echo of the active filters, e.g.
    /// `level=ERROR, module=BACKEND` or `all records`.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(level) = self.level {
            parts.push(format!("level={level}"));
        }
        if let Some(request_id) = &self.request_id {
            parts.push(format!("request_id~{request_id}"));
        }
        if let Some(module) = &self.module {
            parts.push(format!("module={module}"));
        }
        if let Some(text) = &self.text {
            parts.push(format!("text~{text}"));
        }
        if let Some(minutes) = self.since_minutes {
            parts.push(format!("last {minutes}min"));
        }
        if parts.is_empty() {
            "all records".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Up to `limit` matching records, oldest first.
///
/// Scans the JSON-lines file from the newest line backward, decoding each
/// line independently; malformed lines are skipped, never fatal. The scan
/// stops as soon as `limit` matches (capped at [`MAX_QUERY_LIMIT`]) are
/// collected, so tail queries touch only the end of large files. A missing
/// file yields an empty result.
pub fn query_logs(
    path: &Path,
    filter: &QueryFilter,
    limit: usize,
) -> Result<Vec<LogRecord>, QueryError> {
    let limit = limit.min(MAX_QUERY_LIMIT);
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

    let cutoff = filter.cutoff();
    let mut matched = Vec::new();
    while matched.len() < limit {
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
        if filter.matches_at(&record, cutoff) {
            matched.push(record);
        }
    }

    matched.reverse();
    Ok(matched)
}

/// Aggregate view over an already-filtered record set.
#[derive(Debug, Serialize)]
pub struct LogSummary {
    pub total_entries: usize,
    pub level_distribution: BTreeMap<String, usize>,
    pub module_distribution: BTreeMap<String, usize>,
    /// Distinct correlation ids, the unset sentinel excluded.
    pub unique_requests: usize,
    pub error_count: usize,
    pub recent_errors: Vec<ErrorBrief>,
    pub slow_operations: Vec<SlowOp>,
    pub time_range: Option<TimeRange>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBrief {
    #[serde(with = "iso_ts")]
    pub ts: DateTime<Utc>,
    pub module: String,
    pub request_id: String,
    pub msg: String,
}

#[derive(Debug, Serialize)]
pub struct SlowOp {
    #[serde(with = "iso_ts")]
    pub ts: DateTime<Utc>,
    pub operation: String,
    pub duration_ms: f64,
    pub request_id: String,
}

#[derive(Debug, Serialize)]
pub struct TimeRange {
    #[serde(with = "iso_ts")]
    pub oldest: DateTime<Utc>,
    #[serde(with = "iso_ts")]
    pub newest: DateTime<Utc>,
}

const RECENT_ERROR_LIMIT: usize = 5;
const SLOW_OP_LIMIT: usize = 5;
const SLOW_OP_THRESHOLD_MS: f64 = 1000.0;
const ERROR_MSG_CAP: usize = 200;

/// Summarize records already selected by a query. `records` is expected in
/// chronological order, as [`query_logs`] returns it.
pub fn summarize(records: &[LogRecord]) -> LogSummary {
    let mut level_distribution = BTreeMap::new();
    let mut module_distribution = BTreeMap::new();
    let mut requests = BTreeSet::new();
    let mut error_count = 0;

    for record in records {
        *level_distribution
            .entry(record.level.to_string())
            .or_insert(0) += 1;
        *module_distribution
            .entry(record.module.clone())
            .or_insert(0) += 1;
        if record.request_id != REQUEST_ID_UNSET {
            requests.insert(record.request_id.clone());
        }
        if record.level.is_error() {
            error_count += 1;
        }
    }

    let recent_errors = records
        .iter()
        .rev()
        .filter(|r| r.level.is_error())
        .take(RECENT_ERROR_LIMIT)
        .map(|r| ErrorBrief {
            ts: r.ts,
            module: r.module.clone(),
            request_id: r.request_id.clone(),
            msg: truncate_chars(&r.msg, ERROR_MSG_CAP),
        })
        .collect();

    let mut slow: Vec<&LogRecord> = records
        .iter()
        .filter(|r| r.duration_ms.is_some_and(|d| d > SLOW_OP_THRESHOLD_MS))
        .collect();
    slow.sort_by(|a, b| {
        b.duration_ms
            .partial_cmp(&a.duration_ms)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let slow_operations = slow
        .into_iter()
        .take(SLOW_OP_LIMIT)
        .map(|r| SlowOp {
            ts: r.ts,
            operation: r.span_op.clone().unwrap_or_else(|| "unknown".to_string()),
            duration_ms: r.duration_ms.unwrap_or(0.0),
            request_id: r.request_id.clone(),
        })
        .collect();

    let time_range = match (records.first(), records.last()) {
        (Some(first), Some(last)) => Some(TimeRange {
            oldest: first.ts,
            newest: last.ts,
        }),
        _ => None,
    };

    LogSummary {
        total_entries: records.len(),
        level_distribution,
        module_distribution,
        unique_requests: requests.len(),
        error_count,
        recent_errors,
        slow_operations,
        time_range,
    }
}

/// Response shape for the recent-logs query surface.
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub records: Vec<LogRecord>,
    pub count: usize,
    pub filters: QueryFilter,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<LogSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Recent-logs entry point for external surfaces (HTTP handlers, tools).
pub fn fetch_recent_logs(
    path: &Path,
    filter: &QueryFilter,
    limit: usize,
    include_summary: bool,
) -> Result<QueryResponse, QueryError> {
    if !path.exists() {
        return Ok(QueryResponse {
            records: Vec::new(),
            count: 0,
            filters: filter.clone(),
            summary: None,
            message: Some("no log file found".to_string()),
        });
    }
    let records = query_logs(path, filter, limit)?;
    let summary = include_summary.then(|| summarize(&records));
    Ok(QueryResponse {
        count: records.len(),
        records,
        filters: filter.clone(),
        summary,
        message: None,
    })
}

/// Full event timeline of one request.
#[derive(Debug, Serialize)]
pub struct TraceResponse {
    pub correlation_id: String,
    pub records: Vec<LogRecord>,
    pub count: usize,
    pub modules_involved: Vec<String>,
    pub has_errors: bool,
    pub total_duration_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Collect every record whose correlation id contains `correlation_id`
/// (case-insensitive), oldest first, with derived aggregates.
///
/// This is a full forward scan: traces are unbounded, unlike tail queries.
pub fn fetch_trace(path: &Path, correlation_id: &str) -> Result<TraceResponse, QueryError> {
    let mut response = TraceResponse {
        correlation_id: correlation_id.to_string(),
        records: Vec::new(),
        count: 0,
        modules_involved: Vec::new(),
        has_errors: false,
        total_duration_ms: 0.0,
        message: None,
    };

    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            response.message = Some("no log file found".to_string());
            return Ok(response);
        }
        Err(source) => {
            return Err(QueryError::Io {
                path: path.display().to_string(),
                source,
            })
        }
    };

    let needle = correlation_id.to_lowercase();
    let mut modules = BTreeSet::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| QueryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let Ok(record) = serde_json::from_str::<LogRecord>(&line) else {
            continue;
        };
        if !record.request_id.to_lowercase().contains(&needle) {
            continue;
        }
        modules.insert(record.module.clone());
        if record.level.is_error() {
            response.has_errors = true;
        }
        if let Some(duration) = record.duration_ms {
            response.total_duration_ms += duration;
        }
        response.records.push(record);
    }

    response.count = response.records.len();
    response.modules_involved = modules.into_iter().collect();
    response.total_duration_ms = round2(response.total_duration_ms);
    Ok(response)
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

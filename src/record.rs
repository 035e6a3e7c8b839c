use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Free-form structured payload attached to a record.
pub type ContextMap = BTreeMap<String, serde_json::Value>;

/// Correlation id reported when no request scope is active.
pub const REQUEST_ID_UNSET: &str = "----";

/// Severity of a log record, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    /// Parse a level name, case-insensitive. `WARN` is accepted as an
    /// alias for `WARNING`.
    pub fn parse(s: &str) -> Option<LogLevel> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Some(LogLevel::Debug),
            "INFO" => Some(LogLevel::Info),
            "WARN" | "WARNING" => Some(LogLevel::Warning),
            "ERROR" => Some(LogLevel::Error),
            "CRITICAL" => Some(LogLevel::Critical),
            _ => None,
        }
    }

    /// ERROR and CRITICAL records count as errors in summaries and traces.
    pub fn is_error(&self) -> bool {
        *self >= LogLevel::Error
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // pad() honors width flags, which the line formats rely on.
        f.pad(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogLevel::parse(s).ok_or_else(|| format!("unknown log level: {s}"))
    }
}

/// Structured exception attachment for error records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceptionInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub traceback: String,
}

/// Provenance of an emission site, captured by the `log_*` macros.
#[derive(Debug, Clone, Copy)]
pub struct CallSite {
    pub file: &'static str,
    pub line: u32,
    pub func: &'static str,
}

impl CallSite {
    /// Basename of the source file, matching what sinks print.
    pub fn file_name(&self) -> &'static str {
        self.file.rsplit(['/', '\\']).next().unwrap_or(self.file)
    }
}

/// Capture the current emission site. Used by the `log_*` macros; call it
/// directly when emitting through [`Logger::dispatch`](crate::registry::Logger).
#[macro_export]
macro_rules! callsite {
    () => {
        $crate::record::CallSite {
            file: file!(),
            line: line!(),
            func: module_path!(),
        }
    };
}

/// One structured log event. Serialized as a single sparse JSON object per
/// line; optional fields are omitted entirely when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(with = "iso_ts")]
    pub ts: DateTime<Utc>,
    pub unix_ts: f64,
    pub level: LogLevel,
    pub module: String,
    pub request_id: String,
    pub logger: String,
    pub file: String,
    pub line: u32,
    pub func: String,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub span_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub span_op: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub duration_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub context: Option<ContextMap>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub exception: Option<ExceptionInfo>,
}

impl LogRecord {
    /// Build a record stamped with the current instant. The correlation id
    /// is supplied by the caller so that all sinks observe the same value.
    pub fn new(
        level: LogLevel,
        module: &str,
        request_id: String,
        logger: &str,
        site: CallSite,
        msg: String,
    ) -> Self {
        let ts = Utc::now();
        Self {
            ts,
            unix_ts: unix_seconds(ts),
            level,
            module: module.to_string(),
            request_id,
            logger: logger.to_string(),
            file: site.file_name().to_string(),
            line: site.line,
            func: site.func.to_string(),
            msg,
            span_id: None,
            span_op: None,
            duration_ms: None,
            context: None,
            exception: None,
        }
    }

    pub fn with_span(mut self, span_id: &str, span_op: &str) -> Self {
        self.span_id = Some(span_id.to_string());
        self.span_op = Some(span_op.to_string());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Attach a context map. An empty map is treated as absent so the
    /// sparse encoding stays sparse.
    pub fn with_context(mut self, context: ContextMap) -> Self {
        self.context = if context.is_empty() {
            None
        } else {
            Some(context)
        };
        self
    }

    pub fn with_exception(mut self, exception: ExceptionInfo) -> Self {
        self.exception = Some(exception);
        self
    }

    /// Local wall-clock timestamp as printed by the human-readable sinks.
    pub fn local_time(&self) -> String {
        self.ts
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }

    /// `ts | LEVEL    | [MODULE] | request_id | message` — the console form.
    pub fn format_simple(&self) -> String {
        format!(
            "{} | {:<8} | [{}] | {} | {}",
            self.local_time(),
            self.level,
            self.module,
            self.request_id,
            self.msg
        )
    }

    /// Console form plus `file:line` provenance — the rotating-file form.
    pub fn format_detailed(&self) -> String {
        format!(
            "{} | {:<8} | [{}] | {} | {}:{} | {}",
            self.local_time(),
            self.level,
            self.module,
            self.request_id,
            self.file,
            self.line,
            self.msg
        )
    }
}

fn unix_seconds(ts: DateTime<Utc>) -> f64 {
    ts.timestamp() as f64 + f64::from(ts.timestamp_subsec_micros()) * 1e-6
}

/// Fixed-width UTC timestamp codec (`2024-01-15T10:30:00.000Z`).
///
/// Millisecond precision is constant-width, so encoded timestamps compare
/// lexicographically in time order across records.
pub(crate) mod iso_ts {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&ts.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        // Accept any fractional precision on the way back in.
        let parsed = NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.fZ")
            .or_else(|_| NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%SZ"))
            .map_err(serde::de::Error::custom)?;
        Ok(DateTime::from_naive_utc_and_offset(parsed, Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(level: LogLevel) -> LogRecord {
        LogRecord::new(
            level,
            "BACKEND",
            "req-1".to_string(),
            "orders",
            callsite!(),
            "created order".to_string(),
        )
    }

    #[test]
    fn level_ordering_matches_severity() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Critical);
        assert!(LogLevel::Critical.is_error());
        assert!(!LogLevel::Warning.is_error());
    }

    #[test]
    fn level_parse_is_case_insensitive_and_accepts_warn() {
        assert_eq!(LogLevel::parse("error"), Some(LogLevel::Error));
        assert_eq!(LogLevel::parse("Warning"), Some(LogLevel::Warning));
        assert_eq!(LogLevel::parse("warn"), Some(LogLevel::Warning));
        assert_eq!(LogLevel::parse("nope"), None);
        assert_eq!("critical".parse::<LogLevel>(), Ok(LogLevel::Critical));
    }

    #[test]
    fn sparse_encoding_omits_unset_fields() {
        let json = serde_json::to_string(&sample(LogLevel::Info)).unwrap();
        assert!(!json.contains("span_id"));
        assert!(!json.contains("context"));
        assert!(!json.contains("exception"));
        assert!(!json.contains("null"));
        assert!(json.contains("\"level\":\"INFO\""));
        assert!(json.contains("\"request_id\":\"req-1\""));
    }

    #[test]
    fn timestamp_is_fixed_width_utc() {
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&sample(LogLevel::Info)).unwrap()).unwrap();
        let ts = json["ts"].as_str().unwrap();
        assert_eq!(ts.len(), "2024-01-15T10:30:00.000Z".len());
        assert!(ts.ends_with('Z'));
        assert_eq!(&ts[10..11], "T");
    }

    #[test]
    fn record_roundtrips_through_json() {
        let rec = sample(LogLevel::Error)
            .with_span("abc12345", "db_write")
            .with_duration_ms(12.5);
        let back: LogRecord =
            serde_json::from_str(&serde_json::to_string(&rec).unwrap()).unwrap();
        assert_eq!(back.level, LogLevel::Error);
        assert_eq!(back.span_id.as_deref(), Some("abc12345"));
        assert_eq!(back.duration_ms, Some(12.5));
        assert_eq!(back.ts.timestamp(), rec.ts.timestamp());
    }

    #[test]
    fn empty_context_stays_absent() {
        let rec = sample(LogLevel::Info).with_context(ContextMap::new());
        assert!(rec.context.is_none());
    }

    #[test]
    fn simple_and_detailed_formats() {
        let rec = sample(LogLevel::Warning);
        let simple = rec.format_simple();
        assert!(simple.contains("| WARNING  |"));
        assert!(simple.contains("| [BACKEND] |"));
        assert!(simple.contains("| req-1 |"));
        assert!(simple.ends_with("created order"));

        let detailed = rec.format_detailed();
        assert!(detailed.contains("record.rs:"));
    }

    #[test]
    fn callsite_captures_basename_and_module() {
        let site = callsite!();
        assert_eq!(site.file_name(), "record.rs");
        assert!(site.func.contains("record"));
    }
}

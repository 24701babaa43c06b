//! Structured logging with request context.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use edge_core::RequestId;
use serde::{Deserialize, Serialize};

/// Log level for structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trace => write!(f, "TRACE"),
            Self::Debug => write!(f, "DEBUG"),
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// A structured log entry.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Request ID for correlation. Absent for process-level entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Matched route.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    /// Additional structured fields.
    #[serde(flatten)]
    pub fields: HashMap<String, serde_json::Value>,
    /// Microseconds since the logger was created.
    pub elapsed_us: u64,
}

impl LogEntry {
    /// Format as JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.message.clone())
    }

    /// Format as human-readable string.
    pub fn to_human(&self) -> String {
        let mut s = format!("[{}]", self.level);
        if let Some(id) = &self.request_id {
            s.push_str(&format!(" {id}"));
        }
        if let Some(route) = &self.route {
            s.push_str(&format!(" {route}"));
        }
        s.push_str(&format!(" {} ({}us)", self.message, self.elapsed_us));

        if !self.fields.is_empty() {
            let mut fields: Vec<String> = self
                .fields
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            fields.sort();
            s.push_str(" | ");
            s.push_str(&fields.join(" "));
        }

        s
    }

    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }
}

/// Output format for logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format (for production/log aggregation).
    #[default]
    Json,
    /// Human-readable format (for development).
    Human,
}

/// Destination for formatted entries.
pub trait LogSink: Send + Sync {
    fn write(&self, entry: &LogEntry, rendered: &str);
}

/// Emits every entry as a `tracing` event at the matching level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, entry: &LogEntry, rendered: &str) {
        match entry.level {
            LogLevel::Trace => tracing::trace!(target: "edge", "{rendered}"),
            LogLevel::Debug => tracing::debug!(target: "edge", "{rendered}"),
            LogLevel::Info => tracing::info!(target: "edge", "{rendered}"),
            LogLevel::Warn => tracing::warn!(target: "edge", "{rendered}"),
            LogLevel::Error => tracing::error!(target: "edge", "{rendered}"),
        }
    }
}

/// Keeps entries in memory, for local debugging and assertions.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Entries whose message contains `needle`.
    pub fn find(&self, needle: &str) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.message.contains(needle))
            .collect()
    }
}

impl LogSink for MemorySink {
    fn write(&self, entry: &LogEntry, _rendered: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());
    }
}

/// Structured logger.
///
/// One process-level logger is built at startup and injected into the
/// server. [`StructuredLogger::for_request`] derives the per-request child
/// that carries the request id; the route is attached once known.
#[derive(Clone)]
pub struct StructuredLogger {
    request_id: Option<RequestId>,
    route: Option<String>,
    start_time: Instant,
    min_level: LogLevel,
    format: LogFormat,
    sink: Arc<dyn LogSink>,
}

impl Default for StructuredLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StructuredLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructuredLogger")
            .field("request_id", &self.request_id)
            .field("route", &self.route)
            .field("min_level", &self.min_level)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl StructuredLogger {
    /// Process-level logger writing to `tracing` at info level and above.
    pub fn new() -> Self {
        Self {
            request_id: None,
            route: None,
            start_time: Instant::now(),
            min_level: LogLevel::Info,
            format: LogFormat::Json,
            sink: Arc::new(TracingSink),
        }
    }

    /// Set minimum log level.
    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Set output format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Child logger for one request. Elapsed time restarts at zero.
    pub fn for_request(&self, request_id: &RequestId) -> Self {
        Self {
            request_id: Some(request_id.clone()),
            route: None,
            start_time: Instant::now(),
            ..self.clone()
        }
    }

    /// Set the route path.
    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    pub fn trace(&self, message: &str) {
        self.log(LogLevel::Trace, message, HashMap::new());
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message, HashMap::new());
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message, HashMap::new());
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message, HashMap::new());
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message, HashMap::new());
    }

    /// Log at error level with fields.
    pub fn error_with(&self, message: &str, fields: &[(&str, &dyn fmt::Display)]) {
        let fields = fields
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::json!(v.to_string())))
            .collect();
        self.log(LogLevel::Error, message, fields);
    }

    fn log(&self, level: LogLevel, message: &str, fields: HashMap<String, serde_json::Value>) {
        if !self.enabled(level) {
            return;
        }

        let entry = LogEntry {
            level,
            message: message.to_string(),
            request_id: self.request_id.as_ref().map(ToString::to_string),
            route: self.route.clone(),
            fields,
            elapsed_us: self.elapsed_us(),
        };

        let rendered = match self.format {
            LogFormat::Json => entry.to_json(),
            LogFormat::Human => entry.to_human(),
        };
        self.sink.write(&entry, &rendered);
    }

    /// Get elapsed time since logger creation.
    pub fn elapsed_us(&self) -> u64 {
        self.start_time.elapsed().as_micros() as u64
    }
}

/// Builder for log entries with fluent API.
pub struct LogBuilder<'a> {
    logger: &'a StructuredLogger,
    level: LogLevel,
    message: String,
    fields: HashMap<String, serde_json::Value>,
}

impl<'a> LogBuilder<'a> {
    pub fn new(logger: &'a StructuredLogger, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            logger,
            level,
            message: message.into(),
            fields: HashMap::new(),
        }
    }

    /// Add a string field.
    pub fn field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields
            .insert(key.to_string(), serde_json::json!(value.into()));
        self
    }

    /// Add an integer field.
    pub fn field_i64(mut self, key: &str, value: i64) -> Self {
        self.fields.insert(key.to_string(), serde_json::json!(value));
        self
    }

    pub fn field_bool(mut self, key: &str, value: bool) -> Self {
        self.fields.insert(key.to_string(), serde_json::json!(value));
        self
    }

    /// Add a duration field (in milliseconds).
    pub fn duration_ms(mut self, key: &str, duration: Duration) -> Self {
        self.fields
            .insert(key.to_string(), serde_json::json!(duration.as_millis() as u64));
        self
    }

    /// Emit the log entry.
    pub fn emit(self) {
        self.logger.log(self.level, &self.message, self.fields);
    }
}

impl StructuredLogger {
    pub fn info_builder(&self, message: impl Into<String>) -> LogBuilder<'_> {
        LogBuilder::new(self, LogLevel::Info, message)
    }

    pub fn warn_builder(&self, message: impl Into<String>) -> LogBuilder<'_> {
        LogBuilder::new(self, LogLevel::Warn, message)
    }

    pub fn error_builder(&self, message: impl Into<String>) -> LogBuilder<'_> {
        LogBuilder::new(self, LogLevel::Error, message)
    }

    pub fn debug_builder(&self, message: impl Into<String>) -> LogBuilder<'_> {
        LogBuilder::new(self, LogLevel::Debug, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(level: LogLevel) -> (StructuredLogger, Arc<MemorySink>) {
        let sink = MemorySink::new();
        let logger = StructuredLogger::new()
            .with_min_level(level)
            .with_sink(sink.clone());
        (logger, sink)
    }

    #[test]
    fn test_min_level_filters() {
        let (logger, sink) = capture(LogLevel::Info);
        logger.debug("hidden");
        logger.info("shown");
        logger.error("also shown");
        let messages: Vec<String> = sink.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["shown", "also shown"]);
    }

    #[test]
    fn test_child_carries_request_context() {
        let (logger, sink) = capture(LogLevel::Debug);
        let id = RequestId::from_string("req-1");
        let child = logger.for_request(&id).with_route("/_next/static/:path*");
        child.debug("route matched");
        logger.info("process level");

        let entries = sink.entries();
        assert_eq!(entries[0].request_id.as_deref(), Some("req-1"));
        assert_eq!(entries[0].route.as_deref(), Some("/_next/static/:path*"));
        assert!(entries[1].request_id.is_none());
        assert_eq!(child.request_id(), Some(&id));
    }

    #[test]
    fn test_builder_fields() {
        let (logger, sink) = capture(LogLevel::Info);
        logger
            .info_builder("request complete")
            .field("method", "GET")
            .field_i64("status", 200)
            .field_bool("compressed", false)
            .duration_ms("duration_ms", Duration::from_millis(12))
            .emit();

        let entry = &sink.find("complete")[0];
        assert_eq!(entry.field("method"), Some(&serde_json::json!("GET")));
        assert_eq!(entry.field("status"), Some(&serde_json::json!(200)));
        assert_eq!(entry.field("duration_ms"), Some(&serde_json::json!(12)));
    }

    #[test]
    fn test_json_flattens_fields() {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), serde_json::json!(404));
        let entry = LogEntry {
            level: LogLevel::Warn,
            message: "not found".into(),
            request_id: Some("r".into()),
            route: None,
            fields,
            elapsed_us: 5,
        };
        let json: serde_json::Value = serde_json::from_str(&entry.to_json()).unwrap();
        assert_eq!(json["level"], "warn");
        assert_eq!(json["status"], 404);
        assert!(json.get("route").is_none());
    }

    #[test]
    fn test_human_format() {
        let entry = LogEntry {
            level: LogLevel::Error,
            message: "boom".into(),
            request_id: Some("r1".into()),
            route: Some("/api".into()),
            fields: HashMap::new(),
            elapsed_us: 7,
        };
        assert_eq!(entry.to_human(), "[ERROR] r1 /api boom (7us)");
    }

    #[test]
    fn test_error_with_display_fields() {
        let (logger, sink) = capture(LogLevel::Info);
        logger.error_with("render failed", &[("error", &"timeout")]);
        assert_eq!(
            sink.entries()[0].field("error"),
            Some(&serde_json::json!("timeout"))
        );
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("WARN".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert!("loud".parse::<LogLevel>().is_err());
    }
}

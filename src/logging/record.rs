//! Log record model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::correlation::CorrelationContext;

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    #[serde(alias = "WARNING")]
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub service_name: String,
    pub trace_id: String,
    pub user_id: String,
    pub route: String,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub structured_fields: BTreeMap<String, String>,
}

impl LogRecord {
    /// Start a record for the request described by `ctx`.
    pub fn new(
        service_name: impl Into<String>,
        ctx: &CorrelationContext,
        route: impl Into<String>,
        level: LogLevel,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            service_name: service_name.into(),
            trace_id: ctx.trace_id().to_string(),
            user_id: ctx.user_id().to_string(),
            route: route.into(),
            level,
            message: message.into(),
            duration_ms: None,
            structured_fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.structured_fields.insert(key.into(), value.to_string());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.structured_fields.get(key).map(String::as_str)
    }

    /// Message followed by ` key=value` for every structured field.
    ///
    /// This is the text the classifier matches against.
    pub fn full_message(&self) -> String {
        let mut out = self.message.clone();
        for (key, value) in &self.structured_fields {
            out.push(' ');
            out.push_str(key);
            out.push('=');
            out.push_str(value);
        }
        out
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] [trace={}] [user={}] [route={}]",
            self.timestamp.to_rfc3339(),
            self.level,
            self.trace_id,
            self.user_id,
            self.route
        )?;
        if let Some(ms) = self.duration_ms {
            write!(f, " [duration_ms={ms:.2}]")?;
        }
        write!(f, " {}", self.full_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> CorrelationContext {
        CorrelationContext::from_parts(Some("trace-1"), Some("alice"))
    }

    #[test]
    fn test_full_message_appends_fields_in_key_order() {
        let record = LogRecord::new("payment", &ctx(), "/charge", LogLevel::Warn, "payment rejected")
            .with_field("order_id", "o-1")
            .with_field("error_type", "InvalidAmount")
            .with_field("event", "payment_validation");

        assert_eq!(
            record.full_message(),
            "payment rejected error_type=InvalidAmount event=payment_validation order_id=o-1"
        );
    }

    #[test]
    fn test_json_shape() {
        let record = LogRecord::new("auth", &ctx(), "/login", LogLevel::Info, "login success")
            .with_duration_ms(1.5);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["level"], "INFO");
        assert_eq!(json["trace_id"], "trace-1");
        assert_eq!(json["user_id"], "alice");
        assert_eq!(json["duration_ms"], 1.5);
        assert!(json.get("structured_fields").is_none());

        let back: LogRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_display_line() {
        let record = LogRecord::new("order", &ctx(), "/create", LogLevel::Info, "Created order")
            .with_duration_ms(12.345);
        let line = record.to_string();
        assert!(line.contains("[INFO] [trace=trace-1] [user=alice] [route=/create] [duration_ms=12.35] Created order"));
    }

    #[test]
    fn test_warning_alias() {
        let level: LogLevel = serde_json::from_str("\"WARNING\"").unwrap();
        assert_eq!(level, LogLevel::Warn);
    }
}

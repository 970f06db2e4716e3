use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::logsink::LogLevel;

/// # Logrecord
///
/// One log entry as written to a log file: a single JSON object per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Logrecord {
    /// RFC 3339 / RFC 9557 compatible UTC timestamp with millisecond precision.
    pub rfc9557: String,
    /// Numeric severity (0 = Silly ... 6 = Fatal).
    pub loglevel: i64,
    /// The application that produced the entry.
    pub app: String,
    /// The message text.
    pub message: String,
    /// Flexible JSON value for arbitrary tags or additional metadata.
    pub tags: Value,
}

impl Logrecord {
    /// Builds a record stamped with the current time.
    pub fn new(app: &str, level: LogLevel, message: &str, tags: Option<Value>) -> Self {
        Self {
            rfc9557: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            loglevel: level.as_i64(),
            app: app.to_string(),
            message: message.to_string(),
            tags: tags.unwrap_or_else(|| serde_json::json!([])),
        }
    }

    /// Whether the record carries any extras.
    pub fn has_tags(&self) -> bool {
        self.tags != serde_json::json!([])
    }
}

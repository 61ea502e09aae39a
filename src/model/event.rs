use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of an operational event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EventType::Info => "INFO",
            EventType::Success => "SUCCESS",
            EventType::Warning => "WARNING",
            EventType::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// One entry of the event log, as served by `GET /api/logs` and written to the audit file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Millisecond timestamp, strictly increasing within a process.
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: EventType,
    pub message: String,
    pub store_id: Option<String>,
}

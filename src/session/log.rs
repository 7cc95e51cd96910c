//! Structured log entries derived from session traffic

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    Info,
    Error,
    Command,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: LogType,
    pub content: String,
    pub session_id: String,
}

impl LogEntry {
    pub fn new(session_id: impl Into<String>, kind: LogType, content: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            content: content.into(),
            session_id: session_id.into(),
        }
    }

    /// One entry per non-blank line of `data`. Carriage returns are removed.
    pub fn split(session_id: &str, kind: LogType, data: &str) -> Vec<LogEntry> {
        data.split('\n')
            .map(|line| line.replace('\r', ""))
            .filter(|line| !line.trim().is_empty())
            .map(|line| LogEntry::new(session_id, kind, line))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_skips_blank_lines() {
        let entries = LogEntry::split("s1", LogType::Info, "total 0\r\n\r\n  \nfoo.txt\r\n");
        let contents: Vec<&str> = entries.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["total 0", "foo.txt"]);
        assert!(entries.iter().all(|e| e.kind == LogType::Info && e.session_id == "s1"));
    }

    #[test]
    fn test_split_empty_data() {
        assert!(LogEntry::split("s1", LogType::Info, "\r\n").is_empty());
    }

    #[test]
    fn test_wire_shape() {
        let entry = LogEntry::new("s1", LogType::Command, "ls");
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "command");
        assert_eq!(value["sessionId"], "s1");
    }
}

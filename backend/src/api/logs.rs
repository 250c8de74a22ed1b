//! Import log and progress streaming via Server-Sent Events (SSE).
//!
//! Every import step writes to a process-wide broadcast channel. Entries are
//! echoed to stdout for the CLI and fanned out to `/api/logs` subscribers.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Log level for operator display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
    Progress,
}

/// Progress counters attached to [`LogLevel::Progress`] entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressInfo {
    pub current: usize,
    pub total: usize,
}

/// A single log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Nesting depth (class -> student)
    #[serde(default)]
    pub indent: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<ProgressInfo>,
}

impl LogEntry {
    fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            indent: 0,
            progress: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    pub fn progress(current: usize, total: usize, status: impl Into<String>) -> Self {
        Self {
            progress: Some(ProgressInfo { current, total }),
            ..Self::new(LogLevel::Progress, status)
        }
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }
}

/// Global log broadcaster
pub static LOG_BROADCASTER: Lazy<LogBroadcaster> = Lazy::new(LogBroadcaster::new);

/// Broadcasts log entries to all connected SSE clients
pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEntry>,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    /// Print an entry and send it to all subscribers
    pub fn log(&self, entry: LogEntry) {
        let prefix = match entry.level {
            LogLevel::Info => "   ",
            LogLevel::Success => "   ✓",
            LogLevel::Warning => "   ⚠️",
            LogLevel::Error => "   ❌",
            LogLevel::Progress => "   ⏳",
        };
        let indent = "   ".repeat(entry.indent as usize);
        match entry.progress {
            Some(p) => println!("{}{} [{}/{}] {}", indent, prefix, p.current, p.total, entry.message),
            None => println!("{}{} {}", indent, prefix, entry.message),
        }

        // No receivers is fine
        let _ = self.sender.send(entry);
    }

    /// Get a receiver for SSE streaming
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

pub fn log_info(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::info(msg));
}

pub fn log_success(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::success(msg));
}

pub fn log_warning(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::warning(msg));
}

pub fn log_error(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::error(msg));
}

pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    LOG_BROADCASTER.log(LogEntry::info(msg).with_indent(indent));
}

pub fn log_warning_indent(msg: impl Into<String>, indent: u8) {
    LOG_BROADCASTER.log(LogEntry::warning(msg).with_indent(indent));
}

pub fn log_progress(current: usize, total: usize, status: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::progress(current, total, status));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_entry_serializes_counters() {
        let entry = LogEntry::progress(3, 10, "Creating students");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["level"], "progress");
        assert_eq!(json["progress"]["current"], 3);
        assert_eq!(json["progress"]["total"], 10);
    }

    #[test]
    fn test_plain_entry_omits_progress() {
        let json = serde_json::to_value(LogEntry::warning("x").with_indent(1)).unwrap();
        assert_eq!(json["indent"], 1);
        assert!(json.get("progress").is_none());
    }

    #[tokio::test]
    async fn test_subscribers_receive_entries() {
        let broadcaster = LogBroadcaster::new();
        let mut rx = broadcaster.subscribe();
        broadcaster.log(LogEntry::success("Class ready"));
        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.level, LogLevel::Success);
        assert_eq!(entry.message, "Class ready");
    }
}

//! Log sink - where human-readable link status goes
//!
//! The link reports every lifecycle event as a `(Severity, message)` pair.
//! Sinks must return quickly and never block the caller.

use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity tag attached to each log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Benign lifecycle events
    Info,
    /// Failures
    Error,
    /// Keepalive traffic
    Debug,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "INFO",
            Severity::Error => "ERROR",
            Severity::Debug => "DEBUG",
        };
        f.write_str(s)
    }
}

/// Receiver of status lines
pub trait LogSink: Send + Sync {
    fn log(&self, severity: Severity, message: &str);
}

impl<F> LogSink for F
where
    F: Fn(Severity, &str) + Send + Sync,
{
    fn log(&self, severity: Severity, message: &str) {
        self(severity, message)
    }
}

/// Forwards status lines to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => tracing::info!(target: "robolink::link", "{}", message),
            Severity::Error => tracing::error!(target: "robolink::link", "{}", message),
            Severity::Debug => tracing::debug!(target: "robolink::link", "{}", message),
        }
    }
}

/// One recorded status line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub severity: Severity,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Keeps every status line in memory, oldest first
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    /// Number of recorded entries
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Messages logged with `severity`
    pub fn messages(&self, severity: Severity) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|e| e.severity == severity)
            .map(|e| e.message.clone())
            .collect()
    }

    /// True if any entry contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lock().iter().any(|e| e.message.contains(needle))
    }

    /// Count of entries containing `needle`
    pub fn count_matching(&self, needle: &str) -> usize {
        self.lock().iter().filter(|e| e.message.contains(needle)).count()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogEntry>> {
        // A panic while holding the lock leaves the Vec intact
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LogSink for MemorySink {
    fn log(&self, severity: Severity, message: &str) {
        self.lock().push(LogEntry {
            severity,
            message: message.to_string(),
            at: Utc::now(),
        });
    }
}

//! Broadcast hub for execution log events
//!
//! Fan-out channel between the engine and realtime subscribers. Entries
//! emitted during a run carry the run id and are totally ordered per run;
//! if no subscriber is connected, entries are dropped silently.

use tokio::sync::broadcast;
use uuid::Uuid;

use splice_domain::{LogEntry, LogLevel};

/// Capacity for the broadcast channel
const CHANNEL_CAPACITY: usize = 256;

/// Hub for broadcasting log entries to connected subscribers
pub struct LogHub {
    sender: broadcast::Sender<LogEntry>,
}

impl Default for LogHub {
    fn default() -> Self {
        Self::new()
    }
}

impl LogHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Subscribe to all log entries emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }

    /// Emit a log entry, mirroring it onto the tracing output
    pub fn emit(&self, level: LogLevel, message: impl Into<String>, run_id: Option<Uuid>) {
        let entry = LogEntry::new(level, message, run_id);
        match level {
            LogLevel::Debug => tracing::debug!(run_id = ?run_id, "{}", entry.message),
            LogLevel::Info => tracing::info!(run_id = ?run_id, "{}", entry.message),
            LogLevel::Warn => tracing::warn!(run_id = ?run_id, "{}", entry.message),
            LogLevel::Error => tracing::error!(run_id = ?run_id, "{}", entry.message),
        }
        // Ignore send errors (no receivers)
        let _ = self.sender.send(entry);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

//! Event types for assistant activity streaming
//!
//! Events carry user-visible progress for one orchestration run:
//! - System narration (plan size, per-task lines, elapsed time)
//! - Errors surfaced to the user
//! - Debug counters (token usage, context length, generated queries)
//! - Formatted results
//! - A final completion marker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What an event reports
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    System,
    Error,
    Debug,
    Result,
    Completed,
}

impl EventKind {
    /// Channel name used by socket-style consumers
    ///
    /// Errors travel on the system channel.
    pub fn channel_name(&self) -> &'static str {
        match self {
            EventKind::System | EventKind::Error => "systemmessage",
            EventKind::Debug => "debugmessage",
            EventKind::Result => "resultmessage",
            EventKind::Completed => "completedmessage",
        }
    }
}

/// One user-visible event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Create an event stamped with the current time
    pub fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Message as shown on the wire, errors carry an `Error: ` prefix
    pub fn wire_message(&self) -> String {
        match self.kind {
            EventKind::Error => format!("Error: {}", self.message),
            _ => self.message.clone(),
        }
    }

    /// `{channel, message, timestamp}` for line-oriented JSON consumers
    pub fn to_wire_json(&self) -> serde_json::Value {
        serde_json::json!({
            "channel": self.kind.channel_name(),
            "kind": self.kind,
            "message": self.wire_message(),
            "timestamp": self.timestamp,
        })
    }
}

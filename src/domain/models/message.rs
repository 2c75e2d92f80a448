use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Queue tier. `Deferred` is engine-assigned after a transient send failure
/// and is never a valid enqueue priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
    Deferred,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
            Priority::Deferred => "deferred",
        }
    }

    pub fn from_str(value: &str) -> Option<Priority> {
        match value {
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            "deferred" => Some(Priority::Deferred),
            _ => None,
        }
    }

    /// Parse an enqueue priority label. Rejects "deferred".
    pub fn from_label(label: &str) -> Option<Priority> {
        match Priority::from_str(label) {
            Some(Priority::Deferred) | None => None,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedMessage {
    pub id: Uuid,
    pub to_address: String,
    pub from_address: String,
    pub subject: String,
    pub body: String,
    pub html_body: Option<String>,
    pub priority: Priority,
    pub ready_to_send: bool,
    pub created_at: DateTime<Utc>,
}

pub struct NewQueuedMessage {
    pub to_address: String,
    pub from_address: String,
    pub subject: String,
    pub body: String,
    pub html_body: Option<String>,
    pub priority: Priority,
}

#[derive(Debug, Clone)]
pub struct MailAttachment {
    pub id: Uuid,
    pub message_id: Uuid,
    pub filename: String,
    pub content: Vec<u8>,
    pub mimetype: Option<String>,
}

pub struct NewAttachment {
    pub filename: String,
    pub content: Vec<u8>,
    pub mimetype: Option<String>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::{MailAttachment, Priority, QueuedMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryResult {
    Success,
    Suppressed,
    Failure,
}

impl DeliveryResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryResult::Success => "success",
            DeliveryResult::Suppressed => "suppressed",
            DeliveryResult::Failure => "failure",
        }
    }

    pub fn from_str(value: &str) -> Option<DeliveryResult> {
        match value {
            "success" => Some(DeliveryResult::Success),
            "suppressed" => Some(DeliveryResult::Suppressed),
            "failure" => Some(DeliveryResult::Failure),
            _ => None,
        }
    }
}

/// Immutable snapshot of a dispatch decision. One entry is appended per
/// terminal outcome and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct DeliveryLogEntry {
    pub id: Uuid,
    pub to_address: String,
    pub from_address: String,
    pub subject: String,
    pub body: String,
    pub html_body: Option<String>,
    pub priority: Priority,
    pub queued_at: DateTime<Utc>,
    pub attempted_at: DateTime<Utc>,
    pub result: DeliveryResult,
    pub detail: Option<String>,
}

pub struct NewDeliveryLogEntry {
    pub to_address: String,
    pub from_address: String,
    pub subject: String,
    pub body: String,
    pub html_body: Option<String>,
    pub priority: Priority,
    pub queued_at: DateTime<Utc>,
    pub result: DeliveryResult,
    pub detail: Option<String>,
}

impl NewDeliveryLogEntry {
    /// Snapshot a queue entry for the audit log. Attachment filenames are
    /// appended to the body so the log stays meaningful after the blobs are
    /// deleted along with the queue row.
    pub fn snapshot(
        message: &QueuedMessage,
        attachments: &[MailAttachment],
        result: DeliveryResult,
        detail: Option<String>,
    ) -> Self {
        let body = if attachments.is_empty() {
            message.body.clone()
        } else {
            let filenames = attachments
                .iter()
                .map(|a| a.filename.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            format!("{}\n\nAttachments:\n{}", message.body, filenames)
        };

        Self {
            to_address: message.to_address.clone(),
            from_address: message.from_address.clone(),
            subject: message.subject.clone(),
            body,
            html_body: message.html_body.clone(),
            priority: message.priority,
            queued_at: message.created_at,
            result,
            detail,
        }
    }
}

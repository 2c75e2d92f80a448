use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::models::{
    DeliveryLogEntry, MailAttachment, NewAttachment, NewDeliveryLogEntry, NewQueuedMessage,
    Priority, QueuedMessage, SuppressionEntry,
};

/// Persistence port for the outbound queue. The scheduler re-queries live
/// state through these methods before every yield decision, so none of them
/// may cache results across calls.
#[async_trait]
pub trait MessageQueueRepository: Send + Sync {
    /// Insert a new queue row with `ready_to_send = false`.
    async fn insert(&self, message: NewQueuedMessage) -> anyhow::Result<QueuedMessage>;

    async fn add_attachment(
        &self,
        message_id: Uuid,
        attachment: NewAttachment,
    ) -> anyhow::Result<()>;

    /// Flip a row to `ready_to_send = true` once its attachments are persisted.
    async fn mark_ready(&self, message_id: Uuid) -> anyhow::Result<()>;

    async fn attachments(&self, message_id: Uuid) -> anyhow::Result<Vec<MailAttachment>>;

    /// Total row count, ready or not. Drives the service loop's empty check.
    async fn count_all(&self) -> anyhow::Result<u64>;

    /// Ready rows outside the Deferred tier. Zero terminates a pass.
    async fn count_ready_non_deferred(&self) -> anyhow::Result<u64>;

    /// All ready rows in the given tier, oldest first.
    async fn ready_in_priority(&self, priority: Priority) -> anyhow::Result<Vec<QueuedMessage>>;

    /// The single oldest ready row in the given tier.
    async fn oldest_ready(&self, priority: Priority) -> anyhow::Result<Option<QueuedMessage>>;

    async fn set_priority(&self, message_id: Uuid, priority: Priority) -> anyhow::Result<()>;

    async fn delete(&self, message_id: Uuid) -> anyhow::Result<()>;
}

#[async_trait]
pub trait SuppressionListRepository: Send + Sync {
    /// Exact-match membership check.
    async fn contains(&self, address: &str) -> anyhow::Result<bool>;

    async fn add(&self, address: &str) -> anyhow::Result<SuppressionEntry>;
}

#[async_trait]
pub trait DeliveryLogRepository: Send + Sync {
    async fn append(&self, entry: NewDeliveryLogEntry) -> anyhow::Result<DeliveryLogEntry>;

    /// Most recent entries, newest first.
    async fn recent(&self, limit: u32) -> anyhow::Result<Vec<DeliveryLogEntry>>;
}

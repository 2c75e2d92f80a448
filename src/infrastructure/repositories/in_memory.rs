use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    models::{
        DeliveryLogEntry, MailAttachment, NewAttachment, NewDeliveryLogEntry, NewQueuedMessage,
        Priority, QueuedMessage, SuppressionEntry,
    },
    repositories::{DeliveryLogRepository, MessageQueueRepository, SuppressionListRepository},
};

#[derive(Default)]
pub struct InMemoryMessageQueueRepository {
    messages: Arc<RwLock<HashMap<Uuid, QueuedMessage>>>,
    attachments: Arc<RwLock<HashMap<Uuid, Vec<MailAttachment>>>>,
}

impl InMemoryMessageQueueRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, message_id: Uuid) -> Option<QueuedMessage> {
        let messages = self.messages.read().await;
        messages.get(&message_id).cloned()
    }
}

#[async_trait]
impl MessageQueueRepository for InMemoryMessageQueueRepository {
    async fn insert(&self, message: NewQueuedMessage) -> anyhow::Result<QueuedMessage> {
        let entry = QueuedMessage {
            id: Uuid::new_v4(),
            to_address: message.to_address,
            from_address: message.from_address,
            subject: message.subject,
            body: message.body,
            html_body: message.html_body,
            priority: message.priority,
            ready_to_send: false,
            created_at: Utc::now(),
        };
        let mut messages = self.messages.write().await;
        messages.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn add_attachment(
        &self,
        message_id: Uuid,
        attachment: NewAttachment,
    ) -> anyhow::Result<()> {
        let mut attachments = self.attachments.write().await;
        attachments
            .entry(message_id)
            .or_default()
            .push(MailAttachment {
                id: Uuid::new_v4(),
                message_id,
                filename: attachment.filename,
                content: attachment.content,
                mimetype: attachment.mimetype,
            });
        Ok(())
    }

    async fn mark_ready(&self, message_id: Uuid) -> anyhow::Result<()> {
        let mut messages = self.messages.write().await;
        if let Some(entry) = messages.get_mut(&message_id) {
            entry.ready_to_send = true;
        }
        Ok(())
    }

    async fn attachments(&self, message_id: Uuid) -> anyhow::Result<Vec<MailAttachment>> {
        let attachments = self.attachments.read().await;
        Ok(attachments.get(&message_id).cloned().unwrap_or_default())
    }

    async fn count_all(&self) -> anyhow::Result<u64> {
        let messages = self.messages.read().await;
        Ok(messages.len() as u64)
    }

    async fn count_ready_non_deferred(&self) -> anyhow::Result<u64> {
        let messages = self.messages.read().await;
        Ok(messages
            .values()
            .filter(|m| m.ready_to_send && m.priority != Priority::Deferred)
            .count() as u64)
    }

    async fn ready_in_priority(&self, priority: Priority) -> anyhow::Result<Vec<QueuedMessage>> {
        let messages = self.messages.read().await;
        let mut ready: Vec<QueuedMessage> = messages
            .values()
            .filter(|m| m.ready_to_send && m.priority == priority)
            .cloned()
            .collect();
        ready.sort_by_key(|m| m.created_at);
        Ok(ready)
    }

    async fn oldest_ready(&self, priority: Priority) -> anyhow::Result<Option<QueuedMessage>> {
        let ready = self.ready_in_priority(priority).await?;
        Ok(ready.into_iter().next())
    }

    async fn set_priority(&self, message_id: Uuid, priority: Priority) -> anyhow::Result<()> {
        let mut messages = self.messages.write().await;
        if let Some(entry) = messages.get_mut(&message_id) {
            entry.priority = priority;
        }
        Ok(())
    }

    async fn delete(&self, message_id: Uuid) -> anyhow::Result<()> {
        let mut messages = self.messages.write().await;
        messages.remove(&message_id);
        let mut attachments = self.attachments.write().await;
        attachments.remove(&message_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySuppressionListRepository {
    entries: Arc<RwLock<HashMap<String, SuppressionEntry>>>,
}

impl InMemorySuppressionListRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SuppressionListRepository for InMemorySuppressionListRepository {
    async fn contains(&self, address: &str) -> anyhow::Result<bool> {
        let entries = self.entries.read().await;
        Ok(entries.contains_key(address))
    }

    async fn add(&self, address: &str) -> anyhow::Result<SuppressionEntry> {
        let entry = SuppressionEntry {
            address: address.to_string(),
            added_at: Utc::now(),
        };
        let mut entries = self.entries.write().await;
        entries.insert(entry.address.clone(), entry.clone());
        Ok(entry)
    }
}

#[derive(Default)]
pub struct InMemoryDeliveryLogRepository {
    entries: Arc<RwLock<Vec<DeliveryLogEntry>>>,
}

impl InMemoryDeliveryLogRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeliveryLogRepository for InMemoryDeliveryLogRepository {
    async fn append(&self, entry: NewDeliveryLogEntry) -> anyhow::Result<DeliveryLogEntry> {
        let entry = DeliveryLogEntry {
            id: Uuid::new_v4(),
            to_address: entry.to_address,
            from_address: entry.from_address,
            subject: entry.subject,
            body: entry.body,
            html_body: entry.html_body,
            priority: entry.priority,
            queued_at: entry.queued_at,
            attempted_at: Utc::now(),
            result: entry.result,
            detail: entry.detail,
        };
        let mut entries = self.entries.write().await;
        entries.push(entry.clone());
        Ok(entry)
    }

    async fn recent(&self, limit: u32) -> anyhow::Result<Vec<DeliveryLogEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.iter().rev().take(limit as usize).cloned().collect())
    }
}

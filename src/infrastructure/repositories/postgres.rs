use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Pool, Postgres, Row};
use uuid::Uuid;

use crate::domain::{
    models::{
        DeliveryLogEntry, DeliveryResult, MailAttachment, NewAttachment, NewDeliveryLogEntry,
        NewQueuedMessage, Priority, QueuedMessage, SuppressionEntry,
    },
    repositories::{DeliveryLogRepository, MessageQueueRepository, SuppressionListRepository},
};

pub type PgPool = Pool<Postgres>;

#[derive(Clone)]
pub struct PostgresMessageQueueRepository {
    pool: PgPool,
}

impl PostgresMessageQueueRepository {
    pub fn new(pool: PgPool) -> Arc<Self> {
        Arc::new(Self { pool })
    }
}

#[async_trait]
impl MessageQueueRepository for PostgresMessageQueueRepository {
    async fn insert(&self, message: NewQueuedMessage) -> anyhow::Result<QueuedMessage> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let record = sqlx::query_as::<_, QueuedMessageRecord>(
            r#"
            INSERT INTO message_queue (
                id, to_address, from_address, subject, body, html_body,
                priority, ready_to_send, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE, $8)
            RETURNING id, to_address, from_address, subject, body, html_body,
                      priority, ready_to_send, created_at
            "#,
        )
        .bind(id)
        .bind(&message.to_address)
        .bind(&message.from_address)
        .bind(&message.subject)
        .bind(&message.body)
        .bind(&message.html_body)
        .bind(priority_to_str(message.priority))
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        record.try_into()
    }

    async fn add_attachment(
        &self,
        message_id: Uuid,
        attachment: NewAttachment,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO message_attachments (id, message_id, filename, content, mimetype)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(message_id)
        .bind(&attachment.filename)
        .bind(&attachment.content)
        .bind(&attachment.mimetype)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_ready(&self, message_id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE message_queue SET ready_to_send = TRUE WHERE id = $1")
            .bind(message_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn attachments(&self, message_id: Uuid) -> anyhow::Result<Vec<MailAttachment>> {
        let rows = sqlx::query(
            r#"
            SELECT id, message_id, filename, content, mimetype
            FROM message_attachments
            WHERE message_id = $1
            ORDER BY id
            "#,
        )
        .bind(message_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(MailAttachment {
                    id: row.try_get("id")?,
                    message_id: row.try_get("message_id")?,
                    filename: row.try_get("filename")?,
                    content: row.try_get("content")?,
                    mimetype: row.try_get("mimetype")?,
                })
            })
            .collect()
    }

    async fn count_all(&self) -> anyhow::Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM message_queue")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn count_ready_non_deferred(&self) -> anyhow::Result<u64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM message_queue
            WHERE ready_to_send = TRUE
              AND priority <> 'deferred'
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn ready_in_priority(&self, priority: Priority) -> anyhow::Result<Vec<QueuedMessage>> {
        let rows = sqlx::query_as::<_, QueuedMessageRecord>(
            r#"
            SELECT id, to_address, from_address, subject, body, html_body,
                   priority, ready_to_send, created_at
            FROM message_queue
            WHERE ready_to_send = TRUE
              AND priority = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(priority_to_str(priority))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|record| record.try_into()).collect()
    }

    async fn oldest_ready(&self, priority: Priority) -> anyhow::Result<Option<QueuedMessage>> {
        let record = sqlx::query_as::<_, QueuedMessageRecord>(
            r#"
            SELECT id, to_address, from_address, subject, body, html_body,
                   priority, ready_to_send, created_at
            FROM message_queue
            WHERE ready_to_send = TRUE
              AND priority = $1
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(priority_to_str(priority))
        .fetch_optional(&self.pool)
        .await?;

        record.map(|record| record.try_into()).transpose()
    }

    async fn set_priority(&self, message_id: Uuid, priority: Priority) -> anyhow::Result<()> {
        sqlx::query("UPDATE message_queue SET priority = $2 WHERE id = $1")
            .bind(message_id)
            .bind(priority_to_str(priority))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, message_id: Uuid) -> anyhow::Result<()> {
        // Attachment rows go with the message via ON DELETE CASCADE.
        sqlx::query("DELETE FROM message_queue WHERE id = $1")
            .bind(message_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PostgresSuppressionListRepository {
    pool: PgPool,
}

impl PostgresSuppressionListRepository {
    pub fn new(pool: PgPool) -> Arc<Self> {
        Arc::new(Self { pool })
    }
}

#[async_trait]
impl SuppressionListRepository for PostgresSuppressionListRepository {
    async fn contains(&self, address: &str) -> anyhow::Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM suppression_list WHERE address = $1)")
                .bind(address)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn add(&self, address: &str) -> anyhow::Result<SuppressionEntry> {
        let now = Utc::now();
        let row = sqlx::query(
            r#"
            INSERT INTO suppression_list (address, added_at)
            VALUES ($1, $2)
            ON CONFLICT (address) DO UPDATE SET address = EXCLUDED.address
            RETURNING address, added_at
            "#,
        )
        .bind(address)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(SuppressionEntry {
            address: row.try_get("address")?,
            added_at: row.try_get("added_at")?,
        })
    }
}

#[derive(Clone)]
pub struct PostgresDeliveryLogRepository {
    pool: PgPool,
}

impl PostgresDeliveryLogRepository {
    pub fn new(pool: PgPool) -> Arc<Self> {
        Arc::new(Self { pool })
    }
}

#[async_trait]
impl DeliveryLogRepository for PostgresDeliveryLogRepository {
    async fn append(&self, entry: NewDeliveryLogEntry) -> anyhow::Result<DeliveryLogEntry> {
        let record = sqlx::query_as::<_, DeliveryLogRecord>(
            r#"
            INSERT INTO delivery_log (
                id, to_address, from_address, subject, body, html_body,
                priority, queued_at, attempted_at, result, detail
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id, to_address, from_address, subject, body, html_body,
                      priority, queued_at, attempted_at, result, detail
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&entry.to_address)
        .bind(&entry.from_address)
        .bind(&entry.subject)
        .bind(&entry.body)
        .bind(&entry.html_body)
        .bind(priority_to_str(entry.priority))
        .bind(entry.queued_at)
        .bind(Utc::now())
        .bind(result_to_str(entry.result))
        .bind(&entry.detail)
        .fetch_one(&self.pool)
        .await?;

        record.try_into()
    }

    async fn recent(&self, limit: u32) -> anyhow::Result<Vec<DeliveryLogEntry>> {
        let rows = sqlx::query_as::<_, DeliveryLogRecord>(
            r#"
            SELECT id, to_address, from_address, subject, body, html_body,
                   priority, queued_at, attempted_at, result, detail
            FROM delivery_log
            ORDER BY attempted_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|record| record.try_into()).collect()
    }
}

#[derive(FromRow)]
struct QueuedMessageRecord {
    id: Uuid,
    to_address: String,
    from_address: String,
    subject: String,
    body: String,
    html_body: Option<String>,
    priority: String,
    ready_to_send: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<QueuedMessageRecord> for QueuedMessage {
    type Error = anyhow::Error;

    fn try_from(value: QueuedMessageRecord) -> Result<Self, Self::Error> {
        let priority = str_to_priority(&value.priority)?;
        Ok(Self {
            id: value.id,
            to_address: value.to_address,
            from_address: value.from_address,
            subject: value.subject,
            body: value.body,
            html_body: value.html_body,
            priority,
            ready_to_send: value.ready_to_send,
            created_at: value.created_at,
        })
    }
}

#[derive(FromRow)]
struct DeliveryLogRecord {
    id: Uuid,
    to_address: String,
    from_address: String,
    subject: String,
    body: String,
    html_body: Option<String>,
    priority: String,
    queued_at: DateTime<Utc>,
    attempted_at: DateTime<Utc>,
    result: String,
    detail: Option<String>,
}

impl TryFrom<DeliveryLogRecord> for DeliveryLogEntry {
    type Error = anyhow::Error;

    fn try_from(value: DeliveryLogRecord) -> Result<Self, Self::Error> {
        let priority = str_to_priority(&value.priority)?;
        let result = DeliveryResult::from_str(&value.result)
            .ok_or_else(|| anyhow::anyhow!("unknown delivery result {}", value.result))?;
        Ok(Self {
            id: value.id,
            to_address: value.to_address,
            from_address: value.from_address,
            subject: value.subject,
            body: value.body,
            html_body: value.html_body,
            priority,
            queued_at: value.queued_at,
            attempted_at: value.attempted_at,
            result,
            detail: value.detail,
        })
    }
}

fn priority_to_str(priority: Priority) -> &'static str {
    priority.as_str()
}

fn str_to_priority(value: &str) -> anyhow::Result<Priority> {
    Priority::from_str(value).ok_or_else(|| anyhow::anyhow!("unknown priority {value}"))
}

fn result_to_str(result: DeliveryResult) -> &'static str {
    result.as_str()
}

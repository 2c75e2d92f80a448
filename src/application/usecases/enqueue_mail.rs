use std::sync::Arc;

use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::{NewAttachment, NewQueuedMessage, Priority};
use crate::domain::repositories::MessageQueueRepository;

pub struct EnqueueMailRequest {
    pub recipients: Vec<String>,
    pub from_address: String,
    pub subject: String,
    pub body: String,
    pub html_body: Option<String>,
    pub priority: Priority,
    pub attachments: Vec<NewAttachment>,
}

/// Puts new mail on the queue: one row per recipient, held back with
/// `ready_to_send = false` until its attachments are persisted.
pub struct EnqueueMailUseCase {
    queue: Arc<dyn MessageQueueRepository>,
}

impl EnqueueMailUseCase {
    pub fn new(queue: Arc<dyn MessageQueueRepository>) -> Self {
        Self { queue }
    }

    pub async fn execute(&self, request: EnqueueMailRequest) -> anyhow::Result<Vec<Uuid>> {
        if request.priority == Priority::Deferred {
            return Err(
                DomainError::Validation("deferred is not a valid enqueue priority".into()).into(),
            );
        }
        if request.recipients.is_empty() {
            return Err(DomainError::Validation("at least one recipient is required".into()).into());
        }

        let mut ids = Vec::with_capacity(request.recipients.len());
        for recipient in &request.recipients {
            let message = self
                .queue
                .insert(NewQueuedMessage {
                    to_address: recipient.clone(),
                    from_address: request.from_address.clone(),
                    subject: request.subject.clone(),
                    body: request.body.clone(),
                    html_body: request.html_body.clone(),
                    priority: request.priority,
                })
                .await?;

            for attachment in &request.attachments {
                self.queue
                    .add_attachment(
                        message.id,
                        NewAttachment {
                            filename: attachment.filename.clone(),
                            content: attachment.content.clone(),
                            mimetype: attachment.mimetype.clone(),
                        },
                    )
                    .await?;
            }

            self.queue.mark_ready(message.id).await?;
            ids.push(message.id);
        }

        Ok(ids)
    }
}

use std::sync::Arc;

use crate::domain::errors::DomainError;
use crate::domain::models::Priority;
use crate::domain::repositories::MessageQueueRepository;

/// Restores deferred messages to a sendable tier. Takes no dispatch lock:
/// it only flips eligibility, it does not send, so it is safe to run
/// concurrently with an active pass.
pub struct RetryDeferredUseCase {
    queue: Arc<dyn MessageQueueRepository>,
}

impl RetryDeferredUseCase {
    pub fn new(queue: Arc<dyn MessageQueueRepository>) -> Self {
        Self { queue }
    }

    pub async fn execute(&self, new_priority: Priority) -> anyhow::Result<usize> {
        if new_priority == Priority::Deferred {
            return Err(
                DomainError::Validation("deferred is not a valid retry priority".into()).into(),
            );
        }

        let deferred = self.queue.ready_in_priority(Priority::Deferred).await?;
        let mut count = 0;
        for message in deferred {
            self.queue.set_priority(message.id, new_priority).await?;
            count += 1;
        }
        Ok(count)
    }
}

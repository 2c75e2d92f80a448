use std::collections::VecDeque;
use std::sync::Arc;

use crate::domain::models::{Priority, QueuedMessage};
use crate::domain::repositories::MessageQueueRepository;

/// Yields ready messages in the order they should be sent: High before
/// Medium before Low, oldest first within a tier. Deferred rows are never
/// yielded.
///
/// Tier occupancy is re-evaluated from the store before every yield decision
/// rather than snapshotted once, so High mail arriving mid-pass preempts the
/// Medium/Low drain. The High tier is drained in fetched batches while
/// Medium and Low re-check after every single message; consumers rely on
/// that asymmetry, so keep it.
pub struct PriorityScheduler {
    queue: Arc<dyn MessageQueueRepository>,
    high_batch: VecDeque<QueuedMessage>,
}

impl PriorityScheduler {
    pub fn new(queue: Arc<dyn MessageQueueRepository>) -> Self {
        Self {
            queue,
            high_batch: VecDeque::new(),
        }
    }

    /// The next message to offer, or `None` once no ready non-deferred row
    /// remains. The consumer is expected to delete or defer each yielded
    /// message before asking for the next one.
    pub async fn next_message(&mut self) -> anyhow::Result<Option<QueuedMessage>> {
        loop {
            if let Some(message) = self.high_batch.pop_front() {
                return Ok(Some(message));
            }

            let high = self.queue.ready_in_priority(Priority::High).await?;
            if !high.is_empty() {
                self.high_batch = high.into();
                continue;
            }

            if let Some(message) = self.queue.oldest_ready(Priority::Medium).await? {
                return Ok(Some(message));
            }

            if let Some(message) = self.queue.oldest_ready(Priority::Low).await? {
                return Ok(Some(message));
            }

            // The store may have grown or shrunk between the tier checks
            // above; only an empty non-deferred set ends the pass.
            if self.queue.count_ready_non_deferred().await? == 0 {
                return Ok(None);
            }
        }
    }
}

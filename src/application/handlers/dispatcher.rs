use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::application::handlers::scheduler::PriorityScheduler;
use crate::application::services::{DispatchLock, LockError, MailTransport, TransportError};
use crate::domain::models::{DeliveryResult, NewDeliveryLogEntry, Priority, QueuedMessage};
use crate::domain::repositories::{
    DeliveryLogRepository, MessageQueueRepository, SuppressionListRepository,
};
use crate::domain::value_objects::Whitelist;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    Suppressed,
    Deferred,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub sent: u32,
    pub suppressed: u32,
    pub deferred: u32,
    pub total: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyLocked,
    LockTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    Completed(PassSummary),
    Skipped(SkipReason),
}

pub struct DispatchEngineConfig {
    /// Bounded lock wait; `None` means non-blocking acquisition.
    pub lock_wait: Option<Duration>,
    /// Sleep between empty-queue checks in `run_forever`.
    pub empty_queue_sleep: Duration,
    pub whitelist: Whitelist,
}

impl Default for DispatchEngineConfig {
    fn default() -> Self {
        Self {
            lock_wait: None,
            empty_queue_sleep: Duration::from_secs(30),
            whitelist: Whitelist::allow_all(),
        }
    }
}

/// Owns the dispatch state machine: pulls from the scheduler under the
/// process-exclusion lock, filters recipients, invokes the transport, and
/// interprets outcomes into delete/defer plus an audit log entry.
pub struct DispatchEngine {
    queue: Arc<dyn MessageQueueRepository>,
    suppression: Arc<dyn SuppressionListRepository>,
    delivery_log: Arc<dyn DeliveryLogRepository>,
    transport: Arc<dyn MailTransport>,
    lock: Arc<dyn DispatchLock>,
    config: DispatchEngineConfig,
}

impl DispatchEngine {
    pub fn new(
        queue: Arc<dyn MessageQueueRepository>,
        suppression: Arc<dyn SuppressionListRepository>,
        delivery_log: Arc<dyn DeliveryLogRepository>,
        transport: Arc<dyn MailTransport>,
        lock: Arc<dyn DispatchLock>,
        config: DispatchEngineConfig,
    ) -> Self {
        Self {
            queue,
            suppression,
            delivery_log,
            transport,
            lock,
            config,
        }
    }

    /// Dispatch a single message to a terminal decision.
    ///
    /// Suppressed or non-whitelisted recipients are logged and deleted
    /// without a transport call. Transient transport failures defer the
    /// message; any other transport error propagates and aborts the pass.
    pub async fn dispatch_one(&self, message: QueuedMessage) -> anyhow::Result<DispatchOutcome> {
        let blocked = self.suppression.contains(&message.to_address).await?
            || !self.config.whitelist.allows(&message.to_address);
        let attachments = self.queue.attachments(message.id).await?;

        if blocked {
            info!(to = %message.to_address, "skipping mail, recipient is on the don't-send list");
            self.delivery_log
                .append(NewDeliveryLogEntry::snapshot(
                    &message,
                    &attachments,
                    DeliveryResult::Suppressed,
                    None,
                ))
                .await?;
            self.queue.delete(message.id).await?;
            return Ok(DispatchOutcome::Suppressed);
        }

        info!(to = %message.to_address, "sending message");
        match self.transport.send(&message, &attachments).await {
            Ok(()) => {
                self.delivery_log
                    .append(NewDeliveryLogEntry::snapshot(
                        &message,
                        &attachments,
                        DeliveryResult::Success,
                        None,
                    ))
                    .await?;
                self.queue.delete(message.id).await?;
                Ok(DispatchOutcome::Sent)
            }
            Err(TransportError::Transient(detail)) => {
                self.queue
                    .set_priority(message.id, Priority::Deferred)
                    .await?;
                info!(to = %message.to_address, error = %detail, "message deferred due to send failure");
                self.delivery_log
                    .append(NewDeliveryLogEntry::snapshot(
                        &message,
                        &attachments,
                        DeliveryResult::Failure,
                        Some(detail),
                    ))
                    .await?;
                Ok(DispatchOutcome::Deferred)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// One full drain attempt under the exclusion lock.
    ///
    /// A held or timed-out lock is benign: the pass is skipped with no
    /// message state touched. The guard is released on every exit path,
    /// including a propagating fatal error.
    pub async fn run_pass(&self, limit: Option<u32>) -> anyhow::Result<PassOutcome> {
        let guard = match self.lock.acquire(self.config.lock_wait).await {
            Ok(guard) => guard,
            Err(LockError::AlreadyLocked) => {
                info!("already locked, skipping pass");
                return Ok(PassOutcome::Skipped(SkipReason::AlreadyLocked));
            }
            Err(LockError::Timeout) => {
                info!("lock wait timed out, skipping pass");
                return Ok(PassOutcome::Skipped(SkipReason::LockTimeout));
            }
            Err(LockError::Other(err)) => return Err(err),
        };

        let result = self.drain(limit).await;
        if let Err(err) = guard.release().await {
            warn!(error = %err, "failed to release dispatch lock");
        }

        let summary = result?;
        info!(
            sent = summary.sent,
            suppressed = summary.suppressed,
            deferred = summary.deferred,
            total = summary.total,
            "pass complete"
        );
        Ok(PassOutcome::Completed(summary))
    }

    async fn drain(&self, limit: Option<u32>) -> anyhow::Result<PassSummary> {
        let mut scheduler = PriorityScheduler::new(self.queue.clone());
        let mut summary = PassSummary::default();

        while let Some(message) = scheduler.next_message().await? {
            if let Some(limit) = limit {
                if summary.total >= limit {
                    info!(limit, "limit reached, stopping");
                    break;
                }
            }

            match self.dispatch_one(message).await? {
                DispatchOutcome::Sent => summary.sent += 1,
                DispatchOutcome::Suppressed => summary.suppressed += 1,
                DispatchOutcome::Deferred => summary.deferred += 1,
            }
            summary.total += 1;
        }

        Ok(summary)
    }

    /// Continuous operation: sleep while the queue is empty, run an
    /// unlimited pass once rows appear, repeat. Fatal errors propagate; the
    /// loop performs no recovery beyond the lock release in `run_pass` and
    /// expects an external supervisor to restart the process.
    pub async fn run_forever(&self) -> anyhow::Result<()> {
        loop {
            while self.queue.count_all().await? == 0 {
                tokio::time::sleep(self.config.empty_queue_sleep).await;
            }
            self.run_pass(None).await?;
        }
    }
}

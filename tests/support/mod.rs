#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use mailer::application::handlers::{
    DispatchEngine, DispatchEngineConfig, PassOutcome, PassSummary,
};
use mailer::application::services::{
    DispatchLock, LockError, LockGuard, MailTransport, NoopLock, TransportError,
};
use mailer::domain::models::{MailAttachment, NewQueuedMessage, Priority, QueuedMessage};
use mailer::domain::repositories::MessageQueueRepository;
use mailer::domain::value_objects::Whitelist;
use mailer::infrastructure::repositories::in_memory::{
    InMemoryDeliveryLogRepository, InMemoryMessageQueueRepository,
    InMemorySuppressionListRepository,
};

pub enum ScriptedSend {
    Succeed,
    FailTransient(&'static str),
    FailUnknown(&'static str),
}

/// Transport double: replays a script of outcomes (succeeding once the
/// script is exhausted) and records every recipient handed to it.
pub struct MockTransport {
    script: Mutex<VecDeque<ScriptedSend>>,
    sent: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn succeeding() -> Arc<Self> {
        Self::scripted(Vec::new())
    }

    pub fn scripted(script: Vec<ScriptedSend>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            sent: Mutex::new(Vec::new()),
        })
    }

    /// Recipients the engine actually handed to the transport, in order.
    pub async fn handed_to(&self) -> Vec<String> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl MailTransport for MockTransport {
    async fn send(
        &self,
        message: &QueuedMessage,
        _attachments: &[MailAttachment],
    ) -> Result<(), TransportError> {
        self.sent.lock().await.push(message.to_address.clone());
        let step = self
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or(ScriptedSend::Succeed);
        match step {
            ScriptedSend::Succeed => Ok(()),
            ScriptedSend::FailTransient(detail) => {
                Err(TransportError::Transient(detail.to_string()))
            }
            ScriptedSend::FailUnknown(detail) => {
                Err(TransportError::Unknown(anyhow::anyhow!("{detail}")))
            }
        }
    }
}

/// Lock double that is permanently held by someone else.
pub struct HeldLock;

#[async_trait]
impl DispatchLock for HeldLock {
    async fn acquire(&self, _wait: Option<Duration>) -> Result<Box<dyn LockGuard>, LockError> {
        Err(LockError::AlreadyLocked)
    }
}

/// Lock double that counts acquisitions and releases.
#[derive(Default)]
pub struct TrackingLock {
    acquired: Arc<Mutex<u32>>,
    released: Arc<Mutex<u32>>,
}

impl TrackingLock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn acquired(&self) -> u32 {
        *self.acquired.lock().await
    }

    pub async fn released(&self) -> u32 {
        *self.released.lock().await
    }
}

struct TrackingGuard {
    released: Arc<Mutex<u32>>,
}

#[async_trait]
impl DispatchLock for TrackingLock {
    async fn acquire(&self, _wait: Option<Duration>) -> Result<Box<dyn LockGuard>, LockError> {
        *self.acquired.lock().await += 1;
        Ok(Box::new(TrackingGuard {
            released: self.released.clone(),
        }))
    }
}

#[async_trait]
impl LockGuard for TrackingGuard {
    async fn release(self: Box<Self>) -> anyhow::Result<()> {
        *self.released.lock().await += 1;
        Ok(())
    }
}

pub struct TestMailer {
    pub queue: Arc<InMemoryMessageQueueRepository>,
    pub suppression: Arc<InMemorySuppressionListRepository>,
    pub delivery_log: Arc<InMemoryDeliveryLogRepository>,
    pub transport: Arc<MockTransport>,
    pub engine: DispatchEngine,
}

pub fn mailer_with(
    transport: Arc<MockTransport>,
    lock: Arc<dyn DispatchLock>,
    whitelist: Whitelist,
) -> TestMailer {
    let queue = Arc::new(InMemoryMessageQueueRepository::new());
    let suppression = Arc::new(InMemorySuppressionListRepository::new());
    let delivery_log = Arc::new(InMemoryDeliveryLogRepository::new());

    let engine = DispatchEngine::new(
        queue.clone(),
        suppression.clone(),
        delivery_log.clone(),
        transport.clone(),
        lock,
        DispatchEngineConfig {
            lock_wait: None,
            empty_queue_sleep: Duration::from_millis(10),
            whitelist,
        },
    );

    TestMailer {
        queue,
        suppression,
        delivery_log,
        transport,
        engine,
    }
}

pub fn mailer(transport: Arc<MockTransport>) -> TestMailer {
    mailer_with(transport, Arc::new(NoopLock), Whitelist::allow_all())
}

/// Insert a ready-to-send message directly into the queue.
pub async fn enqueue_ready(
    queue: &Arc<InMemoryMessageQueueRepository>,
    to: &str,
    priority: Priority,
) -> Uuid {
    let message = queue
        .insert(NewQueuedMessage {
            to_address: to.to_string(),
            from_address: "sender@example.com".to_string(),
            subject: "Subject".to_string(),
            body: "Body".to_string(),
            html_body: None,
            priority,
        })
        .await
        .unwrap();
    queue.mark_ready(message.id).await.unwrap();
    message.id
}

pub fn summary(outcome: PassOutcome) -> PassSummary {
    match outcome {
        PassOutcome::Completed(summary) => summary,
        PassOutcome::Skipped(reason) => panic!("pass unexpectedly skipped: {reason:?}"),
    }
}

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::models::{MailAttachment, QueuedMessage};

/// Closed classification of send failures at the transport boundary. Only
/// `Transient` is absorbed by the dispatch engine (the message is deferred);
/// `Permanent` and `Unknown` propagate and abort the pass.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network-level errors, message encoding errors, and SMTP protocol
    /// rejections (refused sender/recipient, auth, data).
    #[error("transient send failure: {0}")]
    Transient(String),

    /// The message can never be delivered as stored, e.g. a structurally
    /// invalid address.
    #[error("permanent send failure: {0}")]
    Permanent(String),

    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

/// Delivery port. Implementations build the wire payload (plain or
/// multipart-alternative with attachments) and attempt one delivery.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(
        &self,
        message: &QueuedMessage,
        attachments: &[MailAttachment],
    ) -> Result<(), TransportError>;
}

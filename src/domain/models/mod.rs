pub mod delivery_log;
pub mod message;
pub mod suppression;

pub use delivery_log::{DeliveryLogEntry, DeliveryResult, NewDeliveryLogEntry};
pub use message::{MailAttachment, NewAttachment, NewQueuedMessage, Priority, QueuedMessage};
pub use suppression::SuppressionEntry;

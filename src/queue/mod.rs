//! Redis transport for task messages and confirmation events.

pub mod redis;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::QueueError;
use crate::task::Confirmation;

pub use self::redis::RedisBroker;

/// A raw message taken from the task queue and held until acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Local identifier for log correlation. Not part of the message.
    pub id: Uuid,
    /// Message body exactly as it was queued.
    pub body: String,
}

impl Delivery {
    /// Wraps a message body.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            body: body.into(),
        }
    }
}

/// Messaging operations the worker depends on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Takes the next pending message, if any. It stays in flight until [`ack`](Self::ack).
    async fn next_delivery(&self) -> Result<Option<Delivery>, QueueError>;

    /// Removes a delivered message from the in-flight list.
    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// Publishes a confirmation event.
    async fn publish_confirmation(&self, confirmation: &Confirmation) -> Result<(), QueueError>;

    /// Number of messages waiting to be delivered.
    async fn pending_count(&self) -> Result<usize, QueueError>;
}

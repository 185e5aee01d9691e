//! Redis list operations.

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::debug;

use super::{Delivery, MessageBroker};
use crate::config::model::{ConfirmationConfig, QueueConfig};
use crate::error::QueueError;
use crate::task::{Confirmation, VideoTask};

/// Reliable-list transport over Redis.
///
/// Deliveries move atomically from the task list to the processing list and
/// stay there until acknowledged. Confirmations are pushed onto the
/// confirmation list and announced on the `<exchange>.<routing_key>` channel.
#[derive(Clone)]
pub struct RedisBroker {
    connection: redis::aio::ConnectionManager,
    queue: QueueConfig,
    confirmation: ConfirmationConfig,
}

impl RedisBroker {
    /// Creates a new broker connected to the specified Redis URL.
    pub async fn connect(
        redis_url: &str,
        queue: QueueConfig,
        confirmation: ConfirmationConfig,
    ) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(|e| QueueError::ConnectionFailed {
            url: redis_url.to_string(),
            message: e.to_string(),
        })?;

        let connection = client
            .get_connection_manager()
            .await
            .map_err(|e| QueueError::ConnectionFailed {
                url: redis_url.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            connection,
            queue,
            confirmation,
        })
    }

    /// Adds a task to the end of the task queue.
    pub async fn enqueue(&self, task: &VideoTask) -> Result<(), QueueError> {
        let body =
            serde_json::to_string(task).map_err(|e| QueueError::SerializationFailed(e.to_string()))?;

        let mut conn = self.connection.clone();
        conn.rpush::<_, _, ()>(&self.queue.task_queue, body)
            .await
            .map_err(|e| QueueError::EnqueueFailed(e.to_string()))
    }

    /// Returns the number of delivered but unacknowledged messages.
    pub async fn in_flight_count(&self) -> Result<usize, QueueError> {
        let mut conn = self.connection.clone();
        conn.llen(&self.queue.processing_queue)
            .await
            .map_err(|e| QueueError::DequeueFailed(e.to_string()))
    }

    /// Lists the raw bodies waiting in the task queue.
    pub async fn list_pending(&self) -> Result<Vec<String>, QueueError> {
        self.list(&self.queue.task_queue).await
    }

    /// Lists the raw bodies of unacknowledged deliveries.
    pub async fn list_in_flight(&self) -> Result<Vec<String>, QueueError> {
        self.list(&self.queue.processing_queue).await
    }

    async fn list(&self, key: &str) -> Result<Vec<String>, QueueError> {
        let mut conn = self.connection.clone();
        conn.lrange(key, 0, -1)
            .await
            .map_err(|e| QueueError::DequeueFailed(e.to_string()))
    }

    /// Moves every unacknowledged delivery back to the front of the task queue.
    ///
    /// Only safe while no worker is running, otherwise live deliveries are
    /// handed out twice.
    pub async fn requeue_in_flight(&self) -> Result<usize, QueueError> {
        let mut conn = self.connection.clone();
        let mut moved = 0;

        loop {
            let body: Option<String> = redis::cmd("LMOVE")
                .arg(&self.queue.processing_queue)
                .arg(&self.queue.task_queue)
                .arg("RIGHT")
                .arg("LEFT")
                .query_async(&mut conn)
                .await
                .map_err(|e| QueueError::EnqueueFailed(e.to_string()))?;

            match body {
                Some(_) => moved += 1,
                None => return Ok(moved),
            }
        }
    }
}

#[async_trait]
impl MessageBroker for RedisBroker {
    async fn next_delivery(&self) -> Result<Option<Delivery>, QueueError> {
        let mut conn = self.connection.clone();

        // Atomically move from queue to processing
        let body: Option<String> = redis::cmd("LMOVE")
            .arg(&self.queue.task_queue)
            .arg(&self.queue.processing_queue)
            .arg("LEFT")
            .arg("RIGHT")
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::DequeueFailed(e.to_string()))?;

        Ok(body.map(Delivery::new))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut conn = self.connection.clone();
        let removed: usize = conn
            .lrem(&self.queue.processing_queue, 1, &delivery.body)
            .await
            .map_err(|e| QueueError::AckFailed(e.to_string()))?;

        if removed == 0 {
            debug!(delivery_id = %delivery.id, "Delivery was not in the processing list");
        }
        Ok(())
    }

    async fn publish_confirmation(&self, confirmation: &Confirmation) -> Result<(), QueueError> {
        let body = serde_json::to_string(confirmation)
            .map_err(|e| QueueError::SerializationFailed(e.to_string()))?;

        let mut conn = self.connection.clone();
        conn.rpush::<_, _, ()>(&self.confirmation.queue, &body)
            .await
            .map_err(|e| QueueError::PublishFailed(e.to_string()))?;

        conn.publish::<_, _, ()>(self.confirmation.channel(), &body)
            .await
            .map_err(|e| QueueError::PublishFailed(e.to_string()))?;

        Ok(())
    }

    async fn pending_count(&self) -> Result<usize, QueueError> {
        let mut conn = self.connection.clone();
        conn.llen(&self.queue.task_queue)
            .await
            .map_err(|e| QueueError::DequeueFailed(e.to_string()))
    }
}

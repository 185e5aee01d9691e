//! Idempotent handling of a single task message.

use std::sync::Arc;

use tracing::{error, info};

use crate::error::HandlerError;
use crate::processor::{ProcessReport, TaskProcessor};
use crate::queue::{Delivery, MessageBroker};
use crate::store::TaskStore;
use crate::task::{Confirmation, ErrorRecord, VideoTask};

/// What happened to a message that was handled without error.
#[derive(Debug)]
pub enum HandleOutcome {
    /// The video was converted, marked, confirmed and acknowledged.
    Processed(ProcessReport),
    /// A processing record already existed; the message was acknowledged.
    AlreadyProcessed,
}

/// Turns inbound task messages into converted videos.
///
/// A message is acknowledged only once its video has a processing record.
/// Failed messages stay unacknowledged so the transport can redeliver them.
pub struct TaskHandler {
    store: Arc<dyn TaskStore>,
    broker: Arc<dyn MessageBroker>,
    processor: TaskProcessor,
}

impl TaskHandler {
    /// Creates a handler from its collaborators.
    pub fn new(
        store: Arc<dyn TaskStore>,
        broker: Arc<dyn MessageBroker>,
        processor: TaskProcessor,
    ) -> Self {
        Self {
            store,
            broker,
            processor,
        }
    }

    /// Handles one delivery. Every error has already been logged and recorded when returned.
    pub async fn handle(&self, delivery: &Delivery) -> Result<HandleOutcome, HandlerError> {
        let task = match VideoTask::from_slice(delivery.body.as_bytes()) {
            Ok(task) => task,
            Err(e) => {
                let err = HandlerError::from(e);
                self.record_failure(None, &err).await;
                return Err(err);
            }
        };

        match self.handle_task(delivery, &task).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.record_failure(Some(task.video_id), &err).await;
                Err(err)
            }
        }
    }

    async fn handle_task(
        &self,
        delivery: &Delivery,
        task: &VideoTask,
    ) -> Result<HandleOutcome, HandlerError> {
        let processed = self
            .store
            .is_processed(task.video_id)
            .await
            .map_err(HandlerError::IdempotencyCheck)?;

        if processed {
            info!(video_id = task.video_id, "Video already processed, skipping");
            self.broker.ack(delivery).await.map_err(HandlerError::Ack)?;
            return Ok(HandleOutcome::AlreadyProcessed);
        }

        let report = self.processor.process(task).await?;

        self.store
            .mark_processed(task.video_id)
            .await
            .map_err(HandlerError::MarkProcessed)?;

        // Order matters: mark, then confirm, then ack
        self.broker
            .publish_confirmation(&Confirmation::from(task))
            .await
            .map_err(HandlerError::Publish)?;

        self.broker.ack(delivery).await.map_err(HandlerError::Ack)?;

        info!(
            video_id = task.video_id,
            manifest = ?report.manifest,
            chunks = report.merge.chunk_count,
            elapsed_secs = report.elapsed.as_secs_f64(),
            "Video processed"
        );
        Ok(HandleOutcome::Processed(report))
    }

    /// Logs a failure and writes an error record. A failed write is logged, never returned.
    async fn record_failure(&self, video_id: Option<i64>, err: &HandlerError) {
        let record = ErrorRecord::new(video_id, err.summary(), err.details());

        error!(
            video_id = ?video_id,
            stage = err.stage(),
            error = %record.error,
            details = %record.details,
            time = %record.time.to_rfc3339(),
            "Processing error"
        );

        if let Err(e) = self.store.register_error(&record).await {
            error!(video_id = ?video_id, error = %e, "Failed to register error record");
        }
    }
}

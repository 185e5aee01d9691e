//! Worker that pulls task messages from the queue and dispatches them.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::handler::{HandleOutcome, TaskHandler};
use crate::metrics::Metrics;
use crate::queue::MessageBroker;

/// Back-off after the broker itself fails.
const BROKER_ERROR_BACKOFF: Duration = Duration::from_secs(10);

/// Fetches deliveries and runs up to `concurrency` handlers at once.
pub struct Worker {
    /// Source of deliveries.
    broker: Arc<dyn MessageBroker>,
    /// Handler shared by all in-flight tasks.
    handler: Arc<TaskHandler>,
    /// Maximum tasks handled concurrently.
    concurrency: usize,
    /// Wait between polls of an empty queue.
    poll_interval: Duration,
    /// Optional metrics sink.
    metrics: Option<Arc<Metrics>>,
}

impl Worker {
    /// Creates a new worker.
    pub fn new(
        broker: Arc<dyn MessageBroker>,
        handler: Arc<TaskHandler>,
        concurrency: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            broker,
            handler,
            concurrency: concurrency.max(1),
            poll_interval,
            metrics: None,
        }
    }

    /// Records task outcomes and queue depth in `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Runs until `shutdown` resolves, then waits for in-flight tasks to finish.
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!(concurrency = self.concurrency, "Starting worker");

        let permits = permit_count(self.concurrency)?;
        let slots = Arc::new(Semaphore::new(self.concurrency));
        tokio::pin!(shutdown);

        loop {
            let permit = tokio::select! {
                _ = &mut shutdown => break,
                permit = slots.clone().acquire_owned() => permit?,
            };

            match self.broker.next_delivery().await {
                Ok(Some(delivery)) => {
                    debug!(delivery_id = %delivery.id, "Received delivery");
                    let handler = self.handler.clone();
                    let metrics = self.metrics.clone();

                    tokio::spawn(async move {
                        let _permit = permit;
                        let _in_progress = metrics.clone().map(InProgress::start);

                        let result = handler.handle(&delivery).await;

                        if let Some(m) = &metrics {
                            match &result {
                                Ok(HandleOutcome::Processed(report)) => m.record_processed(report.elapsed),
                                Ok(HandleOutcome::AlreadyProcessed) => m.record_already_processed(),
                                Err(e) => m.record_failure(e.stage()),
                            }
                        }
                    });
                }
                Ok(None) => {
                    drop(permit);
                    self.update_queue_depth().await;
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
                Err(e) => {
                    drop(permit);
                    error!(error = %e, "Failed to fetch delivery");
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(BROKER_ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        info!("Waiting for in-flight tasks");
        let _all = slots.acquire_many(permits).await?;
        info!("Worker stopped");
        Ok(())
    }

    async fn update_queue_depth(&self) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        match self.broker.pending_count().await {
            Ok(depth) => metrics.set_queue_depth(depth),
            Err(e) => warn!(error = %e, "Failed to read queue depth"),
        }
    }
}

/// Holds one unit of the in-progress gauge until dropped, including on panic.
struct InProgress(Arc<Metrics>);

impl InProgress {
    fn start(metrics: Arc<Metrics>) -> Self {
        metrics.tasks_in_progress.inc();
        Self(metrics)
    }
}

impl Drop for InProgress {
    fn drop(&mut self) {
        self.0.tasks_in_progress.dec();
    }
}

fn permit_count(concurrency: usize) -> Result<u32> {
    u32::try_from(concurrency)
        .map_err(|_| anyhow::anyhow!("worker concurrency {concurrency} does not fit a semaphore"))
}

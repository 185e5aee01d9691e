//! Prometheus metrics exporter.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use prometheus::{CounterVec, Gauge, Histogram, HistogramOpts, Opts, Registry};
use tracing::{error, info};

use crate::error::MetricsError;

/// Prometheus metrics for the converter.
pub struct Metrics {
    /// Registry for all metrics.
    registry: Registry,
    /// Number of messages waiting in the task queue.
    pub queue_depth: Gauge,
    /// Handled tasks by outcome.
    pub tasks_total: CounterVec,
    /// Failed tasks by stage.
    pub failures_total: CounterVec,
    /// Time from merge start to cleanup for successful tasks.
    pub task_duration_seconds: Histogram,
    /// Tasks currently being handled.
    pub tasks_in_progress: Gauge,
}

impl Metrics {
    /// Creates a new metrics instance with all gauges and counters.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let queue_depth = Gauge::new("video_queue_depth", "Number of tasks waiting in queue")
            .map_err(|e| MetricsError::PrometheusFailed(e.to_string()))?;

        let tasks_total = CounterVec::new(
            Opts::new("video_tasks_total", "Total number of handled tasks"),
            &["status"],
        )
        .map_err(|e| MetricsError::PrometheusFailed(e.to_string()))?;

        let failures_total = CounterVec::new(
            Opts::new("video_task_failures_total", "Failed tasks by stage"),
            &["stage"],
        )
        .map_err(|e| MetricsError::PrometheusFailed(e.to_string()))?;

        let task_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "video_task_duration_seconds",
                "Time taken to merge and transcode a video in seconds",
            )
            .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0]),
        )
        .map_err(|e| MetricsError::PrometheusFailed(e.to_string()))?;

        let tasks_in_progress = Gauge::new(
            "video_tasks_in_progress",
            "Number of tasks currently being handled",
        )
        .map_err(|e| MetricsError::PrometheusFailed(e.to_string()))?;

        registry
            .register(Box::new(queue_depth.clone()))
            .map_err(|e| MetricsError::PrometheusFailed(e.to_string()))?;
        registry
            .register(Box::new(tasks_total.clone()))
            .map_err(|e| MetricsError::PrometheusFailed(e.to_string()))?;
        registry
            .register(Box::new(failures_total.clone()))
            .map_err(|e| MetricsError::PrometheusFailed(e.to_string()))?;
        registry
            .register(Box::new(task_duration_seconds.clone()))
            .map_err(|e| MetricsError::PrometheusFailed(e.to_string()))?;
        registry
            .register(Box::new(tasks_in_progress.clone()))
            .map_err(|e| MetricsError::PrometheusFailed(e.to_string()))?;

        Ok(Self {
            registry,
            queue_depth,
            tasks_total,
            failures_total,
            task_duration_seconds,
            tasks_in_progress,
        })
    }

    /// Records a converted video.
    pub fn record_processed(&self, elapsed: Duration) {
        self.tasks_total.with_label_values(&["processed"]).inc();
        self.task_duration_seconds.observe(elapsed.as_secs_f64());
    }

    /// Records a redelivered task that was already done.
    pub fn record_already_processed(&self) {
        self.tasks_total.with_label_values(&["already_processed"]).inc();
    }

    /// Records a failed task.
    pub fn record_failure(&self, stage: &str) {
        self.tasks_total.with_label_values(&["failed"]).inc();
        self.failures_total.with_label_values(&[stage]).inc();
    }

    /// Updates queue depth gauge.
    pub fn set_queue_depth(&self, depth: usize) {
        self.queue_depth.set(depth as f64);
    }

    /// Returns the metrics in Prometheus text format.
    pub fn gather(&self) -> Result<String, MetricsError> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MetricsError::PrometheusFailed(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| MetricsError::PrometheusFailed(e.to_string()))
    }
}

/// HTTP server for Prometheus metrics.
pub struct MetricsServer {
    /// Metrics instance.
    metrics: Arc<Metrics>,
    /// Port to listen on.
    port: u16,
}

impl MetricsServer {
    /// Creates a new metrics server.
    pub fn new(metrics: Arc<Metrics>, port: u16) -> Self {
        Self { metrics, port }
    }

    /// Starts the metrics HTTP server.
    pub async fn start(self) -> Result<(), MetricsError> {
        use http_body_util::Full;
        use hyper::body::Bytes;
        use hyper::server::conn::http1;
        use hyper::service::service_fn;
        use hyper::{body::Incoming, Request, Response, StatusCode};
        use hyper_util::rt::TokioIo;

        let addr: SocketAddr = ([0, 0, 0, 0], self.port).into();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| MetricsError::PrometheusFailed(e.to_string()))?;

        info!(port = self.port, "Starting Prometheus metrics server");

        loop {
            let (stream, _) = listener
                .accept()
                .await
                .map_err(|e| MetricsError::PrometheusFailed(e.to_string()))?;

            let io = TokioIo::new(stream);
            let metrics = self.metrics.clone();

            tokio::spawn(async move {
                let service = service_fn(|req: Request<Incoming>| {
                    let metrics = metrics.clone();
                    async move {
                        let (status, body) = if req.uri().path() != "/metrics" {
                            (StatusCode::NOT_FOUND, "Not Found".to_string())
                        } else {
                            match metrics.gather() {
                                Ok(body) => (StatusCode::OK, body),
                                Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
                            }
                        };

                        let mut response = Response::new(Full::new(Bytes::from(body)));
                        *response.status_mut() = status;
                        Ok::<_, hyper::Error>(response)
                    }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    error!(error = %e, "Error serving connection");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exports_recorded_outcomes() {
        let metrics = Metrics::new().unwrap();
        metrics.record_processed(Duration::from_secs(12));
        metrics.record_already_processed();
        metrics.record_failure("transcode");
        metrics.set_queue_depth(3);

        let text = metrics.gather().unwrap();
        assert!(text.contains(r#"video_tasks_total{status="processed"} 1"#));
        assert!(text.contains(r#"video_tasks_total{status="already_processed"} 1"#));
        assert!(text.contains(r#"video_task_failures_total{stage="transcode"} 1"#));
        assert!(text.contains("video_queue_depth 3"));
        assert!(text.contains("video_task_duration_seconds_count 1"));
    }
}

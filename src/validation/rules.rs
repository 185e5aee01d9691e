//! Per-section configuration rules.

use crate::config::model::{AppConfig, ConfirmationConfig, LayoutConfig, QueueConfig};

use super::ConfigReview;

/// Log levels accepted by the tracing filter.
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Upper bound on concurrent tasks; each one holds a transcoder process.
pub const MAX_CONCURRENCY: usize = 256;

/// Runs every rule against `config`.
pub fn check(config: &AppConfig) -> ConfigReview {
    let mut review = ConfigReview::default();

    if !LOG_LEVELS.contains(&config.log_level.to_lowercase().as_str()) {
        review.warn(
            "log_level",
            format!("unknown level '{}', using it as a filter anyway", config.log_level),
        );
    }

    if config.redis.host.trim().is_empty() {
        review.reject("redis.host", "empty host");
    }
    if config.redis.port == 0 {
        review.reject("redis.port", "port 0");
    }

    check_routing(&config.queue, &config.confirmation, &mut review);

    if config.transcoder.binary.trim().is_empty() {
        review.reject("transcoder.binary", "no transcoder to run");
    }
    if config.transcoder.timeout_seconds == Some(0) {
        review.reject(
            "transcoder.timeout_seconds",
            "a 0 second timeout kills every run; omit it for no limit",
        );
    }

    check_layout(&config.layout, &mut review);

    match config.worker.concurrency {
        0 => review.reject("worker.concurrency", "must be at least 1"),
        n if n > MAX_CONCURRENCY => {
            review.reject("worker.concurrency", format!("{n} exceeds the limit of {MAX_CONCURRENCY}"))
        }
        _ => {}
    }

    if config.prometheus.enabled && config.prometheus.port == 0 {
        review.reject("prometheus.port", "port 0 with metrics enabled");
    }

    review
}

/// Task, processing and confirmation lists must be named and distinct.
fn check_routing(queue: &QueueConfig, confirmation: &ConfirmationConfig, review: &mut ConfigReview) {
    for (field, name) in [
        ("queue.task_queue", &queue.task_queue),
        ("queue.processing_queue", &queue.processing_queue),
        ("confirmation.exchange", &confirmation.exchange),
        ("confirmation.routing_key", &confirmation.routing_key),
        ("confirmation.queue", &confirmation.queue),
    ] {
        if name.trim().is_empty() {
            review.reject(field, "empty name");
        }
    }

    if queue.processing_queue == queue.task_queue {
        review.reject("queue.processing_queue", "in-flight tasks would be redelivered at once");
    }
    if confirmation.queue == queue.task_queue {
        review.reject("confirmation.queue", "confirmations would be consumed as tasks");
    }
    if queue.poll_interval_seconds == 0 {
        review.warn("queue.poll_interval_seconds", "an empty queue is polled without pause");
    }
}

/// Names inside a task directory must stay inside it and not collide with chunks.
fn check_layout(layout: &LayoutConfig, review: &mut ConfigReview) {
    if layout.chunk_suffix.is_empty() {
        review.reject(
            "layout.chunk_suffix",
            "empty suffix would merge every file in the task directory",
        );
    } else if !layout.chunk_suffix.starts_with('.') {
        review.warn(
            "layout.chunk_suffix",
            format!("'{}' has no leading '.', any name ending in it is a chunk", layout.chunk_suffix),
        );
    }

    for (field, name) in [
        ("layout.merged_file", &layout.merged_file),
        ("layout.output_dir", &layout.output_dir),
        ("layout.manifest", &layout.manifest),
    ] {
        if name.trim().is_empty() {
            review.reject(field, "empty name");
        } else if name.contains('/') || name.contains('\\') || name == ".." {
            review.reject(field, format!("'{name}' leaves the task directory"));
        }
    }

    if !layout.chunk_suffix.is_empty() && layout.merged_file.ends_with(&layout.chunk_suffix) {
        review.reject("layout.merged_file", "merged file would be picked up as a chunk on retry");
    }
}

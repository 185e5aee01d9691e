//! Error types for the video converter.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application errors.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] MetricsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration loading and parsing errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {message}")]
    ParseFailed { path: PathBuf, message: String },

    #[error("Config validation failed with {error_count} error(s)")]
    ValidationFailed { error_count: usize },
}

/// Redis transport errors.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Failed to connect to Redis at '{url}': {message}")]
    ConnectionFailed { url: String, message: String },

    #[error("Failed to enqueue task: {0}")]
    EnqueueFailed(String),

    #[error("Failed to fetch delivery: {0}")]
    DequeueFailed(String),

    #[error("Failed to acknowledge delivery: {0}")]
    AckFailed(String),

    #[error("Failed to publish confirmation: {0}")]
    PublishFailed(String),

    #[error("Failed to serialize message: {0}")]
    SerializationFailed(String),
}

/// Persistence errors for processing and error records.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to connect to Redis at '{url}': {message}")]
    ConnectionFailed { url: String, message: String },

    #[error("Failed to look up processing record for video {video_id}: {message}")]
    LookupFailed { video_id: i64, message: String },

    #[error("Failed to mark video {video_id} as processed: {message}")]
    MarkFailed { video_id: i64, message: String },

    #[error("Failed to register error record: {0}")]
    RegisterFailed(String),

    #[error("Failed to read error records: {0}")]
    ReadFailed(String),
}

/// Chunk discovery and concatenation errors.
#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Failed to find chunks in '{dir}': {message}")]
    Discovery { dir: PathBuf, message: String },

    #[error("Failed to open '{path}': {source}")]
    FileAccess {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write chunk '{chunk}' to merged file: {source}")]
    Copy {
        chunk: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to flush merged file '{path}': {source}")]
    Flush {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// External transcoder errors.
#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("Failed to spawn '{binary}': {message}")]
    SpawnFailed { binary: String, message: String },

    #[error("Transcoder exited with code {code}, output: {output}")]
    Failed { code: i32, output: String },

    #[error("Transcoding timed out after {seconds} seconds")]
    Timeout { seconds: u64 },
}

/// Errors from the merge, transcode and cleanup sequence.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to merge chunks: {0}")]
    Merge(#[from] MergeError),

    #[error("Failed to create output directory '{path}': {source}")]
    CreateOutputDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to convert to mpeg-dash: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("Failed to remove merged file '{path}': {source}")]
    RemoveMerged {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ProcessError {
    /// Short label for the stage that failed, used in logs and error records.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Merge(_) => "merge",
            Self::CreateOutputDir { .. } => "create_output_dir",
            Self::Transcode(_) => "transcode",
            Self::RemoveMerged { .. } => "remove_merged",
        }
    }
}

/// Errors surfaced by the task handler.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Failed to unmarshal task: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Failed to check processing record: {0}")]
    IdempotencyCheck(#[source] StoreError),

    #[error("Failed to process video: {0}")]
    Process(#[from] ProcessError),

    #[error("Failed to mark video as processed: {0}")]
    MarkProcessed(#[source] StoreError),

    #[error("Failed to publish confirmation: {0}")]
    Publish(#[source] QueueError),

    #[error("Failed to acknowledge message: {0}")]
    Ack(#[source] QueueError),
}

impl HandlerError {
    /// Message stored in the error record, without the underlying cause.
    pub fn summary(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "Failed to unmarshal task",
            Self::IdempotencyCheck(_) => "Failed to check processing record",
            Self::Process(_) => "Failed to process video",
            Self::MarkProcessed(_) => "Failed to mark video as processed",
            Self::Publish(_) => "Failed to publish confirmation",
            Self::Ack(_) => "Failed to acknowledge message",
        }
    }

    /// Underlying cause, stored as the error record details.
    pub fn details(&self) -> String {
        match self {
            Self::Malformed(e) => e.to_string(),
            Self::IdempotencyCheck(e) | Self::MarkProcessed(e) => e.to_string(),
            Self::Process(e) => e.to_string(),
            Self::Publish(e) | Self::Ack(e) => e.to_string(),
        }
    }

    /// Short label for the handler stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "deserialize",
            Self::IdempotencyCheck(_) => "idempotency_check",
            Self::Process(e) => e.stage(),
            Self::MarkProcessed(_) => "mark_processed",
            Self::Publish(_) => "publish_confirmation",
            Self::Ack(_) => "ack",
        }
    }
}

/// Prometheus metrics errors.
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Prometheus metrics export failed: {0}")]
    PrometheusFailed(String),
}

/// Capability detection errors.
#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("Failed to run '{command}': {message}")]
    CommandFailed { command: String, message: String },

    #[error("Required tool '{tool}' not found in PATH")]
    ToolNotFound { tool: String },
}

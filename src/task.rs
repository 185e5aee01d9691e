//! Video task definitions and the records written about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::model::LayoutConfig;

/// A conversion request read from the task queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoTask {
    /// Identifier of the uploaded video.
    pub video_id: i64,

    /// Directory holding the uploaded chunk files.
    pub path: PathBuf,
}

impl VideoTask {
    /// Creates a new task.
    pub fn new(video_id: i64, path: impl Into<PathBuf>) -> Self {
        Self {
            video_id,
            path: path.into(),
        }
    }

    /// Parses a task from a raw message body.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Resolves the files this task reads and writes.
    pub fn layout(&self, layout: &LayoutConfig) -> TaskLayout {
        TaskLayout::new(&self.path, layout)
    }
}

/// Paths derived from a task directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskLayout {
    /// Directory containing the chunks.
    pub input_dir: PathBuf,
    /// Concatenated chunks, removed after a successful transcode.
    pub merged_file: PathBuf,
    /// Directory receiving the manifest and segments.
    pub output_dir: PathBuf,
    /// DASH manifest written by the transcoder.
    pub manifest: PathBuf,
}

impl TaskLayout {
    /// Builds the layout for a task directory.
    pub fn new(task_dir: &Path, layout: &LayoutConfig) -> Self {
        let output_dir = task_dir.join(&layout.output_dir);
        Self {
            input_dir: task_dir.to_path_buf(),
            merged_file: task_dir.join(&layout.merged_file),
            manifest: output_dir.join(&layout.manifest),
            output_dir,
        }
    }
}

/// Event published once a video has been converted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub video_id: i64,
    pub path: PathBuf,
}

impl From<&VideoTask> for Confirmation {
    fn from(task: &VideoTask) -> Self {
        Self {
            video_id: task.video_id,
            path: task.path.clone(),
        }
    }
}

/// A failure captured for later inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Video the failure belongs to. `None` when the message could not be parsed.
    pub video_id: Option<i64>,

    /// What the worker was doing.
    pub error: String,

    /// Underlying error text.
    pub details: String,

    /// When the failure happened.
    pub time: DateTime<Utc>,
}

impl ErrorRecord {
    /// Creates a record stamped with the current time.
    pub fn new(video_id: Option<i64>, error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            video_id,
            error: error.into(),
            details: details.into(),
            time: Utc::now(),
        }
    }
}

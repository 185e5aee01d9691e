//! External transcoder producing MPEG-DASH output.

pub mod ffmpeg;

use std::path::Path;

use async_trait::async_trait;

use crate::error::TranscodeError;

pub use ffmpeg::FfmpegTranscoder;

/// Captured output of a successful transcoder run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscodeOutput {
    /// Standard output followed by standard error.
    pub output: String,
}

/// Converts a merged video into a segmented streaming manifest.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Transcodes `input`, writing the manifest to `manifest` and segments next to it.
    async fn transcode(&self, input: &Path, manifest: &Path) -> Result<TranscodeOutput, TranscodeError>;
}

//! FFmpeg subprocess wrapper for DASH packaging.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use super::{TranscodeOutput, Transcoder};
use crate::config::model::TranscoderConfig;
use crate::error::TranscodeError;

/// Runs ffmpeg (or a compatible binary) to produce a DASH manifest.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    /// Executable to run.
    binary: String,
    /// Upper bound on a single run.
    timeout: Option<Duration>,
    /// Extra arguments placed before the output path.
    extra_args: Vec<String>,
}

impl FfmpegTranscoder {
    /// Creates a transcoder running `binary` with no timeout.
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            timeout: None,
            extra_args: Vec::new(),
        }
    }

    /// Creates a transcoder from config.
    pub fn from_config(config: &TranscoderConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            timeout: config.timeout_seconds.map(Duration::from_secs),
            extra_args: config.extra_args.clone(),
        }
    }

    /// Kills runs that take longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the command line for one run.
    fn command(&self, input: &Path, manifest: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-y"); // Overwrite a manifest left by an earlier failed run
        cmd.arg("-i").arg(input);
        cmd.arg("-f").arg("dash");
        cmd.args(&self.extra_args);
        cmd.arg(manifest);
        cmd
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, input: &Path, manifest: &Path) -> Result<TranscodeOutput, TranscodeError> {
        let mut cmd = self.command(input, manifest);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(cmd = ?cmd, "Running transcoder");

        let run = cmd.output();
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| TranscodeError::Timeout {
                    seconds: limit.as_secs(),
                })?,
            None => run.await,
        };

        let output_result = result.map_err(|e| TranscodeError::SpawnFailed {
            binary: self.binary.clone(),
            message: e.to_string(),
        })?;

        let mut output = String::from_utf8_lossy(&output_result.stdout).to_string();
        output.push_str(&String::from_utf8_lossy(&output_result.stderr));

        if !output_result.status.success() {
            return Err(TranscodeError::Failed {
                code: output_result.status.code().unwrap_or(-1),
                output,
            });
        }

        info!(manifest = ?manifest, "Transcoding completed");
        Ok(TranscodeOutput { output })
    }
}

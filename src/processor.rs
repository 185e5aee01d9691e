//! Merge, transcode and cleanup for a single task.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::chunk::{merge_chunks, MergeSummary};
use crate::config::model::LayoutConfig;
use crate::error::ProcessError;
use crate::task::VideoTask;
use crate::transcoder::Transcoder;

/// Converts a directory of chunks into a DASH package.
#[derive(Clone)]
pub struct TaskProcessor {
    transcoder: Arc<dyn Transcoder>,
    layout: LayoutConfig,
}

/// Summary of a completed conversion.
#[derive(Debug, Clone)]
pub struct ProcessReport {
    /// What the merge step produced.
    pub merge: MergeSummary,
    /// Manifest written by the transcoder.
    pub manifest: PathBuf,
    /// Wall time for the whole sequence.
    pub elapsed: Duration,
}

impl TaskProcessor {
    /// Creates a processor using `transcoder` and the given file layout.
    pub fn new(transcoder: Arc<dyn Transcoder>, layout: LayoutConfig) -> Self {
        Self { transcoder, layout }
    }

    /// Runs merge, output directory creation, transcode and cleanup in order.
    ///
    /// The first failing step aborts the rest. A failed transcode leaves the
    /// merged file in place.
    pub async fn process(&self, task: &VideoTask) -> Result<ProcessReport, ProcessError> {
        let started = Instant::now();
        let layout = task.layout(&self.layout);

        info!(video_id = task.video_id, path = ?task.path, "Merging chunks");
        let merge = merge_chunks(&layout.input_dir, &layout.merged_file, &self.layout.chunk_suffix).await?;
        debug!(
            video_id = task.video_id,
            chunks = merge.chunk_count,
            bytes = merge.bytes_written,
            "Chunks merged"
        );

        info!(video_id = task.video_id, path = ?layout.output_dir, "Creating mpeg-dash dir");
        tokio::fs::create_dir_all(&layout.output_dir)
            .await
            .map_err(|e| ProcessError::CreateOutputDir {
                path: layout.output_dir.clone(),
                source: e,
            })?;

        info!(video_id = task.video_id, path = ?layout.merged_file, "Converting to mpeg-dash");
        let transcoded = self
            .transcoder
            .transcode(&layout.merged_file, &layout.manifest)
            .await?;
        debug!(video_id = task.video_id, output = %transcoded.output, "Transcoder output");
        info!(video_id = task.video_id, path = ?layout.output_dir, "Video converted to mpeg-dash");

        tokio::fs::remove_file(&layout.merged_file)
            .await
            .map_err(|e| ProcessError::RemoveMerged {
                path: layout.merged_file.clone(),
                source: e,
            })?;

        Ok(ProcessReport {
            merge,
            manifest: layout.manifest,
            elapsed: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TranscodeError;
    use crate::transcoder::{MockTranscoder, TranscodeOutput};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn task_dir(chunks: &[(&str, &[u8])]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, data) in chunks {
            fs::write(dir.path().join(name), data).unwrap();
        }
        dir
    }

    fn processor(transcoder: MockTranscoder) -> TaskProcessor {
        TaskProcessor::new(Arc::new(transcoder), LayoutConfig::default())
    }

    fn writes_manifest() -> MockTranscoder {
        let mut transcoder = MockTranscoder::new();
        transcoder
            .expect_transcode()
            .times(1)
            .returning(|_input: &Path, manifest: &Path| {
                fs::write(manifest, "<MPD/>").unwrap();
                Ok(TranscodeOutput::default())
            });
        transcoder
    }

    #[tokio::test]
    async fn converts_and_removes_merged_file() {
        let dir = task_dir(&[("c_1.chunk", b"BB"), ("c_0.chunk", b"AA")]);
        let task = VideoTask::new(42, dir.path());

        let mut transcoder = MockTranscoder::new();
        transcoder
            .expect_transcode()
            .times(1)
            .returning(|input: &Path, manifest: &Path| {
                assert_eq!(fs::read_to_string(input).unwrap(), "AABB");
                assert!(manifest.parent().unwrap().is_dir());
                fs::write(manifest, "<MPD/>").unwrap();
                Ok(TranscodeOutput::default())
            });

        let report = processor(transcoder).process(&task).await.unwrap();

        assert_eq!(report.merge.chunk_count, 2);
        assert_eq!(report.manifest, dir.path().join("mpeg-dash/output.mpd"));
        assert!(report.manifest.is_file());
        assert!(!dir.path().join("merged.mp4").exists());
        assert!(dir.path().join("c_0.chunk").exists());
        assert!(dir.path().join("c_1.chunk").exists());
    }

    #[tokio::test]
    async fn existing_output_dir_is_reused() {
        let dir = task_dir(&[("c_0.chunk", b"AA")]);
        fs::create_dir(dir.path().join("mpeg-dash")).unwrap();
        let task = VideoTask::new(1, dir.path());

        processor(writes_manifest()).process(&task).await.unwrap();

        assert!(dir.path().join("mpeg-dash/output.mpd").is_file());
    }

    #[tokio::test]
    async fn transcoder_failure_keeps_merged_file() {
        let dir = task_dir(&[("c_0.chunk", b"AA")]);
        let task = VideoTask::new(2, dir.path());

        let mut transcoder = MockTranscoder::new();
        transcoder.expect_transcode().times(1).returning(|_, _| {
            Err(TranscodeError::Failed {
                code: 1,
                output: "moov atom not found".to_string(),
            })
        });

        let err = processor(transcoder).process(&task).await.unwrap_err();

        assert_eq!(err.stage(), "transcode");
        assert!(err.to_string().contains("moov atom not found"));
        assert_eq!(fs::read(dir.path().join("merged.mp4")).unwrap(), b"AA");
    }

    #[tokio::test]
    async fn merge_failure_skips_transcode() {
        let root = TempDir::new().unwrap();
        let task = VideoTask::new(3, root.path().join("missing"));

        let mut transcoder = MockTranscoder::new();
        transcoder.expect_transcode().never();

        let err = processor(transcoder).process(&task).await.unwrap_err();

        assert_eq!(err.stage(), "merge");
        assert!(!root.path().join("missing/mpeg-dash").exists());
    }

    #[tokio::test]
    async fn output_dir_blocked_by_file_skips_transcode() {
        let dir = task_dir(&[("c_0.chunk", b"AA"), ("mpeg-dash", b"not a directory")]);
        let task = VideoTask::new(4, dir.path());

        let mut transcoder = MockTranscoder::new();
        transcoder.expect_transcode().never();

        let err = processor(transcoder).process(&task).await.unwrap_err();

        assert!(matches!(err, ProcessError::CreateOutputDir { .. }));
        assert!(dir.path().join("merged.mp4").exists());
    }

    #[tokio::test]
    async fn failed_cleanup_is_an_error() {
        let dir = task_dir(&[("c_0.chunk", b"AA")]);
        let task = VideoTask::new(5, dir.path());

        let mut transcoder = MockTranscoder::new();
        transcoder
            .expect_transcode()
            .times(1)
            .returning(|input: &Path, manifest: &Path| {
                fs::write(manifest, "<MPD/>").unwrap();
                fs::remove_file(input).unwrap();
                Ok(TranscodeOutput::default())
            });

        let err = processor(transcoder).process(&task).await.unwrap_err();

        assert_eq!(err.stage(), "remove_merged");
        assert!(dir.path().join("mpeg-dash/output.mpd").is_file());
    }
}

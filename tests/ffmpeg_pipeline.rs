use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use video_converter::config::model::{LayoutConfig, TranscoderConfig};
use video_converter::error::{QueueError, StoreError};
use video_converter::handler::{HandleOutcome, TaskHandler};
use video_converter::processor::TaskProcessor;
use video_converter::queue::{Delivery, MessageBroker};
use video_converter::store::TaskStore;
use video_converter::task::{Confirmation, ErrorRecord, VideoTask};
use video_converter::transcoder::FfmpegTranscoder;

fn ffmpeg_available() -> bool {
    std::process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Renders a short test clip and splits its bytes across out-of-order chunk files.
fn write_chunked_video(dir: &Path) -> Vec<u8> {
    let source = dir.join("source.mp4");
    let status = std::process::Command::new("ffmpeg")
        .args(["-y", "-loglevel", "error", "-f", "lavfi", "-i"])
        .arg("testsrc=duration=1:size=160x120:rate=10")
        .arg(&source)
        .status()
        .expect("run ffmpeg");
    assert!(status.success(), "ffmpeg failed to render test clip");

    let data = fs::read(&source).expect("read test clip");
    fs::remove_file(&source).expect("remove test clip");

    let third = data.len() / 3;
    fs::write(dir.join("upload_10.chunk"), &data[2 * third..]).expect("write chunk");
    fs::write(dir.join("upload_1.chunk"), &data[..third]).expect("write chunk");
    fs::write(dir.join("upload_2.chunk"), &data[third..2 * third]).expect("write chunk");
    data
}

fn processor() -> TaskProcessor {
    let transcoder = FfmpegTranscoder::from_config(&TranscoderConfig::default());
    TaskProcessor::new(Arc::new(transcoder), LayoutConfig::default())
}

#[derive(Default)]
struct MemoryStore {
    processed: Mutex<Vec<i64>>,
    errors: Mutex<Vec<ErrorRecord>>,
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn is_processed(&self, video_id: i64) -> Result<bool, StoreError> {
        Ok(self.processed.lock().unwrap().contains(&video_id))
    }

    async fn mark_processed(&self, video_id: i64) -> Result<(), StoreError> {
        let mut processed = self.processed.lock().unwrap();
        if !processed.contains(&video_id) {
            processed.push(video_id);
        }
        Ok(())
    }

    async fn register_error(&self, record: &ErrorRecord) -> Result<(), StoreError> {
        self.errors.lock().unwrap().push(record.clone());
        Ok(())
    }
}

#[derive(Default)]
struct MemoryBroker {
    acked: Mutex<Vec<Delivery>>,
    confirmations: Mutex<Vec<Confirmation>>,
}

#[async_trait]
impl MessageBroker for MemoryBroker {
    async fn next_delivery(&self) -> Result<Option<Delivery>, QueueError> {
        Ok(None)
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        self.acked.lock().unwrap().push(delivery.clone());
        Ok(())
    }

    async fn publish_confirmation(&self, confirmation: &Confirmation) -> Result<(), QueueError> {
        self.confirmations.lock().unwrap().push(confirmation.clone());
        Ok(())
    }

    async fn pending_count(&self) -> Result<usize, QueueError> {
        Ok(0)
    }
}

#[tokio::test]
async fn converts_chunked_upload_to_dash() {
    if !ffmpeg_available() {
        eprintln!("skipping: ffmpeg not available");
        return;
    }

    let tmp = TempDir::new().expect("tempdir");
    write_chunked_video(tmp.path());

    let report = processor()
        .process(&VideoTask::new(7, tmp.path()))
        .await
        .expect("process video");

    assert_eq!(report.merge.chunk_count, 3);
    assert_eq!(report.manifest, tmp.path().join("mpeg-dash/output.mpd"));

    let manifest = fs::read_to_string(&report.manifest).expect("read manifest");
    assert!(manifest.contains("<MPD"), "manifest is not DASH: {manifest}");
    assert!(!tmp.path().join("merged.mp4").exists());

    // Chunks are left in place.
    assert!(tmp.path().join("upload_1.chunk").is_file());
}

#[tokio::test]
async fn merged_file_matches_original_bytes() {
    let tmp = TempDir::new().expect("tempdir");
    let data: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
    let third = data.len() / 3;
    fs::write(tmp.path().join("x_3.chunk"), &data[2 * third..]).unwrap();
    fs::write(tmp.path().join("x_1.chunk"), &data[..third]).unwrap();
    fs::write(tmp.path().join("x_2.chunk"), &data[third..2 * third]).unwrap();

    let merged: PathBuf = tmp.path().join("merged.bin");
    let summary = video_converter::chunk::merge_chunks(tmp.path(), &merged, ".chunk")
        .await
        .expect("merge");

    assert_eq!(summary.chunk_count, 3);
    assert_eq!(summary.bytes_written, data.len() as u64);
    assert_eq!(fs::read(&merged).unwrap(), data);
}

#[tokio::test]
async fn handler_confirms_once_and_skips_redelivery() {
    if !ffmpeg_available() {
        eprintln!("skipping: ffmpeg not available");
        return;
    }

    let tmp = TempDir::new().expect("tempdir");
    write_chunked_video(tmp.path());

    let store = Arc::new(MemoryStore::default());
    let broker = Arc::new(MemoryBroker::default());
    let handler = TaskHandler::new(store.clone(), broker.clone(), processor());

    let body = serde_json::json!({"video_id": 11, "path": tmp.path()}).to_string();

    let first = handler.handle(&Delivery::new(body.clone())).await.expect("first delivery");
    assert!(matches!(first, HandleOutcome::Processed(_)));

    let second = handler.handle(&Delivery::new(body)).await.expect("redelivery");
    assert!(matches!(second, HandleOutcome::AlreadyProcessed));

    let confirmations = broker.confirmations.lock().unwrap();
    assert_eq!(confirmations.len(), 1);
    assert_eq!(confirmations[0].video_id, 11);
    assert_eq!(confirmations[0].path, tmp.path());

    assert_eq!(broker.acked.lock().unwrap().len(), 2);
    assert!(store.errors.lock().unwrap().is_empty());
}

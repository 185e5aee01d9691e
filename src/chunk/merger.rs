//! Concatenates chunk files into a single video file.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::sequence::sequence_number;
use crate::error::MergeError;

/// A chunk file and its position in the upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub path: PathBuf,
    pub sequence: i64,
}

/// Outcome of a successful merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    /// Number of chunks concatenated.
    pub chunk_count: usize,
    /// Total bytes written to the merged file.
    pub bytes_written: u64,
}

/// Lists the chunks in `input_dir` ending in `suffix`, ordered by sequence number.
///
/// Chunks sharing a sequence number keep their lexical file name order.
pub fn discover_chunks(input_dir: &Path, suffix: &str) -> Result<Vec<Chunk>, MergeError> {
    if !input_dir.is_dir() {
        return Err(MergeError::Discovery {
            dir: input_dir.to_path_buf(),
            message: "not a readable directory".to_string(),
        });
    }

    let pattern = format!(
        "{}/*{}",
        glob::Pattern::escape(&input_dir.to_string_lossy()),
        glob::Pattern::escape(suffix)
    );

    let paths = glob::glob(&pattern).map_err(|e| MergeError::Discovery {
        dir: input_dir.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut chunks = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| MergeError::Discovery {
            dir: input_dir.to_path_buf(),
            message: e.to_string(),
        })?;
        if !path.is_file() {
            continue;
        }
        let sequence = sequence_number(&path);
        chunks.push(Chunk { path, sequence });
    }

    chunks.sort_by_key(|c| c.sequence);

    for pair in chunks.windows(2) {
        if pair[0].sequence == pair[1].sequence {
            warn!(
                sequence = pair[0].sequence,
                first = ?pair[0].path,
                second = ?pair[1].path,
                "Chunks share a sequence number"
            );
        }
    }

    Ok(chunks)
}

/// Concatenates every chunk in `input_dir` into `output_file`.
///
/// The output is created or truncated. On failure it may be left partially
/// written. Chunk files are only read.
pub async fn merge_chunks(
    input_dir: &Path,
    output_file: &Path,
    suffix: &str,
) -> Result<MergeSummary, MergeError> {
    let chunks = {
        let dir = input_dir.to_path_buf();
        let suffix = suffix.to_string();
        // Directory listing and stat calls block
        tokio::task::spawn_blocking(move || discover_chunks(&dir, &suffix))
            .await
            .map_err(|e| MergeError::Discovery {
                dir: input_dir.to_path_buf(),
                message: e.to_string(),
            })??
    };

    let mut output = File::create(output_file)
        .await
        .map_err(|e| MergeError::FileAccess {
            path: output_file.to_path_buf(),
            source: e,
        })?;

    let mut bytes_written = 0;
    for chunk in &chunks {
        let mut input = File::open(&chunk.path)
            .await
            .map_err(|e| MergeError::FileAccess {
                path: chunk.path.clone(),
                source: e,
            })?;

        let copied = tokio::io::copy(&mut input, &mut output)
            .await
            .map_err(|e| MergeError::Copy {
                chunk: chunk.path.clone(),
                source: e,
            })?;

        debug!(chunk = ?chunk.path, sequence = chunk.sequence, bytes = copied, "Chunk appended");
        bytes_written += copied;
    }

    output.flush().await.map_err(|e| MergeError::Flush {
        path: output_file.to_path_buf(),
        source: e,
    })?;

    Ok(MergeSummary {
        chunk_count: chunks.len(),
        bytes_written,
    })
}

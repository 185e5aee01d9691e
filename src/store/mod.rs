//! Persistence of processing and error records.

pub mod redis;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::task::ErrorRecord;

pub use self::redis::RedisTaskStore;

/// Records which videos are done and which failures happened.
///
/// Implementations must tolerate concurrent writers for the same video id.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Returns true if a processing record exists for `video_id`.
    async fn is_processed(&self, video_id: i64) -> Result<bool, StoreError>;

    /// Writes the processing record for `video_id`. Marking twice is not an error.
    async fn mark_processed(&self, video_id: i64) -> Result<(), StoreError>;

    /// Appends an error record.
    async fn register_error(&self, record: &ErrorRecord) -> Result<(), StoreError>;
}

//! Redis-backed task store.

use async_trait::async_trait;
use chrono::Utc;
use redis::AsyncCommands;
use tracing::debug;

use super::TaskStore;
use crate::error::StoreError;
use crate::task::ErrorRecord;

const PROCESSED_PREFIX: &str = "video:processed:";
const ERRORS_KEY: &str = "video:errors";

/// Stores processing records as `video:processed:<id>` keys and error records
/// in the `video:errors` list.
#[derive(Clone)]
pub struct RedisTaskStore {
    connection: redis::aio::ConnectionManager,
}

impl RedisTaskStore {
    /// Connects to the specified Redis URL.
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url).map_err(|e| StoreError::ConnectionFailed {
            url: redis_url.to_string(),
            message: e.to_string(),
        })?;

        let connection = client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::ConnectionFailed {
                url: redis_url.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self { connection })
    }

    /// Returns up to `limit` of the most recent error records, oldest first.
    pub async fn recent_errors(&self, limit: usize) -> Result<Vec<ErrorRecord>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut conn = self.connection.clone();
        let start = -(limit.min(isize::MAX as usize) as isize);
        let raw: Vec<String> = conn
            .lrange(ERRORS_KEY, start, -1)
            .await
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        raw.iter()
            .map(|json| serde_json::from_str(json).map_err(|e| StoreError::ReadFailed(e.to_string())))
            .collect()
    }
}

fn processed_key(video_id: i64) -> String {
    format!("{}{}", PROCESSED_PREFIX, video_id)
}

#[async_trait]
impl TaskStore for RedisTaskStore {
    async fn is_processed(&self, video_id: i64) -> Result<bool, StoreError> {
        let mut conn = self.connection.clone();
        conn.exists::<_, bool>(processed_key(video_id))
            .await
            .map_err(|e| StoreError::LookupFailed {
                video_id,
                message: e.to_string(),
            })
    }

    async fn mark_processed(&self, video_id: i64) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();

        // SETNX keeps the first completion time if two workers race on one video
        let created: bool = conn
            .set_nx(processed_key(video_id), Utc::now().to_rfc3339())
            .await
            .map_err(|e| StoreError::MarkFailed {
                video_id,
                message: e.to_string(),
            })?;

        if !created {
            debug!(video_id, "Processing record already present");
        }
        Ok(())
    }

    async fn register_error(&self, record: &ErrorRecord) -> Result<(), StoreError> {
        let json =
            serde_json::to_string(record).map_err(|e| StoreError::RegisterFailed(e.to_string()))?;

        let mut conn = self.connection.clone();
        conn.rpush::<_, _, ()>(ERRORS_KEY, json)
            .await
            .map_err(|e| StoreError::RegisterFailed(e.to_string()))
    }
}

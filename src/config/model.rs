//! Configuration data structures.

use serde::{Deserialize, Serialize};

/// Root configuration structure containing all settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Redis connection settings.
    #[serde(default)]
    pub redis: RedisConfig,

    /// Inbound task queue settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Where confirmation events are published.
    #[serde(default)]
    pub confirmation: ConfirmationConfig,

    /// External transcoder settings.
    #[serde(default)]
    pub transcoder: TranscoderConfig,

    /// File names inside a task directory.
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Dispatch settings.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Prometheus metrics settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

/// Redis connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis server hostname.
    #[serde(default = "default_redis_host")]
    pub host: String,

    /// Redis server port.
    #[serde(default = "default_redis_port")]
    pub port: u16,

    /// Redis database number.
    #[serde(default)]
    pub db: u8,

    /// Optional Redis password.
    #[serde(default)]
    pub password: Option<String>,
}

impl RedisConfig {
    /// Builds the connection URL.
    pub fn url(&self) -> String {
        match &self.password {
            Some(pass) => format!("redis://:{}@{}:{}/{}", pass, self.host, self.port, self.db),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

/// Inbound queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// List holding pending task messages.
    #[serde(default = "default_task_queue")]
    pub task_queue: String,

    /// List holding delivered but unacknowledged messages.
    #[serde(default = "default_processing_queue")]
    pub processing_queue: String,

    /// Seconds to wait before polling an empty queue again.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
}

/// Destination for confirmation events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    /// Exchange name, the first half of the pub/sub channel.
    #[serde(default = "default_exchange")]
    pub exchange: String,

    /// Routing key, the second half of the pub/sub channel.
    #[serde(default = "default_routing_key")]
    pub routing_key: String,

    /// List that durably receives every confirmation.
    #[serde(default = "default_confirmation_queue")]
    pub queue: String,
}

impl ConfirmationConfig {
    /// Pub/sub channel confirmations are announced on.
    pub fn channel(&self) -> String {
        format!("{}.{}", self.exchange, self.routing_key)
    }
}

/// External transcoder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscoderConfig {
    /// Executable to run.
    #[serde(default = "default_transcoder_binary")]
    pub binary: String,

    /// Kill the transcoder after this many seconds. Unbounded when unset.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,

    /// Extra arguments inserted before the output path.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

/// File naming inside a task directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Suffix identifying chunk files.
    #[serde(default = "default_chunk_suffix")]
    pub chunk_suffix: String,

    /// Name of the concatenated file.
    #[serde(default = "default_merged_file")]
    pub merged_file: String,

    /// Name of the output subdirectory.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Name of the manifest inside the output directory.
    #[serde(default = "default_manifest")]
    pub manifest: String,
}

/// Dispatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Maximum number of tasks handled at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    /// Whether to enable Prometheus metrics endpoint.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Port for the Prometheus metrics HTTP server.
    #[serde(default = "default_prometheus_port")]
    pub port: u16,
}

// Default value functions

fn default_log_level() -> String {
    "info".to_string()
}

fn default_redis_host() -> String {
    "redis".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_task_queue() -> String {
    "video:tasks".to_string()
}

fn default_processing_queue() -> String {
    "video:tasks:processing".to_string()
}

fn default_poll_interval() -> u64 {
    5
}

fn default_exchange() -> String {
    "video".to_string()
}

fn default_routing_key() -> String {
    "converted".to_string()
}

fn default_confirmation_queue() -> String {
    "video:converted".to_string()
}

fn default_transcoder_binary() -> String {
    "ffmpeg".to_string()
}

fn default_chunk_suffix() -> String {
    ".chunk".to_string()
}

fn default_merged_file() -> String {
    "merged.mp4".to_string()
}

fn default_output_dir() -> String {
    "mpeg-dash".to_string()
}

fn default_manifest() -> String {
    "output.mpd".to_string()
}

fn default_concurrency() -> usize {
    1
}

fn default_prometheus_port() -> u16 {
    9090
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            redis: RedisConfig::default(),
            queue: QueueConfig::default(),
            confirmation: ConfirmationConfig::default(),
            transcoder: TranscoderConfig::default(),
            layout: LayoutConfig::default(),
            worker: WorkerConfig::default(),
            prometheus: PrometheusConfig::default(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: default_redis_host(),
            port: default_redis_port(),
            db: 0,
            password: None,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            task_queue: default_task_queue(),
            processing_queue: default_processing_queue(),
            poll_interval_seconds: default_poll_interval(),
        }
    }
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            exchange: default_exchange(),
            routing_key: default_routing_key(),
            queue: default_confirmation_queue(),
        }
    }
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            binary: default_transcoder_binary(),
            timeout_seconds: None,
            extra_args: Vec::new(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            chunk_suffix: default_chunk_suffix(),
            merged_file: default_merged_file(),
            output_dir: default_output_dir(),
            manifest: default_manifest(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            port: default_prometheus_port(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.queue.task_queue, "video:tasks");
        assert_eq!(config.layout.chunk_suffix, ".chunk");
        assert_eq!(config.transcoder.binary, "ffmpeg");
        assert_eq!(config.worker.concurrency, 1);
        assert!(config.transcoder.timeout_seconds.is_none());
    }

    #[test]
    fn default_matches_empty_document() {
        let parsed: AppConfig = serde_yaml::from_str("{}").unwrap();
        let built = AppConfig::default();

        assert_eq!(built.log_level, parsed.log_level);
        assert_eq!(built.redis.url(), parsed.redis.url());
        assert_eq!(built.queue.task_queue, parsed.queue.task_queue);
        assert_eq!(built.queue.processing_queue, parsed.queue.processing_queue);
        assert_eq!(built.queue.poll_interval_seconds, parsed.queue.poll_interval_seconds);
        assert_eq!(built.confirmation.channel(), parsed.confirmation.channel());
        assert_eq!(built.confirmation.queue, parsed.confirmation.queue);
        assert_eq!(built.transcoder.binary, parsed.transcoder.binary);
        assert_eq!(built.transcoder.timeout_seconds, parsed.transcoder.timeout_seconds);
        assert_eq!(built.transcoder.extra_args, parsed.transcoder.extra_args);
        assert_eq!(built.layout.chunk_suffix, parsed.layout.chunk_suffix);
        assert_eq!(built.layout.merged_file, parsed.layout.merged_file);
        assert_eq!(built.layout.output_dir, parsed.layout.output_dir);
        assert_eq!(built.layout.manifest, parsed.layout.manifest);
        assert_eq!(built.worker.concurrency, parsed.worker.concurrency);
        assert_eq!(built.prometheus.enabled, parsed.prometheus.enabled);
        assert_eq!(built.prometheus.port, parsed.prometheus.port);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let yaml = r#"
redis:
  host: localhost
  password: secret
confirmation:
  exchange: media
transcoder:
  timeout_seconds: 600
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.redis.url(), "redis://:secret@localhost:6379/0");
        assert_eq!(config.confirmation.channel(), "media.converted");
        assert_eq!(config.transcoder.timeout_seconds, Some(600));
        assert_eq!(config.transcoder.binary, "ffmpeg");
    }

    #[test]
    fn redis_url_without_password() {
        assert_eq!(RedisConfig::default().url(), "redis://redis:6379/0");
    }
}

//! Video converter - merges uploaded chunks and converts them to MPEG-DASH.
//!
//! Task messages are consumed from a Redis list. Each task names a directory
//! of numbered chunks which are merged, transcoded with ffmpeg, and confirmed
//! on a downstream queue once a processing record exists.

pub mod chunk;
pub mod cli;
pub mod config;
pub mod error;
pub mod handler;
pub mod metrics;
pub mod processor;
pub mod queue;
pub mod store;
pub mod task;
pub mod transcoder;
pub mod validation;
pub mod worker;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::handler::TaskHandler;
use crate::metrics::{Metrics, MetricsServer};
use crate::processor::TaskProcessor;
use crate::queue::{MessageBroker, RedisBroker};
use crate::store::RedisTaskStore;
use crate::task::VideoTask;
use crate::transcoder::FfmpegTranscoder;
use crate::worker::Worker;

/// Runs the converter with the provided CLI arguments.
pub async fn run(cli: Cli) -> Result<()> {
    setup_logging(&log_level(&cli))?;

    match cli.command {
        Commands::Run => run_pipeline(&cli.config).await,
        Commands::ConfigValidate => validate_config(&cli.config).await,
        Commands::ConfigShow => show_config(&cli.config).await,
        Commands::QueueList => list_queue(&cli.config).await,
        Commands::QueueRequeue => requeue(&cli.config).await,
        Commands::Enqueue { video_id, ref path } => enqueue(&cli.config, video_id, path).await,
        Commands::ErrorsList { limit } => list_errors(&cli.config, limit).await,
    }
}

/// Verbosity flags win, then the config file, then `info`.
fn log_level(cli: &Cli) -> String {
    if let Some(level) = cli.log_level() {
        return level.to_string();
    }
    config::loader::load_from_path(&cli.config)
        .map(|config| config.log_level)
        .unwrap_or_else(|_| "info".to_string())
}

/// Initializes the tracing subscriber for structured logging.
fn setup_logging(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .json()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    Ok(())
}

/// Consumes tasks until Ctrl+C, then drains in-flight work.
async fn run_pipeline(config_path: &Path) -> Result<()> {
    info!("Starting video converter");

    let config = config::loader::load_and_validate(config_path).await?;
    info!("Configuration loaded and validated");

    let broker = Arc::new(connect_broker(&config).await?);
    let store = Arc::new(connect_store(&config).await?);
    info!("Connected to Redis");

    let transcoder = Arc::new(FfmpegTranscoder::from_config(&config.transcoder));
    let processor = TaskProcessor::new(transcoder, config.layout.clone());
    let broker: Arc<dyn MessageBroker> = broker;
    let handler = Arc::new(TaskHandler::new(store, broker.clone(), processor));

    let mut worker = Worker::new(
        broker,
        handler,
        config.worker.concurrency,
        Duration::from_secs(config.queue.poll_interval_seconds),
    );

    if config.prometheus.enabled {
        let metrics = Arc::new(Metrics::new()?);
        let server = MetricsServer::new(metrics.clone(), config.prometheus.port);
        tokio::spawn(async move {
            if let Err(e) = server.start().await {
                error!(error = %e, "Metrics server failed");
            }
        });
        worker = worker.with_metrics(metrics);
    }

    worker
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Received shutdown signal");
        })
        .await?;

    info!("Video converter stopped");
    Ok(())
}

async fn connect_broker(config: &AppConfig) -> Result<RedisBroker, AppError> {
    let broker = RedisBroker::connect(
        &config.redis.url(),
        config.queue.clone(),
        config.confirmation.clone(),
    )
    .await?;
    Ok(broker)
}

async fn connect_store(config: &AppConfig) -> Result<RedisTaskStore, AppError> {
    Ok(RedisTaskStore::connect(&config.redis.url()).await?)
}

/// Validates the configuration file and reports any issues.
async fn validate_config(config_path: &Path) -> Result<()> {
    let config = config::loader::load_and_validate(config_path).await?;

    println!("Configuration is valid.");
    println!("  Task queue:   {}", config.queue.task_queue);
    println!("  Confirmation: {} -> {}", config.confirmation.channel(), config.confirmation.queue);
    println!("  Transcoder:   {}", config.transcoder.binary);
    println!("  Concurrency:  {}", config.worker.concurrency);

    Ok(())
}

/// Displays the parsed configuration.
async fn show_config(config_path: &Path) -> Result<()> {
    let config = config::loader::load_and_validate(config_path).await?;
    let yaml = serde_yaml::to_string(&config)?;
    println!("{}", yaml);
    Ok(())
}

/// Lists pending and in-flight messages.
async fn list_queue(config_path: &Path) -> Result<()> {
    let config = config::loader::load_and_validate(config_path).await?;
    let broker = connect_broker(&config).await?;

    let pending = broker.list_pending().await?;
    if pending.is_empty() {
        println!("Queue is empty.");
    } else {
        println!("Queue ({} tasks):", pending.len());
        for body in pending {
            println!("  {}", describe(&body));
        }
    }

    let in_flight = broker.list_in_flight().await?;
    if !in_flight.is_empty() {
        println!("\nIn flight ({} tasks):", in_flight.len());
        for body in in_flight {
            println!("  {}", describe(&body));
        }
    }

    Ok(())
}

fn describe(body: &str) -> String {
    match VideoTask::from_slice(body.as_bytes()) {
        Ok(task) => format!("{} - {}", task.video_id, task.path.display()),
        Err(_) => format!("<malformed> {}", body),
    }
}

/// Returns unacknowledged messages to the task queue.
async fn requeue(config_path: &Path) -> Result<()> {
    let config = config::loader::load_and_validate(config_path).await?;
    let broker = connect_broker(&config).await?;

    let count = broker.requeue_in_flight().await?;
    println!("Requeued {} task(s).", count);

    Ok(())
}

/// Queues a conversion task.
async fn enqueue(config_path: &Path, video_id: i64, path: &Path) -> Result<()> {
    let config = config::loader::load_and_validate(config_path).await?;
    let broker = connect_broker(&config).await?;

    broker.enqueue(&VideoTask::new(video_id, path)).await?;
    println!("Queued video {} ({}).", video_id, path.display());

    Ok(())
}

/// Prints the most recent error records.
async fn list_errors(config_path: &Path, limit: usize) -> Result<()> {
    let config = config::loader::load_and_validate(config_path).await?;
    let store = connect_store(&config).await?;

    let records = store.recent_errors(limit).await?;
    if records.is_empty() {
        println!("No errors recorded.");
        return Ok(());
    }

    for record in records {
        let video = record
            .video_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{} [{}] {}: {}", record.time.to_rfc3339(), video, record.error, record.details);
    }

    Ok(())
}

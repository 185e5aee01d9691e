//! Command-line interface definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Merges uploaded video chunks and converts them to MPEG-DASH.
#[derive(Parser, Debug)]
#[command(name = "video-converter", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "/config/converter.yaml", env = "CONFIG_PATH", global = true)]
    pub config: PathBuf,

    /// Increase logging verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Returns the log level forced by verbosity flags, if any.
    pub fn log_level(&self) -> Option<&'static str> {
        match self.verbose {
            0 => None,
            1 => Some("debug"),
            _ => Some("trace"),
        }
    }
}

/// Available subcommands for the converter.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start consuming conversion tasks.
    Run,

    /// Validate the configuration file without starting.
    #[command(name = "config-validate")]
    ConfigValidate,

    /// Display the parsed configuration.
    #[command(name = "config-show")]
    ConfigShow,

    /// List pending and in-flight task messages.
    #[command(name = "queue-list")]
    QueueList,

    /// Move in-flight messages back to the task queue. Run only while no worker is active.
    #[command(name = "queue-requeue")]
    QueueRequeue,

    /// Queue a conversion task.
    Enqueue {
        /// Identifier of the video.
        video_id: i64,
        /// Directory holding the uploaded chunks.
        path: PathBuf,
    },

    /// Show the most recent processing errors.
    #[command(name = "errors-list")]
    ErrorsList {
        /// Maximum number of records to show.
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

//! Startup checks for the converter configuration.

pub mod rules;

use std::fmt;
use std::process::Stdio;

use tokio::process::Command;

use crate::config::model::AppConfig;
use crate::error::CapabilityError;

/// Whether an issue stops the converter from starting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Reject,
    Warn,
}

/// One problem found in the configuration, keyed by its YAML field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub severity: Severity,
    /// Dotted field path, e.g. `layout.chunk_suffix`.
    pub field: &'static str,
    pub message: String,
}

/// Every issue found in one configuration.
#[derive(Debug, Default)]
pub struct ConfigReview {
    issues: Vec<ConfigIssue>,
}

impl ConfigReview {
    /// Records an issue that blocks startup.
    pub fn reject(&mut self, field: &'static str, message: impl Into<String>) {
        self.push(Severity::Reject, field, message);
    }

    /// Records an issue that is only logged.
    pub fn warn(&mut self, field: &'static str, message: impl Into<String>) {
        self.push(Severity::Warn, field, message);
    }

    fn push(&mut self, severity: Severity, field: &'static str, message: impl Into<String>) {
        self.issues.push(ConfigIssue {
            severity,
            field,
            message: message.into(),
        });
    }

    pub fn rejections(&self) -> impl Iterator<Item = &ConfigIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Reject)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ConfigIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warn)
    }

    /// True when nothing blocks startup.
    pub fn is_accepted(&self) -> bool {
        self.rejections().next().is_none()
    }

    pub fn rejection_count(&self) -> usize {
        self.rejections().count()
    }
}

/// One line per issue, rejections first.
impl fmt::Display for ConfigReview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for issue in self.rejections().chain(self.warnings()) {
            let label = match issue.severity {
                Severity::Reject => "rejected",
                Severity::Warn => "warning",
            };
            writeln!(f, "{label} {}: {}", issue.field, issue.message)?;
        }
        Ok(())
    }
}

/// Result of running `<binary> -version` on the configured transcoder.
#[derive(Debug, Clone)]
pub struct TranscoderProbe {
    pub binary: String,
    /// First line of the version banner, when the binary ran.
    pub version: Option<String>,
}

impl TranscoderProbe {
    /// Runs the version probe. A missing binary is recorded, not returned.
    pub async fn run(binary: &str) -> Self {
        let version = match read_version(binary).await {
            Ok(version) => Some(version),
            Err(e) => {
                tracing::debug!(error = %e, "Transcoder probe failed");
                None
            }
        };

        Self {
            binary: binary.to_string(),
            version,
        }
    }

    pub fn is_available(&self) -> bool {
        self.version.is_some()
    }
}

async fn read_version(binary: &str) -> Result<String, CapabilityError> {
    let output = Command::new(binary)
        .arg("-version")
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CapabilityError::ToolNotFound {
                tool: binary.to_string(),
            },
            _ => CapabilityError::CommandFailed {
                command: format!("{} -version", binary),
                message: e.to_string(),
            },
        })?;

    if !output.status.success() {
        return Err(CapabilityError::CommandFailed {
            command: format!("{} -version", binary),
            message: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
}

/// Checks `config` and whether its transcoder can run on this host.
pub fn review(config: &AppConfig, probe: &TranscoderProbe) -> ConfigReview {
    let mut review = rules::check(config);

    // Tasks fail at the transcode stage instead
    if !probe.is_available() {
        review.warn(
            "transcoder.binary",
            format!("'{}' did not answer -version", probe.binary),
        );
    }

    review
}

#[cfg(test)]
mod tests {
    use super::*;

    fn available() -> TranscoderProbe {
        TranscoderProbe {
            binary: "ffmpeg".to_string(),
            version: Some("ffmpeg version 6.1".to_string()),
        }
    }

    #[tokio::test]
    async fn missing_transcoder_is_a_warning() {
        let probe = TranscoderProbe::run("definitely-not-a-transcoder-binary").await;
        assert!(!probe.is_available());

        let review = review(&AppConfig::default(), &probe);
        assert!(review.is_accepted());
        assert_eq!(review.warnings().count(), 1);
        assert_eq!(review.warnings().next().unwrap().field, "transcoder.binary");
    }

    #[test]
    fn empty_suffix_rejects_config() {
        let mut config = AppConfig::default();
        config.layout.chunk_suffix.clear();

        let review = review(&config, &available());
        assert!(!review.is_accepted());
        assert_eq!(review.rejection_count(), 1);
    }

    #[test]
    fn display_lists_rejections_before_warnings() {
        let mut review = ConfigReview::default();
        review.warn("log_level", "unknown level 'loud'");
        review.reject("worker.concurrency", "must be at least 1");

        assert_eq!(
            review.to_string(),
            "rejected worker.concurrency: must be at least 1\n\
             warning log_level: unknown level 'loud'\n"
        );
    }
}

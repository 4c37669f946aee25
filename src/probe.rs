// src/probe.rs
use log::debug;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use crate::config::{CommandSpec, ProbeSettings};
use crate::errors::{AnimationError, Result};

/// Asks `ffprobe` for a media file's container duration.
#[derive(Debug, Clone)]
pub struct MediaProber {
    ffprobe: CommandSpec,
    timeout: Duration,
}

impl MediaProber {
    pub fn new(settings: &ProbeSettings) -> Self {
        Self {
            ffprobe: settings.ffprobe.clone(),
            timeout: settings.timeout(),
        }
    }

    /// Duration in seconds. Callers treat the error as advisory.
    pub async fn probe_duration(&self, path: &Path) -> Result<f64> {
        let mut cmd = self.ffprobe.command();
        cmd.args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| AnimationError::Timeout {
                stage: "Duration probe",
                seconds: self.timeout.as_secs(),
            })?
            .map_err(|e| AnimationError::Probe(format!("failed to run ffprobe: {}", e)))?;

        if !output.status.success() {
            return Err(AnimationError::Probe(format!(
                "ffprobe failed for '{}': {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let duration = parse_duration(&String::from_utf8_lossy(&output.stdout))?;
        debug!("Probed duration of {}: {}s", path.display(), duration);
        Ok(duration)
    }
}

/// Parses ffprobe's bare duration output; rejects `N/A`, negatives and non-finite values.
pub fn parse_duration(raw: &str) -> Result<f64> {
    let trimmed = raw.trim();
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| AnimationError::Probe(format!("unparsable duration '{}'", trimmed)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("4.200000\n").unwrap(), 4.2);
        assert_eq!(parse_duration("0").unwrap(), 0.0);
        assert!(parse_duration("N/A").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("-1.0").is_err());
        assert!(parse_duration("inf").is_err());
    }

    #[tokio::test]
    async fn test_missing_binary_is_an_error() {
        let prober = MediaProber::new(&ProbeSettings {
            ffprobe: CommandSpec::parse("no-such-ffprobe-binary").unwrap(),
            timeout_secs: 5,
        });
        let err = prober.probe_duration(Path::new("/tmp/none.mp4")).await.unwrap_err();
        assert!(matches!(err, AnimationError::Probe(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_reads_stdout_of_probe_command() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("ffprobe.sh");
        std::fs::write(&fake, "echo 4.2\n").unwrap();

        let prober = MediaProber::new(&ProbeSettings {
            ffprobe: CommandSpec::parse(&format!("sh {}", fake.display())).unwrap(),
            timeout_secs: 5,
        });
        let duration = prober.probe_duration(Path::new("/tmp/video.mp4")).await.unwrap();
        assert_eq!(duration, 4.2);
    }
}

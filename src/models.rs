// src/models.rs
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::errors::{AnimationError, ErrorKind};

/// Inbound body of `POST /api/generate-animation`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
        }
    }

    /// The trimmed prompt, or `None` when it is missing or blank.
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }
}

/// A complete, runnable scene script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedProgram {
    pub source_text: String,
    pub entry_point: String,
}

#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub exited_cleanly: bool,
    pub status: String,
    pub stdout: String,
    pub stderr: String,
}

impl RenderOutcome {
    /// Turns an unclean exit into a render error.
    pub fn into_result(self) -> Result<Self, AnimationError> {
        if self.exited_cleanly {
            Ok(self)
        } else {
            Err(AnimationError::RenderFailed {
                status: self.status,
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedArtifact {
    pub absolute_path: PathBuf,
    /// Root-relative URL with forward slashes, e.g. `/animations/videos/720p30/Scene.mp4`.
    pub public_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub video_url: String,
    pub duration: f64,
    pub message: String,
}

impl GenerationResult {
    pub fn new(video_url: String, duration: f64) -> Self {
        Self {
            message: format!("Animation created successfully ({:.1} seconds)", duration),
            video_url,
            duration,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationFailure {
    pub error_kind: ErrorKind,
    pub http_status: u16,
    pub message: &'static str,
}

impl From<ErrorKind> for GenerationFailure {
    fn from(kind: ErrorKind) -> Self {
        Self {
            error_kind: kind,
            http_status: kind.status_code(),
            message: kind.user_message(),
        }
    }
}

impl From<&AnimationError> for GenerationFailure {
    fn from(err: &AnimationError) -> Self {
        err.kind().into()
    }
}

/// Wire shape of every failure response.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ApiError {
    pub error: String,
}

impl From<&GenerationFailure> for ApiError {
    fn from(failure: &GenerationFailure) -> Self {
        Self {
            error: failure.message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_prompts_are_missing() {
        assert_eq!(GenerationRequest::default().prompt(), None);
        assert_eq!(GenerationRequest::new("").prompt(), None);
        assert_eq!(GenerationRequest::new(" \n\t ").prompt(), None);
        assert_eq!(GenerationRequest::new("  pendulum ").prompt(), Some("pendulum"));
    }

    #[test]
    fn test_result_message_and_wire_names() {
        let result = GenerationResult::new("/animations/a.mp4".to_string(), 4.2);
        assert_eq!(result.message, "Animation created successfully (4.2 seconds)");

        let zero = GenerationResult::new("/animations/a.mp4".to_string(), 0.0);
        assert_eq!(zero.message, "Animation created successfully (0.0 seconds)");

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["videoUrl"], "/animations/a.mp4");
        assert_eq!(json["duration"], 4.2);
    }

    #[test]
    fn test_unclean_outcome_is_render_error() {
        let outcome = RenderOutcome {
            exited_cleanly: false,
            status: "exit status: 1".to_string(),
            stdout: String::new(),
            stderr: "Traceback".to_string(),
        };
        let err = outcome.into_result().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Render);
    }
}

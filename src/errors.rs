// src/errors.rs
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnimationError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML config: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API request failed with status {status}: {body}")]
    ApiError { status: u16, body: String },

    #[error("Unexpected response structure: {0}")]
    UnexpectedResponse(String),

    #[error("Received empty text response from model")]
    EmptyResponse,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider '{0}' not found")]
    ProviderNotFound(String),

    #[error("Prompt is required")]
    EmptyPrompt,

    #[error("No fenced code block found in model response")]
    NoCodeBlock,

    #[error("Declared entry point '{0}' is not defined in the generated code")]
    UndefinedEntryPoint(String),

    #[error("{stage} timed out after {seconds}s")]
    Timeout { stage: &'static str, seconds: u64 },

    #[error("Code synthesis failed: {source}")]
    Synthesis {
        #[source]
        source: Box<AnimationError>,
    },

    #[error("Failed to start render process: {0}")]
    RenderSpawn(#[source] std::io::Error),

    #[error("Render process exited with {status}")]
    RenderFailed { status: String },

    #[error("Render process timed out after {0}s")]
    RenderTimeout(u64),

    #[error("No video file found in {searched:?}")]
    ArtifactNotFound { searched: Vec<PathBuf> },

    #[error("{} is outside the public root", path.display())]
    OutsidePublicRoot { path: PathBuf },

    #[error("Duration probe failed: {0}")]
    Probe(String),
}

impl AnimationError {
    /// Wraps any error raised while producing code into the synthesis stage.
    pub fn synthesis(source: AnimationError) -> Self {
        match source {
            already @ AnimationError::Synthesis { .. } => already,
            other => AnimationError::Synthesis {
                source: Box::new(other),
            },
        }
    }

    /// The caller-facing category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnimationError::EmptyPrompt => ErrorKind::Validation,
            AnimationError::Synthesis { .. }
            | AnimationError::NoCodeBlock
            | AnimationError::UndefinedEntryPoint(_) => ErrorKind::Synthesis,
            AnimationError::RenderSpawn(_)
            | AnimationError::RenderFailed { .. }
            | AnimationError::RenderTimeout(_) => ErrorKind::Render,
            AnimationError::ArtifactNotFound { .. } => ErrorKind::ArtifactNotFound,
            _ => ErrorKind::Unexpected,
        }
    }
}

/// Failure categories surfaced to HTTP callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    Validation,
    Synthesis,
    Render,
    ArtifactNotFound,
    Unexpected,
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            _ => 500,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "Prompt is required",
            ErrorKind::Synthesis => {
                "Failed to generate animation code. Please try a different prompt."
            }
            ErrorKind::Render => "Failed to render animation. Please try a simpler concept.",
            ErrorKind::ArtifactNotFound => "Animation was generated but video file not found",
            ErrorKind::Unexpected => "An unexpected error occurred",
        }
    }
}

pub type Result<T> = std::result::Result<T, AnimationError>;

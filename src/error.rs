//! Error types for pychat

use std::{path::PathBuf, process::ExitStatus, time::Duration};

use thiserror::Error;

/// Result type alias using [`PyChatError`]
pub type Result<T> = std::result::Result<T, PyChatError>;

/// Main error type for pychat
#[derive(Debug, Error)]
pub enum PyChatError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration parse error
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    /// The interpreter could not be started
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The script process exited unsuccessfully without producing a result
    #[error("Script exited with {status}: {stderr}")]
    ScriptFailed { status: ExitStatus, stderr: String },

    /// The script produced no result or an unusable one
    #[error("Invalid script output: {0}")]
    InvalidScriptOutput(String),

    /// The script did not finish in time
    #[error("Script timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Chat messages failed validation
    #[error("Invalid messages: {0}")]
    InvalidMessages(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl PyChatError {
    /// Short machine-readable category, reported as `error_type` on responses
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::Spawn { .. } => "spawn_error",
            Self::Timeout(_) => "timeout",
            Self::ScriptFailed { .. } => "script_error",
            Self::InvalidScriptOutput(_) | Self::Json(_) => "invalid_output",
            Self::InvalidMessages(_) | Self::InvalidInput(_) => "invalid_input",
            _ => "unknown",
        }
    }
}

impl From<String> for PyChatError {
    fn from(s: String) -> Self {
        PyChatError::Other(s)
    }
}

impl From<&str> for PyChatError {
    fn from(s: &str) -> Self {
        PyChatError::Other(s.to_string())
    }
}

//! Error types for pipeline operations
//!
//! Module errors are wrapped, not flattened, so `source()` chains reach the
//! original IO or Parquet failure while `user_message()` stays readable.

use std::path::PathBuf;
use thiserror::Error;

use crate::ingest::IngestError;
use crate::storage::StorageError;
use crate::transform::TransformError;

/// Errors that can occur during pipeline execution
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Pipeline configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Stage failed with underlying cause
    #[error("Stage '{stage}' failed: {source}")]
    StageFailure {
        stage: String,
        #[source]
        source: Box<PipelineError>,
    },

    /// Missing required input
    #[error("Missing required input: {0}")]
    MissingInput(String),

    /// IO error with path context
    #[error("IO error with {path}: {message}")]
    IoErrorWithPath {
        path: PathBuf,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading input records failed
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Writing or reading tables failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Building tables failed
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// TOML configuration parse error
    #[error("Invalid configuration file: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Multiple errors occurred
    #[error("Multiple errors occurred: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<PipelineError>),
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    /// Attach the failing stage to an error
    pub fn stage_failure(stage: impl Into<String>, source: impl Into<PipelineError>) -> Self {
        Self::StageFailure {
            stage: stage.into(),
            source: Box::new(source.into()),
        }
    }

    /// Create an IO error with path context
    pub fn io_with_path(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::IoErrorWithPath {
            path: path.into(),
            message: message.into(),
            source,
        }
    }

    /// Get the stage name if this is a stage failure
    pub fn stage_name(&self) -> Option<&str> {
        match self {
            PipelineError::StageFailure { stage, .. } => Some(stage),
            _ => None,
        }
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::ConfigError(msg) => {
                format!(
                    "Configuration error: {msg}\n\nHint: Check your pipeline configuration file."
                )
            }
            PipelineError::StageFailure { stage, source } => {
                format!("Stage '{stage}' failed: {}", source.user_message())
            }
            PipelineError::MissingInput(input) => {
                format!(
                    "Missing required input: {input}\n\nHint: Ensure all required files exist and paths are correct."
                )
            }
            PipelineError::Ingest(err) => err.user_message(),
            PipelineError::Storage(err) => err.user_message(),
            PipelineError::Transform(err) => err.user_message(),
            PipelineError::Multiple(errors) => errors
                .iter()
                .map(|e| e.user_message())
                .collect::<Vec<_>>()
                .join("\n"),
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::MissingInput("input root".to_string());
        assert!(err.to_string().contains("input root"));
    }

    #[test]
    fn test_stage_failure_wraps_module_error() {
        let err = PipelineError::stage_failure(
            "logs",
            IngestError::NoFilesMatched("/in/log_data/*/*/*.json".to_string()),
        );
        assert_eq!(err.stage_name(), Some("logs"));
        assert!(err.to_string().contains("log_data"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_io_with_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = PipelineError::io_with_path("/out/report.json", "writing report", io_err);
        let display = err.to_string();
        assert!(display.contains("/out/report.json"));
        assert!(display.contains("writing report"));
    }

    #[test]
    fn test_user_message() {
        let err = PipelineError::MissingInput("songs table".to_string());
        let msg = err.user_message();
        assert!(msg.contains("songs table"));
        assert!(msg.contains("Hint:"));

        let err: PipelineError = StorageError::TableNotFound(PathBuf::from("/out/songs")).into();
        assert!(err.user_message().contains("Hint:"));
    }

    #[test]
    fn test_multiple_errors() {
        let err = PipelineError::Multiple(vec![
            PipelineError::ConfigError("error 1".to_string()),
            PipelineError::ConfigError("error 2".to_string()),
        ]);
        let display = err.to_string();
        assert!(display.contains("error 1"));
        assert!(display.contains("error 2"));
    }
}

//! Error types for record ingestion

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while discovering or reading input records
#[derive(Error, Debug)]
pub enum IngestError {
    /// Glob pattern could not be compiled
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// Pattern compiled but matched no files
    #[error("No input files match pattern: {0}")]
    NoFilesMatched(String),

    /// Source not accessible (unreadable directory during glob expansion)
    #[error("Source not accessible: {path} - {reason}")]
    SourceNotAccessible { path: PathBuf, reason: String },

    /// JSON parsing error for a specific line
    #[error("JSON parsing error in {path} at line {line}: {error}")]
    JsonParse {
        path: PathBuf,
        line: usize,
        error: String,
    },

    /// Line parsed but is not a JSON object
    #[error("Invalid record in {path} at line {line}: expected a JSON object")]
    NotAnObject { path: PathBuf, line: usize },

    /// IO error with path context
    #[error("IO error reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Worker pool could not be created
    #[error("Failed to start reader pool: {0}")]
    Pool(String),
}

impl IngestError {
    /// Create a read error with path context
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            IngestError::InvalidPattern(pattern) => {
                format!(
                    "Invalid glob pattern: {pattern}\n\n\
                    Hint: Use standard glob syntax like 'log_data/*/*/*.json'."
                )
            }
            IngestError::NoFilesMatched(pattern) => {
                format!(
                    "No input files match: {pattern}\n\n\
                    Hint: Check the input root and the dataset pattern."
                )
            }
            IngestError::JsonParse { path, line, error } => {
                format!(
                    "JSON parse error in {} at line {line}:\n{error}\n\n\
                    Hint: Input files must contain one JSON object per line.",
                    path.display()
                )
            }
            IngestError::SourceNotAccessible { path, reason } => {
                format!(
                    "Cannot access source: {}\nReason: {reason}\n\n\
                    Hint: Check permissions on the input directories.",
                    path.display()
                )
            }
            _ => self.to_string(),
        }
    }
}

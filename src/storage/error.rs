//! Error types for table storage

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while writing or reading tables
#[derive(Error, Debug)]
pub enum StorageError {
    /// Partition column not present in the table schema
    #[error("Unknown partition column '{column}' for table {table}")]
    UnknownPartitionColumn { table: String, column: String },

    /// Table directory does not exist
    #[error("Table not found: {0}")]
    TableNotFound(PathBuf),

    /// Target path cannot host a table directory
    #[error("Invalid table path: {0}")]
    InvalidTarget(PathBuf),

    /// Directory inside a table that is not a `column=value` segment
    #[error("Invalid partition directory {0}")]
    InvalidPartitionSegment(PathBuf),

    /// Column missing when decoding rows
    #[error("Missing column '{0}'")]
    MissingColumn(String),

    /// Column present but with an unexpected type
    #[error("Column '{column}' is not of type {expected}")]
    ColumnType { column: String, expected: String },

    /// Null found in a column that requires values
    #[error("Unexpected null in column '{column}' at row {row}")]
    UnexpectedNull { column: String, row: usize },

    /// IO error with path context
    #[error("IO error with {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

impl StorageError {
    /// Create an IO error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            StorageError::TableNotFound(path) => {
                format!(
                    "Table not found: {}\n\n\
                    Hint: Run the 'songs' stage before 'songplays' or point --output at a previous run.",
                    path.display()
                )
            }
            StorageError::Io { path, source } => {
                format!(
                    "Cannot write {}: {source}\n\n\
                    Hint: Check that the output location exists and is writable.",
                    path.display()
                )
            }
            _ => self.to_string(),
        }
    }
}

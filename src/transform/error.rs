//! Error types for transformations

use thiserror::Error;

/// Errors that can occur while building tables
#[derive(Error, Debug)]
pub enum TransformError {
    /// Two rows share a key but differ in other columns
    #[error("Conflicting duplicate rows in {table} for key {key}")]
    DedupConflict { table: String, key: String },
}

impl TransformError {
    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            TransformError::DedupConflict { table, key } => {
                format!(
                    "Conflicting duplicate rows in {table} for key {key}\n\n\
                    Hint: Use --dedup first or --dedup last to pick one of the rows."
                )
            }
        }
    }
}

//! Record sources: "glob pattern → JSON records"

use std::path::{Path, PathBuf};

use super::error::IngestError;
use super::reader::{JsonLinesReader, discover_files, read_files_parallel};
use super::record::JsonRecord;

/// Trait for record sources
///
/// The pipeline only depends on this seam, not on a concrete storage
/// backend. Patterns are interpreted relative to the source's root.
pub trait RecordSource: Send + Sync {
    /// Human-readable location of the source
    fn describe(&self) -> String;

    /// Resolve a relative pattern to the files it matches
    fn files(&self, pattern: &str) -> Result<Vec<PathBuf>, IngestError>;

    /// Read every record matching the pattern, in file then line order
    fn read_all(&self, pattern: &str) -> Result<Vec<JsonRecord>, IngestError>;

    /// Stream records matching the pattern lazily
    fn stream(&self, pattern: &str) -> Result<JsonLinesReader, IngestError> {
        Ok(JsonLinesReader::new(self.files(pattern)?))
    }
}

/// Local filesystem source rooted at the input base path
#[derive(Debug, Clone)]
pub struct LocalSource {
    root: PathBuf,
    workers: usize,
}

impl LocalSource {
    /// Create a new local source
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            workers: 4,
        }
    }

    /// Set the number of parallel parse workers
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Get the root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join a relative pattern under the root; absolute patterns pass through
    ///
    /// Glob metacharacters in the root are escaped so they match literally.
    pub fn resolve_pattern(&self, pattern: &str) -> String {
        if Path::new(pattern).is_absolute() {
            pattern.to_string()
        } else {
            let root = glob::Pattern::escape(&self.root.to_string_lossy());
            format!("{}/{}", root, pattern)
        }
    }
}

impl RecordSource for LocalSource {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn files(&self, pattern: &str) -> Result<Vec<PathBuf>, IngestError> {
        discover_files(&self.resolve_pattern(pattern))
    }

    fn read_all(&self, pattern: &str) -> Result<Vec<JsonRecord>, IngestError> {
        let files = self.files(pattern)?;
        let records = read_files_parallel(&files, self.workers)?;
        tracing::debug!(
            pattern = %pattern,
            files = files.len(),
            records = records.len(),
            "Read input records"
        );
        Ok(records)
    }
}

//! Record reading for JSON-lines datasets
//!
//! Turns a glob pattern into a sequence of schema-agnostic JSON objects:
//!
//! - [`discover_files`] expands and sorts the pattern
//! - [`JsonLinesReader`] streams records lazily, one file at a time
//! - [`read_files_parallel`] parses files on a rayon pool, order-preserving
//! - [`RecordSource`] is the seam the pipeline reads through
//!
//! Field presence is never validated here. Consumers decide what a missing
//! field means.

mod error;
mod reader;
mod record;
mod source;

pub use error::IngestError;
pub use reader::{JsonLinesReader, discover_files, read_file, read_files_parallel};
pub use record::JsonRecord;
pub use source::{LocalSource, RecordSource};

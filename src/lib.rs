//! Sparkify lake - batch ETL from song catalog and listening logs to a
//! partitioned Parquet star schema
//!
//! Provides:
//! - JSON-lines record reading (`ingest`)
//! - Typed dimension and fact rows (`models`)
//! - Dimension builders, deduplication and the fact join (`transform`)
//! - Hive-partitioned Parquet tables with overwrite semantics (`storage`)
//! - The staged batch driver (`pipeline`)

pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod storage;
pub mod transform;

// Re-export commonly used types
pub use ingest::{IngestError, JsonRecord, LocalSource, RecordSource};
pub use models::{ArtistRecord, NormalizedEvent, SongRecord, SongplayRecord, TimeRecord, UserRecord};
pub use pipeline::{
    PipelineConfig, PipelineError, PipelineExecutor, PipelineReport, PipelineResult,
    PipelineStage, run_pipeline,
};
pub use storage::{
    CompressionCodec, PartitionedWriter, StorageError, TableKind, TableReader, TableRow,
    TableStore, WriteMode, WriteOptions,
};
pub use transform::{DedupPolicy, JoinCardinality, TransformError};

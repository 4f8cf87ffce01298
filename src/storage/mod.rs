//! Partitioned Parquet storage
//!
//! Tables are directories of Parquet files in Hive layout:
//!
//! ```text
//! <root>/time/year=2018/month=11/part-00000.parquet
//! <root>/time/_SUCCESS
//! ```
//!
//! Partition columns live only in directory names. Every write replaces the
//! whole table; readers rebuild partition columns from the path.

mod error;
mod partition;
mod reader;
mod store;
mod table;
mod writer;

pub use error::StorageError;
pub use partition::{DEFAULT_PARTITION, PartitionValue, partition_dir};
pub use reader::TableReader;
pub use store::TableStore;
pub use table::{TableKind, TableRow, column, opt_string, opt_value, required};
pub use writer::{
    CompressionCodec, PartitionedWriter, SUCCESS_MARKER, WriteMode, WriteOptions, WriteSummary,
};

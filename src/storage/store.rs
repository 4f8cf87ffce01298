//! Output location holding one directory per table

use std::path::{Path, PathBuf};

use super::error::StorageError;
use super::reader::TableReader;
use super::table::{TableKind, TableRow};
use super::writer::{PartitionedWriter, WriteMode, WriteOptions, WriteSummary};

/// Star-schema tables under a single output root
#[derive(Debug, Clone)]
pub struct TableStore {
    root: PathBuf,
    writer: PartitionedWriter,
}

impl TableStore {
    pub fn new(root: impl Into<PathBuf>, options: WriteOptions) -> Self {
        Self {
            root: root.into(),
            writer: PartitionedWriter::new(options),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a table
    pub fn table_path(&self, table: TableKind) -> PathBuf {
        self.root.join(table.name())
    }

    /// Whether a published generation of the table exists
    pub fn exists(&self, table: TableKind) -> bool {
        self.table_path(table).is_dir()
    }

    /// Overwrite a table with the given rows, partitioned the table's way
    pub fn write<T: TableRow>(&self, rows: &[T]) -> Result<WriteSummary, StorageError> {
        self.writer.write(
            rows,
            &self.table_path(T::TABLE),
            T::TABLE.partition_columns(),
            WriteMode::Overwrite,
        )
    }

    /// Read a table back
    pub fn read<T: TableRow>(&self) -> Result<Vec<T>, StorageError> {
        TableReader::read(&self.table_path(T::TABLE))
    }
}

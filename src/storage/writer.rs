//! Partitioned Parquet writer with overwrite semantics

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{RecordBatch, UInt32Array};
use arrow::compute::take_record_batch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::StorageError;
use super::partition::{PartitionValue, cell_value, partition_dir};
use super::table::TableRow;

/// Marker written last inside a completed table generation
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// Parquet compression codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionCodec {
    #[default]
    Snappy,
    Zstd,
    None,
}

impl CompressionCodec {
    fn to_parquet(self) -> Compression {
        match self {
            Self::Snappy => Compression::SNAPPY,
            Self::Zstd => Compression::ZSTD(Default::default()),
            Self::None => Compression::UNCOMPRESSED,
        }
    }
}

impl std::fmt::Display for CompressionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Snappy => write!(f, "snappy"),
            Self::Zstd => write!(f, "zstd"),
            Self::None => write!(f, "none"),
        }
    }
}

impl std::str::FromStr for CompressionCodec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "snappy" => Ok(Self::Snappy),
            "zstd" => Ok(Self::Zstd),
            "none" | "uncompressed" => Ok(Self::None),
            _ => Err(format!(
                "Unknown compression: {}. Valid options: snappy, zstd, none",
                s
            )),
        }
    }
}

/// How a write treats an existing table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Replace the whole table; no file of the previous generation survives
    #[default]
    Overwrite,
}

/// File layout options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    pub compression: CompressionCodec,
    pub max_rows_per_file: usize,
    pub max_row_group_size: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compression: CompressionCodec::Snappy,
            max_rows_per_file: 1_000_000,
            max_row_group_size: 128 * 1024,
        }
    }
}

impl WriteOptions {
    pub fn with_compression(mut self, compression: CompressionCodec) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_max_rows_per_file(mut self, rows: usize) -> Self {
        self.max_rows_per_file = rows;
        self
    }

    pub fn with_max_row_group_size(mut self, rows: usize) -> Self {
        self.max_row_group_size = rows;
        self
    }

    fn writer_properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(self.compression.to_parquet())
            .set_max_row_group_size(self.max_row_group_size.max(1))
            .build()
    }
}

/// What a write produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub rows: usize,
    pub partitions: usize,
    pub files: Vec<PathBuf>,
}

/// Writes row sets as Hive-partitioned Parquet tables
#[derive(Debug, Clone, Default)]
pub struct PartitionedWriter {
    options: WriteOptions,
}

impl PartitionedWriter {
    pub fn new(options: WriteOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &WriteOptions {
        &self.options
    }

    /// Write typed rows as the table at `target`
    pub fn write<T: TableRow>(
        &self,
        rows: &[T],
        target: &Path,
        partition_by: &[&str],
        mode: WriteMode,
    ) -> Result<WriteSummary, StorageError> {
        let batch = T::to_batch(rows)?;
        self.write_batch(T::TABLE.name(), &batch, target, partition_by, mode)
    }

    /// Write a batch as the table at `target`.
    ///
    /// The new generation is built in a hidden staging directory beside
    /// `target` and only swapped in once every file and the `_SUCCESS`
    /// marker are on disk. On failure the staging directory is removed and
    /// the previous generation is left untouched.
    pub fn write_batch(
        &self,
        table: &str,
        batch: &RecordBatch,
        target: &Path,
        partition_by: &[&str],
        mode: WriteMode,
    ) -> Result<WriteSummary, StorageError> {
        let WriteMode::Overwrite = mode;

        let schema = batch.schema();
        let partition_indices = partition_by
            .iter()
            .map(|column| {
                schema
                    .index_of(column)
                    .map_err(|_| StorageError::UnknownPartitionColumn {
                        table: table.to_string(),
                        column: column.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let data_indices: Vec<usize> = (0..schema.fields().len())
            .filter(|i| !partition_indices.contains(i))
            .collect();

        let buckets = bucket_rows(batch, partition_by, &partition_indices)?;

        let staging = sibling_path(target, "staging")?;
        fs::create_dir_all(&staging).map_err(|e| StorageError::io(&staging, e))?;

        let written = self.write_generation(batch, &buckets, &data_indices, &staging);
        let files = match written {
            Ok(files) => files,
            Err(e) => {
                let _ = fs::remove_dir_all(&staging);
                return Err(e);
            }
        };

        publish(&staging, target)?;

        let files: Vec<PathBuf> = files
            .into_iter()
            .map(|relative| target.join(relative))
            .collect();

        tracing::debug!(
            table = %table,
            path = %target.display(),
            rows = batch.num_rows(),
            partitions = buckets.len(),
            files = files.len(),
            "Wrote table"
        );

        Ok(WriteSummary {
            rows: batch.num_rows(),
            partitions: buckets.len(),
            files,
        })
    }

    /// Write every bucket under `staging`; returns file paths relative to it
    fn write_generation(
        &self,
        batch: &RecordBatch,
        buckets: &BTreeMap<Vec<PartitionValue>, Vec<u32>>,
        data_indices: &[usize],
        staging: &Path,
    ) -> Result<Vec<PathBuf>, StorageError> {
        let mut files = Vec::new();

        if buckets.is_empty() {
            // Keep the schema discoverable for empty tables
            let empty = batch.project(data_indices)?;
            let relative = PathBuf::from(part_file_name(0));
            self.write_file(&staging.join(&relative), &empty)?;
            files.push(relative);
        }

        let per_file = self.options.max_rows_per_file.max(1);
        for (values, rows) in buckets {
            let indices = UInt32Array::from(rows.clone());
            let bucket = take_record_batch(batch, &indices)?.project(data_indices)?;
            let dir = partition_dir(values);

            let mut offset = 0;
            let mut part = 0;
            while offset < bucket.num_rows() {
                let len = per_file.min(bucket.num_rows() - offset);
                let relative = dir.join(part_file_name(part));
                self.write_file(&staging.join(&relative), &bucket.slice(offset, len))?;
                files.push(relative);
                offset += len;
                part += 1;
            }
        }

        let marker = staging.join(SUCCESS_MARKER);
        File::create(&marker).map_err(|e| StorageError::io(&marker, e))?;

        Ok(files)
    }

    fn write_file(&self, path: &Path, batch: &RecordBatch) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }

        let file = File::create(path).map_err(|e| StorageError::io(path, e))?;
        let mut writer = ArrowWriter::try_new(
            file,
            batch.schema(),
            Some(self.options.writer_properties()),
        )?;
        writer.write(batch)?;
        writer.close()?;
        Ok(())
    }
}

/// Group row indices by their partition values, in sorted key order
fn bucket_rows(
    batch: &RecordBatch,
    partition_by: &[&str],
    partition_indices: &[usize],
) -> Result<BTreeMap<Vec<PartitionValue>, Vec<u32>>, StorageError> {
    let mut buckets: BTreeMap<Vec<PartitionValue>, Vec<u32>> = BTreeMap::new();
    let columns: Vec<_> = partition_indices
        .iter()
        .map(|&i| Arc::clone(batch.column(i)))
        .collect();

    for row in 0..batch.num_rows() {
        let key = partition_by
            .iter()
            .zip(&columns)
            .map(|(name, array)| Ok(PartitionValue::new(*name, cell_value(array, row)?)))
            .collect::<Result<Vec<_>, StorageError>>()?;
        buckets.entry(key).or_default().push(row as u32);
    }

    Ok(buckets)
}

fn part_file_name(part: usize) -> String {
    format!("part-{:05}.parquet", part)
}

/// Hidden directory next to `target`, unique per call
fn sibling_path(target: &Path, tag: &str) -> Result<PathBuf, StorageError> {
    let name = target
        .file_name()
        .ok_or_else(|| StorageError::InvalidTarget(target.to_path_buf()))?;
    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok(parent.join(format!(
        ".{}.{}-{}",
        name.to_string_lossy(),
        tag,
        Uuid::new_v4().simple()
    )))
}

/// Swap a completed staging generation into place
fn publish(staging: &Path, target: &Path) -> Result<(), StorageError> {
    let backup = if target.exists() {
        let backup = sibling_path(target, "replaced")?;
        fs::rename(target, &backup).map_err(|e| {
            let _ = fs::remove_dir_all(staging);
            StorageError::io(target, e)
        })?;
        Some(backup)
    } else {
        None
    };

    if let Err(e) = fs::rename(staging, target) {
        if let Some(backup) = &backup {
            let _ = fs::rename(backup, target);
        }
        let _ = fs::remove_dir_all(staging);
        return Err(StorageError::io(target, e));
    }

    if let Some(backup) = backup {
        let removed = if backup.is_dir() {
            fs::remove_dir_all(&backup)
        } else {
            fs::remove_file(&backup)
        };
        if let Err(e) = removed {
            tracing::warn!(
                path = %backup.display(),
                error = %e,
                "Failed to remove previous table generation"
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int32Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use tempfile::TempDir;

    fn sample_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("year", DataType::Int32, true),
            Field::new("month", DataType::Int32, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["a", "b", "c", "d"])),
                Arc::new(Int32Array::from(vec![Some(2018), Some(2018), None, Some(2019)])),
                Arc::new(Int32Array::from(vec![Some(11), Some(12), Some(1), Some(11)])),
            ],
        )
        .unwrap()
    }

    fn parquet_files(root: &Path) -> Vec<PathBuf> {
        let mut found = Vec::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            for entry in fs::read_dir(&dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    stack.push(path);
                } else if path.extension().is_some_and(|e| e == "parquet") {
                    found.push(path.strip_prefix(root).unwrap().to_path_buf());
                }
            }
        }
        found.sort();
        found
    }

    #[test]
    fn test_compression_parse() {
        assert_eq!("zstd".parse::<CompressionCodec>().unwrap(), CompressionCodec::Zstd);
        assert_eq!("NONE".parse::<CompressionCodec>().unwrap(), CompressionCodec::None);
        assert!("lz5".parse::<CompressionCodec>().is_err());
        assert_eq!(CompressionCodec::default().to_string(), "snappy");
    }

    #[test]
    fn test_write_hive_layout() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("time");
        let writer = PartitionedWriter::default();

        let summary = writer
            .write_batch("time", &sample_batch(), &target, &["year", "month"], WriteMode::Overwrite)
            .unwrap();

        assert_eq!(summary.rows, 4);
        assert_eq!(summary.partitions, 4);
        assert_eq!(
            parquet_files(&target),
            vec![
                PathBuf::from("year=2018/month=11/part-00000.parquet"),
                PathBuf::from("year=2018/month=12/part-00000.parquet"),
                PathBuf::from("year=2019/month=11/part-00000.parquet"),
                PathBuf::from("year=__HIVE_DEFAULT_PARTITION__/month=1/part-00000.parquet"),
            ]
        );
        assert!(target.join(SUCCESS_MARKER).exists());
    }

    #[test]
    fn test_partition_columns_stripped_from_files() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("time");
        PartitionedWriter::default()
            .write_batch("time", &sample_batch(), &target, &["year"], WriteMode::Overwrite)
            .unwrap();

        let file = File::open(target.join("year=2019/part-00000.parquet")).unwrap();
        let reader =
            parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder::try_new(file).unwrap();
        let names: Vec<String> = reader
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        assert_eq!(names, vec!["id".to_string(), "month".to_string()]);
    }

    #[test]
    fn test_unknown_partition_column() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("time");
        let err = PartitionedWriter::default()
            .write_batch("time", &sample_batch(), &target, &["decade"], WriteMode::Overwrite)
            .unwrap_err();
        assert!(matches!(err, StorageError::UnknownPartitionColumn { .. }));
        assert!(!target.exists());
    }

    #[test]
    fn test_overwrite_removes_stale_partitions() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("time");
        let writer = PartitionedWriter::default();

        writer
            .write_batch("time", &sample_batch(), &target, &["year"], WriteMode::Overwrite)
            .unwrap();
        fs::write(target.join("year=2018/stray.parquet"), b"junk").unwrap();

        let smaller = sample_batch().slice(3, 1);
        writer
            .write_batch("time", &smaller, &target, &["year"], WriteMode::Overwrite)
            .unwrap();

        assert_eq!(
            parquet_files(&target),
            vec![PathBuf::from("year=2019/part-00000.parquet")]
        );

        // No staging or backup directories left behind
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_split_by_max_rows_per_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("ids");
        let writer = PartitionedWriter::new(WriteOptions::default().with_max_rows_per_file(3));

        let summary = writer
            .write_batch("ids", &sample_batch(), &target, &[], WriteMode::Overwrite)
            .unwrap();

        assert_eq!(summary.partitions, 1);
        assert_eq!(
            parquet_files(&target),
            vec![
                PathBuf::from("part-00000.parquet"),
                PathBuf::from("part-00001.parquet"),
            ]
        );
    }

    #[test]
    fn test_empty_table_writes_single_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("time");
        let empty = sample_batch().slice(0, 0);

        let summary = PartitionedWriter::default()
            .write_batch("time", &empty, &target, &["year", "month"], WriteMode::Overwrite)
            .unwrap();

        assert_eq!(summary.rows, 0);
        assert_eq!(parquet_files(&target), vec![PathBuf::from("part-00000.parquet")]);
    }
}

//! Table reader with Hive partition discovery

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use arrow::array::{ArrayRef, RecordBatch, StringArray, new_null_array};
use arrow::compute::cast;
use arrow::datatypes::SchemaRef;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::error::StorageError;
use super::partition::PartitionValue;
use super::table::TableRow;

/// A data file found under a table root together with its partition path
#[derive(Debug, Clone)]
struct DataFile {
    path: PathBuf,
    partition: Vec<PartitionValue>,
}

/// Reads tables written by [`super::PartitionedWriter`]
pub struct TableReader;

impl TableReader {
    /// Read every row of the table at `target`
    pub fn read<T: TableRow>(target: &Path) -> Result<Vec<T>, StorageError> {
        let mut rows = Vec::new();
        for batch in Self::read_batches(target, &T::schema())? {
            rows.extend(T::from_batch(&batch)?);
        }
        Ok(rows)
    }

    /// Read the table at `target` as batches conforming to `schema`.
    ///
    /// Partition columns are rebuilt from the `column=value` directories and
    /// cast to the type `schema` declares for them.
    pub fn read_batches(target: &Path, schema: &SchemaRef) -> Result<Vec<RecordBatch>, StorageError> {
        if !target.is_dir() {
            return Err(StorageError::TableNotFound(target.to_path_buf()));
        }

        let mut files = Vec::new();
        collect_files(target, &[], &mut files)?;

        let mut batches = Vec::new();
        for data_file in &files {
            let file = File::open(&data_file.path).map_err(|e| StorageError::io(&data_file.path, e))?;
            let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
            for batch in reader {
                batches.push(attach_partitions(schema, &batch?, &data_file.partition)?);
            }
        }

        tracing::debug!(
            path = %target.display(),
            files = files.len(),
            rows = batches.iter().map(RecordBatch::num_rows).sum::<usize>(),
            "Read table"
        );

        Ok(batches)
    }
}

/// Walk partition directories depth-first in name order
fn collect_files(
    dir: &Path,
    partition: &[PartitionValue],
    out: &mut Vec<DataFile>,
) -> Result<(), StorageError> {
    let mut entries = fs::read_dir(dir)
        .map_err(|e| StorageError::io(dir, e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| StorageError::io(dir, e))?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();

        // Hidden and bookkeeping files such as _SUCCESS
        if name.starts_with('.') || name.starts_with('_') {
            continue;
        }

        if path.is_dir() {
            let value = PartitionValue::from_segment(&name)
                .ok_or_else(|| StorageError::InvalidPartitionSegment(path.clone()))?;
            let mut nested = partition.to_vec();
            nested.push(value);
            collect_files(&path, &nested, out)?;
        } else if name.ends_with(".parquet") {
            out.push(DataFile {
                path,
                partition: partition.to_vec(),
            });
        }
    }

    Ok(())
}

fn attach_partitions(
    schema: &SchemaRef,
    batch: &RecordBatch,
    partition: &[PartitionValue],
) -> Result<RecordBatch, StorageError> {
    let rows = batch.num_rows();

    let columns = schema
        .fields()
        .iter()
        .map(|field| {
            if let Some(value) = partition.iter().find(|p| &p.column == field.name()) {
                let strings = StringArray::from(vec![value.value.as_deref(); rows]);
                return Ok(cast(&strings, field.data_type())?);
            }
            if let Some(array) = batch.column_by_name(field.name()) {
                return Ok(array.clone());
            }
            if rows == 0 {
                return Ok(new_null_array(field.data_type(), 0));
            }
            Err(StorageError::MissingColumn(field.name().clone()))
        })
        .collect::<Result<Vec<ArrayRef>, StorageError>>()?;

    Ok(RecordBatch::try_new(schema.clone(), columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::writer::{PartitionedWriter, WriteMode};
    use arrow::array::{Array, Int32Array};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("year", DataType::Int32, true),
            Field::new("artist_id", DataType::Utf8, true),
        ]))
    }

    fn batch() -> RecordBatch {
        RecordBatch::try_new(
            schema(),
            vec![
                Arc::new(StringArray::from(vec!["s1", "s2", "s3"])),
                Arc::new(Int32Array::from(vec![Some(2000), None, Some(2000)])),
                Arc::new(StringArray::from(vec![Some("AR/1"), Some("AR2"), None])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_missing_table() {
        let dir = TempDir::new().unwrap();
        let err = TableReader::read_batches(&dir.path().join("songs"), &schema()).unwrap_err();
        assert!(matches!(err, StorageError::TableNotFound(_)));
    }

    #[test]
    fn test_partition_discovery_restores_values() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("songs");
        PartitionedWriter::default()
            .write_batch("songs", &batch(), &target, &["year", "artist_id"], WriteMode::Overwrite)
            .unwrap();

        let batches = TableReader::read_batches(&target, &schema()).unwrap();
        let mut rows = Vec::new();
        for b in &batches {
            assert_eq!(b.schema(), schema());
            let ids = b.column(0).as_any().downcast_ref::<StringArray>().unwrap();
            let years = b.column(1).as_any().downcast_ref::<Int32Array>().unwrap();
            let artists = b.column(2).as_any().downcast_ref::<StringArray>().unwrap();
            for i in 0..b.num_rows() {
                rows.push((
                    ids.value(i).to_string(),
                    years.is_valid(i).then(|| years.value(i)),
                    artists.is_valid(i).then(|| artists.value(i).to_string()),
                ));
            }
        }
        rows.sort();

        assert_eq!(
            rows,
            vec![
                ("s1".to_string(), Some(2000), Some("AR/1".to_string())),
                ("s2".to_string(), None, Some("AR2".to_string())),
                ("s3".to_string(), Some(2000), None),
            ]
        );
    }

    #[test]
    fn test_empty_table_reads_back_empty() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("songs");
        PartitionedWriter::default()
            .write_batch("songs", &batch().slice(0, 0), &target, &["year"], WriteMode::Overwrite)
            .unwrap();

        let batches = TableReader::read_batches(&target, &schema()).unwrap();
        assert_eq!(batches.iter().map(RecordBatch::num_rows).sum::<usize>(), 0);
    }

    #[test]
    fn test_foreign_directory_is_rejected() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("songs");
        fs::create_dir_all(target.join("not-a-partition")).unwrap();
        let err = TableReader::read_batches(&target, &schema()).unwrap_err();
        assert!(matches!(err, StorageError::InvalidPartitionSegment(_)));
    }
}

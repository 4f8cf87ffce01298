//! Hive-style partition directory names (`column=value`)

use std::path::PathBuf;

use arrow::array::{Array, ArrayRef};
use arrow::util::display::array_value_to_string;

use super::error::StorageError;

/// Directory value used for a null partition value
pub const DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

/// One `column=value` pair of a partition path
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionValue {
    pub column: String,
    pub value: Option<String>,
}

impl PartitionValue {
    pub fn new(column: impl Into<String>, value: Option<String>) -> Self {
        Self {
            column: column.into(),
            value,
        }
    }

    /// Render as a directory name
    ///
    /// A literal value equal to the null sentinel gets its leading
    /// underscore percent-encoded so it parses back as a value, not null.
    pub fn to_segment(&self) -> String {
        let value = match &self.value {
            Some(v) if v == DEFAULT_PARTITION => format!("%5F{}", &DEFAULT_PARTITION[1..]),
            Some(v) => urlencoding::encode(v).into_owned(),
            None => DEFAULT_PARTITION.to_string(),
        };
        format!("{}={}", self.column, value)
    }

    /// Parse a directory name; `None` if it is not a `column=value` segment
    pub fn from_segment(segment: &str) -> Option<Self> {
        let (column, raw) = segment.split_once('=')?;
        if column.is_empty() {
            return None;
        }
        let value = if raw == DEFAULT_PARTITION {
            None
        } else {
            Some(urlencoding::decode(raw).ok()?.into_owned())
        };
        Some(Self::new(column, value))
    }
}

/// Relative directory for a list of partition values, outermost first
pub fn partition_dir(values: &[PartitionValue]) -> PathBuf {
    values.iter().map(PartitionValue::to_segment).collect()
}

/// String rendering of a partition cell; null stays `None`
pub fn cell_value(array: &ArrayRef, row: usize) -> Result<Option<String>, StorageError> {
    if array.is_null(row) {
        return Ok(None);
    }
    Ok(Some(array_value_to_string(array, row)?))
}

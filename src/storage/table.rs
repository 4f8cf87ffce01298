//! Table identities and the row ↔ Arrow batch contract

use arrow::array::{Array, ArrowPrimitiveType, PrimitiveArray, RecordBatch, StringArray};
use arrow::datatypes::SchemaRef;
use serde::{Deserialize, Serialize};

use super::error::StorageError;

/// The five tables of the star schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    Songs,
    Artists,
    Users,
    Time,
    Songplays,
}

impl TableKind {
    /// Get all tables in the order they are produced
    pub fn all() -> Vec<Self> {
        vec![
            Self::Songs,
            Self::Artists,
            Self::Users,
            Self::Time,
            Self::Songplays,
        ]
    }

    /// Directory name of the table under the output root
    pub fn name(&self) -> &'static str {
        match self {
            Self::Songs => "songs",
            Self::Artists => "artists",
            Self::Users => "users",
            Self::Time => "time",
            Self::Songplays => "songplays",
        }
    }

    /// Partition columns, outermost first
    pub fn partition_columns(&self) -> &'static [&'static str] {
        match self {
            Self::Songs => &["year", "artist_id"],
            Self::Time | Self::Songplays => &["year", "month"],
            Self::Artists | Self::Users => &[],
        }
    }

}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for TableKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "songs" => Ok(Self::Songs),
            "artists" => Ok(Self::Artists),
            "users" => Ok(Self::Users),
            "time" => Ok(Self::Time),
            "songplays" => Ok(Self::Songplays),
            _ => Err(format!("Unknown table: {}", s)),
        }
    }
}

/// A typed row that can be materialized as a table.
///
/// `schema()` is the full logical schema, partition columns included. The
/// writer strips partition columns from the files; the reader puts them
/// back from the directory names before calling `from_batch`.
pub trait TableRow: Sized {
    /// Which table these rows belong to
    const TABLE: TableKind;

    /// Full logical schema
    fn schema() -> SchemaRef;

    /// Encode rows as a single batch with `schema()`
    fn to_batch(rows: &[Self]) -> Result<RecordBatch, StorageError>;

    /// Decode rows from a batch with `schema()`
    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>, StorageError>;
}

/// Look up a column by name and downcast it
pub fn column<'a, A: Array + 'static>(
    batch: &'a RecordBatch,
    name: &str,
) -> Result<&'a A, StorageError> {
    let array = batch
        .column_by_name(name)
        .ok_or_else(|| StorageError::MissingColumn(name.to_string()))?;
    array
        .as_any()
        .downcast_ref::<A>()
        .ok_or_else(|| StorageError::ColumnType {
            column: name.to_string(),
            expected: std::any::type_name::<A>()
                .rsplit("::")
                .next()
                .unwrap_or("array")
                .to_string(),
        })
}

/// Nullable string value
pub fn opt_string(array: &StringArray, row: usize) -> Option<String> {
    array.is_valid(row).then(|| array.value(row).to_string())
}

/// Nullable primitive value
pub fn opt_value<T: ArrowPrimitiveType>(
    array: &PrimitiveArray<T>,
    row: usize,
) -> Option<T::Native> {
    array.is_valid(row).then(|| array.value(row))
}

/// Unwrap a value that the schema declares non-null
pub fn required<T>(value: Option<T>, column: &str, row: usize) -> Result<T, StorageError> {
    value.ok_or_else(|| StorageError::UnexpectedNull {
        column: column.to_string(),
        row,
    })
}

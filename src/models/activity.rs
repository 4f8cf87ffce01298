//! Rows derived from listening activity: users, time and normalized events

use std::sync::{Arc, LazyLock};

use arrow::array::{Int32Array, Int64Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use serde::{Deserialize, Serialize};

use crate::storage::{StorageError, TableKind, TableRow, column, opt_string, opt_value, required};
use crate::transform::calendar::CalendarParts;

static USER_SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        Field::new("user_id", DataType::Utf8, false),
        Field::new("first_name", DataType::Utf8, true),
        Field::new("last_name", DataType::Utf8, true),
        Field::new("gender", DataType::Utf8, true),
        Field::new("level", DataType::Utf8, true),
    ]))
});

static TIME_SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        Field::new("start_time", DataType::Int64, false),
        Field::new("hour", DataType::Int32, false),
        Field::new("day", DataType::Int32, false),
        Field::new("week", DataType::Int32, false),
        Field::new("month", DataType::Int32, false),
        Field::new("year", DataType::Int32, false),
        Field::new("weekday", DataType::Int32, false),
    ]))
});

/// Row of the `users` dimension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: Option<String>,
}

/// Row of the `time` dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRecord {
    /// Epoch seconds
    pub start_time: i64,
    pub hour: i32,
    pub day: i32,
    pub week: i32,
    pub month: i32,
    pub year: i32,
    pub weekday: i32,
}

impl TimeRecord {
    /// Build the row for an instant; `None` when it has no calendar date
    pub fn from_epoch_seconds(start_time: i64) -> Option<Self> {
        let parts = CalendarParts::from_epoch_seconds(start_time)?;
        Some(Self {
            start_time,
            hour: parts.hour,
            day: parts.day,
            week: parts.week,
            month: parts.month,
            year: parts.year,
            weekday: parts.weekday,
        })
    }
}

/// A `NextSong` event after normalization.
///
/// Not persisted; handed from the log normalizer to the fact assembler.
/// `start_time` is already in epoch seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub start_time: Option<i64>,
    pub user_id: Option<String>,
    pub level: Option<String>,
    pub song: Option<String>,
    pub artist: Option<String>,
    pub session_id: Option<i64>,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}

impl TableRow for UserRecord {
    const TABLE: TableKind = TableKind::Users;

    fn schema() -> SchemaRef {
        USER_SCHEMA.clone()
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch, StorageError> {
        let user_ids: StringArray = rows.iter().map(|r| Some(r.user_id.as_str())).collect();
        let first_names: StringArray = rows.iter().map(|r| r.first_name.as_deref()).collect();
        let last_names: StringArray = rows.iter().map(|r| r.last_name.as_deref()).collect();
        let genders: StringArray = rows.iter().map(|r| r.gender.as_deref()).collect();
        let levels: StringArray = rows.iter().map(|r| r.level.as_deref()).collect();

        Ok(RecordBatch::try_new(
            Self::schema(),
            vec![
                Arc::new(user_ids),
                Arc::new(first_names),
                Arc::new(last_names),
                Arc::new(genders),
                Arc::new(levels),
            ],
        )?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>, StorageError> {
        let user_ids = column::<StringArray>(batch, "user_id")?;
        let first_names = column::<StringArray>(batch, "first_name")?;
        let last_names = column::<StringArray>(batch, "last_name")?;
        let genders = column::<StringArray>(batch, "gender")?;
        let levels = column::<StringArray>(batch, "level")?;

        (0..batch.num_rows())
            .map(|i| {
                Ok(UserRecord {
                    user_id: required(opt_string(user_ids, i), "user_id", i)?,
                    first_name: opt_string(first_names, i),
                    last_name: opt_string(last_names, i),
                    gender: opt_string(genders, i),
                    level: opt_string(levels, i),
                })
            })
            .collect()
    }
}

impl TableRow for TimeRecord {
    const TABLE: TableKind = TableKind::Time;

    fn schema() -> SchemaRef {
        TIME_SCHEMA.clone()
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch, StorageError> {
        let int32 = |field: fn(&TimeRecord) -> i32| -> Int32Array {
            rows.iter().map(field).collect::<Vec<_>>().into()
        };
        let start_times: Int64Array = rows.iter().map(|r| r.start_time).collect::<Vec<_>>().into();

        Ok(RecordBatch::try_new(
            Self::schema(),
            vec![
                Arc::new(start_times),
                Arc::new(int32(|r| r.hour)),
                Arc::new(int32(|r| r.day)),
                Arc::new(int32(|r| r.week)),
                Arc::new(int32(|r| r.month)),
                Arc::new(int32(|r| r.year)),
                Arc::new(int32(|r| r.weekday)),
            ],
        )?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>, StorageError> {
        let start_times = column::<Int64Array>(batch, "start_time")?;
        let hours = column::<Int32Array>(batch, "hour")?;
        let days = column::<Int32Array>(batch, "day")?;
        let weeks = column::<Int32Array>(batch, "week")?;
        let months = column::<Int32Array>(batch, "month")?;
        let years = column::<Int32Array>(batch, "year")?;
        let weekdays = column::<Int32Array>(batch, "weekday")?;

        (0..batch.num_rows())
            .map(|i| {
                Ok(TimeRecord {
                    start_time: required(opt_value(start_times, i), "start_time", i)?,
                    hour: required(opt_value(hours, i), "hour", i)?,
                    day: required(opt_value(days, i), "day", i)?,
                    week: required(opt_value(weeks, i), "week", i)?,
                    month: required(opt_value(months, i), "month", i)?,
                    year: required(opt_value(years, i), "year", i)?,
                    weekday: required(opt_value(weekdays, i), "weekday", i)?,
                })
            })
            .collect()
    }
}

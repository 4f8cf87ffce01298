//! Songplay fact rows

use std::sync::{Arc, LazyLock};

use arrow::array::{Int32Array, Int64Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use serde::{Deserialize, Serialize};

use crate::storage::{StorageError, TableKind, TableRow, column, opt_string, opt_value, required};
use crate::transform::calendar::CalendarParts;

static SONGPLAY_SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        Field::new("start_time", DataType::Int64, false),
        Field::new("user_id", DataType::Utf8, false),
        Field::new("level", DataType::Utf8, false),
        Field::new("song_id", DataType::Utf8, false),
        Field::new("artist_id", DataType::Utf8, false),
        Field::new("session_id", DataType::Int64, false),
        Field::new("location", DataType::Utf8, false),
        Field::new("user_agent", DataType::Utf8, false),
        // Partition columns, derived from start_time
        Field::new("year", DataType::Int32, true),
        Field::new("month", DataType::Int32, true),
    ]))
});

/// Row of the `songplays` fact table.
///
/// Every field is required. `year` and `month` are not stored on the row;
/// they are computed from `start_time` when the table is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongplayRecord {
    /// Epoch seconds
    pub start_time: i64,
    pub user_id: String,
    pub level: String,
    pub song_id: String,
    pub artist_id: String,
    pub session_id: i64,
    pub location: String,
    pub user_agent: String,
}

impl SongplayRecord {
    /// Partition values `(year, month)` for this row
    pub fn year_month(&self) -> Option<(i32, i32)> {
        CalendarParts::from_epoch_seconds(self.start_time).map(|p| (p.year, p.month))
    }
}

impl TableRow for SongplayRecord {
    const TABLE: TableKind = TableKind::Songplays;

    fn schema() -> SchemaRef {
        SONGPLAY_SCHEMA.clone()
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch, StorageError> {
        let partitions: Vec<Option<(i32, i32)>> = rows.iter().map(Self::year_month).collect();

        let start_times: Int64Array = rows.iter().map(|r| r.start_time).collect::<Vec<_>>().into();
        let user_ids: StringArray = rows.iter().map(|r| Some(r.user_id.as_str())).collect();
        let levels: StringArray = rows.iter().map(|r| Some(r.level.as_str())).collect();
        let song_ids: StringArray = rows.iter().map(|r| Some(r.song_id.as_str())).collect();
        let artist_ids: StringArray = rows.iter().map(|r| Some(r.artist_id.as_str())).collect();
        let session_ids: Int64Array = rows.iter().map(|r| r.session_id).collect::<Vec<_>>().into();
        let locations: StringArray = rows.iter().map(|r| Some(r.location.as_str())).collect();
        let user_agents: StringArray = rows.iter().map(|r| Some(r.user_agent.as_str())).collect();
        let years: Int32Array = partitions.iter().map(|p| p.map(|(y, _)| y)).collect();
        let months: Int32Array = partitions.iter().map(|p| p.map(|(_, m)| m)).collect();

        Ok(RecordBatch::try_new(
            Self::schema(),
            vec![
                Arc::new(start_times),
                Arc::new(user_ids),
                Arc::new(levels),
                Arc::new(song_ids),
                Arc::new(artist_ids),
                Arc::new(session_ids),
                Arc::new(locations),
                Arc::new(user_agents),
                Arc::new(years),
                Arc::new(months),
            ],
        )?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>, StorageError> {
        let start_times = column::<Int64Array>(batch, "start_time")?;
        let user_ids = column::<StringArray>(batch, "user_id")?;
        let levels = column::<StringArray>(batch, "level")?;
        let song_ids = column::<StringArray>(batch, "song_id")?;
        let artist_ids = column::<StringArray>(batch, "artist_id")?;
        let session_ids = column::<Int64Array>(batch, "session_id")?;
        let locations = column::<StringArray>(batch, "location")?;
        let user_agents = column::<StringArray>(batch, "user_agent")?;

        (0..batch.num_rows())
            .map(|i| {
                Ok(SongplayRecord {
                    start_time: required(opt_value(start_times, i), "start_time", i)?,
                    user_id: required(opt_string(user_ids, i), "user_id", i)?,
                    level: required(opt_string(levels, i), "level", i)?,
                    song_id: required(opt_string(song_ids, i), "song_id", i)?,
                    artist_id: required(opt_string(artist_ids, i), "artist_id", i)?,
                    session_id: required(opt_value(session_ids, i), "session_id", i)?,
                    location: required(opt_string(locations, i), "location", i)?,
                    user_agent: required(opt_string(user_agents, i), "user_agent", i)?,
                })
            })
            .collect()
    }
}

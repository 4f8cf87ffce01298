//! Song and artist dimension rows

use std::sync::{Arc, LazyLock};

use arrow::array::{Float64Array, Int32Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use serde::{Deserialize, Serialize};

use crate::storage::{StorageError, TableKind, TableRow, column, opt_string, opt_value, required};

static SONG_SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        Field::new("song_id", DataType::Utf8, false),
        Field::new("title", DataType::Utf8, true),
        Field::new("artist_id", DataType::Utf8, true),
        Field::new("year", DataType::Int32, true),
        Field::new("duration", DataType::Float64, true),
    ]))
});

static ARTIST_SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        Field::new("artist_id", DataType::Utf8, false),
        Field::new("name", DataType::Utf8, true),
        Field::new("location", DataType::Utf8, true),
        Field::new("latitude", DataType::Float64, true),
        Field::new("longitude", DataType::Float64, true),
    ]))
});

/// Row of the `songs` dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongRecord {
    pub song_id: String,
    pub title: Option<String>,
    pub artist_id: Option<String>,
    pub year: Option<i32>,
    /// Track length in seconds
    pub duration: Option<f64>,
}

/// Row of the `artists` dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistRecord {
    pub artist_id: String,
    pub name: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl TableRow for SongRecord {
    const TABLE: TableKind = TableKind::Songs;

    fn schema() -> SchemaRef {
        SONG_SCHEMA.clone()
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch, StorageError> {
        let song_ids: StringArray = rows.iter().map(|r| Some(r.song_id.as_str())).collect();
        let titles: StringArray = rows.iter().map(|r| r.title.as_deref()).collect();
        let artist_ids: StringArray = rows.iter().map(|r| r.artist_id.as_deref()).collect();
        let years: Int32Array = rows.iter().map(|r| r.year).collect();
        let durations: Float64Array = rows.iter().map(|r| r.duration).collect();

        Ok(RecordBatch::try_new(
            Self::schema(),
            vec![
                Arc::new(song_ids),
                Arc::new(titles),
                Arc::new(artist_ids),
                Arc::new(years),
                Arc::new(durations),
            ],
        )?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>, StorageError> {
        let song_ids = column::<StringArray>(batch, "song_id")?;
        let titles = column::<StringArray>(batch, "title")?;
        let artist_ids = column::<StringArray>(batch, "artist_id")?;
        let years = column::<Int32Array>(batch, "year")?;
        let durations = column::<Float64Array>(batch, "duration")?;

        (0..batch.num_rows())
            .map(|i| {
                Ok(SongRecord {
                    song_id: required(opt_string(song_ids, i), "song_id", i)?,
                    title: opt_string(titles, i),
                    artist_id: opt_string(artist_ids, i),
                    year: opt_value(years, i),
                    duration: opt_value(durations, i),
                })
            })
            .collect()
    }
}

impl TableRow for ArtistRecord {
    const TABLE: TableKind = TableKind::Artists;

    fn schema() -> SchemaRef {
        ARTIST_SCHEMA.clone()
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch, StorageError> {
        let artist_ids: StringArray = rows.iter().map(|r| Some(r.artist_id.as_str())).collect();
        let names: StringArray = rows.iter().map(|r| r.name.as_deref()).collect();
        let locations: StringArray = rows.iter().map(|r| r.location.as_deref()).collect();
        let latitudes: Float64Array = rows.iter().map(|r| r.latitude).collect();
        let longitudes: Float64Array = rows.iter().map(|r| r.longitude).collect();

        Ok(RecordBatch::try_new(
            Self::schema(),
            vec![
                Arc::new(artist_ids),
                Arc::new(names),
                Arc::new(locations),
                Arc::new(latitudes),
                Arc::new(longitudes),
            ],
        )?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>, StorageError> {
        let artist_ids = column::<StringArray>(batch, "artist_id")?;
        let names = column::<StringArray>(batch, "name")?;
        let locations = column::<StringArray>(batch, "location")?;
        let latitudes = column::<Float64Array>(batch, "latitude")?;
        let longitudes = column::<Float64Array>(batch, "longitude")?;

        (0..batch.num_rows())
            .map(|i| {
                Ok(ArtistRecord {
                    artist_id: required(opt_string(artist_ids, i), "artist_id", i)?,
                    name: opt_string(names, i),
                    location: opt_string(locations, i),
                    latitude: opt_value(latitudes, i),
                    longitude: opt_value(longitudes, i),
                })
            })
            .collect()
    }
}

//! Song catalog → `songs` and `artists` dimensions

use serde::Serialize;

use super::dedup::{DedupPolicy, DedupStats, deduplicate};
use super::error::TransformError;
use crate::ingest::JsonRecord;
use crate::models::{ArtistRecord, SongRecord};

/// Both dimensions built from one catalog read
#[derive(Debug, Clone, Default, Serialize)]
pub struct SongDimensions {
    pub songs: Vec<SongRecord>,
    pub artists: Vec<ArtistRecord>,
    pub song_stats: DedupStats,
    pub artist_stats: DedupStats,
}

/// Project a catalog record onto the `songs` columns; `None` without a song id
pub fn project_song(record: &JsonRecord) -> Option<SongRecord> {
    Some(SongRecord {
        song_id: record.get_str("song_id")?,
        title: record.get_str("title"),
        artist_id: record.get_str("artist_id"),
        year: record.get_i32("year"),
        duration: record.get_f64("duration"),
    })
}

/// Project a catalog record onto the `artists` columns; `None` without an artist id
pub fn project_artist(record: &JsonRecord) -> Option<ArtistRecord> {
    Some(ArtistRecord {
        artist_id: record.get_str("artist_id")?,
        name: record.get_str("artist_name"),
        location: record.get_str("artist_location"),
        latitude: record.get_f64("artist_latitude"),
        longitude: record.get_f64("artist_longitude"),
    })
}

/// Build the song and artist dimensions from catalog records
pub fn build_song_dimensions(
    records: &[JsonRecord],
    policy: DedupPolicy,
) -> Result<SongDimensions, TransformError> {
    let (songs, song_stats) = deduplicate("songs", records.iter().map(project_song), policy)?;
    let (artists, artist_stats) =
        deduplicate("artists", records.iter().map(project_artist), policy)?;

    tracing::debug!(
        songs = songs.len(),
        artists = artists.len(),
        null_song_id = song_stats.null_key,
        null_artist_id = artist_stats.null_key,
        "Built song dimensions"
    );

    Ok(SongDimensions {
        songs,
        artists,
        song_stats,
        artist_stats,
    })
}

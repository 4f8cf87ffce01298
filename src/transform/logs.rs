//! Listening logs → `users` and `time` dimensions plus normalized events

use serde::Serialize;

use super::calendar::{CalendarParts, millis_to_seconds};
use super::dedup::{DedupPolicy, DedupStats, deduplicate};
use super::error::TransformError;
use crate::ingest::JsonRecord;
use crate::models::{NormalizedEvent, TimeRecord, UserRecord};

/// Page value of a song play event
pub const NEXT_SONG: &str = "NextSong";

/// Counters from event filtering and timestamp conversion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogStats {
    /// Log records read
    pub input_records: usize,
    /// Records whose page is not `NextSong`
    pub filtered_out: usize,
    /// `NextSong` events kept
    pub events: usize,
    /// Events without a `ts`
    pub missing_timestamp: usize,
    /// Events whose `ts` has no calendar date
    pub invalid_timestamp: usize,
}

/// Output of log normalization
#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizedLogs {
    pub events: Vec<NormalizedEvent>,
    pub users: Vec<UserRecord>,
    pub time: Vec<TimeRecord>,
    pub stats: LogStats,
    pub user_stats: DedupStats,
    pub time_stats: DedupStats,
}

/// Whether a log record is a song play
pub fn is_song_play(record: &JsonRecord) -> bool {
    matches!(record.get("page"), Some(serde_json::Value::String(page)) if page == NEXT_SONG)
}

/// Epoch seconds of a record's `ts`, if it has a calendar date
fn start_time(record: &JsonRecord, stats: &mut LogStats) -> Option<i64> {
    let Some(millis) = record.get_i64("ts") else {
        stats.missing_timestamp += 1;
        return None;
    };
    let seconds = millis_to_seconds(millis);
    if CalendarParts::from_epoch_seconds(seconds).is_none() {
        stats.invalid_timestamp += 1;
        return None;
    }
    Some(seconds)
}

/// Project a log record onto the `users` columns; `None` without a user id
pub fn project_user(record: &JsonRecord) -> Option<UserRecord> {
    Some(UserRecord {
        user_id: record.get_str("userId")?,
        first_name: record.get_str("firstName"),
        last_name: record.get_str("lastName"),
        gender: record.get_str("gender"),
        level: record.get_str("level"),
    })
}

fn to_event(record: &JsonRecord, start_time: Option<i64>) -> NormalizedEvent {
    NormalizedEvent {
        start_time,
        user_id: record.get_str("userId"),
        level: record.get_str("level"),
        song: record.get_str("song"),
        artist: record.get_str("artist"),
        session_id: record.get_i64("sessionId"),
        location: record.get_str("location"),
        user_agent: record.get_str("userAgent"),
    }
}

/// Filter to song plays and convert timestamps, without building dimensions
pub fn normalize_events(records: &[JsonRecord]) -> (Vec<NormalizedEvent>, LogStats) {
    let mut stats = LogStats {
        input_records: records.len(),
        ..Default::default()
    };

    let events: Vec<NormalizedEvent> = records
        .iter()
        .filter(|record| is_song_play(record))
        .map(|record| {
            let seconds = start_time(record, &mut stats);
            to_event(record, seconds)
        })
        .collect();

    stats.events = events.len();
    stats.filtered_out = stats.input_records - stats.events;
    (events, stats)
}

/// Normalize log records into events and the `users` and `time` dimensions
pub fn normalize_logs(
    records: &[JsonRecord],
    policy: DedupPolicy,
) -> Result<NormalizedLogs, TransformError> {
    let (events, stats) = normalize_events(records);

    let users = records
        .iter()
        .filter(|record| is_song_play(record))
        .map(project_user);
    let (users, user_stats) = deduplicate("users", users, policy)?;

    let times = events
        .iter()
        .map(|event| event.start_time.and_then(TimeRecord::from_epoch_seconds));
    let (time, time_stats) = deduplicate("time", times, policy)?;

    if stats.missing_timestamp + stats.invalid_timestamp > 0 {
        tracing::info!(
            missing = stats.missing_timestamp,
            invalid = stats.invalid_timestamp,
            "Events without a usable timestamp"
        );
    }

    Ok(NormalizedLogs {
        events,
        users,
        time,
        stats,
        user_stats,
        time_stats,
    })
}

//! Table builders
//!
//! Pure functions from input records to typed rows. Nothing here touches
//! storage; drop counters come back alongside the rows.

pub mod calendar;
mod dedup;
mod error;
mod logs;
mod songplays;
mod songs;

pub use calendar::CalendarParts;
pub use dedup::{DedupPolicy, DedupStats, Keyed, deduplicate};
pub use error::TransformError;
pub use logs::{
    LogStats, NEXT_SONG, NormalizedLogs, is_song_play, normalize_events, normalize_logs,
    project_user,
};
pub use songplays::{FactAssembler, FactStats, JoinCardinality, SongIndex};
pub use songs::{SongDimensions, build_song_dimensions, project_artist, project_song};

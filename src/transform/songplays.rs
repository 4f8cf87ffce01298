//! Normalized events + persisted song catalog → `songplays` facts

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::models::{ArtistRecord, NormalizedEvent, SongRecord, SongplayRecord};

/// How an event matching several catalog songs is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JoinCardinality {
    /// Emit a row only when the artist name identifies exactly one song
    #[default]
    Unique,
    /// Emit one row per matching song
    FanOut,
}

impl std::fmt::Display for JoinCardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinCardinality::Unique => write!(f, "unique"),
            JoinCardinality::FanOut => write!(f, "fan-out"),
        }
    }
}

impl std::str::FromStr for JoinCardinality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unique" => Ok(JoinCardinality::Unique),
            "fan-out" | "fanout" | "fan_out" => Ok(JoinCardinality::FanOut),
            _ => Err(format!(
                "Unknown join cardinality: {}. Valid options: unique, fan-out",
                s
            )),
        }
    }
}

/// Counters from fact assembly
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactStats {
    /// Events offered to the join
    pub events: usize,
    /// Rows emitted
    pub emitted: usize,
    /// Events whose artist matched no catalog song
    pub unmatched_artist: usize,
    /// Events dropped because the artist name matched several songs
    pub ambiguous_artist: usize,
    /// Joined rows dropped for a null field
    pub missing_fields: usize,
    /// Null count per field among dropped rows
    pub missing_by_field: BTreeMap<String, usize>,
}

impl FactStats {
    /// Total events or joined rows that did not become facts
    pub fn dropped(&self) -> usize {
        self.unmatched_artist + self.ambiguous_artist + self.missing_fields
    }
}

/// Catalog songs indexed by artist name
#[derive(Debug, Clone, Default)]
pub struct SongIndex {
    by_artist_name: HashMap<String, Vec<(String, String)>>,
}

impl SongIndex {
    /// Index `(song_id, artist_id)` pairs under their artist's name.
    ///
    /// Songs without an artist, or whose artist has no name, are not
    /// reachable by name and are left out.
    pub fn build(songs: &[SongRecord], artists: &[ArtistRecord]) -> Self {
        let names: HashMap<&str, &str> = artists
            .iter()
            .filter_map(|a| Some((a.artist_id.as_str(), a.name.as_deref()?)))
            .collect();

        let mut by_artist_name: HashMap<String, Vec<(String, String)>> = HashMap::new();
        for song in songs {
            let Some(artist_id) = song.artist_id.as_deref() else {
                continue;
            };
            let Some(name) = names.get(artist_id) else {
                continue;
            };
            let pairs = by_artist_name.entry((*name).to_string()).or_default();
            let pair = (song.song_id.clone(), artist_id.to_string());
            if !pairs.contains(&pair) {
                pairs.push(pair);
            }
        }

        Self { by_artist_name }
    }

    /// Matching `(song_id, artist_id)` pairs, in catalog order
    pub fn lookup(&self, artist_name: &str) -> &[(String, String)] {
        self.by_artist_name
            .get(artist_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of distinct artist names
    pub fn len(&self) -> usize {
        self.by_artist_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_artist_name.is_empty()
    }
}

/// Joins events against the song index
#[derive(Debug, Clone, Default)]
pub struct FactAssembler {
    cardinality: JoinCardinality,
}

impl FactAssembler {
    pub fn new(cardinality: JoinCardinality) -> Self {
        Self { cardinality }
    }

    /// Build fact rows. The join is applied first, then the null filter.
    pub fn assemble(
        &self,
        events: &[NormalizedEvent],
        index: &SongIndex,
    ) -> (Vec<SongplayRecord>, FactStats) {
        let mut stats = FactStats {
            events: events.len(),
            ..Default::default()
        };
        let mut rows = Vec::new();

        for event in events {
            let matches = event
                .artist
                .as_deref()
                .map(|artist| index.lookup(artist))
                .unwrap_or(&[]);

            if matches.is_empty() {
                stats.unmatched_artist += 1;
                continue;
            }
            if self.cardinality == JoinCardinality::Unique && matches.len() > 1 {
                stats.ambiguous_artist += 1;
                continue;
            }

            for (song_id, artist_id) in matches {
                match complete_row(event, song_id, artist_id) {
                    Ok(row) => rows.push(row),
                    Err(missing) => {
                        stats.missing_fields += 1;
                        for field in missing {
                            *stats.missing_by_field.entry(field.to_string()).or_default() += 1;
                        }
                    }
                }
            }
        }

        stats.emitted = rows.len();
        (rows, stats)
    }
}

/// Fill a fact row, or list the fields that are null
fn complete_row(
    event: &NormalizedEvent,
    song_id: &str,
    artist_id: &str,
) -> Result<SongplayRecord, Vec<&'static str>> {
    let mut missing = Vec::new();
    if event.start_time.is_none() {
        missing.push("start_time");
    }
    if event.user_id.is_none() {
        missing.push("user_id");
    }
    if event.level.is_none() {
        missing.push("level");
    }
    if event.session_id.is_none() {
        missing.push("session_id");
    }
    if event.location.is_none() {
        missing.push("location");
    }
    if event.user_agent.is_none() {
        missing.push("user_agent");
    }

    match (
        event.start_time,
        &event.user_id,
        &event.level,
        event.session_id,
        &event.location,
        &event.user_agent,
    ) {
        (
            Some(start_time),
            Some(user_id),
            Some(level),
            Some(session_id),
            Some(location),
            Some(user_agent),
        ) => Ok(SongplayRecord {
            start_time,
            user_id: user_id.clone(),
            level: level.clone(),
            song_id: song_id.to_string(),
            artist_id: artist_id.to_string(),
            session_id,
            location: location.clone(),
            user_agent: user_agent.clone(),
        }),
        _ => Err(missing),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(id: &str, artist_id: &str) -> SongRecord {
        SongRecord {
            song_id: id.to_string(),
            title: None,
            artist_id: Some(artist_id.to_string()),
            year: None,
            duration: None,
        }
    }

    fn artist(id: &str, name: &str) -> ArtistRecord {
        ArtistRecord {
            artist_id: id.to_string(),
            name: Some(name.to_string()),
            location: None,
            latitude: None,
            longitude: None,
        }
    }

    fn event(artist: &str) -> NormalizedEvent {
        NormalizedEvent {
            start_time: Some(1_542_306_626),
            user_id: Some("26".to_string()),
            level: Some("free".to_string()),
            song: Some("Intro".to_string()),
            artist: Some(artist.to_string()),
            session_id: Some(583),
            location: Some("San Jose, CA".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
        }
    }

    fn index() -> SongIndex {
        SongIndex::build(
            &[song("S1", "A1"), song("S2", "A2"), song("S3", "A2")],
            &[artist("A1", "Casual"), artist("A2", "Prolific")],
        )
    }

    #[test]
    fn test_cardinality_parse() {
        assert_eq!("unique".parse::<JoinCardinality>().unwrap(), JoinCardinality::Unique);
        assert_eq!("fan-out".parse::<JoinCardinality>().unwrap(), JoinCardinality::FanOut);
        assert!("many".parse::<JoinCardinality>().is_err());
    }

    #[test]
    fn test_single_match() {
        let (rows, stats) = FactAssembler::default().assemble(&[event("Casual")], &index());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].song_id, "S1");
        assert_eq!(rows[0].artist_id, "A1");
        assert_eq!(rows[0].session_id, 583);
        assert_eq!(stats.emitted, 1);
        assert_eq!(stats.dropped(), 0);
    }

    #[test]
    fn test_unmatched_artist_counted() {
        let mut no_artist = event("Casual");
        no_artist.artist = None;

        let (rows, stats) =
            FactAssembler::default().assemble(&[event("Unknown"), no_artist], &index());
        assert!(rows.is_empty());
        assert_eq!(stats.unmatched_artist, 2);
        assert_eq!(stats.missing_fields, 0);
    }

    #[test]
    fn test_name_match_is_exact() {
        let (rows, _) = FactAssembler::default().assemble(&[event("casual ")], &index());
        assert!(rows.is_empty());
    }

    #[test]
    fn test_unique_drops_ambiguous() {
        let (rows, stats) = FactAssembler::default().assemble(&[event("Prolific")], &index());
        assert!(rows.is_empty());
        assert_eq!(stats.ambiguous_artist, 1);
    }

    #[test]
    fn test_fan_out_emits_every_match() {
        let (rows, stats) =
            FactAssembler::new(JoinCardinality::FanOut).assemble(&[event("Prolific")], &index());
        let ids: Vec<&str> = rows.iter().map(|r| r.song_id.as_str()).collect();
        assert_eq!(ids, vec!["S2", "S3"]);
        assert_eq!(stats.ambiguous_artist, 0);
    }

    #[test]
    fn test_null_fields_dropped_after_join() {
        let mut partial = event("Casual");
        partial.session_id = None;
        partial.location = None;

        let (rows, stats) = FactAssembler::default().assemble(&[partial], &index());
        assert!(rows.is_empty());
        assert_eq!(stats.missing_fields, 1);
        assert_eq!(stats.missing_by_field.get("session_id"), Some(&1));
        assert_eq!(stats.missing_by_field.get("location"), Some(&1));
        assert_eq!(stats.unmatched_artist, 0);
    }

    #[test]
    fn test_play_without_user_dropped() {
        let mut anonymous = event("Casual");
        anonymous.user_id = None;

        let (rows, stats) =
            FactAssembler::default().assemble(&[anonymous, event("Casual")], &index());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, "26");
        assert_eq!(stats.missing_fields, 1);
        assert_eq!(stats.missing_by_field.get("user_id"), Some(&1));
    }

    #[test]
    fn test_index_skips_songs_without_artist_name() {
        let mut orphan = song("S9", "A9");
        orphan.artist_id = None;
        let index = SongIndex::build(
            &[orphan, song("S1", "A1"), song("S1", "A1")],
            &[artist("A1", "Casual")],
        );
        assert_eq!(index.len(), 1);
        assert_eq!(index.lookup("Casual").len(), 1);
    }
}

//! Key-based deduplication of dimension rows

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt::Display;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use super::error::TransformError;
use crate::models::{ArtistRecord, SongRecord, TimeRecord, UserRecord};

/// Which row survives when several share a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupPolicy {
    /// Keep the first row seen (sorted file order, then line order)
    #[default]
    First,
    /// Keep the last row seen
    Last,
    /// Fail when rows sharing a key differ
    Reject,
}

impl std::fmt::Display for DedupPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DedupPolicy::First => write!(f, "first"),
            DedupPolicy::Last => write!(f, "last"),
            DedupPolicy::Reject => write!(f, "reject"),
        }
    }
}

impl std::str::FromStr for DedupPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "first" => Ok(DedupPolicy::First),
            "last" => Ok(DedupPolicy::Last),
            "reject" => Ok(DedupPolicy::Reject),
            _ => Err(format!(
                "Unknown dedup policy: {}. Valid options: first, last, reject",
                s
            )),
        }
    }
}

/// Counters from one deduplication pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupStats {
    /// Rows offered, including null-key rows
    pub input_rows: usize,
    /// Rows dropped because the key was null
    pub null_key: usize,
    /// Rows whose key was already seen
    pub duplicates: usize,
    /// Duplicates that differ from the kept row in some column
    pub conflicts: usize,
    /// Rows kept
    pub output_rows: usize,
}

/// A row with a unique key
pub trait Keyed {
    type Key: Eq + Hash + Clone + Display;

    fn key(&self) -> &Self::Key;
}

impl Keyed for SongRecord {
    type Key = String;

    fn key(&self) -> &String {
        &self.song_id
    }
}

impl Keyed for ArtistRecord {
    type Key = String;

    fn key(&self) -> &String {
        &self.artist_id
    }
}

impl Keyed for UserRecord {
    type Key = String;

    fn key(&self) -> &String {
        &self.user_id
    }
}

impl Keyed for TimeRecord {
    type Key = i64;

    fn key(&self) -> &i64 {
        &self.start_time
    }
}

/// Deduplicate rows by key.
///
/// `None` entries stand for rows whose key was null; they are counted and
/// dropped. Output keeps the position of each key's first occurrence.
pub fn deduplicate<T, I>(
    table: &str,
    rows: I,
    policy: DedupPolicy,
) -> Result<(Vec<T>, DedupStats), TransformError>
where
    T: Keyed + PartialEq,
    I: IntoIterator<Item = Option<T>>,
{
    let mut stats = DedupStats::default();
    let mut positions: HashMap<T::Key, usize> = HashMap::new();
    let mut kept: Vec<T> = Vec::new();

    for row in rows {
        stats.input_rows += 1;
        let Some(row) = row else {
            stats.null_key += 1;
            continue;
        };

        match positions.entry(row.key().clone()) {
            Entry::Vacant(slot) => {
                slot.insert(kept.len());
                kept.push(row);
            }
            Entry::Occupied(slot) => {
                stats.duplicates += 1;
                let existing = &mut kept[*slot.get()];
                if *existing == row {
                    continue;
                }

                stats.conflicts += 1;
                tracing::debug!(
                    table = %table,
                    key = %slot.key(),
                    policy = %policy,
                    "Conflicting duplicate"
                );
                match policy {
                    DedupPolicy::First => {}
                    DedupPolicy::Last => *existing = row,
                    DedupPolicy::Reject => {
                        return Err(TransformError::DedupConflict {
                            table: table.to_string(),
                            key: slot.key().to_string(),
                        });
                    }
                }
            }
        }
    }

    stats.output_rows = kept.len();
    Ok((kept, stats))
}

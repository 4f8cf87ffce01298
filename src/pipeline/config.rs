//! Pipeline configuration types

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{PipelineError, PipelineResult};
use crate::storage::WriteOptions;
use crate::transform::{DedupPolicy, JoinCardinality};

/// Default pattern for song catalog files, relative to the input root
pub const DEFAULT_SONG_PATTERN: &str = "song_data/*/*/*/*.json";

/// Default pattern for event log files, relative to the input root
pub const DEFAULT_LOG_PATTERN: &str = "log_data/*/*/*.json";

/// Main pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Base path the dataset patterns are resolved under
    pub input_root: Option<PathBuf>,
    /// Directory holding one subdirectory per table
    pub output_root: Option<PathBuf>,
    /// Song catalog pattern
    pub song_pattern: String,
    /// Event log pattern
    pub log_pattern: String,
    /// Tie-break for rows sharing a dimension key
    pub dedup: DedupPolicy,
    /// Handling of events matching several songs
    pub join: JoinCardinality,
    /// Parquet layout options
    pub write: WriteOptions,
    /// Threads used to parse input files
    pub workers: usize,
    /// Stages to run (empty = all)
    pub stages: Vec<PipelineStage>,
    /// Enable dry-run mode
    pub dry_run: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_root: None,
            output_root: None,
            song_pattern: DEFAULT_SONG_PATTERN.to_string(),
            log_pattern: DEFAULT_LOG_PATTERN.to_string(),
            dedup: DedupPolicy::default(),
            join: JoinCardinality::default(),
            write: WriteOptions::default(),
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            stages: Vec::new(),
            dry_run: false,
        }
    }
}

impl PipelineConfig {
    /// Create a new pipeline config
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config from a TOML file
    pub fn from_toml_file(path: &Path) -> PipelineResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::io_with_path(path, "reading configuration", e))?;
        Self::from_toml_str(&text)
    }

    /// Parse a config from TOML text; absent keys keep their defaults
    pub fn from_toml_str(text: &str) -> PipelineResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Set the input root
    pub fn with_input_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_root = Some(path.into());
        self
    }

    /// Set the output root
    pub fn with_output_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_root = Some(path.into());
        self
    }

    /// Set the song catalog pattern
    pub fn with_song_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.song_pattern = pattern.into();
        self
    }

    /// Set the event log pattern
    pub fn with_log_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.log_pattern = pattern.into();
        self
    }

    /// Set the dedup policy
    pub fn with_dedup_policy(mut self, policy: DedupPolicy) -> Self {
        self.dedup = policy;
        self
    }

    /// Set the join cardinality
    pub fn with_join_cardinality(mut self, cardinality: JoinCardinality) -> Self {
        self.join = cardinality;
        self
    }

    /// Set the Parquet write options
    pub fn with_write_options(mut self, options: WriteOptions) -> Self {
        self.write = options;
        self
    }

    /// Set the number of parse workers
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set specific stages to run
    pub fn with_stages(mut self, stages: Vec<PipelineStage>) -> Self {
        self.stages = stages;
        self
    }

    /// Enable dry-run mode
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Get stages to run in execution order (all if empty)
    pub fn effective_stages(&self) -> Vec<PipelineStage> {
        let mut stages = if self.stages.is_empty() {
            PipelineStage::all()
        } else {
            self.stages.clone()
        };
        stages.sort_by_key(PipelineStage::index);
        stages.dedup();
        stages
    }

    /// Check if a specific stage should run
    pub fn should_run_stage(&self, stage: PipelineStage) -> bool {
        self.stages.is_empty() || self.stages.contains(&stage)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.input_root.is_none() {
            return Err("Input root is required".to_string());
        }
        if self.output_root.is_none() {
            return Err("Output root is required".to_string());
        }

        let reads_songs = self.should_run_stage(PipelineStage::Songs);
        let reads_logs = self.should_run_stage(PipelineStage::Logs)
            || self.should_run_stage(PipelineStage::Songplays);
        if reads_songs && self.song_pattern.trim().is_empty() {
            return Err("Song pattern must not be empty".to_string());
        }
        if reads_logs && self.log_pattern.trim().is_empty() {
            return Err("Log pattern must not be empty".to_string());
        }

        if self.workers == 0 {
            return Err("Workers must be at least 1".to_string());
        }
        if self.write.max_rows_per_file == 0 {
            return Err("max_rows_per_file must be at least 1".to_string());
        }
        if self.write.max_row_group_size == 0 {
            return Err("max_row_group_size must be at least 1".to_string());
        }

        Ok(())
    }
}

/// Pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    /// Stage 1: Build and write the songs and artists tables
    Songs,
    /// Stage 2: Build and write the users and time tables
    Logs,
    /// Stage 3: Join events with the catalog and write songplays
    Songplays,
}

impl PipelineStage {
    /// Get all stages in execution order
    pub fn all() -> Vec<Self> {
        vec![Self::Songs, Self::Logs, Self::Songplays]
    }

    /// Get stage name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Songs => "songs",
            Self::Logs => "logs",
            Self::Songplays => "songplays",
        }
    }

    /// Get stage description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Songs => "Build songs and artists from the song catalog",
            Self::Logs => "Build users and time from the event logs",
            Self::Songplays => "Join song plays with the persisted catalog",
        }
    }

    /// Get stage index (1-based)
    pub fn index(&self) -> usize {
        match self {
            Self::Songs => 1,
            Self::Logs => 2,
            Self::Songplays => 3,
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for PipelineStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "songs" | "1" => Ok(Self::Songs),
            "logs" | "2" => Ok(Self::Logs),
            "songplays" | "3" => Ok(Self::Songplays),
            _ => Err(format!("Unknown stage: {}", s)),
        }
    }
}

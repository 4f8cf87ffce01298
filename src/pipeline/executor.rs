//! Pipeline executor running the songs, logs and songplays stages

use std::collections::BTreeMap;
use std::time::Instant;

use serde_json::json;
use tracing::{debug, error, info, info_span};
use uuid::Uuid;

use super::config::{PipelineConfig, PipelineStage};
use super::error::{PipelineError, PipelineResult};
use super::report::{PipelineReport, PipelineStatus, StageOutput};
use crate::ingest::{LocalSource, RecordSource};
use crate::models::{ArtistRecord, NormalizedEvent, SongRecord};
use crate::storage::{TableKind, TableStore, WriteSummary};
use crate::transform::{
    DedupStats, FactAssembler, SongIndex, build_song_dimensions, normalize_events, normalize_logs,
};

/// Pipeline executor that runs all stages
pub struct PipelineExecutor {
    config: PipelineConfig,
    source: Box<dyn RecordSource>,
    store: TableStore,
    run_id: String,
    /// Events normalized by the logs stage, consumed by songplays
    pending_events: Option<Vec<NormalizedEvent>>,
}

impl PipelineExecutor {
    /// Create a new pipeline executor reading from the local filesystem
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        config.validate().map_err(PipelineError::ConfigError)?;
        let input_root = config
            .input_root
            .clone()
            .ok_or_else(|| PipelineError::MissingInput("input root".to_string()))?;
        let source = LocalSource::new(input_root).with_workers(config.workers);
        Self::with_source(config, Box::new(source))
    }

    /// Create an executor reading through a custom record source
    pub fn with_source(
        config: PipelineConfig,
        source: Box<dyn RecordSource>,
    ) -> PipelineResult<Self> {
        config.validate().map_err(PipelineError::ConfigError)?;
        let output_root = config
            .output_root
            .clone()
            .ok_or_else(|| PipelineError::MissingInput("output root".to_string()))?;
        let store = TableStore::new(output_root, config.write.clone());

        Ok(Self {
            config,
            source,
            store,
            run_id: Uuid::new_v4().to_string(),
            pending_events: None,
        })
    }

    /// Get the run ID
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the table store
    pub fn store(&self) -> &TableStore {
        &self.store
    }

    /// Run the pipeline
    pub fn run(&mut self) -> PipelineResult<PipelineReport> {
        let _span = info_span!(
            "pipeline_run",
            run_id = %self.run_id,
            dry_run = self.config.dry_run
        )
        .entered();

        let start = Instant::now();
        let stages = self.config.effective_stages();

        info!(
            run_id = %self.run_id,
            input = %self.source.describe(),
            output = %self.store.root().display(),
            stages = ?stages.iter().map(|s| s.name()).collect::<Vec<_>>(),
            dry_run = self.config.dry_run,
            "Starting pipeline"
        );

        if self.config.dry_run {
            return self.dry_run(&stages);
        }

        let mut stages_completed = Vec::new();
        let mut outputs = BTreeMap::new();

        for stage in &stages {
            let _stage_span = info_span!("pipeline_stage", stage = stage.name()).entered();
            info!(
                stage = stage.name(),
                description = stage.description(),
                "Starting stage"
            );

            match self.run_stage(*stage) {
                Ok(output) => {
                    info!(
                        stage = stage.name(),
                        duration_ms = output.duration_ms,
                        "Stage completed"
                    );
                    stages_completed.push(*stage);
                    outputs.insert(stage.name().to_string(), output);
                }
                Err(e) => {
                    error!(stage = stage.name(), error = %e, "Stage failed");
                    return Err(PipelineError::stage_failure(stage.name(), e));
                }
            }
        }

        let duration = start.elapsed();
        info!(
            run_id = %self.run_id,
            duration_ms = duration.as_millis() as u64,
            stages_completed = stages_completed.len(),
            "Pipeline completed"
        );

        Ok(PipelineReport {
            run_id: self.run_id.clone(),
            status: PipelineStatus::Completed,
            stages_completed,
            duration_ms: duration.as_millis() as u64,
            outputs,
        })
    }

    /// Run a single stage
    fn run_stage(&mut self, stage: PipelineStage) -> PipelineResult<StageOutput> {
        let start = Instant::now();

        let output = match stage {
            PipelineStage::Songs => self.run_songs()?,
            PipelineStage::Logs => self.run_logs()?,
            PipelineStage::Songplays => self.run_songplays()?,
        };

        Ok(output.with_duration(start.elapsed().as_millis() as u64))
    }

    /// Build and write `songs` and `artists`
    fn run_songs(&mut self) -> PipelineResult<StageOutput> {
        let records = self.source.read_all(&self.config.song_pattern)?;
        debug!(records = records.len(), "Read song catalog");

        let dims = build_song_dimensions(&records, self.config.dedup)?;
        log_dedup("songs", &dims.song_stats);
        log_dedup("artists", &dims.artist_stats);

        let songs = self.store.write(&dims.songs)?;
        let artists = self.store.write(&dims.artists)?;

        let output = StageOutput::success()
            .with_file(self.store.table_path(TableKind::Songs))
            .with_file(self.store.table_path(TableKind::Artists))
            .with_metadata("input_records", json!(records.len()));
        let output = with_write_metadata(output, "songs", &songs);
        let output = with_write_metadata(output, "artists", &artists);
        let output = with_dedup_metadata(output, "songs", &dims.song_stats);
        Ok(with_dedup_metadata(output, "artists", &dims.artist_stats))
    }

    /// Build and write `users` and `time`; keep events for songplays
    fn run_logs(&mut self) -> PipelineResult<StageOutput> {
        let records = self.source.read_all(&self.config.log_pattern)?;
        debug!(records = records.len(), "Read event logs");

        let logs = normalize_logs(&records, self.config.dedup)?;
        log_dedup("users", &logs.user_stats);
        log_dedup("time", &logs.time_stats);

        let users = self.store.write(&logs.users)?;
        let time = self.store.write(&logs.time)?;

        let output = StageOutput::success()
            .with_file(self.store.table_path(TableKind::Users))
            .with_file(self.store.table_path(TableKind::Time))
            .with_metadata("input_records", json!(logs.stats.input_records))
            .with_metadata("events", json!(logs.stats.events))
            .with_metadata("filtered_out", json!(logs.stats.filtered_out))
            .with_metadata("missing_timestamp", json!(logs.stats.missing_timestamp))
            .with_metadata("invalid_timestamp", json!(logs.stats.invalid_timestamp));
        let output = with_write_metadata(output, "users", &users);
        let output = with_write_metadata(output, "time", &time);
        let output = with_dedup_metadata(output, "users", &logs.user_stats);
        let output = with_dedup_metadata(output, "time", &logs.time_stats);

        self.pending_events = Some(logs.events);
        Ok(output)
    }

    /// Join events with the persisted catalog and write `songplays`
    fn run_songplays(&mut self) -> PipelineResult<StageOutput> {
        let events = match self.pending_events.take() {
            Some(events) => events,
            None => {
                debug!("Streaming events for songplays");
                let records = self
                    .source
                    .stream(&self.config.log_pattern)?
                    .collect::<Result<Vec<_>, _>>()?;
                normalize_events(&records).0
            }
        };

        // Read-after-write: the catalog comes from storage, not memory
        let songs = self.store.read::<SongRecord>()?;
        let artists = self.store.read::<ArtistRecord>()?;
        let index = SongIndex::build(&songs, &artists);
        debug!(
            songs = songs.len(),
            artists = artists.len(),
            artist_names = index.len(),
            "Built song index"
        );

        let (rows, stats) = FactAssembler::new(self.config.join).assemble(&events, &index);
        if stats.dropped() > 0 {
            info!(
                unmatched_artist = stats.unmatched_artist,
                ambiguous_artist = stats.ambiguous_artist,
                missing_fields = stats.missing_fields,
                "Dropped song plays"
            );
        }

        let written = self.store.write(&rows)?;

        let mut output = StageOutput::success()
            .with_file(self.store.table_path(TableKind::Songplays))
            .with_metadata("events", json!(stats.events))
            .with_metadata("unmatched_artist", json!(stats.unmatched_artist))
            .with_metadata("ambiguous_artist", json!(stats.ambiguous_artist))
            .with_metadata("missing_fields", json!(stats.missing_fields));
        for (field, count) in &stats.missing_by_field {
            output = output.with_metadata(format!("missing_{field}"), json!(count));
        }
        Ok(with_write_metadata(output, "songplays", &written))
    }

    /// Run in dry-run mode (validation only)
    fn dry_run(&self, stages: &[PipelineStage]) -> PipelineResult<PipelineReport> {
        let mut errors = Vec::new();
        let mut outputs = BTreeMap::new();

        for stage in stages {
            match self.validate_stage(*stage, stages) {
                Ok(files) => {
                    outputs.insert(
                        stage.name().to_string(),
                        StageOutput::skipped("dry run").with_metadata("input_files", json!(files)),
                    );
                }
                Err(e) => errors.push(PipelineError::stage_failure(stage.name(), e)),
            }
        }

        match errors.len() {
            0 => {}
            1 => return Err(errors.remove(0)),
            _ => return Err(PipelineError::Multiple(errors)),
        }

        info!(stages = stages.len(), "Dry run validation passed");

        Ok(PipelineReport {
            run_id: self.run_id.clone(),
            status: PipelineStatus::Validated,
            stages_completed: Vec::new(),
            duration_ms: 0,
            outputs,
        })
    }

    /// Validate a stage's inputs; returns the number of input files
    fn validate_stage(
        &self,
        stage: PipelineStage,
        stages: &[PipelineStage],
    ) -> PipelineResult<usize> {
        match stage {
            PipelineStage::Songs => Ok(self.source.files(&self.config.song_pattern)?.len()),
            PipelineStage::Logs => Ok(self.source.files(&self.config.log_pattern)?.len()),
            PipelineStage::Songplays => {
                let files = self.source.files(&self.config.log_pattern)?.len();
                if !stages.contains(&PipelineStage::Songs) {
                    for table in [TableKind::Songs, TableKind::Artists] {
                        if !self.store.exists(table) {
                            return Err(PipelineError::MissingInput(format!(
                                "{} table at {}",
                                table,
                                self.store.table_path(table).display()
                            )));
                        }
                    }
                }
                Ok(files)
            }
        }
    }
}

fn log_dedup(table: &str, stats: &DedupStats) {
    if stats.null_key > 0 || stats.conflicts > 0 {
        info!(
            table = %table,
            null_key = stats.null_key,
            duplicates = stats.duplicates,
            conflicts = stats.conflicts,
            "Deduplicated rows"
        );
    }
}

fn with_write_metadata(output: StageOutput, table: &str, summary: &WriteSummary) -> StageOutput {
    output
        .with_metadata(table, json!(summary.rows))
        .with_metadata(format!("{table}_partitions"), json!(summary.partitions))
        .with_metadata(format!("{table}_files"), json!(summary.files.len()))
}

fn with_dedup_metadata(output: StageOutput, table: &str, stats: &DedupStats) -> StageOutput {
    output
        .with_metadata(format!("{table}_null_key"), json!(stats.null_key))
        .with_metadata(format!("{table}_duplicates"), json!(stats.duplicates))
        .with_metadata(format!("{table}_conflicts"), json!(stats.conflicts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn fixture(root: &Path) {
        write(
            &root.join("song_data/A/B/C/TRAAA.json"),
            r#"{"song_id": "S1", "title": "Intro", "artist_id": "A1", "artist_name": "Casual", "year": 2004, "duration": 218.9}"#,
        );
        write(
            &root.join("log_data/2018/11/2018-11-15-events.json"),
            concat!(
                r#"{"page": "NextSong", "userId": "26", "level": "free", "artist": "Casual", "song": "Intro", "sessionId": 583, "location": "San Jose, CA", "userAgent": "Mozilla/5.0", "ts": 1542306626796}"#,
                "\n",
                r#"{"page": "Home", "userId": "26", "level": "free", "sessionId": 583, "location": "San Jose, CA", "userAgent": "Mozilla/5.0", "ts": 1542306600000}"#,
                "\n"
            ),
        );
    }

    fn config(temp: &TempDir) -> PipelineConfig {
        PipelineConfig::new()
            .with_input_root(temp.path().join("input"))
            .with_output_root(temp.path().join("lake"))
            .with_workers(2)
    }

    #[test]
    fn test_executor_requires_roots() {
        assert!(matches!(
            PipelineExecutor::new(PipelineConfig::new()),
            Err(PipelineError::ConfigError(_))
        ));
    }

    #[test]
    fn test_full_run_reports_counters() {
        let temp = TempDir::new().unwrap();
        fixture(&temp.path().join("input"));

        let mut executor = PipelineExecutor::new(config(&temp)).unwrap();
        let report = executor.run().unwrap();

        assert!(report.is_success());
        assert_eq!(report.stages_completed, PipelineStage::all());

        let songs = report.output(PipelineStage::Songs).unwrap();
        assert_eq!(songs.counter("songs"), Some(1));
        assert_eq!(songs.counter("artists"), Some(1));

        let logs = report.output(PipelineStage::Logs).unwrap();
        assert_eq!(logs.counter("events"), Some(1));
        assert_eq!(logs.counter("filtered_out"), Some(1));

        let plays = report.output(PipelineStage::Songplays).unwrap();
        assert_eq!(plays.counter("songplays"), Some(1));
        assert_eq!(plays.counter("unmatched_artist"), Some(0));
    }

    #[test]
    fn test_songplays_alone_needs_catalog() {
        let temp = TempDir::new().unwrap();
        fixture(&temp.path().join("input"));

        let mut executor = PipelineExecutor::new(
            config(&temp).with_stages(vec![PipelineStage::Songplays]),
        )
        .unwrap();
        let err = executor.run().unwrap_err();
        assert_eq!(err.stage_name(), Some("songplays"));
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let temp = TempDir::new().unwrap();
        fixture(&temp.path().join("input"));

        let mut executor = PipelineExecutor::new(config(&temp).with_dry_run(true)).unwrap();
        let report = executor.run().unwrap();

        assert_eq!(report.status, PipelineStatus::Validated);
        assert_eq!(
            report.output(PipelineStage::Songs).unwrap().counter("input_files"),
            Some(1)
        );
        assert!(!temp.path().join("lake").exists());
    }

    #[test]
    fn test_dry_run_reports_missing_inputs() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("input")).unwrap();

        let mut executor = PipelineExecutor::new(config(&temp).with_dry_run(true)).unwrap();
        assert!(matches!(
            executor.run().unwrap_err(),
            PipelineError::Multiple(errors) if errors.len() == 3
        ));
    }
}

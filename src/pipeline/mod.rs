//! Batch pipeline from raw JSON datasets to the star schema
//!
//! Stages run strictly in order and each stage's writes complete before the
//! next one starts:
//!
//! 1. **Songs**: song catalog → `songs` (by year, artist_id) and `artists`
//! 2. **Logs**: event logs → `users` and `time` (by year, month)
//! 3. **Songplays**: `NextSong` events joined with the persisted catalog →
//!    `songplays` (by year, month)
//!
//! # Example
//!
//! ```rust,ignore
//! use sparkify_lake::pipeline::{PipelineConfig, PipelineExecutor};
//!
//! let config = PipelineConfig::new()
//!     .with_input_root("/data/udacity-dend")
//!     .with_output_root("/data/lake");
//!
//! let mut executor = PipelineExecutor::new(config)?;
//! let report = executor.run()?;
//!
//! println!("Pipeline completed in {}", report.duration_formatted());
//! ```
//!
//! # Dry Run
//!
//! Validate inputs without writing anything:
//!
//! ```rust,ignore
//! let config = PipelineConfig::new()
//!     .with_input_root("/data/udacity-dend")
//!     .with_output_root("/data/lake")
//!     .with_dry_run(true);
//!
//! let report = run_pipeline(config)?;
//! ```

mod config;
mod error;
mod executor;
mod report;

pub use config::{DEFAULT_LOG_PATTERN, DEFAULT_SONG_PATTERN, PipelineConfig, PipelineStage};
pub use error::{PipelineError, PipelineResult};
pub use executor::PipelineExecutor;
pub use report::{PipelineReport, PipelineStatus, StageOutput};

/// Run a pipeline with the given configuration
///
/// This is a convenience function for simple pipeline execution.
pub fn run_pipeline(config: PipelineConfig) -> PipelineResult<PipelineReport> {
    let mut executor = PipelineExecutor::new(config)?;
    executor.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_run_pipeline_dry_run() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("input");
        let songs = input.join("song_data/A/A/A");
        std::fs::create_dir_all(&songs).unwrap();
        std::fs::write(songs.join("TRAAAAW.json"), r#"{"song_id": "S1"}"#).unwrap();

        let config = PipelineConfig::new()
            .with_input_root(&input)
            .with_output_root(temp.path().join("lake"))
            .with_dry_run(true)
            .with_stages(vec![PipelineStage::Songs]);

        let report = run_pipeline(config).unwrap();
        assert!(report.is_success());
    }
}

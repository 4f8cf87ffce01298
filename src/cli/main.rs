//! sparkify-lake - command-line driver for the star schema batch job

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sparkify_lake::pipeline::{PipelineConfig, PipelineError, PipelineExecutor, PipelineStage};
use sparkify_lake::storage::CompressionCodec;
use sparkify_lake::transform::{DedupPolicy, JoinCardinality};

/// Command-line arguments for sparkify-lake
#[derive(Parser, Debug)]
#[command(name = "sparkify-lake")]
#[command(about = "Build the songs, artists, users, time and songplays tables as partitioned Parquet")]
#[command(version)]
struct Args {
    /// Base path of the song_data and log_data datasets
    #[arg(short, long, env = "SPARKIFY_INPUT_ROOT")]
    input: Option<PathBuf>,

    /// Directory the tables are written under
    #[arg(short, long, env = "SPARKIFY_OUTPUT_ROOT")]
    output: Option<PathBuf>,

    /// TOML configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stage to run (songs, logs, songplays); repeat for several, default all
    #[arg(short, long = "stage")]
    stages: Vec<PipelineStage>,

    /// Song catalog pattern, relative to the input root
    #[arg(long)]
    song_pattern: Option<String>,

    /// Event log pattern, relative to the input root
    #[arg(long)]
    log_pattern: Option<String>,

    /// Row kept when dimension keys repeat (first, last, reject)
    #[arg(long)]
    dedup: Option<DedupPolicy>,

    /// Events matching several songs: unique (default) drops plays whose
    /// artist has more than one catalog song, fan-out keeps one row per match
    #[arg(long)]
    join: Option<JoinCardinality>,

    /// Parquet compression (snappy, zstd, none)
    #[arg(long)]
    compression: Option<CompressionCodec>,

    /// Maximum rows per Parquet file
    #[arg(long)]
    max_rows_per_file: Option<usize>,

    /// Threads used to parse input files
    #[arg(short, long)]
    workers: Option<usize>,

    /// Validate inputs without writing tables
    #[arg(long)]
    dry_run: bool,

    /// Write the run report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Merge flags over the configuration file (or defaults)
    fn into_config(self) -> Result<(PipelineConfig, Option<PathBuf>)> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_toml_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => PipelineConfig::new(),
        };

        if let Some(input) = self.input {
            config = config.with_input_root(input);
        }
        if let Some(output) = self.output {
            config = config.with_output_root(output);
        }
        if !self.stages.is_empty() {
            config = config.with_stages(self.stages);
        }
        if let Some(pattern) = self.song_pattern {
            config = config.with_song_pattern(pattern);
        }
        if let Some(pattern) = self.log_pattern {
            config = config.with_log_pattern(pattern);
        }
        if let Some(policy) = self.dedup {
            config = config.with_dedup_policy(policy);
        }
        if let Some(cardinality) = self.join {
            config = config.with_join_cardinality(cardinality);
        }
        if let Some(compression) = self.compression {
            config.write = config.write.with_compression(compression);
        }
        if let Some(rows) = self.max_rows_per_file {
            config.write = config.write.with_max_rows_per_file(rows);
        }
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        if self.dry_run {
            config = config.with_dry_run(true);
        }

        Ok((config, self.report))
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "sparkify_lake=debug,info"
    } else {
        "info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(args: Args) -> Result<()> {
    let (config, report_path) = args.into_config()?;

    let mut executor = PipelineExecutor::new(config)?;
    eprintln!("Starting pipeline run: {}", executor.run_id());

    let report = executor.run()?;
    report.print_summary();

    if let Some(path) = report_path {
        report.save(&path)?;
        eprintln!("Report written to {}", path.display());
    }

    eprintln!();
    eprintln!("Pipeline {}", report.status);
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<PipelineError>() {
                Some(pipeline_error) => eprintln!("Error: {}", pipeline_error.user_message()),
                None => eprintln!("Error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

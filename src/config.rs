//! Run configuration: CLI surface for the `simulator` binary.
//!
//! Mirrors the original tooling's `job_number` partitioning scheme (each
//! worker tests a slice of candidate roots) without its Bash-driven
//! cluster dispatch, which has no place in a single-process simulator.

use crate::error::ConfigError;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum GraphSource {
    AsRel,
    Dimes,
    EdgeList,
    Grid,
}

/// CLI arguments for a single simulator run.
#[derive(Debug, Parser)]
#[command(name = "treesim", about = "Tree-based compact routing simulator")]
pub struct Cli {
    /// Which partition of candidate roots this worker tests (>= 1).
    pub job_number: u64,

    /// Total number of partitions job_number is drawn from.
    #[arg(long, default_value_t = 1)]
    pub job_count: u64,

    /// Graph source format.
    #[arg(long, value_enum)]
    pub source: GraphSource,

    /// Path to the input graph file (ignored for --source grid).
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Side length for --source grid.
    #[arg(long, default_value_t = 4)]
    pub grid_side: usize,

    /// Directory results are written to.
    #[arg(long, default_value = "output-treesim")]
    pub output_dir: PathBuf,

    /// Deterministic seed for clock initialization (and grid shuffling).
    #[arg(long, default_value_t = 12345)]
    pub seed: u64,

    /// Test a single specific root id instead of this job's partition of
    /// all node ids.
    #[arg(long)]
    pub root_id: Option<u64>,
}

/// Validated run configuration derived from [`Cli`].
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub job_number: u64,
    pub job_count: u64,
    pub source: GraphSourceConfig,
    pub output_dir: PathBuf,
    pub seed: u64,
    pub root_id: Option<u64>,
}

#[derive(Debug, Clone)]
pub enum GraphSourceConfig {
    AsRel { path: PathBuf },
    Dimes { path: PathBuf },
    EdgeList { path: PathBuf },
    Grid { side: usize },
}

impl RunConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        if cli.job_number < 1 {
            return Err(ConfigError::InvalidJobNumber(cli.job_number));
        }

        let source = match cli.source {
            GraphSource::AsRel => GraphSourceConfig::AsRel {
                path: cli.input.ok_or_else(|| ConfigError::UnknownSource("as-rel requires --input".into()))?,
            },
            GraphSource::Dimes => GraphSourceConfig::Dimes {
                path: cli.input.ok_or_else(|| ConfigError::UnknownSource("dimes requires --input".into()))?,
            },
            GraphSource::EdgeList => GraphSourceConfig::EdgeList {
                path: cli.input.ok_or_else(|| ConfigError::UnknownSource("edge-list requires --input".into()))?,
            },
            GraphSource::Grid => GraphSourceConfig::Grid { side: cli.grid_side },
        };

        std::fs::create_dir_all(&cli.output_dir).map_err(|e| {
            ConfigError::OutputDir(cli.output_dir.to_string_lossy().to_string(), e)
        })?;

        Ok(Self {
            job_number: cli.job_number,
            job_count: cli.job_count,
            source,
            output_dir: cli.output_dir,
            seed: cli.seed,
            root_id: cli.root_id,
        })
    }
}

impl GraphSourceConfig {
    /// Short name used to build the `<graph>-<rootID>` output path convention.
    pub fn graph_name(&self) -> String {
        fn stem(path: &PathBuf) -> String {
            path.file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "graph".to_string())
        }
        match self {
            GraphSourceConfig::AsRel { path } => stem(path),
            GraphSourceConfig::Dimes { path } => stem(path),
            GraphSourceConfig::EdgeList { path } => stem(path),
            GraphSourceConfig::Grid { side } => format!("grid{side}"),
        }
    }
}

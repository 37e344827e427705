//! Error types for the tree routing simulator.
//!
//! One `thiserror` enum per concern, following the one-error-type-per-module
//! convention used throughout this codebase.

use thiserror::Error;

/// Errors produced while ingesting a graph from an external source.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed edge line {line_no} in {path}: {content:?}")]
    MalformedLine {
        path: String,
        line_no: usize,
        content: String,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("grid side length must be positive, got {0}")]
    InvalidGridSide(usize),

    #[error("requested root id {0} was never seen as an edge endpoint")]
    UnknownRoot(u64),
}

/// Errors produced while driving the simulation to convergence or evaluating it.
#[derive(Error, Debug)]
pub enum SimError {
    #[error(
        "network failed to converge within {steps} steps ({node_count} nodes); \
         last change observed too long ago"
    )]
    NotConverged { steps: u64, node_count: usize },

    #[error("node store is empty, nothing to simulate")]
    EmptyStore,

    #[error("node {0} referenced as a link endpoint is not present in the store")]
    DanglingLink(u64),
}

/// Errors produced while assembling run configuration (CLI / config file).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("output directory {0} could not be created: {1}")]
    OutputDir(String, #[source] std::io::Error),

    #[error("job_number must be >= 1, got {0}")]
    InvalidJobNumber(u64),

    #[error("unknown graph source {0:?}, expected one of as-rel, dimes, edge-list, grid")]
    UnknownSource(String),
}

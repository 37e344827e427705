//! Tree routing simulator CLI.
//!
//! Loads a graph, biases a root's `TreeId`, drives the path-vector
//! protocol to convergence, evaluates routing stretch against a Dijkstra
//! oracle, and writes the stretch histogram plus a JSON report per root
//! tested — following the `outDir/<graph>-<rootID>` convention.

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use treesim::config::{Cli, GraphSourceConfig, RunConfig};
use treesim::loader::{AsRelationLoader, DimesLoader, EdgeListLoader, GraphLoader, SquareGridLoader};
use treesim::node_state::NodeStore;
use treesim::{evaluator, logging, oracle, simulation};

fn build_loader(source: &GraphSourceConfig, seed: u64) -> Box<dyn GraphLoader> {
    match source {
        GraphSourceConfig::AsRel { path } => Box::new(AsRelationLoader {
            path: path.to_string_lossy().to_string(),
        }),
        GraphSourceConfig::Dimes { path } => Box::new(DimesLoader {
            path: path.to_string_lossy().to_string(),
        }),
        GraphSourceConfig::EdgeList { path } => Box::new(EdgeListLoader {
            path: path.to_string_lossy().to_string(),
        }),
        GraphSourceConfig::Grid { side } => Box::new(SquareGridLoader {
            side: *side,
            randomize: true,
            rng: std::cell::RefCell::new(StdRng::seed_from_u64(seed)),
        }),
    }
}

/// Every node id in the store, restricted to this job's partition
/// (`id % job_count == job_number - 1`), mirroring the original tooling's
/// cluster-worker root partitioning.
fn candidate_roots(store: &NodeStore, job_number: u64, job_count: u64) -> Vec<u64> {
    store
        .node_ids()
        .map(|id| id.0)
        .filter(|id| id % job_count == (job_number - 1) % job_count)
        .collect()
}

fn run_one_root(
    config: &RunConfig,
    graph_name: &str,
    root_id: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let loader = build_loader(&config.source, config.seed);
    let mut store = loader.load(Some(root_id))?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    simulation::seed_clocks(&mut store, &mut rng);
    simulation::run_to_convergence(&mut store)?;

    let dist_oracle = oracle::compute(&store);
    let report = evaluator::evaluate(&store, &dist_oracle);

    tracing::info!(
        root_id,
        avg_stretch = report.avg_stretch,
        max_stretch = report.max_stretch,
        pairs_evaluated = report.pairs_evaluated,
        "root evaluated"
    );

    let out_path = config.output_dir.join(format!("{graph_name}-{root_id}"));
    write_histogram(&out_path, &report)?;

    Ok(())
}

fn write_histogram(
    base_path: &PathBuf,
    report: &evaluator::EvaluationReport,
) -> std::io::Result<()> {
    let hist_path = base_path.with_extension("hist");
    let file = File::create(&hist_path)?;
    let mut writer = BufWriter::new(file);
    for (oracle_hops, routed_hops, count) in &report.histogram {
        writeln!(writer, "{oracle_hops} {routed_hops} {count}")?;
    }

    let report_path = base_path.with_extension("json");
    let file = File::create(&report_path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)?;

    Ok(())
}

fn main() -> ExitCode {
    logging::init();

    let cli = Cli::parse();
    let config = match RunConfig::from_cli(cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let graph_name = config.source.graph_name();

    let roots: Vec<u64> = if let Some(root_id) = config.root_id {
        vec![root_id]
    } else {
        let loader = build_loader(&config.source, config.seed);
        let store = match loader.load(None) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("failed to load graph: {e}");
                return ExitCode::FAILURE;
            }
        };
        candidate_roots(&store, config.job_number, config.job_count)
    };

    if roots.is_empty() {
        eprintln!("no candidate roots in this job's partition");
        return ExitCode::FAILURE;
    }

    let mut failures = 0usize;
    for root_id in roots {
        match run_one_root(&config, &graph_name, root_id) {
            Ok(()) => {}
            Err(e) => {
                eprintln!("root {root_id} failed: {e}");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use localized_mcf::config::SolverConfig;
use localized_mcf::instances::{random_instance, two_commodity_example};
use localized_mcf::network::{FlowMatrix, Network};
use localized_mcf::parsers::sndlib_parser::{
    load_sndlib_network, resolve_dataset_path, resolve_sndlib_base_path,
};
use localized_mcf::solvers::localized::{Solution, localized_mcf, par_localized_mcf_batch};
use localized_mcf::telemetry::init_tracing;
use localized_mcf::utils::{edge_flow_records, max_congestion_ratio, total_flow};
use std::fs::File;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info};

use polars::prelude::*;

#[derive(Debug, Parser)]
#[command(name = "localized-mcf", about = "Localized multicommodity flow solver")]
struct Cli {
    /// JSON file with solver parameters; missing fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    max_iterations: Option<usize>,
    #[arg(long)]
    beta: Option<f64>,
    #[arg(long)]
    tolerance: Option<f64>,
    /// Spread per-edge work of each iteration over the rayon pool.
    #[arg(long)]
    parallel: bool,
    #[arg(long)]
    json_logs: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Solve the hand-built two-commodity network and print the final flow as JSON.
    Example,
    /// Solve seeded random G(n, p) instances in parallel and write one CSV row per run.
    Random {
        #[arg(long, default_value_t = 10)]
        nodes: usize,
        #[arg(long, default_value_t = 0.3)]
        edge_probability: f64,
        #[arg(long, default_value_t = 3)]
        commodities: usize,
        #[arg(long, default_value_t = 100)]
        runs: u64,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long, default_value = "benchmark_results.csv")]
        output: PathBuf,
    },
    /// Solve SNDlib datasets and write one CSV row per dataset.
    Sndlib {
        datasets: Vec<String>,
        #[arg(long)]
        base_path: Option<PathBuf>,
        #[arg(long)]
        normalize: bool,
        #[arg(long, default_value = "benchmark_results.csv")]
        output: PathBuf,
    },
}

#[derive(Debug)]
struct BenchmarkResult {
    dataset: String,
    seed: u64,
    termination: String,
    time_sec: f64,
    iterations: usize,
    max_congestion: f64,
    flow_sum: f64,
    iteration_history_json: String,
    error: String,
}

impl BenchmarkResult {
    fn failed(dataset: &str, seed: u64, time_sec: f64, error: String) -> Self {
        BenchmarkResult {
            dataset: dataset.to_string(),
            seed,
            termination: String::new(),
            time_sec,
            iterations: 0,
            max_congestion: f64::NAN,
            flow_sum: f64::NAN,
            iteration_history_json: "[]".to_string(),
            error,
        }
    }

    fn from_solution(
        dataset: &str,
        seed: u64,
        time_sec: f64,
        network: &Network,
        solution: &Solution,
    ) -> Self {
        let iteration_history_json =
            serde_json::to_string(&solution.history).unwrap_or_else(|e| {
                error!("Failed to serialize iteration history: {}", e);
                "[]".to_string()
            });
        BenchmarkResult {
            dataset: dataset.to_string(),
            seed,
            termination: solution.termination.as_str().to_string(),
            time_sec,
            iterations: solution.iterations,
            max_congestion: max_congestion_ratio(network, &solution.flow),
            flow_sum: total_flow(&solution.flow),
            iteration_history_json,
            error: String::new(),
        }
    }
}

fn solver_config(cli: &Cli) -> Result<SolverConfig> {
    let mut config = match &cli.config {
        Some(path) => SolverConfig::from_json_file(path)?,
        None => SolverConfig::default(),
    };
    if let Some(max_iterations) = cli.max_iterations {
        config.max_iterations = max_iterations;
    }
    if let Some(beta) = cli.beta {
        config.initial_beta = beta;
    }
    if let Some(tolerance) = cli.tolerance {
        config.tolerance = tolerance;
    }
    config.parallel |= cli.parallel;
    config.validate()?;
    Ok(config)
}

fn run_example(config: &SolverConfig) -> Result<()> {
    let (network, flow) = two_commodity_example()?;
    let solution = localized_mcf(&network, flow, config)?;
    info!(
        termination = solution.termination.as_str(),
        iterations = solution.iterations,
        max_congestion = max_congestion_ratio(&network, &solution.flow),
        "Two-commodity example finished"
    );
    let records = edge_flow_records(&network, &solution.flow);
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

fn seed_range(seed: u64, runs: u64) -> Result<Range<u64>> {
    let end = seed
        .checked_add(runs)
        .ok_or_else(|| anyhow!("Seed range {} + {} runs overflows u64", seed, runs))?;
    Ok(seed..end)
}

fn run_random(
    config: &SolverConfig,
    nodes: usize,
    edge_probability: f64,
    commodities: usize,
    runs: u64,
    seed: u64,
) -> Result<Vec<BenchmarkResult>> {
    let dataset = format!("gnp_{}_{}", nodes, edge_probability);
    let seeds: Vec<u64> = seed_range(seed, runs)?.collect();
    let instances: Vec<(Network, FlowMatrix)> = seeds
        .iter()
        .map(|&s| random_instance(nodes, edge_probability, commodities, s))
        .collect::<Result<_, _>>()?;

    info!(runs, nodes, edge_probability, commodities, "Solving random instances");
    let solutions = par_localized_mcf_batch(&instances, config);

    let results = seeds
        .iter()
        .zip(instances.iter())
        .zip(solutions)
        .map(|((&s, (network, _)), solved)| match solved {
            Ok(solution) => {
                let time_sec = solution.elapsed_time.as_secs_f64();
                BenchmarkResult::from_solution(&dataset, s, time_sec, network, &solution)
            }
            Err(e) => BenchmarkResult::failed(&dataset, s, 0.0, format!("Solver error: {}", e)),
        })
        .collect();
    Ok(results)
}

fn run_single_sndlib(
    config: &SolverConfig,
    dataset_name: &str,
    base_path: &Path,
    normalize: bool,
) -> BenchmarkResult {
    let start_time = Instant::now();

    let Some(file_path) = resolve_dataset_path(base_path, dataset_name) else {
        return BenchmarkResult::failed(
            dataset_name,
            0,
            start_time.elapsed().as_secs_f64(),
            format!("Dataset file not found for {}", dataset_name),
        );
    };

    let (network, flow) = match load_sndlib_network(file_path, normalize) {
        Ok(data) => data,
        Err(e) => {
            return BenchmarkResult::failed(
                dataset_name,
                0,
                start_time.elapsed().as_secs_f64(),
                format!("Failed to load network: {:#}", e),
            );
        }
    };

    let solver_call_time = Instant::now();
    let solved = localized_mcf(&network, flow, config);
    let exec_time_solver_only = solver_call_time.elapsed().as_secs_f64();

    match solved {
        Ok(solution) => BenchmarkResult::from_solution(
            dataset_name,
            0,
            exec_time_solver_only,
            &network,
            &solution,
        ),
        Err(e) => BenchmarkResult::failed(
            dataset_name,
            0,
            exec_time_solver_only,
            format!("Solver error: {}", e),
        ),
    }
}

fn write_results_csv(all_results: &[BenchmarkResult], output: &Path) -> Result<()> {
    let datasets_col: Vec<String> = all_results.iter().map(|r| r.dataset.clone()).collect();
    let seeds_col: Vec<u64> = all_results.iter().map(|r| r.seed).collect();
    let terminations_col: Vec<String> =
        all_results.iter().map(|r| r.termination.clone()).collect();
    let times_col: Vec<f64> = all_results.iter().map(|r| r.time_sec).collect();
    let iterations_col: Vec<u64> = all_results.iter().map(|r| r.iterations as u64).collect();
    let max_congestions_col: Vec<f64> = all_results.iter().map(|r| r.max_congestion).collect();
    let flow_sums_col: Vec<f64> = all_results.iter().map(|r| r.flow_sum).collect();
    let iteration_history_json_col: Vec<String> = all_results
        .iter()
        .map(|r| r.iteration_history_json.clone())
        .collect();
    let errors_col: Vec<String> = all_results.iter().map(|r| r.error.clone()).collect();

    let mut df_results = df!(
        "dataset" => datasets_col,
        "seed" => seeds_col,
        "termination" => terminations_col,
        "time_sec" => times_col,
        "iterations" => iterations_col,
        "max_congestion" => max_congestions_col,
        "flow_sum" => flow_sums_col,
        "iteration_history_json" => iteration_history_json_col,
        "error" => errors_col,
    )?;

    let mut output_file = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    CsvWriter::new(&mut output_file)
        .include_header(true)
        .with_separator(b',')
        .finish(&mut df_results)?;

    info!(rows = all_results.len(), path = %output.display(), "Results written");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);
    let config = solver_config(&cli)?;

    match &cli.command {
        Command::Example => run_example(&config),
        Command::Random {
            nodes,
            edge_probability,
            commodities,
            runs,
            seed,
            output,
        } => {
            let results = run_random(
                &config,
                *nodes,
                *edge_probability,
                *commodities,
                *runs,
                *seed,
            )?;
            write_results_csv(&results, output)
        }
        Command::Sndlib {
            datasets,
            base_path,
            normalize,
            output,
        } => {
            let base_path = base_path.clone().unwrap_or_else(resolve_sndlib_base_path);
            let mut all_results = Vec::new();
            for dataset_name in datasets {
                info!(dataset = %dataset_name, "Running SNDlib dataset");
                let result = run_single_sndlib(&config, dataset_name, &base_path, *normalize);
                info!(
                    time_sec = result.time_sec,
                    iterations = result.iterations,
                    termination = %result.termination,
                    max_congestion = result.max_congestion,
                    flow_sum = result.flow_sum,
                    error = %result.error,
                    "Finished dataset"
                );
                all_results.push(result);
            }
            if all_results.is_empty() {
                info!("No results to write");
                return Ok(());
            }
            write_results_csv(&all_results, output)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_range() {
        assert_eq!(seed_range(5, 3).unwrap(), 5..8);
        assert_eq!(seed_range(u64::MAX, 0).unwrap(), u64::MAX..u64::MAX);
        assert!(seed_range(u64::MAX - 1, 2).is_err());
    }
}

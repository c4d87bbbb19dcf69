//! The command line interface.
use crate::config::SystemConfig;
use crate::general::input_data::{DEFAULT_INPUT_FILE, load_input_data};
use crate::log;
use crate::system::optimise::{MetaResults, SolverKind, solve};
use crate::system::plot::{DEFAULT_PLOT_FILE, flow_colors, plot_electricity_flows};
use crate::system::report::{
    DEFAULT_GRAPH_FILE, print_meta_results, print_metrics, write_graph, write_results,
};
use crate::system::results::{Metrics, Results, extract_metrics, node_view};
use crate::system::topology::{ELECTRICITY_BUS, build_energy_system};
use ::log::info;
use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Least-cost dispatch of a diesel genset with optional PV and battery storage.
///
/// Without a subcommand the optimisation is run.
#[derive(Debug, Parser)]
#[command(version, about, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    #[command(flatten)]
    run: RunOpts,
}

/// Options for the run command
#[derive(Debug, Clone, PartialEq, Args)]
pub struct RunOpts {
    /// CSV file with hourly `pv` and `demand_el` columns
    #[arg(short, long, default_value = DEFAULT_INPUT_FILE)]
    pub input: PathBuf,
    /// TOML file with the system configuration. The built-in system is used if omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Solver backend, overriding the configuration
    #[arg(short, long, value_enum)]
    pub solver: Option<SolverKind>,
    /// Where to save the plot of the electricity bus flows
    #[arg(long, default_value = DEFAULT_PLOT_FILE)]
    pub plot: PathBuf,
    /// Skip plotting
    #[arg(long)]
    pub no_plot: bool,
    /// Where to save the Graphviz rendering of the energy system
    #[arg(long, default_value = DEFAULT_GRAPH_FILE)]
    pub graph: PathBuf,
    /// Directory for `sequences.csv` and `scalars.csv`
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the optimisation.
    Run {
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Print the default configuration as TOML.
    DefaultConfig,
}

/// Parse CLI arguments and execute the selected command
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Run { opts }) => handle_run_command(&opts),
        Some(Commands::DefaultConfig) => handle_default_config_command(),
        None => handle_run_command(&cli.run),
    }
}

fn handle_default_config_command() -> Result<()> {
    let toml = SystemConfig::default()
        .to_toml()
        .context("Failed to serialise the default configuration.")?;
    print!("{}", toml);
    Ok(())
}

/// Handle the `run` command: optimise, print the results, then plot.
pub fn handle_run_command(opts: &RunOpts) -> Result<()> {
    let mut config =
        SystemConfig::load(opts.config.as_deref()).context("Failed to load configuration.")?;
    if let Some(solver) = opts.solver {
        config.solver = solver;
    }

    log::init(config.log_level.as_deref()).context("Failed to initialise logging.")?;

    let (results, meta, metrics) = run_model(opts, &config)?;
    print_meta_results(&meta);
    print_metrics(&metrics);

    if !opts.no_plot {
        plot_electricity_flows(
            &node_view(&results, ELECTRICITY_BUS),
            &config.time_index,
            &flow_colors(),
            &opts.plot,
        )
        .map_err(|err| anyhow!("Failed to plot the electricity flows: {}", err))?;
    }

    Ok(())
}

/// Loads the input, builds and solves the energy system and writes the optional outputs
pub fn run_model(
    opts: &RunOpts,
    config: &SystemConfig,
) -> Result<(Results, MetaResults, Metrics)> {
    let data = load_input_data(&opts.input).context("Failed to load input data.")?;
    let system =
        build_energy_system(config, &data).context("Failed to build the energy system.")?;
    write_graph(&system, &opts.graph)?;

    info!("Optimising with {}", config.solver);
    let (results, meta) = solve(&system, config.solver).context("Optimisation failed.")?;
    let metrics = extract_metrics(&results, config).context("Failed to extract metrics.")?;

    if let Some(output_dir) = &opts.output_dir {
        write_results(&results, &metrics, system.time_index(), output_dir)
            .context("Failed to write results.")?;
    }

    Ok((results, meta, metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::results::{RES_SHARE, STORAGE_INVEST};
    use crate::system::topology::STORAGE;
    use std::fs;
    use std::path::Path;

    fn write_input(dir: &Path, steps: usize) -> PathBuf {
        let path = dir.join("input.csv");
        let mut contents = String::from("timestamp,pv,demand_el\n");
        for t in 0..steps {
            contents.push_str(&format!("{},0.0,0.1\n", t));
        }
        fs::write(&path, contents).unwrap();
        path
    }

    fn opts(dir: &Path) -> RunOpts {
        RunOpts {
            input: write_input(dir, 24),
            config: None,
            solver: None,
            plot: dir.join(DEFAULT_PLOT_FILE),
            no_plot: true,
            graph: dir.join(DEFAULT_GRAPH_FILE),
            output_dir: Some(dir.join("results")),
        }
    }

    #[test]
    fn test_no_arguments_runs_with_defaults() {
        let cli = Cli::try_parse_from(["dispatch-opt"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.run.input, PathBuf::from(DEFAULT_INPUT_FILE));
        assert_eq!(cli.run.plot, PathBuf::from(DEFAULT_PLOT_FILE));
        assert_eq!(cli.run.solver, None);
        assert!(!cli.run.no_plot);
    }

    #[test]
    fn test_run_subcommand_options() {
        let cli = Cli::try_parse_from([
            "dispatch-opt",
            "run",
            "--input",
            "data.csv",
            "--solver",
            "highs",
            "--no-plot",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Run { opts }) => {
                assert_eq!(opts.input, PathBuf::from("data.csv"));
                assert_eq!(opts.solver, Some(SolverKind::Highs));
                assert!(opts.no_plot);
            }
            other => panic!("expected run, got {:?}", other),
        }
    }

    #[test]
    fn test_default_config_subcommand() {
        let cli = Cli::try_parse_from(["dispatch-opt", "default-config"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::DefaultConfig)));
    }

    #[test]
    fn test_unknown_solver_is_rejected() {
        assert!(Cli::try_parse_from(["dispatch-opt", "--solver", "gurobi"]).is_err());
    }

    #[test]
    fn test_run_model_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let opts = opts(dir.path());
        let mut config = SystemConfig::default();
        config.time_index.periods = 24;

        let (results, meta, metrics) = run_model(&opts, &config).unwrap();

        assert!(results.involves(STORAGE));
        assert!(meta.objective > 0.0);
        assert!(metrics.contains(STORAGE_INVEST));
        assert!(metrics.get(RES_SHARE).unwrap().abs() < 1e-5);
        assert!(opts.graph.exists());
        let output_dir = opts.output_dir.unwrap();
        assert!(output_dir.join("sequences.csv").exists());
        assert!(output_dir.join("scalars.csv").exists());
        assert!(!opts.plot.exists());
    }

    #[test]
    fn test_run_model_reports_length_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let opts = opts(dir.path());
        let config = SystemConfig::default();

        let err = run_model(&opts, &config).unwrap_err();
        assert!(format!("{:?}", err).contains("Failed to build the energy system."));
    }
}

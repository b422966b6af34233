#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that drives shape transformations and experiments.

mod output;

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use matter_core::{Algorithm, ControlMode, MovementMode, ShapeKind, Topology};
use matter_system_analytics::{compare_algorithms, deadlock_heatmap};
use matter_system_orchestrator::{SimulationConfig, SimulationContext};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "matter=info";

#[derive(Debug, Parser)]
#[command(name = "matter")]
#[command(about = "Moves grid elements into shapes and reports how it went")]
struct Cli {
    /// TOML file with simulation settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides the configured random seed
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Overrides the configured grid width
    #[arg(long, global = true)]
    width: Option<u32>,

    /// Overrides the configured grid height
    #[arg(long, global = true)]
    height: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one transformation.
    Transform {
        /// Shape to form: square, circle, triangle, heart
        #[arg(long, default_value = "square")]
        shape: ShapeKind,
        /// Number of elements
        #[arg(long, default_value_t = 16)]
        elements: usize,
        /// Planner: astar, bfs, greedy, minimax, expectimax
        #[arg(long, default_value = "astar")]
        algorithm: Algorithm,
        /// Adjacency: von_neumann, moore
        #[arg(long, default_value = "von_neumann")]
        topology: Topology,
        /// Commit mode: sequential, parallel
        #[arg(long, default_value = "parallel")]
        movement: MovementMode,
        /// Control mode: centralized, independent
        #[arg(long, default_value = "independent")]
        control: ControlMode,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the same formation with every algorithm.
    Compare {
        /// Shape to form
        #[arg(long, default_value = "square")]
        shape: ShapeKind,
        /// Number of elements
        #[arg(long, default_value_t = 16)]
        elements: usize,
        /// Adjacency: von_neumann, moore
        #[arg(long, default_value = "von_neumann")]
        topology: Topology,
        /// Control mode: centralized, independent
        #[arg(long, default_value = "independent")]
        control: ControlMode,
        /// Print the results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Count where elements get stranded over several seeded runs.
    Heatmap {
        /// Shape to form
        #[arg(long, default_value = "heart")]
        shape: ShapeKind,
        /// Number of elements
        #[arg(long, default_value_t = 16)]
        elements: usize,
        /// Adjacency: von_neumann, moore
        #[arg(long, default_value = "von_neumann")]
        topology: Topology,
        /// Number of runs, seeded consecutively from the configured seed
        #[arg(long, default_value_t = 10)]
        runs: u32,
        /// Print the heatmap as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the accepted shapes.
    Shapes,

    /// List the accepted algorithms.
    Algorithms,
}

/// Entry point for the matter command-line interface.
fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli)?;
    run(cli.command, config)
}

/// Reads the optional TOML file and applies command-line overrides.
fn load_config(cli: &Cli) -> Result<SimulationConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            toml::from_str(&text)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => SimulationConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(width) = cli.width {
        config.width = width;
    }
    if let Some(height) = cli.height {
        config.height = height;
    }
    Ok(config)
}

fn run(command: Command, config: SimulationConfig) -> Result<()> {
    match command {
        Command::Transform {
            shape,
            elements,
            algorithm,
            topology,
            movement,
            control,
            json,
        } => {
            let mut context =
                SimulationContext::new(config).context("invalid grid configuration")?;
            context
                .initialize(elements)
                .with_context(|| format!("cannot place {elements} elements"))?;
            let targets = context.set_targets(shape, elements);
            info!(event = "cli_transform", shape = shape.name(), targets = targets.len());

            let report = context.transform(algorithm, topology, movement, control);
            if json {
                let encoded =
                    serde_json::to_string_pretty(&report).context("failed to encode report")?;
                println!("{encoded}");
            } else {
                print!("{}", output::transform_summary(&report, &context.state()));
            }
        }

        Command::Compare {
            shape,
            elements,
            topology,
            control,
            json,
        } => {
            let results = compare_algorithms(&config, shape, elements, topology, control)
                .context("comparison failed")?;
            if json {
                let encoded =
                    serde_json::to_string_pretty(&results).context("failed to encode results")?;
                println!("{encoded}");
            } else {
                print!("{}", output::comparison_table(&results));
            }
        }

        Command::Heatmap {
            shape,
            elements,
            topology,
            runs,
            json,
        } => {
            let heatmap = deadlock_heatmap(&config, shape, elements, topology, runs)
                .context("heatmap failed")?;
            if json {
                let encoded =
                    serde_json::to_string_pretty(&heatmap).context("failed to encode heatmap")?;
                println!("{encoded}");
            } else {
                print!("{}", output::heatmap_grid(&heatmap));
            }
        }

        Command::Shapes => {
            for shape in ShapeKind::ALL {
                println!("{}", shape.name());
            }
        }

        Command::Algorithms => {
            for algorithm in Algorithm::ALL {
                let kind = if algorithm.is_adversarial() {
                    "adversarial"
                } else {
                    "baseline"
                };
                println!("{:<12}{kind}", algorithm.name());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_defaults_are_filled_in() {
        let cli = Cli::try_parse_from(["matter", "transform"]).expect("parse");
        match cli.command {
            Command::Transform {
                shape,
                elements,
                algorithm,
                topology,
                movement,
                control,
                json,
            } => {
                assert_eq!(shape, ShapeKind::Square);
                assert_eq!(elements, 16);
                assert_eq!(algorithm, Algorithm::AStar);
                assert_eq!(topology, Topology::VonNeumann);
                assert_eq!(movement, MovementMode::Parallel);
                assert_eq!(control, ControlMode::Independent);
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_overrides_apply_after_the_subcommand() {
        let cli = Cli::try_parse_from([
            "matter",
            "heatmap",
            "--runs",
            "3",
            "--seed",
            "99",
            "--width",
            "20",
        ])
        .expect("parse");
        let config = load_config(&cli).expect("config");
        assert_eq!(config.seed, 99);
        assert_eq!(config.width, 20);
        assert_eq!(config.height, SimulationConfig::default().height);
        assert!(matches!(cli.command, Command::Heatmap { runs: 3, .. }));
    }

    #[test]
    fn unknown_values_are_rejected() {
        assert!(Cli::try_parse_from(["matter", "transform", "--shape", "hexagon"]).is_err());
        assert!(Cli::try_parse_from(["matter", "compare", "--topology", "hex"]).is_err());
        assert!(Cli::try_parse_from(["matter", "transform", "--algorithm", "moore"]).is_err());
    }

    #[test]
    fn config_file_values_are_overridden_by_flags() {
        let path = std::env::temp_dir().join(format!("matter-cli-{}.toml", std::process::id()));
        fs::write(&path, "width = 30\nseed = 4\n[independent]\nmax_ticks = 50\n")
            .expect("write config");

        let path_arg = path.to_string_lossy().into_owned();
        let cli = Cli::try_parse_from(["matter", "--config", &path_arg, "--seed", "8", "shapes"])
            .expect("parse");
        let config = load_config(&cli).expect("config");
        fs::remove_file(&path).expect("remove config");

        assert_eq!(config.width, 30);
        assert_eq!(config.seed, 8);
        assert_eq!(config.independent.max_ticks, 50);
    }
}

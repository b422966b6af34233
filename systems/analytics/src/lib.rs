#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Batch experiments built on top of the orchestrator.
//!
//! Every experiment runs fresh [`SimulationContext`]s so results never depend
//! on earlier runs, and derives its seeds from the supplied configuration.

mod heatmap;

use std::time::Duration;

use matter_core::{Algorithm, ControlMode, MovementMode, ShapeKind, Topology};
use matter_system_orchestrator::{SimulationConfig, SimulationContext, SimulationError};
use serde::{Deserialize, Serialize};
use tracing::info;

pub use heatmap::{deadlock_heatmap, DeadlockHeatmap};

/// Outcome of one algorithm in a comparison run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmResult {
    /// Algorithm that drove the run.
    pub algorithm: Algorithm,
    /// Fraction of targeted elements that ended on their target.
    pub success_rate: f64,
    /// Whether the run met its control mode's success criterion.
    pub success: bool,
    /// Number of committed moves.
    pub moves: usize,
    /// Search nodes expanded across the run.
    pub nodes_explored: u64,
    /// Recovery interventions applied.
    pub interventions: u32,
    /// Wall-clock duration of the transformation.
    pub elapsed: Duration,
}

/// Runs the same formation once per algorithm with parallel movement.
///
/// Each algorithm starts from an identically seeded context.
pub fn compare_algorithms(
    config: &SimulationConfig,
    shape: ShapeKind,
    count: usize,
    topology: Topology,
    control: ControlMode,
) -> Result<Vec<AlgorithmResult>, SimulationError> {
    Algorithm::ALL
        .iter()
        .map(|&algorithm| {
            let mut context = SimulationContext::new(config.clone())?;
            context.initialize(count)?;
            let _ = context.set_targets(shape, count);
            let report = context.transform(algorithm, topology, MovementMode::Parallel, control);
            info!(
                event = "comparison_run",
                algorithm = algorithm.name(),
                success_rate = report.success_rate,
                moves = report.moves.len()
            );
            Ok(AlgorithmResult {
                algorithm,
                success_rate: report.success_rate,
                success: report.success,
                moves: report.moves.len(),
                nodes_explored: report.nodes_explored,
                interventions: report.interventions,
                elapsed: report.elapsed,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_covers_every_algorithm_in_order() {
        let config = SimulationConfig {
            width: 8,
            height: 8,
            ..SimulationConfig::default()
        };
        let results = compare_algorithms(
            &config,
            ShapeKind::Square,
            4,
            Topology::VonNeumann,
            ControlMode::Centralized,
        )
        .expect("comparison");

        let algorithms: Vec<Algorithm> = results.iter().map(|result| result.algorithm).collect();
        assert_eq!(algorithms, Algorithm::ALL.to_vec());
        assert!(results.iter().all(|result| result.moves > 0));
    }

    #[test]
    fn comparison_surfaces_setup_errors() {
        let config = SimulationConfig {
            width: 4,
            height: 4,
            ..SimulationConfig::default()
        };
        let error = compare_algorithms(
            &config,
            ShapeKind::Circle,
            5,
            Topology::Moore,
            ControlMode::Independent,
        )
        .expect_err("too many elements");
        assert_eq!(
            error,
            SimulationError::TooManyElements {
                requested: 5,
                capacity: 4
            }
        );
    }
}

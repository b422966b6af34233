//! Outcome table for an interfering agent's reply.
//!
//! Both searches read the same table: Expectimax weighs the outcomes by
//! probability while Minimax only enumerates their cells.

use matter_core::{CellCoord, GridView, Topology};

/// Branches below this probability are left out of expected values.
pub const MIN_BRANCH_PROBABILITY: f64 = 0.01;

const MOVE_WEIGHT: f64 = 1.0;
const STAY_WEIGHT: f64 = 1.5;
const STAY_WEIGHT_IN_ESCAPE_ZONE: f64 = 3.0;

/// One possible reply of an interfering agent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChanceOutcome {
    /// Cell the agent ends up in; equal to its current cell when it stays.
    pub cell: CellCoord,
    /// Normalised probability of this reply.
    pub probability: f64,
}

/// Replies available to an agent at `current`, staying in place first.
///
/// Staying is weighted 1.5 (3.0 inside the escape zone) and each legal step
/// 1.0 before normalisation.
#[must_use]
pub fn chance_outcomes<V: GridView + ?Sized>(
    view: &V,
    current: CellCoord,
    topology: Topology,
    in_escape_zone: bool,
) -> Vec<ChanceOutcome> {
    let stay = if in_escape_zone {
        STAY_WEIGHT_IN_ESCAPE_ZONE
    } else {
        STAY_WEIGHT
    };
    let mut weights = vec![(current, stay)];
    weights.extend(
        view.free_neighbors(current, topology)
            .into_iter()
            .map(|cell| (cell, MOVE_WEIGHT)),
    );
    normalise(&weights)
}

/// Converts raw weights into probabilities that sum to one.
///
/// Non-positive totals yield an empty table.
#[must_use]
pub fn normalise(weights: &[(CellCoord, f64)]) -> Vec<ChanceOutcome> {
    let total: f64 = weights.iter().map(|&(_, weight)| weight.max(0.0)).sum();
    if total <= 0.0 {
        return Vec::new();
    }
    weights
        .iter()
        .map(|&(cell, weight)| ChanceOutcome {
            cell,
            probability: weight.max(0.0) / total,
        })
        .collect()
}

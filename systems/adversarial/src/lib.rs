#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Interference-aware first-move search.
//!
//! An agent picks its next step by looking a few plies ahead while a handful
//! of nearby unsettled agents reply, either adversarially (Minimax with
//! alpha-beta pruning) or at random (Expectimax). Only the first move comes
//! from the game tree; the rest of the path is completed with A*.
//!
//! Agents near the bottom edge whose goal lies above them are "escaping":
//! they take any available upward step immediately and, when none exists,
//! search with a bias toward freeing an upward route.

mod chance;
mod evaluate;
mod expectimax;
mod interference;
mod minimax;
mod state;
mod tree;

use matter_core::{Algorithm, CellCoord, Direction, ElementId, GridView, Topology};
use matter_system_pathfinding::{astar, PathOutcome, WithoutOccupant};
use matter_world::GridWorld;
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use tracing::trace;

pub use chance::{chance_outcomes, normalise, ChanceOutcome, MIN_BRANCH_PROBABILITY};
pub use interference::{interference_score, select_adversaries};

use evaluate::Evaluator;
use state::SearchState;
use tree::Tree;

/// Value of a state in which the mover stands on its goal.
pub const GOAL_VALUE: f64 = 1000.0;

/// Penalty applied when the mover has no legal step.
pub const STUCK_PENALTY: f64 = 20.0;

/// Tuning parameters for the adversarial searches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Search depth before population-based reduction.
    pub base_depth: u32,
    /// Number of bottom rows that form the escape zone.
    pub escape_rows: u32,
    /// Interfering agents tracked for an ordinary mover.
    pub max_adversaries: usize,
    /// Interfering agents tracked for an escaping mover.
    pub max_escape_adversaries: usize,
    /// Padding around the start/goal bounding box when looking for adversaries.
    pub box_padding: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_depth: 2,
            escape_rows: 3,
            max_adversaries: 2,
            max_escape_adversaries: 3,
            box_padding: 2,
        }
    }
}

impl SearchConfig {
    /// Depth used for a population of `population` elements.
    #[must_use]
    pub fn depth_for(&self, mode: SearchMode, population: usize) -> u32 {
        match mode {
            SearchMode::Minimax if population > 10 => self.base_depth.saturating_sub(1).max(1),
            SearchMode::Minimax => self.base_depth.max(1),
            SearchMode::Expectimax if population > 15 => 1,
            SearchMode::Expectimax if population > 10 => 2,
            SearchMode::Expectimax => self.base_depth.max(1),
        }
    }
}

/// How interfering agents are modelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SearchMode {
    /// Interfering agents reply with their worst move for the mover.
    Minimax,
    /// Interfering agents reply at random with stay-biased weights.
    Expectimax,
}

impl SearchMode {
    /// Search mode backing an adversarial algorithm.
    #[must_use]
    pub const fn from_algorithm(algorithm: Algorithm) -> Option<Self> {
        match algorithm {
            Algorithm::Minimax => Some(Self::Minimax),
            Algorithm::Expectimax => Some(Self::Expectimax),
            Algorithm::AStar | Algorithm::Bfs | Algorithm::Greedy => None,
        }
    }

    const fn upward_bonus(self) -> f64 {
        match self {
            Self::Minimax => 50.0,
            Self::Expectimax => 40.0,
        }
    }

    const fn root_bonus(self) -> f64 {
        match self {
            Self::Minimax => 50.0,
            Self::Expectimax => 100.0,
        }
    }
}

/// Bottom rows of the grid where agents spawn and tend to stall.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EscapeZone {
    first_row: u32,
}

impl EscapeZone {
    /// Zone covering the bottom `escape_rows` rows of a grid with `rows` rows.
    #[must_use]
    pub const fn for_grid(rows: u32, escape_rows: u32) -> Self {
        Self {
            first_row: rows.saturating_sub(escape_rows),
        }
    }

    /// Reports whether the cell lies within the zone.
    #[must_use]
    pub const fn contains(&self, cell: CellCoord) -> bool {
        cell.row() >= self.first_row
    }

    /// Reports whether an agent at `start` heading to `goal` should escape upward.
    #[must_use]
    pub const fn applies(&self, start: CellCoord, goal: CellCoord) -> bool {
        self.contains(start) && goal.row() < start.row()
    }
}

/// Best first move found by a root search.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RootDecision {
    /// Cell the mover should step into.
    pub best_move: CellCoord,
    /// Backed-up value of that move including any root bonus.
    pub best_value: f64,
    /// Tree nodes visited while deciding.
    pub nodes: u64,
}

/// Adversarial planner bound to one world snapshot.
#[derive(Clone, Copy, Debug)]
pub struct AdversarialSearch<'a> {
    world: &'a GridWorld,
    mode: SearchMode,
    topology: Topology,
    config: &'a SearchConfig,
    pruning: bool,
}

impl<'a> AdversarialSearch<'a> {
    /// Creates a planner reading from `world`.
    #[must_use]
    pub fn new(
        world: &'a GridWorld,
        mode: SearchMode,
        topology: Topology,
        config: &'a SearchConfig,
    ) -> Self {
        Self {
            world,
            mode,
            topology,
            config,
            pruning: true,
        }
    }

    /// Disables alpha-beta cut-offs; values are unchanged, only slower.
    #[must_use]
    pub fn without_pruning(mut self) -> Self {
        self.pruning = false;
        self
    }

    /// Plans a path for `element` toward `goal`.
    ///
    /// Escaping agents receive a two-cell path and re-plan on the next tick.
    /// A mover without legal steps receives its own cell as the whole path.
    pub fn plan<R: Rng + ?Sized>(
        &self,
        element: ElementId,
        goal: CellCoord,
        rng: &mut R,
    ) -> PathOutcome {
        let Some(start) = self.world.element(element).map(|element| element.cell()) else {
            return PathOutcome::default();
        };
        if !self.world.is_passable(start) || !self.world.is_passable(goal) {
            return PathOutcome::default();
        }
        if start == goal {
            return PathOutcome {
                path: Some(vec![start]),
                nodes_expanded: 1,
            };
        }

        let escaping = self.zone().applies(start, goal);
        let moves = self.world.free_neighbors(start, self.topology);
        if escaping {
            if let Some(step) = self.escape_step(start, goal, &moves, rng) {
                trace!(event = "escape_step", element = element.get(), row = start.row());
                return PathOutcome {
                    path: Some(vec![start, step]),
                    nodes_expanded: 1,
                };
            }
        }
        if moves.is_empty() {
            return PathOutcome {
                path: Some(vec![start]),
                nodes_expanded: 1,
            };
        }

        let adversaries =
            select_adversaries(self.world, element, start, goal, escaping, self.config);
        let depth = self
            .config
            .depth_for(self.mode, self.world.element_count());
        let Some(decision) = self.decide(element, goal, &adversaries, depth) else {
            return PathOutcome::default();
        };
        trace!(
            event = "first_move",
            element = element.get(),
            adversaries = adversaries.len(),
            depth,
            value = decision.best_value,
            nodes = decision.nodes
        );

        let mut path = vec![start, decision.best_move];
        let mut nodes_expanded = decision.nodes;
        if escaping {
            return PathOutcome {
                path: Some(path),
                nodes_expanded,
            };
        }

        let view = WithoutOccupant::new(self.world, element);
        let tail = astar(&view, decision.best_move, goal, self.topology);
        nodes_expanded += tail.nodes_expanded;
        if let Some(tail) = tail.path.filter(|tail| tail.len() > 1) {
            path.extend_from_slice(&tail[1..]);
        }
        PathOutcome {
            path: Some(path),
            nodes_expanded,
        }
    }

    /// Runs the game-tree search for `element` against explicit adversaries.
    ///
    /// Returns `None` when the element is unknown or has no legal step.
    #[must_use]
    pub fn decide(
        &self,
        element: ElementId,
        goal: CellCoord,
        adversaries: &[ElementId],
        depth: u32,
    ) -> Option<RootDecision> {
        let start = self.world.element(element)?.cell();
        let zone = self.zone();
        let root = SearchState::new(self.world, element, start, adversaries);
        let mut tree = Tree {
            evaluator: Evaluator {
                goal,
                mode: self.mode,
                zone,
                escaping: zone.applies(start, goal),
            },
            topology: self.topology,
            depth_limit: depth.max(1),
            pruning: self.pruning,
            nodes: 0,
        };
        tree.decide(&root)
    }

    fn zone(&self) -> EscapeZone {
        let (_, rows) = self.world.dimensions();
        EscapeZone::for_grid(rows, self.config.escape_rows)
    }

    fn escape_step<R: Rng + ?Sized>(
        &self,
        start: CellCoord,
        goal: CellCoord,
        moves: &[CellCoord],
        rng: &mut R,
    ) -> Option<CellCoord> {
        let upward: Vec<CellCoord> = moves
            .iter()
            .copied()
            .filter(|next| next.row() < start.row())
            .collect();
        if upward.is_empty() {
            return None;
        }

        let drift = i64::from(goal.column()) - i64::from(start.column());
        if self.topology == Topology::Moore && upward.len() > 1 && drift.abs() > 1 {
            let toward: Vec<CellCoord> = upward
                .iter()
                .copied()
                .filter(|next| {
                    (drift > 0 && next.column() > start.column())
                        || (drift < 0 && next.column() < start.column())
                })
                .collect();
            if let Some(step) = toward.choose(rng) {
                return Some(*step);
            }
        }

        let straight_up = start.step(Direction::North);
        upward
            .iter()
            .copied()
            .find(|next| Some(*next) == straight_up)
            .or_else(|| upward.first().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_shrinks_with_population() {
        let config = SearchConfig::default();
        assert_eq!(config.depth_for(SearchMode::Minimax, 4), 2);
        assert_eq!(config.depth_for(SearchMode::Minimax, 11), 1);
        assert_eq!(config.depth_for(SearchMode::Expectimax, 11), 2);
        assert_eq!(config.depth_for(SearchMode::Expectimax, 16), 1);

        let deep = SearchConfig {
            base_depth: 4,
            ..SearchConfig::default()
        };
        assert_eq!(deep.depth_for(SearchMode::Minimax, 12), 3);
        assert_eq!(deep.depth_for(SearchMode::Expectimax, 12), 2);
        assert_eq!(deep.depth_for(SearchMode::Expectimax, 3), 4);
    }

    #[test]
    fn escape_zone_requires_goal_above() {
        let zone = EscapeZone::for_grid(12, 3);
        assert!(zone.contains(CellCoord::new(4, 9)));
        assert!(!zone.contains(CellCoord::new(4, 8)));
        assert!(zone.applies(CellCoord::new(4, 10), CellCoord::new(4, 3)));
        assert!(!zone.applies(CellCoord::new(4, 9), CellCoord::new(4, 10)));
        assert!(!zone.applies(CellCoord::new(4, 5), CellCoord::new(4, 1)));
    }

    #[test]
    fn only_adversarial_algorithms_map_to_a_mode() {
        assert_eq!(
            SearchMode::from_algorithm(Algorithm::Minimax),
            Some(SearchMode::Minimax)
        );
        assert_eq!(SearchMode::from_algorithm(Algorithm::Bfs), None);
    }
}

//! Shared search context and the root move comparison.

use matter_core::{CellCoord, GridView, Topology};

use crate::{
    evaluate::Evaluator, state::SearchState, RootDecision, SearchMode, GOAL_VALUE,
};

/// Per-search context threaded through the recursion.
#[derive(Debug)]
pub(crate) struct Tree {
    pub(crate) evaluator: Evaluator,
    pub(crate) topology: Topology,
    pub(crate) depth_limit: u32,
    pub(crate) pruning: bool,
    pub(crate) nodes: u64,
}

impl Tree {
    /// Compares every legal first move and keeps the best one.
    ///
    /// Ties keep the earlier move in topology order.
    pub(crate) fn decide(&mut self, root: &SearchState<'_>) -> Option<RootDecision> {
        let start = root.mover_cell();
        let mode = self.evaluator.mode;
        let pending: Vec<usize> = (0..root.adversary_count()).collect();
        let mut best: Option<(CellCoord, f64)> = None;

        for cell in root.free_neighbors(start, self.topology) {
            let bonus = if self.evaluator.escaping && cell.row() < start.row() {
                mode.root_bonus()
            } else {
                0.0
            };
            let child = root.with_mover_at(cell);
            let value = match mode {
                SearchMode::Minimax => {
                    let alpha = match best {
                        Some((_, value)) if self.pruning => value - bonus,
                        _ => f64::NEG_INFINITY,
                    };
                    self.minimax_min(&child, &pending, 1, alpha, f64::INFINITY)
                }
                SearchMode::Expectimax if pending.is_empty() => self.expectimax_max(&child, 1),
                SearchMode::Expectimax => self.expectimax_chance(&child, &pending, 1),
            } + bonus;

            if best.map_or(true, |(_, best_value)| value > best_value) {
                best = Some((cell, value));
            }
        }

        best.map(|(best_move, best_value)| RootDecision {
            best_move,
            best_value,
            nodes: self.nodes,
        })
    }

    pub(crate) fn terminal(&self, state: &SearchState<'_>, depth: u32) -> Option<f64> {
        if state.mover_cell() == self.evaluator.goal {
            return Some(GOAL_VALUE);
        }
        (depth >= self.depth_limit).then(|| self.evaluator.evaluate(state))
    }

    /// Legal mover steps; an escaping mover only looks upward when it can.
    pub(crate) fn mover_moves(&self, state: &SearchState<'_>) -> Vec<CellCoord> {
        let cell = state.mover_cell();
        let moves = state.free_neighbors(cell, self.topology);
        if self.evaluator.escaping {
            let upward: Vec<_> = moves
                .iter()
                .copied()
                .filter(|next| next.row() < cell.row())
                .collect();
            if !upward.is_empty() {
                return upward;
            }
        }
        moves
    }
}

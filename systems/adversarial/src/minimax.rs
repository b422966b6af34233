//! Minimax recursion with optional alpha-beta pruning.

use crate::{chance::chance_outcomes, state::SearchState, tree::Tree, STUCK_PENALTY};

impl Tree {
    /// Mover to play; `pending` indexes the adversaries still to reply.
    pub(crate) fn minimax_max(
        &mut self,
        state: &SearchState<'_>,
        pending: &[usize],
        depth: u32,
        mut alpha: f64,
        beta: f64,
    ) -> f64 {
        self.nodes += 1;
        if let Some(value) = self.terminal(state, depth) {
            return value;
        }

        let moves = self.mover_moves(state);
        if moves.is_empty() {
            return self.evaluator.evaluate(state) - STUCK_PENALTY;
        }

        let mut value = f64::NEG_INFINITY;
        for cell in moves {
            let child = state.with_mover_at(cell);
            value = value.max(self.minimax_min(&child, pending, depth + 1, alpha, beta));
            alpha = alpha.max(value);
            if self.pruning && beta <= alpha {
                break;
            }
        }
        value
    }

    /// First pending adversary to reply, minimising the mover's value.
    pub(crate) fn minimax_min(
        &mut self,
        state: &SearchState<'_>,
        pending: &[usize],
        depth: u32,
        alpha: f64,
        mut beta: f64,
    ) -> f64 {
        self.nodes += 1;
        if let Some(value) = self.terminal(state, depth) {
            return value;
        }

        let Some((&adversary, rest)) = pending.split_first() else {
            return self.minimax_max(state, pending, depth + 1, alpha, beta);
        };
        let Some(current) = state.adversary_cell(adversary) else {
            return self.minimax_max(state, rest, depth + 1, alpha, beta);
        };

        let in_zone = self.evaluator.zone.contains(current);
        let mut value = f64::INFINITY;
        for outcome in chance_outcomes(state, current, self.topology, in_zone) {
            let child = state.with_adversary_at(adversary, outcome.cell);
            value = value.min(self.minimax_max(&child, rest, depth + 1, alpha, beta));
            beta = beta.min(value);
            if self.pruning && beta <= alpha {
                break;
            }
        }
        value
    }
}

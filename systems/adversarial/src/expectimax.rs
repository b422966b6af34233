//! Expectimax recursion treating interfering agents as chance nodes.

use crate::{
    chance::{chance_outcomes, MIN_BRANCH_PROBABILITY},
    state::SearchState,
    tree::Tree,
    STUCK_PENALTY,
};

impl Tree {
    /// Mover to play; every tracked adversary replies before the next ply.
    pub(crate) fn expectimax_max(&mut self, state: &SearchState<'_>, depth: u32) -> f64 {
        self.nodes += 1;
        if let Some(value) = self.terminal(state, depth) {
            return value;
        }

        let moves = self.mover_moves(state);
        if moves.is_empty() {
            return self.evaluator.evaluate(state) - STUCK_PENALTY;
        }

        let pending: Vec<usize> = (0..state.adversary_count()).collect();
        let mut value = f64::NEG_INFINITY;
        for cell in moves {
            let child = state.with_mover_at(cell);
            let child_value = if pending.is_empty() {
                self.expectimax_max(&child, depth + 1)
            } else {
                self.expectimax_chance(&child, &pending, depth + 1)
            };
            value = value.max(child_value);
        }
        value
    }

    /// Expected value over the first pending adversary's replies.
    pub(crate) fn expectimax_chance(
        &mut self,
        state: &SearchState<'_>,
        pending: &[usize],
        depth: u32,
    ) -> f64 {
        self.nodes += 1;
        if let Some(value) = self.terminal(state, depth) {
            return value;
        }

        let Some((&adversary, rest)) = pending.split_first() else {
            return self.expectimax_max(state, depth + 1);
        };
        let Some(current) = state.adversary_cell(adversary) else {
            return self.expectimax_chance(state, rest, depth);
        };

        let in_zone = self.evaluator.zone.contains(current);
        let mut expected = 0.0;
        for outcome in chance_outcomes(state, current, self.topology, in_zone) {
            if outcome.probability < MIN_BRANCH_PROBABILITY {
                continue;
            }
            let child = state.with_adversary_at(adversary, outcome.cell);
            let child_value = if rest.is_empty() {
                self.expectimax_max(&child, depth + 1)
            } else {
                self.expectimax_chance(&child, rest, depth)
            };
            expected += outcome.probability * child_value;
        }
        expected
    }
}

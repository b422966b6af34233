//! Static evaluation of a hypothetical arrangement from the mover's side.

use matter_core::{CellCoord, Direction, GridView, Topology};

use crate::{state::SearchState, EscapeZone, SearchMode};

const DISTANCE_WEIGHT: f64 = 10.0;
const BLOCKED_AXIS_PENALTY: f64 = 15.0;
const BLOCKED_ESCAPE_PENALTY: f64 = 25.0;
const ESCAPE_SIGHT_FACTOR: f64 = 1.5;
const MOBILITY_WEIGHT: f64 = 5.0;
const CROWDING_WEIGHT: f64 = 10.0;
const ESCAPE_ZONE_PENALTY: f64 = 100.0;

/// Fixed inputs shared by every evaluation within one search.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Evaluator {
    pub(crate) goal: CellCoord,
    pub(crate) mode: SearchMode,
    pub(crate) zone: EscapeZone,
    pub(crate) escaping: bool,
}

impl Evaluator {
    pub(crate) fn evaluate(&self, state: &SearchState<'_>) -> f64 {
        let cell = state.mover_cell();
        let mut score = -DISTANCE_WEIGHT * f64::from(cell.manhattan_distance(self.goal));

        let mut sight = 0.0;
        if self.row_corridor_blocked(state, cell) {
            sight -= BLOCKED_AXIS_PENALTY;
        }
        if self.column_corridor_blocked(state, cell) {
            sight -= BLOCKED_AXIS_PENALTY;
            if self.escaping && self.goal.row() < cell.row() {
                sight -= BLOCKED_ESCAPE_PENALTY;
            }
        }
        if self.escaping {
            sight *= ESCAPE_SIGHT_FACTOR;
        }
        score += sight;

        let free = state.free_neighbors(cell, Topology::VonNeumann).len();
        score += MOBILITY_WEIGHT * free as f64;

        for adversary in state.adversary_cells() {
            let distance = cell.manhattan_distance(adversary);
            if distance <= 2 {
                score -= f64::from(3 - distance) * CROWDING_WEIGHT;
            }
        }

        if self.escaping {
            let upward_open = cell
                .step(Direction::North)
                .is_some_and(|above| state.is_free(above));
            if upward_open {
                score += self.mode.upward_bonus();
            }
            if self.zone.contains(cell) {
                score -= ESCAPE_ZONE_PENALTY;
            }
        }
        score
    }

    fn row_corridor_blocked(&self, state: &SearchState<'_>, cell: CellCoord) -> bool {
        let row = cell.row();
        span(cell.column(), self.goal.column())
            .any(|column| !state.is_free(CellCoord::new(column, row)))
    }

    fn column_corridor_blocked(&self, state: &SearchState<'_>, cell: CellCoord) -> bool {
        let column = cell.column();
        span(cell.row(), self.goal.row()).any(|row| !state.is_free(CellCoord::new(column, row)))
    }
}

/// Coordinates strictly after `from` up to and including `to`.
fn span(from: u32, to: u32) -> Box<dyn Iterator<Item = u32>> {
    if to > from {
        Box::new(from + 1..=to)
    } else {
        Box::new((to..from).rev())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matter_core::ElementId;
    use matter_world::GridWorld;

    fn evaluator(goal: CellCoord, escaping: bool, rows: u32) -> Evaluator {
        Evaluator {
            goal,
            mode: SearchMode::Minimax,
            zone: EscapeZone::for_grid(rows, 3),
            escaping,
        }
    }

    #[test]
    fn span_walks_toward_the_target() {
        assert_eq!(span(2, 5).collect::<Vec<_>>(), vec![3, 4, 5]);
        assert_eq!(span(5, 2).collect::<Vec<_>>(), vec![4, 3, 2]);
        assert_eq!(span(3, 3).count(), 0);
    }

    #[test]
    fn open_corridor_scores_distance_and_mobility() {
        let mut world = GridWorld::new(5, 5);
        let mover = ElementId::new(0);
        world.place(mover, CellCoord::new(0, 2)).expect("place");
        let state = SearchState::new(&world, mover, CellCoord::new(0, 2), &[]);

        let value = evaluator(CellCoord::new(4, 2), false, 20).evaluate(&state);
        assert!((value - (-40.0 + 15.0)).abs() < 1e-9);
    }

    #[test]
    fn blocked_corridors_and_crowding_cost_points() {
        let mut world = GridWorld::new(5, 5);
        let mover = ElementId::new(0);
        let other = ElementId::new(1);
        world.place(mover, CellCoord::new(0, 2)).expect("place");
        world.place(other, CellCoord::new(2, 2)).expect("place");
        let state = SearchState::new(&world, mover, CellCoord::new(0, 2), &[other]);

        let value = evaluator(CellCoord::new(4, 2), false, 20).evaluate(&state);
        let expected = -40.0 - BLOCKED_AXIS_PENALTY + 15.0 - CROWDING_WEIGHT;
        assert!((value - expected).abs() < 1e-9);
    }

    #[test]
    fn escaping_mover_is_pushed_out_of_the_zone() {
        let mut world = GridWorld::new(5, 6);
        let mover = ElementId::new(0);
        world.place(mover, CellCoord::new(2, 5)).expect("place");
        let state = SearchState::new(&world, mover, CellCoord::new(2, 5), &[]);

        let escaping = evaluator(CellCoord::new(2, 0), true, 6).evaluate(&state);
        let relaxed = evaluator(CellCoord::new(2, 0), false, 6).evaluate(&state);
        assert!((escaping - relaxed - (50.0 - ESCAPE_ZONE_PENALTY)).abs() < 1e-9);
    }
}

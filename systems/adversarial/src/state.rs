//! Copy-on-recurse overlay describing a hypothetical arrangement of agents.

use matter_core::{CellCoord, ElementId, GridView};
use matter_world::GridWorld;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Token {
    id: ElementId,
    cell: CellCoord,
}

/// Positions of the mover and its tracked adversaries layered over the world.
///
/// The world itself is never written; each branch clones the overlay and
/// moves tokens inside it, so returning from a branch cannot leak state.
#[derive(Clone, Debug)]
pub(crate) struct SearchState<'a> {
    world: &'a GridWorld,
    mover: Token,
    adversaries: Vec<Token>,
}

impl<'a> SearchState<'a> {
    pub(crate) fn new(
        world: &'a GridWorld,
        mover: ElementId,
        start: CellCoord,
        adversaries: &[ElementId],
    ) -> Self {
        let adversaries = adversaries
            .iter()
            .filter_map(|id| {
                world.element(*id).map(|element| Token {
                    id: *id,
                    cell: element.cell(),
                })
            })
            .collect();
        Self {
            world,
            mover: Token {
                id: mover,
                cell: start,
            },
            adversaries,
        }
    }

    pub(crate) fn mover_cell(&self) -> CellCoord {
        self.mover.cell
    }

    pub(crate) fn adversary_count(&self) -> usize {
        self.adversaries.len()
    }

    pub(crate) fn adversary_cell(&self, index: usize) -> Option<CellCoord> {
        self.adversaries.get(index).map(|token| token.cell)
    }

    pub(crate) fn adversary_cells(&self) -> impl Iterator<Item = CellCoord> + '_ {
        self.adversaries.iter().map(|token| token.cell)
    }

    pub(crate) fn with_mover_at(&self, cell: CellCoord) -> Self {
        let mut next = self.clone();
        next.mover.cell = cell;
        next
    }

    pub(crate) fn with_adversary_at(&self, index: usize, cell: CellCoord) -> Self {
        let mut next = self.clone();
        if let Some(token) = next.adversaries.get_mut(index) {
            token.cell = cell;
        }
        next
    }

    fn is_tracked(&self, id: ElementId) -> bool {
        id == self.mover.id || self.adversaries.iter().any(|token| token.id == id)
    }
}

impl GridView for SearchState<'_> {
    fn dimensions(&self) -> (u32, u32) {
        self.world.dimensions()
    }

    fn is_wall(&self, cell: CellCoord) -> bool {
        self.world.is_wall(cell)
    }

    fn occupant(&self, cell: CellCoord) -> Option<ElementId> {
        if self.mover.cell == cell {
            return Some(self.mover.id);
        }
        if let Some(token) = self.adversaries.iter().find(|token| token.cell == cell) {
            return Some(token.id);
        }
        self.world
            .occupant(cell)
            .filter(|occupant| !self.is_tracked(*occupant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_moves_tokens_without_touching_world() {
        let mut world = GridWorld::new(3, 3);
        let mover = ElementId::new(0);
        let other = ElementId::new(1);
        world.place(mover, CellCoord::new(0, 0)).expect("place");
        world.place(other, CellCoord::new(2, 2)).expect("place");

        let state = SearchState::new(&world, mover, CellCoord::new(0, 0), &[other]);
        let moved = state
            .with_mover_at(CellCoord::new(1, 0))
            .with_adversary_at(0, CellCoord::new(2, 1));

        assert_eq!(moved.occupant(CellCoord::new(0, 0)), None);
        assert_eq!(moved.occupant(CellCoord::new(1, 0)), Some(mover));
        assert_eq!(moved.occupant(CellCoord::new(2, 2)), None);
        assert_eq!(moved.occupant(CellCoord::new(2, 1)), Some(other));

        assert_eq!(state.occupant(CellCoord::new(0, 0)), Some(mover));
        assert_eq!(world.occupant(CellCoord::new(0, 0)), Some(mover));
        assert_eq!(world.occupant(CellCoord::new(2, 2)), Some(other));
    }
}

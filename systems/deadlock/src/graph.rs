//! Directed "who blocks whom" graph over unsettled elements.

use std::collections::{BTreeMap, BTreeSet};

use matter_core::{CellCoord, ElementId};
use matter_world::GridWorld;

/// Edge `a -> b` means `a` stands on `b`'s target or on the straight row or
/// column segment between `b` and its target.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockingGraph {
    edges: BTreeMap<ElementId, Vec<ElementId>>,
}

impl BlockingGraph {
    /// Builds the graph over every unsettled element of `world`.
    #[must_use]
    pub fn build(world: &GridWorld) -> Self {
        let active: Vec<(ElementId, CellCoord, CellCoord)> = world
            .elements()
            .filter(|element| element.is_unsettled())
            .filter_map(|element| {
                element
                    .target()
                    .map(|target| (element.id(), element.cell(), target))
            })
            .collect();

        let mut edges = BTreeMap::new();
        for &(id, cell, _) in &active {
            let blocked: Vec<ElementId> = active
                .iter()
                .filter(|&&(other, other_cell, other_target)| {
                    other != id && obstructs(cell, other_cell, other_target)
                })
                .map(|&(other, _, _)| other)
                .collect();
            let _ = edges.insert(id, blocked);
        }
        Self { edges }
    }

    /// Elements blocked by `element`.
    #[must_use]
    pub fn blocked_by(&self, element: ElementId) -> &[ElementId] {
        self.edges.get(&element).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Cycles found by a depth-first walk in identifier order.
    ///
    /// Each cycle lists its members once, starting from the first member the
    /// walk reached.
    #[must_use]
    pub fn cycles(&self) -> Vec<Vec<ElementId>> {
        let mut walk = CycleWalk {
            graph: self,
            visited: BTreeSet::new(),
            on_stack: BTreeSet::new(),
            cycles: Vec::new(),
        };
        for &node in self.edges.keys() {
            if !walk.visited.contains(&node) {
                walk.visit(node, Vec::new());
            }
        }
        walk.cycles
    }
}

struct CycleWalk<'a> {
    graph: &'a BlockingGraph,
    visited: BTreeSet<ElementId>,
    on_stack: BTreeSet<ElementId>,
    cycles: Vec<Vec<ElementId>>,
}

impl CycleWalk<'_> {
    fn visit(&mut self, node: ElementId, mut path: Vec<ElementId>) {
        if self.on_stack.contains(&node) {
            if let Some(start) = path.iter().position(|member| *member == node) {
                let cycle = path[start..].to_vec();
                if cycle.len() > 1 {
                    self.cycles.push(cycle);
                }
            }
            return;
        }
        if !self.visited.insert(node) {
            return;
        }

        let _ = self.on_stack.insert(node);
        path.push(node);
        for &next in self.graph.blocked_by(node) {
            self.visit(next, path.clone());
        }
        let _ = self.on_stack.remove(&node);
    }
}

fn obstructs(cell: CellCoord, other: CellCoord, other_target: CellCoord) -> bool {
    if cell == other_target {
        return true;
    }
    let between = |value: u32, from: u32, to: u32| from.min(to) <= value && value <= from.max(to);
    (cell.column() == other.column() && between(cell.row(), other.row(), other_target.row()))
        || (cell.row() == other.row() && between(cell.column(), other.column(), other_target.column()))
}

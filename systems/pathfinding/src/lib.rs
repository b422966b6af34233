#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Single-agent grid search used as the baseline planner.
//!
//! A*, breadth-first and greedy best-first search share one frontier loop
//! that differs only in how entries are prioritised. Every search reads the
//! grid through [`GridView`], so callers can hide the mover's own cell with
//! [`WithoutOccupant`] instead of mutating the world.

use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
};

use matter_core::{neighbors, Algorithm, CellCoord, ElementId, GridView, Topology};

/// Uninformed or heuristic search flavour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SearchKind {
    /// A* ordered by `g + h`, breaking ties toward smaller `h`.
    AStar,
    /// Breadth-first search ordered by path length.
    Bfs,
    /// Greedy best-first search ordered by `h` only.
    Greedy,
}

impl SearchKind {
    /// Baseline search used for the provided algorithm.
    ///
    /// Adversarial algorithms complete their tail with A*.
    #[must_use]
    pub const fn for_algorithm(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Bfs => Self::Bfs,
            Algorithm::Greedy => Self::Greedy,
            Algorithm::AStar | Algorithm::Minimax | Algorithm::Expectimax => Self::AStar,
        }
    }

    fn priority(self, cost: u32, heuristic: u32) -> (u32, u32) {
        match self {
            Self::AStar => (cost + heuristic, heuristic),
            Self::Bfs => (cost, 0),
            Self::Greedy => (heuristic, 0),
        }
    }
}

/// Result of a single pathfinding request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathOutcome {
    /// Cells from start to goal inclusive, or `None` when no path exists.
    pub path: Option<Vec<CellCoord>>,
    /// Frontier entries expanded while searching.
    pub nodes_expanded: u64,
}

impl PathOutcome {
    fn unreachable(nodes_expanded: u64) -> Self {
        Self {
            path: None,
            nodes_expanded,
        }
    }
}

/// Grid view that reports one element's cell as empty.
///
/// Planning for an element must not treat its own position as an obstacle.
#[derive(Clone, Copy, Debug)]
pub struct WithoutOccupant<'a, V: ?Sized> {
    inner: &'a V,
    element: ElementId,
}

impl<'a, V: GridView + ?Sized> WithoutOccupant<'a, V> {
    /// Wraps `inner`, hiding `element` from occupancy queries.
    #[must_use]
    pub fn new(inner: &'a V, element: ElementId) -> Self {
        Self { inner, element }
    }
}

impl<V: GridView + ?Sized> GridView for WithoutOccupant<'_, V> {
    fn dimensions(&self) -> (u32, u32) {
        self.inner.dimensions()
    }

    fn is_wall(&self, cell: CellCoord) -> bool {
        self.inner.is_wall(cell)
    }

    fn occupant(&self, cell: CellCoord) -> Option<ElementId> {
        self.inner
            .occupant(cell)
            .filter(|occupant| *occupant != self.element)
    }
}

/// Searches for a path from `start` to `goal` through free cells.
///
/// Returns no path when either endpoint is outside the grid or a wall, or
/// when the goal cannot be reached. A start equal to the goal yields a
/// single-cell path. The start cell itself is never tested for occupancy.
#[must_use]
pub fn find_path<V: GridView + ?Sized>(
    view: &V,
    start: CellCoord,
    goal: CellCoord,
    topology: Topology,
    kind: SearchKind,
) -> PathOutcome {
    if !view.is_passable(start) || !view.is_passable(goal) {
        return PathOutcome::unreachable(0);
    }
    if start == goal {
        return PathOutcome {
            path: Some(vec![start]),
            nodes_expanded: 0,
        };
    }

    let (columns, rows) = view.dimensions();
    let Some(cell_count) = usize::try_from(u64::from(columns) * u64::from(rows)).ok() else {
        return PathOutcome::unreachable(0);
    };
    let Some(start_index) = index(columns, start) else {
        return PathOutcome::unreachable(0);
    };

    let mut best_cost = vec![u32::MAX; cell_count];
    let mut came_from: Vec<Option<CellCoord>> = vec![None; cell_count];
    let mut closed = vec![false; cell_count];
    let mut frontier = BinaryHeap::new();
    let mut sequence = 0_u64;
    let mut nodes_expanded = 0_u64;

    best_cost[start_index] = 0;
    frontier.push(Reverse(FrontierEntry {
        priority: kind.priority(0, topology.distance(start, goal)),
        sequence,
        cell: start,
    }));

    while let Some(Reverse(entry)) = frontier.pop() {
        let Some(current_index) = index(columns, entry.cell) else {
            continue;
        };
        if closed[current_index] {
            continue;
        }
        closed[current_index] = true;
        nodes_expanded += 1;

        if entry.cell == goal {
            return PathOutcome {
                path: Some(reconstruct(&came_from, columns, start, goal)),
                nodes_expanded,
            };
        }

        let next_cost = best_cost[current_index].saturating_add(1);
        for next in neighbors(entry.cell, topology, columns, rows) {
            if !view.is_free(next) {
                continue;
            }
            let Some(next_index) = index(columns, next) else {
                continue;
            };
            if closed[next_index] || best_cost[next_index] <= next_cost {
                continue;
            }

            best_cost[next_index] = next_cost;
            came_from[next_index] = Some(entry.cell);
            sequence += 1;
            frontier.push(Reverse(FrontierEntry {
                priority: kind.priority(next_cost, topology.distance(next, goal)),
                sequence,
                cell: next,
            }));
        }
    }

    PathOutcome::unreachable(nodes_expanded)
}

/// A* search with the heuristic matched to `topology`.
#[must_use]
pub fn astar<V: GridView + ?Sized>(
    view: &V,
    start: CellCoord,
    goal: CellCoord,
    topology: Topology,
) -> PathOutcome {
    find_path(view, start, goal, topology, SearchKind::AStar)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FrontierEntry {
    priority: (u32, u32),
    sequence: u64,
    cell: CellCoord,
}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then(self.sequence.cmp(&other.sequence))
    }
}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn reconstruct(
    came_from: &[Option<CellCoord>],
    columns: u32,
    start: CellCoord,
    goal: CellCoord,
) -> Vec<CellCoord> {
    let mut path = vec![goal];
    let mut current = goal;
    while current != start {
        let Some(previous) = index(columns, current).and_then(|slot| came_from[slot]) else {
            break;
        };
        path.push(previous);
        current = previous;
    }
    path.reverse();
    path
}

fn index(columns: u32, cell: CellCoord) -> Option<usize> {
    let column = usize::try_from(cell.column()).ok()?;
    let row = usize::try_from(cell.row()).ok()?;
    let width = usize::try_from(columns).ok()?;
    row.checked_mul(width)?.checked_add(column)
}

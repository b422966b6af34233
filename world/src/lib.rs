#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative grid state for the programmable-matter engine.
//!
//! [`GridWorld`] owns the dense cell array together with the element registry
//! and is the only writer of occupancy. Element positions are never stored
//! anywhere else, so every relocation goes through [`GridWorld::move_element`]
//! which updates the cell array and the registry in one step.

mod assignment;

use std::collections::{BTreeMap, HashSet};

use matter_core::{neighbors, Cell, CellCoord, ElementId, GridView, Topology};
use serde::{Deserialize, Serialize};

pub use assignment::AssignmentStrategy;

/// Single element tracked by the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Element {
    id: ElementId,
    cell: CellCoord,
    target: Option<CellCoord>,
}

impl Element {
    /// Identifier of the element.
    #[must_use]
    pub const fn id(&self) -> ElementId {
        self.id
    }

    /// Cell currently occupied by the element.
    #[must_use]
    pub const fn cell(&self) -> CellCoord {
        self.cell
    }

    /// Target cell assigned to the element, if any.
    #[must_use]
    pub const fn target(&self) -> Option<CellCoord> {
        self.target
    }

    /// Reports whether the element rests on its assigned target.
    #[must_use]
    pub fn at_target(&self) -> bool {
        self.target == Some(self.cell)
    }

    /// Reports whether the element has a target it has not reached yet.
    #[must_use]
    pub fn is_unsettled(&self) -> bool {
        matches!(self.target, Some(target) if target != self.cell)
    }
}

/// Reasons a registry mutation may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum WorldError {
    /// The cell lies outside the grid or is a wall.
    #[error("cell {0} is outside the grid or a wall")]
    InvalidPosition(CellCoord),
    /// The cell already holds another element.
    #[error("cell {0} is already occupied")]
    CellOccupied(CellCoord),
    /// No element with the provided identifier exists.
    #[error("element {0} is not registered")]
    UnknownElement(ElementId),
    /// An element with the provided identifier already exists.
    #[error("element {0} is already registered")]
    DuplicateElement(ElementId),
    /// The requested target is already assigned to another element.
    #[error("target {target} is already assigned to element {owner}")]
    TargetTaken {
        /// Cell that was requested.
        target: CellCoord,
        /// Element currently holding the target.
        owner: ElementId,
    },
}

/// Contract failure detected by [`GridWorld::check_invariants`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    /// The registry and the cell array disagree about an element's position.
    #[error("element {element} is registered at {cell} but the grid disagrees")]
    PositionMismatch {
        /// Element whose position is inconsistent.
        element: ElementId,
        /// Cell recorded in the registry.
        cell: CellCoord,
    },
    /// A cell claims an element that the registry places elsewhere.
    #[error("cell {cell} claims element {element} which is registered elsewhere")]
    StrayOccupancy {
        /// Element referenced by the cell.
        element: ElementId,
        /// Cell holding the stray reference.
        cell: CellCoord,
    },
    /// Two elements share the same target.
    #[error("target {0} is assigned to more than one element")]
    SharedTarget(CellCoord),
    /// A target lies outside the grid or on a wall.
    #[error("target {0} is outside the grid or a wall")]
    InvalidTarget(CellCoord),
}

/// Authoritative grid of cells together with the element registry.
#[derive(Clone, Debug)]
pub struct GridWorld {
    columns: u32,
    rows: u32,
    cells: Vec<Cell>,
    elements: BTreeMap<ElementId, Element>,
    target_cells: Vec<CellCoord>,
}

impl GridWorld {
    /// Creates an open grid without walls.
    #[must_use]
    pub fn new(columns: u32, rows: u32) -> Self {
        let capacity_u64 = u64::from(columns) * u64::from(rows);
        let capacity = usize::try_from(capacity_u64).unwrap_or(0);
        Self {
            columns,
            rows,
            cells: vec![Cell::Empty; capacity],
            elements: BTreeMap::new(),
            target_cells: Vec::new(),
        }
    }

    /// Creates a grid whose outermost ring of cells is walled off.
    #[must_use]
    pub fn with_boundary_walls(columns: u32, rows: u32) -> Self {
        let mut world = Self::new(columns, rows);
        for row in 0..rows {
            for column in 0..columns {
                let on_edge = row == 0 || column == 0 || row + 1 == rows || column + 1 == columns;
                if on_edge {
                    world.write_cell(CellCoord::new(column, row), Cell::Wall);
                }
            }
        }
        world
    }

    /// Turns an empty cell into a wall.
    pub fn set_wall(&mut self, cell: CellCoord) -> Result<(), WorldError> {
        match self.cell(cell) {
            None => Err(WorldError::InvalidPosition(cell)),
            Some(Cell::Occupied(_)) => Err(WorldError::CellOccupied(cell)),
            Some(_) => {
                self.write_cell(cell, Cell::Wall);
                Ok(())
            }
        }
    }

    /// Number of columns and rows in the grid.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.columns, self.rows)
    }

    /// Content of the provided cell, or `None` outside the grid.
    #[must_use]
    pub fn cell(&self, cell: CellCoord) -> Option<Cell> {
        self.index(cell).and_then(|index| self.cells.get(index).copied())
    }

    /// Reports whether the cell lies inside the grid.
    #[must_use]
    pub fn is_valid(&self, cell: CellCoord) -> bool {
        cell.column() < self.columns && cell.row() < self.rows
    }

    /// Reports whether the cell is a wall.
    #[must_use]
    pub fn is_wall(&self, cell: CellCoord) -> bool {
        matches!(self.cell(cell), Some(Cell::Wall))
    }

    /// Reports whether the cell holds an element.
    #[must_use]
    pub fn is_occupied(&self, cell: CellCoord) -> bool {
        matches!(self.cell(cell), Some(Cell::Occupied(_)))
    }

    /// In-bounds neighbours of the cell under the provided topology.
    #[must_use]
    pub fn neighbors(&self, cell: CellCoord, topology: Topology) -> Vec<CellCoord> {
        neighbors(cell, topology, self.columns, self.rows).collect()
    }

    /// Registers a new element on an empty cell.
    pub fn place(&mut self, id: ElementId, cell: CellCoord) -> Result<(), WorldError> {
        if self.elements.contains_key(&id) {
            return Err(WorldError::DuplicateElement(id));
        }
        match self.cell(cell) {
            None | Some(Cell::Wall) => return Err(WorldError::InvalidPosition(cell)),
            Some(Cell::Occupied(_)) => return Err(WorldError::CellOccupied(cell)),
            Some(Cell::Empty) => {}
        }

        self.write_cell(cell, Cell::Occupied(id));
        let _ = self.elements.insert(
            id,
            Element {
                id,
                cell,
                target: None,
            },
        );
        Ok(())
    }

    /// Removes an element and frees its cell.
    pub fn remove(&mut self, id: ElementId) -> Option<Element> {
        let element = self.elements.remove(&id)?;
        self.write_cell(element.cell, Cell::Empty);
        Some(element)
    }

    /// Moves an element to `to`, updating the grid and the registry together.
    ///
    /// Returns `false` without mutating anything when the element is unknown
    /// or the destination is outside the grid, a wall, or occupied. Adjacency
    /// is not checked; forced relocation relies on that.
    pub fn move_element(&mut self, id: ElementId, to: CellCoord) -> bool {
        let Some(from) = self.elements.get(&id).map(|element| element.cell) else {
            return false;
        };
        if self.cell(to) != Some(Cell::Empty) {
            return false;
        }

        self.write_cell(from, Cell::Empty);
        self.write_cell(to, Cell::Occupied(id));
        if let Some(element) = self.elements.get_mut(&id) {
            element.cell = to;
        }
        true
    }

    /// Looks up a registered element.
    #[must_use]
    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    /// Iterator over all elements in identifier order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }

    /// Number of registered elements.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Assigns or clears the target of one element.
    pub fn assign_target(
        &mut self,
        id: ElementId,
        target: Option<CellCoord>,
    ) -> Result<(), WorldError> {
        if !self.elements.contains_key(&id) {
            return Err(WorldError::UnknownElement(id));
        }
        if let Some(cell) = target {
            if !self.is_valid(cell) || self.is_wall(cell) {
                return Err(WorldError::InvalidPosition(cell));
            }
            if let Some(owner) = self.target_owner(cell) {
                if owner != id {
                    return Err(WorldError::TargetTaken {
                        target: cell,
                        owner,
                    });
                }
            }
        }
        if let Some(element) = self.elements.get_mut(&id) {
            element.target = target;
        }
        Ok(())
    }

    /// Exchanges the targets of two elements.
    pub fn swap_targets(&mut self, first: ElementId, second: ElementId) -> Result<(), WorldError> {
        let first_target = self
            .element(first)
            .ok_or(WorldError::UnknownElement(first))?
            .target;
        let second_target = self
            .element(second)
            .ok_or(WorldError::UnknownElement(second))?
            .target;
        if let Some(element) = self.elements.get_mut(&first) {
            element.target = second_target;
        }
        if let Some(element) = self.elements.get_mut(&second) {
            element.target = first_target;
        }
        Ok(())
    }

    /// Element whose target is the provided cell, if any.
    #[must_use]
    pub fn target_owner(&self, cell: CellCoord) -> Option<ElementId> {
        self.elements
            .values()
            .find(|element| element.target == Some(cell))
            .map(|element| element.id)
    }

    /// Drops every element's target assignment while keeping the target set.
    pub fn clear_targets(&mut self) {
        for element in self.elements.values_mut() {
            element.target = None;
        }
    }

    /// Removes every element and target while keeping walls.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            if matches!(cell, Cell::Occupied(_)) {
                *cell = Cell::Empty;
            }
        }
        self.elements.clear();
        self.target_cells.clear();
    }

    /// Replaces the shape target set, dropping out-of-bounds, wall and duplicate cells.
    ///
    /// Returns the cells that were rejected.
    pub fn set_target_cells(&mut self, cells: &[CellCoord]) -> Vec<CellCoord> {
        let mut seen = HashSet::with_capacity(cells.len());
        let mut rejected = Vec::new();
        self.target_cells.clear();
        for &cell in cells {
            if !self.is_valid(cell) || self.is_wall(cell) || !seen.insert(cell) {
                rejected.push(cell);
                continue;
            }
            self.target_cells.push(cell);
        }
        rejected
    }

    /// Accepted shape target cells in insertion order.
    #[must_use]
    pub fn target_cells(&self) -> &[CellCoord] {
        &self.target_cells
    }

    /// Recomputes every element's target from the stored target set.
    ///
    /// Targets assigned directly through [`GridWorld::assign_target`] join the
    /// target set first, so reassignment never loses a target.
    ///
    /// Returns the number of elements that received a target.
    pub fn assign_targets(&mut self, strategy: AssignmentStrategy) -> usize {
        let adopted: Vec<CellCoord> = self
            .elements
            .values()
            .filter_map(|element| element.target)
            .filter(|cell| !self.target_cells.contains(cell))
            .collect();
        self.target_cells.extend(adopted);
        self.clear_targets();
        self.assign_missing_targets(strategy)
    }

    /// Assigns targets to elements that have none, using only unclaimed cells.
    ///
    /// Returns the number of elements that received a target.
    pub fn assign_missing_targets(&mut self, strategy: AssignmentStrategy) -> usize {
        let claimed: HashSet<CellCoord> = self
            .elements
            .values()
            .filter_map(|element| element.target)
            .collect();
        let open_targets: Vec<CellCoord> = self
            .target_cells
            .iter()
            .copied()
            .filter(|cell| !claimed.contains(cell))
            .collect();
        let waiting: Vec<(ElementId, CellCoord)> = self
            .elements
            .values()
            .filter(|element| element.target.is_none())
            .map(|element| (element.id, element.cell))
            .collect();

        let positions: Vec<CellCoord> = waiting.iter().map(|(_, cell)| *cell).collect();
        let pairs = strategy.assign(&positions, &open_targets);

        let mut assigned = 0;
        for (slot, target) in pairs.into_iter().enumerate() {
            let (Some(target), Some((id, _))) = (target, waiting.get(slot)) else {
                continue;
            };
            if let Some(element) = self.elements.get_mut(id) {
                element.target = Some(target);
                assigned += 1;
            }
        }
        assigned
    }

    /// Verifies occupancy consistency and target injectivity.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        for element in self.elements.values() {
            if self.cell(element.cell) != Some(Cell::Occupied(element.id)) {
                return Err(InvariantViolation::PositionMismatch {
                    element: element.id,
                    cell: element.cell,
                });
            }
        }

        for row in 0..self.rows {
            for column in 0..self.columns {
                let cell = CellCoord::new(column, row);
                if let Some(Cell::Occupied(id)) = self.cell(cell) {
                    let registered = self.elements.get(&id).map(|element| element.cell);
                    if registered != Some(cell) {
                        return Err(InvariantViolation::StrayOccupancy { element: id, cell });
                    }
                }
            }
        }

        let mut seen = HashSet::new();
        for target in self.elements.values().filter_map(|element| element.target) {
            if !self.is_valid(target) || self.is_wall(target) {
                return Err(InvariantViolation::InvalidTarget(target));
            }
            if !seen.insert(target) {
                return Err(InvariantViolation::SharedTarget(target));
            }
        }
        Ok(())
    }

    fn write_cell(&mut self, cell: CellCoord, value: Cell) {
        if let Some(index) = self.index(cell) {
            if let Some(slot) = self.cells.get_mut(index) {
                *slot = value;
            }
        }
    }

    fn index(&self, cell: CellCoord) -> Option<usize> {
        if self.is_valid(cell) {
            let row = usize::try_from(cell.row()).ok()?;
            let column = usize::try_from(cell.column()).ok()?;
            let width = usize::try_from(self.columns).ok()?;
            Some(row * width + column)
        } else {
            None
        }
    }
}

impl GridView for GridWorld {
    fn dimensions(&self) -> (u32, u32) {
        (self.columns, self.rows)
    }

    fn is_wall(&self, cell: CellCoord) -> bool {
        GridWorld::is_wall(self, cell)
    }

    fn occupant(&self, cell: CellCoord) -> Option<ElementId> {
        match self.cell(cell) {
            Some(Cell::Occupied(id)) => Some(id),
            _ => None,
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use super::GridWorld;
    use matter_core::{CellCoord, ElementId, ElementSnapshot, GridView, SimulationState};

    /// Captures immutable snapshots of every element in identifier order.
    #[must_use]
    pub fn element_snapshots(world: &GridWorld) -> Vec<ElementSnapshot> {
        world
            .elements()
            .map(|element| ElementSnapshot {
                id: element.id(),
                cell: element.cell(),
                target: element.target(),
            })
            .collect()
    }

    /// Captures the full serializable simulation state.
    #[must_use]
    pub fn snapshot(world: &GridWorld) -> SimulationState {
        let (columns, rows) = world.dimensions();
        let walls = (0..rows)
            .flat_map(|row| (0..columns).map(move |column| CellCoord::new(column, row)))
            .filter(|cell| world.is_wall(*cell))
            .collect();
        SimulationState {
            columns,
            rows,
            walls,
            elements: element_snapshots(world),
            targets: world.target_cells().to_vec(),
        }
    }

    /// Identifiers of elements that have a target they have not reached.
    #[must_use]
    pub fn unsettled(world: &GridWorld) -> Vec<ElementId> {
        world
            .elements()
            .filter(|element| element.is_unsettled())
            .map(|element| element.id())
            .collect()
    }

    /// Number of cells an element could enter right now.
    #[must_use]
    pub fn free_cell_count(world: &GridWorld) -> usize {
        let (columns, rows) = world.dimensions();
        (0..rows)
            .flat_map(|row| (0..columns).map(move |column| CellCoord::new(column, row)))
            .filter(|cell| world.is_free(*cell))
            .count()
    }

    /// Fraction of targeted elements resting on their target.
    ///
    /// A world without targeted elements reports zero.
    #[must_use]
    pub fn success_rate(world: &GridWorld) -> f64 {
        let targeted = world
            .elements()
            .filter(|element| element.target().is_some())
            .count();
        if targeted == 0 {
            return 0.0;
        }
        let settled = world.elements().filter(|element| element.at_target()).count();
        settled as f64 / targeted as f64
    }

    /// Reports whether every targeted element rests on its target.
    #[must_use]
    pub fn all_settled(world: &GridWorld) -> bool {
        world.elements().all(|element| !element.is_unsettled())
    }
}

#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the programmable-matter engine.
//!
//! This crate defines the vocabulary that connects the authoritative grid
//! world, the pure planning systems, and the adapters. The world owns cells
//! and element positions, systems read it exclusively through [`GridView`],
//! and every committed step is reported back as a [`MoveRecord`] so callers
//! can replay a transformation deterministically.

use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

/// Location of a single grid cell expressed as column and row coordinates.
///
/// Row zero is the top edge of the grid, so moving "up" decreases the row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Computes the Manhattan distance between two cell coordinates.
    #[must_use]
    pub fn manhattan_distance(self, other: CellCoord) -> u32 {
        self.column().abs_diff(other.column()) + self.row().abs_diff(other.row())
    }

    /// Computes the Chebyshev (king-move) distance between two cell coordinates.
    #[must_use]
    pub fn chebyshev_distance(self, other: CellCoord) -> u32 {
        self.column()
            .abs_diff(other.column())
            .max(self.row().abs_diff(other.row()))
    }

    /// Cell reached by stepping once in `direction`, if it does not underflow.
    ///
    /// The result is not bounds checked against any grid; callers filter it
    /// through [`GridView::is_valid`].
    #[must_use]
    pub fn step(self, direction: Direction) -> Option<CellCoord> {
        let (dx, dy) = direction.offset();
        let column = self.column.checked_add_signed(dx)?;
        let row = self.row.checked_add_signed(dy)?;
        Some(CellCoord::new(column, row))
    }

    /// Direction that moves from `self` to an adjacent `other`, if any.
    #[must_use]
    pub fn direction_to(self, other: CellCoord) -> Option<Direction> {
        Direction::ALL
            .into_iter()
            .find(|direction| self.step(*direction) == Some(other))
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.column, self.row)
    }
}

/// Compass directions available to elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Movement toward decreasing row indices.
    North,
    /// Movement toward increasing column indices.
    East,
    /// Movement toward increasing row indices.
    South,
    /// Movement toward decreasing column indices.
    West,
    /// Diagonal movement up and to the right.
    NorthEast,
    /// Diagonal movement down and to the right.
    SouthEast,
    /// Diagonal movement down and to the left.
    SouthWest,
    /// Diagonal movement up and to the left.
    NorthWest,
}

impl Direction {
    /// Every direction, cardinals first.
    pub const ALL: [Direction; 8] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
        Direction::NorthEast,
        Direction::SouthEast,
        Direction::SouthWest,
        Direction::NorthWest,
    ];

    /// Column and row delta applied by a single step.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::East => (1, 0),
            Self::South => (0, 1),
            Self::West => (-1, 0),
            Self::NorthEast => (1, -1),
            Self::SouthEast => (1, 1),
            Self::SouthWest => (-1, 1),
            Self::NorthWest => (-1, -1),
        }
    }

    /// Reports whether the step changes both axes.
    #[must_use]
    pub const fn is_diagonal(self) -> bool {
        matches!(
            self,
            Self::NorthEast | Self::SouthEast | Self::SouthWest | Self::NorthWest
        )
    }

    /// Reports whether the step decreases the row index.
    #[must_use]
    pub const fn is_upward(self) -> bool {
        matches!(self, Self::North | Self::NorthEast | Self::NorthWest)
    }
}

/// Adjacency rule used for a whole transformation run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// Four-neighbourhood: north, east, south and west.
    VonNeumann,
    /// Eight-neighbourhood including diagonals.
    Moore,
}

impl Topology {
    /// Directions an element may step in under this topology.
    #[must_use]
    pub fn directions(self) -> &'static [Direction] {
        match self {
            Self::VonNeumann => &Direction::ALL[..4],
            Self::Moore => &Direction::ALL,
        }
    }

    /// Admissible single-step distance between two cells.
    #[must_use]
    pub fn distance(self, from: CellCoord, to: CellCoord) -> u32 {
        match self {
            Self::VonNeumann => from.manhattan_distance(to),
            Self::Moore => from.chebyshev_distance(to),
        }
    }

    /// Canonical lowercase name used by adapters.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::VonNeumann => "von_neumann",
            Self::Moore => "moore",
        }
    }
}

impl FromStr for Topology {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match normalise(value).as_str() {
            "vonneumann" | "vn" => Ok(Self::VonNeumann),
            "moore" => Ok(Self::Moore),
            _ => Err(ParseError::UnknownTopology(value.to_owned())),
        }
    }
}

/// Iterator over in-bounds neighbours of `cell` in topology order.
///
/// Walls and occupancy are not considered; use [`GridView::free_neighbors`]
/// for traversable cells.
pub fn neighbors(
    cell: CellCoord,
    topology: Topology,
    columns: u32,
    rows: u32,
) -> impl Iterator<Item = CellCoord> {
    topology
        .directions()
        .iter()
        .filter_map(move |direction| cell.step(*direction))
        .filter(move |next| next.column() < columns && next.row() < rows)
}

/// Unique identifier assigned to an element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(u32);

impl ElementId {
    /// Creates a new element identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Content of a single grid cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cell {
    /// Traversable and unoccupied.
    #[default]
    Empty,
    /// Permanently blocked.
    Wall,
    /// Held by the element with the provided identifier.
    Occupied(ElementId),
}

/// Read-only access to grid geometry and occupancy used by every planner.
pub trait GridView {
    /// Number of columns and rows in the grid.
    fn dimensions(&self) -> (u32, u32);

    /// Reports whether the cell is a wall. Out-of-bounds cells are not walls.
    fn is_wall(&self, cell: CellCoord) -> bool;

    /// Element currently occupying the cell, if any.
    fn occupant(&self, cell: CellCoord) -> Option<ElementId>;

    /// Reports whether the cell lies inside the grid.
    fn is_valid(&self, cell: CellCoord) -> bool {
        let (columns, rows) = self.dimensions();
        cell.column() < columns && cell.row() < rows
    }

    /// Reports whether the cell is inside the grid and not a wall.
    fn is_passable(&self, cell: CellCoord) -> bool {
        self.is_valid(cell) && !self.is_wall(cell)
    }

    /// Reports whether an element could enter the cell right now.
    fn is_free(&self, cell: CellCoord) -> bool {
        self.is_passable(cell) && self.occupant(cell).is_none()
    }

    /// Free neighbours of `cell` in topology order.
    fn free_neighbors(&self, cell: CellCoord, topology: Topology) -> Vec<CellCoord> {
        let (columns, rows) = self.dimensions();
        neighbors(cell, topology, columns, rows)
            .filter(|next| self.is_free(*next))
            .collect()
    }
}

impl<T: GridView + ?Sized> GridView for &T {
    fn dimensions(&self) -> (u32, u32) {
        (**self).dimensions()
    }

    fn is_wall(&self, cell: CellCoord) -> bool {
        (**self).is_wall(cell)
    }

    fn occupant(&self, cell: CellCoord) -> Option<ElementId> {
        (**self).occupant(cell)
    }
}

/// Planning strategy used to produce element paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// A* with a topology-matched admissible heuristic.
    AStar,
    /// Uninformed breadth-first search.
    Bfs,
    /// Greedy best-first search ordered by heuristic only.
    Greedy,
    /// Minimax with alpha-beta pruning against nearby elements.
    Minimax,
    /// Expectimax treating nearby elements as chance nodes.
    Expectimax,
}

impl Algorithm {
    /// Every supported algorithm in presentation order.
    pub const ALL: [Algorithm; 5] = [
        Algorithm::AStar,
        Algorithm::Bfs,
        Algorithm::Greedy,
        Algorithm::Minimax,
        Algorithm::Expectimax,
    ];

    /// Canonical lowercase name used by adapters.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AStar => "astar",
            Self::Bfs => "bfs",
            Self::Greedy => "greedy",
            Self::Minimax => "minimax",
            Self::Expectimax => "expectimax",
        }
    }

    /// Reports whether the strategy searches against interfering elements.
    #[must_use]
    pub const fn is_adversarial(self) -> bool {
        matches!(self, Self::Minimax | Self::Expectimax)
    }
}

impl FromStr for Algorithm {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match normalise(value).as_str() {
            "astar" | "a*" => Ok(Self::AStar),
            "bfs" => Ok(Self::Bfs),
            "greedy" => Ok(Self::Greedy),
            "minimax" => Ok(Self::Minimax),
            "expectimax" => Ok(Self::Expectimax),
            _ => Err(ParseError::UnknownAlgorithm(value.to_owned())),
        }
    }
}

/// Who decides element moves during a transformation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// One planner sequences every element.
    Centralized,
    /// Each element decides locally once per tick.
    Independent,
}

impl FromStr for ControlMode {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match normalise(value).as_str() {
            "centralized" | "centralised" => Ok(Self::Centralized),
            "independent" => Ok(Self::Independent),
            _ => Err(ParseError::UnknownControlMode(value.to_owned())),
        }
    }
}

/// How planned moves are committed to the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementMode {
    /// One commit at a time.
    Sequential,
    /// Batched commits per round resolved through reservations.
    Parallel,
}

impl FromStr for MovementMode {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match normalise(value).as_str() {
            "sequential" => Ok(Self::Sequential),
            "parallel" => Ok(Self::Parallel),
            _ => Err(ParseError::UnknownMovement(value.to_owned())),
        }
    }
}

/// Target formations understood by the shape generator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    /// Filled square centred in the grid.
    Square,
    /// Filled disc centred in the grid.
    Circle,
    /// Filled upward-pointing triangle.
    Triangle,
    /// Heart outline filled from the bottom point.
    Heart,
}

impl ShapeKind {
    /// Every supported shape in presentation order.
    pub const ALL: [ShapeKind; 4] = [
        ShapeKind::Square,
        ShapeKind::Circle,
        ShapeKind::Triangle,
        ShapeKind::Heart,
    ];

    /// Canonical lowercase name used by adapters.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Square => "square",
            Self::Circle => "circle",
            Self::Triangle => "triangle",
            Self::Heart => "heart",
        }
    }
}

impl FromStr for ShapeKind {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match normalise(value).as_str() {
            "square" => Ok(Self::Square),
            "circle" => Ok(Self::Circle),
            "triangle" => Ok(Self::Triangle),
            "heart" => Ok(Self::Heart),
            _ => Err(ParseError::UnknownShape(value.to_owned())),
        }
    }
}

fn normalise(value: &str) -> String {
    value
        .trim()
        .chars()
        .filter(|character| !matches!(character, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Reasons a textual strategy or mode name may be rejected.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The algorithm name is not recognised.
    #[error("unknown algorithm `{0}`")]
    UnknownAlgorithm(String),
    /// The topology name is not recognised.
    #[error("unknown topology `{0}`")]
    UnknownTopology(String),
    /// The movement mode name is not recognised.
    #[error("unknown movement mode `{0}`")]
    UnknownMovement(String),
    /// The control mode name is not recognised.
    #[error("unknown control mode `{0}`")]
    UnknownControlMode(String),
    /// The shape name is not recognised.
    #[error("unknown shape `{0}`")]
    UnknownShape(String),
}

/// Immutable record of one committed step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoveRecord {
    /// Element that moved.
    #[serde(rename = "agent_id")]
    pub element: ElementId,
    /// Cell the element occupied before the move.
    pub from: CellCoord,
    /// Cell the element occupies after the move.
    pub to: CellCoord,
}

/// Path planned for a single element during a transformation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementPath {
    /// Element the path was planned for.
    pub element: ElementId,
    /// Planned cells, starting at the element's position at planning time.
    pub cells: Vec<CellCoord>,
}

/// Outcome of a single `transform` call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformReport {
    /// Every committed step in commit order.
    pub moves: Vec<MoveRecord>,
    /// Paths produced by the planner, most recent plan per element last.
    pub paths: Vec<ElementPath>,
    /// Total search nodes expanded across all planner calls.
    pub nodes_explored: u64,
    /// Fraction of targeted elements resting on their target.
    pub success_rate: f64,
    /// Whether the run met its control mode's success criterion.
    pub success: bool,
    /// Wall-clock time spent inside the transformation.
    pub elapsed: Duration,
    /// Planning passes (centralized) or ticks (independent) executed.
    pub ticks: u32,
    /// Number of deadlock interventions that changed the world.
    pub interventions: u32,
    /// Human-readable explanation when the run could not start or ended early.
    pub message: Option<String>,
}

/// Immutable representation of a single element's state used for queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    /// Unique identifier assigned to the element.
    pub id: ElementId,
    /// Grid cell currently occupied by the element.
    pub cell: CellCoord,
    /// Assigned target cell, if any.
    pub target: Option<CellCoord>,
}

impl ElementSnapshot {
    /// Reports whether the element rests on its assigned target.
    #[must_use]
    pub fn at_target(&self) -> bool {
        self.target == Some(self.cell)
    }
}

/// Serializable snapshot of the whole simulation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationState {
    /// Number of grid columns.
    pub columns: u32,
    /// Number of grid rows.
    pub rows: u32,
    /// Wall cells in row-major order.
    pub walls: Vec<CellCoord>,
    /// Elements ordered by identifier.
    pub elements: Vec<ElementSnapshot>,
    /// Accepted shape target cells.
    pub targets: Vec<CellCoord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::de::DeserializeOwned;

    #[test]
    fn manhattan_distance_matches_expectation() {
        let origin = CellCoord::new(1, 1);
        let destination = CellCoord::new(4, 3);
        assert_eq!(origin.manhattan_distance(destination), 5);
        assert_eq!(destination.manhattan_distance(origin), 5);
        assert_eq!(origin.chebyshev_distance(destination), 3);
    }

    #[test]
    fn step_refuses_to_underflow() {
        let corner = CellCoord::new(0, 0);
        assert_eq!(corner.step(Direction::North), None);
        assert_eq!(corner.step(Direction::West), None);
        assert_eq!(corner.step(Direction::SouthEast), Some(CellCoord::new(1, 1)));
    }

    #[test]
    fn neighbors_respect_topology_and_bounds() {
        let corner = CellCoord::new(0, 0);
        let von_neumann: Vec<_> = neighbors(corner, Topology::VonNeumann, 3, 3).collect();
        assert_eq!(von_neumann, vec![CellCoord::new(1, 0), CellCoord::new(0, 1)]);

        let centre = CellCoord::new(1, 1);
        assert_eq!(neighbors(centre, Topology::Moore, 3, 3).count(), 8);
        assert_eq!(neighbors(centre, Topology::VonNeumann, 3, 3).count(), 4);
    }

    #[test]
    fn direction_to_recovers_step() {
        let from = CellCoord::new(2, 2);
        for direction in Direction::ALL {
            let to = from.step(direction).expect("step");
            assert_eq!(from.direction_to(to), Some(direction));
        }
        assert_eq!(from.direction_to(CellCoord::new(4, 2)), None);
    }

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!("A-Star".parse::<Algorithm>(), Ok(Algorithm::AStar));
        assert_eq!("von_neumann".parse::<Topology>(), Ok(Topology::VonNeumann));
        assert_eq!("Parallel".parse::<MovementMode>(), Ok(MovementMode::Parallel));
        assert_eq!(
            "independent".parse::<ControlMode>(),
            Ok(ControlMode::Independent)
        );
        assert_eq!(
            "dijkstra".parse::<Algorithm>(),
            Err(ParseError::UnknownAlgorithm("dijkstra".to_owned()))
        );
    }

    #[test]
    fn canonical_names_round_trip_through_from_str() {
        for algorithm in Algorithm::ALL {
            assert_eq!(algorithm.name().parse::<Algorithm>(), Ok(algorithm));
        }
        for shape in ShapeKind::ALL {
            assert_eq!(shape.name().parse::<ShapeKind>(), Ok(shape));
        }
    }

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn transform_report_round_trips_through_bincode() {
        let report = TransformReport {
            moves: vec![MoveRecord {
                element: ElementId::new(3),
                from: CellCoord::new(1, 1),
                to: CellCoord::new(1, 0),
            }],
            paths: vec![ElementPath {
                element: ElementId::new(3),
                cells: vec![CellCoord::new(1, 1), CellCoord::new(1, 0)],
            }],
            nodes_explored: 7,
            success_rate: 1.0,
            success: true,
            elapsed: Duration::from_millis(4),
            ticks: 1,
            interventions: 0,
            message: None,
        };
        assert_round_trip(&report);
    }
}

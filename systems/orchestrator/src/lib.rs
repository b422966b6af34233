#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Drives a population of elements from their start cells to a shape.
//!
//! A [`SimulationContext`] owns the world, the configuration and the seeded
//! random number generator of one run. Transformations either plan every
//! element centrally or let each element decide on its own every tick; both
//! commit moves only through the world and hand stalls to the deadlock
//! system.

mod centralized;
mod config;
mod independent;
mod planner;

use std::time::Instant;

use matter_core::{
    Algorithm, CellCoord, ControlMode, ElementId, GridView, MovementMode, ParseError, ShapeKind,
    SimulationState, Topology, TransformReport,
};
use matter_system_adversarial::{AdversarialSearch, SearchMode};
use matter_system_deadlock::Intervention;
use matter_system_pathfinding::{find_path, PathOutcome, SearchKind, WithoutOccupant};
use matter_system_shapes::{ShapeGenerator, StandardShapes};
use matter_world::{query, GridWorld, WorldError};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

pub use config::{CentralizedConfig, IndependentConfig, SimulationConfig};
pub use planner::{AlgorithmPlanner, Planner};

/// Failures while setting up a simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    /// More elements were requested than free cells exist.
    #[error("cannot place {requested} elements: only {capacity} free cells")]
    TooManyElements {
        /// Elements requested.
        requested: usize,
        /// Free cells available.
        capacity: usize,
    },
    /// The configured grid cannot hold any element.
    #[error("grid of {columns}x{rows} cells is too small")]
    GridTooSmall {
        /// Configured columns.
        columns: u32,
        /// Configured rows.
        rows: u32,
    },
    /// The world rejected a registry operation.
    #[error(transparent)]
    World(#[from] WorldError),
}

/// Explicit state of one simulation run.
#[derive(Debug)]
pub struct SimulationContext {
    config: SimulationConfig,
    world: GridWorld,
    rng: ChaCha8Rng,
}

impl SimulationContext {
    /// Creates an empty context for `config`.
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        let world = build_world(&config)?;
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Ok(Self { config, world, rng })
    }

    /// Configuration the context was created with.
    #[must_use]
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Read access to the world.
    #[must_use]
    pub const fn world(&self) -> &GridWorld {
        &self.world
    }

    /// Write access to the world for hand-built scenarios.
    pub fn world_mut(&mut self) -> &mut GridWorld {
        &mut self.world
    }

    /// Replaces all elements with `count` new ones packed from the bottom row up.
    ///
    /// Rows fill left to right and walls are skipped.
    pub fn initialize(&mut self, count: usize) -> Result<(), SimulationError> {
        self.world.clear();
        let capacity = query::free_cell_count(&self.world);
        if count > capacity {
            return Err(SimulationError::TooManyElements {
                requested: count,
                capacity,
            });
        }

        let (columns, rows) = self.world.dimensions();
        let mut placed = 0;
        'rows: for row in (0..rows).rev() {
            for column in 0..columns {
                if placed == count {
                    break 'rows;
                }
                let cell = CellCoord::new(column, row);
                if self.world.is_wall(cell) {
                    continue;
                }
                let raw = u32::try_from(placed).map_err(|_| SimulationError::TooManyElements {
                    requested: count,
                    capacity,
                })?;
                self.world.place(ElementId::new(raw), cell)?;
                placed += 1;
            }
        }
        info!(event = "initialize", elements = placed, columns, rows);
        Ok(())
    }

    /// Generates `count` cells of `shape`, keeps the valid ones and assigns them.
    ///
    /// Returns the accepted target cells.
    pub fn set_targets(&mut self, shape: ShapeKind, count: usize) -> Vec<CellCoord> {
        self.set_targets_with(&StandardShapes, shape, count)
    }

    /// Like [`SimulationContext::set_targets`] with a custom shape generator.
    pub fn set_targets_with(
        &mut self,
        generator: &dyn ShapeGenerator,
        shape: ShapeKind,
        count: usize,
    ) -> Vec<CellCoord> {
        let (columns, rows) = self.world.dimensions();
        let cells = generator.generate(shape, count, columns, rows);
        for cell in self.world.set_target_cells(&cells) {
            warn!(event = "target_rejected", %cell, shape = shape.name());
        }
        let assigned = self.world.assign_targets(self.config.assignment);
        info!(
            event = "targets_set",
            shape = shape.name(),
            requested = count,
            accepted = self.world.target_cells().len(),
            assigned
        );
        self.world.target_cells().to_vec()
    }

    /// Runs a transformation with one of the built-in algorithms.
    pub fn transform(
        &mut self,
        algorithm: Algorithm,
        topology: Topology,
        movement: MovementMode,
        control: ControlMode,
    ) -> TransformReport {
        let mut planner = AlgorithmPlanner::new(algorithm, self.config.search.clone());
        self.transform_with(&mut planner, topology, movement, control)
    }

    /// Runs a transformation from textual options, reporting unknown names in
    /// the report instead of failing.
    pub fn transform_by_name(
        &mut self,
        algorithm: &str,
        topology: &str,
        movement: &str,
        control: &str,
    ) -> TransformReport {
        let parsed = (|| -> Result<_, ParseError> {
            Ok((
                algorithm.parse::<Algorithm>()?,
                topology.parse::<Topology>()?,
                movement.parse::<MovementMode>()?,
                control.parse::<ControlMode>()?,
            ))
        })();
        match parsed {
            Ok((algorithm, topology, movement, control)) => {
                self.transform(algorithm, topology, movement, control)
            }
            Err(error) => {
                warn!(event = "transform_rejected", %error);
                TransformReport {
                    message: Some(error.to_string()),
                    ..TransformReport::default()
                }
            }
        }
    }

    /// Runs a transformation with a caller-supplied planner.
    pub fn transform_with(
        &mut self,
        planner: &mut dyn Planner,
        topology: Topology,
        movement: MovementMode,
        control: ControlMode,
    ) -> TransformReport {
        let started = Instant::now();
        let assigned = self.world.assign_missing_targets(self.config.assignment);
        info!(
            event = "transform_start",
            ?control,
            ?movement,
            topology = topology.name(),
            elements = self.world.element_count(),
            assigned
        );

        let mut run = Run {
            world: &mut self.world,
            rng: &mut self.rng,
            config: &self.config,
            planner,
            topology,
            movement,
            report: TransformReport::default(),
        };
        match precheck(run.world) {
            Some(message) => {
                warn!(event = "transform_skipped", message);
                run.report.message = Some(message.to_owned());
            }
            None => match control {
                ControlMode::Centralized => centralized::run(&mut run),
                ControlMode::Independent => independent::run(&mut run),
            },
        }
        let mut report = run.report;

        let targeted = self.world.elements().any(|element| element.target().is_some());
        report.success_rate = query::success_rate(&self.world);
        report.success = targeted
            && match control {
                ControlMode::Centralized => query::all_settled(&self.world),
                ControlMode::Independent => {
                    report.success_rate >= self.config.independent.success_threshold
                }
            };
        report.elapsed = started.elapsed();
        info!(
            event = "transform_complete",
            success = report.success,
            success_rate = report.success_rate,
            moves = report.moves.len(),
            nodes = report.nodes_explored,
            ticks = report.ticks,
            interventions = report.interventions,
            elapsed_ms = report.elapsed.as_millis()
        );
        report
    }

    /// Plans a single path without moving anything.
    ///
    /// An element standing on `start` is treated as the mover; adversarial
    /// algorithms need such a mover and otherwise fall back to A*.
    pub fn find_path(
        &mut self,
        start: CellCoord,
        goal: CellCoord,
        algorithm: Algorithm,
        topology: Topology,
    ) -> PathOutcome {
        let kind = SearchKind::for_algorithm(algorithm);
        match (SearchMode::from_algorithm(algorithm), self.world.occupant(start)) {
            (Some(mode), Some(mover)) => {
                AdversarialSearch::new(&self.world, mode, topology, &self.config.search).plan(
                    mover,
                    goal,
                    &mut self.rng,
                )
            }
            (_, Some(mover)) => find_path(
                &WithoutOccupant::new(&self.world, mover),
                start,
                goal,
                topology,
                kind,
            ),
            (_, None) => find_path(&self.world, start, goal, topology, kind),
        }
    }

    /// Serializable snapshot of the grid, elements and targets.
    #[must_use]
    pub fn state(&self) -> SimulationState {
        query::snapshot(&self.world)
    }

    /// Removes every element and target and reseeds the generator.
    pub fn reset(&mut self) {
        self.world.clear();
        self.rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        info!(event = "reset", seed = self.config.seed);
    }
}

fn build_world(config: &SimulationConfig) -> Result<GridWorld, SimulationError> {
    let minimum = if config.boundary_walls { 3 } else { 1 };
    if config.width < minimum || config.height < minimum {
        return Err(SimulationError::GridTooSmall {
            columns: config.width,
            rows: config.height,
        });
    }
    Ok(if config.boundary_walls {
        GridWorld::with_boundary_walls(config.width, config.height)
    } else {
        GridWorld::new(config.width, config.height)
    })
}

fn precheck(world: &GridWorld) -> Option<&'static str> {
    if !world.elements().any(|element| element.target().is_some()) {
        return Some("no element has a target");
    }
    if query::free_cell_count(world) == 0 && !query::all_settled(world) {
        return Some("grid is fully packed; no element can move");
    }
    None
}

/// Borrowed state of one transformation.
pub(crate) struct Run<'a> {
    pub(crate) world: &'a mut GridWorld,
    pub(crate) rng: &'a mut ChaCha8Rng,
    pub(crate) config: &'a SimulationConfig,
    pub(crate) planner: &'a mut dyn Planner,
    pub(crate) topology: Topology,
    pub(crate) movement: MovementMode,
    pub(crate) report: TransformReport,
}

impl Run<'_> {
    pub(crate) fn note(&mut self, intervention: Intervention) {
        self.report.interventions += 1;
        info!(event = "intervention", kind = intervention.name(), ticks = self.report.ticks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(width: u32, height: u32, boundary_walls: bool) -> SimulationConfig {
        SimulationConfig {
            width,
            height,
            boundary_walls,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn initialize_fills_from_the_bottom_row() {
        let mut context = SimulationContext::new(small(6, 5, true)).expect("context");
        context.initialize(5).expect("initialize");

        let cells: Vec<CellCoord> = context.world().elements().map(|element| element.cell()).collect();
        assert_eq!(
            cells,
            vec![
                CellCoord::new(1, 3),
                CellCoord::new(2, 3),
                CellCoord::new(3, 3),
                CellCoord::new(4, 3),
                CellCoord::new(1, 2),
            ]
        );
    }

    #[test]
    fn initialize_rejects_more_elements_than_cells() {
        let mut context = SimulationContext::new(small(4, 4, true)).expect("context");
        assert_eq!(
            context.initialize(5),
            Err(SimulationError::TooManyElements {
                requested: 5,
                capacity: 4
            })
        );
    }

    #[test]
    fn walled_grid_needs_an_interior() {
        assert_eq!(
            SimulationContext::new(small(2, 8, true)).map(|_| ()),
            Err(SimulationError::GridTooSmall {
                columns: 2,
                rows: 8
            })
        );
        assert!(SimulationContext::new(small(2, 1, false)).is_ok());
    }

    #[test]
    fn targets_drop_cells_outside_the_interior() {
        let mut context = SimulationContext::new(SimulationConfig::default()).expect("context");
        context.initialize(9).expect("initialize");
        let targets = context.set_targets(ShapeKind::Square, 9);
        assert_eq!(targets.len(), 9);
        assert!(context
            .world()
            .elements()
            .all(|element| element.target().is_some()));
    }

    #[test]
    fn missing_targets_are_reported_not_raised() {
        let mut context = SimulationContext::new(SimulationConfig::default()).expect("context");
        context.initialize(3).expect("initialize");
        let report = context.transform(
            Algorithm::AStar,
            Topology::VonNeumann,
            MovementMode::Sequential,
            ControlMode::Centralized,
        );
        assert!(!report.success);
        assert!(report.moves.is_empty());
        assert_eq!(report.message.as_deref(), Some("no element has a target"));
    }

    #[test]
    fn find_path_hides_the_mover() {
        let mut context = SimulationContext::new(small(4, 4, false)).expect("context");
        context
            .world_mut()
            .place(ElementId::new(0), CellCoord::new(0, 0))
            .expect("place");
        for algorithm in Algorithm::ALL {
            let outcome = context.find_path(
                CellCoord::new(0, 0),
                CellCoord::new(2, 0),
                algorithm,
                Topology::VonNeumann,
            );
            let path = outcome.path.expect("path");
            assert_eq!(path.last(), Some(&CellCoord::new(2, 0)), "{algorithm:?}");
        }
    }

    #[test]
    fn reset_clears_elements_but_keeps_walls() {
        let mut context = SimulationContext::new(SimulationConfig::default()).expect("context");
        context.initialize(4).expect("initialize");
        let _ = context.set_targets(ShapeKind::Circle, 4);
        context.reset();

        let state = context.state();
        assert!(state.elements.is_empty());
        assert!(state.targets.is_empty());
        assert_eq!(state.walls.len(), 44);
    }
}

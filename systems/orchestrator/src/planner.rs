//! Per-element movers the orchestrator can drive.

use matter_core::{Algorithm, CellCoord, ElementId, Topology};
use matter_system_adversarial::{AdversarialSearch, SearchConfig, SearchMode};
use matter_system_pathfinding::{find_path, PathOutcome, SearchKind, WithoutOccupant};
use matter_world::GridWorld;
use rand::RngCore;

/// Produces a path for one element on the current world.
///
/// The returned path starts at the element's cell. Planners never mutate the
/// world; the orchestrator commits the steps it accepts.
pub trait Planner {
    /// Plans a path for `element` toward `goal`.
    fn plan(
        &mut self,
        world: &GridWorld,
        element: ElementId,
        goal: CellCoord,
        topology: Topology,
        rng: &mut dyn RngCore,
    ) -> PathOutcome;
}

/// Planner backed by one of the built-in algorithms.
#[derive(Clone, Debug)]
pub struct AlgorithmPlanner {
    algorithm: Algorithm,
    search: SearchConfig,
}

impl AlgorithmPlanner {
    /// Creates a planner running `algorithm` with the given search tuning.
    #[must_use]
    pub fn new(algorithm: Algorithm, search: SearchConfig) -> Self {
        Self { algorithm, search }
    }

    /// Algorithm the planner runs.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}

impl Planner for AlgorithmPlanner {
    fn plan(
        &mut self,
        world: &GridWorld,
        element: ElementId,
        goal: CellCoord,
        topology: Topology,
        rng: &mut dyn RngCore,
    ) -> PathOutcome {
        if let Some(mode) = SearchMode::from_algorithm(self.algorithm) {
            return AdversarialSearch::new(world, mode, topology, &self.search).plan(element, goal, rng);
        }
        let Some(start) = world.element(element).map(|element| element.cell()) else {
            return PathOutcome::default();
        };
        find_path(
            &WithoutOccupant::new(world, element),
            start,
            goal,
            topology,
            SearchKind::for_algorithm(self.algorithm),
        )
    }
}

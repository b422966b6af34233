use std::collections::HashSet;

use matter_core::{
    Algorithm, CellCoord, ControlMode, ElementId, MovementMode, ShapeKind, Topology,
};
use matter_system_deadlock::DeadlockConfig;
use matter_system_orchestrator::{
    IndependentConfig, SimulationConfig, SimulationContext, SimulationError,
};

fn open_grid(width: u32, height: u32) -> SimulationContext {
    SimulationContext::new(SimulationConfig {
        width,
        height,
        boundary_walls: false,
        ..SimulationConfig::default()
    })
    .expect("context")
}

fn place(context: &mut SimulationContext, raw: u32, cell: (u32, u32), target: (u32, u32)) {
    let id = ElementId::new(raw);
    let world = context.world_mut();
    world.place(id, CellCoord::new(cell.0, cell.1)).expect("place");
    world
        .assign_target(id, Some(CellCoord::new(target.0, target.1)))
        .expect("target");
}

#[test]
fn single_element_walks_a_shortest_path() {
    let mut context = open_grid(4, 4);
    place(&mut context, 0, (1, 1), (3, 3));

    let report = context.transform(
        Algorithm::AStar,
        Topology::VonNeumann,
        MovementMode::Sequential,
        ControlMode::Centralized,
    );

    assert!(report.success);
    assert_eq!(report.success_rate, 1.0);
    assert_eq!(report.paths.len(), 1);
    assert_eq!(report.paths[0].cells.len(), 5);
    assert_eq!(report.moves.len(), 4);
    assert_eq!(report.moves[0].from, CellCoord::new(1, 1));
    assert_eq!(report.moves[3].to, CellCoord::new(3, 3));
}

#[test]
fn head_on_corridor_is_resolved_by_every_control_mode() {
    for (movement, control) in [
        (MovementMode::Sequential, ControlMode::Centralized),
        (MovementMode::Parallel, ControlMode::Centralized),
        (MovementMode::Parallel, ControlMode::Independent),
        (MovementMode::Sequential, ControlMode::Independent),
    ] {
        let mut context = open_grid(3, 1);
        place(&mut context, 0, (0, 0), (2, 0));
        place(&mut context, 1, (2, 0), (0, 0));

        let report =
            context.transform(Algorithm::AStar, Topology::VonNeumann, movement, control);

        assert_eq!(report.success_rate, 1.0, "{movement:?} {control:?}");
        assert!(report.success, "{movement:?} {control:?}");
        assert!(report.interventions > 0, "{movement:?} {control:?}");
        assert!(context.world().check_invariants().is_ok());
    }
}

#[test]
fn packed_grid_fails_fast_without_moves() {
    let mut context = open_grid(2, 2);
    place(&mut context, 0, (0, 0), (1, 1));
    place(&mut context, 1, (1, 1), (0, 0));
    place(&mut context, 2, (1, 0), (0, 1));
    place(&mut context, 3, (0, 1), (1, 0));

    for control in [ControlMode::Centralized, ControlMode::Independent] {
        let report = context.transform(
            Algorithm::Bfs,
            Topology::Moore,
            MovementMode::Parallel,
            control,
        );
        assert!(!report.success);
        assert!(report.moves.is_empty());
        assert!(report.message.is_some());
    }
}

#[test]
fn contested_cell_is_taken_by_one_element_per_tick() {
    let mut context = SimulationContext::new(SimulationConfig {
        width: 3,
        height: 2,
        boundary_walls: false,
        independent: IndependentConfig {
            max_ticks: 1,
            ..Default::default()
        },
        ..SimulationConfig::default()
    })
    .expect("context");
    place(&mut context, 0, (0, 0), (1, 1));
    place(&mut context, 1, (2, 0), (1, 0));
    context
        .world_mut()
        .set_wall(CellCoord::new(0, 1))
        .expect("wall");
    context
        .world_mut()
        .set_wall(CellCoord::new(2, 1))
        .expect("wall");

    let report = context.transform(
        Algorithm::AStar,
        Topology::VonNeumann,
        MovementMode::Parallel,
        ControlMode::Independent,
    );

    assert_eq!(report.ticks, 1);
    assert_eq!(report.moves.len(), 1);
    assert_eq!(report.moves[0].element, ElementId::new(1));
    assert_eq!(report.moves[0].to, CellCoord::new(1, 0));
}

#[test]
fn reassignment_keeps_partial_progress() {
    let mut context = SimulationContext::new(SimulationConfig {
        width: 4,
        height: 1,
        boundary_walls: false,
        deadlock: DeadlockConfig {
            reassign_after_tick: 0,
            ..DeadlockConfig::default()
        },
        independent: IndependentConfig {
            max_ticks: 60,
            ..Default::default()
        },
        ..SimulationConfig::default()
    })
    .expect("context");
    context
        .world_mut()
        .set_wall(CellCoord::new(1, 0))
        .expect("wall");
    place(&mut context, 0, (3, 0), (3, 0));
    place(&mut context, 1, (0, 0), (2, 0));

    let report = context.transform(
        Algorithm::AStar,
        Topology::VonNeumann,
        MovementMode::Parallel,
        ControlMode::Independent,
    );

    assert!(report.interventions > 0);
    assert!(!report.success);
    assert_eq!(report.success_rate, 0.5);
    let targets: Vec<Option<CellCoord>> = context
        .world()
        .elements()
        .map(|element| element.target())
        .collect();
    assert_eq!(
        targets,
        vec![Some(CellCoord::new(3, 0)), Some(CellCoord::new(2, 0))]
    );
}

#[test]
fn shape_formation_reaches_the_threshold() {
    for topology in [Topology::VonNeumann, Topology::Moore] {
        let mut context = SimulationContext::new(SimulationConfig {
            seed: 11,
            ..SimulationConfig::default()
        })
        .expect("context");
        context.initialize(4).expect("initialize");
        let targets = context.set_targets(ShapeKind::Square, 4);
        assert_eq!(targets.len(), 4);

        let report = context.transform(
            Algorithm::AStar,
            topology,
            MovementMode::Parallel,
            ControlMode::Independent,
        );

        assert!(report.success_rate >= 0.95, "{topology:?}: {report:?}");
        let cells: HashSet<CellCoord> = context
            .world()
            .elements()
            .map(|element| element.cell())
            .collect();
        assert_eq!(cells.len(), 4);
        assert!(context.world().check_invariants().is_ok());
    }
}

#[test]
fn runs_replay_exactly_for_a_seed() {
    let run = || {
        let mut context = SimulationContext::new(SimulationConfig {
            seed: 42,
            ..SimulationConfig::default()
        })
        .expect("context");
        context.initialize(10).expect("initialize");
        let _ = context.set_targets(ShapeKind::Heart, 10);
        let report = context.transform(
            Algorithm::Greedy,
            Topology::VonNeumann,
            MovementMode::Parallel,
            ControlMode::Independent,
        );
        (report.moves, report.nodes_explored, context.state())
    };

    assert_eq!(run(), run());
}

#[test]
fn reset_replays_the_same_run() {
    let mut context = SimulationContext::new(SimulationConfig {
        seed: 5,
        ..SimulationConfig::default()
    })
    .expect("context");

    let play = |context: &mut SimulationContext| {
        context.initialize(6).expect("initialize");
        let _ = context.set_targets(ShapeKind::Triangle, 6);
        context
            .transform(
                Algorithm::Minimax,
                Topology::Moore,
                MovementMode::Sequential,
                ControlMode::Independent,
            )
            .moves
    };

    let first = play(&mut context);
    context.reset();
    let second = play(&mut context);
    assert_eq!(first, second);
}

#[test]
fn unknown_names_are_reported() {
    let mut context = open_grid(4, 4);
    place(&mut context, 0, (0, 0), (3, 3));

    let report = context.transform_by_name("dijkstra", "von_neumann", "parallel", "centralized");
    assert!(!report.success);
    assert!(report.moves.is_empty());
    let message = report.message.expect("message");
    assert!(message.contains("dijkstra"), "{message}");

    let report = context.transform_by_name("bfs", "von_neumann", "sequential", "centralized");
    assert!(report.success);
}

#[test]
fn too_many_elements_are_rejected() {
    let mut context = open_grid(3, 3);
    assert_eq!(
        context.initialize(10),
        Err(SimulationError::TooManyElements {
            requested: 10,
            capacity: 9
        })
    );
}

#[test]
fn config_loads_from_partial_toml() {
    let config: SimulationConfig = toml::from_str(
        r#"
            width = 20
            seed = 9

            [independent]
            max_ticks = 120

            [deadlock]
            no_movement_threshold = 10
        "#,
    )
    .expect("config");

    assert_eq!(config.width, 20);
    assert_eq!(config.height, 12);
    assert_eq!(config.seed, 9);
    assert_eq!(config.independent.max_ticks, 120);
    assert_eq!(config.independent.success_threshold, 0.95);
    assert_eq!(config.deadlock.no_movement_threshold, 10);
    assert_eq!(config.deadlock.swap_after_tick, 100);
}

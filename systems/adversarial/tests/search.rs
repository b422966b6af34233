use matter_core::{CellCoord, ElementId, Topology};
use matter_system_adversarial::{AdversarialSearch, SearchConfig, SearchMode};
use matter_system_pathfinding::{astar, WithoutOccupant};
use matter_world::{query, GridWorld};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const MODES: [SearchMode; 2] = [SearchMode::Minimax, SearchMode::Expectimax];

fn world_with(columns: u32, rows: u32, agents: &[(u32, CellCoord, CellCoord)]) -> GridWorld {
    let mut world = GridWorld::new(columns, rows);
    for &(raw, cell, target) in agents {
        let id = ElementId::new(raw);
        world.place(id, cell).expect("place");
        world.assign_target(id, Some(target)).expect("assign");
    }
    world
}

#[test]
fn first_move_matches_astar_when_one_step_closes_distance() {
    let start = CellCoord::new(2, 2);
    let goal = CellCoord::new(2, 4);
    let world = world_with(5, 5, &[(0, start, goal)]);
    let mover = ElementId::new(0);

    let baseline = astar(
        &WithoutOccupant::new(&world, mover),
        start,
        goal,
        Topology::VonNeumann,
    )
    .path
    .expect("baseline path");

    for mode in MODES {
        for depth in 1..=3 {
            let config = SearchConfig::default();
            let search = AdversarialSearch::new(&world, mode, Topology::VonNeumann, &config);
            let decision = search
                .decide(mover, goal, &[], depth)
                .expect("decision");
            assert_eq!(
                decision.best_move, baseline[1],
                "{mode:?} at depth {depth} disagreed with A*"
            );
        }
    }
}

#[test]
fn pruning_does_not_change_the_decision() {
    let world = world_with(
        6,
        6,
        &[
            (0, CellCoord::new(1, 1), CellCoord::new(4, 2)),
            (1, CellCoord::new(3, 1), CellCoord::new(0, 1)),
            (2, CellCoord::new(2, 2), CellCoord::new(2, 0)),
        ],
    );
    let config = SearchConfig {
        escape_rows: 0,
        ..SearchConfig::default()
    };
    let adversaries = [ElementId::new(1), ElementId::new(2)];

    for depth in 1..=3 {
        let pruned = AdversarialSearch::new(&world, SearchMode::Minimax, Topology::VonNeumann, &config)
            .decide(ElementId::new(0), CellCoord::new(4, 2), &adversaries, depth)
            .expect("pruned decision");
        let full = AdversarialSearch::new(&world, SearchMode::Minimax, Topology::VonNeumann, &config)
            .without_pruning()
            .decide(ElementId::new(0), CellCoord::new(4, 2), &adversaries, depth)
            .expect("full decision");

        assert_eq!(pruned.best_move, full.best_move, "depth {depth}");
        assert!(
            (pruned.best_value - full.best_value).abs() < 1e-9,
            "depth {depth}: {} vs {}",
            pruned.best_value,
            full.best_value
        );
        assert!(pruned.nodes <= full.nodes);
    }
}

#[test]
fn planning_leaves_the_world_untouched() {
    let world = world_with(
        7,
        7,
        &[
            (0, CellCoord::new(1, 1), CellCoord::new(5, 5)),
            (1, CellCoord::new(3, 3), CellCoord::new(1, 5)),
            (2, CellCoord::new(4, 2), CellCoord::new(0, 0)),
        ],
    );
    let before = query::element_snapshots(&world);
    let config = SearchConfig::default();
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    for mode in MODES {
        let outcome = AdversarialSearch::new(&world, mode, Topology::Moore, &config).plan(
            ElementId::new(0),
            CellCoord::new(5, 5),
            &mut rng,
        );
        let path = outcome.path.expect("path");
        assert_eq!(path.first(), Some(&CellCoord::new(1, 1)));
        assert_eq!(path.last(), Some(&CellCoord::new(5, 5)));
        for pair in path.windows(2) {
            assert!(pair[0].direction_to(pair[1]).is_some(), "path is not contiguous");
        }
        assert!(outcome.nodes_expanded > 0);
    }

    assert_eq!(query::element_snapshots(&world), before);
    assert!(world.check_invariants().is_ok());
}

#[test]
fn escaping_agent_steps_straight_up_without_search() {
    let start = CellCoord::new(2, 5);
    let world = world_with(5, 6, &[(0, start, CellCoord::new(2, 0))]);
    let config = SearchConfig::default();
    let mut rng = ChaCha8Rng::seed_from_u64(1);

    for mode in MODES {
        let outcome = AdversarialSearch::new(&world, mode, Topology::VonNeumann, &config).plan(
            ElementId::new(0),
            CellCoord::new(2, 0),
            &mut rng,
        );
        assert_eq!(outcome.path, Some(vec![start, CellCoord::new(2, 4)]));
        assert_eq!(outcome.nodes_expanded, 1);
    }
}

#[test]
fn moore_escape_drifts_toward_the_target_column_reproducibly() {
    let start = CellCoord::new(2, 5);
    let goal = CellCoord::new(6, 1);
    let world = world_with(9, 6, &[(0, start, goal)]);
    let config = SearchConfig::default();
    let search = AdversarialSearch::new(&world, SearchMode::Expectimax, Topology::Moore, &config);

    let first = search
        .plan(ElementId::new(0), goal, &mut ChaCha8Rng::seed_from_u64(11))
        .path
        .expect("path");
    let second = search
        .plan(ElementId::new(0), goal, &mut ChaCha8Rng::seed_from_u64(11))
        .path
        .expect("path");

    assert_eq!(first, second);
    assert_eq!(first, vec![start, CellCoord::new(3, 4)]);
}

#[test]
fn boxed_in_agent_waits_in_place() {
    let world = world_with(
        3,
        3,
        &[
            (0, CellCoord::new(1, 1), CellCoord::new(0, 0)),
            (1, CellCoord::new(1, 0), CellCoord::new(1, 0)),
            (2, CellCoord::new(2, 1), CellCoord::new(2, 1)),
            (3, CellCoord::new(1, 2), CellCoord::new(1, 2)),
            (4, CellCoord::new(0, 1), CellCoord::new(0, 1)),
        ],
    );
    let config = SearchConfig::default();
    let outcome = AdversarialSearch::new(&world, SearchMode::Minimax, Topology::VonNeumann, &config)
        .plan(
            ElementId::new(0),
            CellCoord::new(0, 0),
            &mut ChaCha8Rng::seed_from_u64(3),
        );
    assert_eq!(outcome.path, Some(vec![CellCoord::new(1, 1)]));
}

#[test]
fn invalid_goal_yields_no_path() {
    let world = world_with(4, 4, &[(0, CellCoord::new(1, 1), CellCoord::new(2, 2))]);
    let config = SearchConfig::default();
    let outcome = AdversarialSearch::new(&world, SearchMode::Expectimax, Topology::VonNeumann, &config)
        .plan(
            ElementId::new(0),
            CellCoord::new(9, 9),
            &mut ChaCha8Rng::seed_from_u64(3),
        );
    assert_eq!(outcome.path, None);
    assert_eq!(outcome.nodes_expanded, 0);
}

//! Centrally planned transformation: full paths per element, pass by pass.

use std::collections::HashSet;

use matter_core::{CellCoord, ElementId, ElementPath, MovementMode};
use matter_system_deadlock::{commit_move, recovery};
use matter_world::{query, GridWorld};
use tracing::{debug, trace};

use crate::Run;

pub(crate) fn run(run: &mut Run<'_>) {
    let max_passes = run.config.centralized.max_passes.max(1);
    for pass in 0..max_passes {
        if query::all_settled(run.world) {
            break;
        }
        run.report.ticks = pass + 1;
        let before = run.report.moves.len();
        let order = planning_order(run.world);
        match run.movement {
            MovementMode::Sequential => sequential_pass(run, &order),
            MovementMode::Parallel => parallel_pass(run, &order),
        }
        debug_assert!(run.world.check_invariants().is_ok());
        debug!(
            event = "pass_complete",
            pass,
            moves = run.report.moves.len() - before,
            success_rate = query::success_rate(run.world)
        );

        if run.report.moves.len() == before && !query::all_settled(run.world) && !escalate(run) {
            run.report.message = Some("no element can make progress".to_owned());
            break;
        }
    }
}

/// Unsettled elements ordered by row, then by distance to their target.
fn planning_order(world: &GridWorld) -> Vec<(ElementId, CellCoord)> {
    let mut order: Vec<(ElementId, CellCoord, CellCoord)> = world
        .elements()
        .filter(|element| element.is_unsettled())
        .filter_map(|element| element.target().map(|target| (element.id(), element.cell(), target)))
        .collect();
    order.sort_by_key(|(_, cell, target)| (cell.row(), cell.manhattan_distance(*target)));
    order.into_iter().map(|(id, _, target)| (id, target)).collect()
}

fn plan(run: &mut Run<'_>, element: ElementId, goal: CellCoord) -> Option<Vec<CellCoord>> {
    let outcome = run
        .planner
        .plan(run.world, element, goal, run.topology, &mut *run.rng);
    run.report.nodes_explored += outcome.nodes_expanded;
    let path = outcome.path?;
    run.report.paths.push(ElementPath {
        element,
        cells: path.clone(),
    });
    Some(path)
}

fn sequential_pass(run: &mut Run<'_>, order: &[(ElementId, CellCoord)]) {
    for &(element, goal) in order {
        let Some(path) = plan(run, element, goal) else {
            trace!(event = "no_path", element = element.get());
            continue;
        };
        for &next in path.iter().skip(1) {
            if commit_move(run.world, element, next, &mut run.report.moves) {
                continue;
            }
            debug!(event = "step_blocked", element = element.get(), to = %next);
            if let Some(intervention) =
                recovery::resolve_local(run.world, &mut *run.rng, &mut run.report.moves)
            {
                run.note(intervention);
            }
            break;
        }
    }
}

/// Plans every element against the same world, then advances all paths one
/// step per round with first-come reservations.
fn parallel_pass(run: &mut Run<'_>, order: &[(ElementId, CellCoord)]) {
    let schedules: Vec<(ElementId, CellCoord, Vec<CellCoord>)> = order
        .iter()
        .filter_map(|&(element, goal)| plan(run, element, goal).map(|path| (element, goal, path)))
        .collect();
    let rounds = schedules.iter().map(|(_, _, path)| path.len()).max().unwrap_or(0);

    for step in 1..rounds {
        let mut planned: Vec<(ElementId, CellCoord, CellCoord)> = schedules
            .iter()
            .filter(|(_, _, path)| step < path.len())
            .filter(|(element, _, path)| {
                run.world
                    .element(*element)
                    .is_some_and(|current| current.cell() == path[step - 1])
            })
            .map(|(element, goal, path)| (*element, path[step], *goal))
            .collect();
        if planned.is_empty() {
            continue;
        }
        planned.sort_by_key(|(_, next, goal)| next.manhattan_distance(*goal));

        let mut taken: HashSet<CellCoord> = HashSet::with_capacity(planned.len());
        for &(element, next, _) in &planned {
            if taken.contains(&next) {
                trace!(event = "reservation_conflict", element = element.get(), cell = %next);
                continue;
            }
            if commit_move(run.world, element, next, &mut run.report.moves) {
                let _ = taken.insert(next);
            }
        }

        if taken.len() * 2 < planned.len() {
            if let Some(intervention) =
                recovery::resolve_local(run.world, &mut *run.rng, &mut run.report.moves)
            {
                run.note(intervention);
            }
        }
        debug_assert!(run.world.check_invariants().is_ok());
    }
}

/// Swap, cycle break, then forced relocation. Returns whether any applied.
fn escalate(run: &mut Run<'_>) -> bool {
    let unsettled = query::unsettled(run.world);
    let intervention = recovery::try_target_swap(run.world, &unsettled)
        .or_else(|| recovery::break_cycles(run.world, run.topology, &mut run.report.moves))
        .or_else(|| {
            recovery::force_relocation(
                run.world,
                &unsettled,
                run.topology,
                &run.config.deadlock,
                &mut *run.rng,
                &mut run.report.moves,
            )
        });
    match intervention {
        Some(intervention) => {
            run.note(intervention);
            true
        }
        None => false,
    }
}

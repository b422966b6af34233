//! Decentralized transformation: every element picks one step per tick.
//!
//! A tick collects one intent per unsettled element, orders the intents,
//! reserves each destination cell at most once and commits the reserved
//! moves. Stalls feed the [`DeadlockMonitor`], which escalates through the
//! recovery strategies.

use std::cmp::Reverse;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use matter_core::{CellCoord, Direction, ElementId, GridView, MovementMode, Topology};
use matter_system_deadlock::{commit_move, recovery, DeadlockMonitor, Intervention};
use matter_world::{query, GridWorld};
use rand::seq::SliceRandom;
use tracing::{debug, trace, warn};

use crate::Run;

/// Stuck ticks after which a locally worse step is still taken.
const RESTLESS_AFTER: u32 = 3;

/// Penalty for stepping back onto a recently visited cell.
const REVISIT_PENALTY: f64 = 5.0;

/// A step an element wants to take this tick.
#[derive(Clone, Copy, Debug)]
struct Intent {
    element: ElementId,
    from: CellCoord,
    to: CellCoord,
    target: CellCoord,
}

pub(crate) fn run(run: &mut Run<'_>) {
    let config = run.config;
    let topology = run.topology;
    let mut monitor = DeadlockMonitor::new(config.deadlock.clone(), topology);

    let mut tick = 0;
    while tick < config.independent.max_ticks {
        if query::all_settled(run.world) {
            break;
        }
        scheduled_swap(run, &mut monitor, tick);
        monitor.begin_tick(run.world);

        let mut intents = collect_intents(run, &mut monitor);
        if run.movement == MovementMode::Parallel {
            intents = rank(run.world, &monitor, topology, intents);
        }
        let committed = commit(run, &mut monitor, intents);
        debug_assert!(run.world.check_invariants().is_ok());
        monitor.end_tick(committed > 0);
        tick += 1;
        run.report.ticks = tick;

        if committed > 0 {
            let interval = config.independent.burst_interval;
            if run.movement == MovementMode::Sequential && interval > 0 && tick % interval == 0 {
                burst(run, &mut monitor);
            }
        } else if monitor.needs_recovery() {
            recover(run, &mut monitor, tick);
            if monitor.exhausted() {
                warn!(event = "gave_up", tick, idle = monitor.idle_ticks());
                run.report.message = Some(format!(
                    "no movement for {} ticks; giving up",
                    monitor.idle_ticks()
                ));
                break;
            }
        }
    }
}

/// Periodic swap among blocked or oscillating elements late in a run.
fn scheduled_swap(run: &mut Run<'_>, monitor: &mut DeadlockMonitor, tick: u32) {
    let deadlock = &run.config.deadlock;
    if tick <= deadlock.swap_after_tick || tick % deadlock.swap_interval(run.topology) != 0 {
        return;
    }
    let candidates = monitor.swap_candidates();
    if candidates.is_empty() {
        return;
    }
    if let Some(intervention) = recovery::try_target_swap(run.world, &candidates) {
        monitor.reset();
        run.note(intervention);
    }
}

fn collect_intents(run: &mut Run<'_>, monitor: &mut DeadlockMonitor) -> Vec<Intent> {
    let mut order = query::unsettled(run.world);
    order.shuffle(&mut *run.rng);

    let mut intents = Vec::with_capacity(order.len());
    for element in order {
        let Some(current) = run.world.element(element).copied() else {
            continue;
        };
        let Some(target) = current.target() else {
            continue;
        };
        let from = current.cell();
        let options = run.world.free_neighbors(from, run.topology);
        if options.is_empty() {
            continue;
        }

        let next = if monitor.is_deadlocked(element) {
            recovery::escape_move(run.world, monitor, element, run.topology, &mut *run.rng)
        } else {
            let outcome = run
                .planner
                .plan(run.world, element, target, run.topology, &mut *run.rng);
            run.report.nodes_explored += outcome.nodes_expanded;
            outcome
                .path
                .and_then(|path| path.get(1).copied())
                .filter(|next| options.contains(next))
                .or_else(|| local_step(run.world, monitor, element, from, target, run.topology))
        };

        match next {
            Some(to) => intents.push(Intent {
                element,
                from,
                to,
                target,
            }),
            None => monitor.mark_stuck(element),
        }
    }
    intents
}

/// Best-scoring free neighbour when no planned step is available.
fn local_step(
    world: &GridWorld,
    monitor: &DeadlockMonitor,
    element: ElementId,
    from: CellCoord,
    target: CellCoord,
    topology: Topology,
) -> Option<CellCoord> {
    let (align_weight, progress_weight) = match topology {
        Topology::VonNeumann => (3.0, 2.5),
        Topology::Moore => (2.0, 4.0),
    };
    let (dx, dy) = offset(from, target);
    let distance = f64::from(topology.distance(from, target));

    let (next, score) = world
        .free_neighbors(from, topology)
        .into_iter()
        .map(|next| {
            let (mx, my) = offset(from, next);
            let mut align = (dx.signum() * mx + dy.signum() * my) as f64;
            if topology == Topology::VonNeumann {
                let dominant = if dx.abs() >= dy.abs() { mx } else { my };
                if dominant != 0 {
                    align += 0.5;
                }
            }
            let progress = distance - f64::from(topology.distance(next, target));
            let mobility = world.free_neighbors(next, topology).len() as f64;

            let mut score = align * align_weight + progress * progress_weight + 0.5 * mobility;
            if monitor.recently_visited(element, next) {
                score -= REVISIT_PENALTY;
            }
            if topology == Topology::Moore
                && from.direction_to(next).is_some_and(Direction::is_diagonal)
            {
                score -= 0.5;
            }
            (next, score)
        })
        .max_by(|(_, a), (_, b)| a.total_cmp(b))?;

    (score > 0.0 || monitor.stuck_ticks(element) >= RESTLESS_AFTER).then_some(next)
}

/// Orders parallel intents so the most constrained elements reserve first,
/// then drops intents aiming at a cell an earlier intent already claimed.
fn rank(
    world: &GridWorld,
    monitor: &DeadlockMonitor,
    topology: Topology,
    mut intents: Vec<Intent>,
) -> Vec<Intent> {
    let blockers = blocking_others(world, topology);
    intents.sort_by_key(|intent| {
        let low_mobility = topology == Topology::VonNeumann
            && world.free_neighbors(intent.from, topology).len() <= 2;
        (
            !low_mobility,
            Reverse(monitor.stuck_ticks(intent.element)),
            intent.from.manhattan_distance(intent.target),
            !monitor.is_blocked(intent.element),
            !blockers.contains(&intent.element),
        )
    });

    let mut planned = HashSet::with_capacity(intents.len());
    intents.retain(|intent| {
        let first = planned.insert(intent.to);
        if !first {
            trace!(event = "planned_conflict", element = intent.element.get(), cell = %intent.to);
        }
        first
    });
    intents
}

/// Unsettled elements standing between another element and its target.
///
/// Von Neumann checks the straight line on the target's row or column; Moore
/// checks the bounding box of position and target.
fn blocking_others(world: &GridWorld, topology: Topology) -> HashSet<ElementId> {
    let unsettled: Vec<(ElementId, CellCoord, CellCoord)> = world
        .elements()
        .filter(|element| element.is_unsettled())
        .filter_map(|element| element.target().map(|target| (element.id(), element.cell(), target)))
        .collect();

    unsettled
        .iter()
        .filter(|(id, cell, _)| {
            unsettled.iter().any(|(other, other_cell, other_target)| {
                other != id && obstructs(*cell, *other_cell, *other_target, topology)
            })
        })
        .map(|(id, _, _)| *id)
        .collect()
}

fn obstructs(cell: CellCoord, from: CellCoord, target: CellCoord, topology: Topology) -> bool {
    let between = |value: u32, a: u32, b: u32| a.min(b) <= value && value <= a.max(b);
    match topology {
        Topology::VonNeumann => {
            (cell.column() == target.column() && between(cell.row(), from.row(), target.row()))
                || (cell.row() == target.row()
                    && between(cell.column(), from.column(), target.column()))
        }
        Topology::Moore => {
            between(cell.column(), from.column(), target.column())
                && between(cell.row(), from.row(), target.row())
        }
    }
}

/// Reserves destination cells and applies the reserved moves.
///
/// Sequential movement applies only the first reservation of a tick.
fn commit(run: &mut Run<'_>, monitor: &mut DeadlockMonitor, mut intents: Vec<Intent>) -> usize {
    intents.sort_by_key(|intent| {
        (
            intent.to != intent.target,
            intent.from.manhattan_distance(intent.target),
        )
    });

    let mut reserved: HashMap<CellCoord, ElementId> = HashMap::with_capacity(intents.len());
    let mut committed = 0;
    for intent in intents {
        match reserved.entry(intent.to) {
            Entry::Occupied(owner) => {
                trace!(
                    event = "reservation_conflict",
                    element = intent.element.get(),
                    owner = owner.get().get(),
                    cell = %intent.to
                );
                continue;
            }
            Entry::Vacant(slot) => {
                let _ = slot.insert(intent.element);
            }
        }
        if commit_move(run.world, intent.element, intent.to, &mut run.report.moves) {
            monitor.record_move(intent.element);
            committed += 1;
        }
        if run.movement == MovementMode::Sequential {
            break;
        }
    }
    committed
}

/// Extra deadlock-breaking move between sequential ticks.
fn burst(run: &mut Run<'_>, monitor: &mut DeadlockMonitor) {
    let outcome = match run.topology {
        Topology::VonNeumann => {
            let blocked: Vec<ElementId> = monitor.blocked().iter().copied().collect();
            recovery::break_complex_deadlock(
                run.world,
                &blocked,
                run.topology,
                &mut *run.rng,
                &mut run.report.moves,
            )
        }
        Topology::Moore => recovery::resolve_moore_sequential(
            run.world,
            monitor,
            run.config.assignment,
            &mut *run.rng,
            &mut run.report.moves,
        ),
    };
    if let Some(intervention) = outcome {
        settle(run, monitor, intervention);
    }
}

/// Escalates after a no-movement streak: target swap, cycle break, forced
/// relocation and, late in a run, full reassignment.
fn recover(run: &mut Run<'_>, monitor: &mut DeadlockMonitor, tick: u32) {
    if monitor.blocked().is_empty() {
        monitor.block_unsettled(run.world);
    }
    debug!(
        event = "recovery",
        tick,
        idle = monitor.idle_ticks(),
        blocked = monitor.blocked().len()
    );

    let candidates = monitor.swap_candidates();
    if let Some(intervention) = recovery::try_target_swap(run.world, &candidates) {
        return settle(run, monitor, intervention);
    }
    if let Some(intervention) =
        recovery::break_cycles(run.world, run.topology, &mut run.report.moves)
    {
        return settle(run, monitor, intervention);
    }
    let blocked: Vec<ElementId> = monitor.blocked().iter().copied().collect();
    if let Some(intervention) = recovery::force_relocation(
        run.world,
        &blocked,
        run.topology,
        &run.config.deadlock,
        &mut *run.rng,
        &mut run.report.moves,
    ) {
        return settle(run, monitor, intervention);
    }
    if tick > run.config.deadlock.reassign_after_tick {
        let intervention = recovery::reassign_targets(run.world, monitor, run.config.assignment);
        settle(run, monitor, intervention);
    }
}

fn settle(run: &mut Run<'_>, monitor: &mut DeadlockMonitor, intervention: Intervention) {
    if intervention.resets_history() {
        monitor.reset();
    } else {
        monitor.acknowledge_intervention();
    }
    run.note(intervention);
}

fn offset(from: CellCoord, to: CellCoord) -> (i64, i64) {
    (
        i64::from(to.column()) - i64::from(from.column()),
        i64::from(to.row()) - i64::from(from.row()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_obstruction_depends_on_topology() {
        let from = CellCoord::new(1, 1);
        let target = CellCoord::new(4, 3);
        let on_row = CellCoord::new(2, 3);
        let in_box = CellCoord::new(2, 2);

        assert!(obstructs(on_row, from, target, Topology::VonNeumann));
        assert!(!obstructs(in_box, from, target, Topology::VonNeumann));
        assert!(obstructs(in_box, from, target, Topology::Moore));
        assert!(!obstructs(CellCoord::new(5, 2), from, target, Topology::Moore));
    }

    #[test]
    fn local_step_prefers_progress_toward_the_target() {
        let mut world = GridWorld::new(5, 5);
        let id = ElementId::new(0);
        world.place(id, CellCoord::new(2, 2)).expect("place");
        world
            .assign_target(id, Some(CellCoord::new(4, 2)))
            .expect("target");
        let monitor = DeadlockMonitor::new(Default::default(), Topology::VonNeumann);

        let next = local_step(
            &world,
            &monitor,
            id,
            CellCoord::new(2, 2),
            CellCoord::new(4, 2),
            Topology::VonNeumann,
        );
        assert_eq!(next, Some(CellCoord::new(3, 2)));
    }

    #[test]
    fn ranking_drops_later_claims_on_the_same_cell() {
        let mut world = GridWorld::new(3, 1);
        let left = ElementId::new(0);
        let right = ElementId::new(1);
        world.place(left, CellCoord::new(0, 0)).expect("place");
        world.place(right, CellCoord::new(2, 0)).expect("place");
        let monitor = DeadlockMonitor::new(Default::default(), Topology::VonNeumann);
        let intents = vec![
            Intent {
                element: left,
                from: CellCoord::new(0, 0),
                to: CellCoord::new(1, 0),
                target: CellCoord::new(2, 0),
            },
            Intent {
                element: right,
                from: CellCoord::new(2, 0),
                to: CellCoord::new(1, 0),
                target: CellCoord::new(0, 0),
            },
        ];

        let ranked = rank(&world, &monitor, Topology::VonNeumann, intents);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].element, left);
    }
}

//! Recovery strategies, from least to most disruptive.
//!
//! Every strategy either changes the world and reports an [`Intervention`]
//! or leaves it untouched and returns `None`. Moves are appended to the
//! caller's log through [`commit_move`].

use std::cmp::Reverse;

use matter_core::{CellCoord, Direction, ElementId, GridView, MoveRecord, Topology};
use matter_world::{AssignmentStrategy, GridWorld};
use rand::{seq::SliceRandom, Rng};
use tracing::debug;

use crate::{alignment, commit_move, delta, BlockingGraph, DeadlockConfig, DeadlockMonitor, Intervention};

/// Chance that a randomized move takes the best aligned option instead of any option.
const ALIGNED_MOVE_PROBABILITY: f64 = 0.7;

/// Occupied von Neumann neighbours that make an element count as surrounded.
const SURROUNDED_AT: usize = 3;

/// Distance to target under which the Moore resolver clears the way.
const NEAR_TARGET: u32 = 2;

/// Swaps targets between a candidate and another unsettled element.
///
/// The first pair whose summed Manhattan distance to the exchanged targets is
/// strictly smaller than before wins.
pub fn try_target_swap(world: &mut GridWorld, candidates: &[ElementId]) -> Option<Intervention> {
    let unsettled: Vec<(ElementId, CellCoord, CellCoord)> = world
        .elements()
        .filter(|element| element.is_unsettled())
        .filter_map(|element| element.target().map(|target| (element.id(), element.cell(), target)))
        .collect();

    for &candidate in candidates {
        let Some((cell, Some(target))) = world
            .element(candidate)
            .map(|element| (element.cell(), element.target()))
        else {
            continue;
        };
        for &(other, other_cell, other_target) in &unsettled {
            if other == candidate {
                continue;
            }
            let current = cell.manhattan_distance(target) + other_cell.manhattan_distance(other_target);
            let swapped =
                cell.manhattan_distance(other_target) + other_cell.manhattan_distance(target);
            if swapped < current && world.swap_targets(candidate, other).is_ok() {
                debug!(
                    event = "target_swap",
                    first = candidate.get(),
                    second = other.get(),
                    before = current,
                    after = swapped
                );
                return Some(Intervention::TargetSwap {
                    first: candidate,
                    second: other,
                });
            }
        }
    }
    None
}

/// Detects blocking cycles among unsettled elements and breaks the first one possible.
pub fn break_cycles(
    world: &mut GridWorld,
    topology: Topology,
    moves: &mut Vec<MoveRecord>,
) -> Option<Intervention> {
    let cycles = BlockingGraph::build(world).cycles();
    if !cycles.is_empty() {
        debug!(event = "cycles_detected", count = cycles.len());
    }
    cycles
        .iter()
        .find_map(|cycle| break_cycle(world, cycle, topology, moves))
}

/// Steps one member of `cycle` aside.
///
/// Von Neumann members prefer moves aligned with their own target; Moore
/// members prefer the move that lands farthest from where they stand.
pub fn break_cycle(
    world: &mut GridWorld,
    cycle: &[ElementId],
    topology: Topology,
    moves: &mut Vec<MoveRecord>,
) -> Option<Intervention> {
    if cycle.len() < 2 {
        return None;
    }
    for &member in cycle {
        let Some(element) = world.element(member).copied() else {
            continue;
        };
        let cell = element.cell();
        let mut options = world.free_neighbors(cell, topology);
        match (topology, element.target()) {
            (Topology::VonNeumann, Some(target)) => options.sort_by_key(|next| {
                Reverse((alignment(cell, *next, target), cell.manhattan_distance(*next)))
            }),
            _ => options.sort_by_key(|next| Reverse(cell.manhattan_distance(*next))),
        }
        for next in options {
            if commit_move(world, member, next, moves) {
                debug!(event = "cycle_break", element = member.get(), to = %next);
                return Some(Intervention::CycleBreak { element: member });
            }
        }
    }
    None
}

/// Force-moves randomly chosen blocked elements next to their targets.
///
/// Von Neumann elements first try a cardinal step toward their target; then
/// cells at growing distance around the target are tried in shuffled order.
pub fn force_relocation<R: Rng + ?Sized>(
    world: &mut GridWorld,
    blocked: &[ElementId],
    topology: Topology,
    config: &DeadlockConfig,
    rng: &mut R,
    moves: &mut Vec<MoveRecord>,
) -> Option<Intervention> {
    let mut pending = blocked.to_vec();
    let attempts = config.max_relocations(topology).min(pending.len());
    let mut relocated = 0;

    for _ in 0..attempts {
        let Some(&id) = pending.choose(rng) else {
            break;
        };
        let Some((cell, Some(target))) = world
            .element(id)
            .map(|element| (element.cell(), element.target()))
        else {
            continue;
        };

        let mut moved = topology == Topology::VonNeumann
            && cardinal_order(cell, target)
                .into_iter()
                .filter_map(|direction| cell.step(direction))
                .any(|next| commit_move(world, id, next, moves));

        if !moved {
            'radius: for radius in 1..=config.relocation_radius {
                let mut offsets = ring(topology, radius);
                offsets.shuffle(rng);
                for (dx, dy) in offsets {
                    let Some(next) = offset(target, dx, dy) else {
                        continue;
                    };
                    if commit_move(world, id, next, moves) {
                        moved = true;
                        break 'radius;
                    }
                }
            }
        }

        if moved {
            relocated += 1;
            pending.retain(|other| *other != id);
        }
    }

    if relocated == 0 {
        return None;
    }
    debug!(event = "forced_relocation", relocated);
    Some(Intervention::ForcedRelocation { relocated })
}

/// Recomputes every target and forgets all motion history.
pub fn reassign_targets(
    world: &mut GridWorld,
    monitor: &mut DeadlockMonitor,
    strategy: AssignmentStrategy,
) -> Intervention {
    let assigned = world.assign_targets(strategy);
    monitor.reset();
    debug!(event = "reassignment", assigned);
    Intervention::Reassignment
}

/// Nudges a surrounded element, or one of its neighbours, into free space.
///
/// Surrounded means at least three von Neumann neighbours are walls or
/// elements; without such an element the first unsettled one is used.
pub fn resolve_local<R: Rng + ?Sized>(
    world: &mut GridWorld,
    rng: &mut R,
    moves: &mut Vec<MoveRecord>,
) -> Option<Intervention> {
    let unsettled: Vec<(ElementId, CellCoord)> = world
        .elements()
        .filter(|element| element.is_unsettled())
        .map(|element| (element.id(), element.cell()))
        .collect();
    let surrounded: Vec<(ElementId, CellCoord)> = unsettled
        .iter()
        .copied()
        .filter(|(_, cell)| {
            world
                .neighbors(*cell, Topology::VonNeumann)
                .into_iter()
                .filter(|next| !world.is_free(*next))
                .count()
                >= SURROUNDED_AT
        })
        .collect();
    let pool = if surrounded.is_empty() {
        unsettled.into_iter().take(1).collect()
    } else {
        surrounded
    };
    let &(id, cell) = pool.choose(rng)?;

    if let Some(&next) = world.free_neighbors(cell, Topology::VonNeumann).choose(rng) {
        if commit_move(world, id, next, moves) {
            return Some(Intervention::Nudge { element: id });
        }
    }

    for neighbour in world.neighbors(cell, Topology::VonNeumann) {
        let Some(blocker) = world.occupant(neighbour) else {
            continue;
        };
        let Some(&aside) = world.free_neighbors(neighbour, Topology::VonNeumann).choose(rng) else {
            continue;
        };
        if commit_move(world, blocker, aside, moves) {
            return Some(Intervention::Nudge { element: blocker });
        }
    }
    None
}

/// Multi-move burst for stalled von Neumann populations.
///
/// Tries, in order: a randomized step of one blocked element biased toward
/// its target, cycle breaking, and an axis-biased step of any unsettled
/// element.
pub fn break_complex_deadlock<R: Rng + ?Sized>(
    world: &mut GridWorld,
    blocked: &[ElementId],
    topology: Topology,
    rng: &mut R,
    moves: &mut Vec<MoveRecord>,
) -> Option<Intervention> {
    let mut active: Vec<ElementId> = world
        .elements()
        .filter(|element| element.is_unsettled())
        .map(|element| element.id())
        .collect();
    if active.is_empty() {
        return None;
    }

    if let Some(&id) = blocked.choose(rng) {
        if let Some(element) = world.element(id).copied() {
            let cell = element.cell();
            let mut options = world.free_neighbors(cell, topology);
            if !options.is_empty() {
                let next = match (topology, element.target()) {
                    (Topology::VonNeumann, Some(target))
                        if rng.gen_bool(ALIGNED_MOVE_PROBABILITY) =>
                    {
                        options.sort_by_key(|next| next.manhattan_distance(target));
                        options.first().copied()
                    }
                    _ => options.choose(rng).copied(),
                };
                if let Some(next) = next {
                    if commit_move(world, id, next, moves) {
                        return Some(Intervention::Nudge { element: id });
                    }
                }
            }
        }
    }

    if let Some(intervention) = break_cycles(world, topology, moves) {
        return Some(intervention);
    }

    active.shuffle(rng);
    for id in active {
        let Some(element) = world.element(id).copied() else {
            continue;
        };
        let cell = element.cell();
        let options = world.free_neighbors(cell, topology);
        if options.is_empty() {
            continue;
        }
        let next = match (topology, element.target()) {
            (Topology::VonNeumann, Some(target)) => {
                let (dx, dy) = delta(cell, target);
                let along: Vec<CellCoord> = options
                    .iter()
                    .copied()
                    .filter(|next| {
                        if dx.abs() > dy.abs() {
                            next.row() == cell.row()
                        } else {
                            next.column() == cell.column()
                        }
                    })
                    .collect();
                along.choose(rng).or_else(|| options.choose(rng)).copied()
            }
            _ => options.choose(rng).copied(),
        };
        if let Some(next) = next {
            if commit_move(world, id, next, moves) {
                return Some(Intervention::Nudge { element: id });
            }
        }
    }
    None
}

/// Multi-move burst for stalled Moore populations.
///
/// Tries, in order: moving a neighbour away from a fully surrounded element,
/// clearing the target of an element one step from it (reassigning targets
/// when the occupant cannot step aside), cycle breaking, and a random step.
pub fn resolve_moore_sequential<R: Rng + ?Sized>(
    world: &mut GridWorld,
    monitor: &mut DeadlockMonitor,
    strategy: AssignmentStrategy,
    rng: &mut R,
    moves: &mut Vec<MoveRecord>,
) -> Option<Intervention> {
    let topology = Topology::Moore;
    let mut active: Vec<(ElementId, CellCoord, CellCoord)> = world
        .elements()
        .filter(|element| element.is_unsettled())
        .filter_map(|element| element.target().map(|target| (element.id(), element.cell(), target)))
        .collect();
    if active.is_empty() {
        return None;
    }

    for &(id, cell, _) in &active {
        if !world.free_neighbors(cell, topology).is_empty() {
            continue;
        }
        for neighbour in world.neighbors(cell, topology) {
            let Some(helper) = world.occupant(neighbour) else {
                continue;
            };
            if !active.iter().any(|(other, _, _)| *other == helper) {
                continue;
            }
            let mut options = world.free_neighbors(neighbour, topology);
            options.sort_by_key(|next| Reverse(next.manhattan_distance(cell)));
            if let Some(&next) = options.first() {
                if commit_move(world, helper, next, moves) {
                    debug!(event = "freed_surrounded", element = id.get(), helper = helper.get());
                    return Some(Intervention::Nudge { element: helper });
                }
            }
        }
    }

    let mut close: Vec<(ElementId, CellCoord, CellCoord)> = active
        .iter()
        .copied()
        .filter(|(_, cell, target)| cell.manhattan_distance(*target) <= NEAR_TARGET)
        .collect();
    close.sort_by_key(|(_, cell, target)| cell.manhattan_distance(*target));
    for (_, cell, target) in close {
        if cell.manhattan_distance(target) != 1 {
            continue;
        }
        let Some(blocker) = world.occupant(target).and_then(|id| world.element(id).copied()) else {
            continue;
        };
        let mut options = world.free_neighbors(blocker.cell(), topology);
        if let Some(goal) = blocker.target() {
            options.sort_by_key(|next| next.manhattan_distance(goal));
        }
        if let Some(&next) = options.first() {
            if commit_move(world, blocker.id(), next, moves) {
                return Some(Intervention::Nudge {
                    element: blocker.id(),
                });
            }
        }
        // Blocker is pinned on the target.
        return Some(reassign_targets(world, monitor, strategy));
    }

    if let Some(intervention) = break_cycles(world, topology, moves) {
        return Some(intervention);
    }

    active.shuffle(rng);
    for (id, cell, _) in active {
        let Some(&next) = world.free_neighbors(cell, topology).choose(rng) else {
            continue;
        };
        if commit_move(world, id, next, moves) {
            return Some(Intervention::Nudge { element: id });
        }
    }
    None
}

/// Randomized escape step for an element caught in a pattern or stuck too long.
///
/// Cells of the detected pattern are avoided when possible. Von Neumann
/// elements usually take the option best aligned with their target.
pub fn escape_move<R: Rng + ?Sized>(
    world: &GridWorld,
    monitor: &DeadlockMonitor,
    element: ElementId,
    topology: Topology,
    rng: &mut R,
) -> Option<CellCoord> {
    let current = world.element(element)?;
    let cell = current.cell();
    let options = world.free_neighbors(cell, topology);
    let avoid = monitor.pattern_cells(element);
    let mut escapes: Vec<(CellCoord, f64)> = options
        .iter()
        .copied()
        .filter(|next| !avoid.contains(next))
        .map(|next| (next, rng.gen::<f64>()))
        .collect();
    if escapes.is_empty() {
        return options.choose(rng).copied();
    }

    match (topology, current.target()) {
        (Topology::VonNeumann, Some(target)) => {
            escapes.sort_by(|(a, a_tie), (b, b_tie)| {
                alignment(cell, *b, target)
                    .cmp(&alignment(cell, *a, target))
                    .then(b_tie.total_cmp(a_tie))
            });
            if rng.gen_bool(ALIGNED_MOVE_PROBABILITY) {
                escapes.first().map(|(next, _)| *next)
            } else {
                escapes.choose(rng).map(|(next, _)| *next)
            }
        }
        _ => escapes.choose(rng).map(|(next, _)| *next),
    }
}

fn cardinal_order(cell: CellCoord, target: CellCoord) -> Vec<Direction> {
    let (dx, dy) = delta(cell, target);
    let mut order = Vec::with_capacity(4);
    match dx.signum() {
        1 => order.push(Direction::East),
        -1 => order.push(Direction::West),
        _ => {}
    }
    match dy.signum() {
        1 => order.push(Direction::South),
        -1 => order.push(Direction::North),
        _ => {}
    }
    for direction in [
        Direction::South,
        Direction::East,
        Direction::North,
        Direction::West,
    ] {
        if !order.contains(&direction) {
            order.push(direction);
        }
    }
    order
}

fn ring(topology: Topology, radius: u32) -> Vec<(i64, i64)> {
    let r = i64::from(radius);
    let mut offsets = vec![(0, r), (r, 0), (0, -r), (-r, 0)];
    if topology == Topology::Moore {
        offsets.extend([(r, r), (r, -r), (-r, r), (-r, -r)]);
    }
    offsets
}

fn offset(cell: CellCoord, dx: i64, dy: i64) -> Option<CellCoord> {
    let column = u32::try_from(i64::from(cell.column()) + dx).ok()?;
    let row = u32::try_from(i64::from(cell.row()) + dy).ok()?;
    Some(CellCoord::new(column, row))
}

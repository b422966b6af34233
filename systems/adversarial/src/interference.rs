//! Selection of nearby agents that may interfere with a planned path.

use matter_core::{CellCoord, ElementId};
use matter_world::GridWorld;

use crate::SearchConfig;

const ON_PATH_BONUS: i64 = 30;
const CROSSING_BONUS: i64 = 20;
const OPPOSING_BONUS: i64 = 10;
const PARALLEL_BONUS: i64 = 5;
const DIRECTLY_ABOVE_BONUS: i64 = 50;
const DIAGONALLY_ABOVE_BONUS: i64 = 40;

/// Scores how strongly an agent at `their` heading to `their_target` may
/// obstruct the segment from `start` to `goal`.
///
/// `escaping` adds a bonus for agents sitting above the mover.
#[must_use]
pub fn interference_score(
    start: CellCoord,
    goal: CellCoord,
    their: CellCoord,
    their_target: CellCoord,
    escaping: bool,
) -> i64 {
    let nearest = their
        .manhattan_distance(start)
        .min(their.manhattan_distance(goal));
    let proximity = (10 - i64::from(nearest)).max(0);

    let mut score = proximity * 2;
    if lies_on_segment(start, goal, their) {
        score += ON_PATH_BONUS;
    }

    let (our_dx, our_dy) = delta(start, goal);
    let (their_dx, their_dy) = delta(their, their_target);
    let cross = (our_dx * their_dy - our_dy * their_dx).abs();
    let dot = our_dx * their_dx + our_dy * their_dy;
    score += if cross > 5 {
        CROSSING_BONUS
    } else if dot < 0 {
        OPPOSING_BONUS
    } else {
        PARALLEL_BONUS
    };

    if escaping && their.row() < start.row() {
        match their.column().abs_diff(start.column()) {
            0 => score += DIRECTLY_ABOVE_BONUS,
            1 => score += DIAGONALLY_ABOVE_BONUS,
            _ => {}
        }
    }
    score
}

/// Unsettled agents near the `start`→`goal` segment, most obstructive first.
///
/// Ties keep identifier order. At most `max_adversaries` are returned, or
/// `max_escape_adversaries` when `escaping`.
#[must_use]
pub fn select_adversaries(
    world: &GridWorld,
    mover: ElementId,
    start: CellCoord,
    goal: CellCoord,
    escaping: bool,
    config: &SearchConfig,
) -> Vec<ElementId> {
    let padding = i64::from(config.box_padding);
    let (start_x, start_y) = signed(start);
    let (goal_x, goal_y) = signed(goal);

    let min_x = start_x.min(goal_x) - padding;
    let max_x = start_x.max(goal_x) + padding;
    let (min_y, max_y) = if escaping {
        // Upward rows toward the goal plus the row just below the mover.
        ((start_y - 3).min(goal_y), start_y + 1)
    } else {
        (start_y.min(goal_y) - padding, start_y.max(goal_y) + padding)
    };

    let mut scored: Vec<(ElementId, i64)> = world
        .elements()
        .filter(|element| element.id() != mover && element.is_unsettled())
        .filter_map(|element| {
            let (x, y) = signed(element.cell());
            let inside = (min_x..=max_x).contains(&x) && (min_y..=max_y).contains(&y);
            let target = element.target()?;
            inside.then(|| {
                (
                    element.id(),
                    interference_score(start, goal, element.cell(), target, escaping),
                )
            })
        })
        .collect();

    scored.sort_by(|left, right| right.1.cmp(&left.1));
    let limit = if escaping {
        config.max_escape_adversaries
    } else {
        config.max_adversaries
    };
    scored.into_iter().take(limit).map(|(id, _)| id).collect()
}

fn lies_on_segment(start: CellCoord, goal: CellCoord, cell: CellCoord) -> bool {
    let (start_x, start_y) = signed(start);
    let (goal_x, goal_y) = signed(goal);
    let (x, y) = signed(cell);
    let in_columns = (start_x.min(goal_x)..=start_x.max(goal_x)).contains(&x);
    let in_rows = (start_y.min(goal_y)..=start_y.max(goal_y)).contains(&y);

    if start_x == goal_x {
        return x == start_x && in_rows;
    }
    if start_y == goal_y {
        return y == start_y && in_rows && in_columns;
    }
    if !(in_columns && in_rows) {
        return false;
    }

    let dx = (goal_x - start_x) as f64;
    let dy = (goal_y - start_y) as f64;
    let t = (((x - start_x) as f64 * dx + (y - start_y) as f64 * dy) / (dx * dx + dy * dy))
        .clamp(0.0, 1.0);
    let projected_x = start_x as f64 + t * dx;
    let projected_y = start_y as f64 + t * dy;
    (x as f64 - projected_x).abs() + (y as f64 - projected_y).abs() <= 1.0
}

fn delta(from: CellCoord, to: CellCoord) -> (i64, i64) {
    let (from_x, from_y) = signed(from);
    let (to_x, to_y) = signed(to);
    (to_x - from_x, to_y - from_y)
}

fn signed(cell: CellCoord) -> (i64, i64) {
    (i64::from(cell.column()), i64::from(cell.row()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_on_the_segment_scores_above_a_distant_one() {
        let start = CellCoord::new(1, 1);
        let goal = CellCoord::new(1, 6);
        let blocking = interference_score(start, goal, CellCoord::new(1, 3), CellCoord::new(4, 3), false);
        let distant = interference_score(start, goal, CellCoord::new(7, 7), CellCoord::new(7, 9), false);
        assert!(blocking > distant);
        assert_eq!(blocking, 8 * 2 + ON_PATH_BONUS + CROSSING_BONUS);
    }

    #[test]
    fn escaping_agents_weigh_blockers_above_them() {
        let start = CellCoord::new(3, 9);
        let goal = CellCoord::new(3, 4);
        let above = CellCoord::new(3, 8);
        let target = CellCoord::new(3, 2);
        let relaxed = interference_score(start, goal, above, target, false);
        let escaping = interference_score(start, goal, above, target, true);
        assert_eq!(escaping - relaxed, DIRECTLY_ABOVE_BONUS);
    }

    #[test]
    fn selection_skips_settled_agents_and_respects_the_limit() {
        let mut world = GridWorld::new(10, 10);
        let mover = ElementId::new(0);
        world.place(mover, CellCoord::new(2, 2)).expect("place");
        world
            .assign_target(mover, Some(CellCoord::new(2, 7)))
            .expect("assign");

        for (raw, cell, target) in [
            (1, CellCoord::new(2, 4), CellCoord::new(5, 4)),
            (2, CellCoord::new(3, 5), CellCoord::new(0, 5)),
            (3, CellCoord::new(1, 6), CellCoord::new(1, 9)),
            (4, CellCoord::new(2, 6), CellCoord::new(2, 6)),
            (5, CellCoord::new(9, 0), CellCoord::new(9, 9)),
        ] {
            let id = ElementId::new(raw);
            world.place(id, cell).expect("place");
            world.assign_target(id, Some(target)).expect("assign");
        }

        let config = SearchConfig::default();
        let selected = select_adversaries(
            &world,
            mover,
            CellCoord::new(2, 2),
            CellCoord::new(2, 7),
            false,
            &config,
        );
        assert_eq!(selected.len(), config.max_adversaries);
        assert!(!selected.contains(&ElementId::new(4)), "settled agent selected");
        assert!(!selected.contains(&ElementId::new(5)), "agent outside box selected");
        assert_eq!(selected[0], ElementId::new(1));
    }

    #[test]
    fn escaping_selection_includes_the_agent_directly_above() {
        let mut world = GridWorld::new(12, 12);
        let mover = ElementId::new(0);
        let start = CellCoord::new(3, 11);
        let goal = CellCoord::new(3, 2);
        world.place(mover, start).expect("place");
        world.assign_target(mover, Some(goal)).expect("assign");

        let above = ElementId::new(1);
        world.place(above, CellCoord::new(3, 10)).expect("place");
        world
            .assign_target(above, Some(CellCoord::new(6, 4)))
            .expect("assign");

        let selected = select_adversaries(&world, mover, start, goal, true, &SearchConfig::default());
        assert_eq!(selected, vec![above]);
    }
}

//! Tick-by-tick bookkeeping of stuck and blocked elements.

use std::collections::{BTreeMap, BTreeSet};

use matter_core::{CellCoord, ElementId, Topology};
use matter_world::GridWorld;
use tracing::debug;

use crate::{DeadlockConfig, MotionHistory, MotionPattern};

/// Stuck counter a blocked element must keep to stay blocked once movement resumes.
const STILL_BLOCKED_AFTER: u32 = 5;

/// Recent positions checked by the anti-oscillation penalty.
const RECENT_VISITS: usize = 3;

/// Watches element motion and the global no-movement streak.
#[derive(Clone, Debug)]
pub struct DeadlockMonitor {
    config: DeadlockConfig,
    topology: Topology,
    histories: BTreeMap<ElementId, MotionHistory>,
    blocked: BTreeSet<ElementId>,
    idle_ticks: u32,
}

impl DeadlockMonitor {
    /// Creates a monitor for one transformation run.
    #[must_use]
    pub fn new(config: DeadlockConfig, topology: Topology) -> Self {
        Self {
            config,
            topology,
            histories: BTreeMap::new(),
            blocked: BTreeSet::new(),
            idle_ticks: 0,
        }
    }

    /// Thresholds the monitor was created with.
    #[must_use]
    pub const fn config(&self) -> &DeadlockConfig {
        &self.config
    }

    /// Records every element's position at the start of a tick.
    ///
    /// Settled elements are forgotten; elements stuck beyond the topology
    /// threshold join the blocked set.
    pub fn begin_tick(&mut self, world: &GridWorld) {
        let stuck_threshold = self.config.stuck_threshold(self.topology);
        for element in world.elements() {
            let id = element.id();
            if element.target().is_none() {
                continue;
            }
            if element.at_target() {
                let _ = self.histories.remove(&id);
                let _ = self.blocked.remove(&id);
                continue;
            }

            let capacity = self.config.history_len;
            let history = self
                .histories
                .entry(id)
                .or_insert_with(|| MotionHistory::new(capacity));
            history.observe(element.cell());
            if history.stuck() > stuck_threshold && self.blocked.insert(id) {
                debug!(event = "blocked", element = id.get(), stuck = history.stuck());
            }
        }
    }

    /// Counts a tick in which `element` produced no intent.
    pub fn mark_stuck(&mut self, element: ElementId) {
        if let Some(history) = self.histories.get_mut(&element) {
            history.mark_stuck();
        }
    }

    /// Notes that `element` moved this tick.
    pub fn record_move(&mut self, element: ElementId) {
        let _ = self.blocked.remove(&element);
    }

    /// Closes a tick, updating the global no-movement streak.
    ///
    /// When movement resumes after a stall the blocked set keeps only
    /// elements that are still stuck.
    pub fn end_tick(&mut self, moved: bool) {
        if !moved {
            self.idle_ticks = self.idle_ticks.saturating_add(1);
            return;
        }
        if self.idle_ticks == 0 {
            return;
        }
        self.idle_ticks = 0;
        let histories = &self.histories;
        self.blocked.retain(|id| {
            histories
                .get(id)
                .is_some_and(|history| history.stuck() > STILL_BLOCKED_AFTER)
        });
    }

    /// Consecutive ticks in which nothing moved.
    #[must_use]
    pub const fn idle_ticks(&self) -> u32 {
        self.idle_ticks
    }

    /// Reports whether the no-movement streak calls for recovery.
    #[must_use]
    pub const fn needs_recovery(&self) -> bool {
        self.idle_ticks >= self.config.no_movement_threshold
    }

    /// Reports whether the no-movement streak has lasted too long to continue.
    #[must_use]
    pub const fn exhausted(&self) -> bool {
        self.idle_ticks >= self.config.give_up_after()
    }

    /// Clears the no-movement streak after a successful intervention.
    pub fn acknowledge_intervention(&mut self) {
        self.idle_ticks = 0;
    }

    /// Elements stuck for longer than the topology threshold.
    #[must_use]
    pub const fn blocked(&self) -> &BTreeSet<ElementId> {
        &self.blocked
    }

    /// Reports whether `element` is in the blocked set.
    #[must_use]
    pub fn is_blocked(&self, element: ElementId) -> bool {
        self.blocked.contains(&element)
    }

    /// Marks every unsettled element as blocked.
    pub fn block_unsettled(&mut self, world: &GridWorld) {
        self.blocked.extend(
            world
                .elements()
                .filter(|element| element.is_unsettled())
                .map(|element| element.id()),
        );
    }

    /// Consecutive ticks `element` has not changed cell.
    #[must_use]
    pub fn stuck_ticks(&self, element: ElementId) -> u32 {
        self.histories
            .get(&element)
            .map_or(0, MotionHistory::stuck)
    }

    /// Repeating motion detected for `element`, if any.
    #[must_use]
    pub fn pattern(&self, element: ElementId) -> Option<MotionPattern> {
        self.histories
            .get(&element)
            .and_then(|history| history.pattern(self.topology))
    }

    /// Reports whether `element` should abandon planning and escape.
    #[must_use]
    pub fn is_deadlocked(&self, element: ElementId) -> bool {
        self.pattern(element).is_some()
            || self.stuck_ticks(element) >= self.config.escape_threshold(self.topology)
    }

    /// Cells an escaping element should avoid: two periods of its pattern.
    #[must_use]
    pub fn pattern_cells(&self, element: ElementId) -> Vec<CellCoord> {
        let Some(history) = self.histories.get(&element) else {
            return Vec::new();
        };
        match history.pattern(self.topology) {
            Some(pattern) => history.recent(pattern.period() * 2),
            None => Vec::new(),
        }
    }

    /// Reports whether `element` stood on `cell` within its last few positions.
    #[must_use]
    pub fn recently_visited(&self, element: ElementId, cell: CellCoord) -> bool {
        self.histories
            .get(&element)
            .is_some_and(|history| history.recent(RECENT_VISITS).contains(&cell))
    }

    /// Elements eligible for a target swap: blocked or caught in a pattern.
    #[must_use]
    pub fn swap_candidates(&self) -> Vec<ElementId> {
        let mut candidates: BTreeSet<ElementId> = self.blocked.clone();
        candidates.extend(
            self.histories
                .iter()
                .filter(|(_, history)| history.pattern(self.topology).is_some())
                .map(|(id, _)| *id),
        );
        candidates.into_iter().collect()
    }

    /// Forgets all histories, the blocked set and the idle streak.
    pub fn reset(&mut self) {
        self.histories.clear();
        self.blocked.clear();
        self.idle_ticks = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corridor() -> (GridWorld, ElementId) {
        let mut world = GridWorld::new(4, 1);
        let id = ElementId::new(0);
        world.place(id, CellCoord::new(0, 0)).expect("place");
        world
            .assign_target(id, Some(CellCoord::new(3, 0)))
            .expect("target");
        (world, id)
    }

    #[test]
    fn element_stuck_past_threshold_becomes_blocked() {
        let (world, id) = corridor();
        let mut monitor = DeadlockMonitor::new(DeadlockConfig::default(), Topology::VonNeumann);

        for _ in 0..9 {
            monitor.begin_tick(&world);
        }
        assert_eq!(monitor.stuck_ticks(id), 8);
        assert!(!monitor.is_blocked(id));
        assert!(monitor.is_deadlocked(id));

        monitor.begin_tick(&world);
        assert!(monitor.is_blocked(id));

        monitor.record_move(id);
        assert!(!monitor.is_blocked(id));
    }

    #[test]
    fn idle_streak_escalates_and_resets_on_movement() {
        let (world, id) = corridor();
        let mut monitor = DeadlockMonitor::new(DeadlockConfig::default(), Topology::VonNeumann);
        monitor.block_unsettled(&world);
        assert!(monitor.is_blocked(id));

        for _ in 0..15 {
            monitor.end_tick(false);
        }
        assert!(monitor.needs_recovery());
        assert!(!monitor.exhausted());

        monitor.end_tick(true);
        assert_eq!(monitor.idle_ticks(), 0);
        assert!(!monitor.is_blocked(id), "pruned because it is not stuck");

        for _ in 0..30 {
            monitor.end_tick(false);
        }
        assert!(monitor.exhausted());
        monitor.acknowledge_intervention();
        assert_eq!(monitor.idle_ticks(), 0);
    }

    #[test]
    fn oscillating_element_is_a_swap_candidate() {
        let (mut world, id) = corridor();
        let mut monitor = DeadlockMonitor::new(DeadlockConfig::default(), Topology::Moore);
        for column in [0, 1, 0, 1] {
            let _ = world.move_element(id, CellCoord::new(column, 0));
            monitor.begin_tick(&world);
        }
        assert_eq!(monitor.pattern(id), Some(MotionPattern::Oscillation));
        assert_eq!(monitor.swap_candidates(), vec![id]);
        assert_eq!(monitor.pattern_cells(id).len(), 4);
        assert!(monitor.recently_visited(id, CellCoord::new(0, 0)));

        monitor.reset();
        assert!(monitor.swap_candidates().is_empty());
    }

    #[test]
    fn settled_elements_are_forgotten() {
        let (mut world, id) = corridor();
        let mut monitor = DeadlockMonitor::new(DeadlockConfig::default(), Topology::VonNeumann);
        monitor.begin_tick(&world);
        monitor.begin_tick(&world);
        assert_eq!(monitor.stuck_ticks(id), 1);

        world
            .assign_target(id, Some(CellCoord::new(0, 0)))
            .expect("target");
        monitor.begin_tick(&world);
        assert_eq!(monitor.stuck_ticks(id), 0);
    }
}

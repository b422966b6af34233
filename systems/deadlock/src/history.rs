//! Per-element position ring and the motion patterns read from it.

use std::collections::VecDeque;

use matter_core::{CellCoord, Topology};

/// Repeating motion recognised in a position history.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotionPattern {
    /// A-B-A-B back and forth between two cells.
    Oscillation,
    /// The last four positions repeat the four before them.
    Cycle,
    /// Von Neumann back and forth along one row or column.
    LineTrap,
}

impl MotionPattern {
    /// Number of distinct positions forming one period of the pattern.
    #[must_use]
    pub const fn period(self) -> usize {
        match self {
            Self::Oscillation | Self::LineTrap => 2,
            Self::Cycle => 4,
        }
    }
}

/// Recent distinct positions of one element and how long it has stood still.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MotionHistory {
    positions: VecDeque<CellCoord>,
    capacity: usize,
    stuck: u32,
}

impl MotionHistory {
    /// Creates a history remembering at most `capacity` positions.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            positions: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            stuck: 0,
        }
    }

    /// Records the element's cell for this tick.
    ///
    /// A new cell is appended and clears the stuck counter; the same cell
    /// counts as one more stuck tick.
    pub fn observe(&mut self, cell: CellCoord) {
        match self.positions.back() {
            Some(last) if *last == cell => self.stuck = self.stuck.saturating_add(1),
            Some(_) => {
                self.positions.push_back(cell);
                self.stuck = 0;
            }
            None => self.positions.push_back(cell),
        }
        while self.positions.len() > self.capacity {
            let _ = self.positions.pop_front();
        }
    }

    /// Counts a tick in which the element found nothing to do.
    pub fn mark_stuck(&mut self) {
        self.stuck = self.stuck.saturating_add(1);
    }

    /// Consecutive ticks without a position change.
    #[must_use]
    pub const fn stuck(&self) -> u32 {
        self.stuck
    }

    /// Remembered positions, oldest first.
    pub fn positions(&self) -> impl Iterator<Item = CellCoord> + '_ {
        self.positions.iter().copied()
    }

    /// The last `count` remembered positions, oldest first.
    #[must_use]
    pub fn recent(&self, count: usize) -> Vec<CellCoord> {
        let skip = self.positions.len().saturating_sub(count);
        self.positions.iter().skip(skip).copied().collect()
    }

    /// Detects the strongest repeating motion in the history.
    #[must_use]
    pub fn pattern(&self, topology: Topology) -> Option<MotionPattern> {
        let len = self.positions.len();
        if len < 4 {
            return None;
        }
        let at = |back: usize| self.positions[len - back];

        if len >= 8 && (1..=4).all(|back| at(back) == at(back + 4)) {
            return Some(MotionPattern::Cycle);
        }
        if at(4) == at(2) && at(3) == at(1) {
            return Some(MotionPattern::Oscillation);
        }
        if topology == Topology::VonNeumann {
            let last = self.recent(3);
            let anchor = at(1);
            let mut distinct = last.clone();
            distinct.sort_unstable();
            distinct.dedup();
            let same_column = last.iter().all(|cell| cell.column() == anchor.column());
            let same_row = last.iter().all(|cell| cell.row() == anchor.row());
            if distinct.len() <= 2 && (same_column || same_row) {
                return Some(MotionPattern::LineTrap);
            }
        }
        None
    }
}

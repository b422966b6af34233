#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deadlock detection and escalating recovery.
//!
//! The [`DeadlockMonitor`] keeps a short motion history per unsettled element
//! and a global count of ticks without movement. Once progress stalls the
//! driver escalates through the recovery strategies in [`recovery`]: target
//! swaps, cycle breaking on the [`BlockingGraph`], forced relocation and a full
//! target reassignment.

mod graph;
mod history;
mod monitor;
pub mod recovery;

use matter_core::{CellCoord, ElementId, MoveRecord, Topology};
use matter_world::GridWorld;
use serde::{Deserialize, Serialize};
use tracing::trace;

pub use graph::BlockingGraph;
pub use history::{MotionHistory, MotionPattern};
pub use monitor::DeadlockMonitor;

/// Thresholds driving detection and escalation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadlockConfig {
    /// Positions remembered per element.
    pub history_len: usize,
    /// Consecutive ticks without any movement before recovery escalates.
    pub no_movement_threshold: u32,
    /// Tick after which periodic target swaps start.
    pub swap_after_tick: u32,
    /// Tick after which a full target reassignment is allowed.
    pub reassign_after_tick: u32,
    /// Largest distance from a target searched during forced relocation.
    pub relocation_radius: u32,
}

impl Default for DeadlockConfig {
    fn default() -> Self {
        Self {
            history_len: 8,
            no_movement_threshold: 15,
            swap_after_tick: 100,
            reassign_after_tick: 150,
            relocation_radius: 4,
        }
    }
}

impl DeadlockConfig {
    /// Stuck ticks after which an element joins the blocked set.
    #[must_use]
    pub const fn stuck_threshold(&self, topology: Topology) -> u32 {
        match topology {
            Topology::VonNeumann => 8,
            Topology::Moore => 10,
        }
    }

    /// Stuck ticks after which an element takes randomized escape moves.
    #[must_use]
    pub const fn escape_threshold(&self, topology: Topology) -> u32 {
        match topology {
            Topology::VonNeumann => 4,
            Topology::Moore => 5,
        }
    }

    /// Tick period of the scheduled target swaps.
    #[must_use]
    pub const fn swap_interval(&self, topology: Topology) -> u32 {
        match topology {
            Topology::VonNeumann => 15,
            Topology::Moore => 20,
        }
    }

    /// Blocked elements relocated by one emergency intervention.
    #[must_use]
    pub const fn max_relocations(&self, topology: Topology) -> usize {
        match topology {
            Topology::VonNeumann => 4,
            Topology::Moore => 3,
        }
    }

    /// Global idle ticks after which the driver gives up.
    #[must_use]
    pub const fn give_up_after(&self) -> u32 {
        self.no_movement_threshold.saturating_mul(2)
    }
}

/// Recovery action that changed the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intervention {
    /// Two elements exchanged targets.
    TargetSwap {
        /// Element whose target was swapped first.
        first: ElementId,
        /// Partner of the swap.
        second: ElementId,
    },
    /// A member of a blocking cycle stepped aside.
    CycleBreak {
        /// Element that moved.
        element: ElementId,
    },
    /// Blocked elements were moved next to their targets, bypassing planning.
    ForcedRelocation {
        /// Number of elements relocated.
        relocated: usize,
    },
    /// Every target was recomputed from scratch.
    Reassignment,
    /// A single element was nudged to unblock its surroundings.
    Nudge {
        /// Element that moved.
        element: ElementId,
    },
}

impl Intervention {
    /// Short label used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::TargetSwap { .. } => "target_swap",
            Self::CycleBreak { .. } => "cycle_break",
            Self::ForcedRelocation { .. } => "forced_relocation",
            Self::Reassignment => "reassignment",
            Self::Nudge { .. } => "nudge",
        }
    }

    /// Reports whether the intervention invalidates every motion history.
    #[must_use]
    pub const fn resets_history(&self) -> bool {
        matches!(self, Self::TargetSwap { .. } | Self::Reassignment)
    }
}

/// Moves an element and appends the step to `moves` when the world accepts it.
pub fn commit_move(
    world: &mut GridWorld,
    element: ElementId,
    to: CellCoord,
    moves: &mut Vec<MoveRecord>,
) -> bool {
    let Some(from) = world.element(element).map(|element| element.cell()) else {
        return false;
    };
    if !world.move_element(element, to) {
        return false;
    }
    trace!(event = "move", element = element.get(), %from, %to);
    moves.push(MoveRecord { element, from, to });
    true
}

/// Dot product of the step `from -> to` with the offset `from -> target`.
pub(crate) fn alignment(from: CellCoord, to: CellCoord, target: CellCoord) -> i64 {
    let (dx, dy) = delta(from, target);
    let (mx, my) = delta(from, to);
    dx * mx + dy * my
}

pub(crate) fn delta(from: CellCoord, to: CellCoord) -> (i64, i64) {
    (
        i64::from(to.column()) - i64::from(from.column()),
        i64::from(to.row()) - i64::from(from.row()),
    )
}

//! Run configuration, loadable from TOML.

use matter_system_adversarial::SearchConfig;
use matter_system_deadlock::DeadlockConfig;
use matter_world::AssignmentStrategy;
use serde::{Deserialize, Serialize};

/// Complete configuration of a simulation context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Grid columns, walls included.
    pub width: u32,
    /// Grid rows, walls included.
    pub height: u32,
    /// Surround the grid with a one-cell wall.
    pub boundary_walls: bool,
    /// Seed of the run's random number generator.
    pub seed: u64,
    /// Adversarial search tuning.
    pub search: SearchConfig,
    /// Deadlock detection thresholds.
    pub deadlock: DeadlockConfig,
    /// Independent control settings.
    pub independent: IndependentConfig,
    /// Centralized control settings.
    pub centralized: CentralizedConfig,
    /// How elements are paired with targets.
    pub assignment: AssignmentStrategy,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            width: 12,
            height: 12,
            boundary_walls: true,
            seed: 0,
            search: SearchConfig::default(),
            deadlock: DeadlockConfig::default(),
            independent: IndependentConfig::default(),
            centralized: CentralizedConfig::default(),
            assignment: AssignmentStrategy::default(),
        }
    }
}

/// Settings of the per-tick decentralized loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndependentConfig {
    /// Tick ceiling of one transformation.
    pub max_ticks: u32,
    /// Sequential movement allows a deadlock-breaking burst every this many ticks.
    pub burst_interval: u32,
    /// Fraction of settled elements counted as success.
    pub success_threshold: f64,
}

impl Default for IndependentConfig {
    fn default() -> Self {
        Self {
            max_ticks: 500,
            burst_interval: 5,
            success_threshold: 0.95,
        }
    }
}

/// Settings of the centrally planned loop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CentralizedConfig {
    /// Planning passes before giving up on unsettled elements.
    pub max_passes: u32,
}

impl Default for CentralizedConfig {
    fn default() -> Self {
        Self { max_passes: 8 }
    }
}

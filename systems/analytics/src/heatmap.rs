//! Where elements end up stranded across many seeded runs.

use matter_core::{Algorithm, CellCoord, ControlMode, MovementMode, ShapeKind, Topology};
use matter_system_orchestrator::{SimulationConfig, SimulationContext, SimulationError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Counts of final cells of elements that missed their target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeadlockHeatmap {
    columns: u32,
    rows: u32,
    runs: u32,
    counts: Vec<Vec<u32>>,
    max: u32,
    normalised: Vec<Vec<f64>>,
}

impl DeadlockHeatmap {
    fn empty(columns: u32, rows: u32) -> Self {
        Self {
            columns,
            rows,
            runs: 0,
            counts: vec![vec![0; columns as usize]; rows as usize],
            max: 0,
            normalised: Vec::new(),
        }
    }

    fn record(&mut self, cell: CellCoord) {
        let Some(count) = self
            .counts
            .get_mut(cell.row() as usize)
            .and_then(|row| row.get_mut(cell.column() as usize))
        else {
            return;
        };
        *count += 1;
        self.max = self.max.max(*count);
    }

    fn finish(mut self, runs: u32) -> Self {
        let max = f64::from(self.max.max(1));
        self.runs = runs;
        self.normalised = self
            .counts
            .iter()
            .map(|row| row.iter().map(|&count| f64::from(count) / max).collect())
            .collect();
        self
    }

    /// Grid dimensions as `(columns, rows)`.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.columns, self.rows)
    }

    /// Number of runs aggregated.
    #[must_use]
    pub const fn runs(&self) -> u32 {
        self.runs
    }

    /// Raw counts indexed `[row][column]`.
    #[must_use]
    pub fn counts(&self) -> &[Vec<u32>] {
        &self.counts
    }

    /// Largest count of any cell.
    #[must_use]
    pub const fn max(&self) -> u32 {
        self.max
    }

    /// Counts divided by the maximum; all zeros when nothing got stuck.
    #[must_use]
    pub fn normalised(&self) -> &[Vec<f64>] {
        &self.normalised
    }

    /// Count at `cell`, zero outside the grid.
    #[must_use]
    pub fn count(&self, cell: CellCoord) -> u32 {
        self.counts
            .get(cell.row() as usize)
            .and_then(|row| row.get(cell.column() as usize))
            .copied()
            .unwrap_or(0)
    }

    /// Cells with a non-zero count, most frequent first.
    #[must_use]
    pub fn hotspots(&self) -> Vec<(CellCoord, u32)> {
        let mut cells: Vec<(CellCoord, u32)> = self
            .counts
            .iter()
            .zip(0_u32..)
            .flat_map(|(row, y)| {
                row.iter()
                    .zip(0_u32..)
                    .filter(|(count, _)| **count > 0)
                    .map(move |(count, x)| (CellCoord::new(x, y), *count))
            })
            .collect();
        cells.sort_by(|(a_cell, a), (b_cell, b)| b.cmp(a).then(a_cell.cmp(b_cell)));
        cells
    }
}

/// Runs `runs` independent parallel A* formations with seeds
/// `config.seed..config.seed + runs` and counts where unsettled elements end.
pub fn deadlock_heatmap(
    config: &SimulationConfig,
    shape: ShapeKind,
    count: usize,
    topology: Topology,
    runs: u32,
) -> Result<DeadlockHeatmap, SimulationError> {
    let mut heatmap = DeadlockHeatmap::empty(config.width, config.height);
    for run in 0..runs {
        let mut context = SimulationContext::new(SimulationConfig {
            seed: config.seed.wrapping_add(u64::from(run)),
            ..config.clone()
        })?;
        context.initialize(count)?;
        let _ = context.set_targets(shape, count);
        let report = context.transform(
            Algorithm::AStar,
            topology,
            MovementMode::Parallel,
            ControlMode::Independent,
        );

        let stranded: Vec<CellCoord> = context
            .world()
            .elements()
            .filter(|element| element.is_unsettled())
            .map(|element| element.cell())
            .collect();
        debug!(
            event = "heatmap_run",
            run,
            success_rate = report.success_rate,
            stranded = stranded.len()
        );
        for cell in stranded {
            heatmap.record(cell);
        }
    }

    let heatmap = heatmap.finish(runs);
    info!(event = "heatmap_complete", runs, max = heatmap.max());
    Ok(heatmap)
}
